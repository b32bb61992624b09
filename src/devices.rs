use crate::error::CameraError;
use crate::platform::MediaPlatform;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

const BACK_MARKERS: &[&str] = &["back", "rear", "environment", "traseira", "trás"];
const FRONT_MARKERS: &[&str] = &["front", "frontal", "user", "facetime"];

/// Which way a camera points, inferred from its label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    Front,
    Back,
    Unknown,
}

impl Facing {
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        if BACK_MARKERS.iter().any(|m| label.contains(m)) {
            Facing::Back
        } else if FRONT_MARKERS.iter().any(|m| label.contains(m)) {
            Facing::Front
        } else {
            Facing::Unknown
        }
    }
}

/// Video input device as seen by the scanner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureDevice {
    pub id: String,
    pub label: String,
    pub facing: Facing,
    /// Enumeration generation this entry belongs to
    pub generation: u64,
}

/// Enumerates video inputs through the host media API
pub struct DeviceCatalog {
    platform: Arc<dyn MediaPlatform>,
    generation: AtomicU64,
}

impl DeviceCatalog {
    pub fn new(platform: Arc<dyn MediaPlatform>) -> Self {
        Self {
            platform,
            generation: AtomicU64::new(0),
        }
    }

    /// List video input devices in platform order.
    ///
    /// Every call is a fresh enumeration and bumps the generation counter;
    /// results of earlier calls should be treated as stale. An empty
    /// platform result is reported as [`CameraError::NoDeviceFound`].
    pub async fn list(&self) -> Result<Vec<CaptureDevice>, CameraError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let descriptors = self
            .platform
            .enumerate_devices()
            .await
            .map_err(|e| e.into_camera_error("*"))?;

        if descriptors.is_empty() {
            return Err(CameraError::NoDeviceFound);
        }

        let devices: Vec<CaptureDevice> = descriptors
            .into_iter()
            .map(|d| CaptureDevice {
                facing: Facing::from_label(&d.label),
                id: d.id,
                label: d.label,
                generation,
            })
            .collect();

        info!(
            "Enumerated {} video input(s) on {} (generation {})",
            devices.len(),
            self.platform.name(),
            generation
        );
        for (i, device) in devices.iter().enumerate() {
            debug!("  [{}] {} ({:?}) id={}", i, device.label, device.facing, device.id);
        }

        Ok(devices)
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }
}

/// Index of the device a new session should start on.
///
/// A configured index wins when it is in range. Otherwise, with more than one
/// device, the first label that looks rear-facing is chosen. Falls back to 0.
pub fn default_index(devices: &[CaptureDevice], pinned: Option<usize>) -> usize {
    if let Some(index) = pinned {
        if index < devices.len() {
            return index;
        }
        debug!(
            "Configured camera index {} out of range ({} devices)",
            index,
            devices.len()
        );
    }

    if devices.len() > 1 {
        if let Some(index) = devices.iter().position(|d| d.facing == Facing::Back) {
            return index;
        }
    }

    0
}
