use super::capabilities::CapabilitySet;
use super::constraints::constraints_for;
use crate::config::CameraConfig;
use crate::devices::CaptureDevice;
use crate::error::{CameraError, CapabilityError, ErrorKind};
use crate::frame::FrameData;
use crate::mode::ScanMode;
use crate::platform::{
    AdvancedConstraint, MediaPlatform, PlatformError, TrackSettings, VideoTrack,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

/// Open/close counters for one session object
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub opens: u64,
    pub closes: u64,
}

/// Read-only handle on the live track, handed to decode engines
#[derive(Clone)]
pub struct FrameSource {
    track: Arc<dyn VideoTrack>,
}

impl FrameSource {
    pub async fn grab(&self) -> Result<Option<FrameData>, PlatformError> {
        self.track.grab_frame().await
    }

    pub fn is_live(&self) -> bool {
        self.track.is_live()
    }

    pub fn device_id(&self) -> &str {
        self.track.device_id()
    }

    pub fn settings(&self) -> TrackSettings {
        self.track.settings()
    }
}

struct ActiveStream {
    track: Arc<dyn VideoTrack>,
    device: CaptureDevice,
    mode: ScanMode,
    settings: TrackSettings,
    capabilities: CapabilitySet,
    torch_on: bool,
    zoom: Option<f64>,
    opened_at: Instant,
}

/// Owns at most one live camera stream.
///
/// Opening while open closes the previous stream first, and every path out
/// of a failed open leaves no stream live. Dropping the session closes it.
pub struct CaptureSession {
    platform: Arc<dyn MediaPlatform>,
    config: CameraConfig,
    active: Option<ActiveStream>,
    last_mode: Option<ScanMode>,
    stats: SessionStats,
}

impl CaptureSession {
    pub fn new(platform: Arc<dyn MediaPlatform>, config: CameraConfig) -> Self {
        Self {
            platform,
            config,
            active: None,
            last_mode: None,
            stats: SessionStats::default(),
        }
    }

    /// Acquire a stream on `device` tuned for `mode`
    pub async fn open(
        &mut self,
        device: &CaptureDevice,
        mode: ScanMode,
    ) -> Result<CapabilitySet, CameraError> {
        if self.active.is_some() {
            debug!("Session already open; closing before reopening");
            self.close();
        }

        let constraints = constraints_for(device, mode);
        info!(
            "Opening {} ({}) for {} at {}x{}@{}",
            device.label,
            device.id,
            mode,
            constraints.ideal_width,
            constraints.ideal_height,
            constraints.ideal_fps
        );

        let track = match self.platform.open_stream(&constraints).await {
            Ok(track) => track,
            Err(e)
                if e.classify() == ErrorKind::ConstraintsNotSatisfiable
                    && self.config.relax_constraints =>
            {
                warn!(
                    "{} cannot satisfy {} constraints ({}); retrying without resolution floor",
                    device.label, mode, e
                );
                self.platform
                    .open_stream(&constraints.relaxed())
                    .await
                    .map_err(|e| e.into_camera_error(&device.id))?
            }
            Err(e) => return Err(e.into_camera_error(&device.id)),
        };

        let settings = track.settings();
        let capabilities = CapabilitySet::from_track(&track.capabilities());
        self.active = Some(ActiveStream {
            track,
            device: device.clone(),
            mode,
            settings,
            capabilities: capabilities.clone(),
            torch_on: false,
            zoom: None,
            opened_at: Instant::now(),
        });
        self.last_mode = Some(mode);
        self.stats.opens += 1;

        info!(
            "Stream open on {}: {}x{}@{} (zoom: {}, torch: {})",
            device.id,
            settings.width,
            settings.height,
            settings.fps,
            capabilities.zoom.is_some(),
            capabilities.torch
        );

        if capabilities.supports_continuous_focus() {
            if let Some(active) = &self.active {
                if let Err(e) = active
                    .track
                    .apply_constraints(&[AdvancedConstraint::FocusMode("continuous".to_string())])
                    .await
                {
                    debug!("Continuous focus not applied: {}", e);
                }
            }
        }

        if self.config.auto_torch && capabilities.torch {
            if let Err(e) = self.set_torch(true).await {
                debug!("Automatic torch not applied: {}", e);
            }
        }

        if self.config.focus_settle_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.focus_settle_ms)).await;
        }

        Ok(capabilities)
    }

    /// Close and reopen on another device, keeping the current mode
    pub async fn switch_to(&mut self, device: &CaptureDevice) -> Result<CapabilitySet, CameraError> {
        let mode = self
            .active
            .as_ref()
            .map(|a| a.mode)
            .or(self.last_mode)
            .ok_or_else(|| CameraError::StreamUnavailable {
                device: device.id.clone(),
                details: "session was never opened".to_string(),
            })?;

        self.close();
        self.open(device, mode).await
    }

    /// Set zoom, snapped to the hardware step. Returns the applied level.
    pub async fn apply_zoom(&mut self, level: f64) -> Result<f64, CapabilityError> {
        let active = self.active.as_mut().ok_or(CapabilityError::SessionNotOpen)?;
        let range = active
            .capabilities
            .zoom
            .ok_or(CapabilityError::ZoomUnsupported)?;

        let snapped = range.snap(level);
        active
            .track
            .apply_constraints(&[AdvancedConstraint::Zoom(snapped)])
            .await
            .map_err(|e| CapabilityError::ZoomRejected {
                details: e.to_string(),
            })?;

        active.zoom = Some(snapped);
        debug!("Zoom set to {} (requested {})", snapped, level);
        Ok(snapped)
    }

    /// Turn the torch on or off. No-op when already in that state.
    pub async fn set_torch(&mut self, enabled: bool) -> Result<bool, CapabilityError> {
        let active = self.active.as_mut().ok_or(CapabilityError::SessionNotOpen)?;
        if !active.capabilities.torch {
            return Err(CapabilityError::TorchUnsupported);
        }
        if active.torch_on == enabled {
            return Ok(enabled);
        }

        active
            .track
            .apply_constraints(&[AdvancedConstraint::Torch(enabled)])
            .await
            .map_err(|e| CapabilityError::TorchRejected {
                details: e.to_string(),
            })?;

        active.torch_on = enabled;
        debug!("Torch {}", if enabled { "on" } else { "off" });
        Ok(enabled)
    }

    /// Stop every track and release the device. Safe to call repeatedly.
    pub fn close(&mut self) {
        match self.active.take() {
            Some(active) => {
                active.track.stop();
                self.stats.closes += 1;
                info!(
                    "Stream on {} closed after {:?}",
                    active.device.id,
                    active.opened_at.elapsed()
                );
            }
            None => trace!("Close requested on an idle session"),
        }
    }

    pub fn frame_source(&self) -> Option<FrameSource> {
        self.active.as_ref().map(|a| FrameSource {
            track: Arc::clone(&a.track),
        })
    }

    /// Grab one frame from the open stream, if any is ready
    pub async fn grab_frame(&self) -> Option<FrameData> {
        let active = self.active.as_ref()?;
        match active.track.grab_frame().await {
            Ok(frame) => frame,
            Err(e) => {
                warn!("Frame grab on {} failed: {}", active.device.id, e);
                None
            }
        }
    }

    pub fn is_open(&self) -> bool {
        self.active.is_some()
    }

    pub fn device(&self) -> Option<&CaptureDevice> {
        self.active.as_ref().map(|a| &a.device)
    }

    pub fn mode(&self) -> Option<ScanMode> {
        self.active.as_ref().map(|a| a.mode)
    }

    pub fn settings(&self) -> Option<TrackSettings> {
        self.active.as_ref().map(|a| a.settings)
    }

    pub fn capabilities(&self) -> Option<&CapabilitySet> {
        self.active.as_ref().map(|a| &a.capabilities)
    }

    pub fn torch_enabled(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.torch_on)
    }

    pub fn zoom_level(&self) -> Option<f64> {
        self.active.as_ref().and_then(|a| a.zoom)
    }

    pub fn stats(&self) -> SessionStats {
        self.stats
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.close();
    }
}
