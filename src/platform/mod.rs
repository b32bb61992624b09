//! Host media API seam
//!
//! Everything the scanning core needs from the host: device enumeration,
//! constrained stream acquisition, the per-track capability descriptor,
//! constraint application and frame grabbing. Raw failures are reported as
//! [`PlatformError`] and classified into the crate taxonomy at the
//! session/catalog boundary.

mod mock;

#[cfg(all(target_os = "linux", feature = "camera"))]
mod gstreamer;

pub use mock::{MockDevice, MockPlatform};

#[cfg(all(target_os = "linux", feature = "camera"))]
pub use self::gstreamer::GstPlatform;

use crate::devices::Facing;
use crate::error::{CameraError, ErrorKind};
use crate::frame::FrameData;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Raw device entry as reported by the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub label: String,
}

/// Requested stream shape. `min_*` are hard floors; everything else is ideal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConstraints {
    pub device_id: String,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub min_width: Option<u32>,
    pub min_height: Option<u32>,
    pub ideal_fps: u32,
    pub facing: Facing,
    pub continuous_focus: bool,
    pub continuous_exposure: bool,
    pub continuous_white_balance: bool,
}

impl StreamConstraints {
    /// Copy without resolution floors
    pub fn relaxed(&self) -> Self {
        Self {
            min_width: None,
            min_height: None,
            ..self.clone()
        }
    }
}

/// Values actually negotiated for an open track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

/// Zoom range as reported by hardware
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomDescriptor {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

/// Raw capability descriptor of a track. Absent fields mean unsupported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackCapabilities {
    pub zoom: Option<ZoomDescriptor>,
    pub torch: Option<bool>,
    pub focus_mode: Vec<String>,
}

/// Single constraint applied to a live track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AdvancedConstraint {
    Zoom(f64),
    Torch(bool),
    FocusMode(String),
}

/// Failure reported by the host media API, identified by the host's error name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name}: {message}")]
pub struct PlatformError {
    pub name: String,
    pub message: String,
}

impl PlatformError {
    pub fn new<N: Into<String>, M: Into<String>>(name: N, message: M) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
        }
    }

    pub fn not_allowed<M: Into<String>>(message: M) -> Self {
        Self::new("NotAllowedError", message)
    }

    pub fn not_found<M: Into<String>>(message: M) -> Self {
        Self::new("NotFoundError", message)
    }

    pub fn not_readable<M: Into<String>>(message: M) -> Self {
        Self::new("NotReadableError", message)
    }

    pub fn overconstrained<M: Into<String>>(message: M) -> Self {
        Self::new("OverconstrainedError", message)
    }

    pub fn invalid_state<M: Into<String>>(message: M) -> Self {
        Self::new("InvalidStateError", message)
    }

    /// Map the host error name onto the fixed taxonomy
    pub fn classify(&self) -> ErrorKind {
        match self.name.as_str() {
            "NotAllowedError" | "PermissionDeniedError" | "SecurityError" => {
                ErrorKind::PermissionDenied
            }
            "NotFoundError" | "DevicesNotFoundError" => ErrorKind::NoDeviceFound,
            "OverconstrainedError" | "ConstraintNotSatisfiedError" => {
                ErrorKind::ConstraintsNotSatisfiable
            }
            "NotReadableError" | "TrackStartError" | "AbortError" => ErrorKind::StreamUnavailable,
            _ if self.message.contains("Permission") => ErrorKind::PermissionDenied,
            _ => ErrorKind::StreamUnavailable,
        }
    }

    pub fn into_camera_error(self, device: &str) -> CameraError {
        match self.classify() {
            ErrorKind::PermissionDenied => CameraError::PermissionDenied {
                details: self.to_string(),
            },
            ErrorKind::NoDeviceFound => CameraError::NoDeviceFound,
            ErrorKind::ConstraintsNotSatisfiable => CameraError::ConstraintsNotSatisfiable {
                device: device.to_string(),
                details: self.to_string(),
            },
            _ => CameraError::StreamUnavailable {
                device: device.to_string(),
                details: self.to_string(),
            },
        }
    }
}

/// Host media API
#[async_trait]
pub trait MediaPlatform: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// List video input devices. Implicitly requests camera permission.
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, PlatformError>;

    /// Acquire a live video track satisfying the constraints
    async fn open_stream(
        &self,
        constraints: &StreamConstraints,
    ) -> Result<Arc<dyn VideoTrack>, PlatformError>;
}

/// One live video track
#[async_trait]
pub trait VideoTrack: Send + Sync {
    fn device_id(&self) -> &str;

    fn settings(&self) -> TrackSettings;

    fn capabilities(&self) -> TrackCapabilities;

    async fn apply_constraints(&self, constraints: &[AdvancedConstraint])
        -> Result<(), PlatformError>;

    /// Latest frame, or None when no new frame is ready yet
    async fn grab_frame(&self) -> Result<Option<FrameData>, PlatformError>;

    /// Stop the track and release the device. Idempotent.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_error_classification() {
        assert_eq!(
            PlatformError::not_allowed("denied").classify(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            PlatformError::new("PermissionDeniedError", "x").classify(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            PlatformError::new("DevicesNotFoundError", "x").classify(),
            ErrorKind::NoDeviceFound
        );
        assert_eq!(
            PlatformError::new("TrackStartError", "x").classify(),
            ErrorKind::StreamUnavailable
        );
        assert_eq!(
            PlatformError::new("ConstraintNotSatisfiedError", "x").classify(),
            ErrorKind::ConstraintsNotSatisfiable
        );
        assert_eq!(
            PlatformError::new("WeirdVendorError", "Permission was revoked").classify(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            PlatformError::new("WeirdVendorError", "kaboom").classify(),
            ErrorKind::StreamUnavailable
        );
    }

    #[test]
    fn test_into_camera_error() {
        let err = PlatformError::not_readable("in use").into_camera_error("cam1");
        assert_eq!(
            err,
            CameraError::StreamUnavailable {
                device: "cam1".to_string(),
                details: "NotReadableError: in use".to_string(),
            }
        );
        assert_eq!(
            PlatformError::not_found("none").into_camera_error("cam1"),
            CameraError::NoDeviceFound
        );
    }

    #[test]
    fn test_relaxed_constraints_drop_floors() {
        let constraints = StreamConstraints {
            device_id: "cam".to_string(),
            ideal_width: 1920,
            ideal_height: 1080,
            min_width: Some(1280),
            min_height: Some(720),
            ideal_fps: 30,
            facing: Facing::Back,
            continuous_focus: true,
            continuous_exposure: true,
            continuous_white_balance: true,
        };
        let relaxed = constraints.relaxed();
        assert_eq!(relaxed.min_width, None);
        assert_eq!(relaxed.min_height, None);
        assert_eq!(relaxed.ideal_width, 1920);
        assert_eq!(relaxed.device_id, "cam");
    }
}
