use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("Camera error: {0}")]
    Camera(#[from] CameraError),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Capability error: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Event bus error: {0}")]
    EventBus(#[from] EventBusError),

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error("System error: {message}")]
    System { message: String },
}

impl ScanError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn invalid_transition(action: &'static str, state: &'static str) -> Self {
        Self::InvalidTransition { action, state }
    }

    /// Taxonomy kind for errors that originate at the camera, decode or
    /// capability boundary.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ScanError::Camera(e) => Some(e.kind()),
            ScanError::Decode(e) => e.kind(),
            ScanError::Capability(e) => Some(e.kind()),
            _ => None,
        }
    }
}

/// Camera and device errors, already classified from raw platform failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied: {details}")]
    PermissionDenied { details: String },

    #[error("No capture device found")]
    NoDeviceFound,

    #[error("Stream unavailable on device {device}: {details}")]
    StreamUnavailable { device: String, details: String },

    #[error("Constraints not satisfiable on device {device}: {details}")]
    ConstraintsNotSatisfiable { device: String, details: String },
}

impl CameraError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CameraError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            CameraError::NoDeviceFound => ErrorKind::NoDeviceFound,
            CameraError::StreamUnavailable { .. } => ErrorKind::StreamUnavailable,
            CameraError::ConstraintsNotSatisfiable { .. } => ErrorKind::ConstraintsNotSatisfiable,
        }
    }
}

/// Still-image and engine decode errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No code of an allowed symbology found")]
    NoCodeFound,

    #[error("Failed to decode image: {details}")]
    Image { details: String },

    #[error("Decode task failed: {details}")]
    Task { details: String },
}

impl DecodeError {
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            DecodeError::NoCodeFound => Some(ErrorKind::NoCodeFound),
            _ => None,
        }
    }
}

/// Non-fatal capability negotiation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CapabilityError {
    #[error("Zoom is not supported by the active camera")]
    ZoomUnsupported,

    #[error("Torch is not supported by the active camera")]
    TorchUnsupported,

    #[error("No capture session is open")]
    SessionNotOpen,

    #[error("Camera rejected zoom constraint: {details}")]
    ZoomRejected { details: String },

    #[error("Camera rejected torch constraint: {details}")]
    TorchRejected { details: String },
}

impl CapabilityError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CapabilityError::ZoomUnsupported | CapabilityError::ZoomRejected { .. } => {
                ErrorKind::ZoomUnsupported
            }
            CapabilityError::TorchUnsupported | CapabilityError::TorchRejected { .. } => {
                ErrorKind::TorchUnsupported
            }
            CapabilityError::SessionNotOpen => ErrorKind::SessionNotOpen,
        }
    }
}

#[derive(Error, Debug)]
pub enum EventBusError {
    #[error("Failed to publish event: {details}")]
    PublishFailed { details: String },

    #[error("Event bus channel closed")]
    ChannelClosed,
}

/// Fixed error taxonomy surfaced to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    PermissionDenied,
    NoDeviceFound,
    StreamUnavailable,
    ConstraintsNotSatisfiable,
    NoCodeFound,
    ZoomUnsupported,
    TorchUnsupported,
    SessionNotOpen,
    ReportFailed,
}

impl ErrorKind {
    /// User-facing message for this kind. Never includes platform detail.
    pub fn user_message(&self) -> &'static str {
        match self {
            ErrorKind::PermissionDenied => {
                "Camera permission denied. Allow camera access in your system or browser settings."
            }
            ErrorKind::NoDeviceFound => "No camera was found on this device.",
            ErrorKind::StreamUnavailable => {
                "The camera is being used by another application. Try again."
            }
            ErrorKind::ConstraintsNotSatisfiable => {
                "The camera does not support the requested resolution."
            }
            ErrorKind::NoCodeFound => {
                "No barcode found in the image. Try another photo with better lighting and focus."
            }
            ErrorKind::ZoomUnsupported => "Zoom is not available on this camera.",
            ErrorKind::TorchUnsupported => "This device does not support a flashlight.",
            ErrorKind::SessionNotOpen => "The camera is not active.",
            ErrorKind::ReportFailed => "Could not connect to the server.",
        }
    }

    /// Whether the UI should show an alert for this kind
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, ErrorKind::SessionNotOpen)
    }

    /// Whether the current attempt can continue after this kind
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ErrorKind::NoCodeFound
                | ErrorKind::ZoomUnsupported
                | ErrorKind::TorchUnsupported
                | ErrorKind::SessionNotOpen
                | ErrorKind::StreamUnavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, ScanError>;
