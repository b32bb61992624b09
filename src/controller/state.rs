use crate::camera::CapabilitySet;
use crate::devices::CaptureDevice;
use crate::engine::DecodedResult;
use crate::error::ErrorKind;
use crate::mode::ScanMode;
use crate::reporter::ScanOutcome;

/// Observable state of a scanning session
#[derive(Debug, Clone, Default)]
pub enum ScanState {
    #[default]
    Idle,
    /// Enumerating devices and opening the stream
    RequestingPermission { mode: ScanMode },
    /// Stream open and an engine attached
    Scanning {
        mode: ScanMode,
        device: CaptureDevice,
        capabilities: CapabilitySet,
        torch_on: bool,
        zoom: Option<f64>,
    },
    /// A code was found. `outcome` is filled once the backend has answered.
    Detected {
        result: DecodedResult,
        outcome: Option<ScanOutcome>,
    },
    Reporting { result: DecodedResult },
    Error { kind: ErrorKind, message: String },
}

impl ScanState {
    pub fn name(&self) -> &'static str {
        match self {
            ScanState::Idle => "idle",
            ScanState::RequestingPermission { .. } => "requesting permission",
            ScanState::Scanning { .. } => "scanning",
            ScanState::Detected { .. } => "detected",
            ScanState::Reporting { .. } => "reporting",
            ScanState::Error { .. } => "error",
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, ScanState::Idle)
    }

    pub fn is_scanning(&self) -> bool {
        matches!(self, ScanState::Scanning { .. })
    }

    /// Mode of the live attempt, if any
    pub fn mode(&self) -> Option<ScanMode> {
        match self {
            ScanState::RequestingPermission { mode } | ScanState::Scanning { mode, .. } => {
                Some(*mode)
            }
            _ => None,
        }
    }

    pub fn result(&self) -> Option<&DecodedResult> {
        match self {
            ScanState::Detected { result, .. } | ScanState::Reporting { result } => Some(result),
            _ => None,
        }
    }

    pub fn outcome(&self) -> Option<&ScanOutcome> {
        match self {
            ScanState::Detected { outcome, .. } => outcome.as_ref(),
            _ => None,
        }
    }
}
