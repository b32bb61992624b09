pub mod camera;
pub mod config;
pub mod controller;
pub mod decoder;
pub mod devices;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame;
pub mod mode;
pub mod platform;
pub mod reporter;

#[cfg(test)]
pub(crate) mod testing;

pub use camera::{CapabilitySet, CaptureSession, FocusMode, FrameSource, ZoomRange};
pub use config::ScannerConfig;
pub use controller::{ScanSessionController, ScanState};
pub use decoder::{DecodeHints, Decoded, DecoderSet, SymbolDecoder};
pub use devices::{CaptureDevice, DeviceCatalog, Facing};
pub use engine::{
    Attachment, ContinuousEngine, DecodeEngine, DecodedResult, EngineKind, ResultSource,
    StillImageEngine,
};
pub use error::{
    CameraError, CapabilityError, DecodeError, ErrorKind, EventBusError, Result, ScanError,
};
pub use events::{EventBus, EventFilter, EventReceiver, ScanEvent};
pub use frame::{FrameData, FrameFormat, LumaImage, Region};
pub use mode::{ScanMode, Symbology};
pub use platform::{MediaPlatform, MockDevice, MockPlatform, PlatformError, VideoTrack};
pub use reporter::{HttpReporter, ResultReporter, ScanOutcome};

#[cfg(all(target_os = "linux", feature = "camera"))]
pub use platform::GstPlatform;
