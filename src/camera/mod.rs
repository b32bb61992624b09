mod capabilities;
mod constraints;
mod session;

pub use capabilities::{CapabilitySet, FocusMode, ZoomRange};
pub use constraints::constraints_for;
pub use session::{CaptureSession, FrameSource, SessionStats};
