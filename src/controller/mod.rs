//! Scan session state machine
//!
//! [`ScanSessionController`] is the only component the UI talks to. It owns
//! the device catalog, the capture session and the decode engine, and moves
//! through [`ScanState`]:
//!
//! ```text
//! Idle -> RequestingPermission -> Scanning -> Detected -> Reporting -> Detected(outcome)
//!               |                    |                      |
//!               +------> Error <-----+----------------------+
//! ```
//!
//! Transitions are serialized by a lock; capability actions (torch, zoom)
//! never wait for it.

mod actions;
mod lifecycle;
mod machine;
mod state;

pub use machine::ScanSessionController;
pub use state::ScanState;
