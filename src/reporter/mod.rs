//! Forwarding of decoded codes to the backend

mod http;
#[cfg(test)]
mod tests;

pub use http::HttpReporter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Terminal outcome of one reported code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub success: bool,
    pub message: String,
}

impl ScanOutcome {
    pub fn success<S: Into<String>>(message: S) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    pub fn failure<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

/// Sends one decoded code to the backend. Called once per detection and
/// never retried; failures are folded into the outcome.
#[async_trait]
pub trait ResultReporter: Send + Sync {
    async fn report(&self, code: &str) -> ScanOutcome;
}
