//! Decode engines
//!
//! [`DecodeEngine`] is the tagged choice between a [`ContinuousEngine`] that
//! polls a live [`FrameSource`](crate::camera::FrameSource) and a
//! [`StillImageEngine`] that decodes one frame or image on demand. Both
//! produce at most one [`DecodedResult`] per attempt.

mod continuous;
mod still;
#[cfg(test)]
mod tests;

pub use continuous::{Attachment, ContinuousEngine, MAX_POLL_FPS};
pub use still::StillImageEngine;

use crate::config::EngineConfig;
use crate::decoder::{DecodeHints, DecoderSet};
use crate::events::EventBus;
use crate::mode::{ScanMode, Symbology};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Which engine drives detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Continuous,
    Still,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Continuous => "continuous",
            EngineKind::Still => "still",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "continuous" | "live" => Ok(EngineKind::Continuous),
            "still" | "photo" => Ok(EngineKind::Still),
            other => Err(format!(
                "unknown engine '{}' (expected continuous or still)",
                other
            )),
        }
    }
}

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultSource {
    Live,
    Still,
}

impl fmt::Display for ResultSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResultSource::Live => "live",
            ResultSource::Still => "still",
        })
    }
}

/// A decoded code, produced at most once per attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedResult {
    pub text: String,
    pub format: Symbology,
    pub source: ResultSource,
    pub attempt_id: Uuid,
    pub detected_at: DateTime<Utc>,
}

impl DecodedResult {
    pub fn new(text: String, format: Symbology, source: ResultSource, attempt_id: Uuid) -> Self {
        Self {
            text,
            format,
            source,
            attempt_id,
            detected_at: Utc::now(),
        }
    }
}

/// Configured decode engine
pub enum DecodeEngine {
    Continuous(ContinuousEngine),
    Still(StillImageEngine),
}

impl DecodeEngine {
    pub fn from_config(config: &EngineConfig, event_bus: Option<Arc<EventBus>>) -> Self {
        let decoders = DecoderSet::standard();
        match config.kind {
            EngineKind::Continuous => {
                let mut engine = ContinuousEngine::with_decoders(config.clone(), decoders);
                if let Some(bus) = event_bus {
                    engine = engine.with_event_bus(bus);
                }
                DecodeEngine::Continuous(engine)
            }
            EngineKind::Still => {
                DecodeEngine::Still(StillImageEngine::with_decoders(config.clone(), decoders))
            }
        }
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            DecodeEngine::Continuous(_) => EngineKind::Continuous,
            DecodeEngine::Still(_) => EngineKind::Still,
        }
    }

    pub fn allow_list(&self, mode: ScanMode) -> &'static [Symbology] {
        mode.allow_list()
    }
}

pub(crate) fn hints(config: &EngineConfig) -> DecodeHints {
    DecodeHints {
        try_harder: config.try_harder,
        scan_rows: config.linear_scan_rows,
    }
}
