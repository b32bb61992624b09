use super::{hints, DecodedResult, ResultSource};
use crate::config::EngineConfig;
use crate::decoder::{Decoded, DecoderSet};
use crate::error::DecodeError;
use crate::frame::{FrameData, LumaImage};
use crate::mode::ScanMode;
use tracing::{debug, info};
use uuid::Uuid;

/// One-shot decoding of a single frame or image file
pub struct StillImageEngine {
    config: EngineConfig,
    decoders: DecoderSet,
}

impl StillImageEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self::with_decoders(config, DecoderSet::standard())
    }

    pub fn with_decoders(config: EngineConfig, decoders: DecoderSet) -> Self {
        Self { config, decoders }
    }

    /// Decode a frame grabbed from a live session
    pub async fn decode_frame(
        &self,
        frame: FrameData,
        mode: ScanMode,
        attempt_id: Uuid,
    ) -> Result<DecodedResult, DecodeError> {
        let decoders = self.decoders.clone();
        let hints = hints(&self.config);

        let hit = tokio::task::spawn_blocking(move || -> Result<Option<Decoded>, DecodeError> {
            let luma = frame.to_luma().ok_or_else(|| DecodeError::Image {
                details: format!(
                    "frame {} buffer too short for {}x{}",
                    frame.id, frame.width, frame.height
                ),
            })?;
            Ok(decoders.scan(&luma, None, mode.allow_list(), &hints))
        })
        .await
        .map_err(|e| DecodeError::Task {
            details: e.to_string(),
        })??;

        finish(hit, mode, attempt_id)
    }

    /// Decode encoded image bytes (PNG, JPEG, BMP, GIF)
    pub async fn decode_image(
        &self,
        bytes: Vec<u8>,
        mode: ScanMode,
        attempt_id: Uuid,
    ) -> Result<DecodedResult, DecodeError> {
        debug!("Decoding {} byte image for {}", bytes.len(), mode);
        let decoders = self.decoders.clone();
        let hints = hints(&self.config);

        let hit = tokio::task::spawn_blocking(move || -> Result<Option<Decoded>, DecodeError> {
            let image = image::load_from_memory(&bytes).map_err(|e| DecodeError::Image {
                details: e.to_string(),
            })?;
            let luma = LumaImage::from_dynamic(&image);
            Ok(decoders.scan(&luma, None, mode.allow_list(), &hints))
        })
        .await
        .map_err(|e| DecodeError::Task {
            details: e.to_string(),
        })??;

        finish(hit, mode, attempt_id)
    }
}

fn finish(
    hit: Option<Decoded>,
    mode: ScanMode,
    attempt_id: Uuid,
) -> Result<DecodedResult, DecodeError> {
    match hit {
        Some(hit) => {
            info!("Still image decoded as {}", hit.symbology);
            Ok(DecodedResult::new(
                hit.text,
                hit.symbology,
                ResultSource::Still,
                attempt_id,
            ))
        }
        None => {
            debug!("No {} symbol in still image", mode);
            Err(DecodeError::NoCodeFound)
        }
    }
}
