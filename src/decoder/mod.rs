//! Symbol decoders
//!
//! A [`SymbolDecoder`] finds one symbol of an allowed symbology in a
//! grayscale image. [`DecoderSet`] chains decoders and applies the scan
//! strategy shared by both engines: the region of interest first, then the
//! extra passes enabled by `try_harder`.

mod code39;
mod linear;
mod qr;
mod upc_ean;
#[cfg(test)]
mod tests;

pub use linear::LinearDecoder;
pub use qr::QrDecoder;

#[cfg(test)]
pub(crate) use code39::code39_encoding;
#[cfg(test)]
pub(crate) use upc_ean::{
    FIRST_DIGIT_ENCODINGS, G_PATTERNS, L_PATTERNS, NUMSYS_AND_CHECK_DIGIT_PATTERNS,
};

use crate::frame::{LumaImage, Region};
use crate::mode::Symbology;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeHints {
    pub try_harder: bool,
    /// Rows sampled by 1-D decoders
    pub scan_rows: usize,
}

impl Default for DecodeHints {
    fn default() -> Self {
        Self {
            try_harder: false,
            scan_rows: 15,
        }
    }
}

/// A decoded symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoded {
    pub text: String,
    pub symbology: Symbology,
}

pub trait SymbolDecoder: Send + Sync {
    fn name(&self) -> &'static str;

    /// Whether this decoder can produce the symbology at all
    fn handles(&self, symbology: Symbology) -> bool;

    fn decode(&self, image: &LumaImage, allow: &[Symbology], hints: &DecodeHints)
        -> Option<Decoded>;
}

#[derive(Clone)]
pub struct DecoderSet {
    decoders: Vec<Arc<dyn SymbolDecoder>>,
}

impl DecoderSet {
    /// 1-D scan-line decoder followed by QR
    pub fn standard() -> Self {
        Self::with_decoders(vec![Arc::new(LinearDecoder), Arc::new(QrDecoder)])
    }

    pub fn with_decoders(decoders: Vec<Arc<dyn SymbolDecoder>>) -> Self {
        Self { decoders }
    }

    /// First hit of an allowed symbology in the image
    pub fn decode(
        &self,
        image: &LumaImage,
        allow: &[Symbology],
        hints: &DecodeHints,
    ) -> Option<Decoded> {
        if image.width == 0 || image.height == 0 {
            return None;
        }

        for decoder in &self.decoders {
            if !allow.iter().any(|s| decoder.handles(*s)) {
                continue;
            }
            if let Some(hit) = decoder.decode(image, allow, hints) {
                if allow.contains(&hit.symbology) {
                    trace!("{} decoded {} symbol", decoder.name(), hit.symbology);
                    return Some(hit);
                }
                debug!(
                    "{} returned {} outside the allow-list; discarded",
                    decoder.name(),
                    hit.symbology
                );
            }
        }
        None
    }

    /// Region of interest first, then QR on the full image. With
    /// `try_harder` every allowed symbology is retried on the full image and
    /// on a rotated copy for vertical 1-D symbols.
    pub fn scan(
        &self,
        image: &LumaImage,
        roi: Option<Region>,
        allow: &[Symbology],
        hints: &DecodeHints,
    ) -> Option<Decoded> {
        let primary = match roi {
            Some(region) if region != Region::full(image.width, image.height) => {
                Cow::Owned(image.crop(region))
            }
            _ => Cow::Borrowed(image),
        };

        if let Some(hit) = self.decode(&primary, allow, hints) {
            return Some(hit);
        }

        if matches!(primary, Cow::Owned(_)) {
            if hints.try_harder {
                if let Some(hit) = self.decode(image, allow, hints) {
                    return Some(hit);
                }
            } else if allow.contains(&Symbology::QrCode) {
                // 2-D symbols may overflow a strip-shaped region
                if let Some(hit) = self.decode(image, &[Symbology::QrCode], hints) {
                    return Some(hit);
                }
            }
        }

        if !hints.try_harder {
            return None;
        }

        if allow.iter().any(|s| s.is_linear()) {
            let linear_only: Vec<Symbology> =
                allow.iter().copied().filter(|s| s.is_linear()).collect();
            return self.decode(&primary.rotate90(), &linear_only, hints);
        }

        None
    }
}
