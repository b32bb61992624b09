use super::{DecodeHints, Decoded, SymbolDecoder};
use crate::frame::LumaImage;
use crate::mode::Symbology;
use tracing::debug;

/// QR detection and decoding through rqrr
pub struct QrDecoder;

impl SymbolDecoder for QrDecoder {
    fn name(&self) -> &'static str {
        "qr"
    }

    fn handles(&self, symbology: Symbology) -> bool {
        symbology == Symbology::QrCode
    }

    fn decode(
        &self,
        image: &LumaImage,
        allow: &[Symbology],
        _hints: &DecodeHints,
    ) -> Option<Decoded> {
        if !allow.contains(&Symbology::QrCode) {
            return None;
        }

        let width = image.width as usize;
        let height = image.height as usize;
        let mut prepared =
            rqrr::PreparedImage::prepare_from_greyscale(width, height, |x, y| {
                image.data[y * width + x]
            });

        for grid in prepared.detect_grids() {
            match grid.decode() {
                Ok((_meta, content)) => {
                    return Some(Decoded {
                        text: content,
                        symbology: Symbology::QrCode,
                    })
                }
                Err(e) => debug!("QR grid found but not decodable: {:?}", e),
            }
        }
        None
    }
}
