use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Barcode encoding standards recognised by the decoders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "QR_CODE")]
    QrCode,
    #[serde(rename = "EAN_13")]
    Ean13,
    #[serde(rename = "EAN_8")]
    Ean8,
    #[serde(rename = "UPC_A")]
    UpcA,
    #[serde(rename = "UPC_E")]
    UpcE,
    #[serde(rename = "CODE_39")]
    Code39,
}

impl Symbology {
    /// Tag used on the wire and in the UI
    pub fn tag(&self) -> &'static str {
        match self {
            Symbology::QrCode => "QR_CODE",
            Symbology::Ean13 => "EAN_13",
            Symbology::Ean8 => "EAN_8",
            Symbology::UpcA => "UPC_A",
            Symbology::UpcE => "UPC_E",
            Symbology::Code39 => "CODE_39",
        }
    }

    pub fn is_linear(&self) -> bool {
        !matches!(self, Symbology::QrCode)
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

const QR_ONLY: &[Symbology] = &[Symbology::QrCode];
const EAN_FAMILY: &[Symbology] = &[
    Symbology::Ean13,
    Symbology::Ean8,
    Symbology::UpcA,
    Symbology::UpcE,
];
const EVERYTHING: &[Symbology] = &[
    Symbology::Ean13,
    Symbology::Ean8,
    Symbology::UpcA,
    Symbology::UpcE,
    Symbology::Code39,
    Symbology::QrCode,
];

/// Geometric shape of the region searched for a symbol
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RoiShape {
    /// Centered square whose side is a fraction of the shorter frame side
    Square { side_fraction: f32 },
    /// Centered rectangle sized as fractions of the frame
    Wide {
        width_fraction: f32,
        height_fraction: f32,
    },
}

/// Mode-derived capture and decode targets
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeProfile {
    pub target_fps: u32,
    pub ideal_resolution: (u32, u32),
    pub min_resolution: (u32, u32),
    pub roi: RoiShape,
}

/// Which symbologies a session accepts. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScanMode {
    #[serde(rename = "qrcode")]
    QrCode,
    BarcodeEan,
    BarcodeAll,
}

impl ScanMode {
    pub fn allow_list(&self) -> &'static [Symbology] {
        match self {
            ScanMode::QrCode => QR_ONLY,
            ScanMode::BarcodeEan => EAN_FAMILY,
            ScanMode::BarcodeAll => EVERYTHING,
        }
    }

    pub fn allows(&self, symbology: Symbology) -> bool {
        self.allow_list().contains(&symbology)
    }

    pub fn profile(&self) -> ModeProfile {
        match self {
            ScanMode::QrCode => ModeProfile {
                target_fps: 10,
                ideal_resolution: (1280, 720),
                min_resolution: (640, 480),
                roi: RoiShape::Square { side_fraction: 0.7 },
            },
            ScanMode::BarcodeEan | ScanMode::BarcodeAll => ModeProfile {
                target_fps: 30,
                ideal_resolution: (1920, 1080),
                min_resolution: (1280, 720),
                roi: RoiShape::Wide {
                    width_fraction: 0.8,
                    height_fraction: 0.4,
                },
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScanMode::QrCode => "qrcode",
            ScanMode::BarcodeEan => "barcode-ean",
            ScanMode::BarcodeAll => "barcode-all",
        }
    }
}

impl fmt::Display for ScanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qrcode" | "qr" => Ok(ScanMode::QrCode),
            "barcode-ean" | "ean" => Ok(ScanMode::BarcodeEan),
            "barcode-all" | "all" => Ok(ScanMode::BarcodeAll),
            other => Err(format!(
                "unknown scan mode '{}' (expected qrcode, barcode-ean or barcode-all)",
                other
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allow_lists_are_disjoint_between_qr_and_ean() {
        for symbology in ScanMode::QrCode.allow_list() {
            assert!(!ScanMode::BarcodeEan.allows(*symbology));
        }
        assert!(ScanMode::BarcodeAll.allows(Symbology::QrCode));
        assert!(ScanMode::BarcodeAll.allows(Symbology::Code39));
        assert!(!ScanMode::BarcodeEan.allows(Symbology::Code39));
    }

    #[test]
    fn test_profiles() {
        let qr = ScanMode::QrCode.profile();
        assert_eq!(qr.target_fps, 10);
        assert!(matches!(qr.roi, RoiShape::Square { .. }));

        let ean = ScanMode::BarcodeEan.profile();
        assert_eq!(ean.target_fps, 30);
        assert_eq!(ean.min_resolution, (1280, 720));
        assert!(matches!(ean.roi, RoiShape::Wide { .. }));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("qrcode".parse::<ScanMode>().unwrap(), ScanMode::QrCode);
        assert_eq!("Barcode-EAN".parse::<ScanMode>().unwrap(), ScanMode::BarcodeEan);
        assert_eq!("barcode-all".parse::<ScanMode>().unwrap(), ScanMode::BarcodeAll);
        assert!("datamatrix".parse::<ScanMode>().is_err());
    }

    #[test]
    fn test_serde_tags() {
        assert_eq!(serde_json::to_string(&Symbology::Ean13).unwrap(), "\"EAN_13\"");
        assert_eq!(
            serde_json::to_string(&ScanMode::BarcodeEan).unwrap(),
            "\"barcode-ean\""
        );
        assert_eq!(serde_json::to_string(&ScanMode::QrCode).unwrap(), "\"qrcode\"");
    }
}
