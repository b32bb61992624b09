use super::*;
use crate::mode::ScanMode;
use crate::testing::{
    code39_modules, ean13_modules, ean8_modules, render_linear, render_qr, upce_modules,
};

fn hints() -> DecodeHints {
    DecodeHints::default()
}

fn decode(image: &LumaImage, mode: ScanMode) -> Option<Decoded> {
    DecoderSet::standard().decode(image, mode.allow_list(), &hints())
}

#[test]
fn test_decodes_ean13() {
    let image = render_linear(&ean13_modules("4006381333931"), 3, 640, 240);
    let hit = decode(&image, ScanMode::BarcodeEan).unwrap();
    assert_eq!(hit.text, "4006381333931");
    assert_eq!(hit.symbology, Symbology::Ean13);
}

#[test]
fn test_leading_zero_is_reported_as_upc_a() {
    let image = render_linear(&ean13_modules("0036000291452"), 3, 640, 240);
    let hit = decode(&image, ScanMode::BarcodeEan).unwrap();
    assert_eq!(hit.text, "036000291452");
    assert_eq!(hit.symbology, Symbology::UpcA);
}

#[test]
fn test_decodes_ean8() {
    let image = render_linear(&ean8_modules("96385074"), 3, 480, 200);
    let hit = decode(&image, ScanMode::BarcodeEan).unwrap();
    assert_eq!(hit.text, "96385074");
    assert_eq!(hit.symbology, Symbology::Ean8);
}

#[test]
fn test_decodes_upce() {
    let image = render_linear(&upce_modules("04252614"), 3, 480, 200);
    let hit = decode(&image, ScanMode::BarcodeEan).unwrap();
    assert_eq!(hit.text, "04252614");
    assert_eq!(hit.symbology, Symbology::UpcE);
}

#[test]
fn test_decodes_code39_only_when_allowed() {
    let image = render_linear(&code39_modules("CODE-39"), 2, 480, 200);
    assert!(decode(&image, ScanMode::BarcodeEan).is_none());

    let hit = decode(&image, ScanMode::BarcodeAll).unwrap();
    assert_eq!(hit.text, "CODE-39");
    assert_eq!(hit.symbology, Symbology::Code39);
}

#[test]
fn test_decodes_upside_down_symbols() {
    let mut modules = ean13_modules("4006381333931");
    modules.reverse();
    let image = render_linear(&modules, 3, 640, 240);
    let hit = decode(&image, ScanMode::BarcodeEan).unwrap();
    assert_eq!(hit.text, "4006381333931");
}

#[test]
fn test_decodes_qr() {
    let image = render_qr("https://example.com/item/42", 6, 480, 480);
    let hit = decode(&image, ScanMode::QrCode).unwrap();
    assert_eq!(hit.text, "https://example.com/item/42");
    assert_eq!(hit.symbology, Symbology::QrCode);
}

#[test]
fn test_mode_isolation() {
    let qr = render_qr("hello", 6, 400, 400);
    assert!(decode(&qr, ScanMode::BarcodeEan).is_none());

    let ean = render_linear(&ean13_modules("4006381333931"), 3, 640, 240);
    assert!(decode(&ean, ScanMode::QrCode).is_none());
}

#[test]
fn test_corrupted_checksum_is_rejected() {
    let image = render_linear(&ean13_modules("4006381333932"), 3, 640, 240);
    assert!(decode(&image, ScanMode::BarcodeEan).is_none());
}

#[test]
fn test_blank_and_empty_images() {
    assert!(decode(&LumaImage::filled(320, 240, 255), ScanMode::BarcodeAll).is_none());
    assert!(decode(&LumaImage::filled(0, 0, 0), ScanMode::BarcodeAll).is_none());
}

#[test]
fn test_rotated_symbol_needs_try_harder() {
    let upright = render_linear(&ean13_modules("4006381333931"), 3, 640, 400);
    // rotate counter-clockwise so one clockwise turn restores it
    let rotated = upright.rotate90().rotate90().rotate90();
    let set = DecoderSet::standard();

    let lazy = set.scan(&rotated, None, ScanMode::BarcodeEan.allow_list(), &hints());
    assert!(lazy.is_none());

    let eager = DecodeHints {
        try_harder: true,
        ..hints()
    };
    let hit = set
        .scan(&rotated, None, ScanMode::BarcodeEan.allow_list(), &eager)
        .unwrap();
    assert_eq!(hit.text, "4006381333931");
}

#[test]
fn test_scan_crops_to_region() {
    let image = render_linear(&ean13_modules("4006381333931"), 3, 640, 240);
    let set = DecoderSet::standard();
    let allow = ScanMode::BarcodeEan.allow_list();

    let centered = Region::centered(ScanMode::BarcodeEan.profile().roi, 640, 240);
    assert!(set.scan(&image, Some(centered), allow, &hints()).is_some());

    // a region beside the symbol misses unless the full frame is retried
    let corner = Region {
        x: 0,
        y: 0,
        width: 100,
        height: 40,
    };
    assert!(set.scan(&image, Some(corner), allow, &hints()).is_none());
    let eager = DecodeHints {
        try_harder: true,
        ..hints()
    };
    assert!(set.scan(&image, Some(corner), allow, &eager).is_some());
}

#[test]
fn test_qr_retried_on_full_frame_outside_region() {
    let image = render_qr("ROOM-42", 12, 640, 480);
    let set = DecoderSet::standard();
    let allow = ScanMode::BarcodeAll.allow_list();
    let strip = Region::centered(ScanMode::BarcodeAll.profile().roi, 640, 480);

    let hit = set.scan(&image, Some(strip), allow, &hints()).unwrap();
    assert_eq!(hit.text, "ROOM-42");
    assert_eq!(hit.symbology, Symbology::QrCode);
}

struct AlwaysQr;

impl SymbolDecoder for AlwaysQr {
    fn name(&self) -> &'static str {
        "always-qr"
    }

    fn handles(&self, _symbology: Symbology) -> bool {
        true
    }

    fn decode(&self, _: &LumaImage, _: &[Symbology], _: &DecodeHints) -> Option<Decoded> {
        Some(Decoded {
            text: "sneaky".to_string(),
            symbology: Symbology::QrCode,
        })
    }
}

#[test]
fn test_results_outside_allow_list_are_discarded() {
    let set = DecoderSet::with_decoders(vec![Arc::new(AlwaysQr)]);
    let image = LumaImage::filled(10, 10, 255);
    assert!(set
        .decode(&image, ScanMode::BarcodeEan.allow_list(), &hints())
        .is_none());
    assert!(set
        .decode(&image, ScanMode::QrCode.allow_list(), &hints())
        .is_some());
}
