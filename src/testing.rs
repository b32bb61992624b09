//! Synthetic symbol rendering shared by unit tests

use crate::decoder::{
    code39_encoding, FIRST_DIGIT_ENCODINGS, G_PATTERNS, L_PATTERNS,
    NUMSYS_AND_CHECK_DIGIT_PATTERNS,
};
use crate::frame::{FrameData, LumaImage};
use std::io::Cursor;

fn digit(c: char) -> usize {
    c.to_digit(10).expect("digit") as usize
}

/// Append runs of alternating color, starting with `bar`
fn push_widths(modules: &mut Vec<bool>, widths: &[u32], mut bar: bool) {
    for &w in widths {
        modules.extend(std::iter::repeat(bar).take(w as usize));
        bar = !bar;
    }
}

fn guard(modules: &mut Vec<bool>) {
    push_widths(modules, &[1, 1, 1], true);
}

fn middle(modules: &mut Vec<bool>) {
    push_widths(modules, &[1, 1, 1, 1, 1], false);
}

/// Module sequence for a 13-digit EAN-13 (or 0-prefixed UPC-A)
pub fn ean13_modules(code: &str) -> Vec<bool> {
    assert_eq!(code.len(), 13);
    let digits: Vec<usize> = code.chars().map(digit).collect();
    let parity = FIRST_DIGIT_ENCODINGS[digits[0]];

    let mut modules = Vec::with_capacity(95);
    guard(&mut modules);
    for (x, &d) in digits[1..7].iter().enumerate() {
        let widths = if parity & (1 << (5 - x)) != 0 {
            &G_PATTERNS[d]
        } else {
            &L_PATTERNS[d]
        };
        push_widths(&mut modules, widths, false);
    }
    middle(&mut modules);
    for &d in &digits[7..] {
        push_widths(&mut modules, &L_PATTERNS[d], true);
    }
    guard(&mut modules);
    modules
}

pub fn ean8_modules(code: &str) -> Vec<bool> {
    assert_eq!(code.len(), 8);
    let digits: Vec<usize> = code.chars().map(digit).collect();

    let mut modules = Vec::with_capacity(67);
    guard(&mut modules);
    for &d in &digits[..4] {
        push_widths(&mut modules, &L_PATTERNS[d], false);
    }
    middle(&mut modules);
    for &d in &digits[4..] {
        push_widths(&mut modules, &L_PATTERNS[d], true);
    }
    guard(&mut modules);
    modules
}

/// Module sequence for an 8-digit UPC-E (number system, six digits, check)
pub fn upce_modules(code: &str) -> Vec<bool> {
    assert_eq!(code.len(), 8);
    let digits: Vec<usize> = code.chars().map(digit).collect();
    let parity = NUMSYS_AND_CHECK_DIGIT_PATTERNS[digits[0]][digits[7]];

    let mut modules = Vec::with_capacity(51);
    guard(&mut modules);
    for (x, &d) in digits[1..7].iter().enumerate() {
        let widths = if parity & (1 << (5 - x)) != 0 {
            &G_PATTERNS[d]
        } else {
            &L_PATTERNS[d]
        };
        push_widths(&mut modules, widths, false);
    }
    push_widths(&mut modules, &[1, 1, 1, 1, 1, 1], false);
    modules
}

/// Module sequence for Code 39, wide elements three modules wide
pub fn code39_modules(text: &str) -> Vec<bool> {
    let framed = format!("*{}*", text);
    let mut modules = Vec::new();
    for (i, ch) in framed.chars().enumerate() {
        if i > 0 {
            modules.push(false);
        }
        let pattern = code39_encoding(ch).expect("code 39 character");
        let widths: Vec<u32> = (0..9)
            .map(|i| if pattern & (1 << (8 - i)) != 0 { 3 } else { 1 })
            .collect();
        push_widths(&mut modules, &widths, true);
    }
    modules
}

/// Draw a 1-D symbol centered in a white image. Bars span the middle 60%
/// of the height.
pub fn render_linear(modules: &[bool], module_px: u32, width: u32, height: u32) -> LumaImage {
    let symbol_width = modules.len() as u32 * module_px;
    assert!(symbol_width < width, "symbol does not fit");

    let mut image = LumaImage::filled(width, height, 255);
    let x0 = (width - symbol_width) / 2;
    let y0 = height / 5;
    let y1 = height - height / 5;

    for y in y0..y1 {
        for (m, &bar) in modules.iter().enumerate() {
            if !bar {
                continue;
            }
            let start = x0 + m as u32 * module_px;
            for x in start..start + module_px {
                image.data[(y * width + x) as usize] = 0;
            }
        }
    }
    image
}

/// Draw a QR code centered in a white image
pub fn render_qr(text: &str, module_px: u32, width: u32, height: u32) -> LumaImage {
    let code = qrcode::QrCode::new(text.as_bytes()).expect("qr encode");
    let size = code.width() as u32;
    let colors = code.to_colors();
    let symbol_px = size * module_px;
    assert!(symbol_px + 8 * module_px <= width.min(height), "qr does not fit");

    let mut image = LumaImage::filled(width, height, 255);
    let x0 = (width - symbol_px) / 2;
    let y0 = (height - symbol_px) / 2;

    for my in 0..size {
        for mx in 0..size {
            if colors[(my * size + mx) as usize] != qrcode::Color::Dark {
                continue;
            }
            for dy in 0..module_px {
                for dx in 0..module_px {
                    let x = x0 + mx * module_px + dx;
                    let y = y0 + my * module_px + dy;
                    image.data[(y * width + x) as usize] = 0;
                }
            }
        }
    }
    image
}

pub fn frame(id: u64, image: LumaImage) -> FrameData {
    FrameData::from_luma(id, image)
}

pub fn encode_png(image: &LumaImage) -> Vec<u8> {
    let gray = image::GrayImage::from_raw(image.width, image.height, image.data.clone())
        .expect("buffer size");
    let mut bytes = Vec::new();
    image::DynamicImage::ImageLuma8(gray)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .expect("png encode");
    bytes
}

#[test]
fn test_module_counts() {
    assert_eq!(ean13_modules("4006381333931").len(), 95);
    assert_eq!(ean8_modules("96385074").len(), 67);
    assert_eq!(upce_modules("04252614").len(), 51);
    // 9 characters of 15 modules plus 8 gaps
    assert_eq!(code39_modules("CODE-39").len(), 143);
}
