use super::linear::{pattern_variance, Runs, MAX_AVG_VARIANCE, MAX_INDIVIDUAL_VARIANCE};
use super::Decoded;
use crate::mode::Symbology;

pub(crate) const FAMILY: &[Symbology] = &[
    Symbology::Ean13,
    Symbology::Ean8,
    Symbology::UpcA,
    Symbology::UpcE,
];

const GUARD: [u32; 3] = [1, 1, 1];
const MIDDLE_GUARD: [u32; 5] = [1, 1, 1, 1, 1];
const UPCE_END_GUARD: [u32; 6] = [1, 1, 1, 1, 1, 1];

/// Odd-parity digit widths (space, bar, space, bar). Right-hand digits use
/// the same widths starting with a bar.
pub(crate) const L_PATTERNS: [[u32; 4]; 10] = [
    [3, 2, 1, 1],
    [2, 2, 2, 1],
    [2, 1, 2, 2],
    [1, 4, 1, 1],
    [1, 1, 3, 2],
    [1, 2, 3, 1],
    [1, 1, 1, 4],
    [1, 3, 1, 2],
    [1, 2, 1, 3],
    [3, 1, 1, 2],
];

/// Even-parity digit widths, the L widths mirrored
pub(crate) const G_PATTERNS: [[u32; 4]; 10] = [
    [1, 1, 2, 3],
    [1, 2, 2, 2],
    [2, 2, 1, 2],
    [1, 1, 4, 1],
    [2, 3, 1, 1],
    [1, 3, 2, 1],
    [4, 1, 1, 1],
    [2, 1, 3, 1],
    [3, 1, 2, 1],
    [2, 1, 1, 3],
];

/// L/G parity of the six left digits of EAN-13, indexed by the implied first digit
pub(crate) const FIRST_DIGIT_ENCODINGS: [u8; 10] =
    [0x00, 0x0B, 0x0D, 0x0E, 0x13, 0x19, 0x1C, 0x15, 0x16, 0x1A];

/// UPC-E parity indexed by number system, then check digit
pub(crate) const NUMSYS_AND_CHECK_DIGIT_PATTERNS: [[u8; 10]; 2] = [
    [0x38, 0x34, 0x32, 0x31, 0x2C, 0x26, 0x23, 0x2A, 0x29, 0x25],
    [0x07, 0x0B, 0x0D, 0x0E, 0x13, 0x19, 0x1C, 0x15, 0x16, 0x1A],
];

/// Standard UPC/EAN mod-10 check over a digit string whose last digit is the check
pub(crate) fn checksum_ok(digits: &str) -> bool {
    let values: Vec<u32> = match digits.chars().map(|c| c.to_digit(10)).collect() {
        Some(values) => values,
        None => return false,
    };
    if values.len() < 2 {
        return false;
    }

    let n = values.len();
    let mut sum = 0;
    let mut i = n as isize - 2;
    while i >= 0 {
        sum += values[i as usize];
        i -= 2;
    }
    sum *= 3;
    let mut i = n as isize - 1;
    while i >= 0 {
        sum += values[i as usize];
        i -= 2;
    }
    sum % 10 == 0
}

fn matches(runs: &Runs, start: usize, pattern: &[u32]) -> bool {
    start + pattern.len() <= runs.len()
        && pattern_variance(
            &runs.lengths[start..start + pattern.len()],
            pattern,
            MAX_INDIVIDUAL_VARIANCE,
        ) < MAX_AVG_VARIANCE
}

/// Best matching digit; G matches are returned as `10 + digit`
fn decode_digit(runs: &Runs, start: usize, module: f32, with_g: bool) -> Option<usize> {
    if start + 4 > runs.len() {
        return None;
    }
    let counters = &runs.lengths[start..start + 4];

    let width = counters.iter().sum::<u32>() as f32;
    if width < module * 4.5 || width > module * 9.5 {
        return None;
    }

    let candidates = L_PATTERNS
        .iter()
        .enumerate()
        .chain(G_PATTERNS.iter().enumerate().map(|(i, p)| (i + 10, p)))
        .take(if with_g { 20 } else { 10 });

    let mut best: Option<(usize, f32)> = None;
    for (index, pattern) in candidates {
        let variance = pattern_variance(counters, pattern, MAX_INDIVIDUAL_VARIANCE);
        if variance < MAX_AVG_VARIANCE && best.map_or(true, |(_, v)| variance < v) {
            best = Some((index, variance));
        }
    }
    best.map(|(index, _)| index)
}

fn quiet_before(runs: &Runs, start: usize, module: f32) -> bool {
    start > 0 && runs.lengths[start - 1] as f32 >= module * 3.0
}

fn quiet_after(runs: &Runs, end: usize, module: f32, modules: f32) -> bool {
    end >= runs.len() || runs.lengths[end] as f32 >= module * modules
}

/// Left half digits and their L/G parity bits
fn decode_left(
    runs: &Runs,
    mut pos: usize,
    count: usize,
    module: f32,
    with_g: bool,
) -> Option<(String, u8, usize)> {
    let mut digits = String::with_capacity(count);
    let mut parity = 0u8;
    for x in 0..count {
        let index = decode_digit(runs, pos, module, with_g)?;
        digits.push(char::from(b'0' + (index % 10) as u8));
        if index >= 10 {
            parity |= 1 << (count - 1 - x);
        }
        pos += 4;
    }
    Some((digits, parity, pos))
}

fn decode_right(runs: &Runs, mut pos: usize, count: usize, module: f32) -> Option<(String, usize)> {
    let mut digits = String::with_capacity(count);
    for _ in 0..count {
        let index = decode_digit(runs, pos, module, false)?;
        digits.push(char::from(b'0' + index as u8));
        pos += 4;
    }
    Some((digits, pos))
}

fn decode_ean13(runs: &Runs, start: usize, module: f32) -> Option<String> {
    let (left, parity, pos) = decode_left(runs, start + 3, 6, module, true)?;
    if !matches(runs, pos, &MIDDLE_GUARD) {
        return None;
    }
    let (right, pos) = decode_right(runs, pos + 5, 6, module)?;
    if !matches(runs, pos, &GUARD) || !quiet_after(runs, pos + 3, module, 3.0) {
        return None;
    }

    let first = FIRST_DIGIT_ENCODINGS.iter().position(|&p| p == parity)?;
    let text = format!("{}{}{}", first, left, right);
    checksum_ok(&text).then_some(text)
}

fn decode_ean8(runs: &Runs, start: usize, module: f32) -> Option<String> {
    let (left, _, pos) = decode_left(runs, start + 3, 4, module, false)?;
    if !matches(runs, pos, &MIDDLE_GUARD) {
        return None;
    }
    let (right, pos) = decode_right(runs, pos + 5, 4, module)?;
    if !matches(runs, pos, &GUARD) || !quiet_after(runs, pos + 3, module, 3.0) {
        return None;
    }

    let text = format!("{}{}", left, right);
    checksum_ok(&text).then_some(text)
}

fn decode_upce(runs: &Runs, start: usize, module: f32) -> Option<String> {
    let (middle, parity, pos) = decode_left(runs, start + 3, 6, module, true)?;
    if !matches(runs, pos, &UPCE_END_GUARD) || !quiet_after(runs, pos + 6, module, 6.0) {
        return None;
    }

    let (number_system, check) = NUMSYS_AND_CHECK_DIGIT_PATTERNS
        .iter()
        .enumerate()
        .find_map(|(ns, row)| row.iter().position(|&p| p == parity).map(|d| (ns, d)))?;

    let text = format!("{}{}{}", number_system, middle, check);
    checksum_ok(&upce_to_upca(&text)?).then_some(text)
}

/// Expand an 8-digit UPC-E string to its 12-digit UPC-A form
pub(crate) fn upce_to_upca(upce: &str) -> Option<String> {
    if upce.len() != 8 || !upce.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number_system = &upce[0..1];
    let body = &upce[1..7];
    let check = &upce[7..8];
    let last = body.as_bytes()[5];

    let expanded = match last {
        b'0' | b'1' | b'2' => format!("{}{}0000{}", &body[0..2], last as char, &body[2..5]),
        b'3' => format!("{}00000{}", &body[0..3], &body[3..5]),
        b'4' => format!("{}00000{}", &body[0..4], &body[4..5]),
        _ => format!("{}0000{}", &body[0..5], last as char),
    };
    Some(format!("{}{}{}", number_system, expanded, check))
}

/// Try every EAN/UPC start guard in the scan line
pub(crate) fn decode(runs: &Runs, allow: &[Symbology]) -> Option<Decoded> {
    let want_13 = allow.contains(&Symbology::Ean13) || allow.contains(&Symbology::UpcA);
    let want_8 = allow.contains(&Symbology::Ean8);
    let want_e = allow.contains(&Symbology::UpcE);

    for start in runs.bar_starts() {
        if !matches(runs, start, &GUARD) {
            continue;
        }
        let module = runs.width(start, 3) as f32 / 3.0;
        if !quiet_before(runs, start, module) {
            continue;
        }

        if want_13 {
            if let Some(text) = decode_ean13(runs, start, module) {
                if let Some(hit) = classify_ean13(text, allow) {
                    return Some(hit);
                }
            }
        }
        if want_8 {
            if let Some(text) = decode_ean8(runs, start, module) {
                return Some(Decoded {
                    text,
                    symbology: Symbology::Ean8,
                });
            }
        }
        if want_e {
            if let Some(text) = decode_upce(runs, start, module) {
                return Some(Decoded {
                    text,
                    symbology: Symbology::UpcE,
                });
            }
        }
    }
    None
}

/// UPC-A is EAN-13 with a leading zero
fn classify_ean13(text: String, allow: &[Symbology]) -> Option<Decoded> {
    if text.starts_with('0') && allow.contains(&Symbology::UpcA) {
        return Some(Decoded {
            text: text[1..].to_string(),
            symbology: Symbology::UpcA,
        });
    }
    allow.contains(&Symbology::Ean13).then(|| Decoded {
        text,
        symbology: Symbology::Ean13,
    })
}
