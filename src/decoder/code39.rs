use super::linear::Runs;

const ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ-. $/+%";

/// Nine-element bar/space patterns, one bit per element, wide = 1
const ENCODINGS: [u16; 43] = [
    0x034, 0x121, 0x061, 0x160, 0x031, 0x130, 0x070, 0x025, 0x124, 0x064, // 0-9
    0x109, 0x049, 0x148, 0x019, 0x118, 0x058, 0x00D, 0x10C, 0x04C, 0x01C, // A-J
    0x103, 0x043, 0x142, 0x013, 0x112, 0x052, 0x007, 0x106, 0x046, 0x016, // K-T
    0x181, 0x0C1, 0x1C0, 0x091, 0x190, 0x0D0, 0x085, 0x184, 0x0C4, 0x0A8, // U-$
    0x0A2, 0x08A, 0x02A, // /-%
];

pub(crate) const CODE39_ASTERISK: u16 = 0x094;

const MAX_LENGTH: usize = 80;

/// Pattern for a character, if it is in the alphabet
pub(crate) fn code39_encoding(ch: char) -> Option<u16> {
    if ch == '*' {
        return Some(CODE39_ASTERISK);
    }
    ALPHABET
        .iter()
        .position(|&c| c as char == ch)
        .map(|i| ENCODINGS[i])
}

fn character_for(pattern: u16) -> Option<char> {
    ENCODINGS
        .iter()
        .position(|&e| e == pattern)
        .map(|i| ALPHABET[i] as char)
}

/// Classify nine element widths into narrow and wide. Exactly three must
/// be wide and no wide element may dominate the others.
fn to_narrow_wide_pattern(counters: &[u32]) -> Option<u16> {
    let mut max_narrow = 0u32;
    loop {
        let min_counter = counters.iter().copied().filter(|&c| c > max_narrow).min()?;
        max_narrow = min_counter;

        let mut wide = 0;
        let mut total_wide = 0;
        let mut pattern = 0u16;
        for (i, &counter) in counters.iter().enumerate() {
            if counter > max_narrow {
                pattern |= 1 << (8 - i);
                wide += 1;
                total_wide += counter;
            }
        }

        if wide == 3 {
            if counters
                .iter()
                .any(|&c| c > max_narrow && c * 2 >= total_wide)
            {
                return None;
            }
            return Some(pattern);
        }
        if wide < 3 {
            return None;
        }
    }
}

/// Decode the first `*...*` delimited Code 39 symbol in the scan line
pub(crate) fn decode(runs: &Runs) -> Option<String> {
    runs.bar_starts().find_map(|start| decode_at(runs, start))
}

fn decode_at(runs: &Runs, start: usize) -> Option<String> {
    if start + 9 > runs.len() {
        return None;
    }
    let counters = &runs.lengths[start..start + 9];
    if to_narrow_wide_pattern(counters)? != CODE39_ASTERISK {
        return None;
    }
    // quiet zone of at least half the start character
    if runs.lengths[start - 1] * 2 < runs.width(start, 9) {
        return None;
    }

    let mut text = String::new();
    let mut pos = start + 9;
    loop {
        // inter-character gap
        pos += 1;
        if pos + 9 > runs.len() {
            return None;
        }

        let pattern = to_narrow_wide_pattern(&runs.lengths[pos..pos + 9])?;
        if pattern == CODE39_ASTERISK {
            let end = pos + 9;
            let width = runs.width(pos, 9);
            let quiet = end >= runs.len() || runs.lengths[end] * 2 >= width;
            return (quiet && !text.is_empty()).then_some(text);
        }

        text.push(character_for(pattern)?);
        if text.len() > MAX_LENGTH {
            return None;
        }
        pos += 9;
    }
}
