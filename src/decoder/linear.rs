use super::{code39, upc_ean, DecodeHints, Decoded, SymbolDecoder};
use crate::frame::LumaImage;
use crate::mode::Symbology;

/// Rows with less spread than this are treated as blank
const MIN_CONTRAST: u8 = 32;

pub(crate) const MAX_AVG_VARIANCE: f32 = 0.48;
pub(crate) const MAX_INDIVIDUAL_VARIANCE: f32 = 0.7;

/// Run-length encoded, binarized scan line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Runs {
    pub lengths: Vec<u32>,
    pub first_is_bar: bool,
}

impl Runs {
    /// Threshold at the row's mid-range and run-length encode.
    /// Returns None for rows without enough contrast to hold a symbol.
    pub fn from_row(row: &[u8]) -> Option<Self> {
        let (min, max) = row
            .iter()
            .fold((u8::MAX, u8::MIN), |(lo, hi), &px| (lo.min(px), hi.max(px)));
        if row.is_empty() || max.saturating_sub(min) < MIN_CONTRAST {
            return None;
        }

        let threshold = ((min as u16 + max as u16) / 2) as u8;
        let first_is_bar = row[0] < threshold;
        let mut lengths = Vec::with_capacity(64);
        let mut current = first_is_bar;
        let mut count = 0u32;

        for &px in row {
            let is_bar = px < threshold;
            if is_bar == current {
                count += 1;
            } else {
                lengths.push(count);
                current = is_bar;
                count = 1;
            }
        }
        lengths.push(count);

        Some(Self {
            lengths,
            first_is_bar,
        })
    }

    pub fn reversed(&self) -> Self {
        let mut lengths = self.lengths.clone();
        lengths.reverse();
        let last_is_bar = if self.lengths.len() % 2 == 1 {
            self.first_is_bar
        } else {
            !self.first_is_bar
        };
        Self {
            lengths,
            first_is_bar: last_is_bar,
        }
    }

    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    pub fn is_bar(&self, index: usize) -> bool {
        (index % 2 == 0) == self.first_is_bar
    }

    pub fn width(&self, start: usize, count: usize) -> u32 {
        self.lengths[start..start + count].iter().sum()
    }

    /// Indices of bar runs preceded by at least one space run
    pub fn bar_starts(&self) -> impl Iterator<Item = usize> + '_ {
        (1..self.len()).filter(move |&i| self.is_bar(i))
    }
}

/// Average deviation of `counters` from `pattern`, normalized by width.
/// Infinity when any single counter is off by more than `max_individual`.
pub(crate) fn pattern_variance(counters: &[u32], pattern: &[u32], max_individual: f32) -> f32 {
    let total: u32 = counters.iter().sum();
    let pattern_length: u32 = pattern.iter().sum();
    if total < pattern_length || pattern_length == 0 {
        // under one pixel per module
        return f32::INFINITY;
    }

    let unit = total as f32 / pattern_length as f32;
    let max_individual = max_individual * unit;

    let mut total_variance = 0.0;
    for (&counter, &expected) in counters.iter().zip(pattern) {
        let scaled = expected as f32 * unit;
        let variance = (counter as f32 - scaled).abs();
        if variance > max_individual {
            return f32::INFINITY;
        }
        total_variance += variance;
    }
    total_variance / total as f32
}

/// Row indices to sample: the middle first, then alternating outwards
pub(crate) fn row_order(height: u32, rows: usize) -> Vec<u32> {
    if height == 0 {
        return Vec::new();
    }
    let rows = rows.clamp(1, height as usize);
    let step = (height as usize / (rows + 1)).max(1);
    let middle = height as usize / 2;

    let mut order = Vec::with_capacity(rows);
    for i in 0..rows {
        let offset = ((i + 1) / 2) * step;
        let y = if i % 2 == 0 {
            middle.checked_add(offset)
        } else {
            middle.checked_sub(offset)
        };
        match y {
            Some(y) if y < height as usize => order.push(y as u32),
            _ => {}
        }
    }
    order
}

/// EAN/UPC and Code 39 along horizontal scan lines, both directions
pub struct LinearDecoder;

impl LinearDecoder {
    fn decode_runs(runs: &Runs, allow: &[Symbology]) -> Option<Decoded> {
        if allow.iter().any(|s| upc_ean::FAMILY.contains(s)) {
            if let Some(hit) = upc_ean::decode(runs, allow) {
                return Some(hit);
            }
        }
        if allow.contains(&Symbology::Code39) {
            if let Some(text) = code39::decode(runs) {
                return Some(Decoded {
                    text,
                    symbology: Symbology::Code39,
                });
            }
        }
        None
    }
}

impl SymbolDecoder for LinearDecoder {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn handles(&self, symbology: Symbology) -> bool {
        symbology.is_linear()
    }

    fn decode(
        &self,
        image: &LumaImage,
        allow: &[Symbology],
        hints: &DecodeHints,
    ) -> Option<Decoded> {
        let rows = if hints.try_harder {
            hints.scan_rows.saturating_mul(2)
        } else {
            hints.scan_rows
        };

        for y in row_order(image.height, rows) {
            let Some(runs) = Runs::from_row(image.row(y)) else {
                continue;
            };
            if let Some(hit) = Self::decode_runs(&runs, allow) {
                return Some(hit);
            }
            if let Some(hit) = Self::decode_runs(&runs.reversed(), allow) {
                return Some(hit);
            }
        }
        None
    }
}
