use crate::platform::TrackCapabilities;
use serde::{Deserialize, Serialize};

/// Hardware zoom range. `step` of 0 means continuous.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoomRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ZoomRange {
    /// Clamp into range, then round to the nearest `min + k * step`
    pub fn snap(&self, level: f64) -> f64 {
        let level = if level.is_finite() { level } else { self.min };
        let clamped = level.clamp(self.min, self.max);
        if self.step <= 0.0 {
            return clamped;
        }

        let mut steps = ((clamped - self.min) / self.step).round();
        // stay on the grid when max is not a whole number of steps from min
        if self.min + steps * self.step > self.max + 1e-9 {
            steps -= 1.0;
        }
        let snapped = (self.min + steps * self.step).max(self.min);
        (snapped * 1e6).round() / 1e6
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FocusMode {
    Continuous,
    SingleShot,
    Manual,
}

impl FocusMode {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "continuous" => Some(FocusMode::Continuous),
            "single-shot" => Some(FocusMode::SingleShot),
            "manual" => Some(FocusMode::Manual),
            _ => None,
        }
    }
}

/// What the open track supports. Absent means unsupported.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilitySet {
    pub zoom: Option<ZoomRange>,
    pub torch: bool,
    pub focus_modes: Vec<FocusMode>,
}

impl CapabilitySet {
    pub fn from_track(caps: &TrackCapabilities) -> Self {
        let zoom = caps
            .zoom
            .filter(|z| z.min.is_finite() && z.max.is_finite() && z.min < z.max)
            .map(|z| ZoomRange {
                min: z.min,
                max: z.max,
                step: if z.step.is_finite() && z.step > 0.0 { z.step } else { 0.0 },
            });

        Self {
            zoom,
            torch: caps.torch == Some(true),
            focus_modes: caps
                .focus_mode
                .iter()
                .filter_map(|m| FocusMode::parse(m))
                .collect(),
        }
    }

    pub fn supports_continuous_focus(&self) -> bool {
        self.focus_modes.contains(&FocusMode::Continuous)
    }
}
