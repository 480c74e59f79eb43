use crate::my_types::*;

/// Persistence of a drawing around a reference time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Fading {
    pub enabled: bool,
    pub always_visible: bool,
    pub fading_frames: i64,
    pub average_timestamps_per_frame: i64,
}

impl Fading {
    pub fn new(fading_frames: i64, average_timestamps_per_frame: i64) -> Self {
        Self {
            enabled: true,
            always_visible: false,
            fading_frames,
            average_timestamps_per_frame,
        }
    }

    /// Opacity in `[0, 1]` at `timestamp`, fully opaque at `reference` and
    /// decreasing linearly to zero `fading_frames` frames away on either side.
    pub fn opacity(&self, reference: Timestamp, timestamp: Timestamp) -> f64 {
        if !self.enabled {
            return if timestamp == reference { 1. } else { 0. };
        }
        if self.always_visible {
            return 1.;
        }
        let distance = timestamp.saturating_sub(reference).saturating_abs();
        let span = self.fading_frames * self.average_timestamps_per_frame;
        if span <= 0 {
            return if distance == 0 { 1. } else { 0. };
        }
        if distance > span {
            0.
        } else {
            1. - distance as f64 / span as f64
        }
    }
}
