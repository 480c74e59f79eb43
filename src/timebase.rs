use serde::{Deserialize, Serialize};

use crate::my_types::*;

/// How raw timestamps of one video map to frame numbers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBase {
    pub first_timestamp: Timestamp,
    pub average_timestamps_per_frame: i64,
    /// Identity of the source file, without directory or extension.
    pub source: String,
}

impl TimeBase {
    pub fn new(first_timestamp: Timestamp, average_timestamps_per_frame: i64, source: &str) -> Self {
        Self {
            first_timestamp,
            average_timestamps_per_frame,
            source: source.to_string(),
        }
    }

    /// Frame number of an absolute timestamp, rounded toward zero.
    pub fn frame_number(&self, timestamp: Timestamp) -> i64 {
        if self.average_timestamps_per_frame == 0 {
            return 0;
        }
        (timestamp - self.first_timestamp) / self.average_timestamps_per_frame
    }
}

/// Translate a timestamp stored under one time base into another.
///
/// Matching numbers count as the same time base here; callers are responsible
/// for checking that both sides come from the same file (see
/// `Remapper::is_identity`).
///
/// Lossy: the input is reduced to a whole frame number first. `relative`
/// timestamps (trajectory points) have no first-timestamp offset on either
/// side; absolute ones count frames from the input selection start when a
/// selection was exported, from the input first timestamp otherwise.
#[allow(clippy::too_many_arguments)]
pub fn remap(
    input_timestamp: Timestamp,
    input_first_timestamp: Timestamp,
    input_average_timestamps_per_frame: i64,
    input_selection_start: Timestamp,
    output_first_timestamp: Timestamp,
    output_average_timestamps_per_frame: i64,
    duplicate_factor: i64,
    relative: bool,
) -> Timestamp {
    if input_average_timestamps_per_frame == 0
        || (input_first_timestamp == output_first_timestamp
            && input_average_timestamps_per_frame == output_average_timestamps_per_frame)
    {
        return input_timestamp;
    }
    through_frames(
        input_timestamp,
        input_first_timestamp,
        input_average_timestamps_per_frame,
        input_selection_start,
        output_first_timestamp,
        output_average_timestamps_per_frame,
        duplicate_factor,
        relative,
    )
}

#[allow(clippy::too_many_arguments)]
fn through_frames(
    input_timestamp: Timestamp,
    input_first_timestamp: Timestamp,
    input_average_timestamps_per_frame: i64,
    input_selection_start: Timestamp,
    output_first_timestamp: Timestamp,
    output_average_timestamps_per_frame: i64,
    duplicate_factor: i64,
    relative: bool,
) -> Timestamp {
    // Saturates instead of wrapping on out-of-range input.
    if relative {
        let frame = input_timestamp
            .saturating_div(input_average_timestamps_per_frame)
            .saturating_mul(duplicate_factor);
        return frame.saturating_mul(output_average_timestamps_per_frame);
    }
    let origin = if input_selection_start > input_first_timestamp {
        input_selection_start
    } else {
        input_first_timestamp
    };
    let frame = input_timestamp
        .saturating_sub(origin)
        .saturating_div(input_average_timestamps_per_frame)
        .saturating_mul(duplicate_factor);
    frame
        .saturating_mul(output_average_timestamps_per_frame)
        .saturating_add(output_first_timestamp)
}

/// Remapping context built at load time from the stored header and the
/// currently opened video.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Remapper {
    input: TimeBase,
    input_selection_start: Timestamp,
    output: TimeBase,
    duplicate_factor: i64,
}

impl Remapper {
    pub fn new(
        input: TimeBase,
        input_selection_start: Timestamp,
        output: TimeBase,
        duplicate_factor: i64,
    ) -> Self {
        Self {
            input,
            input_selection_start,
            output,
            duplicate_factor: duplicate_factor.max(1),
        }
    }

    /// Data saved from and loaded into the same video.
    pub fn identity(time_base: TimeBase) -> Self {
        Self::new(time_base.clone(), time_base.first_timestamp, time_base, 1)
    }

    pub fn output(&self) -> &TimeBase {
        &self.output
    }

    /// Same first timestamp, same frame duration and same file.
    pub fn is_identity(&self) -> bool {
        self.input.average_timestamps_per_frame == 0
            || (self.input.first_timestamp == self.output.first_timestamp
                && self.input.average_timestamps_per_frame
                    == self.output.average_timestamps_per_frame
                && self.input.source == self.output.source)
    }

    pub fn remap(&self, timestamp: Timestamp, relative: bool) -> Timestamp {
        if self.is_identity() {
            return timestamp;
        }
        through_frames(
            timestamp,
            self.input.first_timestamp,
            self.input.average_timestamps_per_frame,
            self.input_selection_start,
            self.output.first_timestamp,
            self.output.average_timestamps_per_frame,
            self.duplicate_factor,
            relative,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_when_time_bases_match() {
        for ts in [-5, 0, 1234, 99_999] {
            assert_eq!(remap(ts, 100, 40, 100, 100, 40, 1, false), ts);
            assert_eq!(remap(ts, 100, 40, 100, 100, 40, 1, true), ts);
        }
        let remapper = Remapper::identity(TimeBase::new(100, 40, "clip"));
        assert!(remapper.is_identity());
        assert_eq!(remapper.remap(777, false), 777);
    }

    #[test]
    fn test_unknown_input_frame_duration_passes_through() {
        assert_eq!(remap(555, 0, 0, 0, 1000, 25, 1, false), 555);
    }

    #[test]
    fn test_absolute_rebased() {
        // frame 3 of the input becomes frame 3 of the output
        assert_eq!(remap(1300, 1000, 100, 1000, 0, 512, 1, false), 3 * 512);
        // rounded down to the whole frame
        assert_eq!(remap(1399, 1000, 100, 1000, 0, 512, 1, false), 3 * 512);
    }

    #[test]
    fn test_relative_has_no_offset() {
        assert_eq!(remap(300, 1000, 100, 1000, 50_000, 40, 1, true), 120);
    }

    #[test]
    fn test_selection_start_and_duplication() {
        // Exported from a selection starting at 2000, every frame duplicated twice.
        let ts = remap(2500, 1000, 100, 2000, 0, 10, 2, false);
        assert_eq!(ts, 5 * 2 * 10);
    }

    #[test]
    fn test_frame_number_recovered() {
        let input = TimeBase::new(1000, 100, "a");
        let output = TimeBase::new(7, 33, "b");
        let remapper = Remapper::new(input.clone(), 1000, output.clone(), 1);
        for ts in (1000..5000).step_by(37) {
            let frame = input.frame_number(ts);
            assert_eq!(output.frame_number(remapper.remap(ts, false)), frame);
        }
    }

    #[test]
    fn test_extreme_timestamps_saturate() {
        assert_eq!(remap(i64::MAX, 0, 1, 0, 0, 1000, 1, true), i64::MAX);
        assert_eq!(remap(i64::MIN, 1000, 1, 1000, 5, 1000, 2, false), i64::MIN + 5);
    }

    #[test]
    fn test_other_file_with_same_numbers_is_requantized() {
        let remapper = Remapper::new(TimeBase::new(0, 100, "a"), 0, TimeBase::new(0, 100, "b"), 1);
        assert!(!remapper.is_identity());
        assert_eq!(remapper.remap(250, false), 200);
        assert_eq!(remapper.remap(250, true), 200);
    }
}
