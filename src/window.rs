//! Half-open time intervals used for overlap checks.

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// A `[start, end)` interval on the clinic's wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl TimeWindow {
    /// Window of an appointment starting at `start` lasting `duration_minutes`.
    ///
    /// The end saturates at the last representable instant.
    pub fn of(start: NaiveDateTime, duration_minutes: u32) -> Self {
        let end = start
            .checked_add_signed(Duration::minutes(i64::from(duration_minutes)))
            .unwrap_or(NaiveDateTime::MAX);
        TimeWindow { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn duration_minutes(&self) -> u32 {
        u32::try_from(self.duration().num_minutes()).unwrap_or(0)
    }

    /// Touching endpoints do not overlap.
    pub fn overlaps_with(&self, other: &TimeWindow) -> bool {
        overlaps(self.start, self.end, other.start, other.end)
    }

    pub fn contains(&self, instant: NaiveDateTime) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// `(start, start + duration)`.
pub fn window_of(start: NaiveDateTime, duration_minutes: u32) -> (NaiveDateTime, NaiveDateTime) {
    let window = TimeWindow::of(start, duration_minutes);
    (window.start, window.end)
}

/// True iff `[a_start, a_end)` and `[b_start, b_end)` share an instant.
pub fn overlaps(
    a_start: NaiveDateTime,
    a_end: NaiveDateTime,
    b_start: NaiveDateTime,
    b_end: NaiveDateTime,
) -> bool {
    a_start < b_end && b_start < a_end
}
