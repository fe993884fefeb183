//! Sliding time windows for the live tracker.

use crate::config::TimeWindowMinutes;
use serde::Serialize;

/// Devices seen within this many minutes count as "current".
pub const CURRENT_MINUTES: i64 = 2;

/// Window edges in minutes back from now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindows {
    minutes: TimeWindowMinutes,
}

/// Absolute cut-offs (unix seconds) for one moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeBoundaries {
    /// Start of the most recent window.
    pub recent: i64,
    /// Start of the second window.
    pub medium: i64,
    /// Start of the third window.
    pub old: i64,
    /// Start of the oldest window.
    pub oldest: i64,
    /// Start of the "current activity" range.
    pub current: i64,
}

impl TimeWindows {
    /// Creates windows from configured minutes.
    #[must_use]
    pub const fn new(minutes: TimeWindowMinutes) -> Self {
        Self { minutes }
    }

    /// Cut-offs relative to `now` (unix seconds).
    #[must_use]
    pub const fn boundaries(&self, now: i64) -> TimeBoundaries {
        TimeBoundaries {
            recent: now - self.minutes.recent * 60,
            medium: now - self.minutes.medium * 60,
            old: now - self.minutes.old * 60,
            oldest: now - self.minutes.oldest * 60,
            current: now - CURRENT_MINUTES * 60,
        }
    }
}

impl Default for TimeWindows {
    fn default() -> Self {
        Self::new(TimeWindowMinutes::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_boundaries() {
        let b = TimeWindows::default().boundaries(10_000);
        assert_eq!(b.recent, 10_000 - 300);
        assert_eq!(b.medium, 10_000 - 600);
        assert_eq!(b.old, 10_000 - 900);
        assert_eq!(b.oldest, 10_000 - 1200);
        assert_eq!(b.current, 10_000 - 120);
    }

    #[test]
    fn test_custom_minutes() {
        let windows = TimeWindows::new(TimeWindowMinutes {
            recent: 1,
            medium: 2,
            old: 3,
            oldest: 4,
        });
        let b = windows.boundaries(600);
        assert_eq!((b.recent, b.oldest), (540, 360));
    }
}
