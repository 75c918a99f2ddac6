// Shared timing window definitions to keep judging and the miss sweep in sync.

// All windows are in milliseconds and inclusive.
pub const FALL_MS: i64 = 2500; // note travel time from spawn to the hit line
pub const PERFECT_MS: i64 = 100;
pub const GOOD_MS: i64 = 180;
pub const MISS_MS: i64 = 280; // outer edge of the window that still consumes a note

// Grace period after the last target before the session ends.
pub const END_PADDING_MS: i64 = 1000;

// Latest note start whose target, miss edge and end time all fit in i64.
pub const MAX_START_MS: i64 = i64::MAX - FALL_MS - MISS_MS - END_PADDING_MS;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TimingWindow {
    Perfect,
    Good,
    // Inside MISS_MS but beyond GOOD_MS: consumes the note, scores nothing.
    Late,
}

/// Target hit time of a note scheduled at `start_ms`.
#[inline(always)]
pub const fn target_time_ms(start_ms: i64) -> i64 {
    start_ms + FALL_MS
}

/// Buckets an absolute timing error. `None` means the press is outside every window.
#[inline(always)]
pub const fn classify_offset_ms(abs_err_ms: i64) -> Option<TimingWindow> {
    if abs_err_ms <= PERFECT_MS {
        Some(TimingWindow::Perfect)
    } else if abs_err_ms <= GOOD_MS {
        Some(TimingWindow::Good)
    } else if abs_err_ms <= MISS_MS {
        Some(TimingWindow::Late)
    } else {
        None
    }
}

/// A pending note is overdue once the session has moved strictly past its miss window.
#[inline(always)]
pub const fn is_overdue(start_ms: i64, elapsed_ms: i64) -> bool {
    elapsed_ms > target_time_ms(start_ms) + MISS_MS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_edges_are_inclusive() {
        assert_eq!(classify_offset_ms(0), Some(TimingWindow::Perfect));
        assert_eq!(classify_offset_ms(100), Some(TimingWindow::Perfect));
        assert_eq!(classify_offset_ms(101), Some(TimingWindow::Good));
        assert_eq!(classify_offset_ms(180), Some(TimingWindow::Good));
        assert_eq!(classify_offset_ms(181), Some(TimingWindow::Late));
        assert_eq!(classify_offset_ms(280), Some(TimingWindow::Late));
        assert_eq!(classify_offset_ms(281), None);
    }

    #[test]
    fn overdue_only_strictly_past_the_miss_window() {
        assert!(!is_overdue(0, 2780));
        assert!(is_overdue(0, 2781));
        assert!(!is_overdue(600, 3380));
        assert!(is_overdue(600, 3381));
    }
}
