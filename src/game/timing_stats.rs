use crate::game::note::GameNote;
use serde::Serialize;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize)]
pub struct TimingStats {
    pub mean_abs_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub max_abs_ms: i64,
    pub count: usize,
}

#[inline(always)]
pub fn compute_note_timing_stats(notes: &[GameNote]) -> TimingStats {
    // First pass: sums and maxima over every note with a recorded press offset
    let mut sum_abs = 0_i64;
    let mut sum_signed = 0_i64;
    let mut max_abs = 0_i64;
    let mut count: usize = 0;

    for e in notes.iter().filter_map(|n| n.offset_ms) {
        let a = e.abs();
        sum_abs += a;
        sum_signed += e;
        if a > max_abs { max_abs = a; }
        count += 1;
    }

    if count == 0 {
        return TimingStats::default();
    }

    let mean_ms = sum_signed as f64 / count as f64;
    let mean_abs_ms = sum_abs as f64 / count as f64;

    // Second pass: sample standard deviation of signed offsets
    let stddev_ms = if count > 1 {
        let sum_diff_sq: f64 = notes
            .iter()
            .filter_map(|n| n.offset_ms)
            .map(|e| {
                let d = e as f64 - mean_ms;
                d * d
            })
            .sum();
        (sum_diff_sq / (count as f64 - 1.0)).sqrt()
    } else { 0.0 };

    TimingStats { mean_abs_ms, mean_ms, stddev_ms, max_abs_ms: max_abs, count }
}
