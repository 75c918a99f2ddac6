use crate::game::note::{GameNote, PitchIndex};
use crate::game::timing_windows::{self, TimingWindow};
use serde::Serialize;

/// Scoring rating stored on a hit note.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitRating {
    Perfect,
    Good,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Judgment {
    pub note_index: usize,
    pub window: TimingWindow,
    pub rating: Option<HitRating>, // None for Late: consumed without scoring
    pub offset_ms: i64,            // elapsed - target
}

#[inline(always)]
pub const fn rating_for_window(window: TimingWindow) -> Option<HitRating> {
    match window {
        TimingWindow::Perfect => Some(HitRating::Perfect),
        TimingWindow::Good => Some(HitRating::Good),
        TimingWindow::Late => None,
    }
}

/// Picks the pending note of `pitch` closest to its target time, inside the miss window.
/// Ties go to the earliest start.
pub fn find_best_candidate(
    notes: &[GameNote],
    index: &PitchIndex,
    pitch: &str,
    elapsed_ms: i64,
) -> Option<(usize, i64)> {
    let mut best: Option<(usize, i64)> = None;
    for &idx in index.notes_for(pitch) {
        let note = &notes[idx];
        if !note.is_pending() {
            continue;
        }
        let abs_err = (elapsed_ms - note.target_time_ms()).abs();
        if abs_err > timing_windows::MISS_MS {
            continue;
        }
        match best {
            Some((_, best_err)) if abs_err >= best_err => {}
            _ => best = Some((idx, abs_err)),
        }
    }
    best
}

/// Resolves a press of `pitch` at `elapsed_ms` without mutating anything.
pub fn resolve_hit(
    notes: &[GameNote],
    index: &PitchIndex,
    pitch: &str,
    elapsed_ms: i64,
) -> Option<Judgment> {
    let (note_index, abs_err) = find_best_candidate(notes, index, pitch, elapsed_ms)?;
    let window = timing_windows::classify_offset_ms(abs_err)?;
    Some(Judgment {
        note_index,
        window,
        rating: rating_for_window(window),
        offset_ms: elapsed_ms - notes[note_index].target_time_ms(),
    })
}
