use serde::Serialize;

use crate::game::gameplay::{Session, SessionState};
use crate::game::note::NoteStatus;
use crate::game::scores::{self, RatingCounts};
use crate::game::timing_stats::{self, TimingStats};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct StageSummary {
    pub song_id: String,
    pub title: String,
    pub score: u64,
    pub max_combo: u32,
    pub stats: RatingCounts,
    /// Notes pressed inside the miss window but beyond the good window.
    pub unscored_hits: u32,
    pub full_combo: bool,
    pub score_percent: f64, // 0.0 to 1.0 of an all-perfect run
    pub timing: TimingStats,
}

/// Summarizes an ended session. `None` until the session reaches `Ended`.
pub fn summarize(session: &Session) -> Option<StageSummary> {
    if session.state != SessionState::Ended {
        return None;
    }
    let song = session.song.as_ref()?;
    let tally = session.tally;
    let unscored_hits = session
        .notes
        .iter()
        .filter(|n| n.status == NoteStatus::Hit && n.hit_rating.is_none())
        .count() as u32;
    Some(StageSummary {
        song_id: song.id.clone(),
        title: song.title.clone(),
        score: tally.score,
        max_combo: tally.max_combo,
        stats: tally.stats,
        unscored_hits,
        full_combo: tally.stats.miss == 0 && unscored_hits == 0,
        score_percent: scores::score_percent(&tally, session.notes.len()),
        timing: timing_stats::compute_note_timing_stats(&session.notes),
    })
}
