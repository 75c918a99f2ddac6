use crate::game::judgment::HitRating;
use crate::game::song::Song;
use crate::game::timing_windows;
use rustc_hash::FxHashMap;
use serde::Serialize;
use smallvec::SmallVec;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteStatus {
    Pending,
    Hit,
    Missed,
}

/// Runtime copy of a scheduled note. Status only ever moves away from `Pending`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct GameNote {
    pub id: String,
    pub pitch: String,
    pub start_ms: i64,
    pub duration_ms: i64,
    pub status: NoteStatus,
    pub hit_rating: Option<HitRating>,
    /// Signed press error (`elapsed - target`), set when the note is hit.
    pub offset_ms: Option<i64>,
}

impl GameNote {
    #[inline(always)]
    pub const fn target_time_ms(&self) -> i64 {
        timing_windows::target_time_ms(self.start_ms)
    }

    #[inline(always)]
    pub fn is_pending(&self) -> bool {
        self.status == NoteStatus::Pending
    }
}

#[inline(always)]
fn note_id(index: usize, pitch: &str, start_ms: i64) -> String {
    format!("{index}-{pitch}-{start_ms}")
}

/// Builds the runtime notes for a song, preserving song order.
pub fn materialize(song: &Song) -> Vec<GameNote> {
    song.notes
        .iter()
        .enumerate()
        .map(|(index, n)| GameNote {
            id: note_id(index, &n.pitch, n.start_ms),
            pitch: n.pitch.clone(),
            start_ms: n.start_ms,
            duration_ms: n.duration_ms,
            status: NoteStatus::Pending,
            hit_rating: None,
            offset_ms: None,
        })
        .collect()
}

/// Note indices grouped by pitch, each group ordered by start time then song order.
#[derive(Clone, Debug, Default)]
pub struct PitchIndex {
    by_pitch: FxHashMap<String, SmallVec<[usize; 16]>>,
}

impl PitchIndex {
    pub fn build(notes: &[GameNote]) -> Self {
        let mut by_pitch: FxHashMap<String, SmallVec<[usize; 16]>> = FxHashMap::default();
        for (idx, note) in notes.iter().enumerate() {
            by_pitch.entry(note.pitch.clone()).or_default().push(idx);
        }
        for indices in by_pitch.values_mut() {
            indices.sort_by_key(|&i| (notes[i].start_ms, i));
        }
        Self { by_pitch }
    }

    #[inline(always)]
    pub fn notes_for(&self, pitch: &str) -> &[usize] {
        self.by_pitch.get(pitch).map_or(&[][..], |v| v.as_slice())
    }

    pub fn clear(&mut self) {
        self.by_pitch.clear();
    }
}
