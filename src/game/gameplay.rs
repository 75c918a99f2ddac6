use crate::game::judgment::{self, Judgment};
use crate::game::note::{self, GameNote, NoteStatus, PitchIndex};
use crate::game::scores::{self, ScoreTally};
use crate::game::song::{Song, SongDataError};
use crate::game::timing_windows::{self, END_PADDING_MS, FALL_MS};
use log::{debug, info};
use serde::Serialize;
use smallvec::SmallVec;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Countdown,
    Playing,
    Paused,
    Ended,
}

/// Notes that crossed their miss window during one sweep.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MissBatch {
    pub note_indices: SmallVec<[usize; 8]>,
}

impl MissBatch {
    #[inline(always)]
    pub fn count(&self) -> u32 {
        self.note_indices.len() as u32
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.note_indices.is_empty()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub missed: MissBatch,
    pub ended: bool,
}

/// Authoritative session data. Clock handling lives in the engine; everything here
/// takes the elapsed time as an argument so it can be driven directly by tests.
#[derive(Clone, Debug)]
pub struct Session {
    pub state: SessionState,
    pub song: Option<Arc<Song>>,
    pub notes: Vec<GameNote>,
    pub elapsed_ms: i64,
    pub tally: ScoreTally,
    pitch_index: PitchIndex,
    // Note indices ordered by start time; the miss sweep walks this with a cursor.
    miss_order: Vec<usize>,
    next_miss_cursor: usize,
    end_time_ms: i64,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            song: None,
            notes: Vec::new(),
            elapsed_ms: 0,
            tally: ScoreTally::default(),
            pitch_index: PitchIndex::default(),
            miss_order: Vec::new(),
            next_miss_cursor: 0,
            end_time_ms: 0,
        }
    }

    /// Selects a song. Ignored (returns `Ok(false)`) outside `Idle`.
    pub fn select_song(&mut self, song: Arc<Song>) -> Result<bool, SongDataError> {
        if self.state != SessionState::Idle {
            debug!("Ignoring song selection while {:?}", self.state);
            return Ok(false);
        }
        song.validate()?;
        info!("Selected song '{}' ({} notes)", song.id, song.notes.len());
        self.clear_progress();
        self.song = Some(song);
        Ok(true)
    }

    /// Materializes notes and resets scoring; the session starts at elapsed 0.
    pub fn begin_play(&mut self) -> Result<(), SongDataError> {
        let Some(song) = self.song.clone() else {
            return Ok(());
        };
        song.validate()?;
        self.notes = note::materialize(&song);
        self.pitch_index = PitchIndex::build(&self.notes);
        let mut order: Vec<usize> = (0..self.notes.len()).collect();
        order.sort_by_key(|&i| (self.notes[i].start_ms, i));
        self.miss_order = order;
        self.next_miss_cursor = 0;
        self.end_time_ms = song.last_start_ms() + FALL_MS + END_PADDING_MS;
        self.tally = ScoreTally::default();
        self.elapsed_ms = 0;
        self.state = SessionState::Playing;
        info!(
            "Playing '{}': {} notes, ends after {}ms",
            song.id,
            self.notes.len(),
            self.end_time_ms
        );
        Ok(())
    }

    /// Drops notes and scoring but keeps the selected song.
    pub fn clear_progress(&mut self) {
        self.notes.clear();
        self.pitch_index.clear();
        self.miss_order.clear();
        self.next_miss_cursor = 0;
        self.end_time_ms = 0;
        self.elapsed_ms = 0;
        self.tally = ScoreTally::default();
    }

    pub fn reset(&mut self) {
        self.clear_progress();
        self.state = SessionState::Idle;
    }

    #[inline(always)]
    pub const fn end_time_ms(&self) -> i64 {
        self.end_time_ms
    }

    /// Raises the elapsed time; it never moves backwards while playing.
    #[inline(always)]
    pub fn advance_to(&mut self, elapsed_ms: i64) {
        if elapsed_ms > self.elapsed_ms {
            self.elapsed_ms = elapsed_ms;
        }
    }

    /// Marks every pending note past its miss window as missed, scoring the batch once.
    pub fn sweep_misses(&mut self) -> MissBatch {
        let mut batch = MissBatch::default();
        let elapsed = self.elapsed_ms;
        let mut cursor = self.next_miss_cursor;
        while cursor < self.miss_order.len() {
            let idx = self.miss_order[cursor];
            let note = &mut self.notes[idx];
            if !timing_windows::is_overdue(note.start_ms, elapsed) {
                break;
            }
            if note.status == NoteStatus::Pending {
                note.status = NoteStatus::Missed;
                debug!(
                    "MISSED (time-based): note={} target_ms={} elapsed_ms={}",
                    note.id,
                    note.target_time_ms(),
                    elapsed
                );
                batch.note_indices.push(idx);
            }
            cursor += 1;
        }
        self.next_miss_cursor = cursor;
        if !batch.is_empty() {
            self.tally = scores::apply_miss_batch(self.tally, batch.count());
            debug!("Miss batch of {} at {}ms, combo reset", batch.count(), elapsed);
        }
        batch
    }

    /// One logic pass: miss sweep then end check. No-op unless playing.
    pub fn update(&mut self, elapsed_ms: i64) -> TickOutcome {
        if self.state != SessionState::Playing {
            return TickOutcome::default();
        }
        self.advance_to(elapsed_ms);
        let missed = self.sweep_misses();
        let ended = self.elapsed_ms > self.end_time_ms;
        if ended {
            self.state = SessionState::Ended;
            info!(
                "Session ended at {}ms: score={} max_combo={} perfect={} good={} miss={}",
                self.elapsed_ms,
                self.tally.score,
                self.tally.max_combo,
                self.tally.stats.perfect,
                self.tally.stats.good,
                self.tally.stats.miss
            );
        }
        TickOutcome { missed, ended }
    }

    /// Judges a press of `pitch` at `elapsed_ms`. `None` means nothing matched.
    pub fn judge_input(&mut self, pitch: &str, elapsed_ms: i64) -> Option<Judgment> {
        if self.state != SessionState::Playing {
            return None;
        }
        self.advance_to(elapsed_ms);
        let judgment =
            judgment::resolve_hit(&self.notes, &self.pitch_index, pitch, self.elapsed_ms)?;
        let note = &mut self.notes[judgment.note_index];
        note.status = NoteStatus::Hit;
        note.hit_rating = judgment.rating;
        note.offset_ms = Some(judgment.offset_ms);
        self.tally = scores::apply_rating(self.tally, judgment.rating);
        debug!(
            "TIMING HIT: note={} window={:?} offset_ms={} combo={} score={}",
            note.id, judgment.window, judgment.offset_ms, self.tally.combo, self.tally.score
        );
        Some(judgment)
    }

    pub fn pending_count(&self) -> usize {
        self.notes.iter().filter(|n| n.is_pending()).count()
    }
}
