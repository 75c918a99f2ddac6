use crate::config::Config;
use crate::core::audio::AudioEngine;
use crate::core::clock::Clock;
use crate::core::input;
use crate::game::gameplay::{Session, SessionState, TickOutcome};
use crate::game::judgment::{HitRating, Judgment};
use crate::game::note::GameNote;
use crate::game::scores::RatingCounts;
use crate::game::song::{Song, SongCatalog, SongDataError};
use crate::game::stage_stats::{self, StageSummary};
use log::{debug, info, trace, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;
use thiserror::Error;

pub const COUNTDOWN_STEPS: u8 = 3;
pub const HIT_EFFECT_TTL_MS: u64 = 600;
pub const SHAKE_DURATION_MS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error(transparent)]
    Data(#[from] SongDataError),
    #[error("unknown song id '{0}'")]
    UnknownSong(String),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EffectRating {
    Perfect,
    Good,
    Miss,
}

impl From<Option<HitRating>> for EffectRating {
    fn from(rating: Option<HitRating>) -> Self {
        match rating {
            Some(HitRating::Perfect) => Self::Perfect,
            Some(HitRating::Good) => Self::Good,
            None => Self::Miss,
        }
    }
}

/// Transient feedback for renderers; never read back by scoring.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HitEffect {
    pub id: u64,
    pub lane_fraction: f64,
    pub rating: EffectRating,
    pub created_at_ms: u64, // clock reading
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    pub countdown_step_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            countdown_step_ms: 1000,
        }
    }
}

impl From<&Config> for EngineOptions {
    fn from(config: &Config) -> Self {
        Self {
            countdown_step_ms: config.countdown_step_ms,
        }
    }
}

/// Handle for one scheduled tick. Any pause, reset, restart or end invalidates
/// every token issued before it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TickToken {
    generation: u64,
}

/// Read-only view handed to renderers.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub song_id: Option<String>,
    pub title: Option<String>,
    pub notes: Vec<GameNote>,
    pub elapsed_ms: i64,
    pub score: u64,
    pub combo: u32,
    pub max_combo: u32,
    pub stats: RatingCounts,
    pub pending_notes: usize,
    // elapsed time after which the session ends; 0 until play begins
    pub end_time_ms: i64,
    pub countdown: Option<u8>,
    pub effects: Vec<HitEffect>,
    pub shake_count: u32,
    pub shaking: bool,
}

/// Single owner of a practice session. Every mutation goes through here.
pub struct Engine<C: Clock, A: AudioEngine> {
    clock: C,
    audio: A,
    options: EngineOptions,
    session: Session,
    epoch_ms: u64,
    paused_elapsed_ms: i64,
    countdown_started_ms: u64,
    countdown_remaining: u8,
    generation: u64,
    effects: VecDeque<HitEffect>,
    next_effect_id: u64,
    shake_count: u32,
    last_shake_elapsed_ms: Option<i64>,
}

impl<C: Clock, A: AudioEngine> Engine<C, A> {
    pub fn new(clock: C, audio: A, options: EngineOptions) -> Self {
        Self {
            clock,
            audio,
            options: EngineOptions {
                countdown_step_ms: options.countdown_step_ms.max(1),
            },
            session: Session::new(),
            epoch_ms: 0,
            paused_elapsed_ms: 0,
            countdown_started_ms: 0,
            countdown_remaining: 0,
            generation: 0,
            effects: VecDeque::new(),
            next_effect_id: 0,
            shake_count: 0,
            last_shake_elapsed_ms: None,
        }
    }

    #[inline(always)]
    pub fn state(&self) -> SessionState {
        self.session.state
    }

    #[inline(always)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    /* ----------------------------- Lifecycle ----------------------------- */

    pub fn select_song(&mut self, song: Arc<Song>) -> Result<(), EngineError> {
        if let Err(e) = self.session.select_song(song) {
            warn!("Refusing song: {e}");
            return Err(e.into());
        }
        Ok(())
    }

    pub fn select_song_by_id<S: SongCatalog + ?Sized>(
        &mut self,
        catalog: &S,
        id: &str,
    ) -> Result<(), EngineError> {
        let Some(song) = catalog.get_by_id(id) else {
            warn!("Song '{id}' not found in catalog");
            return Err(EngineError::UnknownSong(id.to_string()));
        };
        self.select_song(song)
    }

    /// Enters the countdown. Ignored outside `Idle`; errors when no song is selected.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.session.state != SessionState::Idle {
            debug!("Ignoring start() while {:?}", self.session.state);
            return Ok(());
        }
        let Some(song) = self.session.song.clone() else {
            warn!("start() called without a selected song");
            return Err(EngineError::InvalidState("start requires a selected song"));
        };
        if let Err(e) = song.validate() {
            warn!("Refusing to start: {e}");
            return Err(e.into());
        }
        self.session.clear_progress();
        self.clear_feedback();
        self.invalidate_ticks();
        self.countdown_started_ms = self.clock.now_ms();
        self.countdown_remaining = COUNTDOWN_STEPS;
        self.session.state = SessionState::Countdown;
        info!("Countdown started for '{}'", song.id);
        Ok(())
    }

    pub fn pause(&mut self) {
        if self.session.state != SessionState::Playing {
            debug!("Ignoring pause() while {:?}", self.session.state);
            return;
        }
        let elapsed = self.playing_elapsed_ms();
        self.session.advance_to(elapsed);
        self.paused_elapsed_ms = self.session.elapsed_ms;
        self.invalidate_ticks();
        self.session.state = SessionState::Paused;
        info!("Paused at {}ms", self.paused_elapsed_ms);
    }

    pub fn resume(&mut self) {
        if self.session.state != SessionState::Paused {
            debug!("Ignoring resume() while {:?}", self.session.state);
            return;
        }
        let paused = u64::try_from(self.paused_elapsed_ms).unwrap_or(0);
        // Re-base so elapsed continues exactly where pause left it.
        self.epoch_ms = self.clock.now_ms().saturating_sub(paused);
        self.invalidate_ticks();
        self.session.state = SessionState::Playing;
        info!("Resumed at {}ms", self.paused_elapsed_ms);
    }

    /// Valid from any state. Cancels the countdown and every outstanding tick.
    pub fn reset(&mut self) {
        self.invalidate_ticks();
        self.session.reset();
        self.countdown_remaining = 0;
        self.paused_elapsed_ms = 0;
        self.clear_feedback();
        info!("Session reset");
    }

    /* ------------------------------- Input ------------------------------- */

    /// Sounds the pitch and, while playing, judges it. Returns the judgment if a note matched.
    pub fn on_input_down(&mut self, pitch: &str) -> Option<Judgment> {
        self.audio.play(pitch);
        if self.session.state != SessionState::Playing {
            return None;
        }
        let elapsed = self.playing_elapsed_ms();
        let judgment = self.session.judge_input(pitch, elapsed)?;
        self.push_effect(pitch, EffectRating::from(judgment.rating));
        Some(judgment)
    }

    /// Release only reaches audio; it never affects scoring.
    pub fn on_input_up(&mut self, pitch: &str) {
        self.audio.release(pitch);
    }

    /* -------------------------------- Tick ------------------------------- */

    pub fn tick_token(&self) -> TickToken {
        TickToken {
            generation: self.generation,
        }
    }

    /// Runs a previously scheduled tick. Stale tokens are dropped without touching
    /// the session. Returns the token for the next tick while the loop should go on.
    pub fn run_scheduled_tick(&mut self, token: TickToken) -> Option<TickToken> {
        if token.generation != self.generation {
            trace!("Dropping stale tick (generation {} != {})", token.generation, self.generation);
            return None;
        }
        self.tick();
        let keep_going = token.generation == self.generation
            && matches!(
                self.session.state,
                SessionState::Countdown | SessionState::Playing
            );
        keep_going.then_some(token)
    }

    /// One logic pass: countdown, miss sweep, end check, effect expiry.
    pub fn tick(&mut self) -> TickOutcome {
        let now = self.clock.now_ms();
        self.expire_effects(now);
        match self.session.state {
            SessionState::Countdown => {
                self.advance_countdown(now);
                TickOutcome::default()
            }
            SessionState::Playing => {
                let elapsed = self.playing_elapsed_ms();
                let outcome = self.session.update(elapsed);
                if !outcome.missed.is_empty() {
                    self.shake_count = self.shake_count.saturating_add(1);
                    self.last_shake_elapsed_ms = Some(self.session.elapsed_ms);
                    for &idx in &outcome.missed.note_indices {
                        trace!("Missed {}", self.session.notes[idx].id);
                    }
                }
                if outcome.ended {
                    self.invalidate_ticks();
                }
                outcome
            }
            SessionState::Idle | SessionState::Paused | SessionState::Ended => {
                TickOutcome::default()
            }
        }
    }

    /* ------------------------------ Queries ------------------------------ */

    pub fn elapsed_ms(&self) -> i64 {
        match self.session.state {
            SessionState::Playing => self.playing_elapsed_ms().max(self.session.elapsed_ms),
            SessionState::Paused => self.paused_elapsed_ms,
            _ => self.session.elapsed_ms,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let now = self.clock.now_ms();
        let tally = self.session.tally;
        let song = self.session.song.as_ref();
        SessionSnapshot {
            state: self.session.state,
            song_id: song.map(|s| s.id.clone()),
            title: song.map(|s| s.title.clone()),
            notes: self.session.notes.clone(),
            elapsed_ms: self.elapsed_ms(),
            score: tally.score,
            combo: tally.combo,
            max_combo: tally.max_combo,
            stats: tally.stats,
            pending_notes: self.session.pending_count(),
            end_time_ms: self.session.end_time_ms(),
            countdown: (self.session.state == SessionState::Countdown)
                .then_some(self.countdown_remaining),
            effects: self
                .effects
                .iter()
                .filter(|e| now.saturating_sub(e.created_at_ms) < HIT_EFFECT_TTL_MS)
                .cloned()
                .collect(),
            shake_count: self.shake_count,
            shaking: self
                .last_shake_elapsed_ms
                .is_some_and(|t| self.session.elapsed_ms - t < SHAKE_DURATION_MS),
        }
    }

    pub fn summary(&self) -> Option<StageSummary> {
        stage_stats::summarize(&self.session)
    }

    /* ------------------------------ Internals ---------------------------- */

    #[inline(always)]
    fn playing_elapsed_ms(&self) -> i64 {
        self.clock.now_ms().saturating_sub(self.epoch_ms) as i64
    }

    #[inline(always)]
    fn invalidate_ticks(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn advance_countdown(&mut self, now: u64) {
        let steps = now.saturating_sub(self.countdown_started_ms) / self.options.countdown_step_ms;
        let remaining = u64::from(COUNTDOWN_STEPS).saturating_sub(steps) as u8;
        if remaining != self.countdown_remaining && remaining > 0 {
            debug!("Countdown {remaining}");
        }
        self.countdown_remaining = remaining;
        if remaining > 0 {
            return;
        }
        if let Err(e) = self.session.begin_play() {
            warn!("Could not begin play: {e}");
            self.reset();
            return;
        }
        self.epoch_ms = now;
        self.paused_elapsed_ms = 0;
    }

    fn push_effect(&mut self, pitch: &str, rating: EffectRating) {
        let id = self.next_effect_id;
        self.next_effect_id = self.next_effect_id.wrapping_add(1);
        self.effects.push_back(HitEffect {
            id,
            lane_fraction: input::lane_fraction(pitch),
            rating,
            created_at_ms: self.clock.now_ms(),
        });
    }

    fn expire_effects(&mut self, now: u64) {
        while let Some(front) = self.effects.front() {
            if now.saturating_sub(front.created_at_ms) < HIT_EFFECT_TTL_MS {
                break;
            }
            self.effects.pop_front();
        }
    }

    fn clear_feedback(&mut self) {
        self.effects.clear();
        self.shake_count = 0;
        self.last_shake_elapsed_ms = None;
    }
}
