use crate::core::audio::AudioEngine;
use crate::core::clock::Clock;
use crate::core::ticker::Ticker;
use crate::engine::{Engine, EngineError, SessionSnapshot};
use crate::game::gameplay::SessionState;
use crate::game::judgment::Judgment;
use crate::game::song::Song;
use crate::game::stage_stats::StageSummary;
use log::debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Multi-threaded host: one mutex around the engine, one ticker thread per run.
/// Input handlers and the ticker take turns on the lock; nothing finer-grained.
pub struct SessionHost<C: Clock, A: AudioEngine> {
    engine: Arc<Mutex<Engine<C, A>>>,
    tick_interval: Duration,
    ticker: Option<Ticker>,
}

impl<C, A> SessionHost<C, A>
where
    C: Clock + Send + 'static,
    A: AudioEngine + Send + 'static,
{
    pub fn new(engine: Engine<C, A>, tick_interval: Duration) -> Self {
        Self {
            engine: Arc::new(Mutex::new(engine)),
            tick_interval,
            ticker: None,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Engine<C, A>> {
        self.engine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn select_song(&self, song: Arc<Song>) -> Result<(), EngineError> {
        self.lock().select_song(song)
    }

    pub fn start(&mut self) -> Result<(), EngineError> {
        let started = {
            let mut engine = self.lock();
            let was_idle = engine.state() == SessionState::Idle;
            engine.start()?;
            was_idle
        };
        if started {
            self.spawn_ticker();
        }
        Ok(())
    }

    pub fn pause(&mut self) {
        self.lock().pause();
        self.stop_ticker();
    }

    pub fn resume(&mut self) {
        let resumed = {
            let mut engine = self.lock();
            engine.resume();
            engine.state() == SessionState::Playing
        };
        if resumed {
            self.spawn_ticker();
        }
    }

    pub fn reset(&mut self) {
        self.lock().reset();
        self.stop_ticker();
    }

    pub fn on_input_down(&self, pitch: &str) -> Option<Judgment> {
        self.lock().on_input_down(pitch)
    }

    pub fn on_input_up(&self, pitch: &str) {
        self.lock().on_input_up(pitch);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot()
    }

    pub fn summary(&self) -> Option<StageSummary> {
        self.lock().summary()
    }

    pub fn is_ticking(&self) -> bool {
        self.ticker.as_ref().is_some_and(|t| !t.is_finished())
    }

    fn spawn_ticker(&mut self) {
        // The previous loop holds a token invalidated by the transition that got us here.
        self.stop_ticker();
        let engine = Arc::clone(&self.engine);
        let mut token = Some(self.lock().tick_token());
        debug!("Spawning tick loop every {:?}", self.tick_interval);
        self.ticker = Some(Ticker::spawn(self.tick_interval, move || {
            let Some(current) = token else {
                return false;
            };
            token = engine
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .run_scheduled_tick(current);
            token.is_some()
        }));
    }

    fn stop_ticker(&mut self) {
        if let Some(mut ticker) = self.ticker.take() {
            ticker.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::NullAudio;
    use crate::core::clock::ManualClock;
    use crate::engine::EngineOptions;
    use crate::game::song::{Difficulty, ScheduledNote};
    use std::time::Instant;

    fn song() -> Arc<Song> {
        Arc::new(Song {
            id: "host".to_string(),
            title: "Host".to_string(),
            artist: "A".to_string(),
            difficulty: Difficulty::Easy,
            bpm: 100,
            notes: vec![
                ScheduledNote { pitch: "C4".to_string(), start_ms: 0, duration_ms: 100 },
                ScheduledNote { pitch: "E4".to_string(), start_ms: 500, duration_ms: 100 },
            ],
        })
    }

    fn host() -> (SessionHost<ManualClock, NullAudio>, ManualClock) {
        let clock = ManualClock::new();
        let engine = Engine::new(clock.clone(), NullAudio, EngineOptions::default());
        (SessionHost::new(engine, Duration::from_millis(1)), clock)
    }

    fn wait_for<F: FnMut() -> bool>(mut cond: F) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        false
    }

    #[test]
    fn ticker_drives_countdown_play_and_end() {
        let (mut host, clock) = host();
        host.select_song(song()).unwrap();
        host.start().unwrap();
        assert!(host.is_ticking());
        clock.set(3000);
        assert!(wait_for(|| host.snapshot().state == SessionState::Playing));

        clock.set(3000 + 2500);
        assert!(host.on_input_down("C4").is_some());
        host.on_input_up("C4");

        clock.set(3000 + 4001);
        assert!(wait_for(|| host.snapshot().state == SessionState::Ended));
        assert!(wait_for(|| !host.is_ticking()), "loop stops once the session ends");
        let summary = host.summary().unwrap();
        assert_eq!(summary.stats.perfect, 1);
        assert_eq!(summary.stats.miss, 1);
    }

    #[test]
    fn pause_stops_the_loop_and_resume_restarts_it() {
        let (mut host, clock) = host();
        host.select_song(song()).unwrap();
        host.start().unwrap();
        clock.set(3000);
        assert!(wait_for(|| host.snapshot().state == SessionState::Playing));
        clock.set(3100);
        host.pause();
        assert!(!host.is_ticking());
        let frozen = host.snapshot().elapsed_ms;
        clock.set(60_000);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(host.snapshot().elapsed_ms, frozen);
        assert_eq!(host.snapshot().stats.miss, 0, "no tick may run while paused");

        host.resume();
        assert!(host.is_ticking());
        clock.set(60_050);
        assert!(wait_for(|| host.snapshot().elapsed_ms >= frozen + 50));
    }

    #[test]
    fn reset_leaves_an_idle_session_untouched() {
        let (mut host, clock) = host();
        host.select_song(song()).unwrap();
        host.start().unwrap();
        clock.set(3000);
        assert!(wait_for(|| host.snapshot().state == SessionState::Playing));
        host.reset();
        assert!(!host.is_ticking());
        clock.set(100_000);
        std::thread::sleep(Duration::from_millis(5));
        let snap = host.snapshot();
        assert_eq!(snap.state, SessionState::Idle);
        assert!(snap.notes.is_empty());
        assert_eq!(snap.stats.miss, 0);
    }

    #[test]
    fn start_without_song_spawns_nothing() {
        let (mut host, _) = host();
        assert!(host.start().is_err());
        assert!(!host.is_ticking());
    }
}
