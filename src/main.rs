use keysync::config::{self, Config};
use keysync::core::audio::{ChannelAudio, spawn_voice_logger};
use keysync::core::clock::{ManualClock, MonotonicClock};
use keysync::engine::{Engine, EngineOptions};
use keysync::game::gameplay::SessionState;
use keysync::game::song::{BuiltinCatalog, Song, SongCatalog};
use keysync::game::stage_stats::StageSummary;
use keysync::game::timing_windows::target_time_ms;
use keysync::host::SessionHost;
use log::info;
use std::sync::Arc;
use std::time::Duration;

/// Scripted key event for the autoplayer, in session time.
struct AutoEvent {
    at_ms: i64,
    pitch: String,
    pressed: bool,
}

fn autoplay_script(song: &Song, offset_ms: i64) -> Vec<AutoEvent> {
    let mut events = Vec::with_capacity(song.notes.len() * 2);
    for n in &song.notes {
        let press = target_time_ms(n.start_ms).saturating_add(offset_ms);
        events.push(AutoEvent { at_ms: press, pitch: n.pitch.clone(), pressed: true });
        events.push(AutoEvent {
            at_ms: press.saturating_add(n.duration_ms),
            pitch: n.pitch.clone(),
            pressed: false,
        });
    }
    // releases before presses at the same instant so repeated pitches re-trigger
    events.sort_by_key(|e| (e.at_ms, e.pressed));
    events
}

fn run_simulated(
    song: Arc<Song>,
    cfg: &Config,
    audio: ChannelAudio,
) -> Result<Option<StageSummary>, Box<dyn std::error::Error>> {
    let clock = ManualClock::new();
    let mut engine = Engine::new(clock.clone(), audio, EngineOptions::from(cfg));
    engine.select_song(song.clone())?;
    engine.start()?;
    while engine.state() == SessionState::Countdown {
        clock.advance(cfg.tick_interval_ms);
        engine.tick();
    }

    let events = autoplay_script(&song, cfg.autoplay_offset_ms);
    let mut next = 0;
    while engine.state() == SessionState::Playing {
        let tick_at = engine.elapsed_ms() + cfg.tick_interval_ms as i64;
        while let Some(ev) = events.get(next).filter(|e| e.at_ms <= tick_at) {
            clock.advance(ev.at_ms.saturating_sub(engine.elapsed_ms()).max(0) as u64);
            if ev.pressed {
                engine.on_input_down(&ev.pitch);
            } else {
                engine.on_input_up(&ev.pitch);
            }
            next += 1;
        }
        clock.advance(tick_at.saturating_sub(engine.elapsed_ms()).max(0) as u64);
        engine.tick();
    }
    Ok(engine.summary())
}

fn run_realtime(
    song: Arc<Song>,
    cfg: &Config,
    audio: ChannelAudio,
) -> Result<Option<StageSummary>, Box<dyn std::error::Error>> {
    let engine = Engine::new(MonotonicClock::new(), audio, EngineOptions::from(cfg));
    let mut host = SessionHost::new(engine, Duration::from_millis(cfg.tick_interval_ms));
    host.select_song(song.clone())?;
    host.start()?;

    let events = autoplay_script(&song, cfg.autoplay_offset_ms);
    let mut next = 0;
    let mut last_countdown = None;
    loop {
        let snap = host.snapshot();
        match snap.state {
            SessionState::Countdown => {
                if snap.countdown != last_countdown {
                    info!("{}...", snap.countdown.unwrap_or(0));
                    last_countdown = snap.countdown;
                }
            }
            SessionState::Playing => {
                while let Some(ev) = events.get(next).filter(|e| e.at_ms <= snap.elapsed_ms) {
                    if ev.pressed {
                        host.on_input_down(&ev.pitch);
                    } else {
                        host.on_input_up(&ev.pitch);
                    }
                    next += 1;
                }
            }
            SessionState::Ended | SessionState::Idle | SessionState::Paused => break,
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    Ok(host.summary())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Install logger immediately, then set runtime max level from config after loading it.
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    // Startup default when config is missing or malformed.
    log::set_max_level(log::LevelFilter::Warn);

    config::load();
    if let Some(song_id) = std::env::args().nth(1) {
        config::update_default_song(&song_id);
    }
    let cfg = config::get();
    log::set_max_level(cfg.log_level.as_level_filter());

    let catalog = BuiltinCatalog::load()?;
    let Some(song) = catalog.get_by_id(&cfg.default_song) else {
        let ids: Vec<&str> = catalog.all().iter().map(|s| s.id.as_str()).collect();
        let msg = format!("unknown song '{}'; available: {}", cfg.default_song, ids.join(", "));
        return Err(msg.into());
    };
    info!(
        "Playing '{}' by {} ({}, {} notes)",
        song.title,
        song.artist,
        song.difficulty.as_str(),
        song.notes.len()
    );

    let (audio, audio_rx) = ChannelAudio::new();
    let voices = spawn_voice_logger(audio_rx);
    let summary = if cfg.realtime {
        run_realtime(song, &cfg, audio)?
    } else {
        run_simulated(song, &cfg, audio)?
    };
    // all senders are gone once the engine is dropped
    let note_ons = voices.join().unwrap_or(0);
    info!("{note_ons} notes sounded");

    match summary {
        Some(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
        None => log::warn!("Session did not reach the end"),
    }
    Ok(())
}
