use ini::Ini;
use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

const CONFIG_PATH: &str = "keysync.ini";
const SECTION: &str = "Options";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub log_level: LogLevel,
    /// Sleep between ticks of the threaded host.
    pub tick_interval_ms: u64,
    /// Length of each of the three countdown steps.
    pub countdown_step_ms: u64,
    pub default_song: String,
    // 0 = simulate on a manual clock, 1 = play in real time
    pub realtime: bool,
    // Autoplayer press offset from each target; negative presses early.
    pub autoplay_offset_ms: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn,
            tick_interval_ms: 16,
            countdown_step_ms: 1000,
            default_song: "happy-birthday".to_string(),
            realtime: false,
            autoplay_offset_ms: 0,
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: std::sync::LazyLock<Mutex<Config>> =
    std::sync::LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

#[inline(always)]
fn parse_flag(v: &str) -> Option<bool> {
    let v = v.trim();
    if v.eq_ignore_ascii_case("true") || v.eq_ignore_ascii_case("yes") || v.eq_ignore_ascii_case("on") {
        Some(true)
    } else if v.eq_ignore_ascii_case("false")
        || v.eq_ignore_ascii_case("no")
        || v.eq_ignore_ascii_case("off")
    {
        Some(false)
    } else {
        v.parse::<u8>().ok().map(|n| n != 0)
    }
}

fn to_ini(config: &Config) -> Ini {
    let mut conf = Ini::new();
    // keys in alphabetical order
    conf.with_section(Some(SECTION))
        .set("AutoplayOffsetMs", config.autoplay_offset_ms.to_string())
        .set("CountdownStepMs", config.countdown_step_ms.to_string())
        .set("DefaultSong", config.default_song.as_str())
        .set("LogLevel", config.log_level.as_str())
        .set("Realtime", if config.realtime { "1" } else { "0" })
        .set("TickIntervalMs", config.tick_interval_ms.to_string());
    conf
}

/// Builds a config from parsed INI data, using defaults for missing or malformed keys.
pub fn from_ini(conf: &Ini) -> Config {
    let default = Config::default();
    let get = |key: &str| conf.get_from(Some(SECTION), key).map(str::trim);

    Config {
        log_level: get("LogLevel")
            .and_then(|v| LogLevel::from_str(v).ok())
            .unwrap_or(default.log_level),
        tick_interval_ms: get("TickIntervalMs")
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default.tick_interval_ms, |v| v.clamp(1, 250)),
        countdown_step_ms: get("CountdownStepMs")
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(default.countdown_step_ms, |v| v.clamp(1, 5000)),
        default_song: get("DefaultSong")
            .filter(|v| !v.is_empty())
            .map_or(default.default_song, str::to_string),
        realtime: get("Realtime")
            .and_then(parse_flag)
            .unwrap_or(default.realtime),
        autoplay_offset_ms: get("AutoplayOffsetMs")
            .and_then(|v| v.parse::<i64>().ok())
            .map_or(default.autoplay_offset_ms, |v| v.clamp(-400, 400)),
    }
}

fn create_default_config_file() -> Result<(), std::io::Error> {
    info!("'{CONFIG_PATH}' not found, creating with default values.");
    to_ini(&Config::default()).write_to_file(CONFIG_PATH)
}

pub fn load() {
    if !Path::new(CONFIG_PATH).exists()
        && let Err(e) = create_default_config_file()
    {
        warn!("Failed to create default config file: {e}");
    }

    match Ini::load_from_file(CONFIG_PATH) {
        Ok(conf) => {
            let loaded = from_ini(&conf);
            info!("Configuration loaded from '{CONFIG_PATH}'.");
            *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = loaded;
        }
        Err(e) => {
            warn!("Failed to load '{CONFIG_PATH}': {e}. Using default values.");
        }
    }
}

pub fn get() -> Config {
    CONFIG.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

pub fn update_default_song(song_id: &str) {
    CONFIG
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .default_song = song_id.to_string();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let conf = Ini::load_from_str("[Options]\nLogLevel=debug\n").unwrap();
        let cfg = from_ini(&conf);
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.tick_interval_ms, 16);
        assert_eq!(cfg.default_song, "happy-birthday");
        assert!(!cfg.realtime);
    }

    #[test]
    fn values_are_parsed_and_clamped() {
        let text = "[Options]\n\
            TickIntervalMs=0\n\
            CountdownStepMs=999999\n\
            DefaultSong=moonlight\n\
            Realtime=yes\n\
            AutoplayOffsetMs=-1000\n\
            LogLevel=loud\n";
        let cfg = from_ini(&Ini::load_from_str(text).unwrap());
        assert_eq!(cfg.tick_interval_ms, 1);
        assert_eq!(cfg.countdown_step_ms, 5000);
        assert_eq!(cfg.default_song, "moonlight");
        assert!(cfg.realtime);
        assert_eq!(cfg.autoplay_offset_ms, -400);
        assert_eq!(cfg.log_level, LogLevel::Warn, "unknown levels keep the default");
    }

    #[test]
    fn written_defaults_read_back_identically() {
        let mut buf = Vec::new();
        to_ini(&Config::default()).write_to(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let cfg = from_ini(&Ini::load_from_str(&text).unwrap());
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn log_levels_map_to_filters() {
        assert_eq!(LogLevel::Off.as_level_filter(), log::LevelFilter::Off);
        assert_eq!("Trace".parse::<LogLevel>().unwrap().as_level_filter(), log::LevelFilter::Trace);
    }
}
