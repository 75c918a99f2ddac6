use crate::game::timing_windows::MAX_START_MS;
use log::{debug, warn};
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

const BUILTIN_SONGS_JSON: &str = include_str!("../../assets/songs.json");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Easy => "Easy",
            Self::Medium => "Medium",
            Self::Hard => "Hard",
        }
    }
}

impl FromStr for Difficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => Err(()),
        }
    }
}

/// One note of a song, positioned as an absolute offset from song start.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledNote {
    pub pitch: String,
    pub start_ms: i64,
    pub duration_ms: i64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Song {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub bpm: u32,
    pub notes: Vec<ScheduledNote>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SongDataError {
    #[error("song '{song_id}' has no notes")]
    EmptyNotes { song_id: String },
    #[error("song '{song_id}' note {index} starts at negative time {start_ms}ms")]
    NegativeStart {
        song_id: String,
        index: usize,
        start_ms: i64,
    },
    #[error("song '{song_id}' note {index} starts too late at {start_ms}ms")]
    StartOutOfRange {
        song_id: String,
        index: usize,
        start_ms: i64,
    },
    #[error("song '{song_id}' note {index} has non-positive duration {duration_ms}ms")]
    NonPositiveDuration {
        song_id: String,
        index: usize,
        duration_ms: i64,
    },
    #[error("song '{song_id}' note {index} has an empty pitch")]
    EmptyPitch { song_id: String, index: usize },
}

impl Song {
    /// Rejects songs whose notes would corrupt position math.
    pub fn validate(&self) -> Result<(), SongDataError> {
        if self.notes.is_empty() {
            return Err(SongDataError::EmptyNotes {
                song_id: self.id.clone(),
            });
        }
        for (index, note) in self.notes.iter().enumerate() {
            if note.pitch.trim().is_empty() {
                return Err(SongDataError::EmptyPitch {
                    song_id: self.id.clone(),
                    index,
                });
            }
            if note.start_ms < 0 {
                return Err(SongDataError::NegativeStart {
                    song_id: self.id.clone(),
                    index,
                    start_ms: note.start_ms,
                });
            }
            if note.start_ms > MAX_START_MS {
                return Err(SongDataError::StartOutOfRange {
                    song_id: self.id.clone(),
                    index,
                    start_ms: note.start_ms,
                });
            }
            if note.duration_ms <= 0 {
                return Err(SongDataError::NonPositiveDuration {
                    song_id: self.id.clone(),
                    index,
                    duration_ms: note.duration_ms,
                });
            }
        }
        Ok(())
    }

    /// Latest scheduled start. Notes are not required to be sorted.
    pub fn last_start_ms(&self) -> i64 {
        self.notes.iter().map(|n| n.start_ms).max().unwrap_or(0)
    }
}

/// Read-only source of song definitions.
pub trait SongCatalog {
    fn get_by_id(&self, id: &str) -> Option<Arc<Song>>;
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read song catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse song catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    InvalidSong(#[from] SongDataError),
    #[error("duplicate song id '{0}'")]
    DuplicateId(String),
}

#[derive(Clone, Debug, Default)]
pub struct BuiltinCatalog {
    songs: Vec<Arc<Song>>,
}

impl BuiltinCatalog {
    /// Loads the songs bundled with the crate.
    pub fn load() -> Result<Self, CatalogError> {
        Self::from_json_str(BUILTIN_SONGS_JSON)
    }

    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        debug!("Loading song catalog from {}", path.as_ref().display());
        Self::from_json_str(&content)
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let parsed: Vec<Song> = serde_json::from_str(json)?;
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut songs = Vec::with_capacity(parsed.len());
        for song in parsed {
            if let Err(e) = song.validate() {
                warn!("Rejecting song catalog: {e}");
                return Err(e.into());
            }
            if !seen.insert(song.id.clone()) {
                return Err(CatalogError::DuplicateId(song.id));
            }
            songs.push(Arc::new(song));
        }
        debug!("Song catalog holds {} songs", songs.len());
        Ok(Self { songs })
    }

    pub fn all(&self) -> &[Arc<Song>] {
        &self.songs
    }

    pub fn by_difficulty(&self, difficulty: Difficulty) -> Vec<Arc<Song>> {
        self.songs
            .iter()
            .filter(|s| s.difficulty == difficulty)
            .cloned()
            .collect()
    }
}

impl SongCatalog for BuiltinCatalog {
    fn get_by_id(&self, id: &str) -> Option<Arc<Song>> {
        self.songs.iter().find(|s| s.id == id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(pitch: &str, start_ms: i64, duration_ms: i64) -> ScheduledNote {
        ScheduledNote {
            pitch: pitch.to_string(),
            start_ms,
            duration_ms,
        }
    }

    fn song_with(notes: Vec<ScheduledNote>) -> Song {
        Song {
            id: "test".to_string(),
            title: "Test".to_string(),
            artist: "Nobody".to_string(),
            difficulty: Difficulty::Easy,
            bpm: 100,
            notes,
        }
    }

    #[test]
    fn builtin_catalog_loads_every_song() {
        let catalog = BuiltinCatalog::load().expect("bundled songs should parse and validate");
        assert_eq!(catalog.all().len(), 9);
        let birthday = catalog.get_by_id("happy-birthday").expect("happy-birthday exists");
        assert_eq!(birthday.title, "Happy Birthday");
        assert_eq!(birthday.notes[0], note("G4", 0, 250));
        assert_eq!(birthday.notes.len(), 24);
        assert!(catalog.get_by_id("missing").is_none());
    }

    #[test]
    fn by_difficulty_filters() {
        let catalog = BuiltinCatalog::load().unwrap();
        let hard: Vec<String> = catalog
            .by_difficulty(Difficulty::Hard)
            .iter()
            .map(|s| s.id.clone())
            .collect();
        assert_eq!(hard, vec!["fur-elise".to_string(), "moonlight".to_string()]);
        assert_eq!(catalog.by_difficulty(Difficulty::Easy).len(), 4);
    }

    #[test]
    fn validation_rejects_malformed_songs() {
        assert!(matches!(
            song_with(vec![]).validate(),
            Err(SongDataError::EmptyNotes { .. })
        ));
        assert!(matches!(
            song_with(vec![note("C4", 0, 100), note("D4", -5, 100)]).validate(),
            Err(SongDataError::NegativeStart { index: 1, start_ms: -5, .. })
        ));
        assert!(matches!(
            song_with(vec![note("C4", 0, 0)]).validate(),
            Err(SongDataError::NonPositiveDuration { index: 0, .. })
        ));
        assert!(matches!(
            song_with(vec![note(" ", 0, 10)]).validate(),
            Err(SongDataError::EmptyPitch { index: 0, .. })
        ));
        assert!(song_with(vec![note("C4", 0, 1)]).validate().is_ok());
    }

    #[test]
    fn validation_caps_start_times() {
        assert!(matches!(
            song_with(vec![note("C4", 0, 100), note("E4", i64::MAX - 10, 100)]).validate(),
            Err(SongDataError::StartOutOfRange { index: 1, .. })
        ));
        assert!(matches!(
            song_with(vec![note("C4", MAX_START_MS + 1, 100)]).validate(),
            Err(SongDataError::StartOutOfRange { index: 0, .. })
        ));
        assert!(song_with(vec![note("C4", MAX_START_MS, 100)]).validate().is_ok());

        let late = format!(
            r#"[{{"id": "late", "title": "L", "artist": "X", "difficulty": "Easy",
            "notes": [{{"pitch": "C4", "start_ms": {}, "duration_ms": 1}}]}}]"#,
            i64::MAX - 10
        );
        assert!(matches!(
            BuiltinCatalog::from_json_str(&late),
            Err(CatalogError::InvalidSong(SongDataError::StartOutOfRange { .. }))
        ));
    }

    #[test]
    fn last_start_ignores_ordering() {
        let song = song_with(vec![note("C4", 900, 100), note("D4", 100, 100)]);
        assert_eq!(song.last_start_ms(), 900);
    }

    #[test]
    fn catalog_rejects_duplicates_and_bad_json() {
        let dup = r#"[
            {"id": "a", "title": "A", "artist": "X", "difficulty": "Easy", "notes": [{"pitch": "C4", "start_ms": 0, "duration_ms": 1}]},
            {"id": "a", "title": "A2", "artist": "X", "difficulty": "Hard", "notes": [{"pitch": "C4", "start_ms": 0, "duration_ms": 1}]}
        ]"#;
        assert!(matches!(
            BuiltinCatalog::from_json_str(dup),
            Err(CatalogError::DuplicateId(id)) if id == "a"
        ));
        assert!(matches!(
            BuiltinCatalog::from_json_str("{not json"),
            Err(CatalogError::Parse(_))
        ));
        let negative = r#"[{"id": "n", "title": "N", "artist": "X", "difficulty": "Medium",
            "notes": [{"pitch": "C4", "start_ms": -1, "duration_ms": 1}]}]"#;
        assert!(matches!(
            BuiltinCatalog::from_json_str(negative),
            Err(CatalogError::InvalidSong(SongDataError::NegativeStart { .. }))
        ));
    }

    #[test]
    fn difficulty_parses_case_insensitively() {
        assert_eq!("hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert_eq!(Difficulty::Medium.as_str(), "Medium");
        assert!("expert".parse::<Difficulty>().is_err());
    }
}
