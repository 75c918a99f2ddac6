use rustc_hash::FxHashSet;

/* ------------------------ Keyboard layout ------------------------ */

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PianoKey {
    pub pitch: &'static str,
    pub key: char,
    pub is_black: bool,
}

const fn white(pitch: &'static str, key: char) -> PianoKey {
    PianoKey {
        pitch,
        key,
        is_black: false,
    }
}

const fn black(pitch: &'static str, key: char) -> PianoKey {
    PianoKey {
        pitch,
        key,
        is_black: true,
    }
}

/// Two-octave home-row layout, left to right.
pub const PIANO_KEYS: [PianoKey; 17] = [
    white("C4", 'a'),
    black("C#4", 'w'),
    white("D4", 's'),
    black("D#4", 'e'),
    white("E4", 'd'),
    white("F4", 'f'),
    black("F#4", 't'),
    white("G4", 'g'),
    black("G#4", 'y'),
    white("A4", 'h'),
    black("A#4", 'u'),
    white("B4", 'j'),
    white("C5", 'k'),
    black("C#5", 'o'),
    white("D5", 'l'),
    black("D#5", 'p'),
    white("E5", ';'),
];

#[inline(always)]
pub fn pitch_for_key(key: char) -> Option<&'static str> {
    let key = key.to_ascii_lowercase();
    PIANO_KEYS.iter().find(|k| k.key == key).map(|k| k.pitch)
}

/// Horizontal centre of a pitch's key across the keyboard, in `[0, 1]`.
/// Black keys sit on the boundary between their neighbouring white keys.
/// Pitches outside the layout land in the middle.
pub fn lane_fraction(pitch: &str) -> f64 {
    let white_count = PIANO_KEYS.iter().filter(|k| !k.is_black).count() as f64;
    let mut whites_before = 0_usize;
    for k in &PIANO_KEYS {
        if k.pitch == pitch {
            let pos = if k.is_black {
                whites_before as f64
            } else {
                whites_before as f64 + 0.5
            };
            return (pos / white_count).clamp(0.0, 1.0);
        }
        if !k.is_black {
            whites_before += 1;
        }
    }
    0.5
}

/* ------------------------ Events ------------------------ */

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PitchEvent {
    pub pitch: String,
    pub pressed: bool,
}

/// Turns raw key events into de-duplicated pitch events. OS auto-repeat and
/// repeated presses of a held key are dropped, as are releases of keys never pressed.
#[derive(Debug, Default)]
pub struct KeyboardInput {
    held: FxHashSet<char>,
}

impl KeyboardInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_event(&mut self, key: char, pressed: bool, repeat: bool) -> Option<PitchEvent> {
        let key = key.to_ascii_lowercase();
        let pitch = pitch_for_key(key)?;
        if pressed {
            if repeat || !self.held.insert(key) {
                return None;
            }
        } else if !self.held.remove(&key) {
            return None;
        }
        Some(PitchEvent {
            pitch: pitch.to_string(),
            pressed,
        })
    }

    /// Releases every held key, e.g. when the window loses focus.
    pub fn release_all(&mut self) -> Vec<PitchEvent> {
        let mut out: Vec<PitchEvent> = self
            .held
            .drain()
            .filter_map(pitch_for_key)
            .map(|pitch| PitchEvent {
                pitch: pitch.to_string(),
                pressed: false,
            })
            .collect();
        out.sort_by(|a, b| a.pitch.cmp(&b.pitch));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_pitches() {
        assert_eq!(pitch_for_key('a'), Some("C4"));
        assert_eq!(pitch_for_key('G'), Some("G4"));
        assert_eq!(pitch_for_key(';'), Some("E5"));
        assert_eq!(pitch_for_key('p'), Some("D#5"));
        assert_eq!(pitch_for_key('z'), None);
    }

    #[test]
    fn lane_fractions_follow_key_positions() {
        assert!((lane_fraction("C4") - 0.05).abs() < 1e-9);
        assert!((lane_fraction("C#4") - 0.1).abs() < 1e-9);
        assert!((lane_fraction("E5") - 0.95).abs() < 1e-9);
        assert!((lane_fraction("G#4") - 0.5).abs() < 1e-9);
        assert_eq!(lane_fraction("C8"), 0.5);
        for k in &PIANO_KEYS {
            let f = lane_fraction(k.pitch);
            assert!((0.0..=1.0).contains(&f), "{} out of range", k.pitch);
        }
    }

    #[test]
    fn repeats_and_stray_releases_are_dropped() {
        let mut input = KeyboardInput::new();
        let down = input.key_event('g', true, false).unwrap();
        assert_eq!(down, PitchEvent { pitch: "G4".to_string(), pressed: true });
        assert!(input.key_event('g', true, true).is_none(), "auto-repeat");
        assert!(input.key_event('G', true, false).is_none(), "already held");
        assert!(!input.key_event('g', false, false).unwrap().pressed);
        assert!(input.key_event('g', false, false).is_none(), "not held");
        assert!(input.key_event('x', true, false).is_none(), "unmapped");
    }

    #[test]
    fn release_all_clears_held_keys() {
        let mut input = KeyboardInput::new();
        input.key_event('a', true, false);
        input.key_event('h', true, false);
        let released = input.release_all();
        let pitches: Vec<&str> = released.iter().map(|e| e.pitch.as_str()).collect();
        assert_eq!(pitches, vec!["A4", "C4"]);
        assert!(released.iter().all(|e| !e.pressed));
        assert!(input.key_event('a', false, false).is_none());
    }
}
