use log::{debug, trace};
use rustc_hash::FxHashSet;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;

/* ============================== Public API ============================== */

/// Note playback collaborator. Calls are fire-and-forget and must be idempotent;
/// the engine never waits on them.
pub trait AudioEngine {
    fn play(&self, pitch: &str);
    fn release(&self, pitch: &str);
}

/// Discards every command.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullAudio;

impl AudioEngine for NullAudio {
    fn play(&self, _pitch: &str) {}
    fn release(&self, _pitch: &str) {}
}

// Commands to whatever owns the synth
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AudioCommand {
    Play(String),
    Release(String),
}

/// Forwards commands over a channel. Send failures (receiver gone) are ignored.
#[derive(Clone, Debug)]
pub struct ChannelAudio {
    command_sender: Sender<AudioCommand>,
}

impl ChannelAudio {
    pub fn new() -> (Self, Receiver<AudioCommand>) {
        let (command_sender, command_receiver) = channel();
        (Self { command_sender }, command_receiver)
    }
}

impl AudioEngine for ChannelAudio {
    fn play(&self, pitch: &str) {
        let _ = self.command_sender.send(AudioCommand::Play(pitch.to_string()));
    }

    fn release(&self, pitch: &str) {
        let _ = self.command_sender.send(AudioCommand::Release(pitch.to_string()));
    }
}

/* ============================ Voice tracking ============================ */

/// Set of sounding pitches. Repeated plays and stray releases are no-ops.
#[derive(Debug, Default)]
pub struct VoiceTracker {
    held: FxHashSet<String>,
}

impl VoiceTracker {
    /// Returns true when the command changed what is sounding.
    pub fn apply(&mut self, command: AudioCommand) -> bool {
        match command {
            AudioCommand::Play(pitch) => self.held.insert(pitch),
            AudioCommand::Release(pitch) => self.held.remove(&pitch),
        }
    }

    pub fn is_sounding(&self, pitch: &str) -> bool {
        self.held.contains(pitch)
    }

    pub fn sounding_count(&self) -> usize {
        self.held.len()
    }
}

/// Consumer thread for a `ChannelAudio`: tracks voices and logs note on/off.
/// Exits once every sender is dropped and returns the total number of note-ons.
pub fn spawn_voice_logger(command_receiver: Receiver<AudioCommand>) -> thread::JoinHandle<u64> {
    thread::spawn(move || {
        let mut voices = VoiceTracker::default();
        let mut note_ons = 0_u64;
        for command in command_receiver.iter() {
            let label = match &command {
                AudioCommand::Play(p) => format!("on  {p}"),
                AudioCommand::Release(p) => format!("off {p}"),
            };
            let is_play = matches!(command, AudioCommand::Play(_));
            if voices.apply(command) {
                if is_play {
                    note_ons += 1;
                }
                trace!("voice {label} ({} sounding)", voices.sounding_count());
            }
        }
        debug!("Voice logger stopped after {note_ons} note-ons");
        note_ons
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_audio_forwards_in_order() {
        let (audio, rx) = ChannelAudio::new();
        audio.play("C4");
        audio.release("C4");
        let got: Vec<AudioCommand> = rx.try_iter().collect();
        assert_eq!(
            got,
            vec![
                AudioCommand::Play("C4".to_string()),
                AudioCommand::Release("C4".to_string())
            ]
        );
    }

    #[test]
    fn sending_after_receiver_drop_is_harmless() {
        let (audio, rx) = ChannelAudio::new();
        drop(rx);
        audio.play("A4");
        audio.release("A4");
    }

    #[test]
    fn voice_tracker_is_idempotent() {
        let mut voices = VoiceTracker::default();
        assert!(voices.apply(AudioCommand::Play("E4".to_string())));
        assert!(!voices.apply(AudioCommand::Play("E4".to_string())));
        assert!(voices.is_sounding("E4"));
        assert!(voices.apply(AudioCommand::Release("E4".to_string())));
        assert!(!voices.apply(AudioCommand::Release("E4".to_string())));
        assert_eq!(voices.sounding_count(), 0);
    }

    #[test]
    fn voice_logger_counts_distinct_note_ons() {
        let (audio, rx) = ChannelAudio::new();
        let handle = spawn_voice_logger(rx);
        audio.play("C4");
        audio.play("C4");
        audio.release("C4");
        audio.play("C4");
        drop(audio);
        assert_eq!(handle.join().unwrap(), 2);
    }
}
