//! Notification sounds and the persisted mute preference

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::{ClientError, ClientResult};

/// Storage key for the persisted mute flag
const MUTE_KEY: &str = "ordersSoundMuted";

/// One synthesized tone: frequency in Hz and duration in milliseconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    pub duration_ms: u64,
}

/// A notification beep pattern
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSequence {
    pub tones: &'static [Tone],
}

/// Rising double beep for a brand-new order
pub const NEW_ORDER_TONES: ToneSequence = ToneSequence {
    tones: &[
        Tone {
            frequency: 880.0,
            duration_ms: 150,
        },
        Tone {
            frequency: 1108.7,
            duration_ms: 250,
        },
    ],
};

/// Single short beep for an order update
pub const ORDER_UPDATED_TONES: ToneSequence = ToneSequence {
    tones: &[Tone {
        frequency: 659.3,
        duration_ms: 180,
    }],
};

/// Plays notification beeps
///
/// Implementations may fail (no audio device, headless CI); failures are
/// logged by the caller and never interrupt event processing.
pub trait NotificationSounds: Send + Sync {
    fn play(&self, sequence: &ToneSequence) -> ClientResult<()>;
}

/// Default sink that only logs; real playback lives in the UI shell
#[derive(Debug, Default)]
pub struct LoggingSounds;

impl NotificationSounds for LoggingSounds {
    fn play(&self, sequence: &ToneSequence) -> ClientResult<()> {
        tracing::debug!(tones = sequence.tones.len(), "Playing notification sound");
        Ok(())
    }
}

/// Persisted per-user mute preference
///
/// The flag is read once at startup and kept in an `AtomicBool`; every
/// toggle writes the file back so the next session starts with the same
/// setting. Stored as the literal strings "true" / "false" under the
/// `ordersSoundMuted` key, one `key=value` line.
#[derive(Debug)]
pub struct SoundPreference {
    muted: AtomicBool,
    path: PathBuf,
}

impl SoundPreference {
    /// Load the preference from a settings file, defaulting to unmuted
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let muted = std::fs::read_to_string(&path)
            .ok()
            .and_then(|content| {
                content.lines().find_map(|line| {
                    let (key, value) = line.split_once('=')?;
                    (key.trim() == MUTE_KEY).then(|| value.trim() == "true")
                })
            })
            .unwrap_or(false);

        Self {
            muted: AtomicBool::new(muted),
            path,
        }
    }

    /// In-memory preference for tests
    pub fn in_memory(muted: bool) -> Self {
        Self {
            muted: AtomicBool::new(muted),
            path: PathBuf::new(),
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Relaxed)
    }

    /// Flip the flag and persist it; returns the new value
    pub fn toggle(&self) -> ClientResult<bool> {
        let muted = !self.muted.load(Ordering::Relaxed);
        self.muted.store(muted, Ordering::Relaxed);
        self.persist(muted)?;
        Ok(muted)
    }

    fn persist(&self, muted: bool) -> ClientResult<()> {
        if self.path.as_os_str().is_empty() {
            return Ok(());
        }
        let value = if muted { "true" } else { "false" };
        std::fs::write(&self.path, format!("{}={}\n", MUTE_KEY, value))
            .map_err(|e| ClientError::Sound(format!("Failed to persist mute flag: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings");

        let pref = SoundPreference::load(&path);
        assert!(!pref.is_muted());

        assert!(pref.toggle().unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), "ordersSoundMuted=true");

        // A fresh load starts muted
        let reloaded = SoundPreference::load(&path);
        assert!(reloaded.is_muted());

        assert!(!reloaded.toggle().unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), "ordersSoundMuted=false");
    }

    #[test]
    fn test_missing_file_defaults_to_unmuted() {
        let pref = SoundPreference::load("/nonexistent/settings");
        assert!(!pref.is_muted());
    }

    #[test]
    fn test_distinct_tone_sequences() {
        assert_ne!(NEW_ORDER_TONES, ORDER_UPDATED_TONES);
    }
}
