//! Event types for the jukebot event system
//!
//! Broadcast by a playback session over a `tokio::sync::broadcast` channel
//! so observers (command layer, logging, tests) can follow playback without
//! polling.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerState {
    Stopped,
    Paused,
    Playing,
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Stopped => write!(f, "stopped"),
            PlayerState::Paused => write!(f, "paused"),
            PlayerState::Playing => write!(f, "playing"),
        }
    }
}

/// Session event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PlayerEvent {
    /// Playback state changed
    PlaybackStateChanged {
        state: PlayerState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A song started playing (or resumed after a pause)
    SongStarted {
        song_id: Uuid,
        name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A song stopped producing audio
    ///
    /// `completed` is true for a natural end of stream, false for
    /// skip/stop/error.
    SongFinished {
        song_id: Uuid,
        name: String,
        completed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue contents changed (notification only)
    QueueChanged {
        queue_len: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Volume changed
    VolumeChanged {
        volume: f32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl PlayerEvent {
    /// Current timestamp for event construction
    pub fn now() -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_state_display() {
        assert_eq!(PlayerState::Stopped.to_string(), "stopped");
        assert_eq!(PlayerState::Paused.to_string(), "paused");
        assert_eq!(PlayerState::Playing.to_string(), "playing");
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = PlayerEvent::SongStarted {
            song_id: Uuid::new_v4(),
            name: "Test".to_string(),
            timestamp: PlayerEvent::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"SongStarted\""));
    }

    #[test]
    fn event_round_trips() {
        let event = PlayerEvent::SongFinished {
            song_id: Uuid::new_v4(),
            name: "Test".to_string(),
            completed: true,
            timestamp: PlayerEvent::now(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: PlayerEvent = serde_json::from_str(&json).unwrap();
        match back {
            PlayerEvent::SongFinished { completed, name, .. } => {
                assert!(completed);
                assert_eq!(name, "Test");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }
}
