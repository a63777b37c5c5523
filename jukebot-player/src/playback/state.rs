//! Playback state machine transition table
//!
//! An explicit (state, action) match rather than a table-driven library.
//! The table is pure; `Player` applies entry actions (task launch,
//! cancellation, position bookkeeping) around it.

pub use jukebot_common::PlayerState;

/// Actions understood by the playback state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerAction {
    /// Start or resume playback of a song
    Play,
    /// Pause the current song, persisting its position
    Pause,
    /// Stop playback, resetting the recorded position
    Stop,
    /// Internal event from the streaming loop: the song stopped producing
    /// audio (natural end or unrecoverable error)
    SongFinished,
    /// Internal transition: store a new gain for the next frame written
    ChangeVolume,
}

/// Compute the state transition for an action.
///
/// `Some(next)` is a permitted transition (possibly a self-transition);
/// `None` means the action is ignored in this state, never an error.
pub fn transition(state: PlayerState, action: PlayerAction) -> Option<PlayerState> {
    use PlayerAction::*;
    use PlayerState::*;

    match (state, action) {
        (Stopped, Play) | (Paused, Play) => Some(Playing),
        (Playing, Play) => None,

        (Playing, Pause) => Some(Paused),
        (Paused, Pause) | (Stopped, Pause) => None,

        (Playing, Stop) | (Paused, Stop) => Some(Stopped),
        (Stopped, Stop) => None,

        (Playing, SongFinished) => Some(Stopped),
        // idempotent when the song already stopped
        (Stopped, SongFinished) => Some(Stopped),
        (Paused, SongFinished) => None,

        // volume changes are valid in every state and change none of them
        (state, ChangeVolume) => Some(state),
    }
}
