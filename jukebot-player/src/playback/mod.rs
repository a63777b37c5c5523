//! Playback engine: state machine, queue, per-session orchestration

pub mod monitor;
pub mod orchestrator;
pub mod player;
pub mod queue;
pub mod session;
pub mod state;
pub mod volume;

pub use monitor::{LogStatusSink, MessageHandle, StatusSink};
pub use orchestrator::QueueOrchestrator;
pub use player::{FinishReason, Player, SongFinished};
pub use queue::SongQueue;
pub use session::{PlaybackSession, SessionKey, SessionRegistry};
pub use state::{transition, PlayerAction};
