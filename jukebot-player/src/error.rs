//! Error types for jukebot-player
//!
//! Defines module-specific error types using thiserror for clear error
//! propagation.

use thiserror::Error;

/// Main error type for the playback engine
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Song resolution errors (no resolver matched, metadata fetch failed,
    /// stream locator could not be produced)
    #[error("Resolve error: {0}")]
    Resolve(String),

    /// Decoder process errors (spawn failure, broken output stream, stall)
    #[error("Decoder error: {0}")]
    Decoder(String),

    /// Output sink errors (transport disconnected, write failure)
    #[error("Sink error: {0}")]
    Sink(String),

    /// Queue management errors
    #[error("Queue error: {0}")]
    Queue(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Status sink errors (message send/update failed)
    #[error("Status error: {0}")]
    Status(String),

    /// Other errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Convenience Result type using the playback engine Error
pub type Result<T> = std::result::Result<T, Error>;
