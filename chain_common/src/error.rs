//! Error types shared between the chain server and the dashboard client.
//!
//! The `ChainError` enum unifies common failure cases for I/O, serialization,
//! channel communication, inbound data problems and configuration, allowing crates
//! to propagate a single error type.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by client and server.
#[derive(Error, Debug)]
pub enum ChainError {
    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Generic formatting/validation error with a human-readable message.
    #[error("Format error: {0}")]
    Format(String),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Crossbeam/channel send failed (e.g., receiver dropped); contains a short context string.
    #[error("Channel send failed: {0}")]
    ChannelSend(String),

    /// Crossbeam/channel receive failed (e.g., sender closed); contains a short context string.
    #[error("Channel receive failed: {0}")]
    ChannelRecv(String),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),

    /// Inbound payload is missing expected fields or carries values of the wrong type.
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Error while parsing the option series listing.
    #[error("Parse series error: {0}")]
    ParseSeries(String),

    /// A subscription id is already bound to a different target.
    #[error("Subscription id {0} is already registered for another target")]
    DuplicateSubscription(String),

    /// Invalid startup configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl<T> From<PoisonError<T>> for ChainError {
    fn from(err: PoisonError<T>) -> Self {
        ChainError::MutexLock(err.to_string())
    }
}
