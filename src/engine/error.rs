//! Engine error types.

use std::io;
use std::time::Duration;

/// Errors surfaced by the engine driver.
///
/// Every variant is fatal for the call that produced it. Malformed progress
/// lines never show up here; they are logged and skipped by the search loop.
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// The engine executable could not be resolved on the search path.
    #[error("Engine binary not found: {binary}")]
    NotFound { binary: String },

    /// The executable was found but could not be launched.
    #[error("Failed to spawn engine: {0}")]
    Spawn(#[source] io::Error),

    /// A command was written after the engine's input stream closed.
    #[error("Engine input stream closed")]
    StreamClosed,

    /// No line arrived within the read deadline.
    #[error("Timed out after {after:?} waiting for `{waiting_for}`")]
    Timeout {
        waiting_for: String,
        after: Duration,
    },

    /// The engine closed its output stream (the process died or quit).
    #[error("Engine exited unexpectedly")]
    Exited,

    /// A command would span more than one protocol line.
    #[error("Command contains a line break: {0:?}")]
    InvalidCommand(String),

    /// Other I/O error while talking to the engine.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl EngineError {
    /// Classify a spawn failure, mapping a missing executable to `NotFound`.
    pub(crate) fn from_spawn(err: io::Error, binary: &str) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::NotFound {
                binary: binary.to_string(),
            },
            _ => Self::Spawn(err),
        }
    }

    /// Classify a write failure, mapping a closed pipe to `StreamClosed`.
    pub(crate) fn from_write(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof => Self::StreamClosed,
            _ => Self::Io(err),
        }
    }

    /// Whether the engine that produced this error can no longer be trusted.
    ///
    /// A timed-out engine may still be searching, and a closed or exited
    /// one cannot answer at all. Either way the handle must be replaced.
    #[must_use]
    pub fn poisons_engine(&self) -> bool {
        matches!(
            self,
            Self::StreamClosed | Self::Timeout { .. } | Self::Exited | Self::Io(_)
        )
    }
}
