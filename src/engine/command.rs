//! UCI commands and the line writer that delivers them.

use std::fmt;

use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::EngineError;

/// Search depth used when a request names neither depth nor move time.
pub const DEFAULT_DEPTH: u32 = 12;

/// Bound on a single search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    /// Search to a fixed depth in plies.
    Depth(u32),
    /// Search for a fixed time in milliseconds.
    MoveTime(u64),
}

impl SearchLimit {
    /// Pick a limit from optional depth and move time.
    ///
    /// Depth wins when both are given; with neither, the default depth
    /// applies.
    #[must_use]
    pub fn from_options(depth: Option<u32>, movetime_ms: Option<u64>) -> Self {
        match (depth, movetime_ms) {
            (Some(depth), _) => Self::Depth(depth),
            (None, Some(ms)) => Self::MoveTime(ms),
            (None, None) => Self::default(),
        }
    }
}

impl Default for SearchLimit {
    fn default() -> Self {
        Self::Depth(DEFAULT_DEPTH)
    }
}

/// Commands this driver sends to an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UciCommand {
    Uci,
    IsReady,
    UciNewGame,
    Position { fen: String },
    SetOption { name: String, value: String },
    Go(SearchLimit),
    Quit,
}

impl fmt::Display for UciCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uci => f.write_str("uci"),
            Self::IsReady => f.write_str("isready"),
            Self::UciNewGame => f.write_str("ucinewgame"),
            Self::Position { fen } => write!(f, "position fen {fen}"),
            Self::SetOption { name, value } => write!(f, "setoption name {name} value {value}"),
            Self::Go(SearchLimit::Depth(depth)) => write!(f, "go depth {depth}"),
            Self::Go(SearchLimit::MoveTime(ms)) => write!(f, "go movetime {ms}"),
            Self::Quit => f.write_str("quit"),
        }
    }
}

/// Writes newline-terminated commands to the engine's stdin.
///
/// Every command is flushed before `send_line` returns. Once a write hits a
/// closed pipe the writer stays closed.
pub struct CommandWriter {
    inner: Option<Box<dyn AsyncWrite + Send + Unpin>>,
}

impl CommandWriter {
    /// Create a writer over any async byte sink.
    pub fn new<W>(inner: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            inner: Some(Box::new(inner)),
        }
    }

    /// Whether the underlying stream is still open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Send a typed command.
    ///
    /// # Errors
    ///
    /// See [`CommandWriter::send_line`].
    pub async fn send(&mut self, command: &UciCommand) -> Result<(), EngineError> {
        self.send_line(&command.to_string()).await
    }

    /// Write one line of text followed by a newline, then flush.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::InvalidCommand` if `text` contains a line break,
    /// `EngineError::StreamClosed` if the stream is closed, or
    /// `EngineError::Io` for other write failures.
    pub async fn send_line(&mut self, text: &str) -> Result<(), EngineError> {
        if text.contains(['\n', '\r']) {
            return Err(EngineError::InvalidCommand(text.to_string()));
        }
        let Some(writer) = self.inner.as_mut() else {
            return Err(EngineError::StreamClosed);
        };

        tracing::debug!(command = %text, "Sending UCI command");
        let mut line = String::with_capacity(text.len() + 1);
        line.push_str(text);
        line.push('\n');

        let result = match writer.write_all(line.as_bytes()).await {
            Ok(()) => writer.flush().await,
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            let err = EngineError::from_write(e);
            if matches!(err, EngineError::StreamClosed) {
                self.inner = None;
            }
            err
        })
    }

    /// Close the stream. Safe to call more than once.
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.inner.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(error = %e, "Error closing engine stdin");
            }
        }
    }
}

impl fmt::Debug for CommandWriter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandWriter")
            .field("open", &self.is_open())
            .finish()
    }
}
