//! Multi-PV search against a live engine.

use super::{EngineError, EngineProcess, InfoLine, LineKind, ResultSet, SearchLimit, UciCommand};

/// Number of ranked lines requested when the caller does not say.
pub const DEFAULT_MULTIPV: u32 = 3;

/// Parameters for one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Position to analyse, in FEN.
    pub fen: String,
    /// Depth or time bound.
    pub limit: SearchLimit,
    /// Number of ranked lines to request (at least 1).
    pub multipv: u32,
}

impl SearchRequest {
    /// Create a request for `fen` with the default depth and line count.
    #[must_use]
    pub fn new(fen: impl Into<String>) -> Self {
        Self {
            fen: fen.into(),
            limit: SearchLimit::default(),
            multipv: DEFAULT_MULTIPV,
        }
    }

    #[must_use]
    pub fn depth(mut self, depth: u32) -> Self {
        self.limit = SearchLimit::Depth(depth);
        self
    }

    #[must_use]
    pub fn movetime(mut self, ms: u64) -> Self {
        self.limit = SearchLimit::MoveTime(ms);
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: SearchLimit) -> Self {
        self.limit = limit;
        self
    }

    /// Set the number of ranked lines; values below 1 are raised to 1.
    #[must_use]
    pub fn multipv(mut self, lines: u32) -> Self {
        self.multipv = lines.max(1);
        self
    }
}

impl EngineProcess {
    /// Run one search and collect its ranked lines.
    ///
    /// Sends `ucinewgame`, the position, the `MultiPV` option and `go`, then
    /// folds every progress line into a [`ResultSet`] until `bestmove`.
    /// Malformed progress lines are logged and skipped. The engine may
    /// report fewer lines than requested.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Timeout` if any single read exceeds the read
    /// deadline, `EngineError::Exited` if the engine dies mid-search, and
    /// `EngineError::StreamClosed` if a command cannot be written.
    pub async fn search(&mut self, request: &SearchRequest) -> Result<ResultSet, EngineError> {
        let stale = self.discard_pending();
        if stale > 0 {
            tracing::debug!(lines = stale, "Discarded stale engine output");
        }

        self.send(&UciCommand::UciNewGame).await?;
        self.send(&UciCommand::Position {
            fen: request.fen.clone(),
        })
        .await?;
        self.set_option("MultiPV", request.multipv).await?;
        self.send(&UciCommand::Go(request.limit)).await?;

        let read_timeout = self.timeouts().read;
        let mut results = ResultSet::new();

        loop {
            let line = self.next_line(read_timeout, "bestmove").await?;
            match LineKind::classify(&line) {
                LineKind::Progress => match InfoLine::parse(&line) {
                    Ok(update) => results.merge(update),
                    Err(e) => {
                        tracing::warn!(line = %line, error = %e, "Skipping malformed info line");
                    }
                },
                LineKind::Terminal => break,
                LineKind::Other => {}
            }
        }

        tracing::debug!(
            fen = %request.fen,
            limit = ?request.limit,
            requested = request.multipv,
            received = results.len(),
            "Search complete"
        );
        Ok(results)
    }
}
