//! Configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::engine::{EngineTimeouts, SearchLimit, SearchRequest, DEFAULT_DEPTH, DEFAULT_MULTIPV};

/// Engine binary used when nothing else is configured.
pub const DEFAULT_ENGINE_BINARY: &str = "stockfish";

/// Configuration for launching and driving the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Executable name (looked up on `PATH`) or path.
    pub binary: String,
    /// Extra command-line arguments for the engine.
    pub args: Vec<String>,
    /// Deadline for the `uciok` handshake, in milliseconds.
    pub handshake_timeout_ms: u64,
    /// Deadline for each output line during a search, in milliseconds.
    pub read_timeout_ms: u64,
    /// How long shutdown waits for the engine to exit, in milliseconds.
    pub shutdown_grace_ms: u64,
    /// Depth used when a search names neither depth nor move time.
    pub default_depth: u32,
    /// Ranked lines requested when the caller does not say.
    pub default_multipv: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            binary: DEFAULT_ENGINE_BINARY.to_string(),
            args: Vec::new(),
            handshake_timeout_ms: 5_000,
            read_timeout_ms: 10_000,
            shutdown_grace_ms: 2_000,
            default_depth: DEFAULT_DEPTH,
            default_multipv: DEFAULT_MULTIPV,
        }
    }
}

impl EngineConfig {
    /// Replace the binary with `binary` if it is non-empty.
    #[must_use]
    pub fn with_binary_override(mut self, binary: Option<String>) -> Self {
        if let Some(binary) = binary.filter(|b| !b.trim().is_empty()) {
            tracing::debug!(binary = %binary, "Engine binary overridden");
            self.binary = binary;
        }
        self
    }

    #[must_use]
    pub fn timeouts(&self) -> EngineTimeouts {
        EngineTimeouts {
            handshake: Duration::from_millis(self.handshake_timeout_ms),
            read: Duration::from_millis(self.read_timeout_ms),
            shutdown_grace: Duration::from_millis(self.shutdown_grace_ms),
        }
    }

    /// Build a request for `fen` using the configured defaults where the
    /// caller gave no value.
    #[must_use]
    pub fn request(
        &self,
        fen: &str,
        depth: Option<u32>,
        movetime_ms: Option<u64>,
        multipv: Option<u32>,
    ) -> SearchRequest {
        let limit = match (depth, movetime_ms) {
            (None, None) => SearchLimit::Depth(self.default_depth),
            (depth, movetime) => SearchLimit::from_options(depth, movetime),
        };
        SearchRequest::new(fen)
            .limit(limit)
            .multipv(multipv.unwrap_or(self.default_multipv))
    }
}
