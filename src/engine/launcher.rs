//! Engine launchers used by the pool.

use async_trait::async_trait;

use super::{EngineError, EngineProcess};
use crate::config::EngineConfig;

/// Produces ready-to-use engine handles.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    /// Launch an engine and complete its handshake.
    async fn launch(&self) -> Result<EngineProcess, EngineError>;
}

/// Launches the configured engine binary as a child process.
#[derive(Debug, Clone, Default)]
pub struct ProcessLauncher {
    config: EngineConfig,
}

impl ProcessLauncher {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }
}

#[async_trait]
impl EngineLauncher for ProcessLauncher {
    async fn launch(&self) -> Result<EngineProcess, EngineError> {
        EngineProcess::start(&self.config).await
    }
}
