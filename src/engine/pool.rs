//! Shared engine pool.
//!
//! The pool owns at most one engine, launched on first use. A single async
//! mutex guards both the launch and each search, so concurrent callers are
//! queued and never see each other's output.

use tokio::sync::Mutex;

use super::{
    EngineError, EngineLauncher, EngineProcess, ProcessLauncher, ResultSet, SearchRequest,
};
use crate::config::EngineConfig;

/// Lazily launched, shared engine.
#[derive(Debug)]
pub struct EnginePool<L = ProcessLauncher> {
    launcher: L,
    config: EngineConfig,
    engine: Mutex<Option<EngineProcess>>,
}

impl EnginePool<ProcessLauncher> {
    /// Create a pool that launches the configured engine binary.
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self::with_launcher(ProcessLauncher::new(config.clone())).with_config(config)
    }
}

impl<L: EngineLauncher> EnginePool<L> {
    /// Create a pool with a custom launcher and default search settings.
    #[must_use]
    pub fn with_launcher(launcher: L) -> Self {
        Self {
            launcher,
            config: EngineConfig::default(),
            engine: Mutex::new(None),
        }
    }

    /// Use `config` for search defaults such as the fallback depth.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Analyse `fen` to `depth`, reporting `lines` ranked lines.
    ///
    /// Without a depth the configured `default_depth` applies.
    ///
    /// # Errors
    ///
    /// See [`EnginePool::search`].
    pub async fn analyse(
        &self,
        fen: &str,
        depth: Option<u32>,
        lines: u32,
    ) -> Result<ResultSet, EngineError> {
        let request = self.config.request(fen, depth, None, Some(lines));
        self.search(&request).await
    }

    /// Run a search on the shared engine, launching it if needed.
    ///
    /// Waits for any search already in progress. If the search fails in a
    /// way that leaves the engine unusable, the engine is terminated and the
    /// next call launches a fresh one. The failing call is not retried.
    ///
    /// # Errors
    ///
    /// Returns the launch error if the engine cannot be started, or the
    /// search error otherwise.
    pub async fn search(&self, request: &SearchRequest) -> Result<ResultSet, EngineError> {
        let mut guard = self.engine.lock().await;

        let engine = match guard.take() {
            Some(engine) => guard.insert(engine),
            None => {
                tracing::info!("Launching shared engine");
                guard.insert(self.launcher.launch().await?)
            }
        };

        match engine.search(request).await {
            Ok(results) => Ok(results),
            Err(err) => {
                if err.poisons_engine() {
                    tracing::warn!(error = %err, "Discarding engine after failed search");
                    if let Some(mut engine) = guard.take() {
                        let grace = engine.timeouts().shutdown_grace;
                        if let Err(term_err) = engine.terminate(grace).await {
                            tracing::warn!(error = %term_err, "Failed to terminate engine");
                        }
                    }
                }
                Err(err)
            }
        }
    }

    /// Process ID of the shared engine, if one is running as a child process.
    pub async fn engine_id(&self) -> Option<u32> {
        self.engine.lock().await.as_ref().and_then(EngineProcess::id)
    }

    /// Whether an engine has been launched and not shut down.
    pub async fn is_running(&self) -> bool {
        self.engine.lock().await.is_some()
    }

    /// Shut the shared engine down. The next search launches a new one.
    ///
    /// An engine that ignores `quit` is left running; use
    /// [`EnginePool::restart`] to force it down. Safe to call when no engine
    /// is running.
    ///
    /// # Errors
    ///
    /// Returns an error if the engine fails to shut down cleanly.
    pub async fn shutdown(&self) -> Result<(), EngineError> {
        let engine = self.engine.lock().await.take();
        match engine {
            Some(mut engine) => {
                tracing::info!("Shutting down shared engine");
                engine.shutdown().await
            }
            None => Ok(()),
        }
    }

    /// Terminate the shared engine and launch a fresh one.
    ///
    /// # Errors
    ///
    /// Returns the launch error if the new engine cannot be started.
    pub async fn restart(&self) -> Result<(), EngineError> {
        let mut guard = self.engine.lock().await;
        if let Some(mut old) = guard.take() {
            let grace = old.timeouts().shutdown_grace;
            if let Err(err) = old.terminate(grace).await {
                tracing::warn!(error = %err, "Failed to terminate engine");
            }
        }
        *guard = Some(self.launcher.launch().await?);
        tracing::info!("Shared engine restarted");
        Ok(())
    }
}

/// Launch an engine, run one search and shut the engine down.
///
/// # Errors
///
/// Returns the launch or search error. Shutdown failures are logged only.
pub async fn analyse_once(
    config: &EngineConfig,
    request: &SearchRequest,
) -> Result<ResultSet, EngineError> {
    let mut engine = EngineProcess::start(config).await?;
    let result = engine.search(request).await;
    if let Err(err) = engine.shutdown().await {
        tracing::warn!(error = %err, "Engine shutdown failed");
    }
    result
}
