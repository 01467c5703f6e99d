//! Engine process supervision.
//!
//! An [`EngineProcess`] owns the child process, the writer for its stdin and
//! the [`LineChannel`] fed from its stdout. It is created by
//! [`EngineProcess::start`], which also performs the `uci` handshake.

use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;

use super::channel::drain_stderr;
use super::{CommandWriter, EngineError, LineChannel, UciCommand};
use crate::config::EngineConfig;

/// Default deadline for the `uciok` handshake.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Default deadline for each line read during a search.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default time an engine gets to exit after `quit`.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Deadlines applied by an engine handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineTimeouts {
    /// Per-read deadline while waiting for `uciok`.
    pub handshake: Duration,
    /// Per-read deadline while draining search output.
    pub read: Duration,
    /// How long shutdown waits for the process to exit.
    pub shutdown_grace: Duration,
}

impl Default for EngineTimeouts {
    fn default() -> Self {
        Self {
            handshake: DEFAULT_HANDSHAKE_TIMEOUT,
            read: DEFAULT_READ_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

/// A live UCI engine.
#[derive(Debug)]
pub struct EngineProcess {
    child: Option<Child>,
    writer: CommandWriter,
    lines: LineChannel,
    reader: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
    timeouts: EngineTimeouts,
    closed: bool,
}

impl EngineProcess {
    /// Launch the configured engine and complete the `uci` handshake.
    ///
    /// If the handshake fails the process is terminated before returning.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if the binary cannot be resolved,
    /// `EngineError::Spawn` if it cannot be launched, and
    /// `EngineError::Timeout` or `EngineError::Exited` if it never answers
    /// `uciok`.
    pub async fn start(config: &EngineConfig) -> Result<Self, EngineError> {
        let mut engine = Self::spawn(config)?;

        if let Err(err) = engine.handshake().await {
            tracing::warn!(binary = %config.binary, error = %err, "Engine handshake failed");
            let grace = engine.timeouts.shutdown_grace;
            if let Err(term_err) = engine.terminate(grace).await {
                tracing::warn!(error = %term_err, "Failed to terminate engine");
            }
            return Err(err);
        }

        tracing::info!(binary = %config.binary, pid = ?engine.id(), "Engine ready");
        Ok(engine)
    }

    /// Spawn the configured engine without the handshake.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::NotFound` if the binary cannot be resolved and
    /// `EngineError::Spawn` for other launch failures.
    pub fn spawn(config: &EngineConfig) -> Result<Self, EngineError> {
        let path = which::which(&config.binary).map_err(|e| {
            tracing::debug!(binary = %config.binary, error = %e, "Engine binary lookup failed");
            EngineError::NotFound {
                binary: config.binary.clone(),
            }
        })?;

        let mut child = Command::new(&path)
            .args(&config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::from_spawn(e, &config.binary))?;

        let stdin = child.stdin.take().ok_or(EngineError::StreamClosed)?;
        let stdout = child.stdout.take().ok_or(EngineError::Exited)?;
        let stderr = child.stderr.take();

        let mut engine = Self::from_streams(stdin, stdout, config.timeouts());
        if let Some(stderr) = stderr {
            engine.tasks.push(drain_stderr(stderr));
        }
        tracing::debug!(path = %path.display(), pid = ?child.id(), "Spawned engine process");
        engine.child = Some(child);

        Ok(engine)
    }

    /// Build a handle over arbitrary streams instead of a child process.
    ///
    /// `input` receives commands and `output` supplies engine lines. Must be
    /// called from within a Tokio runtime.
    pub fn from_streams<W, R>(input: W, output: R, timeouts: EngineTimeouts) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let (lines, reader) = LineChannel::spawn_reader(output);
        Self {
            child: None,
            writer: CommandWriter::new(input),
            lines,
            reader: Some(reader),
            tasks: Vec::new(),
            timeouts,
            closed: false,
        }
    }

    /// Send `uci` and wait for `uciok`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Timeout` if `uciok` does not arrive in time.
    pub async fn handshake(&mut self) -> Result<(), EngineError> {
        self.send(&UciCommand::Uci).await?;
        self.wait_for("uciok", self.timeouts.handshake).await?;
        Ok(())
    }

    /// Send a command to the engine.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StreamClosed` if the engine's input is closed.
    pub async fn send(&mut self, command: &UciCommand) -> Result<(), EngineError> {
        self.writer.send(command).await
    }

    /// Send one raw protocol line.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StreamClosed` if the engine's input is closed,
    /// or `EngineError::InvalidCommand` if `text` spans several lines.
    pub async fn send_line(&mut self, text: &str) -> Result<(), EngineError> {
        self.writer.send_line(text).await
    }

    /// Send `setoption name <name> value <value>`.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::StreamClosed` if the engine's input is closed.
    pub async fn set_option(
        &mut self,
        name: &str,
        value: impl ToString,
    ) -> Result<(), EngineError> {
        self.send(&UciCommand::SetOption {
            name: name.to_string(),
            value: value.to_string(),
        })
        .await
    }

    /// Discard lines until one contains `token`, and return that line.
    ///
    /// `timeout` bounds each individual read.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Timeout` if a read exceeds `timeout`, or
    /// `EngineError::Exited` if the engine closes its output first.
    pub async fn wait_for(&mut self, token: &str, timeout: Duration) -> Result<String, EngineError> {
        loop {
            let line = self.lines.next_line(timeout, token).await?;
            if line.contains(token) {
                return Ok(line);
            }
            tracing::trace!(line = %line, token, "Discarding line");
        }
    }

    /// Await the next engine line.
    pub(crate) async fn next_line(
        &mut self,
        timeout: Duration,
        waiting_for: &str,
    ) -> Result<String, EngineError> {
        self.lines.next_line(timeout, waiting_for).await
    }

    /// Drop any output left over from a previous exchange.
    pub(crate) fn discard_pending(&mut self) -> usize {
        let mut discarded = 0;
        while self.lines.try_next_line().is_some() {
            discarded += 1;
        }
        discarded
    }

    #[must_use]
    pub fn timeouts(&self) -> EngineTimeouts {
        self.timeouts
    }

    /// Process ID, if backed by a child process that is still running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Whether the engine can still accept commands.
    ///
    /// Without a child process, an engine whose output has reached EOF is
    /// considered dead.
    pub fn is_alive(&mut self) -> bool {
        if self.closed || !self.writer.is_open() {
            return false;
        }
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => self.reader.as_ref().is_some_and(|r| !r.is_finished()),
        }
    }

    /// Send `quit` and wait up to the grace period for the engine to exit.
    ///
    /// The process is never killed here. If it ignores `quit` it keeps
    /// running after the handle is dropped; use [`EngineProcess::terminate`]
    /// to force it down. Calling this more than once is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if waiting on the child process fails.
    pub async fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.closed {
            return Ok(());
        }
        let alive = self.is_alive();
        self.closed = true;

        if alive {
            match self.writer.send(&UciCommand::Quit).await {
                Ok(()) | Err(EngineError::StreamClosed) => {}
                Err(err) => tracing::warn!(error = %err, "Failed to send quit"),
            }
        }
        self.writer.close().await;

        let result = match self.child.as_mut() {
            Some(child) => match tokio::time::timeout(self.timeouts.shutdown_grace, child.wait()).await {
                Ok(Ok(status)) => {
                    tracing::info!(%status, "Engine exited");
                    Ok(())
                }
                Ok(Err(err)) => Err(EngineError::Io(err)),
                Err(_) => {
                    tracing::warn!(
                        grace = ?self.timeouts.shutdown_grace,
                        "Engine still running after quit"
                    );
                    Ok(())
                }
            },
            None => Ok(()),
        };

        self.abort_tasks();
        result
    }

    /// Force the engine down: SIGTERM, then SIGKILL once `grace` elapses.
    ///
    /// On non-Unix platforms the process is killed immediately.
    ///
    /// # Errors
    ///
    /// Returns an error if the kill signal cannot be delivered.
    pub async fn terminate(&mut self, grace: Duration) -> Result<(), EngineError> {
        self.closed = true;
        self.writer.close().await;
        self.abort_tasks();

        if let Some(child) = self.child.as_mut() {
            terminate_child(child, grace).await?;
        }
        Ok(())
    }

    fn abort_tasks(&mut self) {
        for task in self.reader.take().into_iter().chain(self.tasks.drain(..)) {
            task.abort();
        }
    }
}

#[cfg(unix)]
async fn terminate_child(child: &mut Child, grace: Duration) -> std::io::Result<()> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        // Already reaped.
        return Ok(());
    };

    let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
    let _ = kill(nix_pid, Signal::SIGTERM);

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(e)) => Err(e),
        Err(_) => child.kill().await,
    }
}

#[cfg(not(unix))]
async fn terminate_child(child: &mut Child, _grace: Duration) -> std::io::Result<()> {
    child.kill().await
}
