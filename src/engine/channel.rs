//! Ordered line buffer fed by a background reader task.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use super::EngineError;

/// Receiving end of the engine's output lines.
///
/// Lines arrive in the order the engine wrote them. The queue is unbounded
/// so the reader task never blocks on a slow consumer.
#[derive(Debug)]
pub struct LineChannel {
    rx: UnboundedReceiver<String>,
}

impl LineChannel {
    /// Spawn a reader task over `reader` and return the channel it feeds.
    ///
    /// The task ends when the reader hits EOF or fails, which closes the
    /// channel. Must be called from within a Tokio runtime.
    pub fn spawn_reader<R>(reader: R) -> (Self, JoinHandle<()>)
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(read_lines(reader, tx));
        (Self { rx }, handle)
    }

    /// Wrap an existing receiver.
    #[must_use]
    pub fn from_receiver(rx: UnboundedReceiver<String>) -> Self {
        Self { rx }
    }

    /// Await the next line or the deadline, whichever comes first.
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Timeout` if nothing arrives within `timeout`,
    /// and `EngineError::Exited` once the reader task has finished and the
    /// buffer is drained.
    pub async fn next_line(
        &mut self,
        timeout: Duration,
        waiting_for: &str,
    ) -> Result<String, EngineError> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(line)) => Ok(line),
            Ok(None) => Err(EngineError::Exited),
            Err(_) => Err(EngineError::Timeout {
                waiting_for: waiting_for.to_string(),
                after: timeout,
            }),
        }
    }

    /// Pop a buffered line without waiting.
    pub fn try_next_line(&mut self) -> Option<String> {
        self.rx.try_recv().ok()
    }
}

async fn read_lines<R>(reader: R, tx: UnboundedSender<String>)
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => {
                tracing::debug!("Engine output closed");
                break;
            }
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf).trim_end().to_string();
                tracing::trace!(line = %line, "Engine line");
                if tx.send(line).is_err() {
                    // Receiver dropped, nobody is listening anymore.
                    break;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read engine output");
                break;
            }
        }
    }
}

/// Spawn a task that drains the engine's stderr into the log.
pub(crate) fn drain_stderr<R>(stderr: R) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stderr).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) if !line.trim().is_empty() => {
                    tracing::warn!(line = %line, "Engine stderr");
                }
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => break,
            }
        }
    })
}
