use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Mutex, MutexGuard};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::InstanceError;
use super::serial::{parse_status, spawn_serial_reader, SerialStatus};
use crate::config::BootstrapConfig;

/// After draining what is queued, `reset` keeps discarding until the console
/// has been quiet this long.
const RESET_QUIET_PERIOD: Duration = Duration::from_millis(50);

/// Upper bound on `reset` for a guest that never stops printing.
const RESET_MAX_DRAIN: Duration = Duration::from_secs(1);

/// Write half of the serial console plus the decoded output lines.
///
/// Owned by exactly one command at a time through [`Instance::lock_console`].
pub struct SerialConsole {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    output: mpsc::Receiver<String>,
}

impl SerialConsole {
    /// Discard stale output so that only output produced after this point can
    /// answer the next command. Returns the number of dropped lines.
    ///
    /// Lines still in flight (in the pipe or the reader task's buffer) are
    /// drained until the console stays quiet for [`RESET_QUIET_PERIOD`]. Output
    /// the guest prints after that window cannot be told apart from the reply.
    pub(crate) async fn reset(&mut self) -> usize {
        let mut dropped = 0;
        while self.output.try_recv().is_ok() {
            dropped += 1;
        }

        let give_up = Instant::now() + RESET_MAX_DRAIN;
        while Instant::now() < give_up {
            let quiet_until = (Instant::now() + RESET_QUIET_PERIOD).min(give_up);
            match tokio::time::timeout_at(quiet_until, self.output.recv()).await {
                Ok(Some(_)) => dropped += 1,
                // Closed or quiet.
                Ok(None) | Err(_) => break,
            }
        }

        dropped
    }

    pub(crate) async fn write_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }

    pub(crate) async fn recv(&mut self) -> Option<String> {
        self.output.recv().await
    }
}

/// One running guest VM session, driven over its serial console.
///
/// The console is not safe for overlapping commands. Each command takes the
/// console lock with `try_lock`, so a second concurrent command fails with
/// [`InstanceError::Busy`] instead of stealing the first one's output.
pub struct Instance {
    cancel: CancellationToken,
    config: BootstrapConfig,
    console: Mutex<SerialConsole>,
}

impl Instance {
    /// Wrap a serial console. `reader` is decoded on a background task that
    /// stops when `cancel` fires.
    pub fn new<W, R>(writer: W, reader: R, config: BootstrapConfig, cancel: CancellationToken) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
        R: AsyncRead + Send + Unpin + 'static,
    {
        let output = spawn_serial_reader(reader, cancel.clone());
        Self {
            cancel,
            config,
            console: Mutex::new(SerialConsole {
                writer: Box::new(writer),
                output,
            }),
        }
    }

    pub fn config(&self) -> &BootstrapConfig {
        &self.config
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub(crate) fn lock_console(&self) -> Result<MutexGuard<'_, SerialConsole>, InstanceError> {
        self.console.try_lock().map_err(|_| InstanceError::Busy)
    }

    /// Reset, send `command`, then wait for the completion sentinel.
    ///
    /// Every non-sentinel line is appended to the step log and handed to
    /// `on_line` in arrival order. Cancellation, the deadline and the next
    /// line are raced without priority.
    pub(crate) async fn run_serial_command(
        &self,
        console: &mut SerialConsole,
        op: &'static str,
        command: &str,
        timeout: Duration,
        mut on_line: impl FnMut(&str),
    ) -> Result<(), InstanceError> {
        let stale = tokio::select! {
            _ = self.cancel.cancelled() => return Err(InstanceError::Cancelled { op }),
            stale = console.reset() => stale,
        };
        if stale > 0 {
            debug!(target: "serial", op, stale, "discarded stale serial output");
        }

        console
            .write_line(command)
            .await
            .map_err(|source| InstanceError::Write { op, source })?;

        let deadline = tokio::time::sleep_until(Instant::now() + timeout);
        tokio::pin!(deadline);

        let mut log = String::new();

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    return Err(InstanceError::Cancelled { op });
                }
                _ = &mut deadline => {
                    return Err(InstanceError::Timeout { op, log });
                }
                line = console.recv() => {
                    let Some(line) = line else {
                        // The reader task also stops on cancellation.
                        if self.cancel.is_cancelled() {
                            return Err(InstanceError::Cancelled { op });
                        }
                        return Err(InstanceError::Closed { op, log });
                    };

                    log.push_str(&line);
                    log.push('\n');

                    match parse_status(&line) {
                        Some(SerialStatus::Success) => return Ok(()),
                        Some(SerialStatus::Failed(status)) => {
                            return Err(InstanceError::NonZeroStatus { op, status, log });
                        }
                        Some(SerialStatus::Missing) => {
                            return Err(InstanceError::MissingStatus { op });
                        }
                        None => on_line(&line),
                    }
                }
            }
        }
    }
}
