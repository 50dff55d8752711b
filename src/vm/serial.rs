//! Line-oriented serial console plumbing.
//!
//! The guest side of the protocol is plain shell: every command we send ends
//! with an `echo` of the sentinel prefix plus `$?`, so completion shows up as
//! a line starting with [`STATUS_PREFIX`] followed by one status character.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Completion sentinel prefix.
pub const STATUS_PREFIX: &str = "SERIAL STATUS: ";

/// Shell snippet that prints the sentinel with the previous exit status.
pub const STATUS_ECHO: &str = r#"echo "SERIAL STATUS: $?""#;

/// Leading byte of `ssh-keyscan -H` result lines.
pub const KEYSCAN_DELIMITER: char = '|';

/// Number of trailing console lines quoted in error messages.
const LOG_TAIL_LINES: usize = 32;

const OUTPUT_CHANNEL_CAPACITY: usize = 256;

/// Parsed completion sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialStatus {
    Success,
    Failed(char),
    /// Prefix arrived without a status character (truncated output).
    Missing,
}

/// Interpret a console line as a completion sentinel, if it is one.
pub fn parse_status(line: &str) -> Option<SerialStatus> {
    let rest = line.strip_prefix(STATUS_PREFIX)?;
    Some(match rest.chars().next() {
        None => SerialStatus::Missing,
        Some('0') => SerialStatus::Success,
        Some(c) => SerialStatus::Failed(c),
    })
}

/// Render the tail of a console log for inclusion in an error message.
pub fn log_err_msg(log: &str) -> String {
    let lines: Vec<&str> = log.lines().collect();
    if lines.is_empty() {
        return "(no console output)".to_string();
    }

    let tail = &lines[lines.len().saturating_sub(LOG_TAIL_LINES)..];
    format!("(console log:\n{}\n)", tail.join("\n"))
}

/// Decode serial output into lines and deliver them over a channel.
///
/// Bytes are decoded lossily and trailing `\r\n` is stripped. The task ends on
/// EOF, a read error, cancellation, or when the receiver is dropped.
pub fn spawn_serial_reader<R>(reader: R, cancel: CancellationToken) -> mpsc::Receiver<String>
where
    R: AsyncRead + Send + Unpin + 'static,
{
    let (tx, rx) = mpsc::channel(OUTPUT_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => break,
                read = reader.read_until(b'\n', &mut buf) => read,
            };

            match read {
                Ok(0) => {
                    debug!(target: "serial", "serial console reached EOF");
                    break;
                }
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\r', '\n']).to_string();
                    debug!(target: "serial", "{}", line);
                    if tx.send(line).await.is_err() {
                        break; // Receiver dropped
                    }
                }
                Err(e) => {
                    warn!(target: "serial", error = %e, "serial console read failed");
                    break;
                }
            }
        }
    });

    rx
}
