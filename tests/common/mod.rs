// Common test utilities for hostvm integration tests
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostvm::config::BootstrapConfig;
use hostvm::vm::Instance;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub mod sshd;

/// Completion sentinel line as the guest shell would print it.
pub fn status(code: u8) -> String {
    format!("SERIAL STATUS: {code}")
}

/// Short timeouts so failure paths finish quickly.
pub fn fast_config() -> BootstrapConfig {
    BootstrapConfig {
        setup_timeout: Duration::from_millis(500),
        keyscan_timeout: Duration::from_millis(500),
        boot_timeout: Duration::from_secs(1),
        probe_interval: Duration::from_millis(50),
        ssh_key_bits: 2048,
        ..Default::default()
    }
}

/// In-memory stand-in for a guest serial console.
///
/// Every line the host writes is recorded and passed to the `respond`
/// closure; whatever it returns is written back, `\r\n`-terminated like a
/// real tty would.
pub struct FakeGuest {
    pub instance: Instance,
    pub cancel: CancellationToken,
    inject: mpsc::UnboundedSender<String>,
    hang_up: CancellationToken,
    received: Arc<Mutex<Vec<String>>>,
}

impl FakeGuest {
    pub fn start<F>(config: BootstrapConfig, mut respond: F) -> Self
    where
        F: FnMut(&str) -> Vec<String> + Send + 'static,
    {
        let (host_writer, guest_reader) = tokio::io::duplex(64 * 1024);
        let (guest_writer, host_reader) = tokio::io::duplex(64 * 1024);

        let cancel = CancellationToken::new();
        let instance = Instance::new(host_writer, host_reader, config, cancel.clone());

        let (inject, mut inject_rx) = mpsc::unbounded_channel::<String>();
        let hang_up = CancellationToken::new();
        let received = Arc::new(Mutex::new(Vec::new()));

        let stop = hang_up.clone();
        let seen = received.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(guest_reader).lines();
            let mut out = Some(guest_writer);

            loop {
                let mut emit = Vec::new();
                tokio::select! {
                    _ = stop.cancelled(), if out.is_some() => {
                        // Dropping the write half is EOF for the host reader.
                        out = None;
                    }
                    line = lines.next_line() => match line {
                        Ok(Some(line)) => {
                            seen.lock().unwrap().push(line.clone());
                            emit = respond(&line);
                        }
                        _ => break,
                    },
                    Some(line) = inject_rx.recv() => emit.push(line),
                }

                if let Some(w) = out.as_mut() {
                    for line in emit {
                        if w.write_all(format!("{line}\r\n").as_bytes()).await.is_err() {
                            return;
                        }
                    }
                    let _ = w.flush().await;
                }
            }
        });

        Self {
            instance,
            cancel,
            inject,
            hang_up,
            received,
        }
    }

    /// Print `line` on the console unprompted. It may still be in flight
    /// when this returns.
    pub fn print(&self, line: &str) {
        self.inject.send(line.to_string()).unwrap();
    }

    /// Like [`FakeGuest::print`], then give the host reader a moment to
    /// queue the line.
    pub async fn emit(&self, line: &str) {
        self.print(line);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    /// Stop producing output; the host sees EOF while writes still succeed.
    pub async fn hang_up(&self) {
        self.hang_up.cancel();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    /// Lines the host has written so far.
    pub fn received(&self) -> Vec<String> {
        self.received.lock().unwrap().clone()
    }
}
