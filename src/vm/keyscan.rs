//! In-guest `ssh-keyscan` over the serial console.

use tracing::info;

use super::error::InstanceError;
use super::instance::Instance;
use super::serial::{KEYSCAN_DELIMITER, STATUS_ECHO};
use crate::ssh::{parse_ssh_keyscan, HostKeyVerifier};

/// Scan the guest's own sshd, report status, then drop the shell history so
/// the scan leaves nothing behind.
pub fn keyscan_command() -> String {
    format!("ssh-keyscan -H localhost; {STATUS_ECHO}; rm -f ~/.ash_history")
}

impl Instance {
    /// Raw keyscan records (hashed-host lines only), newline-terminated.
    pub async fn scan_ssh_identity(&self) -> Result<Vec<u8>, InstanceError> {
        let mut console = self.lock_console()?;
        let timeout = self.config().keyscan_timeout;

        let mut records = Vec::new();
        self.run_serial_command(&mut console, "keyscan", &keyscan_command(), timeout, |line| {
            if line.starts_with(KEYSCAN_DELIMITER) {
                records.extend_from_slice(line.as_bytes());
                records.push(b'\n');
            }
        })
        .await?;

        Ok(records)
    }

    /// Scan and pin the guest's host keys.
    pub async fn scan_host_keys(&self) -> Result<HostKeyVerifier, InstanceError> {
        let raw = self.scan_ssh_identity().await?;
        let verifier = parse_ssh_keyscan(&raw)?;

        let mut key_types: Vec<&str> = verifier.key_types().collect();
        key_types.sort_unstable();
        info!(target: "vm", key_types = ?key_types, "pinned guest host keys");

        Ok(verifier)
    }
}
