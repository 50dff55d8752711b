//! Bring the guest from "shell on the serial console" to "sshd accepting our key".

use tokio::time::Instant;
use tracing::{debug, info};

use super::error::InstanceError;
use super::instance::{Instance, SerialConsole};
use super::serial::STATUS_ECHO;
use crate::ssh::SshIdentity;

/// Prefix of boot probe replies. Must differ from the status sentinel: a late
/// probe reply must never complete a later command.
const READY_PREFIX: &str = "SERIAL READY: ";

/// Composite guest setup command.
///
/// The setup steps run in a child `sh -e` so the first failure stops them,
/// and the outer shell always reports the child's exit status. Both the key
/// and the inner script are shell-quoted.
pub fn setup_command(authorized_key: &str, interface: &str) -> String {
    let steps = [
        "set -ex".to_string(),
        "ifconfig lo up".to_string(),
        format!("ifconfig {} up", shell_words::quote(interface)),
        "udhcpc".to_string(),
        "mkdir -p ~/.ssh".to_string(),
        "chmod 700 ~/.ssh".to_string(),
        format!(
            "echo {} > ~/.ssh/authorized_keys",
            shell_words::quote(authorized_key)
        ),
        "rc-update add sshd".to_string(),
        "service sshd start".to_string(),
    ];
    let script = steps.join("; ");

    format!("sh -c {}; {}", shell_words::quote(&script), STATUS_ECHO)
}

impl Instance {
    /// Generate a fresh identity, install it in the guest and start sshd.
    ///
    /// Returns the identity to authenticate the SSH hop with.
    pub async fn ssh_setup(&self) -> Result<SshIdentity, InstanceError> {
        let mut console = self.lock_console()?;

        let bits = self.config().ssh_key_bits;
        let keygen = tokio::task::spawn_blocking(move || SshIdentity::generate_with_bits(bits));
        let identity = tokio::select! {
            _ = self.cancel_token().cancelled() => {
                return Err(InstanceError::Cancelled { op: "setup" });
            }
            res = keygen => res??,
        };
        info!(target: "vm", fingerprint = %identity.fingerprint(), "generated ephemeral ssh identity");

        self.install_key(&mut console, identity.authorized_key())
            .await?;

        Ok(identity)
    }

    /// Install an existing `authorized_keys` line and start sshd.
    pub async fn install_authorized_key(&self, authorized_key: &str) -> Result<(), InstanceError> {
        let mut console = self.lock_console()?;
        self.install_key(&mut console, authorized_key).await
    }

    async fn install_key(
        &self,
        console: &mut SerialConsole,
        authorized_key: &str,
    ) -> Result<(), InstanceError> {
        let cmd = setup_command(authorized_key, &self.config().guest_interface);
        let timeout = self.config().setup_timeout;

        info!(target: "vm", interface = %self.config().guest_interface, "running guest network and sshd setup");
        self.run_serial_command(console, "setup", &cmd, timeout, |_| {})
            .await?;
        info!(target: "vm", "guest sshd is up");

        Ok(())
    }

    /// Wait until a shell answers on the serial console.
    ///
    /// Sends a probe every `probe_interval` until one is answered or
    /// `boot_timeout` runs out.
    pub async fn wait_for_shell(&self) -> Result<(), InstanceError> {
        let mut console = self.lock_console()?;

        let started = Instant::now();
        let deadline = started + self.config().boot_timeout;
        let mut log = String::new();
        let mut attempt: u32 = 0;

        while Instant::now() < deadline {
            attempt += 1;
            let probe = format!("echo \"{READY_PREFIX}{attempt}\"");
            console
                .write_line(&probe)
                .await
                .map_err(|source| InstanceError::Write { op: "boot", source })?;

            let next_probe = (Instant::now() + self.config().probe_interval).min(deadline);
            if self.await_ready(&mut console, next_probe, &mut log).await? {
                info!(target: "vm", attempt, elapsed_ms = started.elapsed().as_millis() as u64, "guest shell is responsive");
                return Ok(());
            }
            debug!(target: "vm", attempt, "no answer to boot probe yet");
        }

        Err(InstanceError::Timeout { op: "boot", log })
    }

    /// True once any probe reply arrives, false when `until` passes first.
    async fn await_ready(
        &self,
        console: &mut SerialConsole,
        until: Instant,
        log: &mut String,
    ) -> Result<bool, InstanceError> {
        let sleep = tokio::time::sleep_until(until);
        tokio::pin!(sleep);

        loop {
            tokio::select! {
                _ = self.cancel_token().cancelled() => {
                    return Err(InstanceError::Cancelled { op: "boot" });
                }
                _ = &mut sleep => return Ok(false),
                line = console.recv() => {
                    let Some(line) = line else {
                        if self.cancel_token().is_cancelled() {
                            return Err(InstanceError::Cancelled { op: "boot" });
                        }
                        return Err(InstanceError::Closed { op: "boot", log: std::mem::take(log) });
                    };
                    log.push_str(&line);
                    log.push('\n');
                    if line.starts_with(READY_PREFIX) {
                        return Ok(true);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setup_command_shape() {
        let cmd = setup_command("ssh-rsa AAAAB3Nza hostvm-ephemeral", "eth0");

        assert!(cmd.starts_with("sh -c '"));
        assert!(cmd.ends_with(r#"; echo "SERIAL STATUS: $?""#));
        assert!(cmd.contains("udhcpc"));
        assert!(cmd.contains("service sshd start"));
        assert!(!cmd.contains('\n'));

        let words = shell_words::split(&cmd).unwrap();
        assert_eq!(words[0], "sh");
        assert_eq!(words[1], "-c");
        let script = &words[2];
        assert!(script.starts_with("set -ex; ifconfig lo up; ifconfig eth0 up; udhcpc;"));
        assert!(script.contains("echo 'ssh-rsa AAAAB3Nza hostvm-ephemeral' > ~/.ssh/authorized_keys"));
    }

    #[test]
    fn test_setup_command_quotes_hostile_key_material() {
        let key = "x'; reboot; echo '$(id)`id`";
        let cmd = setup_command(key, "eth0");

        let words = shell_words::split(&cmd).unwrap();
        let inner = shell_words::split(&words[2]).unwrap();
        let echo = inner.iter().position(|w| w == "echo").unwrap();
        assert_eq!(inner[echo + 1], key);
    }

    #[test]
    fn test_setup_command_quotes_interface() {
        let cmd = setup_command("ssh-rsa AAAA", "eth0; reboot");
        let words = shell_words::split(&cmd).unwrap();
        assert!(words[2].contains("ifconfig 'eth0; reboot' up"));
    }
}
