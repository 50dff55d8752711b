use anyhow::{anyhow, bail, Context, Result};
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tracing::{info, warn};

use crate::qemu::ArgList;

/// Manages the QEMU process backing one guest.
///
/// The guest's serial console is QEMU's stdio: stdin feeds the console and
/// stdout carries its output. Both are handed to the caller by
/// [`VmProcess::spawn`]; stderr is forwarded to tracing.
pub struct VmProcess {
    vm_id: String,
    process: Option<Child>,
}

impl VmProcess {
    pub fn spawn(
        vm_id: &str,
        qemu_binary: &Path,
        args: &ArgList,
    ) -> Result<(Self, ChildStdin, ChildStdout)> {
        info!(target: "vm", vm_id, binary = %qemu_binary.display(), "starting QEMU process");

        let mut cmd = Command::new(qemu_binary);
        cmd.args(args.to_argv())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning {}", qemu_binary.display()))?;

        let stdin = child.stdin.take().context("QEMU stdin not captured")?;
        let stdout = child.stdout.take().context("QEMU stdout not captured")?;

        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    warn!(target: "qemu", "{}", line);
                }
            });
        }

        Ok((
            Self {
                vm_id: vm_id.to_string(),
                process: Some(child),
            },
            stdin,
            stdout,
        ))
    }

    pub fn pid(&self) -> Result<u32> {
        match &self.process {
            Some(process) => process
                .id()
                .ok_or_else(|| anyhow!("process ID not available from tokio::process::Child")),
            None => bail!("VM process not running"),
        }
    }

    /// Wait for the QEMU process to exit
    pub async fn wait(&mut self) -> Result<std::process::ExitStatus> {
        match self.process.as_mut() {
            Some(process) => process.wait().await.context("waiting for QEMU process"),
            None => bail!("VM process not running"),
        }
    }

    /// Kill the QEMU process
    pub async fn kill(&mut self) -> Result<()> {
        if let Some(mut process) = self.process.take() {
            info!(target: "vm", vm_id = %self.vm_id, "killing QEMU process");
            process.kill().await.context("killing QEMU process")?;
        }
        Ok(())
    }

    pub fn vm_id(&self) -> &str {
        &self.vm_id
    }
}
