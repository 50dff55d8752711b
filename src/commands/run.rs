//! Boot a throwaway VM and run one command in it over SSH.

use anyhow::{anyhow, Context, Result};
use std::net::{SocketAddr, TcpListener};
use tokio::io::AsyncWriteExt;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cli::RunArgs;
use crate::config::BootstrapConfig;
use crate::qemu::build_vm_args;
use crate::ssh::{run_ssh_cmd, SshClient};
use crate::vm::{Instance, VmProcess};

pub fn generate_vm_id() -> String {
    format!("vm-{}", Uuid::new_v4().simple())
}

/// Ask the kernel for an unused loopback port.
fn pick_free_port() -> Result<u16> {
    let listener = TcpListener::bind("127.0.0.1:0").context("binding probe socket")?;
    Ok(listener.local_addr()?.port())
}

pub async fn cmd_run(args: RunArgs) -> Result<()> {
    let ssh_port = match args.vm.ssh_port {
        Some(port) => port,
        None => pick_free_port().context("picking ssh forward port")?,
    };

    let spec = args.vm.to_spec(ssh_port);
    let config = BootstrapConfig::from(&args.bootstrap);
    debug!(spec = %spec.to_json(), "VM spec");

    let qemu_args = build_vm_args(&spec).context("building QEMU arguments")?;

    let vm_id = generate_vm_id();
    let (mut vm, serial_in, serial_out) = VmProcess::spawn(&vm_id, &spec.qemu_binary, &qemu_args)?;
    info!(target: "vm", vm_id = %vm_id, pid = vm.pid()?, ssh_port, "VM started");

    let cancel = CancellationToken::new();
    let instance = Instance::new(serial_in, serial_out, config, cancel.clone());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let result = tokio::select! {
        _ = sigterm.recv() => {
            info!("received SIGTERM, shutting down VM");
            Err(anyhow!("interrupted by SIGTERM"))
        }
        _ = sigint.recv() => {
            info!("received SIGINT, shutting down VM");
            Err(anyhow!("interrupted by SIGINT"))
        }
        status = vm.wait() => {
            Err(anyhow!("QEMU exited before the command finished: {:?}", status))
        }
        res = run_in_guest(&instance, &args.ssh_user, ssh_port, &args.command) => res,
    };

    // Cleanup
    cancel.cancel();
    if let Err(e) = vm.kill().await {
        warn!("failed to kill VM process: {}", e);
    }

    let stdout = result?;
    let mut out = tokio::io::stdout();
    out.write_all(&stdout).await.context("writing command output")?;
    out.flush().await?;

    Ok(())
}

/// Serial bootstrap, host-key pinning, then the command itself over SSH.
async fn run_in_guest(
    instance: &Instance,
    ssh_user: &str,
    ssh_port: u16,
    command: &[String],
) -> Result<Vec<u8>> {
    instance
        .wait_for_shell()
        .await
        .context("waiting for guest shell on serial console")?;

    let identity = instance.ssh_setup().await.context("setting up guest sshd")?;
    let verifier = instance
        .scan_host_keys()
        .await
        .context("scanning guest host keys")?;

    let addr = SocketAddr::from(([127, 0, 0, 1], ssh_port));
    let client = SshClient::connect(
        addr,
        ssh_user,
        &identity,
        verifier,
        instance.cancel_token().clone(),
    )
    .await
    .context("connecting to guest over ssh")?;

    let cmd = shell_words::join(command);
    run_ssh_cmd(&client, &cmd)
        .await
        .with_context(|| format!("running '{}' in guest", cmd))
}
