use anyhow::{Context, Result};

use crate::cli::VmArgs;
use crate::qemu::build_vm_args;

/// Port shown when none was requested; `run` picks a free one instead.
const DISPLAY_SSH_PORT: u16 = 2222;

pub async fn cmd_qemu_args(args: VmArgs) -> Result<()> {
    let spec = args.to_spec(args.ssh_port.unwrap_or(DISPLAY_SSH_PORT));
    let qemu_args = build_vm_args(&spec).context("building QEMU arguments")?;

    println!(
        "{} {}",
        shell_words::quote(&spec.qemu_binary.to_string_lossy()),
        qemu_args
    );
    Ok(())
}
