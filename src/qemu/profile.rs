//! QEMU launch arguments for the throwaway guest.
//!
//! The serial console on stdio and the user-mode network with an SSH port
//! forward are what the bootstrap protocol relies on; everything else is
//! sizing and disks.

use std::path::Path;

use super::arg::ArgError;
use super::{ArgList, FlagArg, KeyValueArg, KeyValueArgItem, StringArg};
use crate::config::VmSpec;

/// Network device id shared by `-netdev` and `-device`.
const NET_ID: &str = "net0";

/// Guest port sshd listens on.
const GUEST_SSH_PORT: u16 = 22;

fn path_value(path: &Path) -> String {
    // Non-UTF-8 paths become U+FFFD and fail the allowlist.
    path.to_string_lossy().into_owned()
}

fn drive(file: &Path, format: &str) -> Result<KeyValueArg, ArgError> {
    KeyValueArg::new(
        "drive",
        &[
            KeyValueArgItem::new("file", path_value(file)),
            KeyValueArgItem::new("format", format),
            KeyValueArgItem::new("if", "virtio"),
        ],
    )
}

/// Build the full, validated argument list for `spec`.
pub fn build_vm_args(spec: &VmSpec) -> Result<ArgList, ArgError> {
    let mut args = ArgList::new();

    args.push(StringArg::must_new("serial", "stdio"))
        .push(StringArg::must_new("display", "none"))
        .push(StringArg::must_new("monitor", "none"))
        .push(FlagArg::must_new("no-reboot"));

    args.push(StringArg::new("m", spec.mem_mib.to_string())?)
        .push(StringArg::new("smp", spec.cpus.to_string())?);

    if let Some(accel) = &spec.accel {
        args.push(StringArg::new("accel", accel.as_str()).map_err(|e| e.context("accelerator"))?);
    }

    let hostfwd = format!("tcp:127.0.0.1:{}-:{}", spec.ssh_port, GUEST_SSH_PORT);
    args.push(KeyValueArg::new(
        "netdev",
        &[
            KeyValueArgItem::new("type", "user"),
            KeyValueArgItem::new("id", NET_ID),
            KeyValueArgItem::new("hostfwd", hostfwd),
        ],
    )?)
    .push(KeyValueArg::new(
        "device",
        &[
            KeyValueArgItem::new("driver", "virtio-net-pci"),
            KeyValueArgItem::new("netdev", NET_ID),
        ],
    )?);

    args.push(
        drive(&spec.image, &spec.image_format)
            .map_err(|e| e.context(format!("boot image {}", spec.image.display())))?,
    );

    for disk in &spec.disks {
        args.push(drive(disk, "raw").map_err(|e| e.context(format!("disk {}", disk.display())))?);
    }

    Ok(args)
}
