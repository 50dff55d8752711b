//! Runtime configuration for the guest VM and the serial bootstrap.
//!
//! Defaults live here; the CLI only overrides them.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default timeout for a single serial command (setup or keyscan).
pub const DEFAULT_SERIAL_TIMEOUT: Duration = Duration::from_secs(5);

/// Default time allowed for the guest to reach a shell on the serial console.
pub const DEFAULT_BOOT_TIMEOUT: Duration = Duration::from_secs(60);

/// RSA modulus size for the ephemeral SSH identity.
pub const DEFAULT_SSH_KEY_BITS: usize = 4096;

/// Timing and guest details for the serial bootstrap protocol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Deadline for the networking + sshd setup command
    pub setup_timeout: Duration,
    /// Deadline for the in-guest ssh-keyscan
    pub keyscan_timeout: Duration,
    /// Deadline for the guest shell to answer a probe after boot
    pub boot_timeout: Duration,
    /// Delay between boot probes
    pub probe_interval: Duration,
    /// Primary guest network interface brought up before DHCP
    pub guest_interface: String,
    /// RSA modulus size for the generated identity
    pub ssh_key_bits: usize,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            setup_timeout: DEFAULT_SERIAL_TIMEOUT,
            keyscan_timeout: DEFAULT_SERIAL_TIMEOUT,
            boot_timeout: DEFAULT_BOOT_TIMEOUT,
            probe_interval: Duration::from_secs(1),
            guest_interface: "eth0".to_string(),
            ssh_key_bits: DEFAULT_SSH_KEY_BITS,
        }
    }
}

/// What the QEMU process should look like.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VmSpec {
    /// QEMU system emulator binary
    pub qemu_binary: PathBuf,
    /// Guest boot image
    pub image: PathBuf,
    /// Boot image format (qcow2, raw)
    pub image_format: String,
    /// Host block devices or files passed through as raw virtio disks
    pub disks: Vec<PathBuf>,
    pub mem_mib: u32,
    pub cpus: u8,
    /// Accelerator (kvm, hvf, tcg); QEMU picks when unset
    pub accel: Option<String>,
    /// Host port on 127.0.0.1 forwarded to the guest's sshd
    pub ssh_port: u16,
}

impl VmSpec {
    pub fn new(image: PathBuf, ssh_port: u16) -> Self {
        Self {
            qemu_binary: default_qemu_binary(),
            image,
            image_format: "qcow2".to_string(),
            disks: Vec::new(),
            mem_mib: 512,
            cpus: 1,
            accel: None,
            ssh_port,
        }
    }

    /// Serialize to JSON string (for debugging/logging).
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|e| format!("<unserializable: {e}>"))
    }
}

/// QEMU binary matching the host architecture.
pub fn default_qemu_binary() -> PathBuf {
    if cfg!(target_arch = "aarch64") {
        PathBuf::from("qemu-system-aarch64")
    } else {
        PathBuf::from("qemu-system-x86_64")
    }
}
