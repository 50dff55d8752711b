use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::{DEFAULT_BOOT_TIMEOUT, DEFAULT_SERIAL_TIMEOUT};

#[derive(Parser, Debug)]
#[command(
    name = "hostvm",
    version,
    about = "Run commands against guest-native file systems inside a throwaway QEMU VM"
)]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Boot a throwaway VM, bootstrap SSH over its serial console and run a command
    Run(RunArgs),
    /// Print the validated QEMU command line for a VM
    QemuArgs(VmArgs),
    /// Parse a keyscan-format host key file and optionally check a key against it
    KnownHosts(KnownHostsArgs),
}

#[derive(Args, Debug)]
pub struct VmArgs {
    /// Guest boot image
    pub image: PathBuf,

    /// QEMU system emulator binary
    #[arg(long)]
    pub qemu: Option<PathBuf>,

    /// Boot image format
    #[arg(long, default_value = "qcow2")]
    pub format: String,

    /// Block device or image file to pass through (repeatable)
    #[arg(long)]
    pub disk: Vec<PathBuf>,

    /// Memory (MiB)
    #[arg(long, default_value_t = 512)]
    pub mem: u32,

    /// vCPUs
    #[arg(long, default_value_t = 1)]
    pub cpus: u8,

    /// Accelerator: kvm | hvf | tcg
    #[arg(long)]
    pub accel: Option<String>,

    /// Host port on 127.0.0.1 forwarded to the guest sshd (default: any free port)
    #[arg(long)]
    pub ssh_port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct BootstrapArgs {
    /// Deadline for the guest network + sshd setup command
    #[arg(long, default_value_t = DEFAULT_SERIAL_TIMEOUT.as_secs())]
    pub setup_timeout_secs: u64,

    /// Deadline for the in-guest host key scan
    #[arg(long, default_value_t = DEFAULT_SERIAL_TIMEOUT.as_secs())]
    pub keyscan_timeout_secs: u64,

    /// Time allowed for the guest to reach a shell on the serial console
    #[arg(long, default_value_t = DEFAULT_BOOT_TIMEOUT.as_secs())]
    pub boot_timeout_secs: u64,

    /// Guest network interface to bring up before DHCP
    #[arg(long, default_value = "eth0")]
    pub interface: String,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub vm: VmArgs,

    #[command(flatten)]
    pub bootstrap: BootstrapArgs,

    /// Guest user to authenticate as
    #[arg(long, default_value = "root")]
    pub ssh_user: String,

    /// Command to run in the guest
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

#[derive(Args, Debug)]
pub struct KnownHostsArgs {
    /// File with `<host> <key-type> <base64-key>` records
    pub file: PathBuf,

    /// Base64 wire-encoded public key to verify against the file
    #[arg(long)]
    pub key: Option<String>,
}
