use std::time::Duration;

use super::args::{BootstrapArgs, VmArgs};
use crate::config::{default_qemu_binary, BootstrapConfig, VmSpec};

impl From<&BootstrapArgs> for BootstrapConfig {
    fn from(args: &BootstrapArgs) -> Self {
        Self {
            setup_timeout: Duration::from_secs(args.setup_timeout_secs),
            keyscan_timeout: Duration::from_secs(args.keyscan_timeout_secs),
            boot_timeout: Duration::from_secs(args.boot_timeout_secs),
            guest_interface: args.interface.clone(),
            ..Default::default()
        }
    }
}

impl VmArgs {
    /// VM spec with the SSH forward bound to `ssh_port`.
    pub fn to_spec(&self, ssh_port: u16) -> VmSpec {
        VmSpec {
            qemu_binary: self.qemu.clone().unwrap_or_else(default_qemu_binary),
            image: self.image.clone(),
            image_format: self.format.clone(),
            disks: self.disk.clone(),
            mem_mib: self.mem,
            cpus: self.cpus,
            accel: self.accel.clone(),
            ssh_port,
        }
    }
}
