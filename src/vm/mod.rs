//! Guest VM session: serial console bootstrap and host-key scan.
//!
//! Flow: [`Instance::wait_for_shell`] → [`Instance::ssh_setup`] →
//! [`Instance::scan_host_keys`] → [`crate::ssh::SshClient::connect`].

pub mod bootstrap;
pub mod error;
pub mod instance;
pub mod keyscan;
pub mod process;
pub mod serial;

pub use bootstrap::setup_command;
pub use error::InstanceError;
pub use instance::Instance;
pub use keyscan::keyscan_command;
pub use process::VmProcess;
pub use serial::{parse_status, SerialStatus, STATUS_PREFIX};
