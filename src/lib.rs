pub mod cli;
pub mod commands;
pub mod config;
pub mod qemu;
pub mod ssh;
pub mod vm;

// Re-export core types for convenience
pub use config::{BootstrapConfig, VmSpec};
pub use qemu::{Arg, ArgError, ArgList, FlagArg, KeyValueArg, KeyValueArgItem, StringArg};
pub use ssh::{parse_ssh_keyscan, run_ssh_cmd, HostKeyVerifier, SshClient, SshIdentity};
pub use vm::{Instance, InstanceError};
