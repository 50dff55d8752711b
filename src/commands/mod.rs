pub mod known_hosts;
pub mod qemu_args;
pub mod run;

// Re-export command functions
pub use known_hosts::cmd_known_hosts;
pub use qemu_args::cmd_qemu_args;
pub use run::cmd_run;
