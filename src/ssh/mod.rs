//! Ephemeral identity, host-key pinning and command execution for the SSH
//! hop into the guest.

pub mod client;
pub mod hostkey;
pub mod keygen;

pub use client::{run_ssh_cmd, SshClient, SshError};
pub use hostkey::{key_type_from_blob, parse_ssh_keyscan, HostKeyError, HostKeyVerifier};
pub use keygen::{KeyGenError, SshIdentity};
