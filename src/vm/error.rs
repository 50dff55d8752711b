use super::serial::log_err_msg;
use crate::ssh::{HostKeyError, KeyGenError};

/// Failure of a serial console interaction with the guest.
///
/// `op` names the step ("setup", "keyscan", "boot"). Variants that carry a
/// `log` hold the console output captured for that step.
#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("write {op} command to serial: {source}")]
    Write {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{op} cancelled")]
    Cancelled { op: &'static str },

    #[error("{op} command timed out {}", log_err_msg(.log))]
    Timeout { op: &'static str, log: String },

    #[error("{op} command status code did not show up")]
    MissingStatus { op: &'static str },

    #[error("non-zero {op} command status code: '{status}' {}", log_err_msg(.log))]
    NonZeroStatus {
        op: &'static str,
        status: char,
        log: String,
    },

    #[error("serial console closed during {op} {}", log_err_msg(.log))]
    Closed { op: &'static str, log: String },

    #[error("serial console is busy with another command")]
    Busy,

    #[error("generate ssh key: {0}")]
    KeyGen(#[from] KeyGenError),

    #[error("parse ssh keyscan: {0}")]
    HostKey(#[from] HostKeyError),

    #[error("ssh key generation task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl InstanceError {
    /// Console output captured before the failure, if any was kept.
    pub fn log(&self) -> Option<&str> {
        match self {
            InstanceError::Timeout { log, .. }
            | InstanceError::NonZeroStatus { log, .. }
            | InstanceError::Closed { log, .. } => Some(log),
            _ => None,
        }
    }
}
