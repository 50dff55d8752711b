//! Ephemeral SSH identity used for the bootstrap SSH hop.

use rand_core::OsRng;
use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::{HashAlg, LineEnding, PrivateKey};
use std::fmt;
use std::ops::Deref;

use crate::config::DEFAULT_SSH_KEY_BITS;

const KEY_COMMENT: &str = "hostvm-ephemeral";

#[derive(Debug, thiserror::Error)]
pub enum KeyGenError {
    #[error("generate rsa private key: {0}")]
    Generate(#[source] ssh_key::Error),

    #[error("create private key from keypair: {0}")]
    Assemble(#[source] ssh_key::Error),

    #[error("encode public key: {0}")]
    EncodePublic(#[source] ssh_key::Error),

    #[error("encode private key: {0}")]
    EncodePrivate(#[source] ssh_key::Error),
}

/// RSA keypair generated once per guest session. Lives only in memory.
pub struct SshIdentity {
    private_key: PrivateKey,
    authorized_key: String,
}

impl SshIdentity {
    /// Generate a 4096-bit RSA identity from the OS randomness source.
    ///
    /// Failures are returned as-is and must not be retried with the same state.
    pub fn generate() -> Result<Self, KeyGenError> {
        Self::generate_with_bits(DEFAULT_SSH_KEY_BITS)
    }

    pub fn generate_with_bits(bits: usize) -> Result<Self, KeyGenError> {
        let keypair = RsaKeypair::random(&mut OsRng, bits).map_err(KeyGenError::Generate)?;
        let private_key = PrivateKey::new(KeypairData::from(keypair), KEY_COMMENT)
            .map_err(KeyGenError::Assemble)?;

        let authorized_key = private_key
            .public_key()
            .to_openssh()
            .map_err(KeyGenError::EncodePublic)?;

        Ok(Self {
            private_key,
            authorized_key,
        })
    }

    /// One `authorized_keys` line: `ssh-rsa <base64> <comment>`.
    pub fn authorized_key(&self) -> &str {
        &self.authorized_key
    }

    /// Wire-encoded public key, as a server would present it.
    pub fn public_key_blob(&self) -> Result<Vec<u8>, KeyGenError> {
        self.private_key
            .public_key()
            .to_bytes()
            .map_err(KeyGenError::EncodePublic)
    }

    pub fn fingerprint(&self) -> String {
        self.private_key.fingerprint(HashAlg::Sha256).to_string()
    }

    /// OpenSSH PEM of the private key. Zeroed when dropped.
    pub(crate) fn private_key_openssh(&self) -> Result<impl Deref<Target = String>, KeyGenError> {
        self.private_key
            .to_openssh(LineEnding::LF)
            .map_err(KeyGenError::EncodePrivate)
    }
}

impl fmt::Debug for SshIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SshIdentity")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}
