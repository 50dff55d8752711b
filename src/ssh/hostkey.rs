//! Host-key pinning from `ssh-keyscan` output.
//!
//! Records are `<host> <key-type> <base64-key>`, one per line. The scan runs
//! inside the guest over the serial console moments before we connect, so the
//! scanned keys are the only thing trusted. There is no trust-on-first-use.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum HostKeyError {
    #[error("bad split ssh identity string length: want {want}, have {have} ('{line}')")]
    BadRecord {
        want: usize,
        have: usize,
        line: String,
    },

    #[error("decode base64 public key: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("keyscan output is not valid UTF-8")]
    NotUtf8(#[from] std::str::Utf8Error),

    #[error("read known hosts file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unknown key type '{0}'")]
    UnknownKeyType(String),

    #[error("public key mismatch")]
    Mismatch,

    #[error("malformed public key blob")]
    MalformedKey,
}

/// Read the key type name from a wire-encoded SSH public key.
///
/// The blob starts with a big-endian u32 length followed by the type name.
pub fn key_type_from_blob(blob: &[u8]) -> Result<&str, HostKeyError> {
    let len_bytes: [u8; 4] = blob
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or(HostKeyError::MalformedKey)?;
    let len = u32::from_be_bytes(len_bytes) as usize;

    let name = blob.get(4..4 + len).ok_or(HostKeyError::MalformedKey)?;
    std::str::from_utf8(name).map_err(|_| HostKeyError::MalformedKey)
}

/// Pinned host keys by key type. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct HostKeyVerifier {
    known: HashMap<String, Vec<u8>>,
}

impl HostKeyVerifier {
    /// Load a pinning file in keyscan format.
    pub fn from_file(path: &Path) -> Result<Self, HostKeyError> {
        let data = std::fs::read(path).map_err(|source| HostKeyError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_ssh_keyscan(&data)
    }

    /// Accept `key` only if a key of exactly `key_type` was pinned and matches
    /// byte for byte.
    pub fn verify(&self, key_type: &str, key: &[u8]) -> Result<(), HostKeyError> {
        let known = self
            .known
            .get(key_type)
            .ok_or_else(|| HostKeyError::UnknownKeyType(key_type.to_string()))?;

        if known.as_slice() != key {
            return Err(HostKeyError::Mismatch);
        }

        Ok(())
    }

    /// Verify a wire-encoded key, taking the type from the blob itself.
    pub fn verify_blob(&self, blob: &[u8]) -> Result<(), HostKeyError> {
        let key_type = key_type_from_blob(blob)?;
        self.verify(key_type, blob)
    }

    pub fn key_types(&self) -> impl Iterator<Item = &str> {
        self.known.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }
}

/// Build a [`HostKeyVerifier`] from `ssh-keyscan` output.
///
/// Any malformed record fails the whole parse; no partial table is returned.
pub fn parse_ssh_keyscan(known_hosts: &[u8]) -> Result<HostKeyVerifier, HostKeyError> {
    let text = std::str::from_utf8(known_hosts)?;

    let mut known = HashMap::new();
    for line in text.split('\n') {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(' ').collect();
        if fields.len() != 3 {
            return Err(HostKeyError::BadRecord {
                want: 3,
                have: fields.len(),
                line: line.to_string(),
            });
        }

        let key = STANDARD.decode(fields[2])?;
        known.insert(fields[1].to_string(), key);
    }

    Ok(HostKeyVerifier { known })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_verify() {
        let verifier = parse_ssh_keyscan(b"example 1 QUJD").unwrap();

        verifier.verify("1", b"ABC").unwrap();

        let err = verifier.verify("2", b"ABC").unwrap_err();
        assert_eq!(err.to_string(), "unknown key type '2'");

        let err = verifier.verify("1", b"ABD").unwrap_err();
        assert_eq!(err.to_string(), "public key mismatch");
    }

    #[test]
    fn test_two_field_record_is_a_parse_error() {
        let err = parse_ssh_keyscan(b"example 1 QUJD\nexample 1\n").unwrap_err();
        assert!(matches!(
            err,
            HostKeyError::BadRecord {
                want: 3,
                have: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_bad_base64_is_a_parse_error() {
        let err = parse_ssh_keyscan(b"example 1 !!!notbase64").unwrap_err();
        assert!(matches!(err, HostKeyError::Base64(_)));
    }

    #[test]
    fn test_blank_lines_and_crlf_are_tolerated() {
        let verifier = parse_ssh_keyscan(b"\r\n|1|abc|def ssh-ed25519 QUJD\r\n\n").unwrap();
        assert_eq!(verifier.len(), 1);
        verifier.verify("ssh-ed25519", b"ABC").unwrap();
    }

    #[test]
    fn test_double_space_is_not_a_valid_record() {
        assert!(parse_ssh_keyscan(b"example  1 QUJD").is_err());
    }

    #[test]
    fn test_empty_input_trusts_nothing() {
        let verifier = parse_ssh_keyscan(b"").unwrap();
        assert!(verifier.is_empty());
        assert!(matches!(
            verifier.verify("ssh-rsa", b""),
            Err(HostKeyError::UnknownKeyType(_))
        ));
    }

    fn blob(key_type: &str, payload: &[u8]) -> Vec<u8> {
        let mut b = (key_type.len() as u32).to_be_bytes().to_vec();
        b.extend_from_slice(key_type.as_bytes());
        b.extend_from_slice(payload);
        b
    }

    #[test]
    fn test_verify_blob_uses_embedded_type() {
        let key = blob("ssh-ed25519", &[7; 36]);
        let record = format!("localhost ssh-ed25519 {}\n", STANDARD.encode(&key));
        let verifier = parse_ssh_keyscan(record.as_bytes()).unwrap();

        verifier.verify_blob(&key).unwrap();

        let other = blob("ssh-ed25519", &[8; 36]);
        assert!(matches!(verifier.verify_blob(&other), Err(HostKeyError::Mismatch)));

        let rsa = blob("ssh-rsa", &[7; 36]);
        assert!(matches!(
            verifier.verify_blob(&rsa),
            Err(HostKeyError::UnknownKeyType(t)) if t == "ssh-rsa"
        ));
    }

    #[test]
    fn test_truncated_blob_is_malformed() {
        assert!(matches!(key_type_from_blob(&[0, 0]), Err(HostKeyError::MalformedKey)));
        assert!(matches!(
            key_type_from_blob(&[0, 0, 0, 9, b's']),
            Err(HostKeyError::MalformedKey)
        ));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("known_hosts");
        std::fs::write(&path, "example 1 QUJD\n").unwrap();

        let verifier = HostKeyVerifier::from_file(&path).unwrap();
        assert_eq!(verifier.key_types().collect::<Vec<_>>(), vec!["1"]);

        let missing = HostKeyVerifier::from_file(&dir.path().join("nope"));
        assert!(matches!(missing, Err(HostKeyError::Io { .. })));
    }
}
