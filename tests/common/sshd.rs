//! Throwaway OpenSSH server on 127.0.0.1 for exercising the SSH hop.
//!
//! Uses the host's `sshd`; callers skip when it is missing or cannot start.

use std::net::{TcpListener, TcpStream};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand_core::OsRng;
use ssh_key::private::{KeypairData, RsaKeypair};
use ssh_key::{LineEnding, PrivateKey};

const SSHD_PATHS: &[&str] = &["/usr/sbin/sshd", "/usr/local/sbin/sshd", "/sbin/sshd"];

const STARTUP_TIMEOUT: Duration = Duration::from_secs(5);

pub fn find_sshd() -> Option<PathBuf> {
    SSHD_PATHS.iter().map(PathBuf::from).find(|p| p.exists())
}

/// Name of the user the tests run as; sshd only lets that user in.
pub fn current_user() -> Result<String> {
    if let Ok(user) = std::env::var("USER") {
        if !user.is_empty() {
            return Ok(user);
        }
    }
    let output = Command::new("id").arg("-un").output().context("running id -un")?;
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

pub struct TestSshd {
    child: Child,
    pub port: u16,
    pub user: String,
    /// Wire-encoded host public key, as the client will be shown it.
    pub host_key_blob: Vec<u8>,
    _dir: tempfile::TempDir,
}

impl TestSshd {
    /// Start sshd accepting `authorized_key` for the current user.
    ///
    /// Returns `Ok(None)` (after printing why) when no usable sshd exists.
    pub fn start(authorized_key: &str) -> Result<Option<Self>> {
        let Some(sshd) = find_sshd() else {
            println!("SKIP: sshd not found in {:?}", SSHD_PATHS);
            return Ok(None);
        };

        let dir = tempfile::tempdir().context("creating sshd dir")?;
        let host_key = write_host_key(&dir.path().join("host_key"))?;
        let authorized_keys = dir.path().join("authorized_keys");
        std::fs::write(&authorized_keys, format!("{authorized_key}\n"))?;

        let port = {
            let probe = TcpListener::bind("127.0.0.1:0")?;
            probe.local_addr()?.port()
        };

        let config = dir.path().join("sshd_config");
        std::fs::write(
            &config,
            format!(
                "Port {port}\n\
                 ListenAddress 127.0.0.1\n\
                 HostKey {host_key_path}\n\
                 AuthorizedKeysFile {authorized_keys}\n\
                 PidFile {pid}\n\
                 StrictModes no\n\
                 PubkeyAuthentication yes\n\
                 PasswordAuthentication no\n\
                 KbdInteractiveAuthentication no\n\
                 PermitRootLogin prohibit-password\n\
                 LogLevel ERROR\n",
                host_key_path = dir.path().join("host_key").display(),
                authorized_keys = authorized_keys.display(),
                pid = dir.path().join("sshd.pid").display(),
            ),
        )?;

        // Running as root, sshd insists on its privilege separation directory.
        let _ = std::fs::create_dir_all("/run/sshd");

        let mut child = Command::new(&sshd)
            .arg("-D")
            .arg("-e")
            .arg("-f")
            .arg(&config)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .spawn()
            .with_context(|| format!("spawning {}", sshd.display()))?;

        let deadline = Instant::now() + STARTUP_TIMEOUT;
        loop {
            if TcpStream::connect(("127.0.0.1", port)).is_ok() {
                break;
            }
            if let Some(status) = child.try_wait()? {
                println!("SKIP: sshd exited during startup: {}", status);
                return Ok(None);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                println!("SKIP: sshd did not listen on port {} within {:?}", port, STARTUP_TIMEOUT);
                return Ok(None);
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        Ok(Some(Self {
            child,
            port,
            user: current_user()?,
            host_key_blob: host_key.public_key().to_bytes()?,
            _dir: dir,
        }))
    }

    pub fn addr(&self) -> std::net::SocketAddr {
        std::net::SocketAddr::from(([127, 0, 0, 1], self.port))
    }
}

impl Drop for TestSshd {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn write_host_key(path: &Path) -> Result<PrivateKey> {
    let keypair = RsaKeypair::random(&mut OsRng, 2048)?;
    let key = PrivateKey::new(KeypairData::from(keypair), "hostvm-test-host")?;
    std::fs::write(path, key.to_openssh(LineEnding::LF)?.as_bytes())?;
    // sshd refuses host keys readable by others.
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    Ok(key)
}
