//! SSH hop into the guest: connect with a pinned host key, run one command.
//!
//! libssh2 is blocking, so every call runs on the blocking pool and is raced
//! against the session's cancellation token.

use std::io::Read;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::hostkey::{HostKeyError, HostKeyVerifier};
use super::keygen::{KeyGenError, SshIdentity};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, thiserror::Error)]
pub enum SshError {
    #[error("connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("{what}: {source}")]
    Session {
        what: &'static str,
        #[source]
        source: ssh2::Error,
    },

    #[error("verify host key: {0}")]
    HostKey(#[from] HostKeyError),

    #[error("server did not present a host key")]
    NoHostKey,

    #[error(transparent)]
    KeyGen(#[from] KeyGenError),

    #[error("authentication as '{user}' was rejected")]
    AuthRejected { user: String },

    #[error("run cmd: {source} (stderr: {stderr:?})")]
    Command {
        #[source]
        source: std::io::Error,
        stderr: String,
    },

    #[error("run cmd: exit status {status} (stderr: {stderr:?})")]
    ExitStatus { status: i32, stderr: String },

    #[error("ssh operation cancelled")]
    Cancelled,

    #[error("ssh worker failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

fn session_err(what: &'static str) -> impl FnOnce(ssh2::Error) -> SshError {
    move |source| SshError::Session { what, source }
}

/// Run blocking libssh2 work off the runtime, abandoning it on cancellation.
///
/// A blocking task cannot be aborted, so on cancellation `socket` is shut
/// down instead. That fails whatever libssh2 call is blocked on it, the
/// task unwinds through its close paths, and the peer sees EOF right away.
async fn run_blocking<T, F>(
    cancel: &CancellationToken,
    socket: Option<&TcpStream>,
    f: F,
) -> Result<T, SshError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, SshError> + Send + 'static,
{
    let task = tokio::task::spawn_blocking(f);
    tokio::select! {
        _ = cancel.cancelled() => {
            if let Some(socket) = socket {
                if let Err(e) = socket.shutdown(Shutdown::Both) {
                    debug!(target: "ssh", error = %e, "shutdown of cancelled ssh socket failed");
                }
            }
            Err(SshError::Cancelled)
        }
        res = task => res?,
    }
}

/// Authenticated connection whose host key matched the pinned keyscan.
#[derive(Clone)]
pub struct SshClient {
    session: ssh2::Session,
    /// Second handle on the session's socket, shut down on cancellation.
    socket: Arc<TcpStream>,
    cancel: CancellationToken,
}

impl SshClient {
    /// Connect, verify the host key against `verifier`, then authenticate as
    /// `user` with `identity`. The host key is checked before any credential
    /// is offered.
    pub async fn connect(
        addr: SocketAddr,
        user: &str,
        identity: &SshIdentity,
        verifier: HostKeyVerifier,
        cancel: CancellationToken,
    ) -> Result<Self, SshError> {
        info!(target: "ssh", %addr, user, "connecting to guest sshd");

        let user = user.to_string();
        let private_key = identity.private_key_openssh()?.to_string();

        let tcp = run_blocking(&cancel, None, move || {
            TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
                .map_err(|source| SshError::Connect { addr, source })
        })
        .await?;
        let socket = Arc::new(
            tcp.try_clone()
                .map_err(|source| SshError::Connect { addr, source })?,
        );

        let session = run_blocking(&cancel, Some(socket.as_ref()), move || {
            let mut session = ssh2::Session::new().map_err(session_err("create ssh session"))?;
            session.set_tcp_stream(tcp);
            session.handshake().map_err(session_err("ssh handshake"))?;

            let (host_key, _) = session.host_key().ok_or(SshError::NoHostKey)?;
            verifier.verify_blob(host_key)?;
            debug!(target: "ssh", "host key matches pinned keyscan");

            session
                .userauth_pubkey_memory(&user, None, &private_key, None)
                .map_err(session_err("ssh public key auth"))?;
            if !session.authenticated() {
                return Err(SshError::AuthRejected { user });
            }

            Ok(session)
        })
        .await?;

        info!(target: "ssh", %addr, "ssh session authenticated");
        Ok(Self {
            session,
            socket,
            cancel,
        })
    }

    /// Run `cmd` in a fresh channel and return its stdout.
    pub async fn run(&self, cmd: &str) -> Result<Vec<u8>, SshError> {
        run_ssh_cmd(self, cmd).await
    }
}

/// Run a single command over its own channel.
///
/// On failure the error carries whatever the command wrote to stderr. The
/// channel is closed on every path before returning.
pub async fn run_ssh_cmd(client: &SshClient, cmd: &str) -> Result<Vec<u8>, SshError> {
    debug!(target: "ssh", cmd, "running remote command");

    let session = client.session.clone();
    let cmd = cmd.to_string();

    run_blocking(&client.cancel, Some(client.socket.as_ref()), move || {
        let mut channel = session
            .channel_session()
            .map_err(session_err("create new vm ssh session"))?;

        let result = exec_on_channel(&mut channel, &cmd);

        let _ = channel.close();
        let _ = channel.wait_close();

        result
    })
    .await
}

fn exec_on_channel(channel: &mut ssh2::Channel, cmd: &str) -> Result<Vec<u8>, SshError> {
    let mut stdout = Vec::new();
    let mut stderr = String::new();

    let run = (|| -> std::io::Result<i32> {
        channel.exec(cmd)?;
        channel.read_to_end(&mut stdout)?;
        channel.stderr().read_to_string(&mut stderr)?;
        channel.wait_eof()?;
        channel.wait_close()?;
        Ok(channel.exit_status()?)
    })();

    match run {
        Ok(0) => Ok(stdout),
        Ok(status) => Err(SshError::ExitStatus { status, stderr }),
        Err(source) => Err(SshError::Command { source, stderr }),
    }
}
