use crate::config::RemoteCredentials;
use async_trait::async_trait;
use ssh2::Session;
use std::io::Read;
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;
use thiserror::Error;
use tokio::task;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error("failed to reach {host}: {source}")]
    Connect {
        host: String,
        source: std::io::Error,
    },
    #[error("ssh handshake with {host} failed: {source}")]
    Handshake { host: String, source: ssh2::Error },
    #[error("authentication for {user}@{host} rejected: {source}")]
    Auth {
        host: String,
        user: String,
        source: ssh2::Error,
    },
    #[error("remote command failed: {0}")]
    Command(#[source] ssh2::Error),
    #[error("i/o error on ssh channel: {0}")]
    Io(#[from] std::io::Error),
    #[error("remote call timed out")]
    Timeout,
    #[error("session already closed")]
    Closed,
    #[error("blocking ssh task failed: {0}")]
    Join(#[from] task::JoinError),
}

/// Opens authenticated shell sessions on remote hosts.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    async fn session(
        &self,
        creds: &RemoteCredentials,
    ) -> Result<Box<dyn ShellSession>, ShellError>;
}

/// One open session. `close` must be called on every exit path; dropping an
/// unclosed session tears the connection down without the disconnect packet.
#[async_trait]
pub trait ShellSession: Send {
    /// Runs a command and returns its stdout. The remote exit status is not
    /// inspected; partial output from a failed command is still parsed.
    async fn exec(&mut self, command: &str) -> Result<String, ShellError>;
    async fn close(&mut self);
}

/// libssh2-backed connector. All blocking calls run on the tokio blocking
/// pool; `timeout` bounds the TCP connect and every libssh2 operation.
pub struct SshConnector {
    timeout: Duration,
}

impl SshConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl RemoteShell for SshConnector {
    async fn session(
        &self,
        creds: &RemoteCredentials,
    ) -> Result<Box<dyn ShellSession>, ShellError> {
        let creds = creds.clone();
        let timeout = self.timeout;
        let session = task::spawn_blocking(move || open_session(&creds, timeout)).await??;
        Ok(Box::new(SshShellSession {
            session: Some(session),
        }))
    }
}

struct SshShellSession {
    session: Option<Session>,
}

#[async_trait]
impl ShellSession for SshShellSession {
    async fn exec(&mut self, command: &str) -> Result<String, ShellError> {
        let session = self.session.take().ok_or(ShellError::Closed)?;
        let command = command.to_string();
        let (session, result) = task::spawn_blocking(move || {
            let result = run_command(&session, &command);
            (session, result)
        })
        .await?;
        self.session = Some(session);
        result
    }

    async fn close(&mut self) {
        if let Some(session) = self.session.take() {
            let _ = task::spawn_blocking(move || {
                let _ = session.disconnect(None, "status poll finished", None);
            })
            .await;
        }
    }
}

fn open_session(creds: &RemoteCredentials, timeout: Duration) -> Result<Session, ShellError> {
    // Bare hostnames default to port 22; "host:port" is passed through.
    let addr_str = if creds.host.contains(':') {
        creds.host.clone()
    } else {
        format!("{}:22", creds.host)
    };

    let addr = addr_str
        .to_socket_addrs()
        .map_err(|source| ShellError::Connect {
            host: creds.host.clone(),
            source,
        })?
        .next()
        .ok_or_else(|| ShellError::Connect {
            host: creds.host.clone(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "no address resolved"),
        })?;

    let tcp = TcpStream::connect_timeout(&addr, timeout).map_err(|source| ShellError::Connect {
        host: creds.host.clone(),
        source,
    })?;

    let mut session = Session::new().map_err(|source| ShellError::Handshake {
        host: creds.host.clone(),
        source,
    })?;
    session.set_tcp_stream(tcp);
    session.set_timeout(timeout.as_millis() as u32);
    session
        .handshake()
        .map_err(|source| ShellError::Handshake {
            host: creds.host.clone(),
            source,
        })?;
    session
        .userauth_password(&creds.username, &creds.password)
        .map_err(|source| ShellError::Auth {
            host: creds.host.clone(),
            user: creds.username.clone(),
            source,
        })?;

    Ok(session)
}

fn run_command(session: &Session, command: &str) -> Result<String, ShellError> {
    let mut channel = session.channel_session().map_err(ShellError::Command)?;
    channel.exec(command).map_err(ShellError::Command)?;

    let mut stdout = String::new();
    channel.read_to_string(&mut stdout)?;

    let _ = channel.wait_close();
    Ok(stdout)
}
