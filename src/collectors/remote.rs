use crate::collectors::{
    disk, HostCollector, HostStatus, DF_COMMAND, UPTIME_COMMAND,
};
use crate::config::RemoteCredentials;
use crate::ssh::{RemoteShell, ShellError, ShellSession};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::timeout;
use tracing::warn;

/// Collector for a host reached over SSH. Missing credentials short-circuit
/// to `ConfigError` before any connection attempt; every transport or
/// command failure degrades to `Unreachable`.
pub struct RemoteCollector<'a, S: RemoteShell + ?Sized> {
    name: &'a str,
    credentials: Option<RemoteCredentials>,
    shell: &'a S,
    call_timeout: Duration,
}

impl<'a, S: RemoteShell + ?Sized> RemoteCollector<'a, S> {
    pub fn new(
        name: &'a str,
        credentials: Option<RemoteCredentials>,
        shell: &'a S,
        call_timeout: Duration,
    ) -> Self {
        Self {
            name,
            credentials,
            shell,
            call_timeout,
        }
    }

    async fn poll_session(&self, session: &mut dyn ShellSession) -> Result<HostStatus, ShellError> {
        let uptime_raw = timeout(self.call_timeout, session.exec(UPTIME_COMMAND))
            .await
            .map_err(|_| ShellError::Timeout)??;
        // /proc/uptime reports fractional seconds; whole seconds are enough.
        let uptime_seconds = uptime_raw.trim().parse::<f64>().ok().map(|s| s as u64);

        let df_raw = timeout(self.call_timeout, session.exec(DF_COMMAND))
            .await
            .map_err(|_| ShellError::Timeout)??;
        let disks = disk::parse_disk_output(&df_raw);

        Ok(HostStatus::online(uptime_seconds, disks))
    }
}

#[async_trait]
impl<S: RemoteShell + ?Sized> HostCollector for RemoteCollector<'_, S> {
    async fn collect(&self) -> HostStatus {
        let Some(creds) = &self.credentials else {
            warn!(server = %self.name, "ssh credentials missing or incomplete");
            return HostStatus::config_error();
        };

        let mut session = match timeout(self.call_timeout, self.shell.session(creds)).await {
            Ok(Ok(session)) => session,
            Ok(Err(err)) => {
                warn!(server = %self.name, host = %creds.host, error = %err, "ssh connect failed");
                return HostStatus::unreachable();
            }
            Err(_) => {
                warn!(server = %self.name, host = %creds.host, "ssh connect timed out");
                return HostStatus::unreachable();
            }
        };

        let result = self.poll_session(session.as_mut()).await;
        session.close().await;

        match result {
            Ok(status) => status,
            Err(err) => {
                warn!(server = %self.name, host = %creds.host, error = %err, "remote poll failed");
                HostStatus::unreachable()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::HostState;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct MockShell {
        connect_attempts: AtomicUsize,
        connect_fails: bool,
        responses: Mutex<Vec<Result<String, ()>>>,
    }

    impl MockShell {
        fn with_responses(responses: Vec<Result<String, ()>>) -> Self {
            Self {
                connect_attempts: AtomicUsize::new(0),
                connect_fails: false,
                responses: Mutex::new(responses),
            }
        }

        fn refusing() -> Self {
            Self {
                connect_attempts: AtomicUsize::new(0),
                connect_fails: true,
                responses: Mutex::new(Vec::new()),
            }
        }
    }

    struct MockSession {
        responses: Vec<Result<String, ()>>,
        closed: bool,
    }

    #[async_trait]
    impl RemoteShell for MockShell {
        async fn session(
            &self,
            creds: &RemoteCredentials,
        ) -> Result<Box<dyn ShellSession>, ShellError> {
            self.connect_attempts.fetch_add(1, Ordering::SeqCst);
            if self.connect_fails {
                return Err(ShellError::Connect {
                    host: creds.host.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::ConnectionRefused,
                        "refused",
                    ),
                });
            }
            let responses = self.responses.lock().unwrap().clone();
            Ok(Box::new(MockSession {
                responses,
                closed: false,
            }))
        }
    }

    #[async_trait]
    impl ShellSession for MockSession {
        async fn exec(&mut self, _command: &str) -> Result<String, ShellError> {
            assert!(!self.closed, "exec after close");
            if self.responses.is_empty() {
                return Err(ShellError::Closed);
            }
            self.responses.remove(0).map_err(|_| {
                ShellError::Io(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "mock command failure",
                ))
            })
        }

        async fn close(&mut self) {
            self.closed = true;
        }
    }

    fn creds() -> Option<RemoteCredentials> {
        Some(RemoteCredentials {
            host: "10.0.0.9".to_string(),
            username: "pi".to_string(),
            password: "secret".to_string(),
        })
    }

    #[tokio::test]
    async fn missing_credentials_yield_config_error_without_connecting() {
        let shell = MockShell::with_responses(vec![]);
        let collector = RemoteCollector::new("nas", None, &shell, Duration::from_secs(5));

        let status = collector.collect().await;

        assert_eq!(status.state, HostState::ConfigError);
        assert!(status.uptime_seconds.is_none());
        assert_eq!(shell.connect_attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn refused_connection_yields_unreachable() {
        let shell = MockShell::refusing();
        let collector = RemoteCollector::new("nas", creds(), &shell, Duration::from_secs(5));

        let status = collector.collect().await;

        assert_eq!(status.state, HostState::Unreachable);
        assert!(status.uptime_seconds.is_none());
        assert_eq!(status.disks.total_free_bytes, 0);
        assert_eq!(shell.connect_attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn successful_poll_parses_uptime_and_disks() {
        let shell = MockShell::with_responses(vec![
            Ok("123456.78\n".to_string()),
            Ok("/ 1000\n/mnt/data 2000\n".to_string()),
        ]);
        let collector = RemoteCollector::new("nas", creds(), &shell, Duration::from_secs(5));

        let status = collector.collect().await;

        assert_eq!(status.state, HostState::Online);
        assert_eq!(status.uptime_seconds, Some(123456));
        assert_eq!(status.disks.total_free_bytes, 3000);
        assert_eq!(
            status.disks.system_disk.as_ref().map(|d| d.mount_point.as_str()),
            Some("/")
        );
        assert_eq!(status.disks.other_mounts.len(), 1);
    }

    #[tokio::test]
    async fn command_failure_mid_session_yields_unreachable() {
        let shell = MockShell::with_responses(vec![Ok("42.0\n".to_string()), Err(())]);
        let collector = RemoteCollector::new("nas", creds(), &shell, Duration::from_secs(5));

        let status = collector.collect().await;

        assert_eq!(status.state, HostState::Unreachable);
    }

    #[tokio::test]
    async fn unparseable_uptime_is_reported_as_absent() {
        let shell = MockShell::with_responses(vec![
            Ok("not-a-number\n".to_string()),
            Ok("/ 1000\n".to_string()),
        ]);
        let collector = RemoteCollector::new("nas", creds(), &shell, Duration::from_secs(5));

        let status = collector.collect().await;

        assert_eq!(status.state, HostState::Online);
        assert!(status.uptime_seconds.is_none());
        assert_eq!(status.disks.total_free_bytes, 1000);
    }
}
