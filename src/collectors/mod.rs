pub mod disk;
pub mod local;
pub mod remote;

use crate::config::{Config, RemoteCredentials, ServerConfig};
use crate::ssh::RemoteShell;
use async_trait::async_trait;
use std::time::Duration;

/// Free-space listing, one `<mountPoint> <freeBytes>` line per local mount.
/// Reproduced bit-for-bit: the disk parser is written against this output.
pub const DF_COMMAND: &str = "df -B1 --local | awk 'NR>1 {print $6, $4}'";

/// Uptime in (fractional) seconds.
pub const UPTIME_COMMAND: &str = "cat /proc/uptime | awk '{print $1}'";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostState {
    Online,
    ConfigError,
    Unreachable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiskMount {
    pub mount_point: String,
    pub free_bytes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiskInventory {
    pub total_free_bytes: u64,
    pub system_disk: Option<DiskMount>,
    pub other_mounts: Vec<DiskMount>,
}

/// Result of polling one host. Built once per server per cycle, never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct HostStatus {
    pub state: HostState,
    pub uptime_seconds: Option<u64>,
    pub disks: DiskInventory,
}

impl HostStatus {
    pub fn online(uptime_seconds: Option<u64>, disks: DiskInventory) -> Self {
        Self {
            state: HostState::Online,
            uptime_seconds,
            disks,
        }
    }

    pub fn config_error() -> Self {
        Self {
            state: HostState::ConfigError,
            uptime_seconds: None,
            disks: DiskInventory::default(),
        }
    }

    pub fn unreachable() -> Self {
        Self {
            state: HostState::Unreachable,
            uptime_seconds: None,
            disks: DiskInventory::default(),
        }
    }
}

#[async_trait]
pub trait HostCollector {
    /// Never fails; any problem is folded into `HostStatus::state`.
    async fn collect(&self) -> HostStatus;
}

/// Polls every configured server, one at a time, in configuration order.
pub async fn collect_fleet<S>(cfg: &Config, shell: &S) -> Vec<(ServerConfig, HostStatus)>
where
    S: RemoteShell + ?Sized,
{
    let timeout = Duration::from_secs(cfg.remote_timeout_secs);
    let mut results = Vec::with_capacity(cfg.servers.len());
    for server in &cfg.servers {
        let status = if server.local {
            local::LocalCollector.collect().await
        } else {
            let creds = server
                .env_prefix
                .as_deref()
                .and_then(RemoteCredentials::from_env);
            remote::RemoteCollector::new(&server.name, creds, shell, timeout)
                .collect()
                .await
        };
        results.push((server.clone(), status));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiscordConfig;
    use crate::report;
    use crate::ssh::{ShellError, ShellSession};
    use chrono::NaiveDate;

    struct RefusingShell;

    #[async_trait]
    impl RemoteShell for RefusingShell {
        async fn session(
            &self,
            creds: &RemoteCredentials,
        ) -> Result<Box<dyn ShellSession>, ShellError> {
            Err(ShellError::Connect {
                host: creds.host.clone(),
                source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
            })
        }
    }

    fn fleet_config() -> Config {
        Config {
            interval_secs: 300,
            remote_timeout_secs: 2,
            discord: DiscordConfig {
                bot_token_env: "DISCORD_BOT_TOKEN".to_string(),
                bot_token: None,
                channel_id: "chan".to_string(),
            },
            servers: vec![
                ServerConfig {
                    name: "nas".to_string(),
                    local: false,
                    env_prefix: Some("FLEETTEST_NAS".to_string()),
                },
                ServerConfig {
                    name: "backup".to_string(),
                    local: false,
                    env_prefix: Some("FLEETTEST_MISSING".to_string()),
                },
            ],
        }
    }

    #[tokio::test]
    async fn degraded_hosts_still_produce_a_full_report() {
        std::env::set_var("FLEETTEST_NAS_SSH_HOST", "10.0.0.9");
        std::env::set_var("FLEETTEST_NAS_SSH_USER", "pi");
        std::env::set_var("FLEETTEST_NAS_SSH_PASS", "secret");
        std::env::remove_var("FLEETTEST_MISSING_SSH_HOST");

        let cfg = fleet_config();
        let results = collect_fleet(&cfg, &RefusingShell).await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].1.state, HostState::Unreachable);
        assert_eq!(results[1].1.state, HostState::ConfigError);

        let now = NaiveDate::from_ymd_opt(2026, 8, 24)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let text = report::render(&results, now);

        let nas = text.find("**Server nas**").unwrap();
        let backup = text.find("**Server backup**").unwrap();
        assert!(nas < backup);
        assert!(text.contains("Status: 🔴 Offline"));
        assert!(text.contains("Status: 🟡 Configuration error"));
    }
}
