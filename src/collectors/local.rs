use crate::collectors::{disk, DiskInventory, HostCollector, HostStatus, DF_COMMAND};
use async_trait::async_trait;
use sysinfo::{System, SystemExt};
use tokio::process::Command;
use tracing::warn;

/// Collector for the host the daemon itself runs on. The host is online by
/// definition; only the disk telemetry is allowed to degrade.
pub struct LocalCollector;

#[async_trait]
impl HostCollector for LocalCollector {
    async fn collect(&self) -> HostStatus {
        let uptime_seconds = System::new().uptime();

        let disks = match run_free_space_command().await {
            Ok(output) => disk::parse_disk_output(&output),
            Err(err) => {
                warn!(error = %err, "local free-space command failed");
                DiskInventory::default()
            }
        };

        HostStatus::online(Some(uptime_seconds), disks)
    }
}

async fn run_free_space_command() -> Result<String, std::io::Error> {
    let output = Command::new("sh").arg("-c").arg(DF_COMMAND).output().await?;
    if !output.status.success() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("df exited with {}", output.status),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
