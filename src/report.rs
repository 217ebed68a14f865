use crate::collectors::{HostState, HostStatus};
use crate::config::ServerConfig;
use chrono::NaiveDateTime;
use std::fmt::Write;

/// First line of every status message. The state machine also uses it to
/// rediscover the live message after a restart, so it must stay stable.
pub const STATUS_BANNER: &str = "📡 **Server status**";

const TIB: i64 = 1 << 40;
const GIB: i64 = 1 << 30;
const MIB: i64 = 1 << 20;

/// Renders the full status message. Pure formatting; server blocks appear
/// in the order of `results`, which the scheduler keeps equal to the
/// configuration order.
pub fn render(results: &[(ServerConfig, HostStatus)], now: NaiveDateTime) -> String {
    let mut out = String::new();
    out.push_str(STATUS_BANNER);
    out.push_str("\n\n");
    let _ = writeln!(out, "Last update: `{}`\n", now.format("%Y-%m-%d %H:%M:%S"));

    for (server, status) in results {
        let _ = writeln!(out, "**Server {}**", server.name);
        let _ = writeln!(out, "Status: {}", status_label(status.state));
        match status.uptime_seconds {
            Some(seconds) => {
                let _ = writeln!(out, "Uptime: `{}`", format_uptime(seconds));
            }
            None => out.push_str("Uptime: `N/A`\n"),
        }
        let _ = writeln!(
            out,
            "Total free space: {}",
            format_disk_space(status.disks.total_free_bytes as i64)
        );
        match &status.disks.system_disk {
            Some(mount) => {
                let _ = writeln!(
                    out,
                    "- System disk `{}`: {}",
                    mount.mount_point,
                    format_disk_space(mount.free_bytes as i64)
                );
            }
            None => out.push_str("- System disk: N/A\n"),
        }
        for mount in &status.disks.other_mounts {
            let _ = writeln!(
                out,
                "- Mounted disk `{}`: {}",
                mount.mount_point,
                format_disk_space(mount.free_bytes as i64)
            );
        }
        out.push('\n');
    }

    out.trim_end().to_string()
}

fn status_label(state: HostState) -> &'static str {
    match state {
        HostState::Online => "🟢 Online",
        HostState::Unreachable => "🔴 Offline",
        HostState::ConfigError => "🟡 Configuration error",
    }
}

/// `DDd HHh MMm`, fields zero-padded to two digits, days unbounded.
pub fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    format!("{days:02}d {hours:02}h {minutes:02}m")
}

/// `X TB, Y GB, Z MB` with whole binary units. Once a larger unit is shown
/// the smaller remainders are always shown too, and at least `0 MB` is
/// emitted for sub-megabyte values. Negative input renders as `N/A`.
pub fn format_disk_space(bytes: i64) -> String {
    if bytes < 0 {
        return "N/A".to_string();
    }

    let mut remaining = bytes;
    let mut parts: Vec<String> = Vec::new();

    let tb = remaining / TIB;
    if tb > 0 {
        parts.push(format!("{tb} TB"));
        remaining %= TIB;
    }

    let gb = remaining / GIB;
    if gb > 0 || !parts.is_empty() {
        parts.push(format!("{gb} GB"));
        remaining %= GIB;
    }

    let mb = remaining / MIB;
    if mb > 0 || parts.is_empty() {
        parts.push(format!("{mb} MB"));
    }

    parts.join(", ")
}
