use crate::collectors::{DiskInventory, DiskMount};

/// Parses the output of the free-space listing into a disk inventory.
///
/// Each line is expected to hold exactly a mount path and a free-byte count.
/// Malformed lines are dropped; the function never fails. The mount at `/`
/// becomes the system disk. When no `/` line exists but at least one mount
/// was parsed, the first mount is promoted to system disk instead.
pub fn parse_disk_output(raw: &str) -> DiskInventory {
    let mut total_free_bytes = 0_u64;
    let mut system_disk: Option<DiskMount> = None;
    let mut other_mounts: Vec<DiskMount> = Vec::new();

    for line in raw.lines() {
        let mut parts = line.split_whitespace();
        let (Some(mount_point), Some(bytes_token), None) =
            (parts.next(), parts.next(), parts.next())
        else {
            continue;
        };
        let Ok(free_bytes) = bytes_token.parse::<u64>() else {
            continue;
        };

        total_free_bytes += free_bytes;

        let mount = DiskMount {
            mount_point: mount_point.to_string(),
            free_bytes,
        };
        if mount.mount_point == "/" {
            system_disk = Some(mount);
        } else {
            other_mounts.push(mount);
        }
    }

    if system_disk.is_none() && !other_mounts.is_empty() {
        system_disk = Some(other_mounts.remove(0));
    }

    DiskInventory {
        total_free_bytes,
        system_disk,
        other_mounts,
    }
}
