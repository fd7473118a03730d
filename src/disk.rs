//! Disk-Pressure Evaluator (C5) — reads current disk usage per library root
//! and picks the most restrictive applicable threshold (§4.5).

use crate::config::DiskUsageThreshold;
use std::path::Path;
use sysinfo::Disks;

pub struct DiskPressureEvaluator {
    disks: Disks,
}

impl DiskPressureEvaluator {
    pub fn new() -> Self {
        Self {
            disks: Disks::new_with_refreshed_list(),
        }
    }

    pub fn refresh(&mut self) {
        self.disks.refresh(true);
    }

    /// Max used-percent across the given library root paths. Finds, for each
    /// root, the disk whose mount point is the longest matching prefix.
    pub fn usage_percent(&self, roots: &[impl AsRef<Path>]) -> Option<f64> {
        roots
            .iter()
            .filter_map(|root| self.usage_percent_for_root(root.as_ref()))
            .fold(None, |max, pct| Some(max.map_or(pct, |m: f64| m.max(pct))))
    }

    fn usage_percent_for_root(&self, root: &Path) -> Option<f64> {
        let mut best: Option<(&Path, f64)> = None;
        for disk in self.disks.list() {
            let mount = disk.mount_point();
            if root.starts_with(mount) {
                let total = disk.total_space();
                if total == 0 {
                    continue;
                }
                let used = total.saturating_sub(disk.available_space());
                let pct = used as f64 / total as f64 * 100.0;
                let is_better = best.map(|(m, _)| mount.as_os_str().len() > m.as_os_str().len());
                if is_better.unwrap_or(true) {
                    best = Some((mount, pct));
                }
            }
        }
        best.map(|(_, pct)| pct)
    }
}

impl Default for DiskPressureEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

/// Picks the "most restrictive applicable" threshold: the smallest
/// `max_cleanup_delay` among thresholds whose `usage_percent <= usage_pct`
/// (§4.5). `None` if no threshold applies.
pub fn applicable_threshold(
    usage_pct: f64,
    thresholds: &[DiskUsageThreshold],
) -> Option<&DiskUsageThreshold> {
    thresholds
        .iter()
        .filter(|t| t.usage_percent <= usage_pct)
        .min_by_key(|t| t.max_cleanup_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn threshold(usage_percent: f64, max_cleanup_delay: Duration) -> DiskUsageThreshold {
        DiskUsageThreshold {
            usage_percent,
            max_cleanup_delay,
        }
    }

    #[test]
    fn test_no_threshold_applies() {
        let thresholds = vec![threshold(80.0, Duration::from_secs(3 * 86400))];
        assert!(applicable_threshold(70.0, &thresholds).is_none());
    }

    #[test]
    fn test_picks_smallest_delay_among_applicable() {
        let thresholds = vec![
            threshold(80.0, Duration::from_secs(14 * 86400)),
            threshold(90.0, Duration::from_secs(7 * 86400)),
        ];
        let picked = applicable_threshold(92.0, &thresholds).unwrap();
        assert_eq!(picked.usage_percent, 90.0);
    }

    #[test]
    fn test_only_lower_threshold_applies() {
        let thresholds = vec![
            threshold(80.0, Duration::from_secs(14 * 86400)),
            threshold(90.0, Duration::from_secs(7 * 86400)),
        ];
        let picked = applicable_threshold(85.0, &thresholds).unwrap();
        assert_eq!(picked.usage_percent, 80.0);
    }

    #[test]
    fn test_exact_boundary_is_applicable() {
        let thresholds = vec![threshold(80.0, Duration::from_secs(3 * 86400))];
        assert!(applicable_threshold(80.0, &thresholds).is_some());
    }
}
