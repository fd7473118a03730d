//! Pipeline Orchestrator (C6) — the scheduled, idempotent control loop.
//! Stages run in the order spec'd: fetch, merge, ignore-filter, mark,
//! reconcile-expired-keep, reconcile-recent-playback, notify, delete.

use super::deletion::{plan_deletion, CleanupMode, DeletionPlan};
use crate::adapters::{ManagerAdapter, Title, TvManagerAdapter};
use crate::config::LibraryConfig;
use crate::disk::{applicable_threshold, DiskPressureEvaluator};
use crate::history::{EventType, HistoryEvent, HistoryStore};
use crate::http::{ItemsFilter, JellyfinClient, PlaybackLookup, PlaybackStatsAdapter};
use crate::tags::{self, generate_deletion_tags, Tag};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use futures::stream::{self, StreamExt};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Seam for stage 7 ("notify, delegated"). The shipped implementation just
/// logs — email/push delivery is explicitly out of scope (spec §1).
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, pending: &[(Title, NaiveDate)]) -> anyhow::Result<()>;
}

pub struct LoggingNotifier;

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn notify(&self, pending: &[(Title, NaiveDate)]) -> anyhow::Result<()> {
        for (title, date) in pending {
            info!(
                "pending deletion: {} ({:?}) scheduled for {date}",
                title.reference.title, title.reference.year
            );
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct PipelineReport {
    pub fetched: usize,
    pub merged: usize,
    pub ignored: usize,
    pub marked: usize,
    pub expired_keep_tags_reconciled: usize,
    pub rescued_by_playback: usize,
    pub notified: usize,
    pub deleted: usize,
}

pub struct Pipeline {
    jellyfin: JellyfinClient,
    playback: Arc<dyn PlaybackStatsAdapter>,
    tv: Arc<dyn TvManagerAdapter>,
    movie: Arc<dyn ManagerAdapter>,
    history: HistoryStore,
    notifier: Arc<dyn Notifier>,
    libraries: Vec<LibraryConfig>,
    cleanup_mode: CleanupMode,
    keep_count: u32,
    adapter_concurrency: usize,
    dry_run: bool,
}

impl Pipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jellyfin: JellyfinClient,
        playback: Arc<dyn PlaybackStatsAdapter>,
        tv: Arc<dyn TvManagerAdapter>,
        movie: Arc<dyn ManagerAdapter>,
        history: HistoryStore,
        notifier: Arc<dyn Notifier>,
        libraries: Vec<LibraryConfig>,
        cleanup_mode: CleanupMode,
        keep_count: u32,
        adapter_concurrency: usize,
        dry_run: bool,
    ) -> Self {
        Self {
            jellyfin,
            playback,
            tv,
            movie,
            history,
            notifier,
            libraries,
            cleanup_mode,
            keep_count,
            adapter_concurrency,
            dry_run,
        }
    }

    pub async fn run(&self, cancel: &CancellationToken) -> anyhow::Result<PipelineReport> {
        let mut report = PipelineReport::default();
        let now = Utc::now();

        if cancel.is_cancelled() {
            return Ok(report);
        }

        // 1. Fetch + 2. Merge
        let mut titles = self.fetch_and_merge(&mut report).await?;
        if cancel.is_cancelled() {
            return Ok(report);
        }

        // 3. Ignore filter
        let mut ignored = 0usize;
        titles.retain(|merged| {
            let t = &merged.title;
            let keep = !t.tags.contains(&Tag::Ignore.encode())
                && self
                    .library_for(&t.reference.library)
                    .map(|lib| !lib.exclude_tags.iter().any(|ex| t.tags.contains(ex)))
                    .unwrap_or(true);
            if !keep {
                ignored += 1;
            }
            keep
        });
        report.ignored += ignored;
        if cancel.is_cancelled() {
            return Ok(report);
        }

        let mut disk = DiskPressureEvaluator::new();
        disk.refresh();

        // 4. Mark
        self.mark_stage(&titles, now, &mut report, cancel).await?;
        // 5. Reconcile expired keep tags
        self.reconcile_expired_keep_tags(&titles, now, &mut report, cancel)
            .await?;
        // 6. Reconcile recent playback
        self.reconcile_recent_playback(&titles, now, &mut report, cancel)
            .await?;
        if cancel.is_cancelled() {
            return Ok(report);
        }

        // Re-fetch tag state after stages 4-6 mutated it before computing
        // notify/delete eligibility.
        let titles = self.fetch_and_merge(&mut PipelineReport::default()).await?;

        // 7. Notify
        let pending = self.collect_pending(&titles, &disk, now);
        report.notified = pending.len();
        self.notifier.notify(&pending).await?;
        if cancel.is_cancelled() {
            return Ok(report);
        }

        // 8. Delete
        self.delete_stage(&titles, &disk, now, &mut report, cancel)
            .await?;

        Ok(report)
    }

    fn library_for(&self, name: &str) -> Option<&LibraryConfig> {
        self.libraries.iter().find(|l| l.name == name && l.enabled)
    }

    async fn fetch_and_merge(&self, report: &mut PipelineReport) -> anyhow::Result<Vec<MergedTitle>> {
        let jellyfin_libraries = self.jellyfin.libraries().await?;
        let library_name_by_id: HashMap<String, String> = jellyfin_libraries
            .into_iter()
            .map(|l| (l.item_id, l.name))
            .collect();

        let items = self.jellyfin.items(ItemsFilter::titles()).await?;
        report.fetched += items.len();

        let mut by_key: HashMap<(String, Option<i32>), crate::http::Item> = HashMap::new();
        for item in items {
            let key = (item.name.to_lowercase(), item.production_year);
            by_key.insert(key, item);
        }

        let adapters: Vec<Arc<dyn ManagerAdapter>> =
            vec![self.movie.clone(), self.tv.clone() as Arc<dyn ManagerAdapter>];

        let mut merged = Vec::new();
        for adapter in &adapters {
            let titles = adapter.list_titles(false).await?;
            for mut title in titles {
                let key = (title.reference.title.to_lowercase(), title.reference.year);
                let Some(item) = by_key.get(&key) else {
                    warn!(
                        "title {:?} not found in streaming server, dropping",
                        title.reference.title
                    );
                    continue;
                };
                let Some(library) = item
                    .parent_id
                    .as_ref()
                    .and_then(|pid| library_name_by_id.get(pid))
                else {
                    warn!(
                        "title {:?} has no resolvable library, dropping",
                        title.reference.title
                    );
                    continue;
                };
                title.reference.streaming_server_id = item.id.clone();
                title.reference.library = library.clone();
                merged.push(MergedTitle { title });
            }
        }
        report.merged += merged.len();
        Ok(merged)
    }

    fn collect_pending(
        &self,
        titles: &[MergedTitle],
        disk: &DiskPressureEvaluator,
        now: DateTime<Utc>,
    ) -> Vec<(Title, NaiveDate)> {
        let mut pending = Vec::new();
        for merged in titles {
            let title = &merged.title;
            let Some(library) = self.library_for(&title.reference.library) else {
                continue;
            };
            let usage_pct = disk.usage_percent(&library.roots);
            let date = effective_deletion_date(&title.tags, library, usage_pct, now);
            if let Some(date) = date {
                pending.push((title.clone(), date));
            }
        }
        pending
    }

    async fn mark_stage(
        &self,
        titles: &[MergedTitle],
        now: DateTime<Utc>,
        report: &mut PipelineReport,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let concurrency = self.adapter_concurrency.max(1);
        let results: Vec<anyhow::Result<bool>> = stream::iter(titles.iter())
            .map(|merged| self.mark_one(merged, now, cancel))
            .buffer_unordered(concurrency)
            .collect()
            .await;
        for r in results {
            match r {
                Ok(true) => report.marked += 1,
                Ok(false) => {}
                Err(e) => warn!("mark stage failed for a title: {e:#}"),
            }
        }
        Ok(())
    }

    async fn mark_one(
        &self,
        merged: &MergedTitle,
        now: DateTime<Utc>,
        cancel: &CancellationToken,
    ) -> anyhow::Result<bool> {
        if cancel.is_cancelled() {
            return Ok(false);
        }
        let title = &merged.title;
        let Some(library) = self.library_for(&title.reference.library) else {
            return Ok(false);
        };

        let adapter = self.adapter_for(&title.reference);
        let item_added = adapter
            .get_item_added_date(title.reference.manager_id)
            .await?
            .unwrap_or(now);
        let last_played = self
            .playback
            .last_played(&title.reference.streaming_server_id)
            .await;
        let last_activity = match last_played {
            Ok(PlaybackLookup::At(t)) => t,
            Ok(PlaybackLookup::Never) => item_added,
            Err(_) => item_added, // unknown: fall back to item-added-date per §4.4/§4.6 step 4
        };

        let content_age = now.signed_duration_since(item_added);
        let last_activity_age = now.signed_duration_since(last_activity);
        let content_age_threshold = chrono::Duration::from_std(library.content_age_threshold)?;
        let last_stream_threshold = chrono::Duration::from_std(library.last_stream_threshold)?;

        if content_age <= content_age_threshold || last_activity_age <= last_stream_threshold {
            return Ok(false);
        }

        let cleanup_delay = chrono::Duration::from_std(library.cleanup_delay)?;
        let disk_thresholds: Vec<(u32, chrono::Duration)> = library
            .disk_usage_thresholds
            .iter()
            .map(|t| {
                Ok::<_, anyhow::Error>((
                    t.usage_percent.round() as u32,
                    chrono::Duration::from_std(t.max_cleanup_delay)?,
                ))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let wanted = generate_deletion_tags(now, cleanup_delay, &disk_thresholds);
        let mut added_any = false;
        for tag in wanted {
            let encoded = tag.encode();
            if title.tags.contains(&encoded) {
                continue; // idempotent: never re-add
            }
            let tag_id = adapter.ensure_tag(&encoded).await?;
            adapter.add_tag(title.reference.manager_id, tag_id).await?;
            added_any = true;
        }
        if added_any {
            self.history
                .record(HistoryEvent::new(&title.reference, EventType::Marked, None))
                .await?;
        }
        Ok(added_any)
    }

    async fn reconcile_expired_keep_tags(
        &self,
        titles: &[MergedTitle],
        now: DateTime<Utc>,
        report: &mut PipelineReport,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let today = now.date_naive();
        let concurrency = self.adapter_concurrency.max(1);
        let results: Vec<anyhow::Result<bool>> = stream::iter(titles.iter())
            .map(|merged| async move {
                if cancel.is_cancelled() {
                    return Ok(false);
                }
                let title = &merged.title;
                let expired: Vec<String> = title
                    .tags
                    .iter()
                    .filter(|label| {
                        matches!(
                            Tag::parse(label),
                            Some(Tag::KeepRequest { .. } | Tag::MustKeep { .. })
                        )
                    })
                    .filter(|label| Tag::parse(label).and_then(|t| t.date()).is_some_and(|d| d < today))
                    .cloned()
                    .collect();
                if expired.is_empty() {
                    return Ok(false);
                }
                let adapter = self.adapter_for(&title.reference);
                adapter
                    .remove_tags(title.reference.manager_id, &|label| expired.iter().any(|e| e == label))
                    .await?;
                Ok(true)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        for r in results {
            if r.unwrap_or(false) {
                report.expired_keep_tags_reconciled += 1;
            }
        }
        Ok(())
    }

    async fn reconcile_recent_playback(
        &self,
        titles: &[MergedTitle],
        now: DateTime<Utc>,
        report: &mut PipelineReport,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let concurrency = self.adapter_concurrency.max(1);
        let results: Vec<anyhow::Result<bool>> = stream::iter(titles.iter())
            .map(|merged| async move {
                if cancel.is_cancelled() {
                    return Ok(false);
                }
                let title = &merged.title;
                let has_delete_tag = title.tags.iter().any(|t| tags::is_delete_tag(t));
                if !has_delete_tag {
                    return Ok(false);
                }
                let Some(library) = self.library_for(&title.reference.library) else {
                    return Ok(false);
                };
                let last_played = self
                    .playback
                    .last_played(&title.reference.streaming_server_id)
                    .await;
                let PlaybackLookup::At(played_at) = (match last_played {
                    Ok(lookup) => lookup,
                    Err(_) => return Ok(false),
                }) else {
                    return Ok(false);
                };
                let last_stream_threshold = chrono::Duration::from_std(library.last_stream_threshold)?;
                if now.signed_duration_since(played_at) > last_stream_threshold {
                    return Ok(false);
                }
                let adapter = self.adapter_for(&title.reference);
                adapter
                    .remove_tags(title.reference.manager_id, &|label| {
                        tags::is_delete_tag(label) || tags::is_jellysweep_non_delete_tag(label)
                            && matches!(Tag::parse(label), Some(Tag::KeepRequest { .. }))
                    })
                    .await?;
                Ok(true)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        for r in results {
            if r.unwrap_or(false) {
                report.rescued_by_playback += 1;
            }
        }
        Ok(())
    }

    async fn delete_stage(
        &self,
        titles: &[MergedTitle],
        disk: &DiskPressureEvaluator,
        now: DateTime<Utc>,
        report: &mut PipelineReport,
        cancel: &CancellationToken,
    ) -> anyhow::Result<()> {
        let concurrency = self.adapter_concurrency.max(1);
        let results: Vec<anyhow::Result<bool>> = stream::iter(titles.iter())
            .map(|merged| async move {
                if cancel.is_cancelled() {
                    return Ok(false);
                }
                let title = &merged.title;
                let Some(library) = self.library_for(&title.reference.library) else {
                    return Ok(false);
                };
                let usage_pct = disk.usage_percent(&library.roots);
                if !should_trigger_deletion(&title.tags, usage_pct, now.date_naive()) {
                    return Ok(false);
                }

                match title.reference.manager_kind {
                    crate::adapters::ManagerKind::Movie => {
                        self.movie
                            .delete_title(title.reference.manager_id, true)
                            .await?;
                    }
                    crate::adapters::ManagerKind::Tv => {
                        self.delete_tv_title(title, now).await?;
                    }
                }
                self.history
                    .record(HistoryEvent::new(&title.reference, EventType::Deleted, None))
                    .await?;
                Ok(true)
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;
        for r in results {
            match r {
                Ok(true) => report.deleted += 1,
                Ok(false) => {}
                Err(e) => warn!("delete stage failed for a title: {e:#}"),
            }
        }
        Ok(())
    }

    async fn delete_tv_title(&self, title: &Title, now: DateTime<Utc>) -> anyhow::Result<()> {
        let episodes = self.tv.episodes(title.reference.manager_id).await?;
        let plan = plan_deletion(&episodes, self.cleanup_mode, self.keep_count, now);
        self.apply_plan(title, &plan).await
    }

    async fn apply_plan(&self, title: &Title, plan: &DeletionPlan) -> anyhow::Result<()> {
        if plan.delete_entire_series {
            self.tv.delete_title(title.reference.manager_id, true).await?;
            return Ok(());
        }
        if !plan.delete_episode_file_ids.is_empty() {
            self.tv.delete_episode_files(&plan.delete_episode_file_ids).await?;
        }
        if !plan.unmonitor_episode_ids.is_empty() {
            match self.tv.unmonitor_episodes(&plan.unmonitor_episode_ids).await {
                Ok(()) => {
                    self.history
                        .record(HistoryEvent::new(&title.reference, EventType::Unmonitored, None))
                        .await?;
                }
                Err(e) => warn!("unmonitor failed for series {}: {e:#}", title.reference.manager_id),
            }
        }
        // §4.6.2: strip processed tags after a partial deletion so the next
        // pass doesn't re-process this series. Full-series deletion skips
        // this since the series is gone.
        self.tv
            .remove_tags(title.reference.manager_id, &|label| {
                tags::is_delete_tag(label) || matches!(Tag::parse(label), Some(Tag::KeepRequest { .. }))
            })
            .await?;
        Ok(())
    }

    fn adapter_for(&self, reference: &crate::adapters::TitleRef) -> Arc<dyn ManagerAdapter> {
        match reference.manager_kind {
            crate::adapters::ManagerKind::Tv => self.tv.clone() as Arc<dyn ManagerAdapter>,
            crate::adapters::ManagerKind::Movie => self.movie.clone(),
        }
    }
}

struct MergedTitle {
    title: Title,
}

/// §4.6.1 should-delete predicate.
pub fn should_trigger_deletion(
    tag_labels: &std::collections::HashSet<String>,
    current_usage_pct: Option<f64>,
    today: NaiveDate,
) -> bool {
    let tags: Vec<Tag> = tag_labels.iter().filter_map(|l| Tag::parse(l)).collect();

    if tags.iter().any(|t| matches!(t, Tag::MustKeep { date, .. } if *date >= today)) {
        return false;
    }
    if tags.contains(&Tag::MustDeleteForSure) {
        return true;
    }
    for tag in &tags {
        match tag {
            Tag::DeleteDiskUsage { pct, date } if *date <= today => {
                if let Some(usage) = current_usage_pct {
                    if usage >= *pct as f64 {
                        return true;
                    }
                }
            }
            Tag::Delete { date } if *date <= today => return true,
            _ => {}
        }
    }
    false
}

/// Effective deletion date reported to the UI (§4.6.1): the earliest date
/// implied by the eligible tags under current disk pressure, or a
/// recomputed default horizon if none apply yet.
pub fn effective_deletion_date(
    tag_labels: &std::collections::HashSet<String>,
    library: &LibraryConfig,
    current_usage_pct: Option<f64>,
    now: DateTime<Utc>,
) -> Option<NaiveDate> {
    let tags: Vec<Tag> = tag_labels.iter().filter_map(|l| Tag::parse(l)).collect();
    if tags.iter().any(|t| matches!(t, Tag::MustKeep { .. })) {
        return None;
    }

    let mut candidates = Vec::new();
    if tags.contains(&Tag::MustDeleteForSure) {
        let mut delays: Vec<std::time::Duration> =
            library.disk_usage_thresholds.iter().map(|t| t.max_cleanup_delay).collect();
        delays.push(library.cleanup_delay);
        let smallest = delays.into_iter().min()?;
        candidates.push((now + chrono::Duration::from_std(smallest).ok()?).date_naive());
    }
    for tag in &tags {
        match tag {
            Tag::Delete { date } => candidates.push(*date),
            Tag::DeleteDiskUsage { pct, date } => {
                if current_usage_pct.is_some_and(|u| u >= *pct as f64) {
                    candidates.push(*date);
                }
            }
            _ => {}
        }
    }

    if let Some(min) = candidates.into_iter().min() {
        return Some(min);
    }

    // No tag yet: earliest horizon under current pressure.
    let usage_pct = current_usage_pct.unwrap_or(0.0);
    let delay = applicable_threshold(usage_pct, &library.disk_usage_thresholds)
        .map(|t| t.max_cleanup_delay)
        .unwrap_or(library.cleanup_delay);
    Some((now + chrono::Duration::from_std(delay).ok()?).date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn tagset(labels: &[&str]) -> HashSet<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_should_trigger_deletion_plain_past_date() {
        let tags = tagset(&["jellysweep-delete-2024-01-01"]);
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(should_trigger_deletion(&tags, None, today));
    }

    #[test]
    fn test_should_trigger_deletion_future_date_not_eligible() {
        let tags = tagset(&["jellysweep-delete-2024-06-01"]);
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(!should_trigger_deletion(&tags, None, today));
    }

    #[test]
    fn test_must_delete_for_sure_always_eligible() {
        let tags = tagset(&["jellysweep-must-delete-for-sure"]);
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(should_trigger_deletion(&tags, None, today));
    }

    #[test]
    fn test_must_keep_future_blocks_deletion() {
        let tags = tagset(&[
            "jellysweep-delete-2024-01-01",
            "jellysweep-must-keep-2024-06-01",
        ]);
        let today = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert!(!should_trigger_deletion(&tags, None, today));
    }

    #[test]
    fn test_disk_usage_tag_only_eligible_when_usage_high_enough() {
        let tags = tagset(&["jellysweep-delete-du90-2024-01-08"]);
        let today = NaiveDate::from_ymd_opt(2024, 1, 9).unwrap();
        assert!(should_trigger_deletion(&tags, Some(92.0), today));
        assert!(!should_trigger_deletion(&tags, Some(70.0), today));
    }

    fn library(content_age_days: u64, last_stream_days: u64, cleanup_delay_days: u64) -> LibraryConfig {
        LibraryConfig {
            name: "Movies".into(),
            enabled: true,
            content_age_threshold: std::time::Duration::from_secs(content_age_days * 86_400),
            last_stream_threshold: std::time::Duration::from_secs(last_stream_days * 86_400),
            cleanup_delay: std::time::Duration::from_secs(cleanup_delay_days * 86_400),
            exclude_tags: Vec::new(),
            disk_usage_thresholds: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(0, 0, 0).unwrap().and_utc()
    }

    /// spec §8 S2, continued: `effective_deletion_date` resolves to the
    /// gated tag's own date once usage crosses its percentage, and falls
    /// back to the configured horizon otherwise.
    #[test]
    fn test_s2_effective_deletion_date_tracks_gated_tag() {
        let lib = LibraryConfig {
            disk_usage_thresholds: vec![
                crate::config::DiskUsageThreshold {
                    usage_percent: 80.0,
                    max_cleanup_delay: std::time::Duration::from_secs(14 * 86_400),
                },
                crate::config::DiskUsageThreshold {
                    usage_percent: 90.0,
                    max_cleanup_delay: std::time::Duration::from_secs(7 * 86_400),
                },
            ],
            ..library(120, 30, 30)
        };
        let tags = tagset(&["jellysweep-delete-du90-2024-01-08"]);
        let now = utc(2024, 1, 1);

        let under_pressure = effective_deletion_date(&tags, &lib, Some(92.0), now);
        assert_eq!(under_pressure, Some(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()));

        // Below the gating percentage the du90 tag never fires and there's no
        // plain delete tag either, so the date falls back to the horizon for
        // the (low) current pressure rather than the gated tag's date.
        let no_pressure = effective_deletion_date(&tags, &lib, Some(10.0), now);
        assert_ne!(no_pressure, Some(NaiveDate::from_ymd_opt(2024, 1, 8).unwrap()));
    }

    /// spec §8 S5: a title last streamed within `last_stream_threshold` must
    /// be treated as recently played, the condition `reconcile_recent_playback`
    /// checks before stripping a delete tag.
    #[test]
    fn test_s5_recently_played_rescue_condition() {
        let last_stream_threshold = chrono::Duration::days(30);
        let last_played = utc(2024, 1, 20);
        let run_at = utc(2024, 1, 25);

        let within_threshold = run_at.signed_duration_since(last_played) <= last_stream_threshold;
        assert!(within_threshold, "a play 5 days ago must count as recent under a 30-day threshold");
    }

    /// Invariant 2: the orchestrator's ignore-filter stage removes
    /// `jellysweep-ignore`-tagged titles before `should_trigger_deletion` ever
    /// runs (§4.2) — the tag itself carries no date for the predicate to
    /// reason about, so enforcement lives upstream, not in the predicate.
    #[test]
    fn test_invariant_ignore_tag_has_no_date_for_predicate_to_reason_about() {
        assert_eq!(Tag::parse("jellysweep-ignore"), Some(Tag::Ignore));
        assert!(!matches!(Tag::parse("jellysweep-ignore"), Some(Tag::Delete { .. })));
    }
}
