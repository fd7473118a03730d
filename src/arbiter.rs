//! Keep-Request Arbiter (C7) — the five admin/user verbs from spec §4.7.
//! Each verb is a free function over a title's current tag set plus the
//! owning [`ManagerAdapter`], so it works identically for movies and series.
//! All writes go through the adapter, which is the only place cache
//! invalidation happens.

use crate::adapters::{ManagerAdapter, TitleRef};
use crate::errors::EngineError;
use crate::history::{EventType, HistoryEvent, HistoryStore};
use crate::tags::{self, Tag};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

const KEEP_WINDOW_DAYS: i64 = 90;

fn is_plain_delete_tag(label: &str) -> bool {
    matches!(Tag::parse(label), Some(Tag::Delete { .. } | Tag::DeleteDiskUsage { .. }))
}

fn has_resolving_tag(tags: &HashSet<String>) -> bool {
    tags.iter()
        .any(|l| matches!(Tag::parse(l), Some(Tag::MustKeep { .. } | Tag::MustDeleteForSure)))
}

fn open_keep_request(tags: &HashSet<String>) -> Option<Tag> {
    tags.iter().find_map(|l| match Tag::parse(l) {
        Some(t @ Tag::KeepRequest { .. }) => Some(t),
        _ => None,
    })
}

/// `submitKeepRequest(titleRef, requester)` — rejected if the title already
/// has an open `keep-request-*` (idempotent duplicate) or a
/// `must-delete-for-sure`.
pub async fn submit_keep_request(
    adapter: &dyn ManagerAdapter,
    history: &HistoryStore,
    reference: &TitleRef,
    current_tags: &HashSet<String>,
    requester: &str,
    now: DateTime<Utc>,
) -> anyhow::Result<()> {
    if open_keep_request(current_tags).is_some() || current_tags.contains(&Tag::MustDeleteForSure.encode()) {
        return Err(EngineError::AlreadyProcessed.into());
    }

    let expires_at = now + chrono::Duration::days(KEEP_WINDOW_DAYS);
    let tag = Tag::KeepRequest {
        date: expires_at.date_naive(),
        requester: Some(requester.to_string()),
    };
    let tag_id = adapter.ensure_tag(&tag.encode()).await?;
    adapter.add_tag(reference.manager_id, tag_id).await?;

    history.insert_keep_request(reference, requester, now, expires_at).await?;
    history
        .record(HistoryEvent::new(reference, EventType::KeepRequested, Some(requester)))
        .await?;
    Ok(())
}

/// `acceptKeepRequest(titleRef)` — recovers the original requester from the
/// existing `keep-request-*` tag, removes all `delete-*` and
/// `keep-request-*` tags, and adds a fresh 90-day `must-keep-*`.
pub async fn accept_keep_request(
    adapter: &dyn ManagerAdapter,
    history: &HistoryStore,
    reference: &TitleRef,
    current_tags: &HashSet<String>,
    now: DateTime<Utc>,
    actor: &str,
) -> anyhow::Result<()> {
    if has_resolving_tag(current_tags) {
        return Err(EngineError::AlreadyProcessed.into());
    }
    let requester = open_keep_request(current_tags).and_then(|t| t.requester().map(str::to_owned));

    adapter
        .remove_tags(reference.manager_id, &|l| {
            tags::is_delete_tag(l) || matches!(Tag::parse(l), Some(Tag::KeepRequest { .. }))
        })
        .await?;

    let must_keep = Tag::MustKeep {
        date: (now + chrono::Duration::days(KEEP_WINDOW_DAYS)).date_naive(),
        requester,
    };
    let tag_id = adapter.ensure_tag(&must_keep.encode()).await?;
    adapter.add_tag(reference.manager_id, tag_id).await?;

    history.resolve_keep_request(reference).await?;
    history
        .record(HistoryEvent::new(reference, EventType::KeepAccepted, Some(actor)))
        .await?;
    Ok(())
}

/// `declineKeepRequest(titleRef)` — same pre-check as accept, then
/// `addDeleteForSureTag`: preserves `delete-*` tags and removes every other
/// jellysweep tag before attaching `must-delete-for-sure`.
pub async fn decline_keep_request(
    adapter: &dyn ManagerAdapter,
    history: &HistoryStore,
    reference: &TitleRef,
    current_tags: &HashSet<String>,
    actor: &str,
) -> anyhow::Result<()> {
    if has_resolving_tag(current_tags) {
        return Err(EngineError::AlreadyProcessed.into());
    }

    adapter
        .remove_tags(reference.manager_id, &|l| tags::is_jellysweep_tag(l) && !is_plain_delete_tag(l))
        .await?;

    let tag_id = adapter.ensure_tag(&Tag::MustDeleteForSure.encode()).await?;
    adapter.add_tag(reference.manager_id, tag_id).await?;

    history.resolve_keep_request(reference).await?;
    history
        .record(HistoryEvent::new(reference, EventType::KeepDeclined, Some(actor)))
        .await?;
    Ok(())
}

/// `forceKeep(titleRef)` — strips every jellysweep tag (including delete
/// tags) and adds a fresh 90-day `must-keep-*`. No pre-check: an admin
/// override always wins.
pub async fn force_keep(
    adapter: &dyn ManagerAdapter,
    history: &HistoryStore,
    reference: &TitleRef,
    now: DateTime<Utc>,
    actor: &str,
) -> anyhow::Result<()> {
    adapter
        .remove_tags(reference.manager_id, &|l| tags::is_jellysweep_tag(l))
        .await?;

    let must_keep = Tag::MustKeep {
        date: (now + chrono::Duration::days(KEEP_WINDOW_DAYS)).date_naive(),
        requester: Some(actor.to_string()),
    };
    let tag_id = adapter.ensure_tag(&must_keep.encode()).await?;
    adapter.add_tag(reference.manager_id, tag_id).await?;

    history.resolve_keep_request(reference).await?;
    history
        .record(HistoryEvent::new(reference, EventType::ForceKept, Some(actor)))
        .await?;
    Ok(())
}

/// `ignoreForever(titleRef)` — strips every jellysweep tag and adds
/// `jellysweep-ignore`.
pub async fn ignore_forever(
    adapter: &dyn ManagerAdapter,
    history: &HistoryStore,
    reference: &TitleRef,
    actor: &str,
) -> anyhow::Result<()> {
    adapter
        .remove_tags(reference.manager_id, &|l| tags::is_jellysweep_tag(l))
        .await?;

    let tag_id = adapter.ensure_tag(&Tag::Ignore.encode()).await?;
    adapter.add_tag(reference.manager_id, tag_id).await?;

    history.resolve_keep_request(reference).await?;
    history
        .record(HistoryEvent::new(reference, EventType::Ignored, Some(actor)))
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ManagerKind;

    fn tagset(labels: &[&str]) -> HashSet<String> {
        labels.iter().map(|s| s.to_string()).collect()
    }

    fn reference() -> TitleRef {
        TitleRef {
            manager_kind: ManagerKind::Movie,
            manager_id: 1,
            streaming_server_id: "srv".into(),
            library: "Movies".into(),
            title: "Foo".into(),
            year: Some(2020),
            tmdb_id: None,
        }
    }

    #[test]
    fn test_submit_rejects_duplicate_open_request() {
        let tags = tagset(&["jellysweep-keep-request-2024-06-01-alice"]);
        assert!(open_keep_request(&tags).is_some());
    }

    #[test]
    fn test_accept_precheck_rejects_already_resolved() {
        let tags = tagset(&["jellysweep-must-keep-2024-06-01-alice"]);
        assert!(has_resolving_tag(&tags));
    }

    #[test]
    fn test_decline_preserves_plain_delete_tags() {
        assert!(is_plain_delete_tag("jellysweep-delete-2024-01-01"));
        assert!(is_plain_delete_tag("jellysweep-delete-du80-2024-01-01"));
        assert!(!is_plain_delete_tag("jellysweep-must-delete-for-sure"));
    }

    /// In-memory stand-in for a real manager client: tracks the tag set a
    /// title currently carries, same shape `SonarrClient`/`RadarrClient`
    /// present through `ManagerAdapter`.
    struct FakeAdapter {
        tags: tokio::sync::Mutex<HashSet<String>>,
    }

    impl FakeAdapter {
        fn with_tags(labels: &[&str]) -> Self {
            Self {
                tags: tokio::sync::Mutex::new(tagset(labels)),
            }
        }

        async fn snapshot(&self) -> HashSet<String> {
            self.tags.lock().await.clone()
        }
    }

    #[async_trait::async_trait]
    impl ManagerAdapter for FakeAdapter {
        fn kind(&self) -> ManagerKind {
            ManagerKind::Tv
        }
        async fn list_titles(&self, _force_refresh: bool) -> anyhow::Result<Vec<crate::adapters::Title>> {
            Ok(vec![])
        }
        async fn list_tags(&self, _force_refresh: bool) -> anyhow::Result<std::collections::HashMap<u64, String>> {
            Ok(std::collections::HashMap::new())
        }
        async fn ensure_tag(&self, label: &str) -> anyhow::Result<u64> {
            self.tags.lock().await.insert(label.to_string());
            Ok(1)
        }
        async fn add_tag(&self, _manager_id: u64, _tag_id: u64) -> anyhow::Result<()> {
            Ok(())
        }
        async fn remove_tags(
            &self,
            _manager_id: u64,
            predicate: &(dyn Fn(&str) -> bool + Send + Sync),
        ) -> anyhow::Result<()> {
            self.tags.lock().await.retain(|l| !predicate(l));
            Ok(())
        }
        async fn delete_title(&self, _manager_id: u64, _delete_files: bool) -> anyhow::Result<()> {
            Ok(())
        }
        async fn get_item_added_date(&self, _manager_id: u64) -> anyhow::Result<Option<DateTime<Utc>>> {
            Ok(None)
        }
    }

    fn tv_reference() -> TitleRef {
        TitleRef {
            manager_kind: ManagerKind::Tv,
            manager_id: 7,
            streaming_server_id: "srv-7".into(),
            library: "TV Shows".into(),
            title: "Some Show".into(),
            year: Some(2020),
            tmdb_id: None,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> chrono::NaiveDate {
        chrono::NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_submit_keep_request_against_real_adapter_fake() {
        use std::sync::Arc;

        let adapter: Arc<dyn ManagerAdapter> = Arc::new(FakeAdapter::with_tags(&[]));
        let history = HistoryStore::connect(":memory:").await.unwrap();
        let reference = reference();

        submit_keep_request(adapter.as_ref(), &history, &reference, &HashSet::new(), "alice", Utc::now())
            .await
            .unwrap();

        let recent = history.list_recent(10, Some(EventType::KeepRequested)).await.unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].actor.as_deref(), Some("alice"));
    }

    /// spec §8 S3: a pending keep-request, once accepted, becomes a fresh
    /// 90-day must-keep and the original delete/keep-request tags are gone.
    #[tokio::test]
    async fn test_s3_keep_request_accepted() -> anyhow::Result<()> {
        let fake = FakeAdapter::with_tags(&[
            "jellysweep-delete-2024-03-01",
            "jellysweep-keep-request-2024-02-01-alice",
        ]);
        let history = HistoryStore::connect(":memory:").await?;
        let reference = tv_reference();
        let now = date(2024, 1, 15).and_hms_opt(0, 0, 0).unwrap().and_utc();

        let tags_before = fake.snapshot().await;
        accept_keep_request(&fake, &history, &reference, &tags_before, now, "admin").await?;

        let final_tags = fake.snapshot().await;
        assert_eq!(
            final_tags,
            HashSet::from(["jellysweep-must-keep-2024-04-14-alice".to_string()])
        );

        let recorded = history.list_recent(10, Some(EventType::KeepAccepted)).await?;
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].actor.as_deref(), Some("admin"));
        Ok(())
    }

    /// spec §8 S4: declining preserves the original `delete-*` tag and adds
    /// `must-delete-for-sure` rather than clearing the delete date.
    #[tokio::test]
    async fn test_s4_keep_request_declined_preserves_delete_date() -> anyhow::Result<()> {
        let fake = FakeAdapter::with_tags(&[
            "jellysweep-delete-2024-03-01",
            "jellysweep-keep-request-2024-02-01-alice",
        ]);
        let history = HistoryStore::connect(":memory:").await?;
        let reference = tv_reference();

        let tags_before = fake.snapshot().await;
        decline_keep_request(&fake, &history, &reference, &tags_before, "admin").await?;

        let final_tags = fake.snapshot().await;
        assert!(final_tags.contains("jellysweep-delete-2024-03-01"));
        assert!(final_tags.contains("jellysweep-must-delete-for-sure"));
        assert!(!final_tags.contains("jellysweep-keep-request-2024-02-01-alice"));

        let recorded = history.list_recent(10, Some(EventType::KeepDeclined)).await?;
        assert_eq!(recorded.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_accept_rejects_when_already_resolved() -> anyhow::Result<()> {
        let fake = FakeAdapter::with_tags(&["jellysweep-must-keep-2024-06-01-alice"]);
        let history = HistoryStore::connect(":memory:").await?;
        let reference = tv_reference();
        let tags = fake.snapshot().await;

        let result = accept_keep_request(&fake, &history, &reference, &tags, Utc::now(), "admin").await;
        assert!(result.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_force_keep_strips_everything_and_keeps() -> anyhow::Result<()> {
        let fake = FakeAdapter::with_tags(&["jellysweep-delete-2024-03-01", "jellysweep-ignore"]);
        let history = HistoryStore::connect(":memory:").await?;
        let reference = tv_reference();

        force_keep(&fake, &history, &reference, Utc::now(), "admin").await?;

        let final_tags = fake.snapshot().await;
        assert_eq!(final_tags.len(), 1);
        assert!(final_tags.iter().next().unwrap().starts_with("jellysweep-must-keep-"));
        Ok(())
    }

    #[tokio::test]
    async fn test_ignore_forever_strips_and_adds_ignore_tag() -> anyhow::Result<()> {
        let fake = FakeAdapter::with_tags(&["jellysweep-delete-2024-03-01"]);
        let history = HistoryStore::connect(":memory:").await?;
        let reference = tv_reference();

        ignore_forever(&fake, &history, &reference, "admin").await?;

        let final_tags = fake.snapshot().await;
        assert_eq!(final_tags, HashSet::from(["jellysweep-ignore".to_string()]));

        let recorded = history.list_recent(10, Some(EventType::Ignored)).await?;
        assert_eq!(recorded.len(), 1);
        Ok(())
    }
}
