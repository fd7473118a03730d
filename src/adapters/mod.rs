//! Manager Adapters (C3) — the capability set every pipeline stage and the
//! arbiter program against. Consumers depend only on this trait, never on
//! `SonarrClient`/`RadarrClient` directly (spec §9 "polymorphism over
//! adapters").

mod movie;
mod tv;

pub use movie::MovieAdapter;
pub use tv::TvAdapter;

use crate::http::Episode;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManagerKind {
    Tv,
    Movie,
}

impl ManagerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ManagerKind::Tv => "tv",
            ManagerKind::Movie => "movie",
        }
    }
}

#[derive(Debug, Clone)]
pub struct TitleRef {
    pub manager_kind: ManagerKind,
    pub manager_id: u64,
    pub streaming_server_id: String,
    pub library: String,
    pub title: String,
    pub year: Option<i32>,
    pub tmdb_id: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct TitleStats {
    pub size_on_disk: u64,
    pub episode_file_count: Option<u32>,
    pub total_episode_count: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct Title {
    pub reference: TitleRef,
    pub tags: std::collections::HashSet<String>,
    pub statistics: Option<TitleStats>,
}

/// The capability set every manager adapter exposes (spec §4.3 / §9).
#[async_trait]
pub trait ManagerAdapter: Send + Sync {
    fn kind(&self) -> ManagerKind;
    async fn list_titles(&self, force_refresh: bool) -> anyhow::Result<Vec<Title>>;
    async fn list_tags(&self, force_refresh: bool) -> anyhow::Result<HashMap<u64, String>>;
    async fn ensure_tag(&self, label: &str) -> anyhow::Result<u64>;
    async fn add_tag(&self, manager_id: u64, tag_id: u64) -> anyhow::Result<()>;
    async fn remove_tags(
        &self,
        manager_id: u64,
        predicate: &(dyn Fn(&str) -> bool + Send + Sync),
    ) -> anyhow::Result<()>;
    async fn delete_title(&self, manager_id: u64, delete_files: bool) -> anyhow::Result<()>;
    async fn get_item_added_date(&self, manager_id: u64) -> anyhow::Result<Option<DateTime<Utc>>>;
}

/// Extra capabilities the TV adapter exposes for partial deletion (§4.6.2).
#[async_trait]
pub trait TvManagerAdapter: ManagerAdapter {
    async fn delete_episode_files(&self, file_ids: &[u64]) -> anyhow::Result<()>;
    async fn unmonitor_episodes(&self, episode_ids: &[u64]) -> anyhow::Result<()>;
    async fn get_statistics_size(&self, manager_id: u64) -> anyhow::Result<Option<u64>>;
    async fn episodes(&self, manager_id: u64) -> anyhow::Result<Vec<Episode>>;
}

/// Per-manager-id serialization (spec §5 "serialized on the adapter's
/// per-title mutex"). Shared by both adapters via composition rather than
/// inheritance, since Rust traits can't carry shared fields.
pub(crate) struct TitleLocks {
    locks: tokio::sync::Mutex<HashMap<u64, std::sync::Arc<tokio::sync::Mutex<()>>>>,
}

impl TitleLocks {
    pub(crate) fn new() -> Self {
        Self {
            locks: tokio::sync::Mutex::new(HashMap::new()),
        }
    }

    pub(crate) async fn lock_for(&self, manager_id: u64) -> std::sync::Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks
            .entry(manager_id)
            .or_insert_with(|| std::sync::Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }
}
