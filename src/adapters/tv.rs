//! Sonarr-backed [`ManagerAdapter`] / [`TvManagerAdapter`] (C3).

use super::{ManagerAdapter, ManagerKind, Title, TitleLocks, TitleRef, TitleStats, TvManagerAdapter};
use crate::cache::PrefixedCache;
use crate::http::{Episode, SeriesInfo, SonarrClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const NAMESPACE: &str = "tv";

pub struct TvAdapter {
    client: SonarrClient,
    cache: PrefixedCache,
    locks: TitleLocks,
}

impl TvAdapter {
    pub fn new(client: SonarrClient, cache: PrefixedCache) -> Self {
        Self {
            client,
            cache,
            locks: TitleLocks::new(),
        }
    }

    fn to_title(series: &SeriesInfo, tags: &HashMap<u64, String>) -> Title {
        let episode_file_count = series.seasons.iter().map(|s| s.statistics.episode_file_count).sum();
        let total_episode_count = series.seasons.iter().map(|s| s.statistics.total_episode_count).sum();
        Title {
            reference: TitleRef {
                manager_kind: ManagerKind::Tv,
                manager_id: series.id,
                streaming_server_id: String::new(),
                library: String::new(),
                title: series.title.clone(),
                year: series.year,
                tmdb_id: series.tvdb_id.map(|id| id.to_string()),
            },
            tags: series
                .tags
                .iter()
                .filter_map(|id| tags.get(id).cloned())
                .collect(),
            statistics: Some(TitleStats {
                size_on_disk: series.statistics.size_on_disk,
                episode_file_count: Some(episode_file_count),
                total_episode_count: Some(total_episode_count),
            }),
        }
    }
}

#[async_trait]
impl ManagerAdapter for TvAdapter {
    fn kind(&self) -> ManagerKind {
        ManagerKind::Tv
    }

    async fn list_titles(&self, force_refresh: bool) -> anyhow::Result<Vec<Title>> {
        if force_refresh {
            self.cache.clear(NAMESPACE).await;
        } else if let Some(cached) = self.cache.get::<Vec<Title>>(NAMESPACE, "items").await {
            return Ok(cached);
        }

        let series = self.client.series().await?;
        let tags = self.list_tags(force_refresh).await?;
        let titles: Vec<Title> = series.iter().map(|s| Self::to_title(s, &tags)).collect();
        self.cache
            .set(NAMESPACE, "items", titles.clone(), None)
            .await;
        Ok(titles)
    }

    async fn list_tags(&self, force_refresh: bool) -> anyhow::Result<HashMap<u64, String>> {
        if force_refresh {
            self.cache.clear(NAMESPACE).await;
        } else if let Some(cached) = self.cache.get::<HashMap<u64, String>>(NAMESPACE, "tags").await {
            return Ok(cached);
        }

        let tags = self.client.tags().await?;
        let map: HashMap<u64, String> = tags.into_iter().map(|t| (t.id, t.label)).collect();
        self.cache.set(NAMESPACE, "tags", map.clone(), None).await;
        Ok(map)
    }

    async fn ensure_tag(&self, label: &str) -> anyhow::Result<u64> {
        let id = self.client.ensure_tag(label).await?;
        self.cache.clear(NAMESPACE).await;
        Ok(id)
    }

    async fn add_tag(&self, manager_id: u64, tag_id: u64) -> anyhow::Result<()> {
        let lock = self.locks.lock_for(manager_id).await;
        let _guard = lock.lock().await;

        let mut series = self.client.series_by_id(manager_id).await?;
        if series.tags.contains(&tag_id) {
            return Ok(());
        }
        series.tags.push(tag_id);
        self.client.update_series(&series).await?;
        self.cache.clear(NAMESPACE).await;
        Ok(())
    }

    async fn remove_tags(
        &self,
        manager_id: u64,
        predicate: &(dyn Fn(&str) -> bool + Send + Sync),
    ) -> anyhow::Result<()> {
        let lock = self.locks.lock_for(manager_id).await;
        let _guard = lock.lock().await;

        let mut series = self.client.series_by_id(manager_id).await?;
        let tags_map = self.list_tags(false).await?;
        let before = series.tags.len();
        series.tags.retain(|id| {
            tags_map
                .get(id)
                .map(|label| !predicate(label))
                .unwrap_or(true)
        });
        if series.tags.len() != before {
            self.client.update_series(&series).await?;
            self.cache.clear(NAMESPACE).await;
        }
        Ok(())
    }

    async fn delete_title(&self, manager_id: u64, delete_files: bool) -> anyhow::Result<()> {
        let lock = self.locks.lock_for(manager_id).await;
        let _guard = lock.lock().await;

        self.client.delete_series(manager_id, delete_files).await?;
        self.cache.clear(NAMESPACE).await;
        Ok(())
    }

    async fn get_item_added_date(&self, manager_id: u64) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.client.item_added_date(manager_id).await?)
    }
}

#[async_trait]
impl TvManagerAdapter for TvAdapter {
    async fn delete_episode_files(&self, file_ids: &[u64]) -> anyhow::Result<()> {
        for file_id in file_ids {
            self.client.delete_episode_file(*file_id).await?;
        }
        self.cache.clear(NAMESPACE).await;
        Ok(())
    }

    async fn unmonitor_episodes(&self, episode_ids: &[u64]) -> anyhow::Result<()> {
        self.client.unmonitor_episodes(episode_ids).await?;
        Ok(())
    }

    async fn get_statistics_size(&self, manager_id: u64) -> anyhow::Result<Option<u64>> {
        let series = self.client.series_by_id(manager_id).await?;
        Ok(Some(series.statistics.size_on_disk))
    }

    async fn episodes(&self, manager_id: u64) -> anyhow::Result<Vec<Episode>> {
        Ok(self.client.episodes_by_series_id(manager_id).await?)
    }
}
