//! Radarr-backed [`ManagerAdapter`] (C3).

use super::{ManagerAdapter, ManagerKind, Title, TitleLocks, TitleRef, TitleStats};
use crate::cache::PrefixedCache;
use crate::http::{Movie, RadarrClient};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

const NAMESPACE: &str = "movie";

pub struct MovieAdapter {
    client: RadarrClient,
    cache: PrefixedCache,
    locks: TitleLocks,
}

impl MovieAdapter {
    pub fn new(client: RadarrClient, cache: PrefixedCache) -> Self {
        Self {
            client,
            cache,
            locks: TitleLocks::new(),
        }
    }

    fn to_title(movie: &Movie, tags: &HashMap<u64, String>) -> Title {
        Title {
            reference: TitleRef {
                manager_kind: ManagerKind::Movie,
                manager_id: movie.id,
                streaming_server_id: String::new(),
                library: String::new(),
                title: movie.title.clone(),
                year: movie.year,
                tmdb_id: movie.tmdb_id.map(|id| id.to_string()),
            },
            tags: movie
                .tags
                .iter()
                .filter_map(|id| tags.get(id).cloned())
                .collect(),
            statistics: Some(TitleStats {
                size_on_disk: movie.size_on_disk,
                episode_file_count: None,
                total_episode_count: None,
            }),
        }
    }
}

#[async_trait]
impl ManagerAdapter for MovieAdapter {
    fn kind(&self) -> ManagerKind {
        ManagerKind::Movie
    }

    async fn list_titles(&self, force_refresh: bool) -> anyhow::Result<Vec<Title>> {
        if force_refresh {
            self.cache.clear(NAMESPACE).await;
        } else if let Some(cached) = self.cache.get::<Vec<Title>>(NAMESPACE, "items").await {
            return Ok(cached);
        }

        let movies = self.client.movies().await?;
        let tags = self.list_tags(force_refresh).await?;
        let titles: Vec<Title> = movies.iter().map(|m| Self::to_title(m, &tags)).collect();
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

        let mut movie = self.client.movie_by_id(manager_id).await?;
        if movie.tags.contains(&tag_id) {
            return Ok(()); // idempotent
        }
        movie.tags.push(tag_id);
        self.client.update_movie(&movie).await?;
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

        let mut movie = self.client.movie_by_id(manager_id).await?;
        let tags_map = self.list_tags(false).await?;
        let before = movie.tags.len();
        movie.tags.retain(|id| {
            tags_map
                .get(id)
                .map(|label| !predicate(label))
                .unwrap_or(true)
        });
        if movie.tags.len() != before {
            self.client.update_movie(&movie).await?;
            self.cache.clear(NAMESPACE).await;
        }
        Ok(())
    }

    async fn delete_title(&self, manager_id: u64, delete_files: bool) -> anyhow::Result<()> {
        let lock = self.locks.lock_for(manager_id).await;
        let _guard = lock.lock().await;

        self.client.delete_movie(manager_id, delete_files).await?;
        self.cache.clear(NAMESPACE).await;
        Ok(())
    }

    async fn get_item_added_date(&self, manager_id: u64) -> anyhow::Result<Option<DateTime<Utc>>> {
        Ok(self.client.item_added_date(manager_id).await?)
    }
}
