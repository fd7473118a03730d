//! TV manager (Sonarr) HTTP client. Every mutating method respects
//! `dry_run`: it logs what it would have done and returns without sending
//! the request (§4.3 dry-run mode).

use super::{with_retries, ResponseExt};
use crate::errors::EngineError;
use chrono::{DateTime, Utc};
use log::info;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::Deserialize;
use serde_json::json;

const SERVICE: &str = "sonarr";

pub struct SonarrClient {
    client: Client,
    base_url: Url,
    default_headers: HeaderMap,
    dry_run: bool,
}

impl SonarrClient {
    pub fn new(base_url: &str, api_key: &str, dry_run: bool) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        base_url.set_path("/api/v3/");

        let mut default_headers = HeaderMap::new();
        let mut header_value = HeaderValue::from_str(api_key)?;
        header_value.set_sensitive(true);
        default_headers.insert("x-api-key", header_value);

        Ok(Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()?,
            base_url,
            default_headers,
            dry_run,
        })
    }

    /// https://sonarr.tv/docs/api/#/Series/get_api_v3_series
    pub async fn series(&self) -> Result<Vec<SeriesInfo>, EngineError> {
        let url = self.base_url.join("series").map_err(fatal)?;
        self.get_json(url).await
    }

    pub async fn series_by_id(&self, series_id: u64) -> Result<SeriesInfo, EngineError> {
        let url = self
            .base_url
            .join(&format!("series/{series_id}"))
            .map_err(fatal)?;
        self.get_json(url).await
    }

    /// https://sonarr.tv/docs/api/#/Episode/get_api_v3_episode
    pub async fn episodes_by_series_id(&self, series_id: u64) -> Result<Vec<Episode>, EngineError> {
        let url = self.base_url.join("episode").map_err(fatal)?;
        with_retries(2, || async {
            self.client
                .get(url.clone())
                .headers(self.default_headers.clone())
                .query(&[("seriesId", series_id)])
                .send()
                .await
                .map_err(transient)?
                .handle_error(SERVICE)
                .await?
                .json()
                .await
                .map_err(fatal)
        })
        .await
    }

    /// Pages through the series import history and returns the earliest
    /// "downloadFolderImported" timestamp (§4.3 getItemAddedDate).
    pub async fn item_added_date(&self, series_id: u64) -> Result<Option<DateTime<Utc>>, EngineError> {
        let url = self.base_url.join("history/series").map_err(fatal)?;
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut page = 1;
        loop {
            let records: Vec<HistoryRecord> = with_retries(2, || async {
                self.client
                    .get(url.clone())
                    .headers(self.default_headers.clone())
                    .query(&[("seriesId", series_id), ("pageSize", 100), ("page", page)])
                    .send()
                    .await
                    .map_err(transient)?
                    .handle_error(SERVICE)
                    .await?
                    .json()
                    .await
                    .map_err(fatal)
            })
            .await?;

            if records.is_empty() {
                break;
            }
            for record in &records {
                if record.event_type == "downloadFolderImported" {
                    earliest = Some(match earliest {
                        Some(e) if e < record.date => e,
                        _ => record.date,
                    });
                }
            }
            page += 1;
        }
        Ok(earliest)
    }

    /// https://sonarr.tv/docs/api/#/Series/delete_api_v3_series__id_
    pub async fn delete_series(&self, series_id: u64, delete_files: bool) -> Result<(), EngineError> {
        if self.dry_run {
            info!("[dry-run] would delete series {series_id} (deleteFiles={delete_files})");
            return Ok(());
        }
        let url = self
            .base_url
            .join(&format!("series/{series_id}"))
            .map_err(fatal)?;
        match with_retries(2, || async {
            self.client
                .delete(url.clone())
                .headers(self.default_headers.clone())
                .query(&[("deleteFiles", delete_files.to_string())])
                .send()
                .await
                .map_err(transient)?
                .handle_error(SERVICE)
                .await
        })
        .await
        {
            Ok(_) => Ok(()),
            Err(EngineError::NotFound { .. }) => Ok(()), // already gone
            Err(e) => Err(e),
        }
    }

    /// https://sonarr.tv/docs/api/#/EpisodeFile/delete_api_v3_episodefile__id_
    pub async fn delete_episode_file(&self, episode_file_id: u64) -> Result<(), EngineError> {
        if self.dry_run {
            info!("[dry-run] would delete episode file {episode_file_id}");
            return Ok(());
        }
        let url = self
            .base_url
            .join(&format!("episodefile/{episode_file_id}"))
            .map_err(fatal)?;
        match with_retries(2, || async {
            self.client
                .delete(url.clone())
                .headers(self.default_headers.clone())
                .send()
                .await
                .map_err(transient)?
                .handle_error(SERVICE)
                .await
        })
        .await
        {
            Ok(_) => Ok(()),
            Err(EngineError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// https://sonarr.tv/docs/api/#/Episode/put_api_v3_episode_monitor
    pub async fn unmonitor_episodes(&self, episode_ids: &[u64]) -> Result<(), EngineError> {
        if episode_ids.is_empty() {
            return Ok(());
        }
        if self.dry_run {
            info!("[dry-run] would unmonitor episodes {episode_ids:?}");
            return Ok(());
        }
        let url = self.base_url.join("episode/monitor").map_err(fatal)?;
        with_retries(2, || async {
            self.client
                .put(url.clone())
                .headers(self.default_headers.clone())
                .json(&json!({ "episodeIds": episode_ids, "monitored": false }))
                .send()
                .await
                .map_err(transient)?
                .handle_error(SERVICE)
                .await
        })
        .await?;
        Ok(())
    }

    /// Update a series resource (used to strip tags after partial deletion).
    pub async fn update_series(&self, series: &SeriesInfo) -> Result<(), EngineError> {
        if self.dry_run {
            info!("[dry-run] would update series {} tags={:?}", series.id, series.tags);
            return Ok(());
        }
        let url = self
            .base_url
            .join(&format!("series/{}", series.id))
            .map_err(fatal)?;
        with_retries(2, || async {
            self.client
                .put(url.clone())
                .headers(self.default_headers.clone())
                .json(series)
                .send()
                .await
                .map_err(transient)?
                .handle_error(SERVICE)
                .await
        })
        .await?;
        Ok(())
    }

    /// https://sonarr.tv/docs/api/#/Tag/get_api_v3_tag
    pub async fn tags(&self) -> Result<Vec<Tag>, EngineError> {
        let url = self.base_url.join("tag").map_err(fatal)?;
        self.get_json(url).await
    }

    /// At-most-once tag creation (§4.3 ensureTag).
    pub async fn ensure_tag(&self, label: &str) -> Result<u64, EngineError> {
        let existing = self.tags().await?;
        if let Some(tag) = existing.iter().find(|t| t.label == label) {
            return Ok(tag.id);
        }
        if self.dry_run {
            info!("[dry-run] would create tag {label:?}");
            return Ok(0);
        }
        let url = self.base_url.join("tag").map_err(fatal)?;
        let created: Tag = with_retries(2, || async {
            self.client
                .post(url.clone())
                .headers(self.default_headers.clone())
                .json(&json!({ "label": label }))
                .send()
                .await
                .map_err(transient)?
                .handle_error(SERVICE)
                .await?
                .json()
                .await
                .map_err(fatal)
        })
        .await?;
        Ok(created.id)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: Url) -> Result<T, EngineError> {
        with_retries(2, || async {
            self.client
                .get(url.clone())
                .headers(self.default_headers.clone())
                .send()
                .await
                .map_err(transient)?
                .handle_error(SERVICE)
                .await?
                .json()
                .await
                .map_err(fatal)
        })
        .await
    }
}

fn fatal(e: impl Into<anyhow::Error>) -> EngineError {
    EngineError::Fatal(e.into())
}

fn transient(e: reqwest::Error) -> EngineError {
    EngineError::TransientExternal {
        service: SERVICE,
        source: e.into(),
    }
}

#[derive(Deserialize, serde::Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Default))]
pub struct SeriesInfo {
    pub id: u64,
    pub title: String,
    pub year: Option<i32>,
    pub tags: Vec<u64>,
    pub statistics: SeriesStatistics,
    pub seasons: Vec<Season>,
    #[serde(default)]
    pub tvdb_id: Option<u64>,
}

#[derive(Deserialize, serde::Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SeriesStatistics {
    pub size_on_disk: u64,
}

#[derive(Deserialize, serde::Serialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Season {
    pub season_number: u32,
    pub monitored: bool,
    pub statistics: SeasonStatistics,
}

#[derive(Deserialize, serde::Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct SeasonStatistics {
    pub next_airing: Option<String>,
    pub episode_file_count: u32,
    pub total_episode_count: u32,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    pub id: u64,
    pub series_id: u64,
    pub season_number: u32,
    pub episode_number: u32,
    pub episode_file_id: Option<u64>,
    pub monitored: bool,
    pub air_date_utc: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HistoryRecord {
    date: DateTime<Utc>,
    event_type: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub label: String,
    pub id: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_contain_api_key() {
        let client = SonarrClient::new("http://localhost:8989", "abc-key", false).unwrap();
        assert_eq!(client.default_headers.get("x-api-key").unwrap(), "abc-key");
    }

    #[test]
    fn test_base_url_gets_api_path() {
        let client = SonarrClient::new("http://localhost:8989", "k", false).unwrap();
        assert_eq!(client.base_url.as_str(), "http://localhost:8989/api/v3/");
    }
}
