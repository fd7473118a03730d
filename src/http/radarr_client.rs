//! Movie manager (Radarr) HTTP client. Mirrors [`super::SonarrClient`]'s
//! shape — same auth header, same dry-run gate, same error handling — since
//! Radarr and Sonarr are close siblings of the same *arr API family.

use super::{with_retries, ResponseExt};
use crate::errors::EngineError;
use chrono::{DateTime, Utc};
use log::info;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Client, ClientBuilder, Url};
use serde::Deserialize;
use serde_json::json;

const SERVICE: &str = "radarr";

pub struct RadarrClient {
    client: Client,
    base_url: Url,
    default_headers: HeaderMap,
    dry_run: bool,
}

impl RadarrClient {
    /// https://radarr.video/docs/api/
    pub fn new(base_url: &str, api_key: &str, dry_run: bool) -> anyhow::Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        base_url.set_path("/api/v3/");

        let default_headers = auth_headers(api_key)?;
        let client = ClientBuilder::new()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            default_headers,
            dry_run,
        })
    }

    /// https://radarr.video/docs/api/#/Movie/get_api_v3_movie
    pub async fn movies(&self) -> Result<Vec<Movie>, EngineError> {
        let url = self.base_url.join("movie").map_err(fatal)?;
        self.get_json(url).await
    }

    pub async fn movie_by_id(&self, movie_id: u64) -> Result<Movie, EngineError> {
        let url = self
            .base_url
            .join(&format!("movie/{movie_id}"))
            .map_err(fatal)?;
        self.get_json(url).await
    }

    /// Pages through history looking for the earliest "movieFileImported"
    /// event (§4.3 getItemAddedDate).
    pub async fn item_added_date(&self, movie_id: u64) -> Result<Option<DateTime<Utc>>, EngineError> {
        let url = self.base_url.join("history/movie").map_err(fatal)?;
        let mut earliest: Option<DateTime<Utc>> = None;
        let mut page = 1;
        loop {
            let records: Vec<HistoryRecord> = with_retries(2, || async {
                self.client
                    .get(url.clone())
                    .headers(self.default_headers.clone())
                    .query(&[("movieId", movie_id), ("pageSize", 100), ("page", page)])
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
                if record.event_type == "movieFileImported" {
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

    /// https://radarr.video/docs/api/#/Movie/delete_api_v3_movie__id_
    pub async fn delete_movie(&self, movie_id: u64, delete_files: bool) -> Result<(), EngineError> {
        if self.dry_run {
            info!("[dry-run] would delete movie {movie_id} (deleteFiles={delete_files})");
            return Ok(());
        }
        let url = self
            .base_url
            .join(&format!("movie/{movie_id}"))
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
            Err(EngineError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Update a movie resource (used to add/remove tags).
    pub async fn update_movie(&self, movie: &Movie) -> Result<(), EngineError> {
        if self.dry_run {
            info!("[dry-run] would update movie {} tags={:?}", movie.id, movie.tags);
            return Ok(());
        }
        let url = self
            .base_url
            .join(&format!("movie/{}", movie.id))
            .map_err(fatal)?;
        with_retries(2, || async {
            self.client
                .put(url.clone())
                .headers(self.default_headers.clone())
                .json(movie)
                .send()
                .await
                .map_err(transient)?
                .handle_error(SERVICE)
                .await
        })
        .await?;
        Ok(())
    }

    /// https://radarr.video/docs/api/#/Tag/get_api_v3_tag
    pub async fn tags(&self) -> Result<Vec<Tag>, EngineError> {
        let url = self.base_url.join("tag").map_err(fatal)?;
        self.get_json(url).await
    }

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

fn auth_headers(api_key: &str) -> anyhow::Result<HeaderMap> {
    let mut default_headers = HeaderMap::new();
    let mut header_value = HeaderValue::from_str(api_key)?;
    header_value.set_sensitive(true);
    default_headers.insert("x-api-key", header_value);
    Ok(default_headers)
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

#[derive(Deserialize, serde::Serialize, Clone, Debug, Default)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: u64,
    pub title: String,
    pub year: Option<i32>,
    pub has_file: bool,
    pub tags: Vec<u64>,
    pub size_on_disk: u64,
    #[serde(default)]
    pub tmdb_id: Option<u64>,
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
    #[test]
    fn test_auth_headers() {
        let headers = super::auth_headers("abc-key").unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("x-api-key").unwrap(), "abc-key");
    }
}
