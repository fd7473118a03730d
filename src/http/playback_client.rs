//! Playback Stats Adapter (C4) — "when was title X last played?" against
//! whichever of Jellystat or Streamystats the operator runs. The two
//! back-ends are strictly interchangeable from the pipeline's point of view,
//! so they're unified behind one trait rather than an enum the caller has to
//! match on.

use crate::errors::EngineError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Client, ClientBuilder, Url};
use serde::Deserialize;

use super::{with_retries, ResponseExt};

const SERVICE: &str = "playback-stats";

/// Which back-end is configured (§6 `playback_stats.backend`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackBackend {
    Jellystat,
    Streamystats,
}

/// Outcome of a last-played lookup. `Never` means the backend affirmatively
/// reports no playback; a lookup that can't resolve the item at all is an
/// `Err(EngineError::NotFound)`, which callers treat as "unknown, skip" —
/// never as evidence of staleness (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackLookup {
    Never,
    At(DateTime<Utc>),
}

#[async_trait]
pub trait PlaybackStatsAdapter: Send + Sync {
    async fn last_played(&self, streaming_server_id: &str) -> Result<PlaybackLookup, EngineError>;
}

pub struct PlaybackStatsClient {
    client: Client,
    base_url: Url,
    backend: PlaybackBackend,
    server_id: String,
}

impl PlaybackStatsClient {
    pub fn new(
        base_url: &str,
        api_key: &str,
        backend: PlaybackBackend,
        server_id: &str,
    ) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url)?;
        let mut default_headers = reqwest::header::HeaderMap::new();
        let mut header_value = reqwest::header::HeaderValue::from_str(api_key)?;
        header_value.set_sensitive(true);
        default_headers.insert("x-api-key", header_value);

        let client = ClientBuilder::new()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url,
            backend,
            server_id: server_id.to_owned(),
        })
    }

    async fn last_played_jellystat(&self, item_id: &str) -> Result<PlaybackLookup, EngineError> {
        let url = self
            .base_url
            .join("stats/getItemHistory")
            .map_err(|e| EngineError::Fatal(e.into()))?;
        let entries: Vec<JellystatHistoryEntry> = with_retries(2, || async {
            self.client
                .post(url.clone())
                .json(&JellystatHistoryRequest { itemid: item_id })
                .send()
                .await
                .map_err(|e| EngineError::TransientExternal {
                    service: SERVICE,
                    source: e.into(),
                })?
                .handle_error(SERVICE)
                .await?
                .json()
                .await
                .map_err(|e| EngineError::Fatal(e.into()))
        })
        .await?;

        let latest = entries.iter().map(|e| e.activity_date_inserted).max();
        Ok(match latest {
            Some(ts) => PlaybackLookup::At(ts),
            None => PlaybackLookup::Never,
        })
    }

    async fn last_played_streamystats(&self, item_id: &str) -> Result<PlaybackLookup, EngineError> {
        let url = self
            .base_url
            .join(&format!("api/get-item-details/{item_id}"))
            .map_err(|e| EngineError::Fatal(e.into()))?;
        let details: StreamystatsItemDetails = with_retries(2, || async {
            self.client
                .get(url.clone())
                .query(&[("serverId", self.server_id.as_str())])
                .send()
                .await
                .map_err(|e| EngineError::TransientExternal {
                    service: SERVICE,
                    source: e.into(),
                })?
                .handle_error(SERVICE)
                .await?
                .json()
                .await
                .map_err(|e| EngineError::Fatal(e.into()))
        })
        .await?;

        Ok(match details.last_watched {
            Some(ts) => PlaybackLookup::At(ts),
            None => PlaybackLookup::Never,
        })
    }
}

#[async_trait]
impl PlaybackStatsAdapter for PlaybackStatsClient {
    async fn last_played(&self, streaming_server_id: &str) -> Result<PlaybackLookup, EngineError> {
        match self.backend {
            PlaybackBackend::Jellystat => self.last_played_jellystat(streaming_server_id).await,
            PlaybackBackend::Streamystats => {
                self.last_played_streamystats(streaming_server_id).await
            }
        }
    }
}

#[derive(serde::Serialize)]
struct JellystatHistoryRequest<'a> {
    itemid: &'a str,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct JellystatHistoryEntry {
    #[allow(dead_code)]
    user_name: String,
    activity_date_inserted: DateTime<Utc>,
}

#[derive(Deserialize, Debug)]
struct StreamystatsItemDetails {
    #[serde(rename = "lastWatched")]
    last_watched: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jellystat_entries_pick_latest() {
        let entries = vec![
            JellystatHistoryEntry {
                user_name: "alice".into(),
                activity_date_inserted: "2024-01-01T00:00:00Z".parse().unwrap(),
            },
            JellystatHistoryEntry {
                user_name: "bob".into(),
                activity_date_inserted: "2024-06-15T12:00:00Z".parse().unwrap(),
            },
        ];
        let latest = entries.iter().map(|e| e.activity_date_inserted).max();
        assert_eq!(latest, Some("2024-06-15T12:00:00Z".parse().unwrap()));
    }

    #[test]
    fn test_no_entries_is_never() {
        let entries: Vec<JellystatHistoryEntry> = vec![];
        let latest = entries.iter().map(|e| e.activity_date_inserted).max();
        assert_eq!(latest, None);
    }
}
