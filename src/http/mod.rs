mod jellyfin_client;
mod playback_client;
mod radarr_client;
mod sonarr_client;

pub use jellyfin_client::{Item, ItemsFilter, JellyfinClient};
pub use playback_client::{PlaybackBackend, PlaybackLookup, PlaybackStatsAdapter, PlaybackStatsClient};
pub use radarr_client::{Movie, RadarrClient, Tag as RadarrTag};
pub use sonarr_client::{Episode, Season, SeasonStatistics, SeriesInfo, SeriesStatistics, SonarrClient, Tag as SonarrTag};

use crate::errors::EngineError;
use log::{debug, warn};
use reqwest::{Response, StatusCode};
use std::time::Duration;

/// Extension trait over [`reqwest::Response`] that turns a non-2xx response
/// into an [`EngineError`], distinguishing 404 ("not found", silent per §4.3)
/// from other 4xx (reported, aborts the title) and 5xx (transient).
pub trait ResponseExt {
    async fn handle_error(self, service: &'static str) -> Result<Response, EngineError>;
}

impl ResponseExt for Response {
    async fn handle_error(self, service: &'static str) -> Result<Response, EngineError> {
        let status = self.status();
        if status.is_success() {
            debug!("request to {service} succeeded");
            return Ok(self);
        }

        let url = self.url().clone();
        let body = self.text().await.unwrap_or_default();

        if status == StatusCode::NOT_FOUND {
            return Err(EngineError::NotFound {
                what: format!("{service} resource at {url}"),
            });
        }
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(EngineError::TransientExternal {
                service,
                source: anyhow::anyhow!("{url} failed with status {status}: {body}"),
            });
        }
        Err(EngineError::Fatal(anyhow::anyhow!(
            "request to {url} failed with status {status}: {body}"
        )))
    }
}

/// Retries a fallible async operation up to `retries` times with exponential
/// backoff, but only for [`EngineError::TransientExternal`] — every other
/// variant is returned immediately (§7, §9: "retries belong in the adapter
/// layer").
pub async fn with_retries<T, F, Fut>(retries: u32, mut op: F) -> Result<T, EngineError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, EngineError>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(err @ EngineError::TransientExternal { .. }) if attempt < retries => {
                attempt += 1;
                let backoff = Duration::from_millis(250 * 2u64.pow(attempt));
                warn!("transient error ({err}), retrying in {backoff:?} (attempt {attempt}/{retries})");
                tokio::time::sleep(backoff).await;
            }
            Err(err) => return Err(err),
        }
    }
}
