//! Streaming-server (Jellyfin) adapter. Read-only: the engine never mutates
//! anything through this client, it only enumerates libraries and items.

use super::{with_retries, ResponseExt};
use crate::config::JellyfinConfig;
use crate::errors::EngineError;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, ClientBuilder, Url};
use serde::{Deserialize, Serialize};

const SERVICE: &str = "jellyfin";

pub struct JellyfinClient {
    client: Client,
    base_url: Url,
}

impl Clone for JellyfinClient {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
        }
    }
}

impl JellyfinClient {
    pub fn new(config: &JellyfinConfig) -> anyhow::Result<Self> {
        let JellyfinConfig { base_url, api_key } = config;
        let base_url = Url::parse(base_url)?;
        let default_headers = auth_headers(api_key)?;
        let client = ClientBuilder::new()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Get all items that match the given query filter.
    /// https://api.jellyfin.org/#tag/Items
    pub async fn items(&self, items_filter: ItemsFilter<'_>) -> Result<Vec<Item>, EngineError> {
        let url = self
            .base_url
            .join("Items")
            .map_err(|e| EngineError::Fatal(e.into()))?;
        let response: ItemsResponse = with_retries(2, || async {
            self.client
                .get(url.clone())
                .query(&items_filter)
                .send()
                .await
                .map_err(|e| EngineError::TransientExternal {
                    service: SERVICE,
                    source: e.into(),
                })?
                .handle_error(SERVICE)
                .await?
                .json::<ItemsResponse>()
                .await
                .map_err(|e| EngineError::Fatal(e.into()))
        })
        .await?;

        Ok(response.items)
    }

    /// Get the id -> name map for every library (virtual folder) configured
    /// on the server.
    pub async fn libraries(&self) -> Result<Vec<Library>, EngineError> {
        let url = self
            .base_url
            .join("Library/VirtualFolders")
            .map_err(|e| EngineError::Fatal(e.into()))?;
        with_retries(2, || async {
            self.client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| EngineError::TransientExternal {
                    service: SERVICE,
                    source: e.into(),
                })?
                .handle_error(SERVICE)
                .await?
                .json::<Vec<Library>>()
                .await
                .map_err(|e| EngineError::Fatal(e.into()))
        })
        .await
    }

    async fn users(&self) -> Result<Vec<User>, EngineError> {
        let url = self
            .base_url
            .join("Users")
            .map_err(|e| EngineError::Fatal(e.into()))?;
        with_retries(2, || async {
            self.client
                .get(url.clone())
                .send()
                .await
                .map_err(|e| EngineError::TransientExternal {
                    service: SERVICE,
                    source: e.into(),
                })?
                .handle_error(SERVICE)
                .await?
                .json::<Vec<User>>()
                .await
                .map_err(|e| EngineError::Fatal(e.into()))
        })
        .await
    }

    /// Get a user by their username (not id).
    pub async fn user(&self, user_name: &str) -> Result<User, EngineError> {
        self.users()
            .await?
            .into_iter()
            .find(|user| user.name == user_name)
            .ok_or_else(|| EngineError::NotFound {
                what: format!("user {user_name}"),
            })
    }
}

fn auth_headers(api_key: &str) -> anyhow::Result<HeaderMap> {
    let mut auth_headers = HeaderMap::new();
    let header_value = format!("MediaBrowser Token={api_key}");
    let mut header_value = HeaderValue::from_str(&header_value)?;
    header_value.set_sensitive(true);
    auth_headers.insert(AUTHORIZATION, header_value);
    Ok(auth_headers)
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    items: Vec<Item>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
#[cfg_attr(test, derive(Default))]
pub struct Item {
    pub name: String,
    pub id: String,
    pub r#type: Option<String>,
    pub production_year: Option<i32>,
    pub parent_id: Option<String>,
    pub provider_ids: Option<ProviderIds>,
    pub user_data: Option<ItemUserData>,
}

impl Item {
    pub fn tmdb_id(&self) -> Option<&str> {
        self.provider_ids.as_ref()?.tmdb.as_deref()
    }

    pub fn tvdb_id(&self) -> Option<&str> {
        self.provider_ids.as_ref()?.tvdb.as_deref()
    }

    pub fn last_played_date(&self) -> Option<DateTime<Utc>> {
        self.user_data.as_ref()?.last_played_date
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
#[cfg_attr(test, derive(Default))]
pub struct ProviderIds {
    pub tmdb: Option<String>,
    pub tvdb: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(rename_all = "PascalCase")]
#[cfg_attr(test, derive(Default))]
pub struct ItemUserData {
    pub last_played_date: Option<DateTime<Utc>>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct UserId(pub String);

impl AsRef<str> for UserId {
    fn as_ref(&self) -> &str {
        self.0.as_ref()
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "PascalCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
}

#[derive(Deserialize, Debug)]
pub struct Library {
    #[serde(rename = "ItemId")]
    pub item_id: String,
    pub name: String,
}

/// Filter for querying items. Serializes into query parameters. Check [docs]
/// for more details
///
/// [docs]: https://api.jellyfin.org/#tag/Items/operation/GetItems
#[derive(Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ItemsFilter<'a> {
    #[serde(serialize_with = "to_comma_separated")]
    fields: Option<&'a [&'a str]>,
    #[serde(serialize_with = "to_comma_separated")]
    include_item_types: Option<&'a [&'a str]>,
    recursive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent_id: Option<&'a str>,
}

impl<'a> ItemsFilter<'a> {
    pub fn new() -> Self {
        Self {
            fields: None,
            include_item_types: None,
            recursive: None,
            user_id: None,
            parent_id: None,
        }
    }

    #[must_use]
    pub fn user_id(mut self, user_id: &'a str) -> Self {
        self.user_id = Some(user_id);
        self
    }

    #[must_use]
    pub fn parent_id(mut self, parent_id: &'a str) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    #[must_use]
    pub fn recursive(mut self) -> Self {
        self.recursive = Some(true);
        self
    }

    #[must_use]
    pub fn include_item_types(mut self, types: &'a [&'a str]) -> Self {
        self.include_item_types = Some(types);
        self
    }

    #[must_use]
    pub fn fields(mut self, fields: &'a [&'a str]) -> Self {
        self.fields = Some(fields);
        self
    }

    /// Convenience constructor for the merge stage: all series/movies with
    /// the fields the pipeline needs to join and mark them (spec §4.4: scoped
    /// to `type∈{Series,Movie}`, not every item under the library tree).
    pub fn titles() -> Self {
        Self::new()
            .recursive()
            .include_item_types(&["Movie", "Series"])
            .fields(&["ProviderIds", "ParentId", "ProductionYear", "UserData"])
    }
}

impl Default for ItemsFilter<'_> {
    fn default() -> Self {
        Self::new()
    }
}

fn to_comma_separated<S>(values: &Option<&[&str]>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    if let Some(values) = values {
        if !values.is_empty() {
            let values = values.join(",");
            return serializer.serialize_some(&values);
        }
    }
    serializer.serialize_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_items_filter() {
        let filter = ItemsFilter::new()
            .user_id("user_id")
            .recursive()
            .include_item_types(&["Movie", "Series"])
            .fields(&["ProviderIds", "Path"]);

        let expected = r#"{"fields":"ProviderIds,Path","includeItemTypes":"Movie,Series","recursive":true,"userId":"user_id"}"#;
        let actual = serde_json::to_string(&filter).unwrap();
        assert_eq!(expected, actual);
    }

    #[test]
    fn test_auth_headers() -> anyhow::Result<()> {
        let headers = auth_headers("abc")?;
        let expected = "MediaBrowser Token=abc";
        let actual = headers.get(AUTHORIZATION).unwrap().to_str()?;
        assert_eq!(expected, actual);
        Ok(())
    }

    #[test]
    fn test_tmdb_tvdb_id_extraction() {
        let item = Item {
            provider_ids: Some(ProviderIds {
                tmdb: Some("123".into()),
                tvdb: None,
            }),
            ..Default::default()
        };
        assert_eq!(item.tmdb_id(), Some("123"));
        assert_eq!(item.tvdb_id(), None);
    }
}
