//! REST client for an Emby/Jellyfin-style media server.
//!
//! Implements [LibraryQuery] and [MetadataRefresher] so the extraction task can
//! run as a standalone worker next to the server. Probing and metadata storage
//! stay on the server; this client only asks for items and queues refreshes.
//!
//! The server's refresh endpoint queues the work and answers straight away.
//! To keep candidates strictly one at a time, [MetadataRefresher::refresh]
//! polls the item until it reports media streams, up to
//! [MediaServerConfig::refresh_wait].

use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use crate::library::{ItemQuery, ItemType, LibraryItem, LibraryQuery};
use crate::services::refresh::{MetadataRefreshOptions, MetadataRefresher};

const TOKEN_HEADER: &str = "X-Emby-Token";

/// Delay between checks for media streams after a refresh was queued
const STREAM_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Connection settings for [MediaServerClient]
#[derive(Debug, Clone)]
pub struct MediaServerConfig {
    pub base_url: String,
    pub api_key: String,
    /// When set, items are listed through this user's view of the library
    pub user_id: Option<String>,
    pub timeout: Duration,
    /// How long a refresh waits for the item to report media streams.
    /// Zero queues the refresh and returns immediately.
    pub refresh_wait: Duration,
}

/// Public server information, used for the startup log line
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServerInfo {
    #[serde(default)]
    pub server_name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<ServerItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServerItem {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(rename = "Type", default)]
    item_type: Option<String>,
    #[serde(default)]
    path: Option<String>,
    #[serde(default)]
    is_folder: bool,
    #[serde(default)]
    media_streams: Vec<serde_json::Value>,
}

impl From<ServerItem> for LibraryItem {
    fn from(item: ServerItem) -> Self {
        let item_type = ItemType::from(item.item_type.unwrap_or_default());
        LibraryItem::new(
            item.id,
            item.path.unwrap_or_default(),
            item_type,
            item.media_streams.len(),
        )
        .with_name(item.name)
        .with_folder_flag(item.is_folder)
    }
}

/// Media server API client
pub struct MediaServerClient {
    base_url: Url,
    api_key: String,
    user_id: Option<String>,
    refresh_wait: Duration,
    client: Client,
}

impl MediaServerClient {
    pub fn new(config: MediaServerConfig) -> Result<Self> {
        let mut base = config.base_url.trim_end_matches('/').to_string();
        base.push('/');
        let base_url = Url::parse(&base)
            .with_context(|| format!("Invalid media server URL: {}", config.base_url))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url,
            api_key: config.api_key,
            user_id: config.user_id,
            refresh_wait: config.refresh_wait,
            client,
        })
    }

    /// Build a URL under the base path. Each segment is percent-encoded, so
    /// ids and user ids cannot change the route.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("Media server URL cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn items_endpoint(&self) -> Result<Url> {
        match &self.user_id {
            Some(user_id) => self.endpoint(&["Users", user_id, "Items"]),
            None => self.endpoint(&["Items"]),
        }
    }

    /// Current media stream count of a single item
    async fn media_stream_count(&self, id: &str) -> Result<usize> {
        let resp = self
            .client
            .get(self.items_endpoint()?)
            .query(&item_lookup_params(id))
            .header(TOKEN_HEADER, &self.api_key)
            .send()
            .await
            .context("Failed to look up item")?
            .error_for_status()
            .context("Item lookup rejected")?;

        let body: ItemsResponse = resp.json().await.context("Failed to decode item lookup")?;
        body.items
            .into_iter()
            .find(|item| item.id == id)
            .map(|item| item.media_streams.len())
            .with_context(|| format!("Item {} no longer exists", id))
    }

    /// Poll until the item reports media streams or the wait runs out
    async fn wait_for_streams(&self, item: &LibraryItem, cancel: &CancellationToken) -> Result<()> {
        if self.refresh_wait.is_zero() {
            return Ok(());
        }
        let deadline = Instant::now() + self.refresh_wait;

        loop {
            let streams = self.media_stream_count(&item.id).await?;
            if streams > 0 {
                debug!(path = %item.path, media_streams = streams, "Streams reported");
                return Ok(());
            }
            if Instant::now() >= deadline {
                warn!(
                    path = %item.path,
                    wait_secs = self.refresh_wait.as_secs(),
                    "No media streams after refresh"
                );
                bail!(
                    "No media streams reported for {} within {}s",
                    item.path,
                    self.refresh_wait.as_secs()
                );
            }
            tokio::select! {
                _ = cancel.cancelled() => bail!("Refresh of {} cancelled", item.path),
                _ = tokio::time::sleep(STREAM_POLL_INTERVAL) => {}
            }
        }
    }

    /// Fetch public server info (name and version)
    pub async fn server_info(&self) -> Result<ServerInfo> {
        let url = self.endpoint(&["System", "Info", "Public"])?;
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .context("Media server unreachable")?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}

/// Query string for an item listing
fn item_query_params(query: &ItemQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("Recursive", "true".to_string()),
        ("Fields", "Path,MediaStreams".to_string()),
    ];
    if !query.exclude_types.is_empty() {
        let types = query
            .exclude_types
            .iter()
            .map(|t| t.as_str())
            .collect::<Vec<_>>()
            .join(",");
        params.push(("ExcludeItemTypes", types));
    }
    if query.exclude_container_flag {
        params.push(("IsFolder", "false".to_string()));
    }
    params
}

/// Query string for looking up one item's streams
fn item_lookup_params(id: &str) -> Vec<(&'static str, String)> {
    vec![
        ("Ids", id.to_string()),
        ("Fields", "MediaStreams".to_string()),
    ]
}

/// Query string for a refresh request
fn refresh_params(options: &MetadataRefreshOptions) -> Vec<(&'static str, String)> {
    vec![
        ("Recursive", "false".to_string()),
        (
            "MetadataRefreshMode",
            options.metadata_refresh_mode.as_str().to_string(),
        ),
        (
            "ImageRefreshMode",
            options.image_refresh_mode.as_str().to_string(),
        ),
        (
            "ReplaceAllMetadata",
            options.replace_all_metadata.to_string(),
        ),
        ("ReplaceAllImages", options.replace_all_images.to_string()),
        (
            "EnableRemoteContentProbe",
            options.enable_remote_content_probe.to_string(),
        ),
        (
            "EnableThumbnailImageExtraction",
            options.enable_thumbnail_image_extraction.to_string(),
        ),
    ]
}

#[async_trait]
impl LibraryQuery for MediaServerClient {
    async fn query(&self, query: &ItemQuery) -> Result<Vec<LibraryItem>> {
        let url = self.items_endpoint()?;

        let resp = self
            .client
            .get(url)
            .query(&item_query_params(query))
            .header(TOKEN_HEADER, &self.api_key)
            .send()
            .await
            .context("Failed to query library items")?
            .error_for_status()
            .context("Library item query rejected")?;

        let body: ItemsResponse = resp
            .json()
            .await
            .context("Failed to decode library item listing")?;

        let fetched = body.items.len();
        let items: Vec<LibraryItem> = body
            .items
            .into_iter()
            .map(LibraryItem::from)
            .filter(|item| query.matches(item))
            .collect();

        debug!(fetched, kept = items.len(), "Library query finished");
        Ok(items)
    }
}

#[async_trait]
impl MetadataRefresher for MediaServerClient {
    async fn refresh(
        &self,
        item: &LibraryItem,
        options: &MetadataRefreshOptions,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let url = self.endpoint(&["Items", &item.id, "Refresh"])?;

        let request = self
            .client
            .post(url)
            .query(&refresh_params(options))
            .header(TOKEN_HEADER, &self.api_key)
            .send();

        let resp = tokio::select! {
            _ = cancel.cancelled() => bail!("Refresh of {} cancelled", item.path),
            resp = request => resp.with_context(|| format!("Refresh request failed for {}", item.path))?,
        };

        let status = resp.status();
        if !status.is_success() {
            bail!("Media server returned {} refreshing {}", status, item.path);
        }

        self.wait_for_streams(item, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base: &str, user_id: Option<&str>) -> MediaServerClient {
        MediaServerClient::new(MediaServerConfig {
            base_url: base.to_string(),
            api_key: "key".to_string(),
            user_id: user_id.map(String::from),
            timeout: Duration::from_secs(5),
            refresh_wait: Duration::ZERO,
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let c = client("http://localhost:8096/emby", None);
        assert_eq!(
            c.endpoint(&["Items", "abc", "Refresh"]).unwrap().as_str(),
            "http://localhost:8096/emby/Items/abc/Refresh"
        );

        let c = client("http://localhost:8096/", None);
        assert_eq!(
            c.endpoint(&["System", "Info", "Public"]).unwrap().as_str(),
            "http://localhost:8096/System/Info/Public"
        );
    }

    #[test]
    fn test_endpoint_escapes_segments() {
        let c = client("http://localhost:8096", None);
        assert_eq!(
            c.endpoint(&["Items", "a/b?c", "Refresh"]).unwrap().as_str(),
            "http://localhost:8096/Items/a%2Fb%3Fc/Refresh"
        );
    }

    #[test]
    fn test_items_endpoint_uses_user_view() {
        assert_eq!(
            client("http://h", None).items_endpoint().unwrap().as_str(),
            "http://h/Items"
        );
        assert_eq!(
            client("http://h", Some("u1")).items_endpoint().unwrap().as_str(),
            "http://h/Users/u1/Items"
        );
        assert_eq!(
            client("http://h", Some("../admin")).items_endpoint().unwrap().as_str(),
            "http://h/Users/..%2Fadmin/Items"
        );
    }

    #[test]
    fn test_item_lookup_params() {
        let params = item_lookup_params("a1");
        assert!(params.contains(&("Ids", "a1".to_string())));
        assert!(params.contains(&("Fields", "MediaStreams".to_string())));
    }

    #[tokio::test]
    async fn test_no_wait_when_disabled() {
        let c = client("http://127.0.0.1:9", None);
        let item = LibraryItem::new("a1", "/strm/a.strm", ItemType::Movie, 0);
        c.wait_for_streams(&item, &CancellationToken::new())
            .await
            .unwrap();
    }

    #[test]
    fn test_invalid_base_url() {
        let result = MediaServerClient::new(MediaServerConfig {
            base_url: "not a url".to_string(),
            api_key: String::new(),
            user_id: None,
            timeout: Duration::from_secs(1),
            refresh_wait: Duration::ZERO,
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_item_query_params() {
        let params = item_query_params(&ItemQuery::refresh_targets());
        assert!(params.contains(&("Recursive", "true".to_string())));
        assert!(params.contains(&("IsFolder", "false".to_string())));
        assert!(params.contains(&(
            "ExcludeItemTypes",
            "Folder,CollectionFolder,UserView,Series,Season,Trailer,Playlist".to_string()
        )));
    }

    #[test]
    fn test_refresh_params() {
        let params = refresh_params(&MetadataRefreshOptions::stream_probe());
        assert!(params.contains(&("MetadataRefreshMode", "ValidationOnly".to_string())));
        assert!(params.contains(&("ImageRefreshMode", "ValidationOnly".to_string())));
        assert!(params.contains(&("ReplaceAllMetadata", "true".to_string())));
        assert!(params.contains(&("ReplaceAllImages", "false".to_string())));
        assert!(params.contains(&("EnableRemoteContentProbe", "true".to_string())));
    }

    #[test]
    fn test_decode_item_listing() {
        let body = r#"{
            "Items": [
                {"Id": "a1", "Name": "Heat", "Type": "Movie", "Path": "/strm/Heat.strm", "MediaStreams": []},
                {"Id": "b2", "Name": "Pilot", "Type": "Episode", "Path": "/tv/pilot.mkv",
                 "MediaStreams": [{"Type": "Video"}, {"Type": "Audio"}]},
                {"Id": "c3", "Name": "Box", "Type": "BoxSet", "IsFolder": true}
            ],
            "TotalRecordCount": 3
        }"#;
        let resp: ItemsResponse = serde_json::from_str(body).unwrap();
        let items: Vec<LibraryItem> = resp.items.into_iter().map(LibraryItem::from).collect();

        assert_eq!(items[0].path, "/strm/Heat.strm");
        assert_eq!(items[0].media_stream_count(), 0);
        assert_eq!(items[1].item_type, ItemType::Episode);
        assert_eq!(items[1].media_stream_count(), 2);
        assert_eq!(items[2].path, "");
        assert!(items[2].is_folder);
        assert!(!ItemQuery::refresh_targets().matches(&items[2]));
    }
}
