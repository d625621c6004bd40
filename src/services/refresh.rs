//! Metadata refresh options and the refresh capability provided by the media server.

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::library::LibraryItem;

/// How much of an item's existing metadata or images a refresh may replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MetadataRefreshMode {
    Default,
    /// Validate what is there and fill in what is missing
    ValidationOnly,
    FullRefresh,
}

impl MetadataRefreshMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataRefreshMode::Default => "Default",
            MetadataRefreshMode::ValidationOnly => "ValidationOnly",
            MetadataRefreshMode::FullRefresh => "FullRefresh",
        }
    }
}

/// Options passed along with every refresh request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetadataRefreshOptions {
    pub enable_remote_content_probe: bool,
    pub replace_all_metadata: bool,
    pub enable_thumbnail_image_extraction: bool,
    pub image_refresh_mode: MetadataRefreshMode,
    pub metadata_refresh_mode: MetadataRefreshMode,
    pub replace_all_images: bool,
}

impl MetadataRefreshOptions {
    /// Options for probing remote stream placeholders: probe the remote
    /// content, validate existing metadata and images, skip thumbnails.
    pub fn stream_probe() -> Self {
        Self {
            enable_remote_content_probe: true,
            replace_all_metadata: true,
            enable_thumbnail_image_extraction: false,
            image_refresh_mode: MetadataRefreshMode::ValidationOnly,
            metadata_refresh_mode: MetadataRefreshMode::ValidationOnly,
            replace_all_images: false,
        }
    }
}

/// Triggers a metadata refresh (including stream probing) for a library item.
///
/// Implementations may watch `cancel` to abandon an in-flight refresh; the
/// caller treats an error returned after cancellation as an interruption.
#[async_trait]
pub trait MetadataRefresher: Send + Sync {
    async fn refresh(
        &self,
        item: &LibraryItem,
        options: &MetadataRefreshOptions,
        cancel: &CancellationToken,
    ) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_probe_options() {
        let options = MetadataRefreshOptions::stream_probe();
        assert!(options.enable_remote_content_probe);
        assert!(options.replace_all_metadata);
        assert!(!options.enable_thumbnail_image_extraction);
        assert_eq!(options.image_refresh_mode, MetadataRefreshMode::ValidationOnly);
        assert_eq!(options.metadata_refresh_mode, MetadataRefreshMode::ValidationOnly);
        assert!(!options.replace_all_images);
    }

    #[test]
    fn test_options_serialize_with_server_field_names() {
        let value = serde_json::to_value(MetadataRefreshOptions::stream_probe()).unwrap();
        assert_eq!(value["MetadataRefreshMode"], "ValidationOnly");
        assert_eq!(value["EnableRemoteContentProbe"], true);
        assert_eq!(value["ReplaceAllImages"], false);
    }
}
