//! Library item model and the query capability provided by the media server.
//!
//! Items are read-only views. The task never mutates them directly; changes
//! only happen through a dispatched metadata refresh.

use std::fmt;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Item type as reported by the media server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ItemType {
    Movie,
    Episode,
    Video,
    MusicVideo,
    Audio,
    Folder,
    CollectionFolder,
    UserView,
    Series,
    Season,
    Trailer,
    Playlist,
    Other(String),
}

impl ItemType {
    /// Container-like types that never carry playable media of their own.
    pub const CONTAINERS: [ItemType; 7] = [
        ItemType::Folder,
        ItemType::CollectionFolder,
        ItemType::UserView,
        ItemType::Series,
        ItemType::Season,
        ItemType::Trailer,
        ItemType::Playlist,
    ];

    pub fn as_str(&self) -> &str {
        match self {
            ItemType::Movie => "Movie",
            ItemType::Episode => "Episode",
            ItemType::Video => "Video",
            ItemType::MusicVideo => "MusicVideo",
            ItemType::Audio => "Audio",
            ItemType::Folder => "Folder",
            ItemType::CollectionFolder => "CollectionFolder",
            ItemType::UserView => "UserView",
            ItemType::Series => "Series",
            ItemType::Season => "Season",
            ItemType::Trailer => "Trailer",
            ItemType::Playlist => "Playlist",
            ItemType::Other(name) => name,
        }
    }
}

impl From<String> for ItemType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Movie" => ItemType::Movie,
            "Episode" => ItemType::Episode,
            "Video" => ItemType::Video,
            "MusicVideo" => ItemType::MusicVideo,
            "Audio" => ItemType::Audio,
            "Folder" => ItemType::Folder,
            "CollectionFolder" => ItemType::CollectionFolder,
            "UserView" => ItemType::UserView,
            "Series" => ItemType::Series,
            "Season" => ItemType::Season,
            "Trailer" => ItemType::Trailer,
            "Playlist" => ItemType::Playlist,
            _ => ItemType::Other(value),
        }
    }
}

impl From<ItemType> for String {
    fn from(value: ItemType) -> Self {
        value.as_str().to_string()
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A library entry with the attributes the extraction task looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    /// Server-side identifier, used to address refresh calls
    pub id: String,
    pub name: String,
    /// Path of the underlying file; may be empty
    pub path: String,
    pub item_type: ItemType,
    /// Container flag (folders, boxsets and the like)
    pub is_folder: bool,
    media_stream_count: usize,
}

impl LibraryItem {
    pub fn new(
        id: impl Into<String>,
        path: impl Into<String>,
        item_type: ItemType,
        media_stream_count: usize,
    ) -> Self {
        let path = path.into();
        let name = path
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or_default()
            .to_string();
        Self {
            id: id.into(),
            name,
            path,
            item_type,
            is_folder: false,
            media_stream_count,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_folder_flag(mut self, is_folder: bool) -> Self {
        self.is_folder = is_folder;
        self
    }

    /// Number of probed audio/video/subtitle streams. Zero means the item
    /// has not been probed yet.
    pub fn media_stream_count(&self) -> usize {
        self.media_stream_count
    }
}

/// Filter passed to the library query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemQuery {
    pub require_path: bool,
    pub exclude_container_flag: bool,
    pub exclude_types: Vec<ItemType>,
}

impl ItemQuery {
    /// The filter used by the extraction task: items with a path, no
    /// container flag, and none of the container-like types.
    pub fn refresh_targets() -> Self {
        Self {
            require_path: true,
            exclude_container_flag: true,
            exclude_types: ItemType::CONTAINERS.to_vec(),
        }
    }

    /// Whether an item passes this filter. Query implementations that cannot
    /// express every option server-side use this to finish the job locally.
    pub fn matches(&self, item: &LibraryItem) -> bool {
        if self.require_path && item.path.is_empty() {
            return false;
        }
        if self.exclude_container_flag && item.is_folder {
            return false;
        }
        !self.exclude_types.contains(&item.item_type)
    }
}

/// Read access to the media server's library.
#[async_trait]
pub trait LibraryQuery: Send + Sync {
    /// Return the current set of items matching `query`.
    async fn query(&self, query: &ItemQuery) -> Result<Vec<LibraryItem>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_type_round_trips_known_and_unknown_names() {
        assert_eq!(ItemType::from("Season".to_string()), ItemType::Season);
        assert_eq!(
            ItemType::from("BoxSet".to_string()),
            ItemType::Other("BoxSet".to_string())
        );
        assert_eq!(String::from(ItemType::CollectionFolder), "CollectionFolder");
    }

    #[test]
    fn test_refresh_targets_filter() {
        let query = ItemQuery::refresh_targets();

        let movie = LibraryItem::new("1", "/m/a.strm", ItemType::Movie, 0);
        assert!(query.matches(&movie));

        let no_path = LibraryItem::new("2", "", ItemType::Movie, 0);
        assert!(!query.matches(&no_path));

        let folder = LibraryItem::new("3", "/m/dir", ItemType::Other("BoxSet".into()), 0)
            .with_folder_flag(true);
        assert!(!query.matches(&folder));

        let season = LibraryItem::new("4", "/tv/show/s01", ItemType::Season, 0);
        assert!(!query.matches(&season));
    }

    #[test]
    fn test_default_name_is_file_name() {
        let item = LibraryItem::new("1", "/media/movies/Heat (1995).strm", ItemType::Movie, 0);
        assert_eq!(item.name, "Heat (1995).strm");
    }
}
