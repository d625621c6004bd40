//! Picks the library items that still need a stream probe.

use tracing::info;

use crate::library::LibraryItem;

/// Path fragments that mark a stream-link placeholder. Plain substring
/// matches, case-sensitive, anywhere in the path.
const PLACEHOLDER_MARKERS: &[&str] = &["softlink", "strm"];

/// A library item that needed a refresh when the run started.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshCandidate(LibraryItem);

impl RefreshCandidate {
    pub fn item(&self) -> &LibraryItem {
        &self.0
    }

    pub fn path(&self) -> &str {
        &self.0.path
    }

    pub fn into_item(self) -> LibraryItem {
        self.0
    }
}

/// Whether the path looks like a `.strm` file or a softlink placeholder
pub fn is_stream_placeholder(path: &str) -> bool {
    PLACEHOLDER_MARKERS.iter().any(|marker| path.contains(marker))
}

/// Whether an item is a placeholder with no probed media streams
pub fn needs_refresh(item: &LibraryItem) -> bool {
    !item.path.is_empty() && is_stream_placeholder(&item.path) && item.media_stream_count() == 0
}

/// Filter `items` down to refresh candidates, keeping their order.
pub fn select_candidates(items: Vec<LibraryItem>) -> Vec<RefreshCandidate> {
    items
        .into_iter()
        .filter_map(|item| {
            if needs_refresh(&item) {
                info!(path = %item.path, "Item added");
                Some(RefreshCandidate(item))
            } else {
                info!(
                    path = %item.path,
                    media_streams = item.media_stream_count(),
                    "Item dropped"
                );
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::ItemType;

    #[test]
    fn test_is_stream_placeholder() {
        assert!(is_stream_placeholder("/media/movie.strm"));
        assert!(is_stream_placeholder("/mnt/softlink/show/e01.mkv"));
        assert!(is_stream_placeholder("/media/strm-library/movie.mkv"));
        assert!(!is_stream_placeholder("/media/movie.STRM"));
        assert!(!is_stream_placeholder("/media/movie.mkv"));
        assert!(!is_stream_placeholder(""));
    }

    #[test]
    fn test_needs_refresh() {
        assert!(needs_refresh(&LibraryItem::new("1", "/a.strm", ItemType::Movie, 0)));
        assert!(!needs_refresh(&LibraryItem::new("2", "/a.strm", ItemType::Movie, 1)));
        assert!(!needs_refresh(&LibraryItem::new("3", "", ItemType::Movie, 0)));
    }
}
