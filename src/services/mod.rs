//! Media server integrations

pub mod logging;
pub mod media_server;
pub mod refresh;

pub use logging::{LogFormat, init_tracing};
pub use media_server::{MediaServerClient, MediaServerConfig, ServerInfo};
pub use refresh::{MetadataRefreshMode, MetadataRefreshOptions, MetadataRefresher};
