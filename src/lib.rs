//! Media info extraction for stream-link placeholders.
//!
//! Scans a media server library for `.strm`/softlink items that have no
//! probed media streams and asks the server to refresh each of them.

pub mod cli;
pub mod config;
pub mod error;
pub mod jobs;
pub mod library;
pub mod services;

pub use error::ExtractError;
