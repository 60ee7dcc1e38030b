//! Per-source cache stores

pub mod cache;

pub use cache::{get_metadata, set_metadata, CacheProvider};
