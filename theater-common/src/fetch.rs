//! Image fetcher boundary.
use std::path::Path;

use anyhow::Result;
use async_trait::async_trait;

/// Transfers the bytes behind `url` into `destination`.
///
/// Returns the number of bytes written. Callers treat any error as a
/// per-image failure; it never aborts a traversal.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    async fn fetch(&self, url: &str, destination: &Path) -> Result<u64>;
}
