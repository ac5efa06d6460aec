use crate::error::FetchError;
use async_trait::async_trait;

/// Source of search result documents
/// Lets the pipeline run against a live site or a canned page in tests
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetch the raw body of `url`
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;

    /// Get the name of the fetcher
    fn source_name(&self) -> &'static str;
}
