use crate::error::Result;
use async_trait::async_trait;

/// Retrieves the raw HTML of a page for link discovery
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String>;
}

/// Produces the source of a page after its scripts have run
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<String>;
}
