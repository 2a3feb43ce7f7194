use crate::crawlers::crawler::PageFetcher;
use crate::error::Result;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Plain HTTP GET fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http_client: Client,
}

impl HttpFetcher {
    /// Every request is bounded by `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        let response = self.http_client.get(url).send().await?;
        ::log::debug!("GET {} -> {}", url, response.status());
        Ok(response.text().await?)
    }
}
