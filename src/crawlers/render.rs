use crate::crawlers::crawler::PageRenderer;
use crate::error::{Error, Result};
use async_trait::async_trait;
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use std::time::Duration;

/// Upper bound for navigation plus source retrieval of one page
const RENDER_TIMEOUT: Duration = Duration::from_secs(45);

/// Drivers tried when the configured WebDriver URL refuses the session
const FALLBACK_WEBDRIVER_URLS: [&str; 4] = [
    "http://localhost:9515", // ChromeDriver default
    "http://localhost:4723", // Appium default
    "http://localhost:9222", // Chrome debug port default
    "http://127.0.0.1:4444", // Try with IP instead of localhost
];

/// Renders pages in a headless browser driven over WebDriver
///
/// Every page gets its own session: connect, navigate, wait for the page
/// to settle, read the source, close.
#[derive(Debug, Clone)]
pub struct WebDriverRenderer {
    webdriver_url: String,
    settle: Duration,
}

impl WebDriverRenderer {
    pub fn new(webdriver_url: &str, settle: Duration) -> Self {
        Self {
            webdriver_url: webdriver_url.to_string(),
            settle,
        }
    }

    async fn render_with(&self, client: &Client, url: &str) -> Result<String> {
        client
            .goto(url)
            .await
            .map_err(|e| navigation_error(e, "accessing", url))?;

        tokio::time::sleep(self.settle).await;

        client
            .source()
            .await
            .map_err(|e| navigation_error(e, "getting source for", url))
    }
}

#[async_trait]
impl PageRenderer for WebDriverRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let start = std::time::Instant::now();
        let client = connect_to_webdriver(&self.webdriver_url).await?;

        let result = match tokio::time::timeout(RENDER_TIMEOUT, self.render_with(&client, url)).await {
            Ok(result) => result,
            Err(_) => {
                ::log::error!("Timeout rendering: {}", url);
                Err(Error::WebDriver(format!("timed out rendering {}", url)))
            }
        };

        if let Err(e) = client.close().await {
            ::log::warn!("Failed to close WebDriver session: {}", e);
        }

        ::log::debug!(
            "Rendered {} in {:.2} seconds",
            url,
            start.elapsed().as_secs_f64()
        );
        result
    }
}

/// Capabilities requesting a headless browser
fn headless_capabilities() -> serde_json::Map<String, serde_json::Value> {
    let mut caps = serde_json::Map::new();
    caps.insert(
        "goog:chromeOptions".to_string(),
        json!({ "args": ["--headless", "--disable-gpu"] }),
    );
    caps.insert(
        "moz:firefoxOptions".to_string(),
        json!({ "args": ["-headless"] }),
    );
    caps
}

async fn try_connect(webdriver_url: &str) -> std::result::Result<Client, String> {
    let mut builder = ClientBuilder::native();
    builder.capabilities(headless_capabilities());
    builder.connect(webdriver_url).await.map_err(|e| e.to_string())
}

/// Connects to the WebDriver instance, falling back to common driver ports
async fn connect_to_webdriver(webdriver_url: &str) -> Result<Client> {
    match try_connect(webdriver_url).await {
        Ok(client) => {
            ::log::debug!("Connected to WebDriver at {}", webdriver_url);
            return Ok(client);
        }
        Err(e) => {
            ::log::error!("Failed to connect to WebDriver at {}: {}", webdriver_url, e);
        }
    }

    for url in FALLBACK_WEBDRIVER_URLS.iter() {
        if *url == webdriver_url {
            continue;
        }

        ::log::info!("Trying fallback WebDriver URL: {}", url);
        if let Ok(client) = try_connect(url).await {
            ::log::debug!("Connected to fallback WebDriver at {}", url);
            return Ok(client);
        }
    }

    ::log::error!(
        "Make sure a WebDriver server is running or set the WEBDRIVER_URL environment variable"
    );
    Err(Error::WebDriver(format!(
        "failed to connect to any WebDriver server (tried {})",
        webdriver_url
    )))
}

/// Handles errors that occur during navigation or page source retrieval
fn navigation_error(error: fantoccini::error::CmdError, context: &str, url: &str) -> Error {
    if error.to_string().contains("Unable to find session") {
        ::log::warn!("Lost session while {} {}", context, url);
    } else {
        ::log::error!("Failed {} {}: {}", context, url, error);
    }
    Error::WebDriver(format!("{} {}: {}", context, url, error))
}
