use super::{GENERATE_TIMEOUT, TextGenerator};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible chat completions backend
#[derive(Clone)]
pub struct OpenAiClient {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http_client = Client::builder().timeout(GENERATE_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        })
    }

    /// Set a custom base URL (for Azure, proxies, etc.)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl TextGenerator for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let start = std::time::Instant::now();
        let request = ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            ::log::warn!("OpenAI API error {}: {}", status, error_text);
            return Err(Error::Generate(format!("OpenAI API error {}: {}", status, error_text)));
        }

        let body: ChatResponse = response.json().await?;
        let content = first_choice_text(body)?;

        ::log::debug!(
            "OpenAI chat completion with {} took {} ms",
            self.model,
            start.elapsed().as_millis()
        );
        Ok(content)
    }

    fn name(&self) -> &str {
        "openai"
    }
}

/// Text of the first choice; a missing or blank message is an error
fn first_choice_text(body: ChatResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|content| !content.trim().is_empty())
        .ok_or_else(|| Error::Generate("No response from OpenAI".to_string()))
}
