use super::{GENERATE_TIMEOUT, TextGenerator};
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Google Gemini `generateContent` backend
#[derive(Clone)]
pub struct GeminiClient {
    http_client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http_client = Client::builder().timeout(GENERATE_TIMEOUT).build()?;
        Ok(Self {
            http_client,
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.to_string(),
        })
    }

    /// Set a custom base URL (for proxies or local emulators)
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self) -> String {
        let model = self.model.trim_start_matches("models/");
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let start = std::time::Instant::now();
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
        };

        ::log::debug!("Sending prompt to Gemini model {}", self.model);
        let response = self
            .http_client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            ::log::warn!("Gemini API error {}: {}", status, error_text);
            return Err(Error::Generate(format!("Gemini API error {}: {}", status, error_text)));
        }

        let body: GenerateResponse = response.json().await?;
        let text = candidate_text(body)?;

        ::log::debug!(
            "Received response from Gemini model {} in {} ms",
            self.model,
            start.elapsed().as_millis()
        );
        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Concatenated parts of all candidates; a blank result is an error
fn candidate_text(body: GenerateResponse) -> Result<String> {
    let text = body
        .candidates
        .into_iter()
        .filter_map(|candidate| candidate.content)
        .flat_map(|content| content.parts)
        .map(|part| part.text)
        .collect::<String>();

    if text.trim().is_empty() {
        return Err(Error::Generate("No response from Gemini".to_string()));
    }
    Ok(text)
}
