//! Language-model backends used by the comparison engine.

pub mod gemini;
pub mod openai;

use crate::config::AnalyzerConfig;
use crate::error::Result;
use async_trait::async_trait;
use std::time::Duration;

pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

/// Upper bound for a single generation request
pub const GENERATE_TIMEOUT: Duration = Duration::from_secs(120);

/// Anything that turns a prompt into text
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Complete a prompt (returns raw text response)
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Backend name used in logs
    fn name(&self) -> &str;
}

/// The collaborator handed to the comparison engine
pub enum Analyzer {
    /// A configured backend
    Available(Box<dyn TextGenerator>),
    /// No usable backend, with the reason shown in reports
    Unavailable { reason: String },
}

impl Analyzer {
    pub fn available<G: TextGenerator + 'static>(generator: G) -> Self {
        Analyzer::Available(Box::new(generator))
    }

    pub fn unavailable(reason: impl Into<String>) -> Self {
        Analyzer::Unavailable {
            reason: reason.into(),
        }
    }

    /// Build the configured backend; missing credentials make it unavailable
    pub fn from_config(config: &AnalyzerConfig) -> Self {
        let built = match config {
            AnalyzerConfig::Gemini { model, api_key_env } => {
                read_key(api_key_env)
                    .and_then(|key| GeminiClient::new(key, model).map(Analyzer::available))
            }
            AnalyzerConfig::OpenAi {
                model,
                base_url,
                api_key_env,
            } => read_key(api_key_env).and_then(|key| {
                OpenAiClient::new(key, model)
                    .map(|client| Analyzer::available(client.with_base_url(base_url)))
            }),
            AnalyzerConfig::Disabled => return Analyzer::unavailable("Analyzer disabled in configuration"),
        };

        match built {
            Ok(analyzer) => analyzer,
            Err(e) => {
                ::log::error!("Failed to initialize analyzer: {}", e);
                Analyzer::unavailable(e.to_string())
            }
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Analyzer::Available(_))
    }
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Analyzer::Available(generator) => f
                .debug_tuple("Available")
                .field(&generator.name())
                .finish(),
            Analyzer::Unavailable { reason } => f
                .debug_struct("Unavailable")
                .field("reason", reason)
                .finish(),
        }
    }
}

fn read_key(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(crate::error::Error::Config(format!("{} not set", var))),
    }
}
