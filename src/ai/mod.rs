//! Classifier adapter: one trait, swappable model backends.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ClassificationResult;

pub mod client;
pub mod inference;
#[cfg(test)]
pub mod mock;
pub mod ollama;

pub use client::OpenAiClassifier;
pub use inference::ChatMessage;
pub use ollama::OllamaClassifier;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("model API returned HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed classifier output: {0}")]
    MalformedOutput(String),
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),
}

impl From<reqwest::Error> for ClassifierError {
    fn from(err: reqwest::Error) -> Self {
        ClassifierError::Transport(err.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ClassificationRequest<'a> {
    pub subject: &'a str,
    pub body: &'a str,
    pub sender: &'a str,
    /// Upstream identity validation vouches for the sender.
    pub system_validated: bool,
}

#[async_trait]
pub trait SpamClassifier: Send + Sync {
    fn provider(&self) -> &'static str;

    fn model(&self) -> &str;

    /// One chat-completion round trip returning the raw assistant text.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ClassifierError>;

    /// Always yields a well-formed verdict: unparseable output goes through the
    /// text fallback, and any failure to reach the model fails open.
    async fn analyze(&self, request: &ClassificationRequest<'_>) -> ClassificationResult {
        let messages = inference::build_messages(request);
        tracing::debug!(
            target: "classifier",
            provider = self.provider(),
            model = self.model(),
            system_validated = request.system_validated,
            "requesting spam classification"
        );

        match self.complete(&messages).await {
            Ok(raw) => {
                let result = inference::interpret_response(&raw);
                tracing::debug!(
                    target: "classifier",
                    is_spam = result.is_spam,
                    confidence = result.confidence,
                    "classification received"
                );
                result
            }
            Err(err) => {
                tracing::error!(
                    target: "classifier",
                    provider = self.provider(),
                    error = %err,
                    "classification failed, treating ticket as not spam"
                );
                ClassificationResult::not_spam(format!("Analysis failed: {err}"))
            }
        }
    }
}
