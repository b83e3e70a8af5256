use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ChatMessage, ClassifierError, SpamClassifier};
use crate::config::{ConfigError, OllamaConfig};

const READINESS_ATTEMPTS: u32 = 3;
const READINESS_DELAY: Duration = Duration::from_secs(2);

/// Local Ollama backend. The model is pulled on connect when missing.
pub struct OllamaClassifier {
    http: Client,
    base_url: Url,
    model: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    name: String,
}

#[derive(Debug, Serialize)]
struct PullRequest<'a> {
    model: &'a str,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    format: &'static str,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    top_p: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

impl OllamaClassifier {
    pub fn new(http: Client, config: OllamaConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&format!("{}/", config.host.trim_end_matches('/'))).map_err(
            |err| ConfigError::Invalid {
                key: "OLLAMA_HOST",
                reason: err.to_string(),
            },
        )?;
        Ok(Self {
            http,
            base_url,
            model: config.model,
        })
    }

    /// Builds the backend and makes sure the server answers and has the model.
    pub async fn connect(http: Client, config: OllamaConfig) -> anyhow::Result<Self> {
        let classifier = Self::new(http, config)?;
        let installed = classifier.wait_until_ready().await?;
        if !has_model(&installed, &classifier.model) {
            tracing::info!(target: "classifier", model = %classifier.model, "model not installed, pulling");
            classifier.pull_model().await?;
        }
        tracing::info!(target: "classifier", model = %classifier.model, host = %classifier.base_url, "Ollama backend ready");
        Ok(classifier)
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClassifierError> {
        self.base_url
            .join(path)
            .map_err(|err| ClassifierError::Transport(format!("invalid endpoint {path}: {err}")))
    }

    async fn list_models(&self) -> Result<Vec<String>, ClassifierError> {
        let response = self.http.get(self.endpoint("api/tags")?).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let tags: TagsResponse = response
            .json()
            .await
            .map_err(|err| ClassifierError::MalformedOutput(err.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn wait_until_ready(&self) -> Result<Vec<String>, ClassifierError> {
        let mut last_error = None;
        for attempt in 1..=READINESS_ATTEMPTS {
            match self.list_models().await {
                Ok(models) => return Ok(models),
                Err(err) => {
                    tracing::warn!(
                        target: "classifier",
                        attempt,
                        attempts = READINESS_ATTEMPTS,
                        error = %err,
                        "Ollama not reachable yet"
                    );
                    last_error = Some(err);
                    if attempt < READINESS_ATTEMPTS {
                        tokio::time::sleep(READINESS_DELAY).await;
                    }
                }
            }
        }
        Err(ClassifierError::ModelUnavailable(format!(
            "Ollama at {} did not respond after {READINESS_ATTEMPTS} attempts: {}",
            self.base_url,
            last_error.map(|e| e.to_string()).unwrap_or_default()
        )))
    }

    async fn pull_model(&self) -> Result<(), ClassifierError> {
        let response = self
            .http
            .post(self.endpoint("api/pull")?)
            .json(&PullRequest {
                model: &self.model,
                stream: false,
            })
            .send()
            .await?;
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::ModelUnavailable(format!(
                "pulling {} failed: {body}",
                self.model
            )));
        }
        tracing::info!(target: "classifier", model = %self.model, "model pulled");
        Ok(())
    }

    fn build_request<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            format: "json",
            options: ChatOptions {
                temperature: 0.1,
                top_p: 0.9,
            },
        }
    }
}

/// `llama3.2` matches an installed `llama3.2:latest`.
fn has_model(installed: &[String], wanted: &str) -> bool {
    let wanted_base = wanted.split(':').next().unwrap_or(wanted);
    installed.iter().any(|name| {
        name == wanted || name.split(':').next().unwrap_or(name) == wanted_base
    })
}

#[async_trait]
impl SpamClassifier for OllamaClassifier {
    fn provider(&self) -> &'static str {
        "Ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ClassifierError> {
        let response = self
            .http
            .post(self.endpoint("api/chat")?)
            .json(&self.build_request(messages))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|err| ClassifierError::MalformedOutput(err.to_string()))?;
        chat.message
            .map(|message| message.content)
            .ok_or_else(|| ClassifierError::MalformedOutput("response contained no message".into()))
    }
}
