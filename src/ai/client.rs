use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use super::{ChatMessage, ClassifierError, SpamClassifier};
use crate::config::{ConfigError, OpenAiConfig};

/// OpenAI-compatible chat-completions backend.
#[derive(Clone)]
pub struct OpenAiClassifier {
    http: Client,
    endpoint: Url,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiClassifier {
    pub fn new(http: Client, config: OpenAiConfig) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let base = format!("{}/", config.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&base)
            .and_then(|base| base.join("chat/completions"))
            .map_err(|err| ConfigError::Invalid {
                key: "OPENAI_BASE_URL",
                reason: err.to_string(),
            })?;

        Ok(Self {
            http,
            endpoint,
            api_key,
            model: config.model,
        })
    }

    fn build_request<'a>(&'a self, messages: &'a [ChatMessage]) -> ChatCompletionRequest<'a> {
        ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.2,
            max_tokens: 1024,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        }
    }
}

#[async_trait]
impl SpamClassifier for OpenAiClassifier {
    fn provider(&self) -> &'static str {
        "OpenAI"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, ClassifierError> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
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

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|err| ClassifierError::MalformedOutput(err.to_string()))?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .ok_or_else(|| ClassifierError::MalformedOutput("response contained no message content".into()))
    }
}
