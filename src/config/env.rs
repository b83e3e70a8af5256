use std::{net::SocketAddr, time::Duration};

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub helpdesk: HelpdeskConfig,
    pub classifier: ClassifierConfig,
    pub policy: PolicyConfig,
    pub polling: PollingConfig,
    pub simulate: bool,
    pub webhook: WebhookConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone)]
pub struct HelpdeskConfig {
    pub domain: String,
    pub api_key: String,
    pub spam_agent_id: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierProvider {
    OpenAi,
    Ollama,
}

impl ClassifierProvider {
    pub fn label(&self) -> &'static str {
        match self {
            ClassifierProvider::OpenAi => "OpenAI",
            ClassifierProvider::Ollama => "Ollama",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub provider: ClassifierProvider,
    pub openai: OpenAiConfig,
    pub ollama: OllamaConfig,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub host: String,
    pub model: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicyConfig {
    pub spam_threshold: f64,
    pub auto_close_threshold: f64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            spam_threshold: 0.7,
            auto_close_threshold: 0.75,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollingConfig {
    pub interval: Duration,
    pub max_tickets_per_batch: usize,
    pub new_tickets_only: bool,
}

#[derive(Debug, Clone)]
pub struct WebhookConfig {
    pub bind_addr: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}
