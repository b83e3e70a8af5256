use std::{env, net::SocketAddr, str::FromStr, time::Duration};

use super::env::{
    AppConfig, ClassifierConfig, ClassifierProvider, ConfigError, DirectoryConfig,
    HelpdeskConfig, LoggingConfig, OllamaConfig, OpenAiConfig, PolicyConfig, PollingConfig,
    WebhookConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let helpdesk = HelpdeskConfig {
            domain: get("FRESHDESK_DOMAIN").ok_or(ConfigError::Missing("FRESHDESK_DOMAIN"))?,
            api_key: get("FRESHDESK_API_KEY").ok_or(ConfigError::Missing("FRESHDESK_API_KEY"))?,
            spam_agent_id: parse_opt(&get, "SPAM_AGENT_ID")?,
        };

        let provider = match get("CLASSIFIER_PROVIDER")
            .map(|v| v.to_ascii_lowercase())
            .as_deref()
        {
            None | Some("openai") => ClassifierProvider::OpenAi,
            Some("ollama") => ClassifierProvider::Ollama,
            Some(other) => {
                return Err(ConfigError::Invalid {
                    key: "CLASSIFIER_PROVIDER",
                    reason: format!("unknown provider '{other}' (expected openai or ollama)"),
                })
            }
        };

        let openai = OpenAiConfig {
            api_key: get("OPENAI_API_KEY"),
            model: get("OPENAI_MODEL_NAME").unwrap_or_else(|| "gpt-3.5-turbo".to_string()),
            base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        };
        if provider == ClassifierProvider::OpenAi && openai.api_key.is_none() {
            return Err(ConfigError::Missing("OPENAI_API_KEY"));
        }

        let ollama = OllamaConfig {
            host: get("OLLAMA_HOST").unwrap_or_else(|| "http://localhost:11434".to_string()),
            model: get("OLLAMA_MODEL").unwrap_or_else(|| "llama3.2".to_string()),
        };

        let defaults = PolicyConfig::default();
        let policy = PolicyConfig {
            spam_threshold: parse_or(&get, "SPAM_THRESHOLD", defaults.spam_threshold)?,
            auto_close_threshold: parse_or(
                &get,
                "AUTO_CLOSE_SPAM_THRESHOLD",
                defaults.auto_close_threshold,
            )?,
        };
        validate_policy(&policy)?;

        let interval_minutes: u64 = parse_or(&get, "CHECK_INTERVAL_MINUTES", 5)?;
        if interval_minutes == 0 {
            return Err(ConfigError::Invalid {
                key: "CHECK_INTERVAL_MINUTES",
                reason: "must be greater than zero".into(),
            });
        }
        let interval_secs = interval_minutes
            .checked_mul(60)
            .ok_or_else(|| ConfigError::Invalid {
                key: "CHECK_INTERVAL_MINUTES",
                reason: format!("{interval_minutes} minutes does not fit in a duration"),
            })?;
        let max_tickets_per_batch: usize = parse_or(&get, "MAX_TICKETS_PER_BATCH", 50)?;
        if max_tickets_per_batch == 0 {
            return Err(ConfigError::Invalid {
                key: "MAX_TICKETS_PER_BATCH",
                reason: "must be greater than zero".into(),
            });
        }
        let polling = PollingConfig {
            interval: Duration::from_secs(interval_secs),
            max_tickets_per_batch,
            new_tickets_only: parse_bool(&get, "PROCESS_NEW_TICKETS_ONLY", true)?,
        };

        let webhook = WebhookConfig {
            bind_addr: parse_or(
                &get,
                "WEBHOOK_BIND_ADDR",
                SocketAddr::from(([0, 0, 0, 0], 8080)),
            )?,
        };

        let directories = DirectoryConfig {
            logs_dir: get("LOGS_DIR").unwrap_or_else(|| "logs".to_string()),
        };

        let logging = LoggingConfig {
            level: get("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        };

        Ok(Self {
            helpdesk,
            classifier: ClassifierConfig {
                provider,
                openai,
                ollama,
            },
            policy,
            polling,
            simulate: parse_bool(&get, "DRY_RUN_MODE", false)?,
            webhook,
            directories,
            logging,
        })
    }

    /// Model name of whichever classifier provider is active.
    pub fn classifier_model(&self) -> &str {
        match self.classifier.provider {
            ClassifierProvider::OpenAi => &self.classifier.openai.model,
            ClassifierProvider::Ollama => &self.classifier.ollama.model,
        }
    }
}

fn validate_policy(policy: &PolicyConfig) -> Result<(), ConfigError> {
    for (key, value) in [
        ("SPAM_THRESHOLD", policy.spam_threshold),
        ("AUTO_CLOSE_SPAM_THRESHOLD", policy.auto_close_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Invalid {
                key,
                reason: format!("{value} is outside [0, 1]"),
            });
        }
    }
    if policy.auto_close_threshold < policy.spam_threshold {
        return Err(ConfigError::Invalid {
            key: "AUTO_CLOSE_SPAM_THRESHOLD",
            reason: format!(
                "{} is below SPAM_THRESHOLD {}",
                policy.auto_close_threshold, policy.spam_threshold
            ),
        });
    }
    Ok(())
}

fn parse_opt<G, T>(get: &G, key: &'static str) -> Result<Option<T>, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    get(key)
        .map(|value| {
            value.parse::<T>().map_err(|err| ConfigError::Invalid {
                key,
                reason: err.to_string(),
            })
        })
        .transpose()
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(get, key)?.unwrap_or(default))
}

fn parse_bool<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            key,
            reason: format!("'{other}' is not a boolean"),
        }),
    }
}
