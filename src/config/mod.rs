pub mod env;
mod loader;

pub use env::{
    AppConfig, ClassifierProvider, ConfigError, DirectoryConfig, HelpdeskConfig, LoggingConfig,
    OllamaConfig, OpenAiConfig, PolicyConfig,
};
pub use loader::load_config;
