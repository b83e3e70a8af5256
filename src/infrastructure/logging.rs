use std::io;

use anyhow::Result;
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::{config::LoggingConfig, infrastructure::directories::ResolvedPaths};

const LOG_FILE_PREFIX: &str = "spam_filter.log";

static INIT: OnceCell<()> = OnceCell::new();
static GUARD: OnceCell<tracing_appender::non_blocking::WorkerGuard> = OnceCell::new();

/// Console plus a daily-rolling file. `RUST_LOG` overrides the configured level.
pub fn init_tracing(logging: &LoggingConfig, paths: &ResolvedPaths) -> Result<()> {
    INIT.get_or_try_init::<_, anyhow::Error>(|| {
        let env_filter = build_filter(std::env::var("RUST_LOG").ok().as_deref(), &logging.level);

        let file_appender = tracing_appender::rolling::daily(&paths.logs_dir, LOG_FILE_PREFIX);
        let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
        let _ = GUARD.set(guard);

        let console_layer = fmt::layer()
            .with_writer(io::stderr)
            .with_target(true)
            .with_ansi(true);

        let file_layer = fmt::layer()
            .with_writer(file_writer)
            .with_target(true)
            .with_ansi(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(console_layer)
            .with(file_layer)
            .try_init()?;

        tracing::info!(target: "app", logs = %paths.logs_dir.display(), level = %logging.level, "tracing initialized");
        Ok(())
    })?;
    Ok(())
}

/// First valid directive wins: `RUST_LOG`, then the configured level, then `info`.
fn build_filter(rust_log: Option<&str>, level: &str) -> EnvFilter {
    rust_log
        .into_iter()
        .chain([level])
        .find_map(|directive| EnvFilter::try_new(directive).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
