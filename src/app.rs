use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde_json::json;
use tokio::{io::AsyncReadExt, time::timeout};

use crate::{
    ai::{OllamaClassifier, OpenAiClassifier, SpamClassifier},
    config::{AppConfig, ClassifierProvider},
    helpdesk::{FreshdeskClient, SimulatedTicketSource, TicketSource},
    infrastructure::shutdown::Shutdown,
    tasks::{scheduler::configure_poll_job, ProcessorSettings, TicketProcessor},
    webhook,
};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SpamGuardApp {
    config: Arc<AppConfig>,
    processor: Arc<TicketProcessor>,
    shutdown: Shutdown,
}

impl SpamGuardApp {
    pub async fn initialize(config: AppConfig, shutdown: Shutdown) -> Result<Self> {
        log_banner(&config);

        let http = Client::builder()
            .user_agent(format!("helpdesk-spam-guard/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let freshdesk = FreshdeskClient::new(http.clone(), &config.helpdesk)?;
        let source: Arc<dyn TicketSource> = if config.simulate {
            tracing::warn!(target: "app", "simulate mode: no ticket will be modified");
            Arc::new(SimulatedTicketSource::new(freshdesk))
        } else {
            Arc::new(freshdesk)
        };

        let classifier: Arc<dyn SpamClassifier> = match config.classifier.provider {
            ClassifierProvider::OpenAi => Arc::new(OpenAiClassifier::new(
                http,
                config.classifier.openai.clone(),
            )?),
            ClassifierProvider::Ollama => Arc::new(
                OllamaClassifier::connect(http, config.classifier.ollama.clone())
                    .await
                    .context("Ollama classifier is not available")?,
            ),
        };

        let processor = Arc::new(TicketProcessor::new(
            source,
            classifier,
            ProcessorSettings::from_config(&config),
        ));

        Ok(Self {
            config: Arc::new(config),
            processor,
            shutdown,
        })
    }

    /// Initial cycle right away, then one per interval until shutdown.
    pub async fn run_watch(self) -> Result<()> {
        let mut shutdown_listener = self.shutdown.subscribe();
        let interval = self.config.polling.interval;
        tracing::info!(
            target: "app",
            interval_minutes = interval.as_secs() / 60,
            "starting continuous ticket monitoring"
        );

        tokio::select! {
            result = self.processor.run_cycle(None) => match result {
                Ok(stats) => tracing::info!(target: "app", %stats, "initial cycle finished"),
                Err(err) => tracing::error!(target: "app", error = %err, "initial cycle failed"),
            },
            _ = shutdown_listener.notified() => {
                tracing::info!(target: "app", "shutdown requested during initial cycle");
                return Ok(());
            }
        }

        let mut scheduler = configure_poll_job(interval, self.processor.clone()).await?;
        shutdown_listener.notified().await;
        tracing::info!(target: "app", "stopping poll scheduler");

        match timeout(SHUTDOWN_TIMEOUT, scheduler.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => tracing::error!(target: "scheduler", error = %err, "scheduler shutdown failed"),
            Err(_) => tracing::warn!(
                target: "scheduler",
                "scheduler did not stop within {:?}",
                SHUTDOWN_TIMEOUT
            ),
        }
        tracing::info!(target: "app", "spam guard stopped");
        Ok(())
    }

    /// One batch cycle; statistics and the spam overview go to stdout as JSON.
    pub async fn run_once(self, limit: Option<usize>) -> Result<()> {
        let stats = self
            .processor
            .run_cycle(limit)
            .await
            .context("batch cycle failed")?;

        let overview = match self.processor.spam_overview().await {
            Ok(overview) => Some(overview),
            Err(err) => {
                tracing::warn!(target: "app", error = %err, "could not compute spam overview");
                None
            }
        };

        let report = json!({
            "statistics": stats,
            "overview": overview,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }

    pub async fn serve(self, bind: Option<SocketAddr>) -> Result<()> {
        let addr = bind.unwrap_or(self.config.webhook.bind_addr);
        webhook::serve(self.processor.clone(), addr, self.shutdown.subscribe()).await
    }

    /// Processes one webhook payload read from `path` (`-` = stdin).
    pub async fn run_event(self, path: &Path) -> Result<()> {
        let raw = if path == Path::new("-") {
            let mut buffer = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buffer)
                .await
                .context("failed to read event payload from stdin")?;
            buffer
        } else {
            tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read event payload {}", path.display()))?
        };

        let response = webhook::handle_payload(&self.processor, &raw).await;
        println!("{}", serde_json::to_string_pretty(&response.body)?);
        if !response.status.is_success() {
            bail!("ticket event was not processed (HTTP {})", response.status);
        }
        Ok(())
    }
}

fn log_banner(config: &AppConfig) {
    tracing::info!(
        target: "app",
        version = env!("CARGO_PKG_VERSION"),
        helpdesk = %config.helpdesk.domain,
        provider = config.classifier.provider.label(),
        model = config.classifier_model(),
        spam_threshold = config.policy.spam_threshold,
        auto_close_threshold = config.policy.auto_close_threshold,
        interval_minutes = config.polling.interval.as_secs() / 60,
        max_tickets_per_batch = config.polling.max_tickets_per_batch,
        new_tickets_only = config.polling.new_tickets_only,
        spam_agent_id = ?config.helpdesk.spam_agent_id,
        simulate = config.simulate,
        "helpdesk spam guard configured"
    );
}
