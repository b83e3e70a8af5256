use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use crate::{
    ai::{ClassificationRequest, SpamClassifier},
    config::{AppConfig, PolicyConfig},
    domain::{
        ActionTaken, AnalysisOutcome, ClassificationResult, CustomerMessage, CycleStatistics,
        SpamOverview, TicketEvent,
    },
    helpdesk::{
        utils::{has_spam_alert_note, SPAM_ALERT_MARKER},
        HelpdeskError, TicketSource, PAGE_SIZE_CEILING, SPAM_TAG,
    },
    tasks::processed::ProcessedTicketSet,
};

/// Phrase an upstream system puts into tickets whose requester it already verified.
pub const SYSTEM_VALIDATED_PHRASE: &str = "USER INFORMATION WAS VALIDATED BY OUR SYSTEM";

#[derive(Debug, Error)]
pub enum EventError {
    #[error("Ticket ID missing in payload")]
    MissingTicketId,
    #[error(transparent)]
    Helpdesk(#[from] HelpdeskError),
}

#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub policy: PolicyConfig,
    pub max_tickets_per_batch: usize,
    pub new_tickets_only: bool,
    pub spam_agent_id: Option<u64>,
}

impl ProcessorSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            policy: config.policy,
            max_tickets_per_batch: config.polling.max_tickets_per_batch,
            new_tickets_only: config.polling.new_tickets_only,
            spam_agent_id: config.helpdesk.spam_agent_id,
        }
    }
}

pub struct TicketProcessor {
    source: Arc<dyn TicketSource>,
    classifier: Arc<dyn SpamClassifier>,
    settings: ProcessorSettings,
    processed: ProcessedTicketSet,
    cycle_lock: Mutex<()>,
}

impl TicketProcessor {
    pub fn new(
        source: Arc<dyn TicketSource>,
        classifier: Arc<dyn SpamClassifier>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            source,
            classifier,
            settings,
            processed: ProcessedTicketSet::new(),
            cycle_lock: Mutex::new(()),
        }
    }

    /// One batch pass. `Err` only when the ticket listing itself failed; every
    /// per-ticket failure is counted in `errors` and the batch carries on.
    pub async fn run_cycle(&self, limit: Option<usize>) -> Result<CycleStatistics, HelpdeskError> {
        let _cycle = self.cycle_lock.lock().await;
        let limit = limit.unwrap_or(self.settings.max_tickets_per_batch);

        let listing = if self.settings.new_tickets_only {
            tracing::info!(target: "processor", limit, "fetching new tickets for spam analysis");
            self.source.list_new_tickets(limit).await
        } else {
            tracing::info!(target: "processor", limit, "fetching unresolved tickets for spam analysis");
            self.source.list_unresolved_tickets(limit).await
        };
        let tickets = listing.inspect_err(|err| {
            tracing::error!(target: "processor", error = %err, "could not list tickets, cycle aborted");
        })?;
        tracing::info!(target: "processor", count = tickets.len(), "tickets to analyze");

        let mut stats = CycleStatistics::default();
        for ticket in tickets {
            if self.processed.contains(ticket.id) {
                tracing::debug!(target: "processor", ticket_id = ticket.id, "already processed, skipping");
                stats.skipped_already_processed += 1;
                continue;
            }

            match self.process_ticket(ticket.id).await {
                Ok(outcome) => {
                    stats.total_processed += 1;
                    if outcome.is_spam {
                        stats.spam_detected += 1;
                    } else {
                        stats.legitimate += 1;
                    }
                }
                Err(err) => {
                    tracing::error!(target: "processor", ticket_id = ticket.id, error = %err, "ticket processing failed");
                    stats.errors += 1;
                }
            }
        }

        tracing::info!(target: "processor", %stats, "cycle complete");
        Ok(stats)
    }

    async fn process_ticket(&self, ticket_id: u64) -> Result<AnalysisOutcome, HelpdeskError> {
        let message = self.source.get_first_customer_message(ticket_id).await?;
        self.evaluate(message).await
    }

    /// Single-ticket entry point for payloads delivered by the caller. Shares the
    /// cycle lock so the duplicate-note check cannot race another delivery.
    pub async fn process_event(&self, event: TicketEvent) -> Result<AnalysisOutcome, EventError> {
        let ticket_id = event.id.ok_or(EventError::MissingTicketId)?;
        let _cycle = self.cycle_lock.lock().await;
        tracing::info!(target: "processor", ticket_id, "processing ticket event");
        let message = event.into_customer_message(ticket_id);
        Ok(self.evaluate(message).await?)
    }

    /// Classifies and records the ticket as processed before any spam action,
    /// so a failing action is reported once and not re-classified every cycle.

    async fn evaluate(&self, message: CustomerMessage) -> Result<AnalysisOutcome, HelpdeskError> {
        let ticket_id = message.ticket_id;
        let system_validated = is_system_validated(&message.body);
        if system_validated {
            tracing::info!(target: "processor", ticket_id, "system validation phrase present, flagging for classifier");
        }

        let classification = self
            .classifier
            .analyze(&ClassificationRequest {
                subject: &message.subject,
                body: &message.body,
                sender: &message.sender,
                system_validated,
            })
            .await;
        self.processed.insert(ticket_id);

        let is_spam = self.decide(&classification);
        let action_taken = if is_spam {
            tracing::info!(
                target: "processor",
                ticket_id,
                confidence = classification.confidence,
                reasoning = %classification.reasoning,
                "spam detected"
            );
            self.handle_spam(ticket_id, &classification).await?;
            ActionTaken::HandledAsSpam
        } else {
            tracing::debug!(target: "processor", ticket_id, confidence = classification.confidence, "legitimate ticket");
            ActionTaken::MarkedLegitimate
        };

        Ok(AnalysisOutcome {
            ticket_id,
            subject: message.subject,
            is_spam,
            confidence: classification.confidence,
            reasoning: classification.reasoning_with_indicators(),
            action_taken,
        })
    }

    pub fn decide(&self, classification: &ClassificationResult) -> bool {
        is_spam_verdict(classification, self.settings.policy.spam_threshold)
    }

    async fn handle_spam(
        &self,
        ticket_id: u64,
        classification: &ClassificationResult,
    ) -> Result<(), HelpdeskError> {
        let confidence = classification.confidence;
        let auto_close = confidence >= self.settings.policy.auto_close_threshold;

        let conversations = self.source.get_conversations(ticket_id).await?;
        if has_spam_alert_note(&conversations) {
            tracing::info!(target: "processor", ticket_id, "spam alert note already present, not adding another");
            if auto_close {
                self.close_as_spam(ticket_id, confidence).await?;
            }
            return Ok(());
        }

        let note = self.spam_note(classification);
        let note_id = self.source.add_private_note(ticket_id, &note).await?;
        tracing::info!(target: "processor", ticket_id, note_id, "spam alert note added");

        if auto_close {
            self.close_as_spam(ticket_id, confidence).await?;
        } else {
            tracing::info!(
                target: "processor",
                ticket_id,
                confidence,
                auto_close_threshold = self.settings.policy.auto_close_threshold,
                "below auto-close threshold, left open for manual review"
            );
        }
        Ok(())
    }

    async fn close_as_spam(&self, ticket_id: u64, confidence: f64) -> Result<(), HelpdeskError> {
        tracing::info!(
            target: "processor",
            ticket_id,
            confidence,
            auto_close_threshold = self.settings.policy.auto_close_threshold,
            "auto-closing spam ticket"
        );
        let ticket = self
            .source
            .mark_as_spam(ticket_id, self.settings.spam_agent_id)
            .await?;
        tracing::info!(target: "processor", ticket_id, status = %ticket.status, "ticket closed as spam");
        Ok(())
    }

    fn spam_note(&self, classification: &ClassificationResult) -> String {
        let mut lines = vec![
            format!("{SPAM_ALERT_MARKER} ({})", self.classifier.provider()),
            format!("Model: {}", self.classifier.model()),
            format!("Confidence Score: {:.2}", classification.confidence),
            format!("Analysis: {}", classification.reasoning),
        ];
        if !classification.indicators.is_empty() {
            lines.push(format!("Indicators: {}", classification.indicators.join(", ")));
        }
        lines.push(String::new());
        lines.push("This ticket was automatically processed based on the AI analysis.".into());
        lines.push(format!(
            "Threshold for action was: {}",
            self.settings.policy.spam_threshold
        ));
        lines.join("\n")
    }

    /// Spam tags across the most recent page of tickets.
    pub async fn spam_overview(&self) -> Result<SpamOverview, HelpdeskError> {
        let tickets = self.source.list_recent_tickets(PAGE_SIZE_CEILING).await?;
        let mut overview = SpamOverview {
            total_tickets_checked: tickets.len(),
            processed_this_session: self.processed.len(),
            ..SpamOverview::default()
        };
        for ticket in &tickets {
            let auto = ticket.has_tag_ignore_case(SPAM_TAG);
            if auto || ticket.has_tag_ignore_case("spam") {
                overview.spam_tagged_tickets += 1;
            }
            if auto {
                overview.auto_detected_spam += 1;
            }
        }
        Ok(overview)
    }
}

/// The model's own verdict and the configured threshold must both agree.
pub fn is_spam_verdict(classification: &ClassificationResult, spam_threshold: f64) -> bool {
    classification.is_spam && classification.confidence >= spam_threshold
}

pub fn is_system_validated(body: &str) -> bool {
    body.to_lowercase()
        .contains(&SYSTEM_VALIDATED_PHRASE.to_lowercase())
}
