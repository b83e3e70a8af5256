//! Ticket source adapter: the helpdesk operations the processor relies on.
//!
//! Implementations only provide the raw REST calls; listing rules, customer
//! message extraction and the spam composite are shared provided methods so
//! every backend (and the simulate wrapper) behaves the same way.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{CustomerMessage, Conversation, Ticket, TicketStatus, TicketUpdate};

pub mod freshdesk;
#[cfg(test)]
pub mod mock;
pub mod simulate;
pub mod utils;

pub use freshdesk::FreshdeskClient;
pub use simulate::SimulatedTicketSource;

/// Largest page the ticketing API serves; bigger limits are capped silently.
pub const PAGE_SIZE_CEILING: usize = 100;
/// The only tag a ticket keeps once it has been handled as spam.
pub const SPAM_TAG: &str = "Auto-Spam-Detected";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HelpdeskError {
    #[error("helpdesk unavailable: {0}")]
    RemoteUnavailable(String),
    #[error("ticket {0} not found")]
    NotFound(u64),
    #[error("helpdesk rejected update of ticket {ticket_id} (HTTP {status}): {detail}")]
    Conflict {
        ticket_id: u64,
        status: u16,
        detail: String,
    },
    #[error("unexpected helpdesk response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketFilter {
    /// Server-side "new and my open" view.
    New,
    Any,
}

#[async_trait]
pub trait TicketSource: Send + Sync {
    /// One page of tickets, newest first.
    async fn fetch_tickets(
        &self,
        filter: TicketFilter,
        per_page: usize,
    ) -> Result<Vec<Ticket>, HelpdeskError>;

    async fn get_ticket(&self, ticket_id: u64) -> Result<Ticket, HelpdeskError>;

    /// Thread entries in chronological order.
    async fn get_conversations(&self, ticket_id: u64)
        -> Result<Vec<Conversation>, HelpdeskError>;

    async fn apply_update(
        &self,
        ticket_id: u64,
        update: &TicketUpdate,
    ) -> Result<Ticket, HelpdeskError>;

    /// Appends a private note and returns its id. Callers guard against duplicates.
    async fn add_private_note(&self, ticket_id: u64, body: &str) -> Result<u64, HelpdeskError>;

    async fn list_new_tickets(&self, limit: usize) -> Result<Vec<Ticket>, HelpdeskError> {
        let per_page = page_size(limit);
        let mut tickets = self.fetch_tickets(TicketFilter::New, per_page).await?;
        let fetched = tickets.len();
        tickets.retain(|ticket| ticket.status == TicketStatus::New);
        tickets.truncate(per_page);
        tracing::debug!(
            target: "helpdesk",
            fetched,
            kept = tickets.len(),
            "filtered ticket page down to new tickets"
        );
        Ok(tickets)
    }

    async fn list_unresolved_tickets(&self, limit: usize) -> Result<Vec<Ticket>, HelpdeskError> {
        let per_page = page_size(limit);
        let mut tickets = self.fetch_tickets(TicketFilter::Any, per_page).await?;
        tickets.retain(|ticket| ticket.status.is_unresolved());
        tickets.truncate(per_page);
        Ok(tickets)
    }

    async fn list_recent_tickets(&self, limit: usize) -> Result<Vec<Ticket>, HelpdeskError> {
        let per_page = page_size(limit);
        let mut tickets = self.fetch_tickets(TicketFilter::Any, per_page).await?;
        tickets.truncate(per_page);
        Ok(tickets)
    }

    async fn get_first_customer_message(
        &self,
        ticket_id: u64,
    ) -> Result<CustomerMessage, HelpdeskError> {
        let ticket = self.get_ticket(ticket_id).await?;
        let conversations = self.get_conversations(ticket_id).await?;
        let message = utils::build_customer_message(&ticket, &conversations);
        tracing::debug!(
            target: "helpdesk",
            ticket_id,
            entries = conversations.len(),
            source_message_id = message.source_message_id,
            "extracted first customer message"
        );
        Ok(message)
    }

    /// Assign (when needed), then replace tags with [`SPAM_TAG`], then close.
    ///
    /// A failing step aborts the rest, so the status never changes unless the
    /// assignment and tag steps went through. Every step is a check-then-set,
    /// which makes re-running the whole composite safe.
    async fn mark_as_spam(
        &self,
        ticket_id: u64,
        handling_agent: Option<u64>,
    ) -> Result<Ticket, HelpdeskError> {
        if let Some(agent_id) = handling_agent {
            let current = self.get_ticket(ticket_id).await?;
            if current.responder_id == Some(agent_id) {
                tracing::info!(
                    target: "helpdesk",
                    ticket_id,
                    agent_id,
                    "ticket already assigned to spam agent"
                );
            } else {
                tracing::info!(target: "helpdesk", ticket_id, agent_id, "assigning ticket to spam agent");
                self.apply_update(ticket_id, &TicketUpdate::assign(agent_id))
                    .await?;
            }
        }

        tracing::info!(target: "helpdesk", ticket_id, tag = SPAM_TAG, "replacing ticket tags");
        self.apply_update(ticket_id, &TicketUpdate::replace_tags([SPAM_TAG]))
            .await?;

        tracing::info!(target: "helpdesk", ticket_id, status = %TicketStatus::SPAM, "closing ticket as spam");
        let ticket = self
            .apply_update(ticket_id, &TicketUpdate::status(TicketStatus::SPAM))
            .await?;
        Ok(ticket)
    }
}

fn page_size(limit: usize) -> usize {
    limit.min(PAGE_SIZE_CEILING)
}
