use async_trait::async_trait;

use super::{HelpdeskError, TicketFilter, TicketSource, SPAM_TAG};
use crate::domain::{Conversation, Ticket, TicketStatus, TicketUpdate};

/// Wraps a real source: reads go through, mutations are only logged and
/// answered with a locally synthesized ticket.
pub struct SimulatedTicketSource<S> {
    inner: S,
}

impl<S: TicketSource> SimulatedTicketSource<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    async fn current_or_placeholder(&self, ticket_id: u64) -> Ticket {
        match self.inner.get_ticket(ticket_id).await {
            Ok(ticket) => ticket,
            Err(err) => {
                tracing::warn!(
                    target: "helpdesk",
                    ticket_id,
                    error = %err,
                    "simulate: could not read ticket, synthesizing from scratch"
                );
                Ticket::placeholder(ticket_id)
            }
        }
    }
}

#[async_trait]
impl<S: TicketSource> TicketSource for SimulatedTicketSource<S> {
    async fn fetch_tickets(
        &self,
        filter: TicketFilter,
        per_page: usize,
    ) -> Result<Vec<Ticket>, HelpdeskError> {
        self.inner.fetch_tickets(filter, per_page).await
    }

    async fn get_ticket(&self, ticket_id: u64) -> Result<Ticket, HelpdeskError> {
        self.inner.get_ticket(ticket_id).await
    }

    async fn get_conversations(
        &self,
        ticket_id: u64,
    ) -> Result<Vec<Conversation>, HelpdeskError> {
        self.inner.get_conversations(ticket_id).await
    }

    async fn apply_update(
        &self,
        ticket_id: u64,
        update: &TicketUpdate,
    ) -> Result<Ticket, HelpdeskError> {
        tracing::info!(target: "helpdesk", ticket_id, ?update, "simulate: would update ticket");
        let mut ticket = self.current_or_placeholder(ticket_id).await;
        update.apply_to(&mut ticket);
        Ok(ticket)
    }

    async fn add_private_note(&self, ticket_id: u64, body: &str) -> Result<u64, HelpdeskError> {
        let preview: String = body.chars().take(100).collect();
        tracing::info!(
            target: "helpdesk",
            ticket_id,
            preview = %preview,
            "simulate: would add private note"
        );
        Ok(0)
    }

    async fn mark_as_spam(
        &self,
        ticket_id: u64,
        handling_agent: Option<u64>,
    ) -> Result<Ticket, HelpdeskError> {
        let mut ticket = self.current_or_placeholder(ticket_id).await;
        let mut update = TicketUpdate::replace_tags([SPAM_TAG]);
        update.status = Some(TicketStatus::SPAM);

        if let Some(agent_id) = handling_agent {
            if ticket.responder_id == Some(agent_id) {
                tracing::info!(target: "helpdesk", ticket_id, agent_id, "simulate: already assigned to spam agent");
            } else {
                tracing::info!(target: "helpdesk", ticket_id, agent_id, "simulate: would assign to spam agent");
            }
            update.responder_id = Some(agent_id);
        }
        tracing::info!(
            target: "helpdesk",
            ticket_id,
            tag = SPAM_TAG,
            status = %TicketStatus::SPAM,
            "simulate: would replace tags and close ticket"
        );

        update.apply_to(&mut ticket);
        Ok(ticket)
    }
}
