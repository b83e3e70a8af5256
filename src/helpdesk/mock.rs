//! In-memory ticket source for tests.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{HelpdeskError, TicketFilter, TicketSource};
use crate::domain::{Conversation, Ticket, TicketUpdate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateStep {
    Assign,
    Tags,
    Status,
}

impl UpdateStep {
    fn of(update: &TicketUpdate) -> Option<Self> {
        if update.responder_id.is_some() {
            Some(UpdateStep::Assign)
        } else if update.tags.is_some() {
            Some(UpdateStep::Tags)
        } else if update.status.is_some() {
            Some(UpdateStep::Status)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceCall {
    Fetch {
        filter: TicketFilter,
        per_page: usize,
    },
    GetTicket(u64),
    GetConversations(u64),
    Update(u64, TicketUpdate),
    Note(u64, String),
}

#[derive(Default)]
struct State {
    tickets: BTreeMap<u64, Ticket>,
    conversations: HashMap<u64, Vec<Conversation>>,
    calls: Vec<SourceCall>,
    applied: Vec<(u64, UpdateStep)>,
    next_entry_id: u64,
    listing_error: Option<HelpdeskError>,
    ticket_errors: HashMap<u64, HelpdeskError>,
    conversation_errors: HashMap<u64, HelpdeskError>,
    update_errors: HashMap<UpdateStep, HelpdeskError>,
    note_error: Option<HelpdeskError>,
    yield_on_reads: bool,
}

#[derive(Clone, Default)]
pub struct MockTicketSource {
    state: Arc<Mutex<State>>,
}

impl MockTicketSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_ticket(&self, ticket: Ticket) {
        self.state.lock().tickets.insert(ticket.id, ticket);
    }

    pub fn set_conversations(&self, ticket_id: u64, entries: Vec<Conversation>) {
        self.state.lock().conversations.insert(ticket_id, entries);
    }

    pub fn fail_listing(&self, error: HelpdeskError) {
        self.state.lock().listing_error = Some(error);
    }

    pub fn fail_ticket(&self, ticket_id: u64, error: HelpdeskError) {
        self.state.lock().ticket_errors.insert(ticket_id, error);
    }

    pub fn fail_conversations(&self, ticket_id: u64, error: HelpdeskError) {
        self.state.lock().conversation_errors.insert(ticket_id, error);
    }

    pub fn fail_update(&self, step: UpdateStep, error: HelpdeskError) {
        self.state.lock().update_errors.insert(step, error);
    }

    /// Conversation reads hand control back to the runtime after reading,
    /// widening the gap between a check and the write that follows it.
    pub fn yield_on_reads(&self) {
        self.state.lock().yield_on_reads = true;
    }

    pub fn fail_notes(&self, error: HelpdeskError) {
        self.state.lock().note_error = Some(error);
    }

    pub fn ticket(&self, ticket_id: u64) -> Option<Ticket> {
        self.state.lock().tickets.get(&ticket_id).cloned()
    }

    pub fn calls(&self) -> Vec<SourceCall> {
        self.state.lock().calls.clone()
    }

    /// Updates that actually changed stored state, in order.
    pub fn update_steps(&self, ticket_id: u64) -> Vec<UpdateStep> {
        self.state
            .lock()
            .applied
            .iter()
            .filter(|(id, _)| *id == ticket_id)
            .map(|(_, step)| *step)
            .collect()
    }

    pub fn notes(&self, ticket_id: u64) -> Vec<String> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                SourceCall::Note(id, body) if *id == ticket_id => Some(body.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn mutation_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, SourceCall::Update(..) | SourceCall::Note(..)))
            .count()
    }
}

#[async_trait]
impl TicketSource for MockTicketSource {
    async fn fetch_tickets(
        &self,
        filter: TicketFilter,
        per_page: usize,
    ) -> Result<Vec<Ticket>, HelpdeskError> {
        let mut state = self.state.lock();
        state.calls.push(SourceCall::Fetch { filter, per_page });
        if let Some(err) = state.listing_error.clone() {
            return Err(err);
        }
        Ok(state
            .tickets
            .values()
            .rev()
            .take(per_page)
            .cloned()
            .collect())
    }

    async fn get_ticket(&self, ticket_id: u64) -> Result<Ticket, HelpdeskError> {
        let mut state = self.state.lock();
        state.calls.push(SourceCall::GetTicket(ticket_id));
        if let Some(err) = state.ticket_errors.get(&ticket_id) {
            return Err(err.clone());
        }
        state
            .tickets
            .get(&ticket_id)
            .cloned()
            .ok_or(HelpdeskError::NotFound(ticket_id))
    }

    async fn get_conversations(
        &self,
        ticket_id: u64,
    ) -> Result<Vec<Conversation>, HelpdeskError> {
        let (entries, pause) = {
            let mut state = self.state.lock();
            state.calls.push(SourceCall::GetConversations(ticket_id));
            if let Some(err) = state.conversation_errors.get(&ticket_id) {
                return Err(err.clone());
            }
            if !state.tickets.contains_key(&ticket_id) {
                return Err(HelpdeskError::NotFound(ticket_id));
            }
            let entries = state
                .conversations
                .get(&ticket_id)
                .cloned()
                .unwrap_or_default();
            (entries, state.yield_on_reads)
        };
        if pause {
            tokio::task::yield_now().await;
        }
        Ok(entries)
    }

    async fn apply_update(
        &self,
        ticket_id: u64,
        update: &TicketUpdate,
    ) -> Result<Ticket, HelpdeskError> {
        let mut state = self.state.lock();
        state.calls.push(SourceCall::Update(ticket_id, update.clone()));
        let step = UpdateStep::of(update);
        if let Some(err) = step.and_then(|step| state.update_errors.get(&step)) {
            return Err(err.clone());
        }
        let ticket = state
            .tickets
            .get_mut(&ticket_id)
            .ok_or(HelpdeskError::NotFound(ticket_id))?;
        update.apply_to(ticket);
        let updated = ticket.clone();
        if let Some(step) = step {
            state.applied.push((ticket_id, step));
        }
        Ok(updated)
    }

    async fn add_private_note(&self, ticket_id: u64, body: &str) -> Result<u64, HelpdeskError> {
        let mut state = self.state.lock();
        state.calls.push(SourceCall::Note(ticket_id, body.to_string()));
        if let Some(err) = state.note_error.clone() {
            return Err(err);
        }
        if !state.tickets.contains_key(&ticket_id) {
            return Err(HelpdeskError::NotFound(ticket_id));
        }
        state.next_entry_id += 1;
        let id = 9_000 + state.next_entry_id;
        state
            .conversations
            .entry(ticket_id)
            .or_default()
            .push(Conversation {
                id,
                body: Some(body.to_string()),
                body_text: Some(body.to_string()),
                private: true,
                incoming: false,
                user_id: None,
                created_at: None,
            });
        Ok(id)
    }
}
