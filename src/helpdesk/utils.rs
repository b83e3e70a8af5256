use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{Conversation, CustomerMessage, Ticket};

static HTML_TAG_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[^<]+?>").expect("valid html tag regex"));

/// Marker every automatic spam note starts with, whichever model wrote it.
pub const SPAM_ALERT_MARKER: &str = "Automatic Spam Detection Alert";

pub fn strip_html(text: &str) -> String {
    if text.contains('<') {
        HTML_TAG_REGEX.replace_all(text, "").into_owned()
    } else {
        text.to_string()
    }
}

/// Earliest public, customer-authored entry of a thread.
pub fn first_customer_entry(conversations: &[Conversation]) -> Option<&Conversation> {
    conversations.iter().find(|entry| entry.is_customer_message())
}

pub fn build_customer_message(ticket: &Ticket, conversations: &[Conversation]) -> CustomerMessage {
    let sender = ticket
        .requester_id
        .map(|id| id.to_string())
        .unwrap_or_default();

    match first_customer_entry(conversations) {
        Some(entry) => CustomerMessage {
            ticket_id: ticket.id,
            subject: ticket.subject.clone(),
            body: strip_html(entry.text()),
            sender,
            created_at: entry.created_at,
            source_message_id: Some(entry.id),
        },
        None => CustomerMessage {
            ticket_id: ticket.id,
            subject: ticket.subject.clone(),
            body: strip_html(ticket_description(ticket)),
            sender,
            created_at: ticket.created_at,
            source_message_id: None,
        },
    }
}

pub fn ticket_description(ticket: &Ticket) -> &str {
    ticket
        .description_text
        .as_deref()
        .filter(|text| !text.is_empty())
        .or(ticket.description.as_deref())
        .unwrap_or("")
}

pub fn has_spam_alert_note(conversations: &[Conversation]) -> bool {
    conversations
        .iter()
        .any(|entry| entry.private && entry.text().contains(SPAM_ALERT_MARKER))
}
