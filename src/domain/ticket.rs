use std::{collections::BTreeSet, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Freshdesk status codes. Unknown codes survive a round trip through `Other`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "i64", into = "i64")]
pub enum TicketStatus {
    #[default]
    New,
    Pending,
    Resolved,
    Closed,
    Other(i64),
}

impl TicketStatus {
    /// Status a ticket ends up in once it has been handled as spam.
    pub const SPAM: TicketStatus = TicketStatus::Closed;

    pub fn code(self) -> i64 {
        match self {
            TicketStatus::New => 2,
            TicketStatus::Pending => 3,
            TicketStatus::Resolved => 4,
            TicketStatus::Closed => 5,
            TicketStatus::Other(code) => code,
        }
    }

    pub fn is_unresolved(self) -> bool {
        matches!(self, TicketStatus::New | TicketStatus::Pending)
    }
}

impl From<i64> for TicketStatus {
    fn from(code: i64) -> Self {
        match code {
            2 => TicketStatus::New,
            3 => TicketStatus::Pending,
            4 => TicketStatus::Resolved,
            5 => TicketStatus::Closed,
            other => TicketStatus::Other(other),
        }
    }
}

impl From<TicketStatus> for i64 {
    fn from(status: TicketStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::New => write!(f, "new"),
            TicketStatus::Pending => write!(f, "pending"),
            TicketStatus::Resolved => write!(f, "resolved"),
            TicketStatus::Closed => write!(f, "closed"),
            TicketStatus::Other(code) => write!(f, "status-{code}"),
        }
    }
}

/// A helpdesk ticket as returned by the ticketing API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: u64,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_text: Option<String>,
    #[serde(default)]
    pub status: TicketStatus,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub responder_id: Option<u64>,
    #[serde(default)]
    pub requester_id: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Minimal ticket used when a simulated update cannot read the real one.
    pub fn placeholder(id: u64) -> Self {
        Self {
            id,
            subject: String::new(),
            description: None,
            description_text: None,
            status: TicketStatus::New,
            tags: BTreeSet::new(),
            responder_id: None,
            requester_id: None,
            created_at: None,
        }
    }

    pub fn has_tag_ignore_case(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }
}

/// One entry of a ticket thread: a reply or a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub body_text: Option<String>,
    #[serde(default)]
    pub private: bool,
    /// Missing means incoming; only an explicit `false` marks an agent reply.
    #[serde(default = "default_incoming")]
    pub incoming: bool,
    #[serde(default)]
    pub user_id: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_incoming() -> bool {
    true
}

impl Conversation {
    pub fn text(&self) -> &str {
        self.body_text
            .as_deref()
            .filter(|text| !text.is_empty())
            .or(self.body.as_deref())
            .unwrap_or("")
    }

    pub fn is_customer_message(&self) -> bool {
        !self.private && self.incoming
    }
}

/// First genuine customer message of a ticket, HTML already stripped.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CustomerMessage {
    pub ticket_id: u64,
    pub subject: String,
    pub body: String,
    pub sender: String,
    pub created_at: Option<DateTime<Utc>>,
    /// `None` when the ticket description was used instead of a thread entry.
    pub source_message_id: Option<u64>,
}

/// Ticket object carried by a webhook or event-file payload.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TicketEvent {
    /// Automation rules template `{{ticket.id}}` into a string, so both forms are read.
    #[serde(default, deserialize_with = "id_from_number_or_string")]
    pub id: Option<u64>,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub description_text: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub requester_id: Option<u64>,
}

fn id_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(u64),
        Text(String),
    }

    match Option::<RawId>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawId::Number(id)) => Ok(Some(id)),
        Some(RawId::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(RawId::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("ticket id '{text}' is not a number"))),
    }
}

impl TicketEvent {
    pub fn into_customer_message(self, ticket_id: u64) -> CustomerMessage {
        let sender = match (self.email, self.requester_id) {
            (Some(email), _) if !email.is_empty() => email,
            (_, Some(id)) => id.to_string(),
            _ => String::new(),
        };
        let body = match self.description_text.filter(|text| !text.is_empty()) {
            Some(text) => text,
            None => crate::helpdesk::utils::strip_html(self.description.as_deref().unwrap_or("")),
        };
        CustomerMessage {
            ticket_id,
            subject: self.subject,
            body,
            sender,
            created_at: None,
            source_message_id: None,
        }
    }
}

/// Partial ticket update; absent fields are left untouched remotely.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TicketUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responder_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TicketStatus>,
}

impl TicketUpdate {
    pub fn assign(responder_id: u64) -> Self {
        Self {
            responder_id: Some(responder_id),
            ..Self::default()
        }
    }

    pub fn replace_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: Some(tags.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn status(status: TicketStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.responder_id.is_none() && self.tags.is_none() && self.status.is_none()
    }

    /// Applies the update locally, the way the remote would.
    pub fn apply_to(&self, ticket: &mut Ticket) {
        if let Some(responder_id) = self.responder_id {
            ticket.responder_id = Some(responder_id);
        }
        if let Some(tags) = &self.tags {
            ticket.tags = tags.clone();
        }
        if let Some(status) = self.status {
            ticket.status = status;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_round_trip_through_json() {
        let statuses: Vec<TicketStatus> = serde_json::from_str("[2, 3, 4, 5, 7]").unwrap();
        assert_eq!(
            statuses,
            vec![
                TicketStatus::New,
                TicketStatus::Pending,
                TicketStatus::Resolved,
                TicketStatus::Closed,
                TicketStatus::Other(7),
            ]
        );
        assert_eq!(serde_json::to_string(&TicketStatus::SPAM).unwrap(), "5");
    }

    #[test]
    fn decodes_freshdesk_ticket_payload() {
        let raw = r#"{
            "id": 100,
            "subject": "Win a prize",
            "description": "<div>Click <b>here</b></div>",
            "description_text": "Click here",
            "status": 2,
            "priority": 1,
            "tags": ["promo"],
            "responder_id": null,
            "requester_id": 42,
            "created_at": "2024-01-01T10:00:00Z"
        }"#;
        let ticket: Ticket = serde_json::from_str(raw).unwrap();
        assert_eq!(ticket.id, 100);
        assert_eq!(ticket.status, TicketStatus::New);
        assert!(ticket.tags.contains("promo"));
        assert_eq!(ticket.requester_id, Some(42));
        assert!(ticket.responder_id.is_none());
    }

    #[test]
    fn conversation_without_incoming_flag_counts_as_customer() {
        let entry: Conversation =
            serde_json::from_str(r#"{"id": 1, "body": "<p>hi</p>"}"#).unwrap();
        assert!(entry.incoming);
        assert!(entry.is_customer_message());
        assert_eq!(entry.text(), "<p>hi</p>");
    }

    #[test]
    fn event_id_accepts_templated_strings() {
        let id = |raw: &str| serde_json::from_str::<TicketEvent>(raw).map(|event| event.id);
        assert_eq!(id(r#"{"id": 12}"#).unwrap(), Some(12));
        assert_eq!(id(r#"{"id": "12"}"#).unwrap(), Some(12));
        assert_eq!(id(r#"{"id": " 12 "}"#).unwrap(), Some(12));
        assert_eq!(id(r#"{"id": null}"#).unwrap(), None);
        assert_eq!(id(r#"{"id": ""}"#).unwrap(), None);
        assert_eq!(id("{}").unwrap(), None);
        assert!(id(r#"{"id": "{{ticket.id}}"}"#).is_err());
    }

    #[test]
    fn event_prefers_plain_text_and_email() {
        let event: TicketEvent = serde_json::from_str(
            r#"{"id": 5, "subject": "Hi", "description": "<p>Hello</p>", "email": "a@b.c", "requester_id": 9}"#,
        )
        .unwrap();
        let message = event.into_customer_message(5);
        assert_eq!(message.body, "Hello");
        assert_eq!(message.sender, "a@b.c");

        let event: TicketEvent = serde_json::from_str(
            r#"{"subject": "Hi", "description_text": "plain", "requester_id": 9}"#,
        )
        .unwrap();
        assert!(event.id.is_none());
        let message = event.into_customer_message(1);
        assert_eq!(message.body, "plain");
        assert_eq!(message.sender, "9");
    }

    #[test]
    fn update_serializes_only_present_fields() {
        let update = TicketUpdate::replace_tags(["Auto-Spam-Detected"]);
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json, serde_json::json!({ "tags": ["Auto-Spam-Detected"] }));

        let mut ticket = Ticket::placeholder(9);
        ticket.tags.insert("billing".into());
        update.apply_to(&mut ticket);
        assert_eq!(ticket.tags.len(), 1);
        assert!(ticket.has_tag_ignore_case("auto-spam-detected"));
    }
}
