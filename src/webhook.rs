//! Event-driven surface: one ticket per inbound helpdesk webhook call.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    domain::{ActionTaken, TicketEvent},
    infrastructure::shutdown::ShutdownListener,
    tasks::{EventError, TicketProcessor},
};

#[derive(Debug, Clone, PartialEq)]
pub struct EventResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl EventResponse {
    fn error(status: StatusCode, message: &str) -> Self {
        Self {
            status,
            body: json!({ "error": message }),
        }
    }
}

impl IntoResponse for EventResponse {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub fn router(processor: Arc<TicketProcessor>) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/webhook/ticket", post(ticket_webhook))
        .with_state(processor)
}

async fn ticket_webhook(
    State(processor): State<Arc<TicketProcessor>>,
    body: Bytes,
) -> EventResponse {
    handle_payload(&processor, &body).await
}

/// Shared by the HTTP route and the `event` command.
pub async fn handle_payload(processor: &TicketProcessor, raw: &[u8]) -> EventResponse {
    let payload: Value = match serde_json::from_slice(raw) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(target: "webhook", error = %err, "request body is not JSON");
            return EventResponse::error(StatusCode::BAD_REQUEST, "Invalid JSON in request body");
        }
    };

    let event = match payload.get("ticket").filter(|ticket| ticket.is_object()) {
        Some(ticket) => match TicketEvent::deserialize(ticket) {
            Ok(event) => event,
            Err(err) => {
                tracing::warn!(target: "webhook", error = %err, "ticket object has unexpected shape");
                return EventResponse::error(StatusCode::BAD_REQUEST, "Invalid ticket data in payload");
            }
        },
        None => {
            tracing::warn!(target: "webhook", "payload has no ticket object");
            return EventResponse::error(StatusCode::BAD_REQUEST, "Invalid ticket data in payload");
        }
    };

    let Some(ticket_id) = event.id else {
        tracing::warn!(target: "webhook", "ticket payload without id");
        return EventResponse::error(StatusCode::BAD_REQUEST, "Ticket ID missing in payload");
    };

    tracing::info!(target: "webhook", ticket_id, "ticket event received");
    match processor.process_event(event).await {
        Ok(analysis) => EventResponse {
            status: StatusCode::OK,
            body: json!({
                "message": "Ticket processed successfully",
                "ticket_id": ticket_id,
                "analysis": analysis,
            }),
        },
        Err(EventError::MissingTicketId) => {
            EventResponse::error(StatusCode::BAD_REQUEST, "Ticket ID missing in payload")
        }
        Err(err) => {
            tracing::error!(target: "webhook", ticket_id, error = %err, "ticket event failed");
            EventResponse {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                body: json!({
                    "error": err.to_string(),
                    "ticket_id": ticket_id,
                    "action_taken": ActionTaken::Error,
                }),
            }
        }
    }
}

pub async fn serve(
    processor: Arc<TicketProcessor>,
    addr: SocketAddr,
    shutdown: ShutdownListener,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind webhook listener on {addr}"))?;
    tracing::info!(target: "webhook", %addr, "webhook server listening");

    axum::serve(listener, router(processor))
        .with_graceful_shutdown(shutdown.wait())
        .await
        .context("webhook server failed")?;
    tracing::info!(target: "webhook", "webhook server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{self, Body},
        http::Request,
    };
    use tower::ServiceExt as _;

    use super::*;
    use crate::{
        ai::mock::ScriptedClassifier,
        config::PolicyConfig,
        domain::{Ticket, TicketStatus},
        helpdesk::{mock::MockTicketSource, HelpdeskError},
        tasks::ProcessorSettings,
    };

    const BODY_LIMIT: usize = 64 * 1024;

    fn processor(source: &MockTicketSource, classifier: ScriptedClassifier) -> Arc<TicketProcessor> {
        Arc::new(TicketProcessor::new(
            Arc::new(source.clone()),
            Arc::new(classifier),
            ProcessorSettings {
                policy: PolicyConfig::default(),
                max_tickets_per_batch: 50,
                new_tickets_only: true,
                spam_agent_id: None,
            },
        ))
    }

    async fn post(app: Router, payload: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri("/webhook/ticket")
            .header("content-type", "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = body::to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let app = router(processor(&MockTicketSource::new(), ScriptedClassifier::verdict(false, 0.0)));
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = body::to_bytes(response.into_body(), BODY_LIMIT).await.unwrap();
        assert_eq!(&bytes[..], b"OK");
    }

    #[tokio::test]
    async fn malformed_payloads_are_rejected() {
        let app = router(processor(&MockTicketSource::new(), ScriptedClassifier::verdict(false, 0.0)));

        let (status, body) = post(app.clone(), "not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid JSON in request body");

        let (status, body) = post(app.clone(), r#"{"ticket": "nope"}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid ticket data in payload");

        let (status, body) = post(app, r#"{"ticket": {"subject": "hi"}}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Ticket ID missing in payload");
    }

    #[tokio::test]
    async fn legitimate_ticket_is_reported() {
        let source = MockTicketSource::new();
        let app = router(processor(&source, ScriptedClassifier::verdict(false, 0.1)));

        let (status, body) = post(
            app,
            r#"{"ticket": {"id": 12, "subject": "Invoice", "description_text": "Where is my invoice?", "email": "a@b.c"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Ticket processed successfully");
        assert_eq!(body["ticket_id"], 12);
        assert_eq!(body["analysis"]["is_spam"], false);
        assert_eq!(body["analysis"]["action_taken"], "marked_legitimate");
        assert_eq!(source.mutation_count(), 0);
    }

    #[tokio::test]
    async fn string_ticket_id_from_automation_rule_is_accepted() {
        let source = MockTicketSource::new();
        let app = router(processor(&source, ScriptedClassifier::verdict(false, 0.1)));

        let (status, body) = post(
            app,
            r#"{"ticket": {"id": "12", "subject": "Invoice", "description_text": "Where is my invoice?"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticket_id"], 12);
    }

    #[tokio::test]
    async fn spam_ticket_is_closed() {
        let source = MockTicketSource::new();
        source.insert_ticket(Ticket::placeholder(100));
        let app = router(processor(&source, ScriptedClassifier::verdict(true, 0.92)));

        let (status, body) = post(
            app,
            r#"{"ticket": {"id": 100, "subject": "Prize", "description": "<p>Win a free iPhone</p>"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["analysis"]["action_taken"], "handled_as_spam");
        assert_eq!(source.ticket(100).unwrap().status, TicketStatus::Closed);
    }

    #[tokio::test]
    async fn helpdesk_failure_is_a_structured_500() {
        let source = MockTicketSource::new();
        source.insert_ticket(Ticket::placeholder(100));
        source.fail_conversations(100, HelpdeskError::RemoteUnavailable("reset".into()));
        let app = router(processor(&source, ScriptedClassifier::verdict(true, 0.92)));

        let (status, body) = post(
            app,
            r#"{"ticket": {"id": 100, "description_text": "Win a free iPhone"}}"#,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["ticket_id"], 100);
        assert_eq!(body["action_taken"], "error");
        assert!(body["error"].as_str().unwrap().contains("reset"));
    }
}
