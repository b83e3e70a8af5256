use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use url::Url;

use super::{HelpdeskError, TicketFilter, TicketSource};
use crate::{
    config::{ConfigError, HelpdeskConfig},
    domain::{Conversation, Ticket, TicketUpdate},
};

/// Freshdesk ignores the password when the API key is the username.
const BASIC_AUTH_PASSWORD: &str = "X";
const NEW_TICKETS_VIEW: &str = "new_and_my_open";

/// Freshdesk REST v2 client.
pub struct FreshdeskClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

#[derive(Debug, Serialize)]
struct NoteRequest<'a> {
    body: &'a str,
    private: bool,
}

#[derive(Debug, Deserialize)]
struct NoteResponse {
    id: u64,
}

impl FreshdeskClient {
    pub fn new(http: Client, config: &HelpdeskConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            http,
            base_url: api_base_url(&config.domain)?,
            api_key: config.api_key.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, HelpdeskError> {
        self.base_url
            .join(path)
            .map_err(|err| HelpdeskError::RemoteUnavailable(format!("invalid endpoint {path}: {err}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .basic_auth(&self.api_key, Some(BASIC_AUTH_PASSWORD))
    }

    fn list_request(&self, filter: TicketFilter, per_page: usize) -> Result<RequestBuilder, HelpdeskError> {
        let mut query = vec![
            ("per_page", per_page.to_string()),
            ("include", "description".to_string()),
            ("order_by", "created_at".to_string()),
            ("order_type", "desc".to_string()),
        ];
        if filter == TicketFilter::New {
            query.push(("filter", NEW_TICKETS_VIEW.to_string()));
        }
        Ok(self
            .request(Method::GET, self.endpoint("tickets")?)
            .query(&query))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, HelpdeskError> {
        request
            .send()
            .await
            .map_err(|err| HelpdeskError::RemoteUnavailable(err.to_string()))
    }

    async fn decode<T: DeserializeOwned>(
        response: Response,
        ticket_id: Option<u64>,
        write: bool,
    ) -> Result<T, HelpdeskError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(map_status(status, ticket_id, write, body));
        }
        response
            .json::<T>()
            .await
            .map_err(|err| HelpdeskError::InvalidResponse(err.to_string()))
    }
}

#[async_trait]
impl TicketSource for FreshdeskClient {
    async fn fetch_tickets(
        &self,
        filter: TicketFilter,
        per_page: usize,
    ) -> Result<Vec<Ticket>, HelpdeskError> {
        tracing::info!(target: "helpdesk", ?filter, per_page, "fetching tickets from Freshdesk");
        let response = self.send(self.list_request(filter, per_page)?).await?;
        let tickets: Vec<Ticket> = Self::decode(response, None, false).await?;
        tracing::info!(target: "helpdesk", count = tickets.len(), "fetched tickets");
        Ok(tickets)
    }

    async fn get_ticket(&self, ticket_id: u64) -> Result<Ticket, HelpdeskError> {
        let url = self.endpoint(&format!("tickets/{ticket_id}"))?;
        let response = self
            .send(
                self.request(Method::GET, url.clone())
                    .query(&[("include", "description")]),
            )
            .await?;

        if response.status() == StatusCode::BAD_REQUEST {
            tracing::info!(
                target: "helpdesk",
                ticket_id,
                "include=description rejected with 400, retrying without it"
            );
            let retry = self.send(self.request(Method::GET, url)).await?;
            return Self::decode(retry, Some(ticket_id), false).await;
        }
        Self::decode(response, Some(ticket_id), false).await
    }

    async fn get_conversations(
        &self,
        ticket_id: u64,
    ) -> Result<Vec<Conversation>, HelpdeskError> {
        let url = self.endpoint(&format!("tickets/{ticket_id}/conversations"))?;
        let response = self.send(self.request(Method::GET, url)).await?;
        let conversations: Vec<Conversation> =
            Self::decode(response, Some(ticket_id), false).await?;
        tracing::debug!(target: "helpdesk", ticket_id, count = conversations.len(), "fetched conversations");
        Ok(conversations)
    }

    async fn apply_update(
        &self,
        ticket_id: u64,
        update: &TicketUpdate,
    ) -> Result<Ticket, HelpdeskError> {
        if update.is_empty() {
            return self.get_ticket(ticket_id).await;
        }
        let url = self.endpoint(&format!("tickets/{ticket_id}"))?;
        tracing::debug!(target: "helpdesk", ticket_id, ?update, "updating ticket");
        let response = self
            .send(self.request(Method::PUT, url).json(update))
            .await?;
        let ticket: Ticket = Self::decode(response, Some(ticket_id), true)
            .await
            .inspect_err(|err| {
                tracing::error!(target: "helpdesk", ticket_id, error = %err, "ticket update failed");
            })?;
        tracing::info!(target: "helpdesk", ticket_id, "ticket updated");
        Ok(ticket)
    }

    async fn add_private_note(&self, ticket_id: u64, body: &str) -> Result<u64, HelpdeskError> {
        let url = self.endpoint(&format!("tickets/{ticket_id}/notes"))?;
        tracing::info!(target: "helpdesk", ticket_id, "adding private note");
        let response = self
            .send(self.request(Method::POST, url).json(&NoteRequest {
                body,
                private: true,
            }))
            .await?;
        let note: NoteResponse = Self::decode(response, Some(ticket_id), true).await?;
        Ok(note.id)
    }
}

/// `acme.freshdesk.com` and `https://acme.freshdesk.com/` both become
/// `https://acme.freshdesk.com/api/v2/`.
fn api_base_url(domain: &str) -> Result<Url, ConfigError> {
    let domain = domain.trim().trim_end_matches('/');
    let with_scheme = if domain.starts_with("http") {
        domain.to_string()
    } else {
        format!("https://{domain}")
    };
    let url = Url::parse(&format!("{with_scheme}/api/v2/")).map_err(|err| ConfigError::Invalid {
        key: "FRESHDESK_DOMAIN",
        reason: err.to_string(),
    })?;
    if url.host_str().is_none() {
        return Err(ConfigError::Invalid {
            key: "FRESHDESK_DOMAIN",
            reason: format!("'{domain}' has no host"),
        });
    }
    Ok(url)
}

fn map_status(status: StatusCode, ticket_id: Option<u64>, write: bool, body: String) -> HelpdeskError {
    match (status, ticket_id) {
        (StatusCode::NOT_FOUND, Some(id)) => HelpdeskError::NotFound(id),
        (StatusCode::BAD_REQUEST | StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY, Some(id))
            if write =>
        {
            HelpdeskError::Conflict {
                ticket_id: id,
                status: status.as_u16(),
                detail: body,
            }
        }
        _ => HelpdeskError::RemoteUnavailable(format!("HTTP {status}: {body}")),
    }
}
