// Notification gateway: delivers a text message to a chat address
//
// The production adapter talks to a WAHA (WhatsApp HTTP API) instance.

use crate::config::GatewayConfig;
use crate::errors::DispatchError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;

/// Outbound messaging contract consumed by the dispatch adapter
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    /// Send `text` to `destination_address`
    async fn send(&self, destination_address: &str, text: &str) -> Result<(), DispatchError>;

    /// Display name the messaging network knows for `chat_id`, if any
    async fn lookup_contact_name(&self, _chat_id: &str) -> Result<Option<String>, DispatchError> {
        Ok(None)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendTextRequest<'a> {
    session: &'a str,
    chat_id: &'a str,
    text: &'a str,
}

/// WAHA HTTP gateway
pub struct WahaGateway {
    client: Client,
    base_url: String,
    api_key: String,
    session: String,
}

impl WahaGateway {
    /// Create a new WahaGateway from configuration
    pub fn new(config: &GatewayConfig) -> Result<Self, DispatchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| DispatchError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            session: config.session.clone(),
        })
    }

    fn send_text_url(&self) -> String {
        format!("{}/api/sendText", self.base_url)
    }

    fn contacts_url(&self) -> String {
        format!("{}/api/contacts", self.base_url)
    }
}

/// Pull a display name out of a WAHA contact payload. Some versions wrap the
/// contact in `{status, data}`, others return it bare.
fn contact_name(payload: &serde_json::Value) -> Option<String> {
    let contact = payload.get("data").unwrap_or(payload);
    ["name", "pushname"]
        .iter()
        .filter_map(|key| contact.get(*key).and_then(serde_json::Value::as_str))
        .map(str::trim)
        .find(|name| !name.is_empty())
        .map(str::to_string)
}

#[async_trait]
impl NotificationGateway for WahaGateway {
    #[instrument(skip(self, text), fields(session = %self.session))]
    async fn send(&self, destination_address: &str, text: &str) -> Result<(), DispatchError> {
        let body = SendTextRequest {
            session: &self.session,
            chat_id: destination_address,
            text,
        };

        let mut request = self.client.post(self.send_text_url()).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected { status, body });
        }

        tracing::debug!(destination = destination_address, "Gateway accepted message");
        Ok(())
    }

    #[instrument(skip(self), fields(session = %self.session))]
    async fn lookup_contact_name(&self, chat_id: &str) -> Result<Option<String>, DispatchError> {
        let mut request = self
            .client
            .get(self.contacts_url())
            .query(&[("contactId", chat_id), ("session", self.session.as_str())]);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DispatchError::Rejected { status, body });
        }

        let payload: serde_json::Value = response.json().await?;
        if let Some(inner) = payload.get("status").and_then(serde_json::Value::as_u64) {
            if inner != 200 {
                return Err(DispatchError::Rejected {
                    status: inner as u16,
                    body: payload.to_string(),
                });
            }
        }

        Ok(contact_name(&payload))
    }
}
