//! Outbound messaging API client
//!
//! Sends messages through the platform's Graph API:
//! `POST {graph_url}/{api_version}/{phone_number_id}/messages` with a bearer
//! token.

use crate::config::MessengerConfig;
use crate::error::{BridgeError, Result};
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info};

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Graph API client for one business phone number
#[derive(Clone)]
pub struct GraphClient {
    client: Client,
    config: MessengerConfig,
}

impl GraphClient {
    pub fn new(config: MessengerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    /// URL messages are posted to
    pub fn messages_url(&self) -> String {
        format!(
            "{}/{}/{}/messages",
            self.config.graph_url.trim_end_matches('/'),
            self.config.api_version,
            self.config.phone_number_id
        )
    }

    /// Sends the configured Flow as an interactive message
    pub async fn send_flow(&self, to: &str) -> Result<()> {
        info!(to = %to, flow_name = %self.config.flow_name, "Sending flow message");
        self.post(flow_message(to, &self.config)).await
    }

    /// Sends a plain text message
    pub async fn send_text(&self, to: &str, body: &str) -> Result<()> {
        info!(to = %to, "Sending text message");
        self.post(text_message(to, body)).await
    }

    async fn post(&self, payload: Value) -> Result<()> {
        let response = self
            .client
            .post(self.messages_url())
            .bearer_auth(&self.config.access_token)
            .json(&payload)
            .send()
            .await
            .map_err(|e| BridgeError::Messaging(format!("Send failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(BridgeError::Messaging(format!("{}: {}", status, message)));
        }

        debug!(status = %status, "Message accepted");
        Ok(())
    }
}

/// Interactive Flow message payload
pub fn flow_message(to: &str, config: &MessengerConfig) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "interactive",
        "interactive": {
            "type": "flow",
            "flow": {
                "name": config.flow_name,
                "flow_id": config.flow_id,
                "flow_cta": config.flow_cta
            }
        }
    })
}

/// Plain text message payload
pub fn text_message(to: &str, body: &str) -> Value {
    json!({
        "messaging_product": "whatsapp",
        "to": to,
        "type": "text",
        "text": { "body": body }
    })
}
