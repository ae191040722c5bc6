//! Messaging webhook: verification handshake and inbound notifications
//!
//! The platform subscribes a webhook with a GET carrying `hub.mode`,
//! `hub.verify_token` and `hub.challenge`, then POSTs notifications. The
//! POST side must always answer 200, so parse and send failures are only
//! logged.
//!
//! A text matching the trigger gets the Flow message. With auto-reply
//! enabled, any other text is echoed back as a plain text message.

use crate::messenger::GraphClient;
use serde::Deserialize;
use tracing::{debug, info, warn};

/// Default inbound text that triggers a Flow send
pub const DEFAULT_TRIGGER_TEXT: &str = "hi";

/// Body of the auto-reply sent for non-trigger texts
pub fn auto_reply_text(received: &str) -> String {
    format!("Auto-reply: I received -> {}", received)
}

#[derive(Debug, Default, Deserialize)]
struct Notification {
    #[serde(default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Default, Deserialize)]
struct Entry {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Debug, Default, Deserialize)]
struct Change {
    #[serde(default)]
    value: ChangeValue,
}

#[derive(Debug, Default, Deserialize)]
struct ChangeValue {
    #[serde(default)]
    messages: Option<Vec<InboundMessage>>,
}

/// A message delivered to the business number
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<TextBody>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TextBody {
    pub body: String,
}

impl InboundMessage {
    /// Trimmed text body, `None` for non-text messages
    pub fn text(&self) -> Option<&str> {
        if self.kind != "text" {
            return None;
        }
        self.text.as_ref().map(|t| t.body.trim())
    }
}

/// Extracts the messages from a notification body.
///
/// Status updates and test events carry no `messages` and yield an empty list.
pub fn parse_messages(body: &[u8]) -> Result<Vec<InboundMessage>, serde_json::Error> {
    let notification: Notification = serde_json::from_slice(body)?;
    Ok(notification
        .entry
        .into_iter()
        .flat_map(|e| e.changes)
        .filter_map(|c| c.value.messages)
        .flatten()
        .collect())
}

/// Webhook handler
pub struct WebhookHandler {
    verify_token: Option<String>,
    trigger_text: String,
    auto_reply: bool,
    messenger: Option<GraphClient>,
}

impl WebhookHandler {
    pub fn new(
        verify_token: Option<String>,
        trigger_text: impl Into<String>,
        auto_reply: bool,
        messenger: Option<GraphClient>,
    ) -> Self {
        Self {
            verify_token,
            trigger_text: trigger_text.into().trim().to_lowercase(),
            auto_reply,
            messenger,
        }
    }

    /// Answers the subscription handshake.
    ///
    /// Returns the challenge to echo back, or `None` when the request must be
    /// refused. A handler without a configured token refuses everything.
    pub fn verify(&self, query: &str) -> Option<String> {
        let mut mode = None;
        let mut token = None;
        let mut challenge = None;
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "hub.mode" => mode = Some(value.into_owned()),
                "hub.verify_token" => token = Some(value.into_owned()),
                "hub.challenge" => challenge = Some(value.into_owned()),
                _ => {}
            }
        }

        let expected = self.verify_token.as_deref()?;
        if mode.as_deref() == Some("subscribe") && token.as_deref() == Some(expected) {
            info!("Webhook verified");
            Some(challenge.unwrap_or_default())
        } else {
            warn!(mode = ?mode, "Webhook verification refused");
            None
        }
    }

    /// Handles a notification. Returns how many outbound messages were sent.
    pub async fn handle_notification(&self, body: &[u8]) -> usize {
        let messages = match parse_messages(body) {
            Ok(messages) => messages,
            Err(e) => {
                warn!(error = %e, "Unparseable webhook notification");
                return 0;
            }
        };

        if messages.is_empty() {
            debug!("Notification without messages (status update or test event)");
            return 0;
        }

        let mut sent = 0;
        for message in &messages {
            let Some(text) = message.text() else {
                debug!(kind = %message.kind, "Ignoring non-text message");
                continue;
            };
            info!(from = %message.from, "Text message received");

            let is_trigger = text.to_lowercase() == self.trigger_text;
            if !is_trigger && !self.auto_reply {
                continue;
            }

            let Some(messenger) = &self.messenger else {
                warn!("Messenger not configured, nothing sent");
                continue;
            };
            let result = if is_trigger {
                messenger.send_flow(&message.from).await
            } else {
                messenger.send_text(&message.from, &auto_reply_text(text)).await
            };
            match result {
                Ok(()) => sent += 1,
                Err(e) => warn!(from = %message.from, error = %e, "Failed to send reply"),
            }
        }
        sent
    }
}
