//! Encrypted Flow data-exchange endpoint
//!
//! Drives one request through the full cycle:
//!
//! ```text
//! body ─▶ EncryptedEnvelope ─▶ decrypt ─▶ FlowRequest ─▶ FlowResponder
//!                                  │                          │
//!                              SessionKey ────────────▶ encrypt ─▶ base64 reply
//! ```
//!
//! The HTTP layer turns the returned error into a status code with
//! [`BridgeError::status_code`].

use crate::envelope::{encrypt_response, EncryptedEnvelope, FlowCodec};
use crate::error::{BridgeError, Result};
use crate::flow::{FlowRequest, FlowResponder};
use tracing::{debug, info};

/// Handler for `POST /flows/endpoint`
pub struct FlowEndpoint {
    codec: Option<FlowCodec>,
    responder: FlowResponder,
}

impl FlowEndpoint {
    /// Creates an endpoint. `codec` is `None` when no private key was
    /// configured; every request is then rejected with a configuration error.
    pub fn new(codec: Option<FlowCodec>, responder: FlowResponder) -> Self {
        Self { codec, responder }
    }

    /// Whether a private key is loaded
    pub fn has_key(&self) -> bool {
        self.codec.is_some()
    }

    /// Processes a raw request body, returning the base64 reply body
    pub async fn handle(&self, request_body: &[u8]) -> Result<String> {
        let codec = self
            .codec
            .as_ref()
            .ok_or_else(|| BridgeError::Config("PRIVATE_KEY_PEM not set".to_string()))?;

        let envelope: EncryptedEnvelope = serde_json::from_slice(request_body)
            .map_err(|e| BridgeError::InvalidRequest(format!("Malformed envelope: {}", e)))?;

        let (request, session): (FlowRequest, _) = codec.decrypt_request(&envelope)?;
        info!(
            action = request.action.as_deref().unwrap_or("<missing>"),
            "Flow request received"
        );

        let response = self.responder.respond(&request).await;
        let reply = encrypt_response(&response, session)?;

        debug!(reply_len = reply.len(), "Flow reply sealed");
        Ok(reply)
    }
}
