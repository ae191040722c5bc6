//! Flow payloads and action dispatch
//!
//! After an envelope is opened, the `action` field of the payload decides
//! which response gets sealed:
//!
//! - `ping`: liveness check, answered with `{"status": "active"}`
//! - `INIT` / `data_exchange`: screen data, the delivery area dropdown
//! - anything else: the same active status, logged as unhandled

use crate::areas::{AreaDirectory, DropdownOption};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Response schema version expected by the platform
pub const FLOW_RESPONSE_VERSION: &str = "3.0";

/// Decrypted Flow request payload
///
/// Built from any JSON value. Fields of an unexpected type are dropped
/// rather than failing the request, so a payload that decrypts always gets
/// a reply. A numeric `version` is kept as its text form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value")]
pub struct FlowRequest {
    pub version: Option<String>,
    pub action: Option<String>,
    pub screen: Option<String>,
    pub data: Option<Value>,
    pub flow_token: Option<String>,
}

impl From<Value> for FlowRequest {
    fn from(value: Value) -> Self {
        let Value::Object(mut fields) = value else {
            return Self::default();
        };
        let mut text = |name: &str| match fields.remove(name) {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };

        let action = text("action");
        let screen = text("screen");
        let flow_token = text("flow_token");
        let version = match fields.remove("version") {
            Some(Value::String(s)) => Some(s),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let data = fields.remove("data").filter(|d| !d.is_null());

        Self {
            version,
            action,
            screen,
            data,
            flow_token,
        }
    }
}

/// Known Flow actions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowAction {
    Ping,
    Init,
    DataExchange,
    Unhandled(Option<String>),
}

impl FlowAction {
    pub fn parse(action: Option<&str>) -> Self {
        match action.map(str::trim) {
            Some(a) if a.eq_ignore_ascii_case("ping") => FlowAction::Ping,
            Some(a) if a.eq_ignore_ascii_case("init") => FlowAction::Init,
            Some(a) if a.eq_ignore_ascii_case("data_exchange") => FlowAction::DataExchange,
            other => FlowAction::Unhandled(other.map(str::to_string)),
        }
    }
}

/// Response payload sealed back to the platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResponse {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen: Option<String>,
    pub data: Value,
}

impl FlowResponse {
    /// `{"version":"3.0","data":{"status":"active"}}`
    pub fn active() -> Self {
        Self {
            version: FLOW_RESPONSE_VERSION.to_string(),
            screen: None,
            data: serde_json::json!({ "status": "active" }),
        }
    }

    pub fn delivery_areas(screen: Option<String>, areas: Vec<DropdownOption>) -> Self {
        Self {
            version: FLOW_RESPONSE_VERSION.to_string(),
            screen,
            data: serde_json::json!({ "delivery_areas": areas }),
        }
    }
}

/// Business logic behind the encrypted endpoint
#[derive(Clone)]
pub struct FlowResponder {
    areas: AreaDirectory,
}

impl FlowResponder {
    pub fn new(areas: AreaDirectory) -> Self {
        Self { areas }
    }

    /// Builds the response for a decrypted request. Never fails: unknown
    /// actions get the active status.
    pub async fn respond(&self, request: &FlowRequest) -> FlowResponse {
        let action = FlowAction::parse(request.action.as_deref());
        debug!(action = ?action, screen = ?request.screen, "Dispatching flow action");

        match action {
            FlowAction::Ping => FlowResponse::active(),
            FlowAction::Init | FlowAction::DataExchange => {
                let areas = self.areas.dropdown().await;
                FlowResponse::delivery_areas(request.screen.clone(), areas)
            }
            FlowAction::Unhandled(action) => {
                warn!(
                    action = action.as_deref().unwrap_or("<missing>"),
                    screen = request.screen.as_deref().unwrap_or("<none>"),
                    "Unhandled flow action, answering with active status"
                );
                FlowResponse::active()
            }
        }
    }
}
