//! Service configuration
//!
//! Read once at startup from the process environment. Everything that varies
//! per deployment lives here; nothing is re-read per request.
//!
//! | Variable                   | Default                      |
//! |----------------------------|------------------------------|
//! | `PORT`                     | `5000`                       |
//! | `PRIVATE_KEY_PEM`          | -                            |
//! | `PRIVATE_KEY_PEM_B64`      | -                            |
//! | `MY_API_SECRET_KEY`        | - (webhook verify token)     |
//! | `WHATSAPP_ACCESS_TOKEN`    | -                            |
//! | `WHATSAPP_PHONE_NUMBER_ID` | -                            |
//! | `WHATSAPP_FLOW_ID`         | -                            |
//! | `WHATSAPP_FLOW_NAME`       | `ADDRESS_FLOW`               |
//! | `WHATSAPP_FLOW_CTA`        | `Order Now`                  |
//! | `WHATSAPP_API_VERSION`     | `v19.0`                      |
//! | `WHATSAPP_GRAPH_URL`       | `https://graph.facebook.com` |
//! | `FLOW_TRIGGER_TEXT`        | `hi`                         |
//! | `WEBHOOK_AUTO_REPLY`       | `false`                      |
//! | `AREAS_URL`                | - (built-in areas only)      |
//! | `AREAS_TIMEOUT_MS`         | `5000`                       |
//! | `LOG_LEVEL`                | `info`                       |

use crate::areas::DEFAULT_LOOKUP_TIMEOUT_MS;
use crate::error::Result;
use crate::keys::resolve_pem;
use crate::webhook::DEFAULT_TRIGGER_TEXT;
use std::time::Duration;
use tracing::Level;

/// Default HTTP port
pub const HTTP_PORT: u16 = 5000;

pub const DEFAULT_FLOW_NAME: &str = "ADDRESS_FLOW";
pub const DEFAULT_FLOW_CTA: &str = "Order Now";
pub const DEFAULT_API_VERSION: &str = "v19.0";
pub const DEFAULT_GRAPH_URL: &str = "https://graph.facebook.com";

/// Outbound messaging settings
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    pub access_token: String,
    pub phone_number_id: String,
    pub flow_id: String,
    pub flow_name: String,
    pub flow_cta: String,
    pub api_version: String,
    pub graph_url: String,
}

/// Configuration for the bridge service
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// HTTP listen port
    pub port: u16,
    /// Plaintext PEM private key
    pub private_key_pem: Option<String>,
    /// Base64-encoded PEM private key, used when the plaintext form is absent
    pub private_key_pem_b64: Option<String>,
    /// Token expected in the webhook verification handshake
    pub verify_token: Option<String>,
    /// Present only when token, phone number id and flow id are all set
    pub messenger: Option<MessengerConfig>,
    /// Inbound text that triggers a Flow send
    pub trigger_text: String,
    /// Echo non-trigger texts back to the sender
    pub auto_reply: bool,
    /// Downstream delivery area lookup
    pub areas_url: Option<String>,
    pub areas_timeout: Duration,
    pub log_level: Level,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            port: HTTP_PORT,
            private_key_pem: None,
            private_key_pem_b64: None,
            verify_token: None,
            messenger: None,
            trigger_text: DEFAULT_TRIGGER_TEXT.to_string(),
            auto_reply: false,
            areas_url: None,
            areas_timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
            log_level: Level::INFO,
        }
    }
}

impl BridgeConfig {
    /// Loads configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let messenger = match (
            get("WHATSAPP_ACCESS_TOKEN"),
            get("WHATSAPP_PHONE_NUMBER_ID"),
            get("WHATSAPP_FLOW_ID"),
        ) {
            (Some(access_token), Some(phone_number_id), Some(flow_id)) => Some(MessengerConfig {
                access_token,
                phone_number_id,
                flow_id,
                flow_name: get("WHATSAPP_FLOW_NAME").unwrap_or_else(|| DEFAULT_FLOW_NAME.to_string()),
                flow_cta: get("WHATSAPP_FLOW_CTA").unwrap_or_else(|| DEFAULT_FLOW_CTA.to_string()),
                api_version: get("WHATSAPP_API_VERSION")
                    .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
                graph_url: get("WHATSAPP_GRAPH_URL").unwrap_or_else(|| DEFAULT_GRAPH_URL.to_string()),
            }),
            _ => None,
        };

        let defaults = Self::default();
        Self {
            port: get("PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            private_key_pem: get("PRIVATE_KEY_PEM"),
            private_key_pem_b64: get("PRIVATE_KEY_PEM_B64"),
            verify_token: get("MY_API_SECRET_KEY"),
            messenger,
            trigger_text: get("FLOW_TRIGGER_TEXT").unwrap_or(defaults.trigger_text),
            auto_reply: get("WEBHOOK_AUTO_REPLY")
                .map(|v| parse_flag(&v))
                .unwrap_or(defaults.auto_reply),
            areas_url: get("AREAS_URL"),
            areas_timeout: get("AREAS_TIMEOUT_MS")
                .and_then(|v| v.trim().parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.areas_timeout),
            log_level: get("LOG_LEVEL")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.log_level),
        }
    }

    /// Whether any key source is configured
    pub fn has_key_source(&self) -> bool {
        self.private_key_pem.is_some() || self.private_key_pem_b64.is_some()
    }

    /// Resolves the configured key sources to PEM text
    pub fn private_key_pem(&self) -> Result<String> {
        resolve_pem(
            self.private_key_pem.as_deref(),
            self.private_key_pem_b64.as_deref(),
        )
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
