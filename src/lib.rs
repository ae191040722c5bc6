//! Flow Bridge - webhook bridge for encrypted messaging-platform Flows
//!
//! This library provides the pieces of the bridge service, including:
//! - RSA private key loading from PEM or base64-wrapped PEM
//! - The hybrid RSA-OAEP / AES-GCM envelope codec for Flow data exchange
//! - Flow action dispatch and the delivery area directory
//! - The messaging webhook and outbound Graph API client
//! - The hyper HTTP server tying them together

pub mod areas;
pub mod config;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod flow;
pub mod keys;
pub mod messenger;
pub mod server;
pub mod webhook;

pub use envelope::{encrypt_response, EncryptedEnvelope, FlowCodec, SessionKey};
pub use error::{BridgeError, Result};
