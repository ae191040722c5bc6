//! Delivery area directory
//!
//! Populates the Flow's area dropdown. Areas come from a downstream HTTP
//! service returning `[{"code": "...", "name": "..."}]`; any failure falls
//! back to a built-in list so the Flow never breaks on a lookup error.

use crate::error::{BridgeError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default downstream lookup timeout
pub const DEFAULT_LOOKUP_TIMEOUT_MS: u64 = 5000;

/// A delivery area as returned by the downstream service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Area {
    #[serde(alias = "Code", alias = "id")]
    pub code: String,
    #[serde(alias = "Name", alias = "title")]
    pub name: String,
}

impl Area {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
        }
    }
}

/// Dropdown entry shape expected by the Flow UI component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropdownOption {
    pub id: String,
    pub title: String,
}

impl From<&Area> for DropdownOption {
    fn from(area: &Area) -> Self {
        Self {
            id: area.code.clone(),
            title: area.name.clone(),
        }
    }
}

/// Areas served when the downstream service is unavailable
pub fn default_areas() -> Vec<Area> {
    vec![
        Area::new("lekki", "Lekki Phase 1"),
        Area::new("ikeja", "Ikeja"),
        Area::new("yaba", "Yaba"),
        Area::new("vi", "Victoria Island"),
    ]
}

/// Lookup client for delivery areas
#[derive(Clone)]
pub struct AreaDirectory {
    client: Client,
    url: Option<String>,
    timeout: Duration,
}

impl AreaDirectory {
    /// Creates a directory backed by `url`, or serving defaults only when `None`
    pub fn new(url: Option<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BridgeError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.filter(|u| !u.trim().is_empty()),
            timeout,
        })
    }

    /// Directory that never calls out
    pub fn offline() -> Self {
        Self {
            client: Client::new(),
            url: None,
            timeout: Duration::from_millis(DEFAULT_LOOKUP_TIMEOUT_MS),
        }
    }

    /// Lists areas, falling back to [`default_areas`] on any failure or an
    /// empty result.
    pub async fn list(&self) -> Vec<Area> {
        let Some(url) = self.url.as_deref() else {
            debug!("No area lookup URL configured, serving defaults");
            return default_areas();
        };

        match self.fetch(url).await {
            Ok(areas) if !areas.is_empty() => {
                debug!(count = areas.len(), "Fetched delivery areas");
                areas
            }
            Ok(_) => {
                warn!(url = %url, "Area lookup returned no areas, serving defaults");
                default_areas()
            }
            Err(e) => {
                warn!(url = %url, error = %e, "Area lookup failed, serving defaults");
                default_areas()
            }
        }
    }

    /// Lists areas in dropdown form
    pub async fn dropdown(&self) -> Vec<DropdownOption> {
        self.list().await.iter().map(DropdownOption::from).collect()
    }

    async fn fetch(&self, url: &str) -> Result<Vec<Area>> {
        let response = self
            .client
            .get(url)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BridgeError::Lookup(format!("Timed out after {}ms", self.timeout.as_millis()))
                } else {
                    BridgeError::Lookup(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BridgeError::Lookup(format!("Unexpected status {}", status)));
        }

        response
            .json::<Vec<Area>>()
            .await
            .map_err(|e| BridgeError::Lookup(format!("Invalid area list: {}", e)))
    }
}
