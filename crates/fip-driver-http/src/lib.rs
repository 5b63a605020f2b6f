// # HTTP Panel Resource Driver
//
// ResourceDriver implementation against a cloud panel's floating-IP JSON
// API. One HTTP request per engine call; all coordination (throttling,
// retries, quota arithmetic, failure classification) is owned by the
// engine.
//
// ## API surface
//
// - List:   GET    `{base}/floating_ips`
// - Create: POST   `{base}/floating_ips` with `{"region": ...}`
// - Delete: DELETE `{base}/floating_ips/{address}`
//
// The panel may answer a create with 202 or with a body that carries no
// address yet; both are reported as `Pending` and the engine picks the
// address up from a later listing. Deleting an address the panel no longer
// knows reports `Deleted`, keeping cleanup idempotent.
//
// ## Failure observation
//
// The body of the most recent non-success response is remembered and
// handed to the engine via `observe_failure_text()` for fatal-marker
// scanning. Transport failures leave nothing observable.
//
// ## Security
//
// The API token never appears in logs; the Debug implementation redacts it.

use async_trait::async_trait;
use fip_core::traits::{
    CreateOutcome, DeleteOutcome, ResourceDriver, ResourceEntry, ResourceStatus,
};
use fip_core::{Error, Result};
use serde_json::Value;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::time::Duration;
use tracing::{debug, warn};

/// Default HTTP timeout for panel API requests
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Resource driver backed by a cloud panel's floating-IP HTTP API
pub struct PanelDriver {
    /// Panel API base URL, without a trailing slash
    base_url: String,

    /// Bearer token for the panel API
    api_token: String,

    /// Region new floating IPs are ordered in
    region: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Body of the most recent non-success response
    last_failure: Mutex<Option<String>>,
}

impl std::fmt::Debug for PanelDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PanelDriver")
            .field("base_url", &self.base_url)
            .field("api_token", &"<REDACTED>")
            .field("region", &self.region)
            .finish()
    }
}

impl PanelDriver {
    /// Create a new panel driver
    ///
    /// # Security
    ///
    /// The API token will never be logged or displayed in error messages.
    pub fn new(
        base_url: impl Into<String>,
        api_token: impl Into<String>,
        region: impl Into<String>,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("panel API token cannot be empty"));
        }

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::driver(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token,
            region: region.into(),
            client,
            last_failure: Mutex::new(None),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Remember the body of a failed response for fatal-marker scanning
    async fn remember_failure(&self, response: reqwest::Response) -> String {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let remembered = format!("{status} {body}");
        *self.last_failure.lock().unwrap() = Some(remembered.clone());
        remembered
    }

    fn clear_failure(&self) {
        *self.last_failure.lock().unwrap() = None;
    }
}

#[async_trait]
impl ResourceDriver for PanelDriver {
    async fn create_resource(&self) -> Result<CreateOutcome> {
        let url = self.endpoint("floating_ips");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&serde_json::json!({ "region": self.region }))
            .send()
            .await
            .map_err(|e| {
                self.clear_failure();
                Error::driver(format!("create request failed: {e}"))
            })?;

        if response.status().as_u16() == 202 {
            self.clear_failure();
            debug!("panel accepted the order, allocation pending");
            return Ok(CreateOutcome::Pending);
        }
        if !response.status().is_success() {
            let body = self.remember_failure(response).await;
            warn!("create rejected by the panel: {body}");
            return Ok(CreateOutcome::Failed);
        }

        self.clear_failure();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::driver(format!("create response was not JSON: {e}")))?;
        Ok(parse_create_payload(&payload))
    }

    async fn list_resources(&self) -> Result<Vec<ResourceEntry>> {
        let url = self.endpoint("floating_ips");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| Error::driver(format!("list request failed: {e}")))?;

        if !response.status().is_success() {
            let body = self.remember_failure(response).await;
            return Err(Error::driver(format!("list rejected by the panel: {body}")));
        }

        self.clear_failure();
        let payload: Value = response
            .json()
            .await
            .map_err(|e| Error::driver(format!("list response was not JSON: {e}")))?;
        Ok(parse_list_payload(&payload))
    }

    async fn delete_resource(&self, address: Ipv4Addr) -> Result<DeleteOutcome> {
        let url = self.endpoint(&format!("floating_ips/{address}"));
        let response = self
            .client
            .delete(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                self.clear_failure();
                Error::driver(format!("delete request failed: {e}"))
            })?;

        match response.status().as_u16() {
            200 | 204 => {
                self.clear_failure();
                Ok(DeleteOutcome::Deleted)
            }
            202 => {
                self.clear_failure();
                debug!("panel accepted the deletion, completion pending");
                Ok(DeleteOutcome::Pending)
            }
            // already gone: report success so cleanup stays idempotent
            404 => {
                self.clear_failure();
                Ok(DeleteOutcome::Deleted)
            }
            _ => {
                let body = self.remember_failure(response).await;
                warn!("delete rejected by the panel: {body}");
                Ok(DeleteOutcome::Failed)
            }
        }
    }

    async fn observe_failure_text(&self) -> Option<String> {
        self.last_failure.lock().unwrap().clone()
    }
}

/// Interpret a successful create response body
fn parse_create_payload(payload: &Value) -> CreateOutcome {
    let address = payload
        .get("floating_ip")
        .and_then(|fip| fip.get("address"))
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<Ipv4Addr>().ok());
    match address {
        Some(addr) => CreateOutcome::Created(addr),
        // accepted but no address assigned yet
        None => CreateOutcome::Pending,
    }
}

/// Interpret a list response body; rows with unparsable addresses keep
/// their slot but carry no address
fn parse_list_payload(payload: &Value) -> Vec<ResourceEntry> {
    let rows = payload
        .get("floating_ips")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    rows.iter()
        .map(|row| {
            let address = row
                .get("address")
                .and_then(Value::as_str)
                .and_then(|s| s.parse::<Ipv4Addr>().ok());
            let status = row.get("status").and_then(Value::as_str).unwrap_or("");
            if status.eq_ignore_ascii_case("creating") || status.eq_ignore_ascii_case("pending") {
                ResourceEntry::pending(address)
            } else {
                // an active row with an unparsable address carries no slot
                // the engine can act on; it is listed but addressless
                ResourceEntry {
                    address,
                    status: ResourceStatus::Active,
                }
            }
        })
        .collect()
}
