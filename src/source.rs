//! ==============================================================================
//! source.rs - reading the device log from the remote store
//! ==============================================================================
//!
//! purpose:
//!     the only place that talks to the remote document store. one GET of
//!     the whole device collection, no query parameters, no credentials.
//!
//! relationships:
//!     - used by: poller.rs (through the RecordSource trait)
//!     - configured by: config.rs (SourceConfig)
//!
//! ==============================================================================

use crate::config::SourceConfig;
use crate::error::FetchFailure;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// a readable record collection.
///
/// `Ok(None)` means the store answered but holds no data for the device.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self) -> Result<Option<Value>, FetchFailure>;

    /// human readable location, for logs
    fn describe(&self) -> String;
}

/// reads `{base_url}/{collection}/{device_id}.json` over http(s)
pub struct HttpSource {
    url: String,
    http: reqwest::Client,
}

impl HttpSource {
    pub fn new(config: &SourceConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("waterlog-host/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            url: config.resource_url(),
            http,
        })
    }
}

#[async_trait]
impl RecordSource for HttpSource {
    async fn fetch(&self) -> Result<Option<Value>, FetchFailure> {
        let response = self.http.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status {
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!(url = %self.url, bytes = body.len(), "raw response: {}", body);

        parse_body(&body)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// empty body and json `null` both mean "no data"
fn parse_body(body: &str) -> Result<Option<Value>, FetchFailure> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Null) => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(e) => Err(FetchFailure::Malformed(e.to_string())),
    }
}
