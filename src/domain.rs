//! ==============================================================================
//! domain.rs - records and the display view-model
//! ==============================================================================
//!
//! purpose:
//!     the typed water-quality record, and the shared DisplayState that the
//!     poller writes and the dashboard reads.
//!
//! relationships:
//!     - built by: pipeline.rs (parse_record)
//!     - written by: poller.rs (DisplayStore::replace_if)
//!     - read by: server.rs, dashboard.rs
//!
//! ==============================================================================

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tokio::sync::RwLock;

/// number of rows the dashboard shows unless configured otherwise
pub const DEFAULT_MAX_ROWS: usize = 10;

/// a stored timestamp: the text as the device wrote it, plus the instant
/// used for ordering
#[derive(Clone, Debug, PartialEq)]
pub struct Timestamp {
    raw: String,
    instant: DateTime<Utc>,
}

impl Timestamp {
    pub fn new(raw: impl Into<String>, instant: DateTime<Utc>) -> Self {
        Self {
            raw: raw.into(),
            instant,
        }
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }
}

// the api shows what the store holds, same as the table
impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// one water-quality sample.
///
/// a measurement the device did not send is `None` and shows as a blank cell.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SensorRecord {
    pub timestamp: Timestamp,
    /// water temperature in celsius
    pub temperature: Option<f64>,
    /// total dissolved solids in ppm
    pub tds: Option<f64>,
    pub ph: Option<f64>,
    /// oxidation-reduction potential in mV
    pub orp: Option<f64>,
}

/// what the dashboard renders: newest first, bounded
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct DisplayState {
    pub records: Vec<SensorRecord>,
    /// unix timestamp (ms) of last successful update
    pub last_update_ms: Option<i64>,
}

/// shared handle to the DisplayState.
///
/// the poller is the only writer and always replaces the whole state;
/// readers get a cloned snapshot.
#[derive(Clone, Default)]
pub struct DisplayStore {
    inner: Arc<RwLock<DisplayState>>,
}

impl DisplayStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> DisplayState {
        self.inner.read().await.clone()
    }

    /// replace the rows wholesale and stamp the update time
    pub async fn replace(&self, records: Vec<SensorRecord>) {
        self.replace_if(records, || true).await;
    }

    /// like `replace`, but only when `live` still holds once the write lock
    /// is taken. returns whether the rows were published.
    pub async fn replace_if<F>(&self, records: Vec<SensorRecord>, live: F) -> bool
    where
        F: FnOnce() -> bool,
    {
        let mut guard = self.inner.write().await;
        if !live() {
            return false;
        }
        *guard = DisplayState {
            records,
            last_update_ms: Some(Utc::now().timestamp_millis()),
        };
        true
    }
}
