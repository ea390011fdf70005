//! waterlog-host: polls a remote sensor log and serves the latest
//! water-quality readings as a dashboard table.

pub mod config;
pub mod dashboard;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod poller;
pub mod server;
pub mod source;

pub use domain::{DisplayState, DisplayStore, SensorRecord, Timestamp};
pub use error::{FetchFailure, RecordRejection, RefreshError};
pub use poller::{Poller, PollerHandle, PollerState, RefreshOutcome};
pub use source::{HttpSource, RecordSource};
