use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of `service_status`. Rows are never updated after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub name: String,
    /// `"OK"`, a diagnostic message, or a self-reported state such as `"Running"`
    pub status: String,
    pub metadata: Option<serde_json::Value>,
    pub reported_at: DateTime<Utc>,
}

impl StatusRecord {
    pub fn new(name: impl Into<String>, status: impl Into<String>, reported_at: DateTime<Utc>) -> Self {
        Self { name: name.into(), status: status.into(), metadata: None, reported_at }
    }

    pub fn with_metadata(mut self, metadata: Option<serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Storage representation of `last_update`
    pub fn timestamp_to_i64(time: DateTime<Utc>) -> i64 {
        time.timestamp_millis()
    }

    pub fn i64_to_timestamp(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap_or_default()
    }
}
