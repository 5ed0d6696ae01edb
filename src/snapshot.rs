//! Read-only query surface over the hub
//!
//! Snapshots are independent copies: records are shared `Arc`s taken inside
//! the hub's critical section, so a record is either fully present in a
//! snapshot or absent from it.

use crate::call_record::CallRecord;
use crate::hub::ObservabilityHub;
use serde::Serialize;
use std::sync::Arc;

/// Buffer contents at one instant (`GET /logs` body)
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub count: usize,
    #[serde(rename = "max")]
    pub capacity: usize,
    #[serde(rename = "logs")]
    pub records: Vec<Arc<CallRecord>>,
}

/// Recorder status (`GET /status` body)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    #[serde(rename = "client")]
    pub observer_count: usize,
    pub count: usize,
    #[serde(rename = "max")]
    pub capacity: usize,
}

impl ObservabilityHub {
    pub fn snapshot(&self) -> Snapshot {
        let state = self.lock();
        let records = state.buffer.snapshot();
        Snapshot {
            count: records.len(),
            capacity: state.buffer.capacity(),
            records,
        }
    }

    /// Empty the record buffer. Always succeeds.
    pub fn clear(&self) {
        self.lock().buffer.clear();
        tracing::debug!("Record buffer cleared");
    }

    pub fn status(&self) -> Status {
        let state = self.lock();
        Status {
            observer_count: state.broadcaster.observer_count(),
            count: state.buffer.len(),
            capacity: state.buffer.capacity(),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::call_record::CallRecord;
    use crate::hub::{HubConfig, ObservabilityHub};

    #[test]
    fn test_snapshot_json_shape() {
        let hub = ObservabilityHub::new(HubConfig {
            capacity: 5,
            ..HubConfig::default()
        });
        hub.record(CallRecord::builder("GET", "http://localhost/").status(200).build());

        let value = serde_json::to_value(hub.snapshot()).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["max"], 5);
        assert_eq!(value["logs"][0]["statusCode"], 200);
    }

    #[test]
    fn test_status_json_shape() {
        let hub = ObservabilityHub::new(HubConfig::default());
        let value = serde_json::to_value(hub.status()).unwrap();
        assert_eq!(value, serde_json::json!({ "client": 0, "count": 0, "max": 1000 }));
    }

    #[test]
    fn test_round_trip_is_field_for_field_equal() {
        let hub = ObservabilityHub::new(HubConfig::default());
        let record = CallRecord::builder("PATCH", "https://example.com/r/1")
            .status(202)
            .duration_ms(9)
            .request_body("{\"a\":1}")
            .build();

        hub.record(record.clone());
        let snapshot = hub.snapshot();
        assert_eq!(*snapshot.records[0], record);
    }

    #[test]
    fn test_clear_then_snapshot_is_empty() {
        let hub = ObservabilityHub::new(HubConfig::default());
        hub.record(CallRecord::builder("GET", "http://localhost/").build());
        hub.clear();
        hub.clear();
        let snapshot = hub.snapshot();
        assert_eq!(snapshot.count, 0);
        assert!(snapshot.records.is_empty());
        assert_eq!(hub.status().capacity, 1000);
    }
}
