//! Request/response structures for the event API

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::filter::FilterParams;

/// A persisted event as returned to consumers. `raw` carries the original
/// ingest payload exactly as submitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    pub id: i64,
    pub timestamp: String,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub event_type: String,
    pub severity: i64,
    pub message: Option<String>,
    pub raw: Value,
}

/// One page of the event listing.
#[derive(Debug, Serialize, Deserialize)]
pub struct EventsPage {
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub items: Vec<EventRecord>,
}

/// Acknowledgement for a single-event ingest.
#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub inserted: u64,
    pub event_type: String,
    pub severity: i64,
}

/// Acknowledgement for a batch ingest.
#[derive(Debug, Serialize, Deserialize)]
pub struct BatchIngestResponse {
    pub inserted: u64,
}

/// Batch bodies arrive either as a bare JSON array of objects or wrapped
/// in `{"events": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum BatchPayload {
    Wrapped { events: Vec<Map<String, Value>> },
    Bare(Vec<Map<String, Value>>),
}

impl BatchPayload {
    pub fn into_events(self) -> Vec<Map<String, Value>> {
        match self {
            BatchPayload::Wrapped { events } => events,
            BatchPayload::Bare(events) => events,
        }
    }
}

/// Query parameters accepted by the listing endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
    pub event_type: Option<String>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub severity_min: Option<i64>,
    pub severity_max: Option<i64>,
    pub start_ts: Option<String>,
    pub end_ts: Option<String>,
}

impl ListQuery {
    /// The filterable subset, identical to what the export endpoint takes.
    pub fn filters(&self) -> FilterParams {
        FilterParams {
            event_type: self.event_type.clone(),
            src_ip: self.src_ip.clone(),
            dest_ip: self.dest_ip.clone(),
            severity_min: self.severity_min,
            severity_max: self.severity_max,
            start_ts: self.start_ts.clone(),
            end_ts: self.end_ts.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn batch_payload_accepts_both_shapes() {
        let bare: BatchPayload =
            serde_json::from_value(json!([{ "event_type": "a" }, { "event_type": "b" }])).unwrap();
        assert_eq!(bare.into_events().len(), 2);

        let wrapped: BatchPayload =
            serde_json::from_value(json!({ "events": [{ "event_type": "a" }] })).unwrap();
        assert_eq!(wrapped.into_events().len(), 1);
    }
}
