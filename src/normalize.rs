//! Event normalization
//!
//! Maps loosely-structured ingest payloads into the canonical event shape:
//! source-key aliases, timestamp canonicalization, severity defaulting and
//! field truncation. Security telemetry producers are heterogeneous and
//! lossy, so normalization never rejects a record over missing or malformed
//! optional fields; the only hard failure is an explicitly supplied
//! timestamp that does not parse.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use phf::phf_map;
use serde_json::{Map, Value};
use thiserror::Error;

/// Default severity per event type when the producer sends none.
static SEVERITY_DEFAULTS: phf::Map<&'static str, i64> = phf_map! {
    "auth_failed" => 6,
    "port_scan" => 7,
    "malware" => 9,
    "dns_query" => 2,
};

/// Baseline severity for event types outside the table.
const SEVERITY_BASELINE: i64 = 3;

pub const MAX_EVENT_TYPE_LEN: usize = 64;
pub const MAX_IP_LEN: usize = 64;
pub const MAX_MESSAGE_LEN: usize = 500;

/// A supplied timestamp that is not a recognizable ISO-8601 form. Surfaces
/// as a client input error, never a server fault.
#[derive(Debug, Error)]
#[error("unparseable timestamp {input:?}")]
pub struct TimestampParseError {
    pub input: String,
}

/// Canonical event prior to storage assigning an id.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    pub timestamp: String,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub event_type: String,
    pub severity: i64,
    pub message: Option<String>,
    /// The original input payload, untouched.
    pub raw: Value,
}

/// Canonicalize an ISO-8601-family timestamp into `YYYY-MM-DDTHH:MM:SSZ`.
///
/// Accepts date-only forms, `T`- or space-separated date/time, fractional
/// seconds and any UTC offset. Inputs without an offset are taken as UTC,
/// never local time. Sub-second precision is truncated, not rounded. The
/// fixed output form keeps lexicographic order on the stored column equal
/// to chronological order.
pub fn normalize_timestamp(input: &str) -> Result<String, TimestampParseError> {
    let parsed = parse_flexible(input.trim()).ok_or_else(|| TimestampParseError {
        input: input.to_string(),
    })?;
    Ok(parsed.format("%Y-%m-%dT%H:%M:%SZ").to_string())
}

fn parse_flexible(s: &str) -> Option<DateTime<Utc>> {
    if s.is_empty() {
        return None;
    }

    // Space-separated date/time is accepted by rewriting to the `T` form.
    let candidate = if s.contains('T') {
        s.to_string()
    } else {
        s.replacen(' ', "T", 1)
    };

    if let Ok(dt) = DateTime::parse_from_rfc3339(&candidate) {
        return Some(dt.with_timezone(&Utc));
    }
    // Offsets without a colon (e.g. +0000) fall outside RFC 3339.
    if let Ok(dt) = DateTime::parse_from_str(&candidate, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&candidate, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Current UTC time in the canonical form, whole seconds.
pub fn now_canonical() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Normalize one ingest payload into the canonical event shape.
///
/// An absent timestamp falls back to the current time; a present but
/// unparseable one is the single hard error.
pub fn normalize_event(payload: &Map<String, Value>) -> Result<NormalizedEvent, TimestampParseError> {
    let timestamp = match first_usable(payload, &["timestamp", "@timestamp"]) {
        Some(value) => normalize_timestamp(&stringify(value))?,
        None => now_canonical(),
    };

    let src_ip = first_usable(payload, &["src_ip", "source_ip", "src"])
        .map(|value| truncate_chars(&stringify(value), MAX_IP_LEN));
    let dest_ip = first_usable(payload, &["dest_ip", "destination_ip", "dst"])
        .map(|value| truncate_chars(&stringify(value), MAX_IP_LEN));

    let event_type = match first_usable(payload, &["event_type", "type", "event"]) {
        Some(value) => truncate_chars(&stringify(value).trim().to_lowercase(), MAX_EVENT_TYPE_LEN),
        None => "unknown".to_string(),
    };

    let severity = payload
        .get("severity")
        .and_then(as_severity)
        .unwrap_or_else(|| default_severity(&event_type))
        .clamp(0, 10);

    let message = first_usable(payload, &["message", "msg", "description"])
        .map(|value| truncate_chars(&stringify(value), MAX_MESSAGE_LEN));

    Ok(NormalizedEvent {
        timestamp,
        src_ip,
        dest_ip,
        event_type,
        severity,
        message,
        raw: Value::Object(payload.clone()),
    })
}

/// Heuristic severity for an event type with none supplied.
fn default_severity(event_type: &str) -> i64 {
    SEVERITY_DEFAULTS
        .get(event_type)
        .copied()
        .unwrap_or(SEVERITY_BASELINE)
}

/// First value under the candidate keys that a producer actually set.
/// Nulls and blank strings are skipped.
fn first_usable<'a>(payload: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .find_map(|key| payload.get(*key).filter(|value| is_usable(value)))
}

fn is_usable(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// String form of a JSON value; non-string scalars keep their JSON rendering.
fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Integer severity from a JSON value. Floats truncate toward zero and
/// integer-shaped strings parse; anything else counts as absent so the
/// heuristic applies instead of rejecting the record.
fn as_severity(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Truncate to a character count, never splitting a UTF-8 code point.
fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        value.as_object().expect("object payload").clone()
    }

    #[test]
    fn timestamp_z_form_passes_through() {
        assert_eq!(
            normalize_timestamp("2026-02-14T18:23:41Z").unwrap(),
            "2026-02-14T18:23:41Z"
        );
    }

    #[test]
    fn timestamp_offset_converts_to_utc() {
        assert_eq!(
            normalize_timestamp("2026-02-14T20:23:41+02:00").unwrap(),
            "2026-02-14T18:23:41Z"
        );
        assert_eq!(
            normalize_timestamp("2026-02-14T16:23:41-02:00").unwrap(),
            "2026-02-14T18:23:41Z"
        );
    }

    #[test]
    fn timestamp_compact_offset_accepted() {
        assert_eq!(
            normalize_timestamp("2026-02-14T18:23:41+0000").unwrap(),
            "2026-02-14T18:23:41Z"
        );
    }

    #[test]
    fn timestamp_without_zone_assumes_utc() {
        assert_eq!(
            normalize_timestamp("2026-02-14T18:23:41").unwrap(),
            "2026-02-14T18:23:41Z"
        );
    }

    #[test]
    fn timestamp_space_separator_accepted() {
        assert_eq!(
            normalize_timestamp("2026-02-14 18:23:41").unwrap(),
            "2026-02-14T18:23:41Z"
        );
    }

    #[test]
    fn timestamp_fraction_truncates_not_rounds() {
        assert_eq!(
            normalize_timestamp("2026-02-14T18:23:41.999Z").unwrap(),
            "2026-02-14T18:23:41Z"
        );
        assert_eq!(
            normalize_timestamp("2026-02-14T18:23:41.000123").unwrap(),
            "2026-02-14T18:23:41Z"
        );
    }

    #[test]
    fn timestamp_date_only_is_midnight_utc() {
        assert_eq!(
            normalize_timestamp("2026-02-14").unwrap(),
            "2026-02-14T00:00:00Z"
        );
    }

    #[test]
    fn timestamp_never_emits_offset_form() {
        for input in [
            "2026-02-14T18:23:41+00:00",
            "2026-02-14T18:23:41.5+05:30",
            "2026-02-14 07:00:00-07:00",
        ] {
            let out = normalize_timestamp(input).unwrap();
            assert!(out.ends_with('Z'), "{out}");
            assert!(!out.contains("+00:00"), "{out}");
            assert_eq!(out.len(), 20, "{out}");
        }
    }

    #[test]
    fn timestamp_garbage_is_rejected() {
        assert!(normalize_timestamp("not-a-date").is_err());
        assert!(normalize_timestamp("").is_err());
        assert!(normalize_timestamp("14/02/2026").is_err());
    }

    #[test]
    fn explicit_severity_wins_over_heuristic() {
        let event = normalize_event(&payload(json!({
            "event_type": "auth_failed",
            "severity": 2
        })))
        .unwrap();
        assert_eq!(event.severity, 2);
    }

    #[test]
    fn heuristic_severity_applies_when_absent() {
        for (event_type, expected) in [
            ("auth_failed", 6),
            ("port_scan", 7),
            ("malware", 9),
            ("dns_query", 2),
            ("something_else", 3),
        ] {
            let event = normalize_event(&payload(json!({ "event_type": event_type }))).unwrap();
            assert_eq!(event.severity, expected, "{event_type}");
        }
    }

    #[test]
    fn heuristic_keys_on_lowercased_event_type() {
        let event = normalize_event(&payload(json!({ "event_type": "  MALWARE " }))).unwrap();
        assert_eq!(event.event_type, "malware");
        assert_eq!(event.severity, 9);
    }

    #[test]
    fn out_of_range_severity_clamps() {
        let low = normalize_event(&payload(json!({ "severity": -5 }))).unwrap();
        assert_eq!(low.severity, 0);
        let high = normalize_event(&payload(json!({ "severity": 99 }))).unwrap();
        assert_eq!(high.severity, 10);
    }

    #[test]
    fn severity_accepts_integer_shaped_strings() {
        let event = normalize_event(&payload(json!({ "severity": "7" }))).unwrap();
        assert_eq!(event.severity, 7);
    }

    #[test]
    fn unusable_severity_falls_back_to_heuristic() {
        let event = normalize_event(&payload(json!({
            "event_type": "port_scan",
            "severity": "high"
        })))
        .unwrap();
        assert_eq!(event.severity, 7);
    }

    #[test]
    fn alias_resolution_order_is_fixed() {
        let event = normalize_event(&payload(json!({
            "source_ip": "10.0.0.2",
            "src": "10.0.0.3",
            "dst": "10.0.0.9",
            "msg": "from msg",
            "description": "from description"
        })))
        .unwrap();
        assert_eq!(event.src_ip.as_deref(), Some("10.0.0.2"));
        assert_eq!(event.dest_ip.as_deref(), Some("10.0.0.9"));
        assert_eq!(event.message.as_deref(), Some("from msg"));
    }

    #[test]
    fn null_and_blank_values_fall_through() {
        let event = normalize_event(&payload(json!({
            "src_ip": null,
            "source_ip": "",
            "src": "10.1.1.1",
            "event_type": ""
        })))
        .unwrap();
        assert_eq!(event.src_ip.as_deref(), Some("10.1.1.1"));
        assert_eq!(event.event_type, "unknown");
    }

    #[test]
    fn missing_event_type_defaults_to_unknown() {
        let event = normalize_event(&payload(json!({ "message": "hi" }))).unwrap();
        assert_eq!(event.event_type, "unknown");
        assert_eq!(event.severity, 3);
    }

    #[test]
    fn missing_timestamp_defaults_to_now_in_canonical_form() {
        let event = normalize_event(&payload(json!({ "event_type": "malware" }))).unwrap();
        assert_eq!(event.timestamp.len(), 20);
        assert!(event.timestamp.ends_with('Z'));
        assert_eq!(event.severity, 9);
    }

    #[test]
    fn bad_timestamp_is_the_only_hard_error() {
        let err = normalize_event(&payload(json!({ "timestamp": "not-a-date" }))).unwrap_err();
        assert!(err.to_string().contains("not-a-date"));
    }

    #[test]
    fn at_timestamp_alias_accepted() {
        let event = normalize_event(&payload(json!({
            "@timestamp": "2026-02-14T18:23:41Z"
        })))
        .unwrap();
        assert_eq!(event.timestamp, "2026-02-14T18:23:41Z");
    }

    #[test]
    fn long_fields_truncate_by_characters() {
        let event = normalize_event(&payload(json!({
            "event_type": "x".repeat(100),
            "src_ip": "9".repeat(100),
            "message": "m".repeat(600)
        })))
        .unwrap();
        assert_eq!(event.event_type.chars().count(), MAX_EVENT_TYPE_LEN);
        assert_eq!(event.src_ip.unwrap().chars().count(), MAX_IP_LEN);
        assert_eq!(event.message.unwrap().chars().count(), MAX_MESSAGE_LEN);

        // Multi-byte characters must not be split mid-code-point.
        let unicode = normalize_event(&payload(json!({ "message": "é".repeat(600) }))).unwrap();
        assert_eq!(unicode.message.unwrap().chars().count(), MAX_MESSAGE_LEN);
    }

    #[test]
    fn non_string_scalars_are_stringified() {
        let event = normalize_event(&payload(json!({
            "src_ip": 1234,
            "message": true
        })))
        .unwrap();
        assert_eq!(event.src_ip.as_deref(), Some("1234"));
        assert_eq!(event.message.as_deref(), Some("true"));
    }

    #[test]
    fn raw_preserves_original_payload_verbatim() {
        let input = payload(json!({
            "timestamp": "2026-02-14T20:23:41+02:00",
            "event_type": "  PORT_SCAN  ",
            "severity": 99,
            "custom_field": { "nested": [1, 2, 3] }
        }));
        let event = normalize_event(&input).unwrap();
        assert_eq!(event.raw, Value::Object(input));
        // Normalization changed the visible fields but not raw.
        assert_eq!(event.event_type, "port_scan");
        assert_eq!(event.severity, 10);
    }

    #[test]
    fn normalization_is_a_fixed_point_on_canonical_input() {
        let first = normalize_event(&payload(json!({
            "timestamp": "2026-02-14 20:23:41+02:00",
            "event_type": " Auth_Failed ",
            "severity": 12
        })))
        .unwrap();

        let second = normalize_event(&payload(json!({
            "timestamp": first.timestamp,
            "event_type": first.event_type,
            "severity": first.severity
        })))
        .unwrap();

        assert_eq!(second.timestamp, first.timestamp);
        assert_eq!(second.event_type, first.event_type);
        assert_eq!(second.severity, first.severity);
    }
}
