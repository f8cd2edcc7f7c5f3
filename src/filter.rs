//! Query-filter composition
//!
//! Translates optional query parameters into an ordered, parameterized
//! WHERE predicate. The listing and CSV export paths consume the same
//! predicate unchanged so they always agree on which rows match.

use serde::Deserialize;

/// Optional filter parameters as they arrive on the query string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterParams {
    pub event_type: Option<String>,
    pub src_ip: Option<String>,
    pub dest_ip: Option<String>,
    pub severity_min: Option<i64>,
    pub severity_max: Option<i64>,
    pub start_ts: Option<String>,
    pub end_ts: Option<String>,
}

/// A value bound into a parameterized clause.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
}

/// AND-combined predicate over the events table. Built fresh per request;
/// holds no state beyond the clauses and their bind values.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    clauses: Vec<&'static str>,
    binds: Vec<BindValue>,
}

impl EventFilter {
    /// Build the predicate from query parameters. Absent or blank parameters
    /// contribute nothing; clause order is fixed so the generated SQL stays
    /// stable across requests with the same parameter set.
    pub fn from_params(params: &FilterParams) -> Self {
        let mut filter = EventFilter::default();

        if let Some(event_type) = non_blank(&params.event_type) {
            filter.push("event_type = ?", BindValue::Text(event_type.to_lowercase()));
        }
        if let Some(src_ip) = non_blank(&params.src_ip) {
            filter.push("src_ip = ?", BindValue::Text(src_ip));
        }
        if let Some(dest_ip) = non_blank(&params.dest_ip) {
            filter.push("dest_ip = ?", BindValue::Text(dest_ip));
        }
        // Inclusive bounds; an inverted range is legal and matches nothing.
        if let Some(min) = params.severity_min {
            filter.push("severity >= ?", BindValue::Int(min));
        }
        if let Some(max) = params.severity_max {
            filter.push("severity <= ?", BindValue::Int(max));
        }
        // Lexicographic comparison on the canonical timestamp form.
        if let Some(start_ts) = non_blank(&params.start_ts) {
            filter.push("timestamp >= ?", BindValue::Text(start_ts));
        }
        if let Some(end_ts) = non_blank(&params.end_ts) {
            filter.push("timestamp <= ?", BindValue::Text(end_ts));
        }

        filter
    }

    fn push(&mut self, clause: &'static str, bind: BindValue) {
        self.clauses.push(clause);
        self.binds.push(bind);
    }

    /// ` WHERE ...` fragment, or empty when nothing constrains the query.
    pub fn where_sql(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    /// Bind values in clause order.
    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Pagination directives for the listing path.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    /// Clamp raw parameters into the configured limits.
    pub fn clamp(limit: Option<i64>, offset: Option<i64>, default_limit: i64, max_limit: i64) -> Self {
        Self {
            limit: limit.unwrap_or(default_limit).clamp(1, max_limit),
            offset: offset.unwrap_or(0).max(0),
        }
    }
}

/// Trimmed value of a present, non-blank string parameter.
fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
