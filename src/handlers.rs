//! HTTP handlers for the event gateway
//! Ingestion, filtered listing, CSV export and health endpoints

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::database::EventStore;
use crate::dto::{BatchIngestResponse, BatchPayload, EventsPage, IngestResponse, ListQuery};
use crate::error::ApiError;
use crate::filter::{EventFilter, FilterParams, Page};
use crate::normalize::{normalize_event, NormalizedEvent};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<EventStore>,
}

/// Build the service router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/v1/healthz", get(healthz))
        .route("/api/v1/ingest", post(ingest))
        .route("/api/v1/ingest/batch", post(ingest_batch))
        .route("/api/v1/events", get(list_events))
        .route("/api/v1/events/export.csv", get(export_csv))
        .with_state(state)
}

/// Liveness probe backed by a database ping
async fn healthz(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    state
        .store
        .health_check()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(json!({ "status": "ok" })))
}

/// Ingest a single event payload
async fn ingest(
    State(state): State<AppState>,
    Json(payload): Json<Map<String, Value>>,
) -> Result<Json<IngestResponse>, ApiError> {
    let normalized = normalize_event(&payload).map_err(|e| {
        warn!("Rejected ingest: {}", e);
        ApiError::from(e)
    })?;

    let inserted = state
        .store
        .insert_batch(std::slice::from_ref(&normalized))
        .await?;

    debug!(
        event_type = %normalized.event_type,
        severity = normalized.severity,
        "Ingested event"
    );

    Ok(Json(IngestResponse {
        inserted,
        event_type: normalized.event_type,
        severity: normalized.severity,
    }))
}

/// Ingest a batch of events. Every record must normalize before any insert
/// is attempted, so one bad timestamp aborts the whole batch with nothing
/// persisted.
async fn ingest_batch(
    State(state): State<AppState>,
    Json(payload): Json<BatchPayload>,
) -> Result<Json<BatchIngestResponse>, ApiError> {
    let events = payload.into_events();

    let normalized = events
        .iter()
        .map(normalize_event)
        .collect::<Result<Vec<NormalizedEvent>, _>>()
        .map_err(|e| {
            warn!("Rejected batch: {}", e);
            ApiError::from(e)
        })?;

    let inserted = state.store.insert_batch(&normalized).await?;
    info!(count = inserted, "Ingested event batch");

    Ok(Json(BatchIngestResponse { inserted }))
}

/// Paginated, filtered event listing
async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<EventsPage>, ApiError> {
    let filter = EventFilter::from_params(&query.filters());
    let page = Page::clamp(
        query.limit,
        query.offset,
        state.config.query.default_page_size,
        state.config.query.max_page_size,
    );

    let (total, items) = state.store.list(&filter, page).await?;

    Ok(Json(EventsPage {
        total,
        limit: page.limit,
        offset: page.offset,
        items,
    }))
}

/// Unpaginated CSV export sharing the listing predicate
async fn export_csv(
    State(state): State<AppState>,
    Query(params): Query<FilterParams>,
) -> Result<Response, ApiError> {
    let filter = EventFilter::from_params(&params);
    let rows = state.store.export(&filter).await?;

    let mut body = String::from("id,timestamp,src_ip,dest_ip,event_type,severity,message\r\n");
    for row in &rows {
        body.push_str(&format!(
            "{},{},{},{},{},{},{}\r\n",
            row.id,
            csv_field(&row.timestamp),
            csv_field(row.src_ip.as_deref().unwrap_or("")),
            csv_field(row.dest_ip.as_deref().unwrap_or("")),
            csv_field(&row.event_type),
            row.severity,
            csv_field(row.message.as_deref().unwrap_or("")),
        ));
    }

    info!(
        rows = rows.len(),
        filtered = !filter.is_empty(),
        "Exported events as CSV"
    );

    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=events.csv",
            ),
        ],
        body,
    )
        .into_response())
}

/// Minimal RFC 4180 quoting: only values containing a comma, quote or line
/// break get wrapped.
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
