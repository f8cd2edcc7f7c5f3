//! SQLite-backed event store
//! Owns the connection pool, schema creation and all queries against the
//! events table.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::info;

use crate::config::DatabaseConfig;
use crate::dto::EventRecord;
use crate::filter::{BindValue, EventFilter, Page};
use crate::normalize::NormalizedEvent;

const SCHEMA_SQL: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp TEXT NOT NULL,
        src_ip TEXT,
        dest_ip TEXT,
        event_type TEXT NOT NULL,
        severity INTEGER NOT NULL,
        message TEXT,
        raw_json TEXT NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_events_ts ON events(timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_events_src ON events(src_ip)",
    "CREATE INDEX IF NOT EXISTS idx_events_dest ON events(dest_ip)",
    "CREATE INDEX IF NOT EXISTS idx_events_type ON events(event_type)",
    "CREATE INDEX IF NOT EXISTS idx_events_sev ON events(severity)",
];

const SELECT_COLUMNS: &str =
    "id, timestamp, src_ip, dest_ip, event_type, severity, message, raw_json";

/// Listing order: newest first, same-second ties broken by insertion order.
const ORDER_SQL: &str = " ORDER BY timestamp DESC, id DESC";

/// Event store service over a SQLite connection pool
pub struct EventStore {
    pool: SqlitePool,
}

impl EventStore {
    /// Open the database (creating file and parent directory if missing)
    /// and ensure the schema exists.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if let Some(path) = sqlite_file_path(&config.url) {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).with_context(|| {
                        format!("Failed to create database directory {:?}", parent)
                    })?;
                }
            }
        }

        let options = SqliteConnectOptions::from_str(&config.url)
            .with_context(|| format!("Invalid database url: {}", config.url))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .context("Failed to open sqlite database")?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Idempotent schema and index creation
    pub async fn init_schema(&self) -> Result<()> {
        for statement in SCHEMA_SQL {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .context("Failed to initialize events schema")?;
        }
        info!("Database schema initialized");
        Ok(())
    }

    /// Check database health
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    /// Insert a batch of normalized events as one transaction: either every
    /// record becomes durable or none do.
    pub async fn insert_batch(&self, events: &[NormalizedEvent]) -> Result<u64, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        for event in events {
            sqlx::query(
                "INSERT INTO events (timestamp, src_ip, dest_ip, event_type, severity, message, raw_json)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(&event.timestamp)
            .bind(&event.src_ip)
            .bind(&event.dest_ip)
            .bind(&event.event_type)
            .bind(event.severity)
            .bind(&event.message)
            .bind(event.raw.to_string())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(events.len() as u64)
    }

    /// Matching-row count plus one ordered page.
    pub async fn list(
        &self,
        filter: &EventFilter,
        page: Page,
    ) -> Result<(i64, Vec<EventRecord>), sqlx::Error> {
        let count_sql = format!("SELECT COUNT(*) FROM events{}", filter.where_sql());
        let total: i64 = bind_scalar(sqlx::query_scalar(&count_sql), filter.binds())
            .fetch_one(&self.pool)
            .await?;

        let select_sql = format!(
            "SELECT {} FROM events{}{} LIMIT ? OFFSET ?",
            SELECT_COLUMNS,
            filter.where_sql(),
            ORDER_SQL,
        );
        let rows = bind_values(sqlx::query(&select_sql), filter.binds())
            .bind(page.limit)
            .bind(page.offset)
            .fetch_all(&self.pool)
            .await?;

        let items = rows
            .iter()
            .map(row_to_record)
            .collect::<Result<Vec<_>, sqlx::Error>>()?;
        Ok((total, items))
    }

    /// Every matching event in listing order, unpaginated, for export.
    pub async fn export(&self, filter: &EventFilter) -> Result<Vec<EventRecord>, sqlx::Error> {
        let select_sql = format!(
            "SELECT {} FROM events{}{}",
            SELECT_COLUMNS,
            filter.where_sql(),
            ORDER_SQL,
        );
        let rows = bind_values(sqlx::query(&select_sql), filter.binds())
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_record).collect()
    }
}

/// Filesystem path of a file-backed sqlite URL, if any.
fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

fn bind_values<'q>(
    mut query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    binds: &'q [BindValue],
) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            BindValue::Text(s) => query.bind(s.as_str()),
            BindValue::Int(i) => query.bind(*i),
        };
    }
    query
}

fn bind_scalar<'q, O>(
    mut query: sqlx::query::QueryScalar<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>>,
    binds: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Sqlite, O, sqlx::sqlite::SqliteArguments<'q>> {
    for bind in binds {
        query = match bind {
            BindValue::Text(s) => query.bind(s.as_str()),
            BindValue::Int(i) => query.bind(*i),
        };
    }
    query
}

fn row_to_record(row: &SqliteRow) -> Result<EventRecord, sqlx::Error> {
    let raw_json: String = row.try_get("raw_json")?;
    let raw = serde_json::from_str(&raw_json).unwrap_or(serde_json::Value::Null);

    Ok(EventRecord {
        id: row.try_get("id")?,
        timestamp: row.try_get("timestamp")?,
        src_ip: row.try_get("src_ip")?,
        dest_ip: row.try_get("dest_ip")?,
        event_type: row.try_get("event_type")?,
        severity: row.try_get("severity")?,
        message: row.try_get("message")?,
        raw,
    })
}
