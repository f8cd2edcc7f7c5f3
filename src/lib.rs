//! SIEM Event Gateway
//! Security-event ingestion and query service: normalizes loosely-structured
//! payloads into a canonical shape, persists them in SQLite and serves
//! filtered listing and CSV export over HTTP.

pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod normalize;
