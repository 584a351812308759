//! Guestbook data store
//!
//! The table lives behind `EntryStore`. Handlers only ever see the trait
//! object, so the hosted REST endpoint, a direct Postgres pool and the
//! in-memory table are interchangeable.

pub mod memory;
pub mod postgres;
pub mod rest;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use rest::RestStore;

use crate::config::{Settings, StoreConfig};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// One guestbook row as a JSON object
pub type Entry = Map<String, Value>;

/// Errors raised by a data store.
///
/// The display text is returned to the client as-is.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("{0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("{0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("Failed to initialise data store: {0}")]
    Setup(String),

    #[error("Unexpected response from data store: {0}")]
    Decode(String),

    #[error("{0}")]
    Conflict(String),
}

impl StoreError {
    /// HTTP status reported by the hosted endpoint, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            StoreError::Api { status, .. } => Some(*status),
            StoreError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Table-scoped operations on guestbook entries
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// All entries, newest `created_at` first
    async fn list(&self) -> Result<Vec<Entry>, StoreError>;

    /// Insert one row, returning what the store wrote
    async fn insert(&self, fields: Entry) -> Result<Vec<Entry>, StoreError>;

    /// Apply `fields` to rows whose id matches; empty when nothing matched
    async fn update(&self, id: &str, fields: Entry) -> Result<Vec<Entry>, StoreError>;

    async fn delete(&self, id: &str) -> Result<(), StoreError>;

    /// Short backend name for logs
    fn backend(&self) -> &'static str;
}

/// Shared store handle
pub type DynStore = Arc<dyn EntryStore>;

/// Build the store selected by the settings
pub async fn connect(settings: &Settings) -> Result<DynStore, StoreError> {
    let store: DynStore = match &settings.store {
        StoreConfig::Supabase(cfg) => Arc::new(RestStore::new(cfg, &settings.table)?),
        StoreConfig::Postgres(cfg) => Arc::new(PostgresStore::connect(cfg, &settings.table).await?),
        StoreConfig::Memory => Arc::new(MemoryStore::new()),
    };

    info!("Data store ready (backend: {}, table: {})", store.backend(), settings.table);
    Ok(store)
}

/// Textual form of an `id` value used for path matching
pub(crate) fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Rows must come back as JSON objects
pub(crate) fn into_entries(value: Value) -> Result<Vec<Entry>, StoreError> {
    match value {
        Value::Array(rows) => rows.into_iter().map(into_entry).collect(),
        Value::Object(row) => Ok(vec![row]),
        other => Err(StoreError::Decode(format!("expected an array of rows, got {}", other))),
    }
}

pub(crate) fn into_entry(value: Value) -> Result<Entry, StoreError> {
    match value {
        Value::Object(row) => Ok(row),
        other => Err(StoreError::Decode(format!("expected a row object, got {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_text_matches_numbers_and_strings() {
        assert_eq!(id_text(&json!(5)), Some("5".to_string()));
        assert_eq!(id_text(&json!("a1b2")), Some("a1b2".to_string()));
        assert_eq!(id_text(&json!(null)), None);
    }

    #[test]
    fn test_into_entries_rejects_scalars() {
        assert_eq!(into_entries(json!([{"id": 1}])).unwrap().len(), 1);
        assert_eq!(into_entries(json!({"id": 1})).unwrap().len(), 1);
        assert!(matches!(into_entries(json!("oops")), Err(StoreError::Decode(_))));
        assert!(matches!(into_entries(json!([1])), Err(StoreError::Decode(_))));
    }

    #[test]
    fn test_api_error_displays_message_only() {
        let err = StoreError::Api {
            status: 409,
            message: "duplicate key value violates unique constraint".to_string(),
        };
        assert_eq!(err.to_string(), "duplicate key value violates unique constraint");
        assert_eq!(err.upstream_status(), Some(409));
        assert_eq!(StoreError::Decode("x".to_string()).upstream_status(), None);
    }
}
