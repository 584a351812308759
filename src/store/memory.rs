//! Process-local guestbook table
//!
//! Behaves like the hosted table: assigns `id` and `created_at`, lists
//! newest first and reports zero-row updates as an empty result.

use super::{id_text, Entry, EntryStore, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Debug, Clone)]
struct StoredEntry {
    seq: u64,
    created: DateTime<Utc>,
    row: Entry,
}

#[derive(Debug, Default)]
struct Table {
    next_id: i64,
    next_seq: u64,
    rows: Vec<StoredEntry>,
}

/// In-memory guestbook table guarded by a Tokio `RwLock`
#[derive(Debug, Default)]
pub struct MemoryStore {
    table: RwLock<Table>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, false)
}

fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

impl Table {
    /// Next generated id not already taken by a client-supplied one
    fn allocate_id(&mut self) -> i64 {
        loop {
            self.next_id += 1;
            if !self.contains_id(&self.next_id.to_string(), None) {
                return self.next_id;
            }
        }
    }

    /// Keep generated ids ahead of any numeric id written by a client
    fn observe_id(&mut self, id: &str) {
        if let Ok(n) = id.parse::<i64>() {
            self.next_id = self.next_id.max(n);
        }
    }

    fn contains_id(&self, id: &str, skip_seq: Option<u64>) -> bool {
        self.rows.iter().any(|stored| {
            Some(stored.seq) != skip_seq
                && stored.row.get("id").and_then(id_text).as_deref() == Some(id)
        })
    }
}

#[async_trait]
impl EntryStore for MemoryStore {
    async fn list(&self) -> Result<Vec<Entry>, StoreError> {
        let table = self.table.read().await;
        let mut rows: Vec<&StoredEntry> = table.rows.iter().collect();
        rows.sort_by(|a, b| b.created.cmp(&a.created).then(b.seq.cmp(&a.seq)));
        Ok(rows.into_iter().map(|stored| stored.row.clone()).collect())
    }

    async fn insert(&self, mut fields: Entry) -> Result<Vec<Entry>, StoreError> {
        let mut table = self.table.write().await;

        let requested_id = fields.get("id").map(id_text);
        match requested_id {
            Some(Some(id)) => {
                if table.contains_id(&id, None) {
                    return Err(StoreError::Conflict(format!(
                        "duplicate key value violates unique constraint: id={}",
                        id
                    )));
                }
                table.observe_id(&id);
            }
            Some(None) => {
                return Err(StoreError::Conflict(
                    "null value in column \"id\" violates not-null constraint".to_string(),
                ))
            }
            None => {
                let id = table.allocate_id();
                fields.insert("id".to_string(), Value::from(id));
            }
        }

        let created = match parse_timestamp(fields.get("created_at")) {
            Some(ts) => ts,
            None => {
                let now = Utc::now();
                fields.insert("created_at".to_string(), Value::String(format_timestamp(now)));
                now
            }
        };

        table.next_seq += 1;
        let stored = StoredEntry {
            seq: table.next_seq,
            created,
            row: fields,
        };
        let row = stored.row.clone();
        table.rows.push(stored);

        Ok(vec![row])
    }

    async fn update(&self, id: &str, fields: Entry) -> Result<Vec<Entry>, StoreError> {
        let mut table = self.table.write().await;

        let matched: Vec<usize> = table
            .rows
            .iter()
            .enumerate()
            .filter(|(_, stored)| stored.row.get("id").and_then(id_text).as_deref() == Some(id))
            .map(|(idx, _)| idx)
            .collect();

        if matched.is_empty() {
            return Ok(Vec::new());
        }

        let new_id = fields.get("id").and_then(id_text);
        if let Some(new_id) = &new_id {
            let skip = table.rows[matched[0]].seq;
            if new_id != id && (matched.len() > 1 || table.contains_id(new_id, Some(skip))) {
                return Err(StoreError::Conflict(format!(
                    "duplicate key value violates unique constraint: id={}",
                    new_id
                )));
            }
        }

        let mut updated = Vec::with_capacity(matched.len());
        for idx in matched {
            let stored = &mut table.rows[idx];
            for (key, value) in &fields {
                stored.row.insert(key.clone(), value.clone());
            }
            if let Some(ts) = parse_timestamp(stored.row.get("created_at")) {
                stored.created = ts;
            }
            updated.push(stored.row.clone());
        }
        if let Some(new_id) = &new_id {
            table.observe_id(new_id);
        }

        Ok(updated)
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        table
            .rows
            .retain(|stored| stored.row.get("id").and_then(id_text).as_deref() != Some(id));
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
