//! Direct Postgres store
//!
//! Queries the table behind the hosted API through a deadpool connection
//! pool. Rows travel as `to_jsonb(row)` so the JSON shape matches the REST
//! store, and values go through `json_populate_record` so Postgres does the
//! column typing.

use super::{into_entry, Entry, EntryStore, StoreError};
use crate::config::PostgresConfig;
use async_trait::async_trait;
use deadpool_postgres::{Config, ManagerConfig, Pool, PoolConfig, RecyclingMethod, Runtime};
use serde_json::Value;
use std::sync::Arc;
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;
use tracing::{debug, info};

pub struct PostgresStore {
    pool: Pool,
    table: String,
}

impl PostgresStore {
    /// Create the pool and verify the connection with `SELECT 1`
    pub async fn connect(config: &PostgresConfig, table: &str) -> Result<Self, StoreError> {
        let pool = create_pool(config)?;

        let client = pool.get().await?;
        client.query_one("SELECT 1 AS ok", &[]).await?;
        drop(client);

        info!("✅ Postgres pool established (max size: {})", config.max_pool_size);

        Ok(Self {
            pool,
            table: qualified_name(table),
        })
    }

    async fn fetch(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Entry>, StoreError> {
        debug!("Executing: {}", sql);
        let client = self.pool.get().await?;
        let rows = client.query(sql, params).await?;

        rows.iter()
            .map(|row| {
                let value: Value = row.try_get(0)?;
                into_entry(value)
            })
            .collect()
    }
}

fn create_pool(config: &PostgresConfig) -> Result<Pool, StoreError> {
    let mut cfg = Config::new();
    cfg.url = Some(config.database_url.clone());
    cfg.manager = Some(ManagerConfig {
        recycling_method: RecyclingMethod::Fast,
    });
    cfg.pool = Some(PoolConfig::new(config.max_pool_size));

    let pool = if wants_tls(&config.database_url) {
        let certs = rustls_native_certs::load_native_certs();
        let mut root_store = rustls::RootCertStore::empty();
        for cert in certs.certs {
            root_store.add(cert).ok();
        }

        // reqwest brings its own crypto provider, so pick one explicitly.
        let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
        let tls_config = rustls::ClientConfig::builder_with_provider(provider)
            .with_safe_default_protocol_versions()
            .map_err(|e| StoreError::Setup(format!("TLS setup failed: {}", e)))?
            .with_root_certificates(root_store)
            .with_no_client_auth();

        let tls = tokio_postgres_rustls::MakeRustlsConnect::new(tls_config);
        cfg.create_pool(Some(Runtime::Tokio1), tls)
    } else {
        cfg.create_pool(Some(Runtime::Tokio1), NoTls)
    }
    .map_err(|e| StoreError::Setup(e.to_string()))?;

    info!("Postgres pool created (TLS: {})", wants_tls(&config.database_url));
    Ok(pool)
}

/// Hosted Postgres providers only accept TLS connections
fn wants_tls(database_url: &str) -> bool {
    database_url.contains("sslmode=require")
        || database_url.contains("sslmode=verify")
        || database_url.contains("neon.tech")
        || database_url.contains("supabase.co")
        || database_url.contains("supabase.com")
}

/// Double-quote an identifier, doubling embedded quotes
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `schema.table` or `table`, each part quoted
fn qualified_name(table: &str) -> String {
    table
        .split('.')
        .map(quote_ident)
        .collect::<Vec<_>>()
        .join(".")
}

fn column_names(fields: &Entry) -> Vec<&str> {
    fields.keys().map(String::as_str).collect()
}

fn list_sql(table: &str) -> String {
    format!("SELECT to_jsonb(t) FROM {} AS t ORDER BY t.created_at DESC", table)
}

fn select_by_id_sql(table: &str) -> String {
    format!("SELECT to_jsonb(t) FROM {} AS t WHERE t.id::text = $1", table)
}

fn insert_sql(table: &str, columns: &[&str]) -> String {
    if columns.is_empty() {
        return format!("INSERT INTO {} AS t DEFAULT VALUES RETURNING to_jsonb(t)", table);
    }

    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let selected: Vec<String> = quoted.iter().map(|c| format!("r.{}", c)).collect();
    format!(
        "INSERT INTO {table} AS t ({cols}) SELECT {vals} FROM json_populate_record(NULL::{table}, $1::json) AS r RETURNING to_jsonb(t)",
        table = table,
        cols = quoted.join(", "),
        vals = selected.join(", "),
    )
}

fn update_sql(table: &str, columns: &[&str]) -> String {
    let assignments: Vec<String> = columns
        .iter()
        .map(|c| {
            let col = quote_ident(c);
            format!("{} = r.{}", col, col)
        })
        .collect();
    format!(
        "UPDATE {table} AS t SET {sets} FROM json_populate_record(NULL::{table}, $1::json) AS r WHERE t.id::text = $2 RETURNING to_jsonb(t)",
        table = table,
        sets = assignments.join(", "),
    )
}

fn delete_sql(table: &str) -> String {
    format!("DELETE FROM {} AS t WHERE t.id::text = $1", table)
}

#[async_trait]
impl EntryStore for PostgresStore {
    async fn list(&self) -> Result<Vec<Entry>, StoreError> {
        self.fetch(&list_sql(&self.table), &[]).await
    }

    async fn insert(&self, fields: Entry) -> Result<Vec<Entry>, StoreError> {
        let sql = insert_sql(&self.table, &column_names(&fields));
        if fields.is_empty() {
            return self.fetch(&sql, &[]).await;
        }

        let record = Value::Object(fields);
        self.fetch(&sql, &[&record]).await
    }

    async fn update(&self, id: &str, fields: Entry) -> Result<Vec<Entry>, StoreError> {
        // Nothing to set: report the matching rows unchanged.
        if fields.is_empty() {
            return self.fetch(&select_by_id_sql(&self.table), &[&id]).await;
        }

        let sql = update_sql(&self.table, &column_names(&fields));
        let record = Value::Object(fields);
        self.fetch(&sql, &[&record, &id]).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        let removed = client.execute(&delete_sql(&self.table), &[&id]).await?;
        debug!("Deleted {} row(s) with id {}", removed, id);
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("name"), "\"name\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_qualified_name() {
        assert_eq!(qualified_name("guestbook"), "\"guestbook\"");
        assert_eq!(qualified_name("public.guestbook"), "\"public\".\"guestbook\"");
    }

    #[test]
    fn test_list_sql_orders_newest_first() {
        assert_eq!(
            list_sql("\"guestbook\""),
            "SELECT to_jsonb(t) FROM \"guestbook\" AS t ORDER BY t.created_at DESC"
        );
    }

    #[test]
    fn test_insert_sql_uses_body_columns() {
        assert_eq!(
            insert_sql("\"guestbook\"", &["message", "name"]),
            "INSERT INTO \"guestbook\" AS t (\"message\", \"name\") SELECT r.\"message\", r.\"name\" \
             FROM json_populate_record(NULL::\"guestbook\", $1::json) AS r RETURNING to_jsonb(t)"
        );
    }

    #[test]
    fn test_insert_sql_without_columns_uses_defaults() {
        assert_eq!(
            insert_sql("\"guestbook\"", &[]),
            "INSERT INTO \"guestbook\" AS t DEFAULT VALUES RETURNING to_jsonb(t)"
        );
    }

    #[test]
    fn test_update_sql_matches_id_as_text() {
        assert_eq!(
            update_sql("\"guestbook\"", &["message"]),
            "UPDATE \"guestbook\" AS t SET \"message\" = r.\"message\" \
             FROM json_populate_record(NULL::\"guestbook\", $1::json) AS r \
             WHERE t.id::text = $2 RETURNING to_jsonb(t)"
        );
    }

    #[test]
    fn test_column_names_cannot_break_out() {
        let sql = update_sql("\"guestbook\"", &["x\" = 1; DROP TABLE guestbook; --"]);
        assert!(sql.contains("\"x\"\" = 1; DROP TABLE guestbook; --\""));
    }

    #[test]
    fn test_delete_sql() {
        assert_eq!(
            delete_sql("\"guestbook\""),
            "DELETE FROM \"guestbook\" AS t WHERE t.id::text = $1"
        );
    }

    #[test]
    fn test_wants_tls_for_hosted_databases() {
        assert!(wants_tls("postgres://u:p@db.abc.supabase.co:5432/postgres"));
        assert!(wants_tls("postgres://u:p@ep-x.neon.tech/db"));
        assert!(wants_tls("postgres://u:p@10.0.0.5/db?sslmode=require"));
        assert!(!wants_tls("postgres://u:p@localhost/db"));
    }
}
