//! Hosted REST store
//!
//! Talks to the PostgREST endpoint that Supabase exposes for every table:
//! `{project_url}/rest/v1/{table}`. Every request carries the project key
//! both as `apikey` and as a bearer token.

use super::{into_entries, Entry, EntryStore, StoreError};
use crate::config::SupabaseConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

const PREFER: &str = "prefer";

/// PostgREST error body
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
}

pub struct RestStore {
    client: reqwest::Client,
    endpoint: Url,
    api_key: HeaderValue,
    bearer: HeaderValue,
}

impl RestStore {
    pub fn new(config: &SupabaseConfig, table: &str) -> Result<Self, StoreError> {
        let endpoint = table_endpoint(&config.url, table)?;

        let mut api_key = HeaderValue::from_str(&config.key)
            .map_err(|_| StoreError::Setup("SUPABASE_KEY is not a valid header value".to_string()))?;
        api_key.set_sensitive(true);
        let mut bearer = HeaderValue::from_str(&format!("Bearer {}", config.key))
            .map_err(|_| StoreError::Setup("SUPABASE_KEY is not a valid header value".to_string()))?;
        bearer.set_sensitive(true);

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        debug!("REST store endpoint: {}", endpoint);

        Ok(Self {
            client,
            endpoint,
            api_key,
            bearer,
        })
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.api_key.clone())
            .header(AUTHORIZATION, self.bearer.clone())
    }

    fn list_url(&self) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");
        url
    }

    fn id_filter_url(&self, id: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
        url
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(api_error(status, &body))
    }

    async fn rows(&self, request: RequestBuilder) -> Result<Vec<Entry>, StoreError> {
        let body: Value = self.send(request).await?.json().await?;
        into_entries(body)
    }
}

/// `{base}/rest/v1/{table}` with any query string dropped
fn table_endpoint(base: &Url, table: &str) -> Result<Url, StoreError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|_| StoreError::Setup(format!("{} cannot be used as a base URL", base)))?
        .pop_if_empty()
        .extend(["rest", "v1", table]);
    Ok(url)
}

/// Prefer the PostgREST `message`, then the raw body, then the status line.
fn api_error(status: StatusCode, body: &str) -> StoreError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.message)
        .filter(|m| !m.trim().is_empty())
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| status.to_string());

    StoreError::Api {
        status: status.as_u16(),
        message,
    }
}

#[async_trait]
impl EntryStore for RestStore {
    async fn list(&self) -> Result<Vec<Entry>, StoreError> {
        self.rows(self.request(Method::GET, self.list_url())).await
    }

    async fn insert(&self, fields: Entry) -> Result<Vec<Entry>, StoreError> {
        let request = self
            .request(Method::POST, self.endpoint.clone())
            .header(PREFER, "return=representation")
            .json(&fields);
        self.rows(request).await
    }

    async fn update(&self, id: &str, fields: Entry) -> Result<Vec<Entry>, StoreError> {
        let request = self
            .request(Method::PATCH, self.id_filter_url(id))
            .header(PREFER, "return=representation")
            .json(&fields);
        self.rows(request).await
    }

    async fn delete(&self, id: &str) -> Result<(), StoreError> {
        let request = self
            .request(Method::DELETE, self.id_filter_url(id))
            .header(PREFER, "return=minimal");
        self.send(request).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "supabase"
    }
}
