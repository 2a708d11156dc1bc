//! Remote fetch collaborator.
//!
//! Thin JSON-over-HTTP client for the analytics endpoints. Every non-2xx
//! response is translated into [`FetchError::Http`] with a best-effort
//! message pulled from the body; transport failures become
//! [`FetchError::Network`]. A `204` is a successful empty result.

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::FetchError;
use crate::types::ListPage;

/// Request timeout. Failures surface through the normal error path rather
/// than a separate timeout taxonomy.
const HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    /// GET a path with a pre-serialized canonical query string, decoding
    /// the JSON body into `T`. A `204` yields `T::default()`.
    pub async fn get_json<T>(&self, path: &str, query: &str) -> Result<T, FetchError>
    where
        T: DeserializeOwned + Default,
    {
        let url = if query.is_empty() {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{path}?{query}", self.base_url)
        };
        debug!(url = %url, "dispatching backend request");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 204 {
            return Ok(T::default());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::from_http_body(status.as_u16(), &body));
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| FetchError::Malformed(e.to_string()))
    }

    /// Fetch one page of a drilldown list endpoint.
    pub async fn fetch_list(&self, path: &str, query: &str) -> Result<ListPage, FetchError> {
        self.get_json(path, query).await
    }
}
