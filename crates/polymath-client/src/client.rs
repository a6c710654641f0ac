//! HTTP client for the PostgREST, RPC and edge-function surface

use crate::error::{ClientError, Result};
use crate::types::*;
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

/// HTTP client for the hosted backend
///
/// # Example
///
/// ```rust,no_run
/// use polymath_client::{ClientConfig, Filter, PostgrestClient, Query};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PostgrestClient::new(ClientConfig {
///     base_url: "https://project.supabase.co".into(),
///     anon_key: "public-anon-key".into(),
///     ..Default::default()
/// })?;
///
/// let liked = client
///     .select(
///         &Query::table("quote_likes")
///             .select(["quote_id"])
///             .filter(Filter::eq("user_id", "viewer-1")),
///     )
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct PostgrestClient {
    config: ClientConfig,
    client: Client,
}

impl PostgrestClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            "apikey",
            header::HeaderValue::from_str(&config.anon_key)
                .map_err(|_| ClientError::Config("anon key is not a valid header value".into()))?,
        );
        headers.insert(
            header::AUTHORIZATION,
            header::HeaderValue::from_str(&format!("Bearer {}", config.bearer()))
                .map_err(|_| ClientError::Config("access token is not a valid header value".into()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn rest_url(&self, path: &str) -> String {
        format!("{}/rest/v1/{}", self.config.trimmed_base(), path)
    }

    fn with_query(mut url: String, query: &str) -> String {
        if !query.is_empty() {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    // ==================== Tables ====================

    /// Read rows
    pub async fn select(&self, query: &Query) -> Result<Vec<Value>> {
        let url = Self::with_query(
            self.rest_url(&urlencoding::encode(&query.table)),
            &query.to_query_string(),
        );
        debug!(table = %query.table, filters = query.filters.len(), "select");

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    /// Read rows and deserialize them into `T`
    pub async fn select_as<T: DeserializeOwned>(&self, query: &Query) -> Result<Vec<T>> {
        let rows = self.select(query).await?;
        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(ClientError::from))
            .collect()
    }

    /// Insert one row, returning the stored representation
    pub async fn insert(&self, table: &str, row: &Value) -> Result<Vec<Value>> {
        let url = self.rest_url(&urlencoding::encode(table));
        debug!(table, "insert");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
            .json(row)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Patch every row matching `filters`
    pub async fn update(&self, table: &str, filters: &[Filter], patch: &Value) -> Result<Vec<Value>> {
        let url = Self::with_query(
            self.rest_url(&urlencoding::encode(table)),
            &filters_to_query_string(filters),
        );
        debug!(table, filters = filters.len(), "update");

        let response = self
            .client
            .patch(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
            .json(patch)
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Delete every row matching `filters`, returning the deleted rows
    pub async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>> {
        if filters.is_empty() {
            // PostgREST rejects unfiltered deletes; refuse before sending.
            return Err(ClientError::Config(format!(
                "refusing unfiltered delete on {}",
                table
            )));
        }

        let url = Self::with_query(
            self.rest_url(&urlencoding::encode(table)),
            &filters_to_query_string(filters),
        );
        debug!(table, filters = filters.len(), "delete");

        let response = self
            .client
            .delete(&url)
            .header("Prefer", "return=representation")
            .send()
            .await?;

        self.handle_response(response).await
    }

    /// Exact row count for `filters`
    pub async fn count(&self, table: &str, filters: &[Filter]) -> Result<u64> {
        let mut query = String::from("select=%2A");
        if !filters.is_empty() {
            query.push('&');
            query.push_str(&filters_to_query_string(filters));
        }
        let url = Self::with_query(self.rest_url(&urlencoding::encode(table)), &query);
        debug!(table, filters = filters.len(), "count");

        let response = self
            .client
            .head(&url)
            .header("Prefer", "count=exact")
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound(table.to_string()));
        }
        if !status.is_success() {
            return Err(ClientError::Server {
                status: status.as_u16(),
                message: format!("count on {} failed", table),
            });
        }

        let range = response
            .headers()
            .get(header::CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ClientError::InvalidResponse("missing Content-Range header".into()))?;

        parse_content_range_total(range)
            .ok_or_else(|| ClientError::InvalidResponse(format!("unparseable Content-Range: {}", range)))
    }

    // ==================== RPC ====================

    /// Call a database function
    pub async fn rpc(&self, function: &str, args: &Value) -> Result<Value> {
        let url = self.rest_url(&format!("rpc/{}", urlencoding::encode(function)));
        debug!(function, "rpc");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(args)
            .send()
            .await?;

        self.handle_response(response).await
    }

    // ==================== Edge functions ====================

    /// Invoke an edge function (e.g. `semantic-search`)
    pub async fn invoke_function(&self, name: &str, body: &Value) -> Result<Value> {
        let url = format!(
            "{}/functions/v1/{}",
            self.config.trimmed_base(),
            urlencoding::encode(name)
        );
        debug!(function = name, "invoke edge function");

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(body)
            .send()
            .await?;

        self.handle_response(response).await
    }

    // ==================== Realtime ====================

    /// Websocket endpoint for realtime change feeds
    pub fn realtime_url(&self) -> String {
        let base = self.config.trimmed_base();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };

        format!(
            "{}/realtime/v1/websocket?apikey={}&vsn=1.0.0",
            ws_base,
            urlencoding::encode(&self.config.anon_key)
        )
    }

    // ==================== Helper Methods ====================

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            let path = response.url().path().to_string();
            return Err(ClientError::NotFound(path));
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Server {
                status: status.as_u16(),
                message: body,
            });
        }

        // Void functions and `return=minimal` writes answer with an empty body.
        let body = response.text().await?;
        let value = if body.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&body)?
        };

        match serde_json::from_value(value.clone()) {
            Ok(parsed) => Ok(parsed),
            // An empty body where rows were expected means no rows.
            Err(_) if value.is_null() => Ok(serde_json::from_value(Value::Array(Vec::new()))?),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(base_url: &str) -> PostgrestClient {
        PostgrestClient::new(ClientConfig {
            base_url: base_url.into(),
            anon_key: "anon".into(),
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_realtime_url_uses_wss_for_https() {
        let c = client("https://abc.supabase.co/");
        assert_eq!(
            c.realtime_url(),
            "wss://abc.supabase.co/realtime/v1/websocket?apikey=anon&vsn=1.0.0"
        );
    }

    #[test]
    fn test_realtime_url_uses_ws_for_http() {
        let c = client("http://localhost:54321");
        assert!(c.realtime_url().starts_with("ws://localhost:54321/realtime/v1/"));
    }

    #[test]
    fn test_rejects_invalid_header_values() {
        let result = PostgrestClient::new(ClientConfig {
            anon_key: "bad\nkey".into(),
            ..Default::default()
        });
        assert!(matches!(result, Err(ClientError::Config(_))));
    }

    #[tokio::test]
    async fn test_unfiltered_delete_is_refused() {
        let c = client("http://localhost:1");
        let result = c.delete("quote_likes", &[]).await;
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
