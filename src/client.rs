use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Serialize)]
struct QueryRequest<'a> {
    query: &'a str,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Why a query did not produce a usable answer
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Connection, timeout, or other transport failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Backend answered with a non-success status.
    #[error("backend returned {status}{}", format_detail(.detail))]
    Status {
        status: StatusCode,
        detail: Option<String>,
    },

    /// Success status but the body was not a query response.
    #[error("malformed response body: {0}")]
    Decode(#[source] serde_json::Error),
}

fn format_detail(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

/// Something that can answer a query
///
/// `Ok(None)` means the backend answered without any text.
#[async_trait]
pub trait QueryBackend: Send + Sync {
    async fn query(&self, text: &str) -> Result<Option<String>, QueryError>;

    /// Human-readable location for the header
    fn endpoint(&self) -> &str;
}

#[derive(Clone)]
pub struct QueryClient {
    client: Client,
    endpoint: String,
}

impl QueryClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, QueryError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            endpoint: format!("{}/api/query", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl QueryBackend for QueryClient {
    async fn query(&self, text: &str) -> Result<Option<String>, QueryError> {
        debug!(endpoint = %self.endpoint, chars = text.chars().count(), "sending query");

        let response = self
            .client
            .post(&self.endpoint)
            .json(&QueryRequest { query: text })
            .send()
            .await?;

        let status = response.status();
        let body = response.bytes().await?;

        if !status.is_success() {
            let detail = serde_json::from_slice::<ErrorBody>(&body)
                .ok()
                .map(|b| b.error);
            return Err(QueryError::Status { status, detail });
        }

        let parsed: QueryResponse = serde_json::from_slice(&body).map_err(QueryError::Decode)?;
        Ok(parsed.response)
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode as AxumStatus, routing::post, Json, Router};
    use serde_json::{json, Value};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn test_query_returns_response_text() {
        let router = Router::new().route(
            "/api/query",
            post(|Json(body): Json<Value>| async move {
                let query = body["query"].as_str().unwrap_or_default().to_string();
                Json(json!({ "response": format!("echo: {query}") }))
            }),
        );
        let base = serve(router).await;

        let client = QueryClient::new(&base, None).unwrap();
        let answer = client.query("2+2").await.unwrap();
        assert_eq!(answer.as_deref(), Some("echo: 2+2"));
    }

    #[tokio::test]
    async fn test_missing_response_field_is_none() {
        let router = Router::new().route("/api/query", post(|| async { Json(json!({})) }));
        let base = serve(router).await;

        let client = QueryClient::new(&base, None).unwrap();
        assert_eq!(client.query("hello").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_server_error_carries_detail() {
        let router = Router::new().route(
            "/api/query",
            post(|| async {
                (
                    AxumStatus::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "Failed to process query: boom" })),
                )
            }),
        );
        let base = serve(router).await;

        let client = QueryClient::new(&base, None).unwrap();
        match client.query("hello").await {
            Err(QueryError::Status { status, detail }) => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(detail.as_deref(), Some("Failed to process query: boom"));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_client_error_without_body_is_status() {
        let router = Router::new().route(
            "/api/query",
            post(|| async { AxumStatus::UNPROCESSABLE_ENTITY }),
        );
        let base = serve(router).await;

        let client = QueryClient::new(&base, None).unwrap();
        assert!(matches!(
            client.query("hello").await,
            Err(QueryError::Status { detail: None, .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let router = Router::new().route("/api/query", post(|| async { "not json" }));
        let base = serve(router).await;

        let client = QueryClient::new(&base, None).unwrap();
        assert!(matches!(
            client.query("hello").await,
            Err(QueryError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_transport_error() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = QueryClient::new(&format!("http://{addr}"), None).unwrap();
        assert!(matches!(
            client.query("hello").await,
            Err(QueryError::Transport(_))
        ));
    }

    #[test]
    fn test_endpoint_joins_base_url() {
        let client = QueryClient::new("http://localhost:8000/", None).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:8000/api/query");
    }
}
