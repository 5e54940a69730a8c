//! Upstream content search through the resilient HTTP client.
//!
//! Thin consumer of `ResilientClient`: builds the search request, lets the
//! client handle transient failures, and decodes the JSON page the upstream
//! returns.

use serde::Deserialize;
use tracing::{debug, info};

use crate::resilience::{CallTransport, ClientError, OutboundRequest, ResilientClient};

/// One item of an upstream search result.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentItem {
    pub title: String,
    pub link: String,
    #[serde(default)]
    pub description: String,
}

/// One page of upstream search results.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentPage {
    pub total: i64,
    pub start: i64,
    pub display: i64,
    pub items: Vec<ContentItem>,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteContentError {
    #[error("upstream call failed: {0}")]
    Call(#[from] ClientError),

    #[error("invalid search url: {0}")]
    InvalidUrl(String),

    #[error("upstream response could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Searches an upstream content API, riding the retry behavior of the
/// resilient client for transient upstream trouble.
pub struct RemoteContentService<T: CallTransport> {
    client: ResilientClient<T>,
    base_url: String,
    client_id: String,
    client_secret: String,
}

impl<T: CallTransport> RemoteContentService<T> {
    pub fn new(
        client: ResilientClient<T>,
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Fetch one page of results for `query`. `start` is 1-based,
    /// `page_size` maps to the upstream `display` parameter.
    pub async fn search(
        &self,
        query: &str,
        start: i64,
        page_size: i64,
    ) -> Result<ContentPage, RemoteContentError> {
        let url = reqwest::Url::parse_with_params(
            &self.base_url,
            &[
                ("query", query),
                ("start", &start.to_string()),
                ("display", &page_size.to_string()),
            ],
        )
        .map_err(|e| RemoteContentError::InvalidUrl(e.to_string()))?;

        debug!(%query, start, page_size, "Searching upstream content");
        let request = OutboundRequest::get(url.as_str())
            .header("X-Client-Id", &self.client_id)
            .header("X-Client-Secret", &self.client_secret);

        let response = self.client.execute(&request).await?;
        let page: ContentPage = serde_json::from_slice(&response.body)?;
        info!(
            %query,
            total = page.total,
            returned = page.items.len(),
            "Upstream search completed"
        );
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::{CallOutcome, OutboundResponse, RetryPolicy};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct StubTransport {
        requests: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl CallTransport for StubTransport {
        async fn send(&self, request: &OutboundRequest) -> CallOutcome {
            self.requests.lock().unwrap().push(request.url.clone());
            let body = serde_json::json!({
                "total": 1,
                "start": 1,
                "display": 1,
                "items": [{"title": "t", "link": "https://example.com/1", "description": "d"}]
            });
            CallOutcome::Response(OutboundResponse {
                status: 200,
                body: serde_json::to_vec(&body).unwrap(),
            })
        }
    }

    #[tokio::test]
    async fn search_encodes_params_and_decodes_the_page() {
        let transport = StubTransport::default();
        let service = RemoteContentService::new(
            ResilientClient::new(transport.clone(), RetryPolicy::default()),
            "https://api.example.com/v1/search/blog.json",
            "client-id",
            "client-secret",
        );

        let page = service.search("rust", 1, 10).await.unwrap();

        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].title, "t");
        let url = transport.requests.lock().unwrap()[0].clone();
        assert!(url.contains("query=rust"));
        assert!(url.contains("start=1"));
        assert!(url.contains("display=10"));
    }

    #[test]
    fn content_page_decodes_upstream_shape() {
        let body = serde_json::json!({
            "total": 42,
            "start": 1,
            "display": 2,
            "items": [
                {"title": "First post", "link": "https://example.com/1", "description": "hello"},
                {"title": "Second post", "link": "https://example.com/2"}
            ]
        });
        let page: ContentPage = serde_json::from_value(body).unwrap();
        assert_eq!(page.total, 42);
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.items[1].description, "");
    }
}
