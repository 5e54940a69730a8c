//! reqwest-backed [`CallTransport`] with a per-attempt timeout.

use crate::resilience::client::{CallTransport, HttpMethod, OutboundRequest};
use crate::resilience::retry_policy::{CallOutcome, OutboundResponse, TransportFailure};
use async_trait::async_trait;
use std::time::Duration;

/// HTTP transport for the resilient client. The timeout applies to each
/// individual attempt; the aggregate operation carries no separate budget
/// beyond attempts x backoff cap.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { client })
    }

    /// Wrap an already-configured reqwest client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn transport_failure(error: &reqwest::Error) -> TransportFailure {
    if error.is_timeout() {
        TransportFailure::Timeout
    } else if error.is_connect() {
        TransportFailure::ConnectionRefused
    } else if error.is_body() || error.is_decode() {
        TransportFailure::ConnectionReset
    } else {
        TransportFailure::Other(error.to_string())
    }
}

#[async_trait]
impl CallTransport for HttpTransport {
    async fn send(&self, request: &OutboundRequest) -> CallOutcome {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Put => self.client.put(&request.url),
            HttpMethod::Delete => self.client.delete(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        match builder.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                match response.bytes().await {
                    Ok(body) => CallOutcome::Response(OutboundResponse {
                        status,
                        body: body.to_vec(),
                    }),
                    Err(error) => CallOutcome::Transport(transport_failure(&error)),
                }
            }
            Err(error) => CallOutcome::Transport(transport_failure(&error)),
        }
    }
}
