//! # Resilient Outbound Client
//!
//! Owns the send/classify/sleep/retry loop around a [`CallTransport`]. Every
//! attempt is a fresh, independent call; the only state carried across
//! attempts is the attempt counter. Backoff waits suspend the calling task
//! only, so concurrent callers never block on each other's sleeps.

use crate::resilience::retry_policy::{
    CallOutcome, FailureClass, OutboundResponse, RetryPolicy,
};
use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// HTTP verbs the client knows how to issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => write!(f, "GET"),
            Self::Post => write!(f, "POST"),
            Self::Put => write!(f, "PUT"),
            Self::Delete => write!(f, "DELETE"),
        }
    }
}

/// Caller-supplied request. The client treats the upstream as opaque; only
/// the outcome's status code or transport failure matters for retries.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<serde_json::Value>,
}

impl OutboundRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post(url: impl Into<String>, body: serde_json::Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: Vec::new(),
            body: Some(body),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// One completed attempt within a retry loop. Created per attempt for the
/// observability record, discarded when the loop exits.
#[derive(Debug)]
pub struct CallAttempt {
    /// 1-based attempt number.
    pub sequence: u32,
    /// Backoff slept before this attempt.
    pub backoff: Duration,
    pub outcome: CallOutcome,
}

/// Transport seam: one fully independent send per call. Implementations carry
/// their own per-attempt timeout.
#[async_trait]
pub trait CallTransport: Send + Sync {
    async fn send(&self, request: &OutboundRequest) -> CallOutcome;
}

/// Terminal failure of a logical call.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Every attempt was retryable and the budget ran out. Carries the last
    /// raw outcome for diagnostics.
    #[error("retries exhausted after {attempts} attempts, last outcome: {last_outcome}")]
    TransientExhausted {
        attempts: u32,
        last_outcome: CallOutcome,
    },

    /// The outcome was classified fatal; no further attempts were made.
    #[error("fatal response, not retried: {outcome}")]
    Fatal { outcome: CallOutcome },
}

/// Retrying wrapper around a [`CallTransport`].
#[derive(Debug, Clone)]
pub struct ResilientClient<T: CallTransport> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: CallTransport> ResilientClient<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Execute one logical call: send, classify, back off, retry. Returns the
    /// first successful response, or [`ClientError::Fatal`] immediately on a
    /// non-retryable outcome, or [`ClientError::TransientExhausted`] once the
    /// attempt ceiling is reached.
    pub async fn execute(&self, request: &OutboundRequest) -> Result<OutboundResponse, ClientError> {
        let mut backoff_taken = Duration::ZERO;
        // A zero-attempt policy still sends once; the request was asked for.
        let max_attempts = self.policy.max_attempts.max(1);

        for sequence in 1..=max_attempts {
            let outcome = self.transport.send(request).await;
            let attempt = CallAttempt {
                sequence,
                backoff: backoff_taken,
                outcome,
            };

            // One observability record per attempt.
            debug!(
                method = %request.method,
                url = %request.url,
                attempt = attempt.sequence,
                backoff_ms = attempt.backoff.as_millis() as u64,
                outcome = %attempt.outcome,
                "Outbound attempt completed"
            );

            if let CallOutcome::Response(response) = &attempt.outcome {
                if response.is_success() {
                    info!(
                        method = %request.method,
                        url = %request.url,
                        status = response.status,
                        attempts = attempt.sequence,
                        "Outbound call succeeded"
                    );
                    return Ok(response.clone());
                }
            }

            let decision = self.policy.decide(&attempt.outcome, sequence);
            if decision.retry {
                warn!(
                    method = %request.method,
                    url = %request.url,
                    attempt = attempt.sequence,
                    delay_ms = decision.delay.as_millis() as u64,
                    reason = ?decision.reason,
                    outcome = %attempt.outcome,
                    "Retryable outcome, backing off"
                );
                tokio::time::sleep(decision.delay).await;
                backoff_taken = decision.delay;
                continue;
            }

            return match RetryPolicy::classify(&attempt.outcome) {
                FailureClass::Retryable(_) => {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        attempts = attempt.sequence,
                        outcome = %attempt.outcome,
                        "Retry budget exhausted"
                    );
                    Err(ClientError::TransientExhausted {
                        attempts: attempt.sequence,
                        last_outcome: attempt.outcome,
                    })
                }
                FailureClass::Fatal => {
                    warn!(
                        method = %request.method,
                        url = %request.url,
                        outcome = %attempt.outcome,
                        "Fatal outcome, not retrying"
                    );
                    Err(ClientError::Fatal {
                        outcome: attempt.outcome,
                    })
                }
            };
        }

        // The loop runs at least once and always returns from inside.
        unreachable!("retry loop exited without a decision")
    }
}
