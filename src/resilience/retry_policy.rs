//! # Retry Policy Engine
//!
//! Pure classification of outbound-call outcomes and exponential backoff
//! computation. The policy never sleeps, logs, or touches the network; it only
//! answers "should this outcome be retried, and after how long". The send loop
//! in [`crate::resilience::client`] owns every side effect.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The observable result of one outbound attempt: either a response with a
/// status code, or a transport-level failure before any response arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    /// The remote answered; classification looks only at the status code.
    Response(OutboundResponse),
    /// The call never produced a response.
    Transport(TransportFailure),
}

impl CallOutcome {
    /// Status code of the response, if one was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            CallOutcome::Response(response) => Some(response.status),
            CallOutcome::Transport(_) => None,
        }
    }

    /// A 2xx/3xx response terminates the retry loop successfully.
    pub fn is_success(&self) -> bool {
        matches!(self.status(), Some(code) if (200..400).contains(&code))
    }
}

impl fmt::Display for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CallOutcome::Response(response) => write!(f, "status {}", response.status),
            CallOutcome::Transport(failure) => write!(f, "transport failure: {failure}"),
        }
    }
}

/// Response payload as seen by the retry loop: status plus raw body bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl OutboundResponse {
    pub fn is_success(&self) -> bool {
        (200..400).contains(&self.status)
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Transport-level failure modes, all retryable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportFailure {
    ConnectionRefused,
    Timeout,
    ConnectionReset,
    Other(String),
}

impl fmt::Display for TransportFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionRefused => write!(f, "connection refused"),
            Self::Timeout => write!(f, "timeout"),
            Self::ConnectionReset => write!(f, "connection reset"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

/// Why an outcome was judged retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryReason {
    Transport,
    ServerError,
    RateLimited,
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport => write!(f, "transport"),
            Self::ServerError => write!(f, "server_error"),
            Self::RateLimited => write!(f, "rate_limited"),
        }
    }
}

/// Result of classifying a single outcome, ignoring the attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    Retryable(RetryReason),
    Fatal,
}

/// Pure decision value handed to the send loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub retry: bool,
    pub delay: Duration,
    pub reason: Option<RetryReason>,
}

impl RetryDecision {
    fn fatal() -> Self {
        Self {
            retry: false,
            delay: Duration::ZERO,
            reason: None,
        }
    }
}

/// Exponential-backoff retry policy for outbound calls.
///
/// Defaults mirror the upstream client contract: 1s initial delay, 5s cap,
/// three attempts total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Hard cap on any single backoff delay.
    pub max_delay: Duration,
    /// Total attempts, the first included.
    pub max_attempts: u32,
    /// Randomize delays by up to +10% to spread thundering herds.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(5000),
            max_attempts: 3,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Classify an outcome. Rules are ordered; the first match wins:
    /// transport failures, then 5xx, then 429 are retryable; everything else,
    /// 4xx included, is fatal.
    pub fn classify(outcome: &CallOutcome) -> FailureClass {
        match outcome {
            CallOutcome::Transport(_) => FailureClass::Retryable(RetryReason::Transport),
            CallOutcome::Response(response) if response.status >= 500 => {
                FailureClass::Retryable(RetryReason::ServerError)
            }
            CallOutcome::Response(response) if response.status == 429 => {
                FailureClass::Retryable(RetryReason::RateLimited)
            }
            CallOutcome::Response(_) => FailureClass::Fatal,
        }
    }

    /// Backoff before the attempt after `attempt` (1-based):
    /// `min(cap, initial * 2^(attempt-1))`.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let scaled = self
            .initial_delay
            .saturating_mul(2u32.saturating_pow(exponent));
        let capped = scaled.min(self.max_delay);

        if self.jitter {
            capped.mul_f64(1.0 + fastrand::f64() * 0.1)
        } else {
            capped
        }
    }

    /// Decide whether attempt `attempt` (1-based) may be followed by another.
    /// Once the ceiling is reached the decision is fatal regardless of
    /// classification; the caller surfaces the last outcome verbatim.
    pub fn decide(&self, outcome: &CallOutcome, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::fatal();
        }

        match Self::classify(outcome) {
            FailureClass::Retryable(reason) => RetryDecision {
                retry: true,
                delay: self.backoff_delay(attempt),
                reason: Some(reason),
            },
            FailureClass::Fatal => RetryDecision::fatal(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16) -> CallOutcome {
        CallOutcome::Response(OutboundResponse {
            status,
            body: Vec::new(),
        })
    }

    #[test]
    fn transport_failures_are_retryable() {
        for failure in [
            TransportFailure::ConnectionRefused,
            TransportFailure::Timeout,
            TransportFailure::ConnectionReset,
        ] {
            let outcome = CallOutcome::Transport(failure);
            assert_eq!(
                RetryPolicy::classify(&outcome),
                FailureClass::Retryable(RetryReason::Transport)
            );
        }
    }

    #[test]
    fn server_errors_and_rate_limits_are_retryable() {
        assert_eq!(
            RetryPolicy::classify(&response(500)),
            FailureClass::Retryable(RetryReason::ServerError)
        );
        assert_eq!(
            RetryPolicy::classify(&response(503)),
            FailureClass::Retryable(RetryReason::ServerError)
        );
        assert_eq!(
            RetryPolicy::classify(&response(429)),
            FailureClass::Retryable(RetryReason::RateLimited)
        );
    }

    #[test]
    fn client_errors_are_fatal() {
        for status in [400, 401, 403, 404, 409, 418] {
            assert_eq!(RetryPolicy::classify(&response(status)), FailureClass::Fatal);
        }
    }

    #[test]
    fn backoff_sequence_doubles_until_cap() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.backoff_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.backoff_delay(3), Duration::from_millis(4000));
        // Attempt 4 would double to 8000 but is capped.
        assert_eq!(policy.backoff_delay(4), Duration::from_millis(5000));
        assert_eq!(policy.backoff_delay(12), Duration::from_millis(5000));
    }

    #[test]
    fn decision_is_fatal_at_attempt_ceiling() {
        let policy = RetryPolicy::default();
        let outcome = response(500);

        assert!(policy.decide(&outcome, 1).retry);
        assert!(policy.decide(&outcome, 2).retry);

        // Third attempt exhausts the budget even for a retryable outcome.
        let last = policy.decide(&outcome, 3);
        assert!(!last.retry);
        assert_eq!(last.delay, Duration::ZERO);
    }

    #[test]
    fn fatal_outcome_never_retried_with_budget_remaining() {
        let policy = RetryPolicy::default();
        let decision = policy.decide(&response(404), 1);
        assert!(!decision.retry);
        assert_eq!(decision.reason, None);
    }

    #[test]
    fn jitter_stays_within_ten_percent() {
        let policy = RetryPolicy {
            jitter: true,
            ..RetryPolicy::default()
        };

        for _ in 0..100 {
            let delay = policy.backoff_delay(1);
            assert!(delay >= Duration::from_millis(1000));
            assert!(delay <= Duration::from_millis(1100));
        }
    }
}
