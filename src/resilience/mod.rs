//! # Resilience Module
//!
//! Retry classification and the retrying outbound client.
//!
//! The split mirrors the contract: [`retry_policy`] is the pure decision
//! engine (classify an outcome, compute backoff), [`client`] owns the send
//! loop and every side effect, and [`http`] provides the reqwest transport.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use roster_core::resilience::{HttpTransport, OutboundRequest, ResilientClient, RetryPolicy};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(Duration::from_secs(10))?;
//! let client = ResilientClient::new(transport, RetryPolicy::default());
//!
//! let response = client.execute(&OutboundRequest::get("https://upstream.example/ping")).await?;
//! println!("upstream answered with {}", response.status);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod http;
pub mod retry_policy;

pub use client::{
    CallAttempt, CallTransport, ClientError, HttpMethod, OutboundRequest, ResilientClient,
};
pub use http::HttpTransport;
pub use retry_policy::{
    CallOutcome, FailureClass, OutboundResponse, RetryDecision, RetryPolicy, RetryReason,
    TransportFailure,
};
