//! Retry behavior of the resilient client, end to end over a scripted
//! transport: attempt budgets, fatal short-circuits, and backoff timing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

use roster_core::resilience::{
    CallOutcome, CallTransport, ClientError, OutboundRequest, OutboundResponse, ResilientClient,
    RetryPolicy, TransportFailure,
};

// Shared inner state so one clone goes into the client and the other keeps
// the assertion handles.
#[derive(Clone)]
struct ScriptedTransport {
    outcomes: Arc<Mutex<VecDeque<CallOutcome>>>,
    sends: Arc<AtomicU32>,
}

impl ScriptedTransport {
    fn new(outcomes: Vec<CallOutcome>) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(outcomes.into())),
            sends: Arc::new(AtomicU32::new(0)),
        }
    }

    fn sends(&self) -> u32 {
        self.sends.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallTransport for ScriptedTransport {
    async fn send(&self, _request: &OutboundRequest) -> CallOutcome {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .pop_front()
            .expect("transport script ran out of outcomes")
    }
}

fn status(code: u16) -> CallOutcome {
    CallOutcome::Response(OutboundResponse {
        status: code,
        body: Vec::new(),
    })
}

#[tokio::test(start_paused = true)]
async fn persistent_server_errors_consume_exactly_the_attempt_budget() {
    let transport = ScriptedTransport::new(vec![
        status(500),
        CallOutcome::Transport(TransportFailure::Timeout),
        status(503),
    ]);
    let client = ResilientClient::new(transport.clone(), RetryPolicy::default());

    let error = client
        .execute(&OutboundRequest::get("http://upstream/page"))
        .await
        .unwrap_err();

    assert_eq!(transport.sends(), 3);
    match error {
        ClientError::TransientExhausted {
            attempts,
            last_outcome,
        } => {
            assert_eq!(attempts, 3);
            assert_eq!(last_outcome.status(), Some(503));
        }
        other => panic!("expected TransientExhausted, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn rate_limiting_is_retried_like_a_server_error() {
    let transport = ScriptedTransport::new(vec![status(429), status(429), status(200)]);
    let client = ResilientClient::new(transport.clone(), RetryPolicy::default());

    let response = assert_ok!(
        client
            .execute(&OutboundRequest::get("http://upstream/page"))
            .await
    );

    assert_eq!(response.status, 200);
    assert_eq!(transport.sends(), 3);
}

#[tokio::test(start_paused = true)]
async fn not_found_fails_fatally_on_the_first_attempt() {
    let transport = ScriptedTransport::new(vec![status(404)]);
    let client = ResilientClient::new(transport.clone(), RetryPolicy::default());

    let started = tokio::time::Instant::now();
    let error = assert_err!(
        client
            .execute(&OutboundRequest::get("http://upstream/missing"))
            .await
    );

    // No backoff was taken: a fatal outcome returns without sleeping.
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(transport.sends(), 1);
    match error {
        ClientError::Fatal { outcome } => assert_eq!(outcome.status(), Some(404)),
        other => panic!("expected Fatal, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_from_the_initial_delay() {
    // Three attempts take two backoffs: 1000ms then 2000ms.
    let transport = ScriptedTransport::new(vec![status(500), status(500), status(500)]);
    let client = ResilientClient::new(transport.clone(), RetryPolicy::default());

    let started = tokio::time::Instant::now();
    let _ = client
        .execute(&OutboundRequest::get("http://upstream/page"))
        .await;

    assert_eq!(started.elapsed(), Duration::from_millis(3000));
}

#[tokio::test(start_paused = true)]
async fn backoff_is_capped_at_the_policy_maximum() {
    let policy = RetryPolicy {
        max_attempts: 5,
        ..RetryPolicy::default()
    };
    // Delays: 1000, 2000, 4000, then 8000 capped to 5000 = 12000ms total.
    let transport = ScriptedTransport::new(vec![
        status(500),
        status(500),
        status(500),
        status(500),
        status(500),
    ]);
    let client = ResilientClient::new(transport.clone(), policy);

    let started = tokio::time::Instant::now();
    let _ = client
        .execute(&OutboundRequest::get("http://upstream/page"))
        .await;

    assert_eq!(started.elapsed(), Duration::from_millis(12_000));
    assert_eq!(transport.sends(), 5);
}
