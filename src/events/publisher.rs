//! # Event Publisher
//!
//! Producer-side contract for handing [`DomainEvent`]s to the broker, plus
//! the pgmq-backed implementation.
//!
//! Delivery is at-least-once: the broker may redeliver, and the relay will
//! re-publish anything it could not confirm. Idempotence is achieved on the
//! consumer side by deduplicating on the envelope's `event_id`, which is
//! stable across republishes of the same logical event; the deterministic
//! partition key gives per-record ordering. Consumers must read only
//! committed rows and tolerate redelivery.

use crate::events::event::DomainEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgmq::PGMQueue;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Broker acknowledgement for one accepted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message_id: i64,
    pub topic: String,
}

/// Publish failures. Serialization problems are permanent; broker
/// unavailability is transient and retried by the outbox relay.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("broker unavailable: {message}")]
    BrokerUnavailable { message: String },

    #[error("event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Producer seam. The underlying transport multiplexes concurrent publishes
/// over a shared connection; implementations take `&self` and need no
/// external locking.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<Ack, PublishError>;
}

/// Wire envelope written to the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: uuid::Uuid,
    pub partition_key: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
    pub published_at: DateTime<Utc>,
}

impl EventEnvelope {
    fn from_event(event: &DomainEvent) -> Self {
        Self {
            event_id: event.event_id,
            partition_key: event.partition_key.clone(),
            kind: event.kind.to_string(),
            payload: event.payload.clone(),
            occurred_at: event.occurred_at,
            published_at: Utc::now(),
        }
    }
}

/// pgmq-backed publisher: one queue per topic.
#[derive(Debug, Clone)]
pub struct PgmqEventPublisher {
    pgmq: PGMQueue,
}

impl PgmqEventPublisher {
    /// Connect with a database URL.
    pub async fn new(database_url: &str) -> Result<Self, PublishError> {
        info!("🚀 Connecting event publisher to pgmq");

        let pgmq = PGMQueue::new(database_url.to_string())
            .await
            .map_err(|e| PublishError::BrokerUnavailable {
                message: format!("pgmq connection failed: {e}"),
            })?;

        info!("✅ Event publisher connected");
        Ok(Self { pgmq })
    }

    /// Reuse an existing connection pool.
    pub async fn new_with_pool(pool: sqlx::PgPool) -> Self {
        info!("🚀 Creating event publisher with shared connection pool");
        let pgmq = PGMQueue::new_with_pool(pool).await;
        Self { pgmq }
    }

    /// Create the topic queue if it does not exist. Idempotent; called once
    /// at startup per configured topic.
    pub async fn ensure_topic(&self, topic: &str) -> Result<(), PublishError> {
        debug!(topic = %topic, "📋 Ensuring topic queue exists");

        self.pgmq
            .create(topic)
            .await
            .map_err(|e| PublishError::BrokerUnavailable {
                message: format!("failed to create topic {topic}: {e}"),
            })?;

        info!(topic = %topic, "✅ Topic queue ready");
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for PgmqEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<Ack, PublishError> {
        let envelope = EventEnvelope::from_event(event);
        // Surface malformed payloads as Serialization before touching the
        // broker.
        let serialized = serde_json::to_value(&envelope)?;

        debug!(
            topic = %event.topic,
            partition_key = %event.partition_key,
            event_id = %event.event_id,
            "📤 Publishing event"
        );

        let message_id = self
            .pgmq
            .send(&event.topic, &serialized)
            .await
            .map_err(|e| PublishError::BrokerUnavailable {
                message: format!("send to {} failed: {e}", event.topic),
            })?;

        info!(
            topic = %event.topic,
            partition_key = %event.partition_key,
            message_id,
            "✅ Event acknowledged"
        );

        Ok(Ack {
            message_id,
            topic: event.topic.clone(),
        })
    }
}
