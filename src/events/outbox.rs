//! # Transactional Outbox
//!
//! The outbox row model, the storage seam for atomic write+enqueue, and the
//! relay that drains pending rows to the broker.
//!
//! An outbox row is inserted in the same transaction as its domain write, so
//! a committed record always has its event queued. The relay then publishes
//! at-least-once: rows stay `pending` until the broker acknowledges, move to
//! `delivered` on ack, and flip to `dead` once the delivery-attempt ceiling
//! is exceeded, with an error record so a lost event is never silent.

use crate::events::event::{DomainEvent, PersonEventKind};
use crate::events::publisher::EventPublisher;
use crate::models::person::{NewPerson, Person, PersonPatch};
use crate::models::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Delivery state of an outbox row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Awaiting (re)delivery by the relay.
    Pending,
    /// Broker acknowledged; terminal.
    Delivered,
    /// Delivery budget exhausted; terminal, operator attention required.
    Dead,
}

impl OutboxStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Dead)
    }
}

impl fmt::Display for OutboxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Delivered => write!(f, "delivered"),
            Self::Dead => write!(f, "dead"),
        }
    }
}

impl FromStr for OutboxStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "delivered" => Ok(Self::Delivered),
            "dead" => Ok(Self::Dead),
            other => Err(format!("invalid outbox status: {other}")),
        }
    }
}

/// One queued event row in `person_outbox`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct OutboxMessage {
    pub id: i64,
    pub topic: String,
    pub partition_key: String,
    pub event_id: Uuid,
    pub kind: String,
    pub payload: serde_json::Value,
    pub status: String,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    pub fn status(&self) -> Result<OutboxStatus, String> {
        self.status.parse()
    }

    /// Rehydrate the domain event for publishing. The stored `event_id` is
    /// reused so redeliveries stay deduplicable downstream.
    pub fn to_domain_event(&self) -> Result<DomainEvent, String> {
        let kind: PersonEventKind = self.kind.parse()?;
        Ok(DomainEvent {
            topic: self.topic.clone(),
            partition_key: self.partition_key.clone(),
            event_id: self.event_id,
            kind,
            payload: self.payload.clone(),
            occurred_at: self.created_at,
        })
    }
}

/// Storage seam for the outbox strategy: atomic domain write + event enqueue,
/// plus the relay's bookkeeping operations.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Insert the person and its `person.created` outbox row in one
    /// transaction.
    async fn create_person_with_event(
        &self,
        new_person: NewPerson,
        topic: &str,
    ) -> Result<(Person, OutboxMessage), StorageError>;

    /// Update the person and enqueue `person.updated` atomically. `None` if
    /// the record does not exist.
    async fn update_person_with_event(
        &self,
        id: i64,
        patch: PersonPatch,
        topic: &str,
    ) -> Result<Option<(Person, OutboxMessage)>, StorageError>;

    /// Delete the person and enqueue `person.deleted` atomically. `None` if
    /// the record does not exist.
    async fn delete_person_with_event(
        &self,
        id: i64,
        topic: &str,
    ) -> Result<Option<(Person, OutboxMessage)>, StorageError>;

    /// Oldest pending rows first; id order preserves per-key send order.
    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxMessage>, StorageError>;

    async fn mark_delivered(&self, outbox_id: i64) -> Result<(), StorageError>;

    /// Record a failed delivery attempt; returns the resulting status so the
    /// relay can tell a retry apart from a dead-letter.
    async fn mark_failed(
        &self,
        outbox_id: i64,
        error: &str,
        max_attempts: i32,
    ) -> Result<OutboxStatus, StorageError>;
}

/// Counters from one relay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub delivered: u64,
    pub retried: u64,
    pub dead_lettered: u64,
}

/// At-least-once relay from the outbox table to the broker.
///
/// Runs until shutdown is signalled; each tick drains up to `batch_size`
/// pending rows. A row that keeps failing is retried on later ticks until the
/// attempt ceiling, then dead-lettered.
pub struct OutboxRelay<S: OutboxStore, P: EventPublisher> {
    store: Arc<S>,
    publisher: Arc<P>,
    poll_interval: Duration,
    batch_size: i64,
    max_delivery_attempts: i32,
}

impl<S: OutboxStore, P: EventPublisher> OutboxRelay<S, P> {
    pub fn new(
        store: Arc<S>,
        publisher: Arc<P>,
        poll_interval: Duration,
        batch_size: i64,
        max_delivery_attempts: i32,
    ) -> Self {
        Self {
            store,
            publisher,
            poll_interval,
            batch_size,
            max_delivery_attempts,
        }
    }

    /// Poll until the shutdown channel fires. Storage errors are logged and
    /// the loop keeps going; the backlog is retried on the next tick.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            batch_size = self.batch_size,
            max_delivery_attempts = self.max_delivery_attempts,
            "🚀 Outbox relay started"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.drain_once().await {
                        warn!(error = %e, "Outbox drain pass failed, will retry");
                    }
                }
                _ = shutdown.changed() => {
                    info!("Outbox relay shutting down");
                    break;
                }
            }
        }
    }

    /// One drain pass: publish pending rows in id order. A row that fails
    /// and stays pending blocks every later row sharing its partition key
    /// until a following pass, so per-key send order survives the retry; a
    /// dead-lettered row releases its key. Exposed for deterministic tests
    /// and for drain-on-shutdown.
    pub async fn drain_once(&self) -> Result<RelayStats, StorageError> {
        let pending = self.store.fetch_pending(self.batch_size).await?;
        let mut stats = RelayStats::default();
        let mut blocked_keys: HashSet<String> = HashSet::new();

        for message in pending {
            if blocked_keys.contains(&message.partition_key) {
                debug!(
                    outbox_id = message.id,
                    partition_key = %message.partition_key,
                    "Holding row behind an undelivered predecessor for its key"
                );
                continue;
            }

            let event = match message.to_domain_event() {
                Ok(event) => event,
                Err(reason) => {
                    // Undecodable rows can never deliver; push them straight
                    // toward the dead-letter ceiling.
                    let status = self
                        .store
                        .mark_failed(message.id, &reason, self.max_delivery_attempts)
                        .await?;
                    if status == OutboxStatus::Pending {
                        blocked_keys.insert(message.partition_key.clone());
                    }
                    self.record_failure(&message, &reason, status, &mut stats);
                    continue;
                }
            };

            match self.publisher.publish(&event).await {
                Ok(ack) => {
                    self.store.mark_delivered(message.id).await?;
                    stats.delivered += 1;
                    debug!(
                        outbox_id = message.id,
                        message_id = ack.message_id,
                        partition_key = %message.partition_key,
                        "Outbox message delivered"
                    );
                }
                Err(e) => {
                    let reason = e.to_string();
                    let status = self
                        .store
                        .mark_failed(message.id, &reason, self.max_delivery_attempts)
                        .await?;
                    if status == OutboxStatus::Pending {
                        blocked_keys.insert(message.partition_key.clone());
                    }
                    self.record_failure(&message, &reason, status, &mut stats);
                }
            }
        }

        if stats != RelayStats::default() {
            info!(
                delivered = stats.delivered,
                retried = stats.retried,
                dead_lettered = stats.dead_lettered,
                "Outbox drain pass complete"
            );
        }
        Ok(stats)
    }

    fn record_failure(
        &self,
        message: &OutboxMessage,
        reason: &str,
        status: OutboxStatus,
        stats: &mut RelayStats,
    ) {
        if status == OutboxStatus::Dead {
            stats.dead_lettered += 1;
            error!(
                outbox_id = message.id,
                event_id = %message.event_id,
                partition_key = %message.partition_key,
                attempts = message.attempts + 1,
                error = %reason,
                "🔴 Outbox message dead-lettered"
            );
        } else {
            stats.retried += 1;
            warn!(
                outbox_id = message.id,
                partition_key = %message.partition_key,
                attempts = message.attempts + 1,
                error = %reason,
                "Outbox delivery failed, will retry"
            );
        }
    }
}
