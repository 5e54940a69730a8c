//! # Write-Publish Pipeline
//!
//! ## Overview
//!
//! Orchestrates a business write and its domain event as one operation:
//! validate, persist, publish, in that order. Two publish strategies are
//! supported:
//!
//! - **TransactionalOutbox** (default): the event row commits in the same
//!   database transaction as the write; the background relay delivers it
//!   later. A committed write therefore always has a durable event.
//! - **DirectAfterCommit**: the event goes straight to the broker after the
//!   write commits. If the broker is down the write survives and the caller
//!   gets a `Degraded` outcome, never a silent loss.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let pipeline = WritePipeline::new(store, publisher, "person_events", PublishStrategy::default());
//! match pipeline.create(request).await? {
//!     WriteOutcome::Completed(person) => info!("created person {}", person.id),
//!     WriteOutcome::Degraded { value, cause } => warn!("created {} but event is pending: {}", value.id, cause),
//! }
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::events::{DomainEvent, EventPublisher, OutboxStore, PersonEventKind, PublishError};
use crate::models::{Person, PersonStore, StorageError};
use crate::orchestration::states::WriteState;
use crate::validation::{
    validate_create, validate_update, CreatePersonRequest, UpdatePersonRequest, ValidationErrors,
};

/// How a committed write's event reaches the broker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishStrategy {
    /// Event row commits with the write; the relay delivers it asynchronously.
    #[default]
    TransactionalOutbox,
    /// Publish synchronously after commit; broker failure degrades the result.
    DirectAfterCommit,
}

/// Result of a successful write. `Degraded` means the storage write is
/// durable but the event could not be confirmed.
#[derive(Debug)]
pub enum WriteOutcome<T> {
    Completed(T),
    Degraded { value: T, cause: PublishError },
}

impl<T> WriteOutcome<T> {
    /// The persisted value, regardless of event delivery.
    pub fn value(&self) -> &T {
        match self {
            Self::Completed(value) => value,
            Self::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Completed(value) => value,
            Self::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn state(&self) -> WriteState {
        match self {
            Self::Completed(_) => WriteState::Done,
            Self::Degraded { .. } => WriteState::Degraded,
        }
    }
}

/// Failure modes of a write-publish run. Both variants guarantee nothing
/// was published.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Input rejected before any storage access
    #[error("validation failed: {0}")]
    Rejected(#[from] ValidationErrors),

    /// Storage write failed; the transaction rolled back
    #[error("storage write failed: {0}")]
    Failed(#[from] StorageError),
}

impl WriteError {
    pub fn state(&self) -> WriteState {
        match self {
            Self::Rejected(_) => WriteState::Rejected,
            Self::Failed(_) => WriteState::Failed,
        }
    }
}

/// Write-publish orchestrator over a storage seam and a publisher seam.
pub struct WritePipeline<S, P>
where
    S: PersonStore + OutboxStore,
    P: EventPublisher,
{
    store: Arc<S>,
    publisher: Arc<P>,
    topic: String,
    strategy: PublishStrategy,
}

impl<S, P> WritePipeline<S, P>
where
    S: PersonStore + OutboxStore,
    P: EventPublisher,
{
    pub fn new(
        store: Arc<S>,
        publisher: Arc<P>,
        topic: impl Into<String>,
        strategy: PublishStrategy,
    ) -> Self {
        Self {
            store,
            publisher,
            topic: topic.into(),
            strategy,
        }
    }

    pub fn strategy(&self) -> PublishStrategy {
        self.strategy
    }

    /// Validate, persist, and publish a new person.
    pub async fn create(
        &self,
        request: CreatePersonRequest,
    ) -> Result<WriteOutcome<Person>, WriteError> {
        debug!(operation = "create", state = %WriteState::Start, "🚀 Write-publish run starting");
        let new_person = validate_create(&request)?;
        debug!(operation = "create", state = %WriteState::Validated, "Input validated");

        match self.strategy {
            PublishStrategy::TransactionalOutbox => {
                let (person, outbox) = self
                    .store
                    .create_person_with_event(new_person, &self.topic)
                    .await?;
                info!(
                    person_id = person.id,
                    outbox_id = outbox.id,
                    event_id = %outbox.event_id,
                    state = %WriteState::Done,
                    "✅ Person created; event committed to outbox"
                );
                Ok(WriteOutcome::Completed(person))
            }
            PublishStrategy::DirectAfterCommit => {
                let person = self.store.create(new_person).await?;
                debug!(person_id = person.id, state = %WriteState::Persisted, "Write committed");
                Ok(self
                    .publish_direct(person, PersonEventKind::Created, "create")
                    .await)
            }
        }
    }

    /// Validate, persist, and publish an update. `Ok(None)` when the person
    /// does not exist.
    pub async fn update(
        &self,
        id: i64,
        request: UpdatePersonRequest,
    ) -> Result<Option<WriteOutcome<Person>>, WriteError> {
        debug!(operation = "update", person_id = id, state = %WriteState::Start, "🚀 Write-publish run starting");
        let patch = validate_update(&request)?;
        debug!(operation = "update", person_id = id, state = %WriteState::Validated, "Input validated");

        match self.strategy {
            PublishStrategy::TransactionalOutbox => {
                let Some((person, outbox)) = self
                    .store
                    .update_person_with_event(id, patch, &self.topic)
                    .await?
                else {
                    return Ok(None);
                };
                info!(
                    person_id = person.id,
                    outbox_id = outbox.id,
                    event_id = %outbox.event_id,
                    state = %WriteState::Done,
                    "✅ Person updated; event committed to outbox"
                );
                Ok(Some(WriteOutcome::Completed(person)))
            }
            PublishStrategy::DirectAfterCommit => {
                let Some(person) = self.store.update(id, patch).await? else {
                    return Ok(None);
                };
                debug!(person_id = person.id, state = %WriteState::Persisted, "Write committed");
                Ok(Some(
                    self.publish_direct(person, PersonEventKind::Updated, "update")
                        .await,
                ))
            }
        }
    }

    /// Delete a person and publish `person.deleted`. `Ok(None)` when the
    /// person does not exist.
    pub async fn delete(&self, id: i64) -> Result<Option<WriteOutcome<Person>>, WriteError> {
        debug!(operation = "delete", person_id = id, state = %WriteState::Start, "🚀 Write-publish run starting");

        match self.strategy {
            PublishStrategy::TransactionalOutbox => {
                let Some((person, outbox)) =
                    self.store.delete_person_with_event(id, &self.topic).await?
                else {
                    return Ok(None);
                };
                info!(
                    person_id = person.id,
                    outbox_id = outbox.id,
                    event_id = %outbox.event_id,
                    state = %WriteState::Done,
                    "✅ Person deleted; event committed to outbox"
                );
                Ok(Some(WriteOutcome::Completed(person)))
            }
            PublishStrategy::DirectAfterCommit => {
                // Snapshot first so the event still carries the final record.
                let Some(person) = self.store.find_by_id(id).await? else {
                    return Ok(None);
                };
                if !self.store.delete(id).await? {
                    return Ok(None);
                }
                debug!(person_id = person.id, state = %WriteState::Persisted, "Write committed");
                Ok(Some(
                    self.publish_direct(person, PersonEventKind::Deleted, "delete")
                        .await,
                ))
            }
        }
    }

    /// Direct-mode tail: the write is already committed, so a publish
    /// failure degrades the outcome instead of failing the operation.
    async fn publish_direct(
        &self,
        person: Person,
        kind: PersonEventKind,
        operation: &str,
    ) -> WriteOutcome<Person> {
        let event = DomainEvent::for_person(&self.topic, kind, &person);
        match self.publisher.publish(&event).await {
            Ok(ack) => {
                info!(
                    operation,
                    person_id = person.id,
                    event_id = %event.event_id,
                    message_id = ack.message_id,
                    state = %WriteState::Done,
                    "✅ Write committed and event published"
                );
                WriteOutcome::Completed(person)
            }
            Err(cause) => {
                error!(
                    operation,
                    person_id = person.id,
                    event_id = %event.event_id,
                    partition_key = %event.partition_key,
                    kind = %event.kind,
                    error = %cause,
                    state = %WriteState::Degraded,
                    "🔴 Write committed but event publish failed"
                );
                WriteOutcome::Degraded {
                    value: person,
                    cause,
                }
            }
        }
    }
}
