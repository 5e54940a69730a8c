//! # Events Module
//!
//! Domain events, the producer contract, and the transactional outbox that
//! carries publish-after-commit ordering: an event row is written in the same
//! storage transaction as the business write and relayed to the broker
//! asynchronously, at-least-once, until acknowledged or dead-lettered.

pub mod event;
pub mod outbox;
pub mod publisher;

pub use event::{DomainEvent, PersonEventKind};
pub use outbox::{OutboxMessage, OutboxRelay, OutboxStatus, OutboxStore, RelayStats};
pub use publisher::{Ack, EventPublisher, PgmqEventPublisher, PublishError};
