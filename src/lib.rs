#![allow(clippy::doc_markdown)] // Allow technical terms like PostgreSQL, SQLx in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Roster Core
//!
//! Resilient write-then-publish core for a people-roster record service.
//!
//! ## Overview
//!
//! Every business write emits a domain event, and this crate makes that pair
//! reliable: the write and its event commit in one PostgreSQL transaction
//! (transactional outbox), a background relay delivers the events
//! at-least-once with per-key ordering, and outbound HTTP calls ride an
//! exponential-backoff retry engine that distinguishes transient trouble
//! from permanent rejection.
//!
//! ## Module Organization
//!
//! - [`models`] - Person records and the Postgres store
//! - [`events`] - Domain events, publisher seam, outbox relay
//! - [`resilience`] - Retry policy engine and resilient HTTP client
//! - [`orchestration`] - Write-publish pipeline and its state machine
//! - [`services`] - CRUD facade and upstream content search
//! - [`validation`] - Input constraints for person writes
//! - [`config`] - File + environment configuration
//! - [`error`] - Crate-level error aggregation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use roster_core::config::RosterConfig;
//! use roster_core::events::PgmqEventPublisher;
//! use roster_core::models::PgPersonStore;
//! use roster_core::orchestration::WritePipeline;
//! use roster_core::services::PersonService;
//! use roster_core::validation::CreatePersonRequest;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = RosterConfig::load()?;
//! let pool = sqlx::PgPool::connect(&config.database.url).await?;
//! let store = Arc::new(PgPersonStore::new(pool));
//! let publisher = Arc::new(PgmqEventPublisher::new(config.broker_url()).await?);
//!
//! let pipeline = WritePipeline::new(
//!     Arc::clone(&store),
//!     Arc::clone(&publisher),
//!     config.broker.person_topic.clone(),
//!     config.outbox.strategy,
//! );
//! let service = PersonService::new(store, pipeline);
//!
//! let outcome = service
//!     .create(CreatePersonRequest { name: "Ada".to_string(), age: 36 })
//!     .await?;
//! println!("created person {}", outcome.value().id);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod resilience;
pub mod services;
pub mod validation;

// Core exports for the common write-publish path
pub use config::RosterConfig;
pub use error::{Result, RosterError};
pub use events::{DomainEvent, EventPublisher, OutboxRelay, PgmqEventPublisher};
pub use models::{Person, PersonStore, PgPersonStore};
pub use orchestration::{PublishStrategy, WriteOutcome, WritePipeline};
pub use services::PersonService;
