//! # Person Service
//!
//! ## Overview
//!
//! Application-facing CRUD over the roster. Writes run through the
//! `WritePipeline` so every mutation carries its domain event; reads go
//! straight to the store.

use std::sync::Arc;

use tracing::{debug, info};

use crate::events::{EventPublisher, OutboxStore};
use crate::models::{Page, PageRequest, Person, PersonStore, StorageError};
use crate::orchestration::{WriteError, WriteOutcome, WritePipeline};
use crate::validation::{CreatePersonRequest, UpdatePersonRequest};

/// CRUD facade over the write pipeline and the store.
pub struct PersonService<S, P>
where
    S: PersonStore + OutboxStore,
    P: EventPublisher,
{
    store: Arc<S>,
    pipeline: WritePipeline<S, P>,
}

impl<S, P> PersonService<S, P>
where
    S: PersonStore + OutboxStore,
    P: EventPublisher,
{
    pub fn new(store: Arc<S>, pipeline: WritePipeline<S, P>) -> Self {
        Self { store, pipeline }
    }

    /// Create a person and its `person.created` event.
    pub async fn create(
        &self,
        request: CreatePersonRequest,
    ) -> Result<WriteOutcome<Person>, WriteError> {
        info!(name = %request.name, "📤 Creating person");
        let outcome = self.pipeline.create(request).await?;
        info!(person_id = outcome.value().id, state = %outcome.state(), "Person created");
        Ok(outcome)
    }

    pub async fn get(&self, id: i64) -> Result<Option<Person>, StorageError> {
        debug!(person_id = id, "Fetching person");
        self.store.find_by_id(id).await
    }

    pub async fn get_by_name(&self, name: &str) -> Result<Option<Person>, StorageError> {
        debug!(name, "Fetching person by name");
        self.store.find_by_name(name).await
    }

    /// Update a person and emit `person.updated`. `Ok(None)` when the id is
    /// unknown.
    pub async fn update(
        &self,
        id: i64,
        request: UpdatePersonRequest,
    ) -> Result<Option<WriteOutcome<Person>>, WriteError> {
        info!(person_id = id, "📤 Updating person");
        let outcome = self.pipeline.update(id, request).await?;
        if let Some(outcome) = &outcome {
            info!(person_id = id, state = %outcome.state(), "Person updated");
        } else {
            debug!(person_id = id, "Update target not found");
        }
        Ok(outcome)
    }

    /// Delete a person and emit `person.deleted`. `Ok(None)` when the id is
    /// unknown.
    pub async fn delete(&self, id: i64) -> Result<Option<WriteOutcome<Person>>, WriteError> {
        info!(person_id = id, "📤 Deleting person");
        let outcome = self.pipeline.delete(id).await?;
        if let Some(outcome) = &outcome {
            info!(person_id = id, state = %outcome.state(), "Person deleted");
        } else {
            debug!(person_id = id, "Delete target not found");
        }
        Ok(outcome)
    }

    pub async fn list(&self, page: PageRequest) -> Result<Page<Person>, StorageError> {
        debug!(
            offset = page.offset,
            limit = page.limit,
            "📋 Listing persons"
        );
        self.store.find_page(page).await
    }
}
