//! # Person Model
//!
//! The domain record of the roster service, with its storage collaborator
//! trait and the Postgres implementation.
//!
//! ## Database Schema
//!
//! Maps to the `persons` table:
//! - `id`: storage-assigned identity (BIGSERIAL)
//! - `name`: unique display name (TEXT)
//! - `age`: whole years (INT)
//!
//! The Postgres store also owns the transactional write-publish seam: the
//! `*_with_event` operations insert the record row and its outbox row inside
//! one transaction, so a commit makes both durable or neither.

use crate::events::event::{DomainEvent, PersonEventKind};
use crate::events::outbox::{OutboxMessage, OutboxStore};
use crate::models::StorageError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use tracing::debug;

/// A persisted roster record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Person {
    pub id: i64,
    pub name: String,
    pub age: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for a new record, post-validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPerson {
    pub name: String,
    pub age: i32,
}

/// Partial update; `None` fields keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersonPatch {
    pub name: Option<String>,
    pub age: Option<i32>,
}

/// Sort orders accepted by the paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    IdAsc,
    IdDesc,
    NameAsc,
    NameDesc,
}

impl SortOrder {
    /// Static ORDER BY fragment; never built from user input.
    fn as_sql(self) -> &'static str {
        match self {
            Self::IdAsc => "id ASC",
            Self::IdDesc => "id DESC",
            Self::NameAsc => "name ASC, id ASC",
            Self::NameDesc => "name DESC, id ASC",
        }
    }
}

/// Offset/limit page request.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub offset: i64,
    pub limit: i64,
    pub sort: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 20,
            sort: SortOrder::IdAsc,
        }
    }
}

/// One page of results plus the total row count.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

impl<T> Page<T> {
    pub fn has_more(&self) -> bool {
        self.offset + (self.items.len() as i64) < self.total
    }
}

/// Storage collaborator contract. Identity is opaque, storage-assigned and
/// monotonically unique; racing writers are serialized only by the storage
/// layer's own concurrency control.
#[async_trait]
pub trait PersonStore: Send + Sync {
    async fn create(&self, new_person: NewPerson) -> Result<Person, StorageError>;
    async fn find_by_id(&self, id: i64) -> Result<Option<Person>, StorageError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Person>, StorageError>;
    async fn update(&self, id: i64, patch: PersonPatch) -> Result<Option<Person>, StorageError>;
    async fn delete(&self, id: i64) -> Result<bool, StorageError>;
    async fn find_page(&self, page: PageRequest) -> Result<Page<Person>, StorageError>;
}

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgPersonStore {
    pool: PgPool,
}

const PERSON_COLUMNS: &str = "id, name, age, created_at, updated_at";

impl PgPersonStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn insert_person(
        tx: &mut Transaction<'_, Postgres>,
        new_person: &NewPerson,
    ) -> Result<Person, StorageError> {
        let sql = format!(
            "INSERT INTO persons (name, age) VALUES ($1, $2) RETURNING {PERSON_COLUMNS}"
        );
        sqlx::query_as::<_, Person>(&sql)
            .bind(&new_person.name)
            .bind(new_person.age)
            .fetch_one(&mut **tx)
            .await
            .map_err(StorageError::from)
    }

    async fn update_person(
        tx: &mut Transaction<'_, Postgres>,
        id: i64,
        patch: &PersonPatch,
    ) -> Result<Option<Person>, StorageError> {
        let sql = format!(
            "UPDATE persons \
             SET name = COALESCE($2, name), age = COALESCE($3, age), updated_at = now() \
             WHERE id = $1 RETURNING {PERSON_COLUMNS}"
        );
        sqlx::query_as::<_, Person>(&sql)
            .bind(id)
            .bind(patch.name.as_deref())
            .bind(patch.age)
            .fetch_optional(&mut **tx)
            .await
            .map_err(StorageError::from)
    }

    async fn insert_outbox_row(
        tx: &mut Transaction<'_, Postgres>,
        event: &DomainEvent,
    ) -> Result<OutboxMessage, StorageError> {
        sqlx::query_as::<_, OutboxMessage>(
            "INSERT INTO person_outbox (topic, partition_key, event_id, kind, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, topic, partition_key, event_id, kind, payload, status, attempts, \
                       last_error, created_at, delivered_at",
        )
        .bind(&event.topic)
        .bind(&event.partition_key)
        .bind(event.event_id)
        .bind(event.kind.to_string())
        .bind(&event.payload)
        .fetch_one(&mut **tx)
        .await
        .map_err(StorageError::from)
    }
}

#[async_trait]
impl PersonStore for PgPersonStore {
    async fn create(&self, new_person: NewPerson) -> Result<Person, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let person = Self::insert_person(&mut tx, &new_person).await?;
        tx.commit().await.map_err(StorageError::from)?;

        debug!(person_id = person.id, name = %person.name, "Person row created");
        Ok(person)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Person>, StorageError> {
        let sql = format!("SELECT {PERSON_COLUMNS} FROM persons WHERE id = $1");
        sqlx::query_as::<_, Person>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Person>, StorageError> {
        let sql = format!("SELECT {PERSON_COLUMNS} FROM persons WHERE name = $1");
        sqlx::query_as::<_, Person>(&sql)
            .bind(name)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)
    }

    async fn update(&self, id: i64, patch: PersonPatch) -> Result<Option<Person>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let updated = Self::update_person(&mut tx, id, &patch).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(updated)
    }

    async fn delete(&self, id: i64) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM persons WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_page(&self, page: PageRequest) -> Result<Page<Person>, StorageError> {
        let sql = format!(
            "SELECT {PERSON_COLUMNS} FROM persons ORDER BY {} OFFSET $1 LIMIT $2",
            page.sort.as_sql()
        );
        let items = sqlx::query_as::<_, Person>(&sql)
            .bind(page.offset)
            .bind(page.limit)
            .fetch_all(&self.pool)
            .await
            .map_err(StorageError::from)?;

        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM persons")
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(Page {
            items,
            total: total.0,
            offset: page.offset,
            limit: page.limit,
        })
    }
}

#[async_trait]
impl OutboxStore for PgPersonStore {
    async fn create_person_with_event(
        &self,
        new_person: NewPerson,
        topic: &str,
    ) -> Result<(Person, OutboxMessage), StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let person = Self::insert_person(&mut tx, &new_person).await?;
        let event = DomainEvent::for_person(topic, PersonEventKind::Created, &person);
        let outbox = Self::insert_outbox_row(&mut tx, &event).await?;
        tx.commit().await.map_err(StorageError::from)?;

        debug!(
            person_id = person.id,
            outbox_id = outbox.id,
            topic = %topic,
            "Person created with outbox event"
        );
        Ok((person, outbox))
    }

    async fn update_person_with_event(
        &self,
        id: i64,
        patch: PersonPatch,
        topic: &str,
    ) -> Result<Option<(Person, OutboxMessage)>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let Some(person) = Self::update_person(&mut tx, id, &patch).await? else {
            tx.rollback().await.map_err(StorageError::from)?;
            return Ok(None);
        };
        let event = DomainEvent::for_person(topic, PersonEventKind::Updated, &person);
        let outbox = Self::insert_outbox_row(&mut tx, &event).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(Some((person, outbox)))
    }

    async fn delete_person_with_event(
        &self,
        id: i64,
        topic: &str,
    ) -> Result<Option<(Person, OutboxMessage)>, StorageError> {
        let mut tx = self.pool.begin().await.map_err(StorageError::from)?;
        let sql = format!("DELETE FROM persons WHERE id = $1 RETURNING {PERSON_COLUMNS}");
        let Some(person) = sqlx::query_as::<_, Person>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(StorageError::from)?
        else {
            tx.rollback().await.map_err(StorageError::from)?;
            return Ok(None);
        };
        let event = DomainEvent::for_person(topic, PersonEventKind::Deleted, &person);
        let outbox = Self::insert_outbox_row(&mut tx, &event).await?;
        tx.commit().await.map_err(StorageError::from)?;
        Ok(Some((person, outbox)))
    }

    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxMessage>, StorageError> {
        sqlx::query_as::<_, OutboxMessage>(
            "SELECT id, topic, partition_key, event_id, kind, payload, status, attempts, \
                    last_error, created_at, delivered_at \
             FROM person_outbox WHERE status = 'pending' ORDER BY id ASC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(StorageError::from)
    }

    async fn mark_delivered(&self, outbox_id: i64) -> Result<(), StorageError> {
        sqlx::query(
            "UPDATE person_outbox SET status = 'delivered', delivered_at = now() WHERE id = $1",
        )
        .bind(outbox_id)
        .execute(&self.pool)
        .await
        .map_err(StorageError::from)?;
        Ok(())
    }

    async fn mark_failed(
        &self,
        outbox_id: i64,
        error: &str,
        max_attempts: i32,
    ) -> Result<crate::events::outbox::OutboxStatus, StorageError> {
        let (status,): (String,) = sqlx::query_as(
            "UPDATE person_outbox \
             SET attempts = attempts + 1, \
                 last_error = $2, \
                 status = CASE WHEN attempts + 1 >= $3 THEN 'dead' ELSE 'pending' END \
             WHERE id = $1 RETURNING status",
        )
        .bind(outbox_id)
        .bind(error)
        .bind(max_attempts)
        .fetch_one(&self.pool)
        .await
        .map_err(StorageError::from)?;

        status
            .parse()
            .map_err(|reason: String| StorageError::Unavailable(reason))
    }
}
