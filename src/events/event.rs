//! Domain events emitted by the write-publish pipeline.

use crate::models::person::Person;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle moments of a person record. The serialized form is the event
/// name downstream consumers subscribe on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonEventKind {
    #[serde(rename = "person.created")]
    Created,
    #[serde(rename = "person.updated")]
    Updated,
    #[serde(rename = "person.deleted")]
    Deleted,
}

impl fmt::Display for PersonEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "person.created"),
            Self::Updated => write!(f, "person.updated"),
            Self::Deleted => write!(f, "person.deleted"),
        }
    }
}

impl FromStr for PersonEventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "person.created" => Ok(Self::Created),
            "person.updated" => Ok(Self::Updated),
            "person.deleted" => Ok(Self::Deleted),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// One domain event bound for a topic.
///
/// The partition key is derived deterministically from the record identity,
/// so every publish (and republish) of the same logical event lands on the
/// same key: consumers dedup on `event_id` and order per key. Created once
/// per committed domain write; ownership moves to the publisher (or the
/// outbox row) at enqueue time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub topic: String,
    pub partition_key: String,
    pub event_id: Uuid,
    pub kind: PersonEventKind,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl DomainEvent {
    /// Build the event for a person lifecycle moment. Same person identity,
    /// same partition key, on every call.
    pub fn for_person(topic: &str, kind: PersonEventKind, person: &Person) -> Self {
        Self {
            topic: topic.to_string(),
            partition_key: Self::partition_key_for(person.id),
            event_id: Uuid::new_v4(),
            kind,
            payload: serde_json::json!({
                "id": person.id,
                "name": person.name,
                "age": person.age,
                "updated_at": person.updated_at,
            }),
            occurred_at: Utc::now(),
        }
    }

    /// Deterministic partition key for a record identity.
    pub fn partition_key_for(person_id: i64) -> String {
        format!("person-{person_id}")
    }
}
