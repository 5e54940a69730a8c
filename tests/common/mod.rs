//! Shared test doubles: an in-memory store implementing both storage seams,
//! and a scriptable publisher that records every invocation.

use std::collections::BTreeMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use roster_core::events::{
    Ack, DomainEvent, EventPublisher, OutboxMessage, OutboxStatus, OutboxStore, PersonEventKind,
    PublishError,
};
use roster_core::models::{
    NewPerson, Page, PageRequest, Person, PersonPatch, PersonStore, SortOrder, StorageError,
};

#[derive(Default)]
struct RosterState {
    persons: BTreeMap<i64, Person>,
    outbox: BTreeMap<i64, OutboxMessage>,
    next_person_id: i64,
    next_outbox_id: i64,
}

/// In-memory stand-in for the Postgres store. Both seams share one mutex so
/// the write-with-event operations are atomic the way a transaction is.
#[derive(Default)]
pub struct InMemoryRoster {
    state: Mutex<RosterState>,
}

impl InMemoryRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbox_rows(&self) -> Vec<OutboxMessage> {
        self.state.lock().unwrap().outbox.values().cloned().collect()
    }

    pub fn person_count(&self) -> usize {
        self.state.lock().unwrap().persons.len()
    }

    fn insert_person_locked(
        state: &mut RosterState,
        new_person: NewPerson,
    ) -> Result<Person, StorageError> {
        if state.persons.values().any(|p| p.name == new_person.name) {
            return Err(StorageError::ConstraintViolation(format!(
                "duplicate key value violates unique constraint \"persons_name_key\": {}",
                new_person.name
            )));
        }
        state.next_person_id += 1;
        let now = Utc::now();
        let person = Person {
            id: state.next_person_id,
            name: new_person.name,
            age: new_person.age,
            created_at: now,
            updated_at: now,
        };
        state.persons.insert(person.id, person.clone());
        Ok(person)
    }

    fn apply_patch_locked(
        state: &mut RosterState,
        id: i64,
        patch: PersonPatch,
    ) -> Result<Option<Person>, StorageError> {
        if let Some(name) = &patch.name {
            let taken = state
                .persons
                .values()
                .any(|p| p.id != id && &p.name == name);
            if taken {
                return Err(StorageError::ConstraintViolation(format!(
                    "duplicate key value violates unique constraint \"persons_name_key\": {name}"
                )));
            }
        }
        let Some(person) = state.persons.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = patch.name {
            person.name = name;
        }
        if let Some(age) = patch.age {
            person.age = age;
        }
        person.updated_at = Utc::now();
        Ok(Some(person.clone()))
    }

    fn enqueue_locked(
        state: &mut RosterState,
        topic: &str,
        kind: PersonEventKind,
        person: &Person,
    ) -> OutboxMessage {
        let event = DomainEvent::for_person(topic, kind, person);
        state.next_outbox_id += 1;
        let row = OutboxMessage {
            id: state.next_outbox_id,
            topic: event.topic,
            partition_key: event.partition_key,
            event_id: event.event_id,
            kind: event.kind.to_string(),
            payload: event.payload,
            status: OutboxStatus::Pending.to_string(),
            attempts: 0,
            last_error: None,
            created_at: event.occurred_at,
            delivered_at: None,
        };
        state.outbox.insert(row.id, row.clone());
        row
    }
}

#[async_trait]
impl PersonStore for InMemoryRoster {
    async fn create(&self, new_person: NewPerson) -> Result<Person, StorageError> {
        let mut state = self.state.lock().unwrap();
        Self::insert_person_locked(&mut state, new_person)
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<Person>, StorageError> {
        Ok(self.state.lock().unwrap().persons.get(&id).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Person>, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .persons
            .values()
            .find(|p| p.name == name)
            .cloned())
    }

    async fn update(&self, id: i64, patch: PersonPatch) -> Result<Option<Person>, StorageError> {
        let mut state = self.state.lock().unwrap();
        Self::apply_patch_locked(&mut state, id, patch)
    }

    async fn delete(&self, id: i64) -> Result<bool, StorageError> {
        Ok(self.state.lock().unwrap().persons.remove(&id).is_some())
    }

    async fn find_page(&self, page: PageRequest) -> Result<Page<Person>, StorageError> {
        let state = self.state.lock().unwrap();
        let mut items: Vec<Person> = state.persons.values().cloned().collect();
        match page.sort {
            SortOrder::IdAsc => items.sort_by_key(|p| p.id),
            SortOrder::IdDesc => items.sort_by_key(|p| std::cmp::Reverse(p.id)),
            SortOrder::NameAsc => items.sort_by(|a, b| a.name.cmp(&b.name)),
            SortOrder::NameDesc => items.sort_by(|a, b| b.name.cmp(&a.name)),
        }
        let total = items.len() as i64;
        let items: Vec<Person> = items
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        Ok(Page {
            items,
            total,
            offset: page.offset,
            limit: page.limit,
        })
    }
}

#[async_trait]
impl OutboxStore for InMemoryRoster {
    async fn create_person_with_event(
        &self,
        new_person: NewPerson,
        topic: &str,
    ) -> Result<(Person, OutboxMessage), StorageError> {
        let mut state = self.state.lock().unwrap();
        let person = Self::insert_person_locked(&mut state, new_person)?;
        let row = Self::enqueue_locked(&mut state, topic, PersonEventKind::Created, &person);
        Ok((person, row))
    }

    async fn update_person_with_event(
        &self,
        id: i64,
        patch: PersonPatch,
        topic: &str,
    ) -> Result<Option<(Person, OutboxMessage)>, StorageError> {
        let mut state = self.state.lock().unwrap();
        let Some(person) = Self::apply_patch_locked(&mut state, id, patch)? else {
            return Ok(None);
        };
        let row = Self::enqueue_locked(&mut state, topic, PersonEventKind::Updated, &person);
        Ok(Some((person, row)))
    }

    async fn delete_person_with_event(
        &self,
        id: i64,
        topic: &str,
    ) -> Result<Option<(Person, OutboxMessage)>, StorageError> {
        let mut state = self.state.lock().unwrap();
        let Some(person) = state.persons.remove(&id) else {
            return Ok(None);
        };
        let row = Self::enqueue_locked(&mut state, topic, PersonEventKind::Deleted, &person);
        Ok(Some((person, row)))
    }

    async fn fetch_pending(&self, limit: i64) -> Result<Vec<OutboxMessage>, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .outbox
            .values()
            .filter(|row| row.status == OutboxStatus::Pending.to_string())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_delivered(&self, outbox_id: i64) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .outbox
            .get_mut(&outbox_id)
            .ok_or(StorageError::NotFound(outbox_id))?;
        row.status = OutboxStatus::Delivered.to_string();
        row.delivered_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(
        &self,
        outbox_id: i64,
        error: &str,
        max_attempts: i32,
    ) -> Result<OutboxStatus, StorageError> {
        let mut state = self.state.lock().unwrap();
        let row = state
            .outbox
            .get_mut(&outbox_id)
            .ok_or(StorageError::NotFound(outbox_id))?;
        row.attempts += 1;
        row.last_error = Some(error.to_string());
        let status = if row.attempts >= max_attempts {
            OutboxStatus::Dead
        } else {
            OutboxStatus::Pending
        };
        row.status = status.to_string();
        Ok(status)
    }
}

/// Publisher double: counts invocations, records every event, and can be
/// switched into a failing mode, permanently or for the next N publishes.
#[derive(Default)]
pub struct RecordingPublisher {
    invocations: AtomicU32,
    failing: AtomicBool,
    fail_next: AtomicU32,
    published: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let publisher = Self::default();
        publisher.failing.store(true, Ordering::SeqCst);
        publisher
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Fail only the next `count` publishes, then recover.
    pub fn fail_next(&self, count: u32) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    pub fn invocations(&self) -> u32 {
        self.invocations.load(Ordering::SeqCst)
    }

    pub fn published(&self) -> Vec<DomainEvent> {
        self.published.lock().unwrap().clone()
    }

    pub fn published_event_ids(&self) -> Vec<Uuid> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.event_id)
            .collect()
    }
}

/// Buffers formatted tracing output so tests can assert on emitted records.
#[derive(Clone, Default)]
pub struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).into_owned()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<Ack, PublishError> {
        let sequence = self.invocations.fetch_add(1, Ordering::SeqCst) + 1;
        let scripted_failure = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| {
                remaining.checked_sub(1)
            })
            .is_ok();
        if scripted_failure || self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::BrokerUnavailable {
                message: "connection refused".to_string(),
            });
        }
        self.published.lock().unwrap().push(event.clone());
        Ok(Ack {
            message_id: i64::from(sequence),
            topic: event.topic.clone(),
        })
    }
}
