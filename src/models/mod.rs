//! # Data Layer
//!
//! The `persons` table model, its storage trait, and the shared storage error
//! taxonomy. Schema lives in `migrations/` and is applied with
//! [`run_migrations`].

pub mod person;

pub use person::{
    NewPerson, Page, PageRequest, Person, PersonPatch, PersonStore, PgPersonStore, SortOrder,
};

use sqlx::PgPool;

/// Storage collaborator failures. Constraint violations are
/// caller-correctable and never retried here; `Unavailable` may be transient
/// but is retried only by the caller, if at all.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("person {0} not found")]
    NotFound(i64),

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for StorageError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db_error) => {
                // 23xxx: integrity constraint violation class.
                if db_error
                    .code()
                    .map(|code| code.starts_with("23"))
                    .unwrap_or(false)
                {
                    StorageError::ConstraintViolation(db_error.message().to_string())
                } else {
                    StorageError::Unavailable(error.to_string())
                }
            }
            _ => StorageError::Unavailable(error.to_string()),
        }
    }
}

/// Apply the embedded schema migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
