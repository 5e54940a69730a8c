//! Crate-level error type aggregating the per-module errors, for callers
//! that drive several components and want one failure surface.

use crate::config::ConfigurationError;
use crate::events::PublishError;
use crate::models::StorageError;
use crate::orchestration::WriteError;
use crate::resilience::ClientError;
use crate::validation::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),

    #[error("Outbound call error: {0}")]
    Client(#[from] ClientError),

    #[error("Write-publish error: {0}")]
    Write(#[from] WriteError),

    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}

pub type Result<T> = std::result::Result<T, RosterError>;
