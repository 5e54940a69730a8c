use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-operation states of a write-publish run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteState {
    /// Operation accepted, nothing checked yet
    Start,
    /// Input constraints satisfied
    Validated,
    /// Storage write committed
    Persisted,
    /// Event handed to the publisher (or its outbox row committed)
    Published,
    /// Success path complete
    Done,
    /// Validation failed; nothing persisted or published
    Rejected,
    /// Storage write failed; nothing published
    Failed,
    /// Write committed but the event is not confirmed delivered
    Degraded,
}

impl WriteState {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::Rejected | Self::Failed | Self::Degraded
        )
    }

    /// Check if the storage write is durable in this state
    pub fn is_persisted(&self) -> bool {
        matches!(
            self,
            Self::Persisted | Self::Published | Self::Done | Self::Degraded
        )
    }
}

impl fmt::Display for WriteState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start => write!(f, "start"),
            Self::Validated => write!(f, "validated"),
            Self::Persisted => write!(f, "persisted"),
            Self::Published => write!(f, "published"),
            Self::Done => write!(f, "done"),
            Self::Rejected => write!(f, "rejected"),
            Self::Failed => write!(f, "failed"),
            Self::Degraded => write!(f, "degraded"),
        }
    }
}

impl std::str::FromStr for WriteState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Self::Start),
            "validated" => Ok(Self::Validated),
            "persisted" => Ok(Self::Persisted),
            "published" => Ok(Self::Published),
            "done" => Ok(Self::Done),
            "rejected" => Ok(Self::Rejected),
            "failed" => Ok(Self::Failed),
            "degraded" => Ok(Self::Degraded),
            _ => Err(format!("Invalid write state: {s}")),
        }
    }
}
