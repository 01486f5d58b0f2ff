// ⚠️ Roster errors - one variant per failure the operator has to see
//
// Every core operation returns `Result<T>`. None of these crash the process:
// the CLI reports them and moves on to the next command.

use crate::sheet::SheetError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RosterError {
    /// Local store could not be opened, read or written. The surrounding
    /// transaction has been rolled back.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[from] rusqlite::Error),

    #[error("player not found: {0}")]
    PlayerNotFound(String),

    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("missing goal data for: {}", .0.join(", "))]
    MissingGoalData(Vec<String>),

    /// Structurally malformed event (empty roster, blank name, overflow).
    #[error("invalid event: {0}")]
    InvalidEvent(String),

    /// Local store is correct, the external projection is stale until the
    /// next successful sync.
    #[error("projection sync failed (local store is up to date): {0}")]
    ProjectionSyncFailure(#[from] SheetError),

    #[error("access denied: {0} requires admin login")]
    AccessDenied(&'static str),
}

impl RosterError {
    /// True when the error came from the sheet and local state was committed.
    pub fn is_stale_projection(&self) -> bool {
        matches!(self, RosterError::ProjectionSyncFailure(_))
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
