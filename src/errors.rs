//! Typed error hierarchy for the board subsystem.
//!
//! `BoardError` covers everything a move, load or edit can report back to
//! the presentation layer. Gateway and notifier implementations return
//! `anyhow::Result` and are wrapped into the `Gateway` / `Notification`
//! variants at the orchestrator boundary.

use newsboard_common::{Column, ItemKey};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BoardError {
    #[error("Not authenticated: sign in to move cards")]
    Unauthenticated,

    #[error("Item {key} not found on the board")]
    ItemNotFound { key: ItemKey },

    #[error("Candidate {candidate_id} is already in the production queue")]
    AlreadyPromoted { candidate_id: String },

    #[error("A move for {key} is already in flight")]
    MoveInFlight { key: ItemKey },

    #[error("Moving {id} to reprove deletes it and requires confirmation")]
    ConfirmationRequired { id: String },

    #[error("No reprove confirmation pending for {id}")]
    NoPendingConfirmation { id: String },

    #[error("Invalid column '{column}'")]
    InvalidColumn { column: String },

    #[error("Move to {to} failed and was rolled back to {from}: {source}")]
    RolledBack {
        from: Column,
        to: Column,
        #[source]
        source: anyhow::Error,
    },

    #[error("Backend error: {0}")]
    Gateway(#[source] anyhow::Error),

    #[error("Notification failed: {0}")]
    Notification(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BoardError {
    /// True when the failure left the board untouched and the user can simply retry.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Gateway(_) | Self::RolledBack { .. })
    }
}
