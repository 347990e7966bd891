//! Typed error hierarchy for the dispatch core.
//!
//! Three error types cover the three failure surfaces:
//! - `UnknownAgentType`: agent construction with a tag nobody registered
//! - `StoreError`: ticket store failures; the only error `process_tickets`
//!   surfaces to its caller
//! - `HandlingError`: per-ticket failures, contained inside the processing
//!   task and turned into an internal comment

use std::time::Duration;

use thiserror::Error;

/// Construction-time failure from the agent registry. Not retryable.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown agent type: {tag}")]
pub struct UnknownAgentType {
    pub tag: String,
}

/// Errors from the ticket store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Ticket {id} not found")]
    TicketNotFound { id: i64 },

    #[error("Ticket {id} violates its lifecycle: {reason}")]
    InvalidTicket { id: i64, reason: String },

    #[error("Database error: {0:#}")]
    Database(#[source] anyhow::Error),
}

/// Errors raised while an agent handles one ticket.
#[derive(Debug, Error)]
pub enum HandlingError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("ticket processing was cancelled")]
    Cancelled,

    #[error("ticket processing timed out after {after:?}")]
    TimedOut { after: Duration },

    #[error("ticket handler panicked: {0}")]
    Panicked(String),

    #[error("{0}")]
    Failed(String),
}

impl HandlingError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::TimedOut { .. })
    }

    /// Cancelled or timed out, as opposed to failing on its own.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut { .. })
    }
}
