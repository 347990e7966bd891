//! Ticket store: the persistence collaborator the dispatch core runs against.
//!
//! The core only needs the three operations on [`TicketStore`]. The SQLite
//! adapter in [`db`] implements that trait and the rest of the ticket CRUD
//! surface used by the operator CLI.

pub mod db;

use async_trait::async_trait;

use crate::errors::StoreError;
use crate::models::{AgentType, NewComment, Ticket, TicketComment};

pub use db::{DbHandle, TicketDb};

/// Store operations consumed by agents and the dispatch loop.
///
/// Implementations must be safe for concurrent use: one processing task per
/// ticket calls into the same store at the same time.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// All tickets routed to `agent_type`, ordered by creation time.
    async fn tickets_by_agent(&self, agent_type: AgentType) -> Result<Vec<Ticket>, StoreError>;

    /// Full-row update keyed by `ticket.id`. Fails with
    /// [`StoreError::TicketNotFound`] when the row does not exist.
    async fn update_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;

    /// Append a comment. The owning ticket must exist.
    async fn add_comment(&self, comment: NewComment) -> Result<TicketComment, StoreError>;
}
