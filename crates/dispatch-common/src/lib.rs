//! Shared domain types for the ticket dispatch core.
//!
//! Everything here is plain data: tickets, comments, the closed set of agent
//! types and the status/priority enumerations. Persistence and dispatch live
//! in the `ticket-dispatch` crate.

pub mod models;

pub use models::{
    AgentDescriptor, AgentType, NewComment, NewTicket, Priority, Ticket, TicketComment,
    TicketStatus,
};
