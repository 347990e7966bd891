//! Ticket dispatch core.
//!
//! - [`registry`] maps agent type tags to constructors
//! - [`agent`] defines the [`Agent`] trait and the [`AgentCore`] every
//!   variant composes
//! - [`agents`] holds the built-in variants
//! - [`runner`] runs one dispatch pass, one task per eligible ticket
//! - [`context`] is the per-task cancellation scope and deadline
//! - [`events`] is the structured event sink
//! - [`service`] polls the runner on an interval

pub mod agent;
pub mod agents;
pub mod context;
pub mod events;
pub mod registry;
pub mod runner;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use agent::{Agent, AgentCore, AgentEnv, DispatchSettings};
pub use context::TicketContext;
pub use events::{AgentEvent, EventBus, EventSink};
pub use registry::AgentRegistry;
pub use runner::{BatchReport, DispatchBatch, TaskOutcome, process_tickets};
pub use service::DispatchService;
