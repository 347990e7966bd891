use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use crate::models::{AgentType, TicketStatus};

/// Structured events emitted by agents and the dispatch loop.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum AgentEvent {
    DispatchStarted {
        agent_type: AgentType,
        fetched: usize,
        eligible: usize,
    },
    TicketSkipped {
        agent_type: AgentType,
        ticket_id: i64,
        status: TicketStatus,
    },
    TaskStarted {
        agent_type: AgentType,
        ticket_id: i64,
    },
    /// Free-form agent action with a JSON payload.
    Action {
        agent: String,
        ticket_id: i64,
        action: String,
        data: serde_json::Value,
    },
    TaskSucceeded {
        agent_type: AgentType,
        ticket_id: i64,
        elapsed_ms: u64,
    },
    TaskFailed {
        agent_type: AgentType,
        ticket_id: i64,
        error: String,
        timed_out: bool,
    },
    /// The internal error comment could not be written either.
    ErrorCommentFailed {
        agent_type: AgentType,
        ticket_id: i64,
        error: String,
    },
}

/// Destination for [`AgentEvent`]s, injected into every agent.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: AgentEvent);
}

/// Event sink that logs each event through `tracing` and fans it out to any
/// broadcast subscribers.
pub struct EventBus {
    tx: broadcast::Sender<AgentEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AgentEvent> {
        self.tx.subscribe()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: AgentEvent) {
        log_event(&event);
        // No subscribers is the normal case outside tests and `--events`.
        let _ = self.tx.send(event);
    }
}

fn log_event(event: &AgentEvent) {
    match event {
        AgentEvent::DispatchStarted {
            agent_type,
            fetched,
            eligible,
        } => info!(agent = %agent_type, fetched, eligible, "dispatch pass started"),
        AgentEvent::TicketSkipped {
            agent_type,
            ticket_id,
            status,
        } => debug!(agent = %agent_type, ticket_id, status = %status, "ticket skipped"),
        AgentEvent::TaskStarted {
            agent_type,
            ticket_id,
        } => debug!(agent = %agent_type, ticket_id, "processing task started"),
        AgentEvent::Action {
            agent,
            ticket_id,
            action,
            data,
        } => info!(agent = %agent, ticket_id, data = %data, "{}", action),
        AgentEvent::TaskSucceeded {
            agent_type,
            ticket_id,
            elapsed_ms,
        } => info!(agent = %agent_type, ticket_id, elapsed_ms, "ticket processed"),
        AgentEvent::TaskFailed {
            agent_type,
            ticket_id,
            error,
            timed_out,
        } => warn!(agent = %agent_type, ticket_id, timed_out, error = %error, "error handling ticket"),
        AgentEvent::ErrorCommentFailed {
            agent_type,
            ticket_id,
            error,
        } => error!(agent = %agent_type, ticket_id, error = %error, "failed to record error comment"),
    }
}
