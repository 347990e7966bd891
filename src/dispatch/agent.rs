use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::context::TicketContext;
use super::events::{AgentEvent, EventSink};
use crate::errors::HandlingError;
use crate::models::{AgentDescriptor, AgentType, Ticket};
use crate::store::TicketStore;

/// Default per-ticket processing budget.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Default length of the simulated external call in the customer service agent.
pub const DEFAULT_WORK_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchSettings {
    /// Budget for one processing task, measured from task start.
    pub task_timeout: Duration,
    pub work_delay: Duration,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            task_timeout: DEFAULT_TASK_TIMEOUT,
            work_delay: DEFAULT_WORK_DELAY,
        }
    }
}

/// Collaborators handed to every agent the registry builds.
#[derive(Clone)]
pub struct AgentEnv {
    pub store: Arc<dyn TicketStore>,
    pub events: Arc<dyn EventSink>,
    pub settings: DispatchSettings,
}

impl AgentEnv {
    pub fn new(store: Arc<dyn TicketStore>, events: Arc<dyn EventSink>) -> Self {
        Self {
            store,
            events,
            settings: DispatchSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: DispatchSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Shared services composed into each agent variant: identity, store
/// access, event reporting and dispatch settings.
pub struct AgentCore {
    descriptor: AgentDescriptor,
    env: AgentEnv,
}

impl AgentCore {
    pub fn new(descriptor: AgentDescriptor, env: AgentEnv) -> Self {
        Self { descriptor, env }
    }

    pub fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    pub fn agent_type(&self) -> AgentType {
        self.descriptor.agent_type
    }

    pub fn store(&self) -> &dyn TicketStore {
        self.env.store.as_ref()
    }

    pub fn events(&self) -> &dyn EventSink {
        self.env.events.as_ref()
    }

    pub fn settings(&self) -> DispatchSettings {
        self.env.settings
    }

    /// Record an agent action against a ticket.
    pub fn log_action(&self, ticket_id: i64, action: &str, data: serde_json::Value) {
        self.env.events.emit(AgentEvent::Action {
            agent: self.descriptor.name.clone(),
            ticket_id,
            action: action.to_string(),
            data,
        });
    }
}

/// A stateless behaviour object that handles tickets of one agent type.
///
/// Variants only implement [`Agent::handle_ticket`]; fetching, task spawning
/// and failure reporting are shared by
/// [`process_tickets`](super::runner::process_tickets).
#[async_trait]
pub trait Agent: Send + Sync {
    fn core(&self) -> &AgentCore;

    fn agent_type(&self) -> AgentType {
        self.core().agent_type()
    }

    fn descriptor(&self) -> &AgentDescriptor {
        self.core().descriptor()
    }

    /// Handle one dispatchable ticket. All state changes are the agent's
    /// responsibility; an error leaves reporting to the processing task.
    async fn handle_ticket(&self, ctx: &TicketContext, ticket: Ticket) -> Result<(), HandlingError>;
}
