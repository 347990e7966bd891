//! In-memory collaborators for dispatch unit tests.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::sync::broadcast;

use super::agent::{Agent, AgentCore, AgentEnv, DispatchSettings};
use super::context::TicketContext;
use super::events::{AgentEvent, EventBus};
use crate::errors::{HandlingError, StoreError};
use crate::models::{
    AgentDescriptor, AgentType, NewComment, Priority, Ticket, TicketComment, TicketStatus,
};
use crate::store::TicketStore;

#[derive(Default)]
struct FakeState {
    tickets: BTreeMap<i64, Ticket>,
    comments: Vec<TicketComment>,
    fail_fetch: bool,
    fail_comments: bool,
}

/// Ticket store over a `BTreeMap`, with switchable failures.
#[derive(Default)]
pub(crate) struct FakeStore {
    state: Mutex<FakeState>,
}

impl FakeStore {
    pub fn with_tickets(tickets: Vec<Ticket>) -> Self {
        let store = Self::default();
        {
            let mut state = store.state.lock().unwrap();
            for ticket in tickets {
                state.tickets.insert(ticket.id, ticket);
            }
        }
        store
    }

    pub fn fail_fetch(&self) {
        self.state.lock().unwrap().fail_fetch = true;
    }

    pub fn fail_comments(&self) {
        self.state.lock().unwrap().fail_comments = true;
    }

    pub fn ticket(&self, id: i64) -> Option<Ticket> {
        self.state.lock().unwrap().tickets.get(&id).cloned()
    }

    pub fn comments(&self, ticket_id: i64) -> Vec<TicketComment> {
        self.state
            .lock()
            .unwrap()
            .comments
            .iter()
            .filter(|c| c.ticket_id == ticket_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TicketStore for FakeStore {
    async fn tickets_by_agent(&self, agent_type: AgentType) -> Result<Vec<Ticket>, StoreError> {
        let state = self.state.lock().unwrap();
        if state.fail_fetch {
            return Err(StoreError::Database(anyhow::anyhow!("connection refused")));
        }
        Ok(state
            .tickets
            .values()
            .filter(|t| t.agent_type == agent_type)
            .cloned()
            .collect())
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        ticket
            .check_lifecycle()
            .map_err(|reason| StoreError::InvalidTicket {
                id: ticket.id,
                reason,
            })?;
        let mut state = self.state.lock().unwrap();
        match state.tickets.get_mut(&ticket.id) {
            Some(slot) => {
                *slot = ticket.clone();
                Ok(())
            }
            None => Err(StoreError::TicketNotFound { id: ticket.id }),
        }
    }

    async fn add_comment(&self, comment: NewComment) -> Result<TicketComment, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_comments {
            return Err(StoreError::Database(anyhow::anyhow!("disk full")));
        }
        if !state.tickets.contains_key(&comment.ticket_id) {
            return Err(StoreError::TicketNotFound {
                id: comment.ticket_id,
            });
        }
        let stored = TicketComment {
            id: state.comments.len() as i64 + 1,
            ticket_id: comment.ticket_id,
            user_id: comment.user_id,
            content: comment.content,
            is_internal: comment.is_internal,
            created_at: Utc::now(),
        };
        state.comments.push(stored.clone());
        Ok(stored)
    }
}

pub(crate) fn ticket(id: i64, agent_type: AgentType, status: TicketStatus) -> Ticket {
    let created_at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    Ticket {
        id,
        title: format!("Ticket {id}"),
        description: "Help".to_string(),
        user_id: Some(1),
        agent_type,
        status,
        priority: Priority::Medium,
        assigned_to: None,
        created_at,
        updated_at: created_at,
        resolved_at: status.is_resolved().then_some(created_at),
        due_at: None,
        tags: Vec::new(),
    }
}

/// Environment over `store` with an event bus the test can watch.
pub(crate) fn env(
    store: Arc<FakeStore>,
    settings: DispatchSettings,
) -> (AgentEnv, broadcast::Receiver<AgentEvent>) {
    let bus = Arc::new(EventBus::new(256));
    let rx = bus.subscribe();
    (AgentEnv::new(store, bus).with_settings(settings), rx)
}

pub(crate) fn drain(rx: &mut broadcast::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[derive(Debug, Clone)]
pub(crate) enum Behaviour {
    Succeed,
    Fail(String),
    /// Never finishes and never looks at its context.
    Stall,
    Panic,
}

/// Agent that records which tickets it saw and then does what it is told.
pub(crate) struct ScriptedAgent {
    core: AgentCore,
    behaviour: Behaviour,
    pub handled: Mutex<Vec<i64>>,
}

impl ScriptedAgent {
    pub fn new(agent_type: AgentType, env: AgentEnv, behaviour: Behaviour) -> Self {
        Self::with_core(
            AgentCore::new(
                AgentDescriptor::new(agent_type, "Scripted AI", "Test agent"),
                env,
            ),
            behaviour,
        )
    }

    pub fn with_core(core: AgentCore, behaviour: Behaviour) -> Self {
        Self {
            core,
            behaviour,
            handled: Mutex::new(Vec::new()),
        }
    }

    pub fn handled(&self) -> Vec<i64> {
        let mut ids = self.handled.lock().unwrap().clone();
        ids.sort_unstable();
        ids
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn handle_ticket(&self, _ctx: &TicketContext, ticket: Ticket) -> Result<(), HandlingError> {
        self.handled.lock().unwrap().push(ticket.id);
        match &self.behaviour {
            Behaviour::Succeed => Ok(()),
            Behaviour::Fail(message) => Err(HandlingError::Failed(message.clone())),
            Behaviour::Stall => {
                std::future::pending::<()>().await;
                Ok(())
            }
            Behaviour::Panic => panic!("handler blew up on ticket {}", ticket.id),
        }
    }
}

pub(crate) fn fast_settings() -> DispatchSettings {
    DispatchSettings {
        task_timeout: Duration::from_secs(300),
        work_delay: Duration::ZERO,
    }
}
