//! One dispatch pass: fetch, filter, and fan out one processing task per
//! eligible ticket.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::agent::Agent;
use super::context::TicketContext;
use super::events::AgentEvent;
use crate::errors::{HandlingError, StoreError};
use crate::models::{AgentType, NewComment, Ticket};

/// Final state of one processing task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Succeeded,
    /// The agent failed, panicked, timed out or was cancelled.
    Failed {
        error: String,
        timed_out: bool,
        /// Whether the internal error comment was written.
        comment_recorded: bool,
    },
    /// The task was aborted from outside before it could report.
    Aborted { error: String },
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

/// Tasks launched by one [`process_tickets`] call.
///
/// Dropping the batch detaches the tasks; they keep running to completion
/// or deadline.
#[derive(Debug)]
pub struct DispatchBatch {
    agent_type: AgentType,
    tasks: Vec<(i64, JoinHandle<TaskOutcome>)>,
    skipped: Vec<i64>,
}

impl DispatchBatch {
    fn empty(agent_type: AgentType) -> Self {
        Self {
            agent_type,
            tasks: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn agent_type(&self) -> AgentType {
        self.agent_type
    }

    /// Ticket ids a task was launched for, in fetch order.
    pub fn launched(&self) -> Vec<i64> {
        self.tasks.iter().map(|(id, _)| *id).collect()
    }

    /// Ticket ids left alone because of their status.
    pub fn skipped(&self) -> &[i64] {
        &self.skipped
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Abort every task still running.
    pub fn abort(&self) {
        for (_, handle) in &self.tasks {
            handle.abort();
        }
    }

    /// Wait for every task in the batch.
    pub async fn join(self) -> BatchReport {
        let mut outcomes = Vec::with_capacity(self.tasks.len());
        for (ticket_id, handle) in self.tasks {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => TaskOutcome::Aborted {
                    error: e.to_string(),
                },
            };
            outcomes.push((ticket_id, outcome));
        }
        BatchReport {
            agent_type: self.agent_type,
            skipped: self.skipped,
            outcomes,
        }
    }
}

/// Outcomes of a joined [`DispatchBatch`].
#[derive(Debug, Clone)]
pub struct BatchReport {
    pub agent_type: AgentType,
    pub skipped: Vec<i64>,
    pub outcomes: Vec<(i64, TaskOutcome)>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn outcome(&self, ticket_id: i64) -> Option<&TaskOutcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| *id == ticket_id)
            .map(|(_, outcome)| outcome)
    }
}

/// Run one dispatch pass for `agent`.
///
/// Fetches the agent's tickets, skips any that are not open or in progress,
/// and spawns one processing task per remaining ticket. Returns once the
/// tasks are launched; per-ticket failures never surface here. Only a
/// failed fetch is an error, and in that case nothing is launched.
///
/// Each task runs under a child of `cancel` and its own deadline of
/// `task_timeout`, measured from when the task starts.
pub async fn process_tickets(
    agent: &Arc<dyn Agent>,
    cancel: &CancellationToken,
) -> Result<DispatchBatch, StoreError> {
    let core = agent.core();
    let agent_type = core.agent_type();

    if cancel.is_cancelled() {
        debug!(agent = %agent_type, "dispatch cancelled before fetch");
        return Ok(DispatchBatch::empty(agent_type));
    }

    let tickets = core.store().tickets_by_agent(agent_type).await?;
    let fetched = tickets.len();
    let (eligible, ineligible): (Vec<Ticket>, Vec<Ticket>) =
        tickets.into_iter().partition(Ticket::is_dispatchable);

    let events = core.events();
    events.emit(AgentEvent::DispatchStarted {
        agent_type,
        fetched,
        eligible: eligible.len(),
    });
    for ticket in &ineligible {
        events.emit(AgentEvent::TicketSkipped {
            agent_type,
            ticket_id: ticket.id,
            status: ticket.status,
        });
    }

    let timeout = core.settings().task_timeout;
    let tasks = eligible
        .into_iter()
        .map(|ticket| {
            let ticket_id = ticket.id;
            let agent = Arc::clone(agent);
            let parent = cancel.clone();
            let handle = tokio::spawn(async move {
                let ctx = TicketContext::new(ticket_id, &parent, timeout);
                run_ticket_task(agent, ctx, ticket).await
            });
            (ticket_id, handle)
        })
        .collect();

    Ok(DispatchBatch {
        agent_type,
        tasks,
        skipped: ineligible.iter().map(|t| t.id).collect(),
    })
}

/// Body of one processing task. Never fails: any error from the agent
/// (including a panic or the deadline) becomes an internal comment.
async fn run_ticket_task(agent: Arc<dyn Agent>, ctx: TicketContext, ticket: Ticket) -> TaskOutcome {
    let core = agent.core();
    let agent_type = core.agent_type();
    let ticket_id = ticket.id;
    let started = Instant::now();

    core.events().emit(AgentEvent::TaskStarted {
        agent_type,
        ticket_id,
    });

    let result = ctx
        .run(async {
            match AssertUnwindSafe(agent.handle_ticket(&ctx, ticket))
                .catch_unwind()
                .await
            {
                Ok(result) => result,
                Err(panic) => Err(HandlingError::Panicked(panic_message(panic.as_ref()))),
            }
        })
        .await;

    let err = match result {
        Ok(()) => {
            core.events().emit(AgentEvent::TaskSucceeded {
                agent_type,
                ticket_id,
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
            return TaskOutcome::Succeeded;
        }
        Err(err) => err,
    };

    let error = err.to_string();
    let timed_out = err.is_timeout();
    core.events().emit(AgentEvent::TaskFailed {
        agent_type,
        ticket_id,
        error: error.clone(),
        timed_out,
    });

    // Best effort, and outside the task's scope: for a timeout the deadline
    // has already passed.
    let comment = NewComment::internal(ticket_id, format!("Error processing ticket: {}", error));
    let comment_recorded = match core.store().add_comment(comment).await {
        Ok(_) => true,
        Err(e) => {
            core.events().emit(AgentEvent::ErrorCommentFailed {
                agent_type,
                ticket_id,
                error: e.to_string(),
            });
            false
        }
    };

    TaskOutcome::Failed {
        error,
        timed_out,
        comment_recorded,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
