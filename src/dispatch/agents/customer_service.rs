use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::dispatch::agent::{Agent, AgentCore};
use crate::dispatch::context::TicketContext;
use crate::errors::HandlingError;
use crate::models::{NewComment, Ticket, TicketStatus};

/// Posted when the agent picks up an open ticket.
pub const ACKNOWLEDGEMENT: &str = "I'm analyzing your request and will respond shortly.";

/// Posted right before the ticket is resolved.
pub const RESOLUTION: &str = "Thank you for reaching out! Based on your inquiry, I recommend \
checking our documentation at https://docs.clarityxdr.com. If you need further assistance, \
please provide more details about your specific use case.";

pub struct CustomerServiceAgent {
    core: AgentCore,
}

impl CustomerServiceAgent {
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Agent for CustomerServiceAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn handle_ticket(&self, ctx: &TicketContext, mut ticket: Ticket) -> Result<(), HandlingError> {
        let store = self.core.store();
        self.core.log_action(
            ticket.id,
            "Processing customer service ticket",
            json!({ "title": ticket.title, "priority": ticket.priority }),
        );

        if ticket.status == TicketStatus::Open {
            ticket.start_work(Utc::now());
            ctx.store(store.update_ticket(&ticket)).await?;
            ctx.store(store.add_comment(NewComment::public(ticket.id, ACKNOWLEDGEMENT)))
                .await?;
        }

        // Stand-in for the language model call.
        ctx.sleep(self.core.settings().work_delay).await?;

        ctx.store(store.add_comment(NewComment::public(ticket.id, RESOLUTION)))
            .await?;

        ticket.resolve(Utc::now());
        ctx.store(store.update_ticket(&ticket)).await?;

        self.core.log_action(
            ticket.id,
            "Resolved customer service ticket",
            json!({ "resolved_at": ticket.resolved_at }),
        );
        Ok(())
    }
}
