use async_trait::async_trait;
use serde_json::json;

use crate::dispatch::agent::{Agent, AgentCore};
use crate::dispatch::context::TicketContext;
use crate::errors::HandlingError;
use crate::models::Ticket;

// These agents have no integrations yet. Each records that it saw the
// ticket and succeeds without changing it, so their tickets stay eligible
// on every pass.

pub struct KqlHuntingAgent {
    core: AgentCore,
}

impl KqlHuntingAgent {
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Agent for KqlHuntingAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn handle_ticket(&self, _ctx: &TicketContext, ticket: Ticket) -> Result<(), HandlingError> {
        self.core.log_action(
            ticket.id,
            "Received threat hunting request",
            json!({ "title": ticket.title, "tags": ticket.tags }),
        );
        Ok(())
    }
}

pub struct SalesAgent {
    core: AgentCore,
}

impl SalesAgent {
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Agent for SalesAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn handle_ticket(&self, _ctx: &TicketContext, ticket: Ticket) -> Result<(), HandlingError> {
        self.core.log_action(
            ticket.id,
            "Received sales inquiry",
            json!({ "title": ticket.title, "user_id": ticket.user_id }),
        );
        Ok(())
    }
}

pub struct AccountingAgent {
    core: AgentCore,
}

impl AccountingAgent {
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Agent for AccountingAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn handle_ticket(&self, _ctx: &TicketContext, ticket: Ticket) -> Result<(), HandlingError> {
        self.core.log_action(
            ticket.id,
            "Received accounting request",
            json!({ "title": ticket.title }),
        );
        Ok(())
    }
}

pub struct InvoicingAgent {
    core: AgentCore,
}

impl InvoicingAgent {
    pub fn new(core: AgentCore) -> Self {
        Self { core }
    }
}

#[async_trait]
impl Agent for InvoicingAgent {
    fn core(&self) -> &AgentCore {
        &self.core
    }

    async fn handle_ticket(&self, _ctx: &TicketContext, ticket: Ticket) -> Result<(), HandlingError> {
        self.core.log_action(
            ticket.id,
            "Received invoicing request",
            json!({ "title": ticket.title, "due_at": ticket.due_at }),
        );
        Ok(())
    }
}
