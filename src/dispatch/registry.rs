use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::Arc;

use super::agent::{Agent, AgentCore, AgentEnv};
use super::agents::{
    AccountingAgent, CustomerServiceAgent, InvoicingAgent, KqlHuntingAgent, SalesAgent,
};
use crate::errors::UnknownAgentType;
use crate::models::{AgentDescriptor, AgentType};

/// Builds an agent from its composed core.
pub type AgentConstructor = Arc<dyn Fn(AgentCore) -> Arc<dyn Agent> + Send + Sync>;

struct Registration {
    descriptor: AgentDescriptor,
    construct: AgentConstructor,
}

/// Map from agent type to descriptor and constructor.
///
/// Adding a variant means one [`register`](Self::register) call; no
/// dispatch code changes.
pub struct AgentRegistry {
    entries: BTreeMap<AgentType, Registration>,
}

impl AgentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Registry holding the five built-in agents.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register(
            AgentDescriptor::new(
                AgentType::CustomerService,
                "Customer Service AI",
                "Handles customer inquiries and support requests",
            ),
            |core| Arc::new(CustomerServiceAgent::new(core)),
        );
        registry.register(
            AgentDescriptor::new(
                AgentType::KqlHunting,
                "KQL Hunting AI",
                "Performs advanced threat hunting using KQL in Microsoft Defender",
            ),
            |core| Arc::new(KqlHuntingAgent::new(core)),
        );
        registry.register(
            AgentDescriptor::new(
                AgentType::Sales,
                "Sales AI",
                "Handles sales inquiries, quotes, and follows up with leads",
            ),
            |core| Arc::new(SalesAgent::new(core)),
        );
        registry.register(
            AgentDescriptor::new(
                AgentType::Accounting,
                "Accounting AI",
                "Manages financial records and reporting",
            ),
            |core| Arc::new(AccountingAgent::new(core)),
        );
        registry.register(
            AgentDescriptor::new(
                AgentType::Invoicing,
                "Invoicing AI",
                "Handles invoice generation and payment tracking",
            ),
            |core| Arc::new(InvoicingAgent::new(core)),
        );
        registry
    }

    /// Register (or replace) the constructor for `descriptor.agent_type`.
    pub fn register<F>(&mut self, descriptor: AgentDescriptor, construct: F)
    where
        F: Fn(AgentCore) -> Arc<dyn Agent> + Send + Sync + 'static,
    {
        self.entries.insert(
            descriptor.agent_type,
            Registration {
                descriptor,
                construct: Arc::new(construct),
            },
        );
    }

    pub fn contains(&self, agent_type: AgentType) -> bool {
        self.entries.contains_key(&agent_type)
    }

    /// Descriptors in agent type order.
    pub fn descriptors(&self) -> impl Iterator<Item = &AgentDescriptor> {
        self.entries.values().map(|r| &r.descriptor)
    }

    /// Build the agent for a wire tag such as `"customer_service"`.
    ///
    /// Tags are matched exactly; anything that is not a registered type is
    /// rejected with the offending tag.
    pub fn new_agent(&self, tag: &str, env: AgentEnv) -> Result<Arc<dyn Agent>, UnknownAgentType> {
        let agent_type = AgentType::from_str(tag).map_err(|_| UnknownAgentType {
            tag: tag.to_string(),
        })?;
        self.agent_for(agent_type, env)
    }

    pub fn agent_for(
        &self,
        agent_type: AgentType,
        env: AgentEnv,
    ) -> Result<Arc<dyn Agent>, UnknownAgentType> {
        let registration = self.entries.get(&agent_type).ok_or_else(|| UnknownAgentType {
            tag: agent_type.as_str().to_string(),
        })?;
        let core = AgentCore::new(registration.descriptor.clone(), env);
        Ok((registration.construct)(core))
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
