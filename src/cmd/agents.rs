//! `ticket-dispatch agents`.

use ticket_dispatch::dispatch::AgentRegistry;

pub fn cmd_agents() {
    let registry = AgentRegistry::builtin();
    for descriptor in registry.descriptors() {
        println!(
            "{:<18} {:<20} {}",
            descriptor.agent_type, descriptor.name, descriptor.description
        );
    }
}
