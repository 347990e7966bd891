//! `ticket-dispatch ticket ...` commands.

use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use chrono::SecondsFormat;

use ticket_dispatch::config::DispatchConfig;
use ticket_dispatch::models::{AgentType, NewTicket, Priority, Ticket, TicketStatus};

use super::super::TicketCommands;
use super::open_db;

fn parse_agent(tag: &str) -> Result<AgentType> {
    AgentType::from_str(tag).map_err(|e| anyhow!(e))
}

pub fn cmd_ticket(config: &DispatchConfig, command: TicketCommands) -> Result<()> {
    let db = open_db(config)?;

    match command {
        TicketCommands::Create {
            title,
            description,
            agent,
            priority,
            user,
            tags,
        } => {
            let priority = Priority::from_str(&priority).map_err(|e| anyhow!(e))?;
            let mut new = NewTicket::new(&title, &description, parse_agent(&agent)?)
                .with_priority(priority)
                .with_tags(tags);
            if let Some(user_id) = user {
                new = new.with_user(user_id);
            }
            let ticket = db.create_ticket(&new)?;
            println!(
                "Created ticket #{} [{}] {}",
                ticket.id, ticket.agent_type, ticket.title
            );
        }
        TicketCommands::List {
            status,
            agent,
            user,
        } => {
            let mut tickets = match (&status, &agent, user) {
                (_, Some(agent), _) => db.tickets_by_agent(parse_agent(agent)?)?,
                (Some(status), None, _) => {
                    db.tickets_by_status(TicketStatus::from_str(status).map_err(|e| anyhow!(e))?)?
                }
                (None, None, Some(user_id)) => db.tickets_by_user(user_id)?,
                (None, None, None) => db.list_tickets()?,
            };
            // The store filters on one column; apply the rest here.
            if let Some(status) = &status {
                let status = TicketStatus::from_str(status).map_err(|e| anyhow!(e))?;
                tickets.retain(|t| t.status == status);
            }
            if let Some(user_id) = user {
                tickets.retain(|t| t.user_id == Some(user_id));
            }

            if tickets.is_empty() {
                println!("No tickets found.");
            }
            for t in &tickets {
                println!(
                    "#{:<5} {:<12} {:<17} {:<9} {}",
                    t.id, t.status, t.agent_type, t.priority, t.title
                );
            }
        }
        TicketCommands::Show { id } => {
            let ticket = db
                .get_ticket(id)?
                .ok_or_else(|| anyhow!("Ticket {} not found", id))?;
            print_ticket(&ticket);

            let comments = db.comments_for_ticket(id)?;
            println!();
            println!("Comments ({}):", comments.len());
            for c in &comments {
                let visibility = if c.is_internal { "internal" } else { "public" };
                println!(
                    "  [{}] {}: {}",
                    visibility,
                    c.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    c.content
                );
            }
        }
        TicketCommands::Close { id } => {
            if db.close_ticket(id)?.is_none() {
                bail!("Ticket {} not found", id);
            }
            println!("Closed ticket #{}", id);
        }
        TicketCommands::Reopen { id } => {
            if db.reopen_ticket(id)?.is_none() {
                bail!("Ticket {} not found", id);
            }
            println!("Reopened ticket #{}", id);
        }
        TicketCommands::Reassign { id, agent } => {
            let agent_type = parse_agent(&agent)?;
            if db.reassign_agent(id, agent_type)?.is_none() {
                bail!("Ticket {} not found", id);
            }
            println!("Ticket #{} reassigned to {}", id, agent_type);
        }
        TicketCommands::Assign { id, user } => {
            if db.assign_ticket(id, user)?.is_none() {
                bail!("Ticket {} not found", id);
            }
            println!("Ticket #{} assigned to user {}", id, user);
        }
        TicketCommands::Delete { id } => {
            if !db.delete_ticket(id)? {
                bail!("Ticket {} not found", id);
            }
            println!("Deleted ticket #{}", id);
        }
    }
    Ok(())
}

fn print_ticket(t: &Ticket) {
    let ts = |dt: chrono::DateTime<chrono::Utc>| dt.to_rfc3339_opts(SecondsFormat::Secs, true);
    let opt = |v: Option<i64>| v.map_or_else(|| "-".to_string(), |v| v.to_string());

    println!("Ticket #{}: {}", t.id, t.title);
    println!("  Status:   {}", t.status);
    println!("  Agent:    {}", t.agent_type);
    println!("  Priority: {}", t.priority);
    println!("  User:     {}", opt(t.user_id));
    println!("  Assignee: {}", opt(t.assigned_to));
    println!("  Created:  {}", ts(t.created_at));
    if let Some(resolved_at) = t.resolved_at {
        println!("  Resolved: {}", ts(resolved_at));
    }
    if let Some(due_at) = t.due_at {
        println!("  Due:      {}", ts(due_at));
    }
    if !t.tags.is_empty() {
        println!("  Tags:     {}", t.tags.join(", "));
    }
    if !t.description.is_empty() {
        println!();
        println!("  {}", t.description);
    }
}
