use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Agent types ───────────────────────────────────────────────────────

/// The closed set of agent types a ticket can be routed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    CustomerService,
    KqlHunting,
    Sales,
    Accounting,
    Invoicing,
}

impl AgentType {
    pub const ALL: [AgentType; 5] = [
        Self::CustomerService,
        Self::KqlHunting,
        Self::Sales,
        Self::Accounting,
        Self::Invoicing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CustomerService => "customer_service",
            Self::KqlHunting => "kql_hunting",
            Self::Sales => "sales",
            Self::Accounting => "accounting",
            Self::Invoicing => "invoicing",
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for AgentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer_service" => Ok(Self::CustomerService),
            "kql_hunting" => Ok(Self::KqlHunting),
            "sales" => Ok(Self::Sales),
            "accounting" => Ok(Self::Accounting),
            "invoicing" => Ok(Self::Invoicing),
            _ => Err(format!("Invalid agent type: {}", s)),
        }
    }
}

/// Static identity of an agent type. Built once per type by the registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub agent_type: AgentType,
    pub name: String,
    pub description: String,
}

impl AgentDescriptor {
    pub fn new(agent_type: AgentType, name: &str, description: &str) -> Self {
        Self {
            agent_type,
            name: name.to_string(),
            description: description.to_string(),
        }
    }
}

// ── Status / priority ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    InProgress,
    Waiting,
    Resolved,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Waiting => "waiting",
            Self::Resolved => "resolved",
            Self::Closed => "closed",
        }
    }

    /// Only open and in-progress tickets are picked up by a dispatch pass.
    pub fn is_dispatchable(&self) -> bool {
        matches!(self, Self::Open | Self::InProgress)
    }

    /// Resolved or later in the lifecycle. `resolved_at` must be set exactly
    /// for these statuses.
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "waiting" => Ok(Self::Waiting),
            "resolved" => Ok(Self::Resolved),
            "closed" => Ok(Self::Closed),
            _ => Err(format!("Invalid ticket status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(format!("Invalid priority: {}", s)),
        }
    }
}

// ── Tickets ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ticket {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub user_id: Option<i64>,
    pub agent_type: AgentType,
    pub status: TicketStatus,
    pub priority: Priority,
    pub assigned_to: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Ticket {
    pub fn is_dispatchable(&self) -> bool {
        self.status.is_dispatchable()
    }

    /// Agent picked the ticket up: open → in_progress.
    pub fn start_work(&mut self, now: DateTime<Utc>) {
        self.status = TicketStatus::InProgress;
        self.updated_at = now;
    }

    /// Handling completed. `resolved_at` never precedes `created_at`, even
    /// when the caller's clock is behind the store's.
    pub fn resolve(&mut self, now: DateTime<Utc>) {
        self.status = TicketStatus::Resolved;
        self.resolved_at = Some(now.max(self.created_at));
        self.updated_at = now;
    }

    /// External close. Keeps an existing resolution time.
    pub fn close(&mut self, now: DateTime<Utc>) {
        self.status = TicketStatus::Closed;
        if self.resolved_at.is_none() {
            self.resolved_at = Some(now.max(self.created_at));
        }
        self.updated_at = now;
    }

    /// Back to the queue after a resolution or close.
    pub fn reopen(&mut self, now: DateTime<Utc>) {
        self.status = TicketStatus::Open;
        self.resolved_at = None;
        self.updated_at = now;
    }

    /// Check the `resolved_at` ⇔ resolved-or-later invariant.
    pub fn check_lifecycle(&self) -> Result<(), String> {
        match (self.status.is_resolved(), self.resolved_at) {
            (true, None) => Err(format!(
                "status '{}' requires resolved_at to be set",
                self.status
            )),
            (false, Some(_)) => Err(format!(
                "status '{}' must not carry a resolved_at timestamp",
                self.status
            )),
            (true, Some(resolved_at)) if resolved_at < self.created_at => {
                Err("resolved_at precedes created_at".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Insert form for a ticket coming through an intake path. New tickets are
/// always open.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub user_id: Option<i64>,
    pub agent_type: AgentType,
    #[serde(default)]
    pub priority: Priority,
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewTicket {
    pub fn new(title: &str, description: &str, agent_type: AgentType) -> Self {
        Self {
            title: title.to_string(),
            description: description.to_string(),
            user_id: None,
            agent_type,
            priority: Priority::default(),
            due_at: None,
            tags: Vec::new(),
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_user(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }
}

// ── Comments ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TicketComment {
    pub id: i64,
    pub ticket_id: i64,
    pub user_id: Option<i64>,
    pub content: String,
    pub is_internal: bool,
    pub created_at: DateTime<Utc>,
}

/// Insert form for a comment. Comments are append-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewComment {
    pub ticket_id: i64,
    pub user_id: Option<i64>,
    pub content: String,
    pub is_internal: bool,
}

impl NewComment {
    /// Customer-visible comment.
    pub fn public(ticket_id: i64, content: impl Into<String>) -> Self {
        Self {
            ticket_id,
            user_id: None,
            content: content.into(),
            is_internal: false,
        }
    }

    /// Operator-only comment.
    pub fn internal(ticket_id: i64, content: impl Into<String>) -> Self {
        Self {
            ticket_id,
            user_id: None,
            content: content.into(),
            is_internal: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ticket(status: TicketStatus) -> Ticket {
        let now = Utc::now();
        Ticket {
            id: 1,
            title: "Login broken".to_string(),
            description: "Cannot sign in".to_string(),
            user_id: Some(7),
            agent_type: AgentType::CustomerService,
            status,
            priority: Priority::High,
            assigned_to: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
            due_at: None,
            tags: vec![],
        }
    }

    #[test]
    fn test_agent_type_roundtrips_through_str() {
        for agent_type in AgentType::ALL {
            assert_eq!(AgentType::from_str(agent_type.as_str()), Ok(agent_type));
        }
        assert!(AgentType::from_str("unknown_type").is_err());
        assert!(AgentType::from_str("CustomerService").is_err());
    }

    #[test]
    fn test_agent_type_serializes_as_snake_case() {
        let json = serde_json::to_string(&AgentType::KqlHunting).unwrap();
        assert_eq!(json, "\"kql_hunting\"");
    }

    #[test]
    fn test_status_parse_and_display() {
        assert_eq!(TicketStatus::from_str("in_progress"), Ok(TicketStatus::InProgress));
        assert_eq!(TicketStatus::Waiting.to_string(), "waiting");
        assert!(TicketStatus::from_str("pending").is_err());
    }

    #[test]
    fn test_only_open_and_in_progress_are_dispatchable() {
        assert!(TicketStatus::Open.is_dispatchable());
        assert!(TicketStatus::InProgress.is_dispatchable());
        assert!(!TicketStatus::Waiting.is_dispatchable());
        assert!(!TicketStatus::Resolved.is_dispatchable());
        assert!(!TicketStatus::Closed.is_dispatchable());
    }

    #[test]
    fn test_priority_default_is_medium() {
        assert_eq!(Priority::default(), Priority::Medium);
        assert_eq!(Priority::from_str("critical"), Ok(Priority::Critical));
        assert!(Priority::from_str("urgent").is_err());
    }

    #[test]
    fn test_resolve_sets_resolved_at() {
        let mut t = ticket(TicketStatus::InProgress);
        let now = t.created_at + Duration::seconds(5);
        t.resolve(now);
        assert_eq!(t.status, TicketStatus::Resolved);
        assert_eq!(t.resolved_at, Some(now));
        assert!(t.check_lifecycle().is_ok());
    }

    #[test]
    fn test_resolve_never_precedes_creation() {
        let mut t = ticket(TicketStatus::Open);
        let skewed = t.created_at - Duration::seconds(30);
        t.resolve(skewed);
        assert_eq!(t.resolved_at, Some(t.created_at));
    }

    #[test]
    fn test_close_keeps_existing_resolution_time() {
        let mut t = ticket(TicketStatus::InProgress);
        let resolved = t.created_at + Duration::seconds(1);
        t.resolve(resolved);
        t.close(resolved + Duration::hours(1));
        assert_eq!(t.status, TicketStatus::Closed);
        assert_eq!(t.resolved_at, Some(resolved));
    }

    #[test]
    fn test_reopen_clears_resolution() {
        let mut t = ticket(TicketStatus::InProgress);
        t.resolve(t.created_at);
        t.close(t.created_at);
        t.reopen(t.created_at + Duration::minutes(2));
        assert_eq!(t.status, TicketStatus::Open);
        assert_eq!(t.resolved_at, None);
        assert!(t.is_dispatchable());
        assert!(t.check_lifecycle().is_ok());
    }

    #[test]
    fn test_check_lifecycle_rejects_mismatches() {
        let resolved_without_time = ticket(TicketStatus::Resolved);
        assert!(resolved_without_time.check_lifecycle().is_err());

        let mut open_with_time = ticket(TicketStatus::Open);
        open_with_time.resolved_at = Some(Utc::now());
        assert!(open_with_time.check_lifecycle().is_err());

        assert!(ticket(TicketStatus::Waiting).check_lifecycle().is_ok());
    }

    #[test]
    fn test_new_comment_visibility() {
        assert!(!NewComment::public(3, "hi").is_internal);
        let internal = NewComment::internal(3, "boom");
        assert!(internal.is_internal);
        assert_eq!(internal.ticket_id, 3);
        assert_eq!(internal.user_id, None);
    }
}
