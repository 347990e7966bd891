use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Params, Row, params};
use tokio::sync::Mutex;

use super::TicketStore;
use crate::errors::StoreError;
use crate::models::*;

/// Async-safe handle to the ticket database.
///
/// Wraps `TicketDb` behind an async `Mutex` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, so concurrent processing tasks
/// never run synchronous SQLite I/O on async worker threads. The mutex is
/// also what serialises conflicting writes to the same ticket row.
///
/// The lock is taken before any blocking work is queued. A caller dropped
/// while waiting for it never touches the database.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<Mutex<TicketDb>>,
}

impl DbHandle {
    pub fn new(db: TicketDb) -> Self {
        Self {
            inner: Arc::new(Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&TicketDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let guard = self.inner.clone().lock_owned().await;
        tokio::task::spawn_blocking(move || f(&guard).map_err(StoreError::Database))
            .await
            .map_err(|e| StoreError::Database(anyhow::anyhow!("DB task panicked: {}", e)))?
    }
}

#[async_trait]
impl TicketStore for DbHandle {
    async fn tickets_by_agent(&self, agent_type: AgentType) -> Result<Vec<Ticket>, StoreError> {
        self.call(move |db| db.tickets_by_agent(agent_type)).await
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let id = ticket.id;
        ticket
            .check_lifecycle()
            .map_err(|reason| StoreError::InvalidTicket { id, reason })?;
        let ticket = ticket.clone();
        let updated = self.call(move |db| db.update_ticket(&ticket)).await?;
        if updated {
            Ok(())
        } else {
            Err(StoreError::TicketNotFound { id })
        }
    }

    async fn add_comment(&self, comment: NewComment) -> Result<TicketComment, StoreError> {
        let id = comment.ticket_id;
        self.call(move |db| db.add_comment(&comment))
            .await?
            .ok_or(StoreError::TicketNotFound { id })
    }
}

pub struct TicketDb {
    conn: Connection,
}

const TICKET_COLUMNS: &str = "id, title, description, user_id, agent_type, status, priority, assigned_to, created_at, updated_at, resolved_at, due_at, tags";

impl TicketDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS tickets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT NOT NULL DEFAULT '',
                    user_id INTEGER,
                    agent_type TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'open',
                    priority TEXT NOT NULL DEFAULT 'medium',
                    assigned_to INTEGER,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    resolved_at TEXT,
                    due_at TEXT,
                    tags TEXT NOT NULL DEFAULT '[]'
                );

                CREATE TABLE IF NOT EXISTS ticket_comments (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    ticket_id INTEGER NOT NULL REFERENCES tickets(id) ON DELETE CASCADE,
                    user_id INTEGER,
                    content TEXT NOT NULL,
                    is_internal INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_tickets_agent ON tickets(agent_type, created_at);
                CREATE INDEX IF NOT EXISTS idx_tickets_status ON tickets(status);
                CREATE INDEX IF NOT EXISTS idx_tickets_user ON tickets(user_id);
                CREATE INDEX IF NOT EXISTS idx_ticket_comments_ticket ON ticket_comments(ticket_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Ticket CRUD ───────────────────────────────────────────────────

    pub fn create_ticket(&self, new: &NewTicket) -> Result<Ticket> {
        let now = format_ts(Utc::now());
        let tags = serde_json::to_string(&new.tags).context("Failed to serialize tags")?;
        self.conn
            .execute(
                "INSERT INTO tickets (title, description, user_id, agent_type, status, priority, created_at, updated_at, due_at, tags)
                 VALUES (?1, ?2, ?3, ?4, 'open', ?5, ?6, ?6, ?7, ?8)",
                params![
                    new.title,
                    new.description,
                    new.user_id,
                    new.agent_type.as_str(),
                    new.priority.as_str(),
                    now,
                    new.due_at.map(format_ts),
                    tags,
                ],
            )
            .context("Failed to insert ticket")?;
        let id = self.conn.last_insert_rowid();
        self.get_ticket(id)?.context("Ticket not found after insert")
    }

    pub fn get_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        let mut tickets = self.query_tickets("WHERE id = ?1", params![id])?;
        Ok(tickets.pop())
    }

    pub fn list_tickets(&self) -> Result<Vec<Ticket>> {
        self.query_tickets("", [])
    }

    pub fn tickets_by_agent(&self, agent_type: AgentType) -> Result<Vec<Ticket>> {
        self.query_tickets("WHERE agent_type = ?1", params![agent_type.as_str()])
    }

    pub fn tickets_by_status(&self, status: TicketStatus) -> Result<Vec<Ticket>> {
        self.query_tickets("WHERE status = ?1", params![status.as_str()])
    }

    pub fn tickets_by_user(&self, user_id: i64) -> Result<Vec<Ticket>> {
        self.query_tickets("WHERE user_id = ?1", params![user_id])
    }

    /// Full-row update keyed by id. Returns false when no such ticket exists.
    pub fn update_ticket(&self, ticket: &Ticket) -> Result<bool> {
        let tags = serde_json::to_string(&ticket.tags).context("Failed to serialize tags")?;
        let changed = self
            .conn
            .execute(
                "UPDATE tickets SET title = ?1, description = ?2, user_id = ?3, agent_type = ?4,
                        status = ?5, priority = ?6, assigned_to = ?7, updated_at = ?8,
                        resolved_at = ?9, due_at = ?10, tags = ?11
                 WHERE id = ?12",
                params![
                    ticket.title,
                    ticket.description,
                    ticket.user_id,
                    ticket.agent_type.as_str(),
                    ticket.status.as_str(),
                    ticket.priority.as_str(),
                    ticket.assigned_to,
                    format_ts(ticket.updated_at),
                    ticket.resolved_at.map(format_ts),
                    ticket.due_at.map(format_ts),
                    tags,
                    ticket.id,
                ],
            )
            .context("Failed to update ticket")?;
        Ok(changed > 0)
    }

    pub fn delete_ticket(&self, id: i64) -> Result<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM tickets WHERE id = ?1", params![id])
            .context("Failed to delete ticket")?;
        Ok(changed > 0)
    }

    /// Set the human assignee of a ticket.
    pub fn assign_ticket(&self, id: i64, user_id: i64) -> Result<Option<Ticket>> {
        self.conn
            .execute(
                "UPDATE tickets SET assigned_to = ?1, updated_at = ?2 WHERE id = ?3",
                params![user_id, format_ts(Utc::now()), id],
            )
            .context("Failed to assign ticket")?;
        self.get_ticket(id)
    }

    /// Route a ticket to a different agent type.
    pub fn reassign_agent(&self, id: i64, agent_type: AgentType) -> Result<Option<Ticket>> {
        self.conn
            .execute(
                "UPDATE tickets SET agent_type = ?1, updated_at = ?2 WHERE id = ?3",
                params![agent_type.as_str(), format_ts(Utc::now()), id],
            )
            .context("Failed to reassign ticket")?;
        self.get_ticket(id)
    }

    pub fn close_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        let Some(mut ticket) = self.get_ticket(id)? else {
            return Ok(None);
        };
        ticket.close(Utc::now());
        self.update_ticket(&ticket)?;
        Ok(Some(ticket))
    }

    pub fn reopen_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        let Some(mut ticket) = self.get_ticket(id)? else {
            return Ok(None);
        };
        ticket.reopen(Utc::now());
        self.update_ticket(&ticket)?;
        Ok(Some(ticket))
    }

    fn query_tickets<P: Params>(&self, clause: &str, params: P) -> Result<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets {} ORDER BY created_at, id",
            TICKET_COLUMNS, clause
        );
        let mut stmt = self
            .conn
            .prepare(&sql)
            .context("Failed to prepare ticket query")?;
        let rows = stmt
            .query_map(params, TicketRow::from_row)
            .context("Failed to query tickets")?;
        let mut tickets = Vec::new();
        for row in rows {
            let r = row.context("Failed to read ticket row")?;
            tickets.push(r.into_ticket()?);
        }
        Ok(tickets)
    }

    // ── Comments ──────────────────────────────────────────────────────

    /// Append a comment. Returns `None` when the ticket does not exist.
    pub fn add_comment(&self, comment: &NewComment) -> Result<Option<TicketComment>> {
        let exists: bool = self
            .conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM tickets WHERE id = ?1)",
                params![comment.ticket_id],
                |row| row.get(0),
            )
            .context("Failed to check ticket existence")?;
        if !exists {
            return Ok(None);
        }

        let created_at = Utc::now();
        self.conn
            .execute(
                "INSERT INTO ticket_comments (ticket_id, user_id, content, is_internal, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    comment.ticket_id,
                    comment.user_id,
                    comment.content,
                    comment.is_internal,
                    format_ts(created_at),
                ],
            )
            .context("Failed to insert comment")?;

        Ok(Some(TicketComment {
            id: self.conn.last_insert_rowid(),
            ticket_id: comment.ticket_id,
            user_id: comment.user_id,
            content: comment.content.clone(),
            is_internal: comment.is_internal,
            created_at,
        }))
    }

    pub fn comments_for_ticket(&self, ticket_id: i64) -> Result<Vec<TicketComment>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, ticket_id, user_id, content, is_internal, created_at
                 FROM ticket_comments WHERE ticket_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare comments_for_ticket")?;
        let rows = stmt
            .query_map(params![ticket_id], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<i64>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })
            .context("Failed to query comments")?;
        let mut comments = Vec::new();
        for row in rows {
            let (id, ticket_id, user_id, content, is_internal, created_at) =
                row.context("Failed to read comment row")?;
            comments.push(TicketComment {
                id,
                ticket_id,
                user_id,
                content,
                is_internal,
                created_at: parse_ts(&created_at)?,
            });
        }
        Ok(comments)
    }
}

// ── Row mapping helpers ───────────────────────────────────────────────

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .with_context(|| format!("Invalid timestamp in database: {}", raw))
}

/// Intermediate row struct for tickets.
struct TicketRow {
    id: i64,
    title: String,
    description: String,
    user_id: Option<i64>,
    agent_type: String,
    status: String,
    priority: String,
    assigned_to: Option<i64>,
    created_at: String,
    updated_at: String,
    resolved_at: Option<String>,
    due_at: Option<String>,
    tags: String,
}

impl TicketRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            user_id: row.get(3)?,
            agent_type: row.get(4)?,
            status: row.get(5)?,
            priority: row.get(6)?,
            assigned_to: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
            resolved_at: row.get(10)?,
            due_at: row.get(11)?,
            tags: row.get(12)?,
        })
    }

    fn into_ticket(self) -> Result<Ticket> {
        let agent_type = AgentType::from_str(&self.agent_type)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse ticket agent type")?;
        let status = TicketStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse ticket status")?;
        let priority = Priority::from_str(&self.priority)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse ticket priority")?;
        let tags: Vec<String> =
            serde_json::from_str(&self.tags).context("Failed to parse ticket tags JSON")?;

        Ok(Ticket {
            id: self.id,
            title: self.title,
            description: self.description,
            user_id: self.user_id,
            agent_type,
            status,
            priority,
            assigned_to: self.assigned_to,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            resolved_at: self.resolved_at.as_deref().map(parse_ts).transpose()?,
            due_at: self.due_at.as_deref().map(parse_ts).transpose()?,
            tags,
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn new_ticket(title: &str, agent_type: AgentType) -> NewTicket {
        NewTicket::new(title, "description", agent_type)
    }

    #[test]
    fn test_create_database_and_run_migrations() -> Result<()> {
        let db = TicketDb::new_in_memory()?;

        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN ('tickets', 'ticket_comments')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 2, "Expected 2 tables to exist");

        let index_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='index' AND name IN ('idx_tickets_agent', 'idx_tickets_status', 'idx_tickets_user', 'idx_ticket_comments_ticket')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(index_count, 4, "Expected 4 indexes to exist");

        Ok(())
    }

    #[test]
    fn test_migrations_are_idempotent() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("tickets.db");
        let first = TicketDb::new(&path)?;
        first.create_ticket(&new_ticket("persisted", AgentType::Sales))?;
        drop(first);

        let second = TicketDb::new(&path)?;
        assert_eq!(second.list_tickets()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_create_ticket_starts_open() -> Result<()> {
        let db = TicketDb::new_in_memory()?;

        let ticket = db.create_ticket(
            &new_ticket("VPN down", AgentType::CustomerService)
                .with_priority(Priority::Critical)
                .with_user(9)
                .with_tags(vec!["network".into(), "vpn".into()]),
        )?;
        assert!(ticket.id > 0);
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority, Priority::Critical);
        assert_eq!(ticket.user_id, Some(9));
        assert_eq!(ticket.tags, vec!["network".to_string(), "vpn".to_string()]);
        assert!(ticket.resolved_at.is_none());

        let fetched = db.get_ticket(ticket.id)?.expect("ticket should exist");
        assert_eq!(fetched, ticket);
        Ok(())
    }

    #[test]
    fn test_get_missing_ticket_returns_none() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        assert!(db.get_ticket(999)?.is_none());
        Ok(())
    }

    #[test]
    fn test_tickets_by_agent_filters_and_orders_by_creation() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let first = db.create_ticket(&new_ticket("first", AgentType::CustomerService))?;
        db.create_ticket(&new_ticket("other", AgentType::Invoicing))?;
        let second = db.create_ticket(&new_ticket("second", AgentType::CustomerService))?;

        let tickets = db.tickets_by_agent(AgentType::CustomerService)?;
        let ids: Vec<i64> = tickets.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![first.id, second.id]);
        Ok(())
    }

    #[test]
    fn test_tickets_by_status_and_user() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let a = db.create_ticket(&new_ticket("a", AgentType::Sales).with_user(1))?;
        let b = db.create_ticket(&new_ticket("b", AgentType::Sales).with_user(2))?;
        db.close_ticket(b.id)?;

        let open = db.tickets_by_status(TicketStatus::Open)?;
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, a.id);

        let closed = db.tickets_by_status(TicketStatus::Closed)?;
        assert_eq!(closed.len(), 1);
        assert_eq!(closed[0].id, b.id);

        let by_user = db.tickets_by_user(2)?;
        assert_eq!(by_user.len(), 1);
        assert_eq!(by_user[0].id, b.id);
        Ok(())
    }

    #[test]
    fn test_update_ticket_full_row() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let mut ticket = db.create_ticket(&new_ticket("update me", AgentType::CustomerService))?;

        ticket.start_work(Utc::now());
        ticket.priority = Priority::High;
        ticket.assigned_to = Some(5);
        assert!(db.update_ticket(&ticket)?);

        let fetched = db.get_ticket(ticket.id)?.unwrap();
        assert_eq!(fetched.status, TicketStatus::InProgress);
        assert_eq!(fetched.priority, Priority::High);
        assert_eq!(fetched.assigned_to, Some(5));
        Ok(())
    }

    #[test]
    fn test_update_missing_ticket_reports_false() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let mut ticket = db.create_ticket(&new_ticket("ghost", AgentType::Sales))?;
        ticket.id = 4242;
        assert!(!db.update_ticket(&ticket)?);
        Ok(())
    }

    #[test]
    fn test_close_ticket_sets_resolution_time() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let ticket = db.create_ticket(&new_ticket("close me", AgentType::Accounting))?;

        let closed = db.close_ticket(ticket.id)?.expect("ticket exists");
        assert_eq!(closed.status, TicketStatus::Closed);
        let resolved_at = closed.resolved_at.expect("resolved_at set on close");
        assert!(resolved_at >= closed.created_at);
        assert!(db.close_ticket(777)?.is_none());
        Ok(())
    }

    #[test]
    fn test_reopen_ticket_returns_it_to_the_queue() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let ticket = db.create_ticket(&new_ticket("again", AgentType::Sales))?;
        db.close_ticket(ticket.id)?;

        let reopened = db.reopen_ticket(ticket.id)?.expect("ticket exists");
        assert_eq!(reopened.status, TicketStatus::Open);
        assert!(reopened.resolved_at.is_none());
        assert_eq!(db.tickets_by_status(TicketStatus::Open)?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_reassign_and_assign() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let ticket = db.create_ticket(&new_ticket("misrouted", AgentType::Sales))?;

        let moved = db.reassign_agent(ticket.id, AgentType::Invoicing)?.unwrap();
        assert_eq!(moved.agent_type, AgentType::Invoicing);
        assert!(db.tickets_by_agent(AgentType::Sales)?.is_empty());

        let assigned = db.assign_ticket(ticket.id, 11)?.unwrap();
        assert_eq!(assigned.assigned_to, Some(11));
        Ok(())
    }

    #[test]
    fn test_comments_append_in_order() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let ticket = db.create_ticket(&new_ticket("chatty", AgentType::CustomerService))?;

        let first = db
            .add_comment(&NewComment::public(ticket.id, "first"))?
            .expect("ticket exists");
        db.add_comment(&NewComment::internal(ticket.id, "second"))?;

        let comments = db.comments_for_ticket(ticket.id)?;
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0], first);
        assert_eq!(comments[1].content, "second");
        assert!(comments[1].is_internal);
        Ok(())
    }

    #[test]
    fn test_comment_on_missing_ticket_returns_none() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        assert!(db.add_comment(&NewComment::public(31337, "hello"))?.is_none());
        Ok(())
    }

    #[test]
    fn test_delete_ticket_cascades_comments() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let ticket = db.create_ticket(&new_ticket("doomed", AgentType::KqlHunting))?;
        db.add_comment(&NewComment::public(ticket.id, "note"))?;

        assert!(db.delete_ticket(ticket.id)?);
        assert!(!db.delete_ticket(ticket.id)?);
        assert!(db.comments_for_ticket(ticket.id)?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_handle_update_rejects_lifecycle_violation() -> Result<()> {
        let handle = DbHandle::new(TicketDb::new_in_memory()?);
        let mut ticket = handle
            .call(|db| db.create_ticket(&NewTicket::new("bad", "", AgentType::Sales)))
            .await?;
        ticket.status = TicketStatus::Resolved;

        let err = handle.update_ticket(&ticket).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidTicket { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_handle_reports_missing_ticket() -> Result<()> {
        let handle = DbHandle::new(TicketDb::new_in_memory()?);
        let mut ticket = handle
            .call(|db| db.create_ticket(&NewTicket::new("x", "", AgentType::Sales)))
            .await?;
        ticket.id = 999;

        let err = handle.update_ticket(&ticket).await.unwrap_err();
        assert!(matches!(err, StoreError::TicketNotFound { id: 999 }));

        let err = handle
            .add_comment(NewComment::internal(999, "nope"))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::TicketNotFound { id: 999 }));
        Ok(())
    }
}
