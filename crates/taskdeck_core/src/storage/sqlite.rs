//! SQLite storage backend with one row per task.
//!
//! # Invariants
//! - A save rewrites every row of its list in one transaction, so a reader
//!   sees either the previous or the new collection.
//! - `position` carries collection order; rows are read back sorted by it.
//! - Lists sharing a database file never see each other's rows.

use super::{StorageError, StorageResult, TaskStorage, DEFAULT_LIST};
use crate::db::{connect, DbLocation};
use crate::model::tags::TagSet;
use crate::model::task::{Priority, Task};
use crate::model::wire::{format_time, parse_due_date, parse_due_time, DATE_FORMAT};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;
use uuid::Uuid;

const SELECT_LIST: &str = "SELECT id, title, description, due_date, due_time, completed,
        priority, tags, created_at, updated_at
   FROM tasks
  WHERE list = ?1
  ORDER BY position;";

const INSERT_TASK: &str = "INSERT INTO tasks (
        list, id, position, title, description, due_date, due_time,
        completed, priority, tags, created_at, updated_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12);";

/// Stores each task of one named list as a row of the `tasks` table.
pub struct SqliteTaskStorage {
    conn: Connection,
    list: String,
}

impl SqliteTaskStorage {
    /// Opens (or creates) the database file and targets `list`.
    pub fn open(path: impl AsRef<Path>, list: impl Into<String>) -> StorageResult<Self> {
        let conn = connect(DbLocation::File(path.as_ref()))?;
        Ok(Self::from_connection(conn, list))
    }

    /// Opens a private in-memory database using the default list.
    pub fn open_in_memory() -> StorageResult<Self> {
        Ok(Self::from_connection(
            connect(DbLocation::Memory)?,
            DEFAULT_LIST,
        ))
    }

    /// Wraps a connection whose schema is already upgraded.
    pub fn from_connection(conn: Connection, list: impl Into<String>) -> Self {
        Self {
            conn,
            list: list.into(),
        }
    }

    pub fn list_name(&self) -> &str {
        &self.list
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

impl TaskStorage for SqliteTaskStorage {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    fn read_tasks(&self) -> StorageResult<Vec<Task>> {
        let mut stmt = self.conn.prepare(SELECT_LIST)?;
        let rows = stmt.query_map([self.list.as_str()], TaskRow::from_row)?;

        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?.into_task()?);
        }
        Ok(tasks)
    }

    fn write_tasks(&mut self, tasks: &[Task]) -> StorageResult<()> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM tasks WHERE list = ?1;", [self.list.as_str()])?;
        {
            let mut insert = tx.prepare(INSERT_TASK)?;
            for (position, task) in (0_i64..).zip(tasks) {
                let tags = serde_json::to_string(&task.tags).map_err(StorageError::Encode)?;
                insert.execute(params![
                    self.list,
                    task.id.to_string(),
                    position,
                    task.title,
                    task.description,
                    task.due_date.map(|date| date.format(DATE_FORMAT).to_string()),
                    task.time.map(format_time),
                    task.completed,
                    task.priority.map(Priority::as_str),
                    tags,
                    format_instant(task.created_at),
                    task.updated_at.map(format_instant),
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

/// Raw column values of one `tasks` row.
struct TaskRow {
    id: String,
    title: String,
    description: String,
    due_date: Option<String>,
    due_time: Option<String>,
    completed: bool,
    priority: Option<String>,
    tags: String,
    created_at: String,
    updated_at: Option<String>,
}

impl TaskRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            due_date: row.get(3)?,
            due_time: row.get(4)?,
            completed: row.get(5)?,
            priority: row.get(6)?,
            tags: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    fn into_task(self) -> StorageResult<Task> {
        let invalid = |column| StorageError::InvalidRow {
            id: self.id.clone(),
            column,
        };

        let id = Uuid::parse_str(&self.id).map_err(|_| invalid("id"))?;
        let due_date = self
            .due_date
            .as_deref()
            .map(|text| parse_due_date(text).ok_or_else(|| invalid("due_date")))
            .transpose()?;
        let time = self
            .due_time
            .as_deref()
            .map(|text| parse_due_time(text).ok_or_else(|| invalid("due_time")))
            .transpose()?;
        let priority = self
            .priority
            .as_deref()
            .map(|text| Priority::parse(text).ok_or_else(|| invalid("priority")))
            .transpose()?;
        let tags: TagSet = serde_json::from_str(&self.tags).map_err(|_| invalid("tags"))?;
        let created_at = parse_instant(&self.created_at).ok_or_else(|| invalid("created_at"))?;
        let updated_at = self
            .updated_at
            .as_deref()
            .map(|text| parse_instant(text).ok_or_else(|| invalid("updated_at")))
            .transpose()?;

        Ok(Task {
            id,
            title: self.title,
            description: self.description,
            due_date,
            time,
            completed: self.completed,
            priority,
            tags,
            created_at,
            updated_at,
        })
    }
}

fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn parse_instant(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|instant| instant.with_timezone(&Utc))
}
