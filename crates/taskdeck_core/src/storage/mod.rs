//! Persistence contract for the task collection.
//!
//! # Responsibility
//! - Load the whole collection once at startup.
//! - Overwrite the whole collection after every mutation.
//!
//! # Invariants
//! - `load` never fails: a missing, unreadable or unparsable store yields
//!   an empty collection and a `warn` event.
//! - Loaded records that break a `Task` invariant, or repeat an id already
//!   seen, are skipped one by one with a `warn` event; the rest still load.
//! - `save` always writes the full collection; there are no partial writes
//!   and no merge with what is already stored.

use crate::db::DbError;
use crate::model::task::{Task, TaskId};
use log::{info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

mod file;
mod memory;
mod sqlite;

pub use file::JsonFileStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteTaskStorage;

/// Name of the list the collection is stored under.
pub const DEFAULT_LIST: &str = "todos";

pub type StorageResult<T> = Result<T, StorageError>;

/// Failure while reading or writing the persisted collection.
#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Db(DbError),
    Encode(serde_json::Error),
    Decode(serde_json::Error),
    /// A stored row holds a value that does not parse back into a task.
    InvalidRow { id: String, column: &'static str },
}

impl Display for StorageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "storage i/o failed: {err}"),
            Self::Db(err) => write!(f, "storage database failed: {err}"),
            Self::Encode(err) => write!(f, "failed to encode task collection: {err}"),
            Self::Decode(err) => write!(f, "stored task collection is malformed: {err}"),
            Self::InvalidRow { id, column } => {
                write!(f, "stored task `{id}` has an unreadable `{column}` value")
            }
        }
    }
}

impl Error for StorageError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Encode(err) | Self::Decode(err) => Some(err),
            Self::InvalidRow { .. } => None,
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<DbError> for StorageError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Durable home of the task collection.
///
/// Implementors move whole collections; `load`/`try_load` add the failure
/// policy and record screening on top.
pub trait TaskStorage {
    /// Short backend name used in log events.
    fn backend(&self) -> &'static str;

    /// Reads every stored record in collection order, unscreened.
    fn read_tasks(&self) -> StorageResult<Vec<Task>>;

    /// Replaces the stored collection with `tasks`.
    fn write_tasks(&mut self, tasks: &[Task]) -> StorageResult<()>;

    /// Loads the collection, treating any failure as "no data".
    fn load(&self) -> Vec<Task> {
        let started_at = Instant::now();
        match self.try_load() {
            Ok(tasks) => {
                info!(
                    "event=storage_load module=storage status=ok backend={} count={} duration_ms={}",
                    self.backend(),
                    tasks.len(),
                    started_at.elapsed().as_millis()
                );
                tasks
            }
            Err(err) => {
                warn!(
                    "event=storage_load module=storage status=fallback backend={} error={}",
                    self.backend(),
                    err
                );
                Vec::new()
            }
        }
    }

    /// Loads the collection and reports read or parse failures.
    ///
    /// Invalid and duplicate records are dropped, not reported as errors.
    fn try_load(&self) -> StorageResult<Vec<Task>> {
        let stored = self.read_tasks()?;
        Ok(retain_loadable(stored, self.backend()))
    }

    /// Overwrites the stored collection.
    fn save(&mut self, tasks: &[Task]) -> StorageResult<()> {
        self.write_tasks(tasks)
    }
}

impl<T: TaskStorage + ?Sized> TaskStorage for Box<T> {
    fn backend(&self) -> &'static str {
        (**self).backend()
    }

    fn read_tasks(&self) -> StorageResult<Vec<Task>> {
        (**self).read_tasks()
    }

    fn write_tasks(&mut self, tasks: &[Task]) -> StorageResult<()> {
        (**self).write_tasks(tasks)
    }
}

/// Keeps records that satisfy `Task` invariants, first occurrence per id.
pub fn retain_loadable(tasks: Vec<Task>, backend: &str) -> Vec<Task> {
    let mut seen: HashSet<TaskId> = HashSet::with_capacity(tasks.len());
    tasks
        .into_iter()
        .filter(|task| {
            if let Err(err) = task.validate_fields() {
                warn!(
                    "event=storage_load module=storage status=skipped backend={backend} task_id={} reason=invalid field={}",
                    task.id,
                    err.field()
                );
                return false;
            }
            if !seen.insert(task.id) {
                warn!(
                    "event=storage_load module=storage status=skipped backend={backend} task_id={} reason=duplicate_id",
                    task.id
                );
                return false;
            }
            true
        })
        .collect()
}

/// Encodes a collection as the stored JSON array.
pub fn encode_tasks(tasks: &[Task]) -> StorageResult<String> {
    serde_json::to_string(tasks).map_err(StorageError::Encode)
}

/// Decodes a stored JSON array. Blank and `null` documents decode as empty.
pub fn decode_tasks(document: &str) -> StorageResult<Vec<Task>> {
    if document.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str::<Option<Vec<Task>>>(document)
        .map(Option::unwrap_or_default)
        .map_err(StorageError::Decode)
}
