//! Authoritative in-memory task collection.
//!
//! # Responsibility
//! - Own the one live `Vec<Task>` of the process and every mutation of it.
//! - Persist the full collection through `TaskStorage` after each mutation.
//!
//! # Invariants
//! - Validation and not-found failures leave the collection untouched.
//! - A failed save never rolls back memory; the store is marked dirty and
//!   the next successful save (any mutation or `flush`) reconciles.
//! - `revision` increases by exactly one per applied mutation.
//! - Creation order is list order; updates keep a task's position.

use crate::clock::{Clock, SystemClock};
use crate::model::task::{Task, TaskForm, TaskId, TaskPatch, TaskValidationError};
use crate::storage::{StorageError, TaskStorage};
use crate::view::{derive_view, TaskView, ViewOptions};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use uuid::Uuid;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by store operations.
#[derive(Debug)]
pub enum StoreError {
    /// Input rejected; nothing changed.
    Validation(TaskValidationError),
    /// No task with this id; nothing changed.
    NotFound(TaskId),
    /// The mutation is applied in memory but could not be saved.
    Storage(StorageError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "invalid {}: {err}", err.field()),
            Self::NotFound(id) => write!(f, "task not found: {id}"),
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::NotFound(_) => None,
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<TaskValidationError> for StoreError {
    fn from(value: TaskValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<StorageError> for StoreError {
    fn from(value: StorageError) -> Self {
        Self::Storage(value)
    }
}

/// Owner of the task collection.
///
/// Construct one per process (or per test) and hand out `&mut` access to
/// callers; there is no shared global instance.
pub struct TaskStore<S: TaskStorage> {
    tasks: Vec<Task>,
    storage: S,
    clock: Arc<dyn Clock>,
    revision: u64,
    dirty: bool,
}

impl<S: TaskStorage> TaskStore<S> {
    /// Hydrates a store from `storage` using the system clock.
    pub fn open(storage: S) -> Self {
        Self::open_with_clock(storage, Arc::new(SystemClock))
    }

    /// Hydrates a store from `storage` with an explicit time source.
    ///
    /// Unreadable or malformed stored data yields an empty store.
    pub fn open_with_clock(storage: S, clock: Arc<dyn Clock>) -> Self {
        let tasks = storage.load();
        info!(
            "event=store_open module=store status=ok backend={} count={}",
            storage.backend(),
            tasks.len()
        );
        Self {
            tasks,
            storage,
            clock,
            revision: 0,
            dirty: false,
        }
    }

    /// Validates `form` and appends a new task.
    ///
    /// # Errors
    /// - `Validation` when the form is rejected; the collection is unchanged.
    /// - `Storage` when the save failed; the task *was* appended.
    pub fn create(&mut self, form: TaskForm) -> StoreResult<Task> {
        let now = self.clock.now();
        let task = Task::from_form(
            self.fresh_id(),
            form,
            now.with_timezone(&chrono::Utc),
            now.date_naive(),
        )
        .inspect_err(|err| {
            debug!(
                "event=task_create module=store status=rejected field={}",
                err.field()
            );
        })?;

        self.tasks.push(task.clone());
        self.commit("task_create", task.id)?;
        Ok(task)
    }

    /// Merges `patch` into the task with `id`, keeping its position.
    ///
    /// # Errors
    /// - `NotFound` when `id` is absent.
    /// - `Validation` when the merged task is rejected.
    /// - `Storage` when the save failed; the update *was* applied.
    pub fn update(&mut self, id: TaskId, patch: TaskPatch) -> StoreResult<Task> {
        let index = self.position(id)?;
        let now = self.clock.now();
        let updated = self.tasks[index]
            .apply_patch(patch, now.with_timezone(&chrono::Utc), now.date_naive())
            .inspect_err(|err| {
                debug!(
                    "event=task_update module=store status=rejected task_id={id} field={}",
                    err.field()
                );
            })?;

        self.tasks[index] = updated.clone();
        self.commit("task_update", id)?;
        Ok(updated)
    }

    /// Flips `completed` on the task with `id`.
    ///
    /// No other field changes, `updated_at` included.
    ///
    /// # Errors
    /// - `NotFound` when `id` is absent.
    /// - `Storage` when the save failed; the toggle *was* applied.
    pub fn toggle_complete(&mut self, id: TaskId) -> StoreResult<Task> {
        let index = self.position(id)?;
        let mut toggled = self.tasks[index].clone();
        toggled.completed = !toggled.completed;

        self.tasks[index] = toggled.clone();
        self.commit("task_toggle", id)?;
        Ok(toggled)
    }

    /// Removes the task with `id`. Removing an absent id is a no-op.
    ///
    /// # Errors
    /// `Storage` when the save failed; the task *was* removed.
    pub fn delete(&mut self, id: TaskId) -> StoreResult<()> {
        let Some(index) = self.tasks.iter().position(|task| task.id == id) else {
            debug!("event=task_delete module=store status=noop task_id={id}");
            return Ok(());
        };

        self.tasks.remove(index);
        self.commit("task_delete", id)
    }

    /// Current collection in creation order.
    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: TaskId) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Change counter; callers re-derive views when it moves.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether the last save attempt failed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Saves the full collection again, clearing the dirty flag on success.
    pub fn flush(&mut self) -> StoreResult<()> {
        self.persist("store_flush")
    }

    /// Derives the view for `options` at the clock's current instant.
    pub fn view(&self, options: &ViewOptions) -> TaskView<'_> {
        derive_view(&self.tasks, options, self.clock.now().naive_local())
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    fn position(&self, id: TaskId) -> StoreResult<usize> {
        self.tasks
            .iter()
            .position(|task| task.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn fresh_id(&self) -> TaskId {
        loop {
            let id = Uuid::new_v4();
            if self.get(id).is_none() {
                return id;
            }
        }
    }

    fn commit(&mut self, event: &'static str, id: TaskId) -> StoreResult<()> {
        self.revision += 1;
        info!(
            "event={event} module=store status=ok task_id={id} revision={} count={}",
            self.revision,
            self.tasks.len()
        );
        self.persist(event)
    }

    fn persist(&mut self, event: &'static str) -> StoreResult<()> {
        match self.storage.save(&self.tasks) {
            Ok(()) => {
                self.dirty = false;
                Ok(())
            }
            Err(err) => {
                self.dirty = true;
                error!(
                    "event={event} module=store status=error error_code=save_failed backend={} error={err}",
                    self.storage.backend()
                );
                Err(err.into())
            }
        }
    }
}
