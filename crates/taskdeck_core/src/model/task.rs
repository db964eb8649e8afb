//! Task record and its validation rules.
//!
//! # Responsibility
//! - Define the canonical task shape shared by storage, store and views.
//! - Turn caller input (`TaskForm`, `TaskPatch`) into fully populated,
//!   validated `Task` values or a typed `TaskValidationError`.
//!
//! # Invariants
//! - `id` and `created_at` are fixed at creation and never rewritten.
//! - `title` is non-empty after trimming and at most `TITLE_MAX_CHARS` long.
//! - `description` is at most `DESCRIPTION_MAX_CHARS` long.
//! - `time` is only set together with `due_date`.
//! - `tags` holds distinct, non-blank entries.

use crate::model::tags::TagSet;
use crate::model::wire::{opt_date, opt_time};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier of a task.
pub type TaskId = Uuid;

pub const TITLE_MAX_CHARS: usize = 100;
pub const DESCRIPTION_MAX_CHARS: usize = 500;

/// Time of day assumed for a due date without an explicit time (`23:59`).
pub fn end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 59, 0).unwrap_or_default()
}

/// Task urgency.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    /// Ordinal used for sorting: high=3, medium=2, low=1.
    pub fn rank(self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 2,
            Self::High => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl Display for Priority {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validation failures for task input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskValidationError {
    EmptyTitle,
    TitleTooLong { len: usize, max: usize },
    DescriptionTooLong { len: usize, max: usize },
    DueDateInPast { due: NaiveDate, today: NaiveDate },
    TimeWithoutDueDate,
    EmptyTag,
}

impl TaskValidationError {
    /// Name of the input field the error belongs to.
    pub fn field(&self) -> &'static str {
        match self {
            Self::EmptyTitle | Self::TitleTooLong { .. } => "title",
            Self::DescriptionTooLong { .. } => "description",
            Self::DueDateInPast { .. } => "dueDate",
            Self::TimeWithoutDueDate => "time",
            Self::EmptyTag => "tags",
        }
    }
}

impl Display for TaskValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::TitleTooLong { len, max } => {
                write!(f, "title is {len} characters long; at most {max} allowed")
            }
            Self::DescriptionTooLong { len, max } => {
                write!(
                    f,
                    "description is {len} characters long; at most {max} allowed"
                )
            }
            Self::DueDateInPast { due, today } => {
                write!(f, "due date {due} is before today ({today})")
            }
            Self::TimeWithoutDueDate => write!(f, "a due time requires a due date"),
            Self::EmptyTag => write!(f, "tags must not be blank"),
        }
    }
}

impl Error for TaskValidationError {}

/// Canonical task record.
///
/// Serialized with camelCase keys so the stored document matches the
/// browser-era layout (`dueDate`, `createdAt`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, with = "opt_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, with = "opt_time")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub completed: bool,
    /// `None` only for records written before priorities existed.
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub tags: TagSet,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Builds a new task from validated form input.
    ///
    /// `today` is the caller's local calendar date; a due date before it is
    /// rejected.
    ///
    /// # Errors
    /// Returns the first constraint the form violates.
    pub fn from_form(
        id: TaskId,
        form: TaskForm,
        created_at: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<Self, TaskValidationError> {
        form.validate(today)?;

        Ok(Self {
            id,
            title: form.title,
            description: form.description,
            due_date: form.due_date,
            time: form.time,
            completed: false,
            priority: Some(form.priority),
            tags: form.tags.into_iter().collect(),
            created_at,
            updated_at: None,
        })
    }

    /// Returns a copy of this task with `patch` merged in and re-validated.
    ///
    /// The past-due check only runs when the patch changes the due date, so
    /// editing an old task's title does not fail because its deadline passed.
    ///
    /// # Errors
    /// Returns the first constraint the merged record violates; `self` is
    /// never modified.
    pub fn apply_patch(
        &self,
        patch: TaskPatch,
        updated_at: DateTime<Utc>,
        today: NaiveDate,
    ) -> Result<Self, TaskValidationError> {
        let mut next = self.clone();
        let due_changed = matches!(patch.due_date, Some(due) if due != self.due_date);

        if let Some(title) = patch.title {
            next.title = title;
        }
        if let Some(description) = patch.description {
            next.description = description;
        }
        if let Some(due_date) = patch.due_date {
            next.due_date = due_date;
        }
        if let Some(time) = patch.time {
            next.time = time;
        }
        if let Some(priority) = patch.priority {
            next.priority = Some(priority);
        }
        if let Some(completed) = patch.completed {
            next.completed = completed;
        }
        if let Some(tags) = patch.tags {
            check_tags(&tags)?;
            next.tags = tags.into_iter().collect();
        }

        next.validate_fields()?;
        if due_changed {
            check_due_date(next.due_date, today)?;
        }

        next.updated_at = Some(updated_at);
        Ok(next)
    }

    /// Checks shape invariants that hold for every stored task.
    pub fn validate_fields(&self) -> Result<(), TaskValidationError> {
        check_title(&self.title)?;
        check_description(&self.description)?;
        check_time_pairing(self.due_date, self.time)?;
        check_tags(self.tags.as_slice())
    }

    /// Due moment in local wall-clock time; a missing time means end of day.
    pub fn due_instant(&self) -> Option<NaiveDateTime> {
        self.due_date
            .map(|date| date.and_time(self.time.unwrap_or_else(end_of_day)))
    }

    /// Returns whether the task is past due at `now` and still open.
    pub fn is_overdue(&self, now: NaiveDateTime) -> bool {
        if self.completed {
            return false;
        }
        self.due_instant().is_some_and(|due| due < now)
    }
}

/// Input for creating a task. Only the title is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskForm {
    pub title: String,
    pub description: String,
    pub due_date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub priority: Priority,
    pub tags: Vec<String>,
}

impl TaskForm {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn due(mut self, date: NaiveDate) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn at(mut self, time: NaiveTime) -> Self {
        self.time = Some(time);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Validates the form against the caller's local date.
    ///
    /// Checks run in field order: title, description, due date, time, tags.
    pub fn validate(&self, today: NaiveDate) -> Result<(), TaskValidationError> {
        check_title(&self.title)?;
        check_description(&self.description)?;
        check_due_date(self.due_date, today)?;
        check_time_pairing(self.due_date, self.time)?;
        check_tags(&self.tags)
    }
}

/// Partial update input. `None` leaves a field unchanged.
///
/// `due_date` and `time` are doubly optional so a patch can clear them with
/// `Some(None)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Option<NaiveDate>>,
    pub time: Option<Option<NaiveTime>>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn due(mut self, date: Option<NaiveDate>) -> Self {
        self.due_date = Some(date);
        self
    }

    pub fn at(mut self, time: Option<NaiveTime>) -> Self {
        self.time = Some(time);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn tags(mut self, tags: Vec<String>) -> Self {
        self.tags = Some(tags);
        self
    }

    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn check_title(title: &str) -> Result<(), TaskValidationError> {
    if title.trim().is_empty() {
        return Err(TaskValidationError::EmptyTitle);
    }
    let len = title.chars().count();
    if len > TITLE_MAX_CHARS {
        return Err(TaskValidationError::TitleTooLong {
            len,
            max: TITLE_MAX_CHARS,
        });
    }
    Ok(())
}

fn check_description(description: &str) -> Result<(), TaskValidationError> {
    let len = description.chars().count();
    if len > DESCRIPTION_MAX_CHARS {
        return Err(TaskValidationError::DescriptionTooLong {
            len,
            max: DESCRIPTION_MAX_CHARS,
        });
    }
    Ok(())
}

fn check_due_date(due: Option<NaiveDate>, today: NaiveDate) -> Result<(), TaskValidationError> {
    match due {
        Some(due) if due < today => Err(TaskValidationError::DueDateInPast { due, today }),
        _ => Ok(()),
    }
}

fn check_time_pairing(
    due: Option<NaiveDate>,
    time: Option<NaiveTime>,
) -> Result<(), TaskValidationError> {
    if due.is_none() && time.is_some() {
        return Err(TaskValidationError::TimeWithoutDueDate);
    }
    Ok(())
}

fn check_tags(tags: &[String]) -> Result<(), TaskValidationError> {
    if tags.iter().any(|tag| tag.trim().is_empty()) {
        return Err(TaskValidationError::EmptyTag);
    }
    Ok(())
}
