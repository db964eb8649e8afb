//! Derived list views: filter, then sort, then group.
//!
//! # Responsibility
//! - Turn the store's collection plus user-selected options into the ordered,
//!   grouped sequence a list screen renders.
//!
//! # Invariants
//! - `derive_view` is pure: no I/O, no state, never mutates its input, and
//!   the same input always yields the same output order.
//! - Sorting is stable in both directions; equal keys keep collection order.
//! - A missing due date sorts before every present one.
//! - Grouping never reorders tasks inside a group.
//! - The `overdue` filter excludes completed tasks, while the `overdue` due
//!   date bucket only looks at the date. The two are intentionally distinct.

use crate::model::task::{Priority, Task};
use chrono::NaiveDateTime;
use std::cmp::Ordering;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Which tasks to keep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum FilterOption {
    #[default]
    All,
    Active,
    Completed,
    Overdue,
}

/// Sort key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortOption {
    #[default]
    DueDate,
    Priority,
    Title,
    CreatedAt,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// How to split the sorted list into labeled sections.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum GroupOption {
    #[default]
    None,
    Priority,
    DueDate,
}

/// Full set of user-selected view options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct ViewOptions {
    pub filter: FilterOption,
    pub sort: SortOption,
    pub direction: SortDirection,
    pub group: GroupOption,
}

/// Due-date section of the `dueDate` grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DueBucket {
    Today,
    Overdue,
    Upcoming,
    NoDueDate,
}

impl DueBucket {
    pub fn label(self) -> &'static str {
        match self {
            Self::Today => "today",
            Self::Overdue => "overdue",
            Self::Upcoming => "upcoming",
            Self::NoDueDate => "no due date",
        }
    }
}

/// Identity of one output group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    /// The single group produced by `GroupOption::None`.
    All,
    /// `None` collects tasks without a priority.
    Priority(Option<Priority>),
    Due(DueBucket),
}

impl GroupKey {
    /// Translation key for the section header; empty for `All`.
    pub fn label(self) -> &'static str {
        match self {
            Self::All => "",
            Self::Priority(Some(priority)) => priority.as_str(),
            Self::Priority(None) => "no priority",
            Self::Due(bucket) => bucket.label(),
        }
    }
}

const PRIORITY_ORDER: [GroupKey; 4] = [
    GroupKey::Priority(Some(Priority::High)),
    GroupKey::Priority(Some(Priority::Medium)),
    GroupKey::Priority(Some(Priority::Low)),
    GroupKey::Priority(None),
];

const DUE_ORDER: [GroupKey; 4] = [
    GroupKey::Due(DueBucket::Today),
    GroupKey::Due(DueBucket::Overdue),
    GroupKey::Due(DueBucket::Upcoming),
    GroupKey::Due(DueBucket::NoDueDate),
];

/// One labeled section of a view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskGroup<'a> {
    pub key: GroupKey,
    pub tasks: Vec<&'a Task>,
}

impl TaskGroup<'_> {
    pub fn label(&self) -> &'static str {
        self.key.label()
    }
}

/// Result of `derive_view`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskView<'a> {
    pub groups: Vec<TaskGroup<'a>>,
}

impl<'a> TaskView<'a> {
    /// Number of tasks that passed the filter.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|group| group.tasks.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All tasks in display order, ignoring group boundaries.
    pub fn tasks(&self) -> impl Iterator<Item = &'a Task> + '_ {
        self.groups
            .iter()
            .flat_map(|group| group.tasks.iter().copied())
    }
}

/// Derives the displayable view of `tasks`.
///
/// `now` is the reference instant in local wall-clock time; it decides what
/// counts as overdue and which calendar day is "today".
pub fn derive_view<'a>(tasks: &'a [Task], options: &ViewOptions, now: NaiveDateTime) -> TaskView<'a> {
    let mut selected: Vec<&Task> = tasks
        .iter()
        .filter(|task| options.filter.matches(task, now))
        .collect();

    // `sort_by` is stable, which the tie ordering relies on.
    selected.sort_by(|a, b| {
        let ordering = compare_by(options.sort, a, b);
        match options.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    });

    let groups = match options.group {
        GroupOption::None => vec![TaskGroup {
            key: GroupKey::All,
            tasks: selected,
        }],
        GroupOption::Priority => bucket(selected, &PRIORITY_ORDER, |task| {
            GroupKey::Priority(task.priority)
        }),
        GroupOption::DueDate => {
            let today = now.date();
            bucket(selected, &DUE_ORDER, |task| {
                GroupKey::Due(due_bucket(task, today))
            })
        }
    };

    TaskView { groups }
}

impl FilterOption {
    /// Returns whether `task` passes this filter at `now`.
    pub fn matches(self, task: &Task, now: NaiveDateTime) -> bool {
        match self {
            Self::All => true,
            Self::Active => !task.completed,
            Self::Completed => task.completed,
            Self::Overdue => task.is_overdue(now),
        }
    }
}

/// Ascending comparison of two tasks by `sort`.
pub fn compare_by(sort: SortOption, a: &Task, b: &Task) -> Ordering {
    match sort {
        // `Option` orders `None` first, so undated tasks lead.
        SortOption::DueDate => a.due_instant().cmp(&b.due_instant()),
        SortOption::CreatedAt => a.created_at.cmp(&b.created_at),
        SortOption::Priority => priority_rank(a).cmp(&priority_rank(b)),
        SortOption::Title => compare_titles(&a.title, &b.title),
    }
}

/// Collation-style title order.
///
/// Levels, each consulted only on a tie of the previous one: base letters
/// (accents and case ignored), then accents (plain first), then case
/// (lowercase first), then raw code points.
pub fn compare_titles(a: &str, b: &str) -> Ordering {
    base_letters(a)
        .cmp(base_letters(b))
        .then_with(|| folded(a).cmp(folded(b)))
        .then_with(|| case_marks(a).cmp(case_marks(b)))
        .then_with(|| a.cmp(b))
}

fn base_letters(title: &str) -> impl Iterator<Item = char> + '_ {
    title
        .nfd()
        .filter(|&c| !is_combining_mark(c))
        .flat_map(char::to_lowercase)
}

fn folded(title: &str) -> impl Iterator<Item = char> + '_ {
    title.nfd().flat_map(char::to_lowercase)
}

fn case_marks(title: &str) -> impl Iterator<Item = bool> + '_ {
    title
        .nfd()
        .filter(|&c| !is_combining_mark(c))
        .map(char::is_uppercase)
}

fn priority_rank(task: &Task) -> u8 {
    task.priority.map_or(0, Priority::rank)
}

fn due_bucket(task: &Task, today: chrono::NaiveDate) -> DueBucket {
    match task.due_date {
        None => DueBucket::NoDueDate,
        Some(date) if date == today => DueBucket::Today,
        Some(date) if date < today => DueBucket::Overdue,
        Some(_) => DueBucket::Upcoming,
    }
}

fn bucket<'a>(
    tasks: Vec<&'a Task>,
    order: &[GroupKey],
    key_of: impl Fn(&Task) -> GroupKey,
) -> Vec<TaskGroup<'a>> {
    let mut groups: Vec<TaskGroup<'a>> = order
        .iter()
        .map(|&key| TaskGroup {
            key,
            tasks: Vec::new(),
        })
        .collect();

    for task in tasks {
        let key = key_of(task);
        if let Some(group) = groups.iter_mut().find(|group| group.key == key) {
            group.tasks.push(task);
        }
    }

    groups.retain(|group| !group.tasks.is_empty());
    groups
}

/// Unknown option name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptionError {
    kind: &'static str,
    value: String,
}

impl Display for ParseOptionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown {} option `{}`", self.kind, self.value)
    }
}

impl Error for ParseOptionError {}

macro_rules! wire_names {
    ($ty:ident, $kind:literal, { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ParseOptionError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value.trim() {
                    $($name => Ok(Self::$variant),)+
                    other => Err(ParseOptionError {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

wire_names!(FilterOption, "filter", {
    All => "all",
    Active => "active",
    Completed => "completed",
    Overdue => "overdue",
});

wire_names!(SortOption, "sort", {
    DueDate => "dueDate",
    Priority => "priority",
    Title => "title",
    CreatedAt => "createdAt",
});

wire_names!(SortDirection, "direction", {
    Asc => "asc",
    Desc => "desc",
});

wire_names!(GroupOption, "group", {
    None => "none",
    Priority => "priority",
    DueDate => "dueDate",
});
