//! Core task collection engine for TaskDeck.
//! This crate is the single source of truth for task invariants.

pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod storage;
pub mod store;
pub mod view;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{open_store, CoreConfig, StorageBackend};
pub use logging::{default_log_level, init_logging, logging_status, LoggingConfig, LoggingError};
pub use model::tags::TagSet;
pub use model::task::{Priority, Task, TaskForm, TaskId, TaskPatch, TaskValidationError};
pub use storage::{
    JsonFileStorage, MemoryStorage, SqliteTaskStorage, StorageError, StorageResult, TaskStorage,
};
pub use store::{StoreError, StoreResult, TaskStore};
pub use view::{
    derive_view, DueBucket, FilterOption, GroupKey, GroupOption, SortDirection, SortOption,
    TaskGroup, TaskView, ViewOptions,
};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
