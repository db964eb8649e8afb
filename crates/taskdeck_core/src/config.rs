//! Runtime configuration for hosts embedding the core.
//!
//! # Responsibility
//! - Resolve where the task document and log files live.
//! - Build the configured storage backend and a hydrated store.

use crate::logging::{default_log_level, LoggingConfig};
use crate::storage::{
    JsonFileStorage, SqliteTaskStorage, StorageResult, TaskStorage, DEFAULT_LIST,
};
use crate::store::TaskStore;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

const SQLITE_FILE_NAME: &str = "taskdeck.sqlite3";
const LOG_DIR_NAME: &str = "logs";

/// Durable backend kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    /// `<data_dir>/<list>.json`
    #[default]
    Json,
    /// `<data_dir>/taskdeck.sqlite3`, one row per task of the list.
    Sqlite,
}

impl Display for StorageBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Sqlite => f.write_str("sqlite"),
        }
    }
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!(
                "unsupported storage backend `{other}`; expected json|sqlite"
            )),
        }
    }
}

/// Core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    pub data_dir: PathBuf,
    #[serde(default)]
    pub backend: StorageBackend,
    /// Name of the task list; also the JSON file stem.
    #[serde(default = "default_list")]
    pub list: String,
    #[serde(default = "default_level")]
    pub log_level: String,
}

impl CoreConfig {
    /// Config rooted at `data_dir` with defaults for everything else.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            backend: StorageBackend::default(),
            list: default_list(),
            log_level: default_level(),
        }
    }

    pub fn with_backend(mut self, backend: StorageBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// File holding the persisted collection for the chosen backend.
    pub fn storage_path(&self) -> PathBuf {
        match self.backend {
            StorageBackend::Json => self.data_dir.join(format!("{}.json", self.list)),
            StorageBackend::Sqlite => self.data_dir.join(SQLITE_FILE_NAME),
        }
    }

    pub fn logging(&self) -> LoggingConfig {
        LoggingConfig::new(self.log_level.clone(), self.data_dir.join(LOG_DIR_NAME))
    }

    /// Builds the configured backend, creating `data_dir` when needed.
    ///
    /// # Errors
    /// Fails when the directory cannot be created or the SQLite database
    /// cannot be opened and migrated.
    pub fn open_storage(&self) -> StorageResult<Box<dyn TaskStorage>> {
        std::fs::create_dir_all(&self.data_dir)?;
        let storage: Box<dyn TaskStorage> = match self.backend {
            StorageBackend::Json => Box::new(JsonFileStorage::new(self.storage_path())),
            StorageBackend::Sqlite => Box::new(SqliteTaskStorage::open(
                self.storage_path(),
                self.list.clone(),
            )?),
        };
        Ok(storage)
    }
}

/// Opens the configured backend and hydrates a store from it.
pub fn open_store(config: &CoreConfig) -> StorageResult<TaskStore<Box<dyn TaskStorage>>> {
    Ok(TaskStore::open(config.open_storage()?))
}

fn default_list() -> String {
    DEFAULT_LIST.to_string()
}

fn default_level() -> String {
    default_log_level().to_string()
}
