//! In-process storage backend.

use super::{decode_tasks, encode_tasks, StorageResult, TaskStorage};
use crate::model::task::Task;

/// Keeps the serialized document in memory.
///
/// Useful for tests and for hosts that persist elsewhere; the document is
/// still encoded so it exercises the same codec as the JSON file backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    document: Option<String>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the backend with raw document content, valid or not.
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
        }
    }

    /// Last written document, if any.
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }
}

impl TaskStorage for MemoryStorage {
    fn backend(&self) -> &'static str {
        "memory"
    }

    fn read_tasks(&self) -> StorageResult<Vec<Task>> {
        match &self.document {
            Some(document) => decode_tasks(document),
            None => Ok(Vec::new()),
        }
    }

    fn write_tasks(&mut self, tasks: &[Task]) -> StorageResult<()> {
        self.document = Some(encode_tasks(tasks)?);
        Ok(())
    }
}
