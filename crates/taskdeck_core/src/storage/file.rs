//! Single-file JSON storage backend.

use super::{decode_tasks, encode_tasks, StorageResult, TaskStorage};
use crate::model::task::Task;
use log::warn;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Stores the collection as one JSON file.
///
/// Writes go to a sibling `.tmp` file that is synced and renamed over the
/// target, so readers see either the previous or the new document. A failed
/// write removes the temp file again.
#[derive(Debug, Clone)]
pub struct JsonFileStorage {
    path: PathBuf,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the raw document, or `None` when the file does not exist.
    pub fn read_document(&self) -> StorageResult<Option<String>> {
        match fs::read_to_string(&self.path) {
            Ok(document) => Ok(Some(document)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Atomically replaces the file content with `document`.
    pub fn write_document(&mut self, document: &str) -> StorageResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.temp_path();
        let written = write_synced(&temp_path, document)
            .and_then(|()| fs::rename(&temp_path, &self.path));
        if let Err(err) = written {
            if let Err(cleanup) = fs::remove_file(&temp_path) {
                if cleanup.kind() != ErrorKind::NotFound {
                    warn!(
                        "event=storage_save module=storage status=error error_code=temp_cleanup_failed backend=json_file error={cleanup}"
                    );
                }
            }
            return Err(err.into());
        }
        Ok(())
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

fn write_synced(path: &Path, document: &str) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(document.as_bytes())?;
    file.sync_all()
}

impl TaskStorage for JsonFileStorage {
    fn backend(&self) -> &'static str {
        "json_file"
    }

    fn read_tasks(&self) -> StorageResult<Vec<Task>> {
        match self.read_document()? {
            Some(document) => decode_tasks(&document),
            None => Ok(Vec::new()),
        }
    }

    fn write_tasks(&mut self, tasks: &[Task]) -> StorageResult<()> {
        let document = encode_tasks(tasks)?;
        self.write_document(&document)
    }
}

#[cfg(test)]
mod tests {
    use super::JsonFileStorage;

    #[test]
    fn missing_file_reads_as_no_document() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path().join("todos.json"));
        assert_eq!(storage.read_document().unwrap(), None);
    }

    #[test]
    fn write_creates_parent_dirs_and_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("todos.json");
        let mut storage = JsonFileStorage::new(&path);

        storage.write_document("[]").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "[]");
        assert!(!dir.path().join("nested").join("todos.json.tmp").exists());
    }

    #[test]
    fn failed_rename_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.json");
        // A non-empty directory at the target makes the rename fail.
        std::fs::create_dir_all(path.join("occupied")).unwrap();
        let mut storage = JsonFileStorage::new(&path);

        assert!(storage.write_document("[]").is_err());
        assert!(!dir.path().join("todos.json.tmp").exists());
        assert!(path.is_dir());
    }
}
