use chrono::{Local, NaiveDate, NaiveTime, TimeZone};
use std::sync::Arc;
use taskdeck_core::db::schema::{stored_version, target_version, upgrade};
use taskdeck_core::db::{connect, DbError, DbLocation};
use taskdeck_core::storage::DEFAULT_LIST;
use taskdeck_core::{
    open_store, CoreConfig, JsonFileStorage, ManualClock, MemoryStorage, Priority,
    SqliteTaskStorage, StorageBackend, StorageError, TaskForm, TaskPatch, TaskStorage, TaskStore,
};

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Local.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
    ))
}

fn populate<S: TaskStorage>(store: &mut TaskStore<S>) {
    store
        .create(
            TaskForm::new("Pay rent")
                .due(NaiveDate::from_ymd_opt(2026, 4, 1).unwrap())
                .at(NaiveTime::from_hms_opt(9, 0, 0).unwrap())
                .priority(Priority::High)
                .tag("home"),
        )
        .unwrap();
    let second = store.create(TaskForm::new("Call mom")).unwrap();
    store.toggle_complete(second.id).unwrap();
}

#[test]
fn json_file_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.json");

    let mut store = TaskStore::open_with_clock(JsonFileStorage::new(&path), clock());
    populate(&mut store);
    let saved = store.list().to_vec();

    let reopened = TaskStore::open_with_clock(JsonFileStorage::new(&path), clock());
    assert_eq!(reopened.list(), saved);
}

#[test]
fn json_file_storage_treats_corrupted_file_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("todos.json");
    std::fs::write(&path, "[{\"id\": \"oops\"").unwrap();

    let storage = JsonFileStorage::new(&path);
    assert!(matches!(storage.try_load(), Err(StorageError::Decode(_))));

    let mut store = TaskStore::open_with_clock(storage, clock());
    assert!(store.is_empty());

    // The next save replaces the unreadable document.
    store.create(TaskForm::new("fresh start")).unwrap();
    let reloaded = JsonFileStorage::new(&path).try_load().unwrap();
    assert_eq!(reloaded.len(), 1);
}

#[test]
fn sqlite_storage_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskdeck.sqlite3");

    let mut store = TaskStore::open_with_clock(
        SqliteTaskStorage::open(&path, DEFAULT_LIST).unwrap(),
        clock(),
    );
    populate(&mut store);
    let edited = store.list()[0].id;
    store
        .update(edited, TaskPatch::default().description("with receipt"))
        .unwrap();
    let saved = store.list().to_vec();
    drop(store);

    let reopened = TaskStore::open_with_clock(
        SqliteTaskStorage::open(&path, DEFAULT_LIST).unwrap(),
        clock(),
    );
    assert_eq!(reopened.list(), saved);
}

#[test]
fn sqlite_stores_one_row_per_task_in_collection_order() {
    let mut storage = SqliteTaskStorage::open_in_memory().unwrap();
    let mut store = TaskStore::open_with_clock(MemoryStorage::new(), clock());
    for title in ["c", "a", "b"] {
        store.create(TaskForm::new(title)).unwrap();
    }

    storage.save(store.list()).unwrap();
    storage.save(&store.list()[1..]).unwrap();

    let rows: Vec<(String, i64)> = storage
        .connection()
        .prepare("SELECT title, position FROM tasks ORDER BY position;")
        .unwrap()
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(rows, [("a".to_string(), 0), ("b".to_string(), 1)]);

    let titles: Vec<_> = storage.load().into_iter().map(|t| t.title).collect();
    assert_eq!(titles, ["a", "b"]);
}

#[test]
fn sqlite_lists_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("taskdeck.sqlite3");
    let mut source = TaskStore::open_with_clock(MemoryStorage::new(), clock());
    populate(&mut source);

    let mut work = SqliteTaskStorage::open(&path, "work").unwrap();
    work.save(source.list()).unwrap();

    let mut personal = SqliteTaskStorage::open(&path, "personal").unwrap();
    assert!(personal.try_load().unwrap().is_empty());
    personal.save(&[]).unwrap();

    assert_eq!(work.list_name(), "work");
    assert_eq!(work.try_load().unwrap(), source.list());
}

#[test]
fn sqlite_unreadable_row_fails_load_and_store_opens_empty() {
    let mut storage = SqliteTaskStorage::open_in_memory().unwrap();
    let mut source = TaskStore::open_with_clock(MemoryStorage::new(), clock());
    populate(&mut source);
    storage.save(source.list()).unwrap();
    storage
        .connection()
        .execute("UPDATE tasks SET due_date = 'someday' WHERE position = 0;", [])
        .unwrap();

    let err = storage.try_load().unwrap_err();
    assert!(matches!(
        err,
        StorageError::InvalidRow {
            column: "due_date",
            ..
        }
    ));
    assert!(TaskStore::open_with_clock(storage, clock()).is_empty());
}

#[test]
fn schema_upgrade_is_idempotent() {
    let mut conn = connect(DbLocation::Memory).unwrap();
    assert_eq!(stored_version(&conn).unwrap(), target_version());

    assert_eq!(upgrade(&mut conn).unwrap(), target_version());
    assert_eq!(stored_version(&conn).unwrap(), target_version());
}

#[test]
fn newer_schema_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("future.sqlite3");
    {
        let conn = rusqlite::Connection::open(&path).unwrap();
        conn.execute_batch(&format!("PRAGMA user_version = {};", target_version() + 1))
            .unwrap();
    }

    let err = connect(DbLocation::File(&path)).unwrap_err();
    assert!(matches!(err, DbError::SchemaTooNew { found, supported }
        if found == supported + 1));
    assert!(SqliteTaskStorage::open(&path, DEFAULT_LIST).is_err());
}

#[test]
fn open_store_uses_configured_backend() {
    let dir = tempfile::tempdir().unwrap();

    for backend in [StorageBackend::Json, StorageBackend::Sqlite] {
        let config = CoreConfig::new(dir.path().join(backend.to_string())).with_backend(backend);
        {
            let mut store = open_store(&config).unwrap();
            store.create(TaskForm::new("persist me")).unwrap();
        }

        assert!(config.storage_path().exists());
        let store = open_store(&config).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].title, "persist me");
    }
}

#[test]
fn memory_storage_exposes_written_document() {
    let mut storage = MemoryStorage::new();
    assert_eq!(storage.document(), None);
    storage.save(&[]).unwrap();
    assert_eq!(storage.document(), Some("[]"));
}
