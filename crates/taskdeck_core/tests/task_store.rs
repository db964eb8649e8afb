use chrono::{Duration, Local, NaiveDate, TimeZone};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use taskdeck_core::{
    FilterOption, ManualClock, MemoryStorage, Priority, StorageError, StorageResult, StoreError,
    Task, TaskForm, TaskPatch, TaskStorage, TaskStore, TaskValidationError, ViewOptions,
};
use uuid::Uuid;

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Local.with_ymd_and_hms(2026, 3, 10, 12, 0, 0).unwrap(),
    ))
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 10).unwrap()
}

fn new_store() -> (TaskStore<MemoryStorage>, Arc<ManualClock>) {
    let clock = clock();
    let store = TaskStore::open_with_clock(MemoryStorage::new(), clock.clone());
    (store, clock)
}

/// Storage whose writes fail while `healthy` is false.
#[derive(Default)]
struct FlakyStorage {
    healthy: Arc<AtomicBool>,
    saved: Option<Vec<Task>>,
}

impl TaskStorage for FlakyStorage {
    fn backend(&self) -> &'static str {
        "flaky"
    }

    fn read_tasks(&self) -> StorageResult<Vec<Task>> {
        Ok(self.saved.clone().unwrap_or_default())
    }

    fn write_tasks(&mut self, tasks: &[Task]) -> StorageResult<()> {
        if !self.healthy.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.saved = Some(tasks.to_vec());
        Ok(())
    }
}

#[test]
fn create_assigns_identity_and_keeps_input_fields() {
    let (mut store, _clock) = new_store();
    let form = TaskForm::new("Write report")
        .description("quarterly numbers")
        .due(today() + Duration::days(2))
        .at(chrono::NaiveTime::from_hms_opt(17, 30, 0).unwrap())
        .priority(Priority::High)
        .tag("work")
        .tag("q1");

    let task = store.create(form.clone()).unwrap();

    assert!(!task.id.is_nil());
    assert!(!task.completed);
    assert_eq!(
        task.created_at,
        Local
            .with_ymd_and_hms(2026, 3, 10, 12, 0, 0)
            .unwrap()
            .with_timezone(&chrono::Utc)
    );
    assert_eq!(task.updated_at, None);
    assert_eq!(task.title, form.title);
    assert_eq!(task.description, form.description);
    assert_eq!(task.due_date, form.due_date);
    assert_eq!(task.time, form.time);
    assert_eq!(task.priority, Some(Priority::High));
    assert_eq!(task.tags.as_slice(), form.tags.as_slice());
    assert_eq!(store.list(), [task]);
}

#[test]
fn created_ids_are_unique() {
    let (mut store, _clock) = new_store();
    let ids: HashSet<_> = (0..50)
        .map(|i| store.create(TaskForm::new(format!("task {i}"))).unwrap().id)
        .collect();
    assert_eq!(ids.len(), 50);
}

#[test]
fn create_rejects_blank_title_without_touching_collection() {
    let (mut store, _clock) = new_store();
    store.create(TaskForm::new("keep me")).unwrap();

    for title in ["", "   ", "\t\n"] {
        let err = store.create(TaskForm::new(title)).unwrap_err();
        assert!(matches!(
            err,
            StoreError::Validation(TaskValidationError::EmptyTitle)
        ));
    }
    assert_eq!(store.len(), 1);
}

#[test]
fn create_rejects_oversized_fields_and_past_due_dates() {
    let (mut store, _clock) = new_store();

    let err = store
        .create(TaskForm::new("x".repeat(101)))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(TaskValidationError::TitleTooLong { len: 101, max: 100 })
    ));

    let err = store
        .create(TaskForm::new("ok").description("d".repeat(501)))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(TaskValidationError::DescriptionTooLong { .. })
    ));

    let err = store
        .create(TaskForm::new("ok").due(today() - Duration::days(1)))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(TaskValidationError::DueDateInPast { .. })
    ));

    assert!(store.is_empty());
    assert_eq!(store.storage().document(), None);
}

#[test]
fn toggle_twice_restores_completed_flag() {
    let (mut store, clock) = new_store();
    let task = store
        .create(TaskForm::new("flip").due(today()).priority(Priority::Low).tag("x"))
        .unwrap();

    clock.advance(Duration::hours(1));
    let once = store.toggle_complete(task.id).unwrap();
    let mut expected = task.clone();
    expected.completed = true;
    assert_eq!(once, expected);
    assert_eq!(once.updated_at, None);

    let twice = store.toggle_complete(task.id).unwrap();
    assert_eq!(twice, task);
    assert_eq!(store.list(), [task]);
}

#[test]
fn toggle_keeps_updated_at_from_last_edit() {
    let (mut store, clock) = new_store();
    let task = store.create(TaskForm::new("edit then flip")).unwrap();

    clock.advance(Duration::hours(1));
    let edited = store
        .update(task.id, TaskPatch::default().description("more"))
        .unwrap();
    clock.advance(Duration::hours(1));
    let toggled = store.toggle_complete(task.id).unwrap();

    assert!(toggled.completed);
    assert_eq!(toggled.updated_at, edited.updated_at);
}

#[test]
fn delete_is_idempotent() {
    let (mut store, _clock) = new_store();
    let keep = store.create(TaskForm::new("keep")).unwrap();
    let gone = store.create(TaskForm::new("gone")).unwrap();

    store.delete(gone.id).unwrap();
    store.delete(gone.id).unwrap();

    assert_eq!(store.len(), 1);
    assert_eq!(store.list()[0].id, keep.id);
    assert!(store.get(gone.id).is_none());
}

#[test]
fn update_missing_task_is_not_found() {
    let (mut store, _clock) = new_store();
    let missing = Uuid::new_v4();
    let err = store
        .update(missing, TaskPatch::default().title("x"))
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(id) if id == missing));
}

#[test]
fn update_stamps_updated_at_and_can_complete() {
    let (mut store, clock) = new_store();
    let task = store.create(TaskForm::new("draft")).unwrap();

    clock.advance(Duration::hours(3));
    let updated = store
        .update(
            task.id,
            TaskPatch::default()
                .description("now with details")
                .completed(true),
        )
        .unwrap();

    assert_eq!(updated.created_at, task.created_at);
    assert_eq!(
        updated.updated_at,
        Some(task.created_at + Duration::hours(3))
    );
    assert!(updated.completed);
    assert_eq!(store.get(task.id), Some(&updated));
}

#[test]
fn round_trip_through_storage_preserves_every_field() {
    let (mut store, _clock) = new_store();
    store
        .create(
            TaskForm::new("with everything")
                .description("desc")
                .due(today())
                .at(chrono::NaiveTime::from_hms_opt(8, 15, 0).unwrap())
                .priority(Priority::Low)
                .tag("a")
                .tag("b"),
        )
        .unwrap();
    let plain = store.create(TaskForm::new("plain")).unwrap();
    store.toggle_complete(plain.id).unwrap();

    let mut storage = MemoryStorage::new();
    storage.save(store.list()).unwrap();
    let loaded = storage.load();

    assert_eq!(loaded, store.list());
}

#[test]
fn reopening_store_hydrates_saved_collection() {
    let (mut store, clock) = new_store();
    store.create(TaskForm::new("first")).unwrap();
    store.create(TaskForm::new("second")).unwrap();

    let storage = store.storage().clone();
    let reopened = TaskStore::open_with_clock(storage, clock);

    assert_eq!(reopened.list(), store.list());
    assert_eq!(reopened.revision(), 0);
}

#[test]
fn failed_save_keeps_memory_and_flush_reconciles() {
    let healthy = Arc::new(AtomicBool::new(false));
    let storage = FlakyStorage {
        healthy: healthy.clone(),
        saved: None,
    };
    let mut store = TaskStore::open_with_clock(storage, clock());

    let err = store.create(TaskForm::new("unsaved")).unwrap_err();
    assert!(matches!(err, StoreError::Storage(_)));
    assert_eq!(store.len(), 1);
    assert!(store.is_dirty());
    assert_eq!(store.storage().saved, None);
    assert!(store.flush().is_err());

    healthy.store(true, Ordering::SeqCst);
    store.flush().unwrap();
    assert!(!store.is_dirty());
    let saved = store.storage().saved.clone().unwrap();
    assert_eq!(saved, store.list());
    assert_eq!(saved[0].title, "unsaved");
}

#[test]
fn next_mutation_after_failed_save_writes_everything() {
    let healthy = Arc::new(AtomicBool::new(false));
    let storage = FlakyStorage {
        healthy: healthy.clone(),
        saved: None,
    };
    let mut store = TaskStore::open_with_clock(storage, clock());
    let _ = store.create(TaskForm::new("first"));

    healthy.store(true, Ordering::SeqCst);
    store.create(TaskForm::new("second")).unwrap();

    assert!(!store.is_dirty());
    let reloaded = store.storage().load();
    assert_eq!(reloaded, store.list());
}

#[test]
fn overdue_task_leaves_filter_once_completed() {
    let (mut store, clock) = new_store();
    let milk = store
        .create(TaskForm::new("Buy milk").due(today()))
        .unwrap();

    // The due date is now yesterday's date.
    clock.advance(Duration::days(1));
    let overdue = ViewOptions {
        filter: FilterOption::Overdue,
        ..ViewOptions::default()
    };
    let ids: Vec<_> = store.view(&overdue).tasks().map(|task| task.id).collect();
    assert_eq!(ids, vec![milk.id]);

    store.toggle_complete(milk.id).unwrap();
    assert!(store.view(&overdue).is_empty());
}

#[test]
fn failed_empty_title_update_keeps_original_title() {
    let (mut store, _clock) = new_store();
    let task = store.create(TaskForm::new("Original")).unwrap();

    let err = store
        .update(task.id, TaskPatch::default().title(""))
        .unwrap_err();

    assert!(matches!(
        err,
        StoreError::Validation(TaskValidationError::EmptyTitle)
    ));
    assert_eq!(store.list()[0].title, "Original");
    assert_eq!(store.list()[0].updated_at, None);
}

#[test]
fn empty_or_corrupted_storage_opens_empty() {
    for storage in [
        MemoryStorage::new(),
        MemoryStorage::with_document(""),
        MemoryStorage::with_document("{not json"),
        MemoryStorage::with_document(r#"[{"id": 7}]"#),
    ] {
        assert!(storage.load().is_empty());
        let store = TaskStore::open_with_clock(storage, clock());
        assert!(store.is_empty());
    }
}
