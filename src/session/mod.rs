use crate::autosave::{AutosaveScheduler, Timer};
use crate::error::{EditorResult, StoreError};
use crate::models::{FileExport, FileRecord, RepositorySnapshot};
use crate::repository::FileRepository;
use crate::storage::KeyValueStore;
use crate::sync::{FileStore, FlushReport, LoadReport};
use futures::future::LocalBoxFuture;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

/// Runs a future on the UI thread (`spawn_local` in the browser).
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SaveEvent {
    Saved { seq: u64 },
    Failed { seq: u64, error: StoreError },
    /// Stored files that could not be read at startup were loaded later.
    Recovered { restored: usize },
}

pub type SaveListener = Rc<dyn Fn(&SaveEvent)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionTiming {
    pub autosave_ms: u32,
    pub retry_ms: u32,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            autosave_ms: 1000,
            retry_ms: 5000,
        }
    }
}

struct SessionInner<S, T: Timer> {
    repo: RefCell<FileRepository>,
    store: FileStore<S>,
    scheduler: AutosaveScheduler<T>,
    spawner: Spawner,
    retry_ms: u32,
    listener: RefCell<Option<SaveListener>>,
}

impl<S: KeyValueStore + 'static, T: Timer + 'static> SessionInner<S, T> {
    /// Snapshot now, write in the background. Blobs that failed to load are
    /// read again first, so their files are merged before anything is written.
    fn flush(self: &Rc<Self>) {
        if !self.store.is_held() {
            self.write();
            return;
        }

        let recover = self.store.recover();
        let weak = Rc::downgrade(self);
        (self.spawner)(Box::pin(async move {
            let report = recover.await;
            if let Some(inner) = weak.upgrade() {
                inner.absorb(report);
                inner.write();
            }
        }));
    }

    fn write(self: &Rc<Self>) {
        let snapshot = self.repo.borrow().snapshot();
        let write = self.store.flush(&snapshot);
        let weak = Rc::downgrade(self);

        (self.spawner)(Box::pin(async move {
            let report = write.await;
            if let Some(inner) = weak.upgrade() {
                inner.finish_flush(report);
            }
        }));
    }

    fn absorb(&self, report: LoadReport) {
        for e in &report.errors {
            tracing::warn!(error = %e, "stored files still unavailable");
        }
        let restored = self.repo.borrow_mut().merge(report.snapshot);
        if restored > 0 {
            tracing::info!(restored, "recovered stored files");
            self.emit(&SaveEvent::Recovered { restored });
        }
    }

    fn finish_flush(&self, report: FlushReport) {
        let event = if let Some(error) = report.errors().next().cloned() {
            tracing::error!(seq = report.seq, error = %error, "save failed; will retry");
            self.scheduler.retry_after(self.retry_ms);
            SaveEvent::Failed {
                seq: report.seq,
                error,
            }
        } else if let Some(seq) = report.written_seq() {
            SaveEvent::Saved { seq }
        } else {
            // Payloads were handed to a write already in flight; that flush reports.
            return;
        };
        self.emit(&event);
    }

    fn emit(&self, event: &SaveEvent) {
        let listener = self.listener.borrow().clone();
        if let Some(listener) = listener {
            listener(event);
        }
    }
}

/// The editor's core: repository, persistence and autosave behind named intents.
///
/// Edits are debounced; create, import, rename, delete, restore and reset
/// are saved immediately. Every method updates memory synchronously, so the
/// session keeps working when storage does not.
pub struct EditorSession<S: KeyValueStore + 'static, T: Timer + 'static> {
    inner: Rc<SessionInner<S, T>>,
}

impl<S: KeyValueStore + 'static, T: Timer + 'static> Clone for EditorSession<S, T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<S: KeyValueStore + 'static, T: Timer + 'static> EditorSession<S, T> {
    pub fn new(
        repo: FileRepository,
        store: S,
        timer: T,
        spawner: Spawner,
        timing: SessionTiming,
    ) -> Self {
        let inner = Rc::new_cyclic(|weak: &Weak<SessionInner<S, T>>| {
            let weak = weak.clone();
            let flush: Rc<dyn Fn()> = Rc::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.flush();
                }
            });

            SessionInner {
                repo: RefCell::new(repo),
                store: FileStore::new(store),
                scheduler: AutosaveScheduler::new(timer, timing.autosave_ms, flush),
                spawner,
                retry_ms: timing.retry_ms,
                listener: RefCell::new(None),
            }
        });

        Self { inner }
    }

    pub fn set_save_listener(&self, listener: SaveListener) {
        *self.inner.listener.borrow_mut() = Some(listener);
    }

    /// Load both blobs and open the most recently edited file.
    ///
    /// Whatever decoded is hydrated even when the other blob failed; the
    /// first failure is returned. A blob that could not be read is never
    /// overwritten: each flush reads it again and merges its files first.
    /// An empty store yields an empty session.
    pub async fn init(&self) -> Result<Option<FileRecord>, StoreError> {
        let report = self.inner.store.load().await;

        let mut repo = self.inner.repo.borrow_mut();
        repo.hydrate(report.snapshot);
        let open = repo.open_file().cloned();
        drop(repo);

        for e in &report.errors {
            tracing::error!(error = %e, "could not load stored files");
        }
        match report.errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(open),
        }
    }

    pub fn create_file(&self, name: Option<&str>) -> FileRecord {
        let record = self.inner.repo.borrow_mut().create_file(name, "");
        tracing::debug!(id = %record.id, "created file");
        self.flush_now();
        record
    }

    pub fn import_file(&self, name: &str, content: &str) -> FileRecord {
        let record = self.inner.repo.borrow_mut().import_file(name, content);
        tracing::debug!(id = %record.id, bytes = content.len(), "imported file");
        self.flush_now();
        record
    }

    /// Feed the editor's current text. Only real changes arm the autosave.
    pub fn update_open_file(&self, name: &str, content: &str) -> bool {
        let changed = self.inner.repo.borrow_mut().update_open_file(name, content);
        if changed {
            self.inner.scheduler.notify_changed();
        }
        changed
    }

    pub fn rename_open_file(&self, name: &str) -> bool {
        let changed = self.inner.repo.borrow_mut().rename_open_file(name);
        if changed {
            self.flush_now();
        }
        changed
    }

    pub fn select_file(&self, id: &str) -> EditorResult<FileRecord> {
        self.inner.repo.borrow_mut().select_file(id)
    }

    pub fn delete_file(&self, id: &str) -> EditorResult<Option<FileRecord>> {
        let open = self.inner.repo.borrow_mut().delete_file(id)?;
        tracing::debug!(id, "moved file to trash");
        self.flush_now();
        Ok(open)
    }

    pub fn restore_file(&self, id: &str) -> EditorResult<FileRecord> {
        let record = self.inner.repo.borrow_mut().restore_file(id)?;
        tracing::debug!(id, "restored file");
        self.flush_now();
        Ok(record)
    }

    pub fn export_file(&self, id: &str) -> EditorResult<FileExport> {
        self.inner.repo.borrow().export_file(id)
    }

    pub fn open_file(&self) -> Option<FileRecord> {
        self.inner.repo.borrow().open_file().cloned()
    }

    pub fn list_active(&self) -> Vec<FileRecord> {
        self.inner.repo.borrow().list_active()
    }

    pub fn list_deleted(&self) -> Vec<FileRecord> {
        self.inner.repo.borrow().list_deleted()
    }

    pub fn snapshot(&self) -> RepositorySnapshot {
        self.inner.repo.borrow().snapshot()
    }

    /// Save immediately, cancelling any pending autosave.
    pub fn flush_now(&self) {
        self.inner.scheduler.force_flush();
    }

    pub fn has_pending_save(&self) -> bool {
        self.inner.scheduler.is_pending()
    }

    /// Debug: forget every file and persist the empty state.
    pub fn reset(&self) {
        self.inner.repo.borrow_mut().reset();
        tracing::warn!("repository reset");
        self.flush_now();
    }

    /// Debug: pretty JSON of the whole repository.
    pub fn dump(&self) -> String {
        self.inner.repo.borrow().dump()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::autosave::ManualTimer;
    use crate::error::EditorError;
    use crate::repository::tests::step_clock;
    use crate::storage::MemoryStore;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;

    struct Harness {
        session: EditorSession<MemoryStore, ManualTimer>,
        store: MemoryStore,
        timer: ManualTimer,
        pool: LocalPool,
        events: Rc<RefCell<Vec<SaveEvent>>>,
    }

    impl Harness {
        fn new(store: MemoryStore) -> Self {
            let pool = LocalPool::new();
            let spawner = pool.spawner();
            let timer = ManualTimer::new();
            let session = EditorSession::new(
                FileRepository::with_clock(step_clock()),
                store.clone(),
                timer.clone(),
                Rc::new(move |fut: LocalBoxFuture<'static, ()>| {
                    spawner.spawn_local(fut).expect("spawn")
                }),
                SessionTiming::default(),
            );

            let events = Rc::new(RefCell::new(Vec::new()));
            let sink = events.clone();
            session.set_save_listener(Rc::new(move |e: &SaveEvent| sink.borrow_mut().push(e.clone())));

            Self {
                session,
                store,
                timer,
                pool,
                events,
            }
        }

        /// Advance virtual time and let spawned writes finish.
        fn advance(&mut self, ms: u64) {
            self.timer.advance(ms);
            self.pool.run_until_stalled();
        }

        fn settle(&mut self) {
            self.pool.run_until_stalled();
        }

        fn files_writes(&self) -> usize {
            self.store.write_count("files")
        }

        fn stored_active(&self) -> Vec<FileRecord> {
            let raw = self.store.value("files").unwrap_or_else(|| "[]".to_string());
            serde_json::from_str(&raw).expect("files blob should decode")
        }
    }

    #[test]
    fn test_typing_then_idle_flushes_once() {
        let mut h = Harness::new(MemoryStore::new());
        let a = h.session.create_file(None);
        h.settle();
        assert_eq!(h.files_writes(), 1);

        for text in ["h", "he", "hel", "hell", "hello"] {
            h.advance(200);
            assert!(h.session.update_open_file("Untitled", text));
        }
        assert_eq!(h.files_writes(), 1);

        h.advance(999);
        assert_eq!(h.files_writes(), 1);
        h.advance(1);
        assert_eq!(h.files_writes(), 2);

        let stored = h.stored_active();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, a.id);
        assert_eq!(stored[0].content, "hello");

        h.advance(10_000);
        assert_eq!(h.files_writes(), 2);
    }

    #[test]
    fn test_unchanged_update_never_writes() {
        let mut h = Harness::new(MemoryStore::new());
        let a = h.session.create_file(Some("notes"));
        h.settle();

        assert!(!h.session.update_open_file("notes", ""));
        assert!(!h.session.has_pending_save());
        h.advance(5000);

        assert_eq!(h.files_writes(), 1);
        assert_eq!(h.session.open_file().map(|r| r.last_save), Some(a.last_save));
    }

    #[test]
    fn test_forced_intent_cancels_pending_autosave() {
        let mut h = Harness::new(MemoryStore::new());
        h.session.create_file(Some("a"));
        let b = h.session.create_file(Some("b"));
        h.settle();
        let before = h.files_writes();

        h.session.update_open_file("b", "draft");
        assert!(h.session.has_pending_save());

        h.session.delete_file(&b.id).expect("delete b");
        assert!(!h.session.has_pending_save());
        h.settle();
        assert_eq!(h.files_writes(), before + 1);

        h.advance(2000);
        assert_eq!(h.files_writes(), before + 1);

        let deleted: Vec<FileRecord> =
            serde_json::from_str(&h.store.value("deletedFiles").expect("deleted blob"))
                .expect("decode");
        assert_eq!(deleted[0].content, "draft");
    }

    #[test]
    fn test_create_delete_restore_scenario() {
        let mut h = Harness::new(MemoryStore::new());
        let a = h.session.create_file(None);
        let b = h.session.create_file(None);
        assert_eq!(h.session.open_file().map(|r| r.id), Some(b.id.clone()));

        let open = h.session.delete_file(&b.id).expect("delete b");
        assert_eq!(open.map(|r| r.id), Some(a.id.clone()));

        let open = h.session.delete_file(&a.id).expect("delete a");
        assert!(open.is_none());
        assert!(h.session.list_active().is_empty());

        let restored = h.session.restore_file(&a.id).expect("restore a");
        assert_eq!(restored.id, a.id);
        assert_eq!(h.session.open_file().map(|r| r.id), Some(a.id.clone()));
        assert_eq!(h.session.list_deleted().len(), 1);
        h.settle();

        assert_eq!(
            h.events.borrow().last(),
            Some(&SaveEvent::Saved { seq: 5 })
        );
    }

    #[test]
    fn test_not_found_changes_nothing_and_does_not_save() {
        let mut h = Harness::new(MemoryStore::new());
        h.session.create_file(None);
        h.settle();
        let before = h.session.snapshot();

        assert!(matches!(
            h.session.restore_file("ghost"),
            Err(EditorError::NotFound { .. })
        ));
        assert!(h.session.delete_file("ghost").is_err());
        assert!(h.session.select_file("ghost").is_err());
        h.settle();

        assert_eq!(h.session.snapshot(), before);
        assert_eq!(h.files_writes(), 1);
    }

    #[test]
    fn test_reload_round_trip() {
        let store = MemoryStore::new();
        let mut h = Harness::new(store.clone());
        let a = h.session.create_file(Some("a"));
        h.session.update_open_file("a", "alpha");
        let b = h.session.import_file("notes.txt", "abc");
        h.session.create_file(Some("c"));
        h.session.delete_file(&b.id).expect("delete b");
        h.session.select_file(&a.id).expect("select a");
        h.session.update_open_file("a", "alpha beta");
        h.advance(1000);

        let before = h.session.snapshot();

        let reloaded = Harness::new(store);
        let open = block_on(reloaded.session.init()).expect("init");
        assert_eq!(reloaded.session.snapshot(), before);
        assert_eq!(open.map(|r| r.id), Some(a.id));
    }

    #[test]
    fn test_init_empty_store_creates_nothing() {
        let h = Harness::new(MemoryStore::new());
        let open = block_on(h.session.init()).expect("init");
        assert!(open.is_none());
        assert!(h.session.list_active().is_empty());
        assert!(h.store.writes().is_empty());
    }

    #[test]
    fn test_init_reports_read_failure_and_keeps_working() {
        let store = MemoryStore::new();
        store.fail_reads(true);
        let mut h = Harness::new(store);

        assert!(matches!(
            block_on(h.session.init()),
            Err(StoreError::Read { .. })
        ));

        let a = h.session.create_file(None);
        h.settle();
        assert_eq!(h.session.open_file().map(|r| r.id), Some(a.id));
    }

    #[test]
    fn test_unreadable_store_is_not_overwritten() {
        let store = MemoryStore::new();
        store.insert(
            "files",
            r#"[{"id":"keep","name":"journal","content":"years of notes","lastSave":7}]"#,
        );
        store.fail_reads(true);
        let mut h = Harness::new(store);

        assert!(block_on(h.session.init()).is_err());
        let fresh = h.session.create_file(None);
        h.settle();

        assert_eq!(h.files_writes(), 0);
        assert!(h
            .store
            .value("files")
            .is_some_and(|v| v.contains("years of notes")));
        assert!(matches!(
            h.events.borrow().as_slice(),
            [SaveEvent::Failed { error: StoreError::Held { .. }, .. }]
        ));

        // Reads work again: the retry merges the stored file, then writes both.
        h.store.fail_reads(false);
        h.advance(5000);

        let mut ids: Vec<_> = h.stored_active().into_iter().map(|r| r.id).collect();
        ids.sort();
        let mut expected = vec!["keep".to_string(), fresh.id.clone()];
        expected.sort();
        assert_eq!(ids, expected);
        assert_eq!(h.session.open_file().map(|r| r.id), Some(fresh.id));
        assert!(h
            .events
            .borrow()
            .contains(&SaveEvent::Recovered { restored: 1 }));
        assert!(matches!(
            h.events.borrow().last(),
            Some(SaveEvent::Saved { .. })
        ));
    }

    #[test]
    fn test_corrupt_blob_is_kept_aside_before_overwrite() {
        let store = MemoryStore::new();
        store.insert("files", "{not json");
        let mut h = Harness::new(store);

        assert!(matches!(
            block_on(h.session.init()),
            Err(StoreError::Decode { .. })
        ));
        h.session.create_file(None);
        h.settle();

        assert_eq!(h.store.value("files.corrupt").as_deref(), Some("{not json"));
        assert_eq!(h.stored_active().len(), 1);
    }

    #[test]
    fn test_failed_save_is_reported_and_retried() {
        let store = MemoryStore::new();
        store.fail_writes("deletedFiles", true);
        let mut h = Harness::new(store);

        h.session.create_file(None);
        h.settle();

        // Active files were still written.
        assert_eq!(h.files_writes(), 1);
        assert!(matches!(
            h.events.borrow().as_slice(),
            [SaveEvent::Failed { seq: 1, error: StoreError::Write { .. } }]
        ));
        assert!(h.session.has_pending_save());

        h.store.fail_writes("deletedFiles", false);
        h.advance(5000);
        assert_eq!(h.store.write_count("deletedFiles"), 1);
        assert_eq!(h.events.borrow().last(), Some(&SaveEvent::Saved { seq: 2 }));
        assert!(!h.session.has_pending_save());
    }

    #[test]
    fn test_rename_forces_flush_only_when_changed() {
        let mut h = Harness::new(MemoryStore::new());
        h.session.create_file(Some("draft"));
        h.settle();

        assert!(!h.session.rename_open_file("draft"));
        h.settle();
        assert_eq!(h.files_writes(), 1);

        assert!(h.session.rename_open_file("final"));
        h.settle();
        assert_eq!(h.files_writes(), 2);
        assert_eq!(h.stored_active()[0].name, "final");
    }

    #[test]
    fn test_import_and_export() {
        let mut h = Harness::new(MemoryStore::new());
        let existing = h.session.create_file(None);
        let imported = h.session.import_file("notes.txt", "abc");
        h.settle();

        assert_ne!(imported.id, existing.id);
        assert_eq!(h.session.open_file(), Some(imported.clone()));

        let export = h.session.export_file(&imported.id).expect("export");
        assert_eq!(export.name, "notes.txt");
        assert_eq!(export.content, "abc");
    }

    #[test]
    fn test_reset_persists_empty_state() {
        let mut h = Harness::new(MemoryStore::new());
        let a = h.session.create_file(None);
        h.session.delete_file(&a.id).expect("delete");
        h.session.create_file(None);
        h.settle();

        assert!(h.session.dump().contains(&a.id));

        h.session.reset();
        h.settle();
        assert_eq!(h.store.value("files").as_deref(), Some("[]"));
        assert_eq!(h.store.value("deletedFiles").as_deref(), Some("[]"));
        assert!(h.session.open_file().is_none());
    }

    #[test]
    fn test_session_dropped_before_write_completes() {
        let mut h = Harness::new(MemoryStore::new());
        h.session.create_file(None);
        let Harness {
            session,
            store,
            mut pool,
            ..
        } = h;
        drop(session);

        pool.run_until_stalled();
        assert_eq!(store.write_count("files"), 1);
    }
}
