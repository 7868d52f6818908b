mod lane;

pub use lane::WriteStatus;

use crate::error::StoreError;
use crate::models::{FileRecord, RepositorySnapshot};
use crate::storage::{KeyValueStore, StoreKey};
use futures::future::join;
use lane::WriteLane;
use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

/// Result of one flush: one entry per blob, both always attempted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FlushReport {
    pub seq: u64,
    pub active: Result<WriteStatus, StoreError>,
    pub deleted: Result<WriteStatus, StoreError>,
}

impl FlushReport {
    pub fn errors(&self) -> impl Iterator<Item = &StoreError> {
        [&self.active, &self.deleted]
            .into_iter()
            .filter_map(|r| r.as_ref().err())
    }

    pub fn is_ok(&self) -> bool {
        self.active.is_ok() && self.deleted.is_ok()
    }

    /// Newest flush sequence this call wrote itself. `None` unless both blobs
    /// were written here; a payload handed to a write already in flight is
    /// reported by that write.
    pub fn written_seq(&self) -> Option<u64> {
        match (&self.active, &self.deleted) {
            (Ok(WriteStatus::Written { seq: a }), Ok(WriteStatus::Written { seq: d })) => {
                Some((*a).max(*d))
            }
            _ => None,
        }
    }
}

/// What `load` found. Collections that failed to read or decode come back
/// empty and their errors are listed.
///
/// A blob that could not be read holds its lane, so a flush cannot replace
/// files that were never loaded. A blob that read but did not decode is
/// copied to `<key>.corrupt` first and then may be overwritten.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub snapshot: RepositorySnapshot,
    pub errors: Vec<StoreError>,
}

fn encode(key: StoreKey, records: &[FileRecord]) -> Result<String, StoreError> {
    serde_json::to_string(records).map_err(|e| StoreError::Encode {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn decode(key: StoreKey, raw: Option<&str>) -> Result<Vec<FileRecord>, StoreError> {
    match raw {
        None => Ok(Vec::new()),
        Some(json) if json.trim().is_empty() => Ok(Vec::new()),
        Some(json) => serde_json::from_str(json).map_err(|e| StoreError::Decode {
            key: key.to_string(),
            message: e.to_string(),
        }),
    }
}

pub(crate) fn backup_key(key: StoreKey) -> String {
    format!("{key}.corrupt")
}

/// Read one blob and open or hold its lane accordingly.
async fn read_key<S: KeyValueStore>(
    store: &S,
    lane: &WriteLane,
) -> Result<Vec<FileRecord>, StoreError> {
    let key = lane.key();
    let raw = match store.get(key.as_ref()).await {
        Ok(raw) => raw,
        Err(e) => {
            lane.hold();
            return Err(e);
        }
    };

    match decode(key, raw.as_deref()) {
        Ok(records) => {
            lane.release();
            Ok(records)
        }
        Err(e) => {
            let backup = backup_key(key);
            match store.set(&backup, raw.as_deref().unwrap_or_default()).await {
                Ok(()) => {
                    tracing::warn!(%key, %backup, "kept unreadable blob aside");
                    lane.release();
                }
                Err(backup_err) => {
                    tracing::error!(%key, error = %backup_err, "could not keep unreadable blob aside");
                    lane.hold();
                }
            }
            Err(e)
        }
    }
}

/// Persists repository snapshots as the `files` and `deletedFiles` blobs.
pub struct FileStore<S> {
    store: Rc<S>,
    seq: Cell<u64>,
    active: Rc<WriteLane>,
    deleted: Rc<WriteLane>,
}

impl<S: KeyValueStore + 'static> FileStore<S> {
    pub fn new(store: S) -> Self {
        Self {
            store: Rc::new(store),
            seq: Cell::new(0),
            active: Rc::new(WriteLane::new(StoreKey::Files)),
            deleted: Rc::new(WriteLane::new(StoreKey::DeletedFiles)),
        }
    }

    /// Newest flush sequence number each blob has committed, `(files, deletedFiles)`.
    pub fn committed(&self) -> (u64, u64) {
        (self.active.committed(), self.deleted.committed())
    }

    /// Read both blobs concurrently.
    pub async fn load(&self) -> LoadReport {
        let (active, deleted) = join(
            read_key(&*self.store, &self.active),
            read_key(&*self.store, &self.deleted),
        )
        .await;

        let mut report = LoadReport::default();
        match active {
            Ok(records) => report.snapshot.active = records,
            Err(e) => report.errors.push(e),
        }
        match deleted {
            Ok(records) => report.snapshot.deleted = records,
            Err(e) => report.errors.push(e),
        }

        tracing::info!(
            active = report.snapshot.active.len(),
            deleted = report.snapshot.deleted.len(),
            errors = report.errors.len(),
            "loaded files"
        );
        report
    }

    /// Whether a blob is waiting to be loaded before it may be written.
    pub fn is_held(&self) -> bool {
        self.active.is_held() || self.deleted.is_held()
    }

    /// Retry reading held blobs. Returns what could be read now; lanes whose
    /// blob loaded are released.
    pub fn recover(&self) -> impl Future<Output = LoadReport> {
        let store = self.store.clone();
        let active = self.active.clone();
        let deleted = self.deleted.clone();
        async move {
            let mut report = LoadReport::default();
            for (lane, slot) in [
                (&active, &mut report.snapshot.active),
                (&deleted, &mut report.snapshot.deleted),
            ] {
                if !lane.is_held() {
                    continue;
                }
                match read_key(&*store, lane).await {
                    Ok(records) => *slot = records,
                    Err(e) => report.errors.push(e),
                }
            }
            report
        }
    }

    /// Serialize `snapshot` now and write both blobs.
    ///
    /// Encoding and sequencing happen before this returns, so later edits to
    /// the repository cannot leak into this flush and flushes reach the store
    /// in call order. The returned future performs the writes.
    pub fn flush(&self, snapshot: &RepositorySnapshot) -> impl Future<Output = FlushReport> {
        let seq = self.seq.get() + 1;
        self.seq.set(seq);

        self.active
            .enqueue(seq, encode(StoreKey::Files, &snapshot.active));
        self.deleted
            .enqueue(seq, encode(StoreKey::DeletedFiles, &snapshot.deleted));
        tracing::debug!(
            seq,
            active = snapshot.active.len(),
            deleted = snapshot.deleted.len(),
            "flush queued"
        );

        let store = self.store.clone();
        let active = self.active.clone();
        let deleted = self.deleted.clone();
        async move {
            let (active, deleted) = join(active.drain(&*store), deleted.drain(&*store)).await;
            FlushReport {
                seq,
                active,
                deleted,
            }
        }
    }
}
