use crate::error::{EditorError, EditorResult};
use crate::models::{normalize_name, FileExport, FileRecord, RepositorySnapshot};
use crate::util::{new_file_id, now_ms};
use serde::Serialize;
use std::collections::HashSet;
use std::rc::Rc;

/// Source of `lastSave` timestamps (milliseconds).
pub type Clock = Rc<dyn Fn() -> i64>;

/// In-memory owner of every file in the session.
///
/// Each file lives in exactly one of `active` / `deleted`. Deleting is a soft
/// move into `deleted`; nothing is ever purged. At most one active file is open.
pub struct FileRepository {
    active: Vec<FileRecord>,
    deleted: Vec<FileRecord>,
    open_id: Option<String>,
    clock: Clock,
}

#[derive(Serialize)]
struct RepositoryDump<'a> {
    #[serde(rename = "openId")]
    open_id: Option<&'a str>,
    active: &'a [FileRecord],
    deleted: &'a [FileRecord],
}

/// Record with the highest `lastSave`; on exact ties the earlier one wins.
pub fn most_recently_edited(records: &[FileRecord]) -> Option<&FileRecord> {
    records.iter().fold(None, |best, r| match best {
        Some(b) if b.last_save >= r.last_save => Some(b),
        _ => Some(r),
    })
}

fn sorted_by_last_save(records: &[FileRecord]) -> Vec<FileRecord> {
    let mut out = records.to_vec();
    // Stable: ties keep insertion order.
    out.sort_by(|a, b| b.last_save.cmp(&a.last_save));
    out
}

impl FileRepository {
    pub fn new() -> Self {
        Self::with_clock(Rc::new(now_ms))
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            active: Vec::new(),
            deleted: Vec::new(),
            open_id: None,
            clock,
        }
    }

    /// Replace all state with a persisted snapshot and open the most recently
    /// edited active file.
    ///
    /// Duplicate ids are dropped (first occurrence wins, active before deleted)
    /// so a damaged blob cannot break the disjointness invariant.
    pub fn hydrate(&mut self, snapshot: RepositorySnapshot) {
        let mut seen = HashSet::new();
        let before = snapshot.active.len() + snapshot.deleted.len();

        self.active = snapshot
            .active
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();
        self.deleted = snapshot
            .deleted
            .into_iter()
            .filter(|r| seen.insert(r.id.clone()))
            .collect();

        let dropped = before - self.active.len() - self.deleted.len();
        if dropped > 0 {
            tracing::warn!(dropped, "ignored duplicate file ids in stored data");
        }

        self.open_id = most_recently_edited(&self.active).map(|r| r.id.clone());
    }

    /// Add stored records that arrived after the session started.
    ///
    /// Records whose id is already known keep their in-memory version. Opens
    /// the most recently edited file when nothing is open. Returns how many
    /// records were added.
    pub fn merge(&mut self, snapshot: RepositorySnapshot) -> usize {
        let mut seen: HashSet<String> = self
            .active
            .iter()
            .chain(&self.deleted)
            .map(|r| r.id.clone())
            .collect();
        let before = self.active.len() + self.deleted.len();

        self.active.extend(
            snapshot
                .active
                .into_iter()
                .filter(|r| seen.insert(r.id.clone())),
        );
        self.deleted.extend(
            snapshot
                .deleted
                .into_iter()
                .filter(|r| seen.insert(r.id.clone())),
        );

        if self.open_id.is_none() {
            self.open_id = most_recently_edited(&self.active).map(|r| r.id.clone());
        }
        self.active.len() + self.deleted.len() - before
    }

    pub fn snapshot(&self) -> RepositorySnapshot {
        RepositorySnapshot {
            active: self.active.clone(),
            deleted: self.deleted.clone(),
        }
    }

    pub fn open_id(&self) -> Option<&str> {
        self.open_id.as_deref()
    }

    pub fn open_file(&self) -> Option<&FileRecord> {
        let id = self.open_id.as_deref()?;
        self.active.iter().find(|r| r.id == id)
    }

    fn open_file_mut(&mut self) -> Option<&mut FileRecord> {
        let id = self.open_id.as_deref()?;
        self.active.iter_mut().find(|r| r.id == id)
    }

    pub fn create_file(&mut self, name: Option<&str>, content: &str) -> FileRecord {
        let record = FileRecord {
            id: new_file_id(),
            name: normalize_name(name.unwrap_or_default()),
            content: content.to_string(),
            last_save: (self.clock)(),
        };

        self.open_id = Some(record.id.clone());
        self.active.push(record.clone());
        record
    }

    pub fn import_file(&mut self, name: &str, content: &str) -> FileRecord {
        self.create_file(Some(name), content)
    }

    /// Write the editor's name and content into the open file.
    ///
    /// Returns `false` without touching `lastSave` when nothing differs or no
    /// file is open.
    pub fn update_open_file(&mut self, name: &str, content: &str) -> bool {
        let now = (self.clock)();
        let Some(open) = self.open_file_mut() else {
            return false;
        };

        if open.name == name && open.content == content {
            return false;
        }

        open.name = name.to_string();
        open.content = content.to_string();
        open.last_save = now;
        true
    }

    /// Commit a new name for the open file; blank names become "Untitled".
    pub fn rename_open_file(&mut self, name: &str) -> bool {
        let Some(content) = self.open_file().map(|r| r.content.clone()) else {
            return false;
        };
        self.update_open_file(&normalize_name(name), &content)
    }

    pub fn select_file(&mut self, id: &str) -> EditorResult<FileRecord> {
        let record = self
            .active
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or_else(|| EditorError::not_found(id))?;

        self.open_id = Some(record.id.clone());
        Ok(record)
    }

    /// Soft-delete an active file. Returns the open file after the move.
    pub fn delete_file(&mut self, id: &str) -> EditorResult<Option<FileRecord>> {
        let idx = self
            .active
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| EditorError::not_found(id))?;

        let record = self.active.remove(idx);
        self.deleted.push(record);

        if self.open_id.as_deref() == Some(id) {
            self.open_id = most_recently_edited(&self.active).map(|r| r.id.clone());
        }

        Ok(self.open_file().cloned())
    }

    pub fn restore_file(&mut self, id: &str) -> EditorResult<FileRecord> {
        let idx = self
            .deleted
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| EditorError::not_found(id))?;

        let record = self.deleted.remove(idx);
        self.open_id = Some(record.id.clone());
        self.active.push(record.clone());
        Ok(record)
    }

    pub fn list_active(&self) -> Vec<FileRecord> {
        sorted_by_last_save(&self.active)
    }

    pub fn list_deleted(&self) -> Vec<FileRecord> {
        sorted_by_last_save(&self.deleted)
    }

    /// Name and content for a download. Deleted files can be exported too.
    pub fn export_file(&self, id: &str) -> EditorResult<FileExport> {
        self.active
            .iter()
            .chain(self.deleted.iter())
            .find(|r| r.id == id)
            .map(|r| FileExport {
                name: r.name.clone(),
                content: r.content.clone(),
            })
            .ok_or_else(|| EditorError::not_found(id))
    }

    // Debug harness.

    pub fn reset(&mut self) {
        self.active.clear();
        self.deleted.clear();
        self.open_id = None;
    }

    pub fn dump(&self) -> String {
        let dump = RepositoryDump {
            open_id: self.open_id.as_deref(),
            active: &self.active,
            deleted: &self.deleted,
        };
        serde_json::to_string_pretty(&dump).unwrap_or_default()
    }
}

impl Default for FileRepository {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(all(test, not(target_arch = "wasm32")))]
mod proptests {
    use super::tests::step_clock;
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Create,
        Delete(usize),
        Restore(usize),
        Select(usize),
        Edit(String),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Create),
            any::<usize>().prop_map(Op::Delete),
            any::<usize>().prop_map(Op::Restore),
            any::<usize>().prop_map(Op::Select),
            "[a-z]{0,4}".prop_map(Op::Edit),
        ]
    }

    fn pick(records: &[FileRecord], n: usize) -> Option<String> {
        if records.is_empty() {
            None
        } else {
            Some(records[n % records.len()].id.clone())
        }
    }

    proptest! {
        /// Collections stay disjoint, ids stay unique, and the open file is
        /// always an active one.
        #[test]
        fn prop_sets_stay_disjoint(ops in prop::collection::vec(op_strategy(), 0..60)) {
            let mut repo = FileRepository::with_clock(step_clock());

            for op in ops {
                match op {
                    Op::Create => {
                        repo.create_file(None, "");
                    }
                    Op::Delete(n) => {
                        if let Some(id) = pick(&repo.list_active(), n) {
                            prop_assert!(repo.delete_file(&id).is_ok());
                        }
                    }
                    Op::Restore(n) => {
                        if let Some(id) = pick(&repo.list_deleted(), n) {
                            let restored = repo.restore_file(&id);
                            prop_assert!(restored.is_ok());
                            prop_assert_eq!(repo.open_id(), Some(id.as_str()));
                        }
                    }
                    Op::Select(n) => {
                        if let Some(id) = pick(&repo.list_active(), n) {
                            prop_assert!(repo.select_file(&id).is_ok());
                        }
                    }
                    Op::Edit(text) => {
                        repo.update_open_file("Untitled", &text);
                    }
                }

                let snap = repo.snapshot();
                let mut ids = HashSet::new();
                for r in snap.active.iter().chain(snap.deleted.iter()) {
                    prop_assert!(ids.insert(r.id.clone()), "duplicate id {}", r.id);
                }

                match repo.open_id() {
                    Some(id) => prop_assert!(snap.active.iter().any(|r| r.id == id)),
                    None => prop_assert!(snap.active.is_empty()),
                }
            }
        }
    }
}
