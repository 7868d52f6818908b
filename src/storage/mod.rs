use crate::error::StoreError;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

pub(crate) const DEFAULT_STORE_NAME: &str = "tab_typer";

/// Logical blob names. `localStorage` keys are prefixed with the store name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, strum::Display, strum::AsRefStr)]
pub enum StoreKey {
    #[strum(serialize = "files")]
    Files,
    #[strum(serialize = "deletedFiles")]
    DeletedFiles,
}

/// Asynchronous get/set of named text blobs.
///
/// Implementations own no file state; they only move strings in and out of
/// whatever backs them.
#[allow(async_fn_in_trait)]
pub trait KeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

fn local_storage() -> Result<web_sys::Storage, StoreError> {
    web_sys::window()
        .ok_or_else(|| StoreError::Unavailable("no window".to_string()))?
        .local_storage()
        .map_err(|e| StoreError::Unavailable(format!("{e:?}")))?
        .ok_or_else(|| StoreError::Unavailable("localStorage is disabled".to_string()))
}

/// Browser `localStorage`, keys namespaced as `<store_name>::<key>`.
#[derive(Clone, Debug)]
pub struct LocalStorageStore {
    namespace: String,
}

impl LocalStorageStore {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    /// Fails when the page has no usable `localStorage` (private mode, sandboxed
    /// iframes, non-browser targets).
    pub fn open(namespace: impl Into<String>) -> Result<Self, StoreError> {
        local_storage()?;
        Ok(Self::new(namespace))
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}::{}", self.namespace, key)
    }
}

impl KeyValueStore for LocalStorageStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        local_storage()?
            .get_item(&self.full_key(key))
            .map_err(|e| StoreError::Read {
                key: key.to_string(),
                message: format!("{e:?}"),
            })
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        // Quota errors surface here.
        local_storage()?
            .set_item(&self.full_key(key), value)
            .map_err(|e| StoreError::Write {
                key: key.to_string(),
                message: format!("{e:?}"),
            })
    }
}

#[derive(Default)]
struct MemoryInner {
    values: HashMap<String, String>,
    writes: Vec<(String, String)>,
    failing_writes: HashSet<String>,
    failing_reads: bool,
}

/// Process-local store. Clones share the same contents.
///
/// Used when `localStorage` is unavailable, and by tests, which can inspect
/// the write log and inject failures per key.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Rc<RefCell<MemoryInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, key: &str, value: &str) {
        self.inner
            .borrow_mut()
            .values
            .insert(key.to_string(), value.to_string());
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.inner.borrow().values.get(key).cloned()
    }

    /// Every successful `set`, oldest first.
    pub fn writes(&self) -> Vec<(String, String)> {
        self.inner.borrow().writes.clone()
    }

    pub fn write_count(&self, key: &str) -> usize {
        self.inner
            .borrow()
            .writes
            .iter()
            .filter(|(k, _)| k == key)
            .count()
    }

    pub fn fail_writes(&self, key: &str, fail: bool) {
        let mut inner = self.inner.borrow_mut();
        if fail {
            inner.failing_writes.insert(key.to_string());
        } else {
            inner.failing_writes.remove(key);
        }
    }

    pub fn fail_reads(&self, fail: bool) {
        self.inner.borrow_mut().failing_reads = fail;
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let inner = self.inner.borrow();
        if inner.failing_reads {
            return Err(StoreError::Read {
                key: key.to_string(),
                message: "read rejected".to_string(),
            });
        }
        Ok(inner.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        if inner.failing_writes.contains(key) {
            return Err(StoreError::Write {
                key: key.to_string(),
                message: "write rejected".to_string(),
            });
        }
        inner.values.insert(key.to_string(), value.to_string());
        inner.writes.push((key.to_string(), value.to_string()));
        Ok(())
    }
}

/// Store picked at startup: `localStorage` when the browser allows it,
/// otherwise an in-memory fallback so editing keeps working.
#[derive(Clone)]
pub enum BrowserStore {
    Local(LocalStorageStore),
    Memory(MemoryStore),
}

impl BrowserStore {
    pub fn open(namespace: &str) -> Self {
        match LocalStorageStore::open(namespace) {
            Ok(store) => BrowserStore::Local(store),
            Err(e) => {
                tracing::warn!(error = %e, "falling back to in-memory storage");
                BrowserStore::Memory(MemoryStore::new())
            }
        }
    }

    pub fn is_persistent(&self) -> bool {
        matches!(self, BrowserStore::Local(_))
    }
}

impl KeyValueStore for BrowserStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        match self {
            BrowserStore::Local(s) => s.get(key).await,
            BrowserStore::Memory(s) => s.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        match self {
            BrowserStore::Local(s) => s.set(key, value).await,
            BrowserStore::Memory(s) => s.set(key, value).await,
        }
    }
}
