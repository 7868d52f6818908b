use crate::error::StoreError;
use crate::storage::{KeyValueStore, StoreKey};
use std::cell::{Cell, RefCell};

/// How a flush's payload for one key was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteStatus {
    /// This call wrote the payload of flush `seq` (possibly newer than its own).
    Written { seq: u64 },
    /// A write was already in flight; it will pick up this payload, or a newer one.
    Queued,
}

struct Pending {
    seq: u64,
    payload: Result<String, StoreError>,
}

/// Serializes store writes for a single key.
///
/// At most one `set` is outstanding. Payloads that arrive meanwhile wait in a
/// single slot where newer sequence numbers replace older ones, so the store
/// only ever sees payloads in increasing `seq` order.
pub(crate) struct WriteLane {
    key: StoreKey,
    pending: RefCell<Option<Pending>>,
    busy: Cell<bool>,
    held: Cell<bool>,
    committed: Cell<u64>,
}

struct BusyGuard<'a>(&'a Cell<bool>);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl WriteLane {
    pub(crate) fn new(key: StoreKey) -> Self {
        Self {
            key,
            pending: RefCell::new(None),
            busy: Cell::new(false),
            held: Cell::new(false),
            committed: Cell::new(0),
        }
    }

    pub(crate) fn key(&self) -> StoreKey {
        self.key
    }

    /// Refuse writes until [`WriteLane::release`]. Queued payloads stay queued.
    pub(crate) fn hold(&self) {
        if !self.held.replace(true) {
            tracing::warn!(key = %self.key, "holding writes until stored files load");
        }
    }

    pub(crate) fn release(&self) {
        if self.held.replace(false) {
            tracing::info!(key = %self.key, "writes resumed");
        }
    }

    pub(crate) fn is_held(&self) -> bool {
        self.held.get()
    }

    fn held_error(&self) -> StoreError {
        StoreError::Held {
            key: self.key.to_string(),
        }
    }

    /// Sequence number of the newest payload the store accepted.
    pub(crate) fn committed(&self) -> u64 {
        self.committed.get()
    }

    pub(crate) fn enqueue(&self, seq: u64, payload: Result<String, StoreError>) {
        let mut pending = self.pending.borrow_mut();
        if pending.as_ref().map_or(true, |p| p.seq < seq) {
            *pending = Some(Pending { seq, payload });
        }
    }

    /// Write queued payloads until the slot is empty.
    ///
    /// Returns the outcome of the last write performed by this call.
    pub(crate) async fn drain<S: KeyValueStore>(
        &self,
        store: &S,
    ) -> Result<WriteStatus, StoreError> {
        if self.held.get() {
            return Err(self.held_error());
        }
        if self.busy.get() {
            return Ok(WriteStatus::Queued);
        }
        self.busy.set(true);
        let _guard = BusyGuard(&self.busy);

        let mut last = Ok(WriteStatus::Queued);
        loop {
            if self.held.get() {
                last = Err(self.held_error());
                break;
            }
            let next = self.pending.borrow_mut().take();
            let Some(Pending { seq, payload }) = next else {
                break;
            };

            let written = match payload {
                Ok(json) => store.set(self.key.as_ref(), &json).await,
                Err(e) => Err(e),
            };

            last = match written {
                Ok(()) => {
                    if seq > self.committed.get() {
                        self.committed.set(seq);
                    }
                    tracing::debug!(key = %self.key, seq, "stored");
                    Ok(WriteStatus::Written { seq })
                }
                Err(e) => {
                    tracing::warn!(key = %self.key, seq, error = %e, "store write failed");
                    Err(e)
                }
            };
        }

        last
    }
}
