//! Watch-key state: pending events, coalescing, directory snapshot.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use log::trace;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use crate::error::{CloudFsError, Result};
use crate::path::CloudPath;
use crate::resource::DirectoryEntry;

use super::event::{EventKind, WatchEvent};

/// Cap on one key's pending event list; reaching it discards all
/// pending events in favor of a single `Overflow`.
pub(crate) const MAX_PENDING_EVENTS: usize = 512;

/// What travels over the service's ready queue.
pub(crate) enum ReadySlot {
    Key(Arc<WatchKey>),
    Closed,
}

pub(crate) type Registry = Mutex<HashMap<String, Arc<WatchKey>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyState {
    Ready,
    Signalled,
}

struct SnapshotEntry {
    modified: i64,
    tick: u64,
}

struct KeyInner {
    kinds: Vec<EventKind>,
    state: KeyState,
    valid: bool,
    pending: Vec<WatchEvent>,
    /// context -> index of its last pending Modify event
    last_modify: HashMap<String, usize>,
    /// entry name -> (last modified time, last seen tick)
    snapshot: HashMap<String, SnapshotEntry>,
    tick: u64,
    task: Option<JoinHandle<()>>,
}

/// One registration of a watched directory.
///
/// A key moves between `READY` and `SIGNALLED`: the first pending event
/// of a period signals the key onto the service's ready queue exactly
/// once; `reset` returns it to `READY` (or re-queues it immediately if
/// events arrived while draining). Cancellation is terminal.
pub struct WatchKey {
    dir: CloudPath,
    registry_key: String,
    ready_tx: UnboundedSender<ReadySlot>,
    registry: Weak<Registry>,
    // Self-reference used to enqueue this key on the ready queue.
    me: Weak<WatchKey>,
    inner: Mutex<KeyInner>,
}

impl WatchKey {
    pub(crate) fn new(
        dir: CloudPath,
        registry_key: String,
        kinds: Vec<EventKind>,
        initial: &[DirectoryEntry],
        ready_tx: UnboundedSender<ReadySlot>,
        registry: Weak<Registry>,
    ) -> Arc<Self> {
        let snapshot = initial
            .iter()
            .map(|e| {
                (
                    e.name.clone(),
                    SnapshotEntry {
                        modified: e.modified,
                        tick: 0,
                    },
                )
            })
            .collect();
        Arc::new_cyclic(|me| Self {
            dir,
            registry_key,
            ready_tx,
            registry,
            me: me.clone(),
            inner: Mutex::new(KeyInner {
                kinds,
                state: KeyState::Ready,
                valid: true,
                pending: Vec::new(),
                last_modify: HashMap::new(),
                snapshot,
                tick: 0,
                task: None,
            }),
        })
    }

    pub(crate) fn set_task(&self, task: JoinHandle<()>) {
        self.inner.lock().unwrap().task = Some(task);
    }

    pub(crate) fn set_kinds(&self, kinds: Vec<EventKind>) {
        self.inner.lock().unwrap().kinds = kinds;
    }

    /// The directory this key watches.
    pub fn watchable(&self) -> &CloudPath {
        &self.dir
    }

    /// False once the key has been cancelled or its service closed.
    pub fn is_valid(&self) -> bool {
        self.inner.lock().unwrap().valid
    }

    /// Atomically drain and clear the pending event list.
    pub fn poll_events(&self) -> Vec<WatchEvent> {
        let mut inner = self.inner.lock().unwrap();
        inner.last_modify.clear();
        std::mem::take(&mut inner.pending)
    }

    /// Return the key to `READY`, or re-queue it immediately when
    /// events arrived during draining. Fails with `InvalidKey` once the
    /// key has been cancelled or its service closed.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.valid {
            return Err(CloudFsError::InvalidKey);
        }
        if inner.state == KeyState::Signalled {
            if inner.pending.is_empty() {
                inner.state = KeyState::Ready;
            } else if let Some(me) = self.me.upgrade() {
                let _ = self.ready_tx.send(ReadySlot::Key(me));
            }
        }
        Ok(())
    }

    /// Invalidate the key, stop its poll task and drop it from the
    /// service registry. Idempotent.
    pub fn cancel(&self) {
        let task = {
            let mut inner = self.inner.lock().unwrap();
            if !inner.valid {
                return;
            }
            inner.valid = false;
            inner.task.take()
        };
        if let Some(task) = task {
            task.abort();
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.lock().unwrap().remove(&self.registry_key);
        }
    }

    /// Signal the key even without pending events, so a blocked
    /// consumer wakes and observes its state. Used for the terminal
    /// signal after a poll failure.
    pub(crate) fn force_signal(&self) {
        let mut inner = self.inner.lock().unwrap();
        self.signal_locked(&mut inner);
    }

    /// Diff one directory listing against the snapshot, emitting and
    /// coalescing events. One call per poll cycle.
    pub(crate) fn apply_listing(&self, entries: &[DirectoryEntry]) {
        let mut guard = self.inner.lock().unwrap();
        let inner: &mut KeyInner = &mut guard;
        if !inner.valid {
            return;
        }
        inner.tick += 1;
        let tick = inner.tick;

        let mut detected: Vec<(EventKind, String)> = Vec::new();
        for entry in entries {
            match inner.snapshot.get_mut(&entry.name) {
                Some(seen) => {
                    if seen.modified != entry.modified {
                        seen.modified = entry.modified;
                        if inner.kinds.contains(&EventKind::Modify) {
                            detected.push((EventKind::Modify, entry.name.clone()));
                        }
                    }
                    seen.tick = tick;
                }
                None => {
                    inner.snapshot.insert(
                        entry.name.clone(),
                        SnapshotEntry {
                            modified: entry.modified,
                            tick,
                        },
                    );
                    // Report Modify for an unseen entry when Create is
                    // not subscribed, so an edit right after creation
                    // is not lost.
                    if inner.kinds.contains(&EventKind::Create) {
                        detected.push((EventKind::Create, entry.name.clone()));
                    } else if inner.kinds.contains(&EventKind::Modify) {
                        detected.push((EventKind::Modify, entry.name.clone()));
                    }
                }
            }
        }

        // Entries whose tick did not get refreshed this cycle are gone.
        let stale: Vec<String> = inner
            .snapshot
            .iter()
            .filter(|(_, seen)| seen.tick != tick)
            .map(|(name, _)| name.clone())
            .collect();
        for name in stale {
            inner.snapshot.remove(&name);
            if inner.kinds.contains(&EventKind::Delete) {
                detected.push((EventKind::Delete, name));
            }
        }

        if detected.is_empty() {
            return;
        }
        trace!(
            "poll tick {} for {}: {} detections",
            tick,
            self.dir,
            detected.len()
        );
        for (kind, context) in detected {
            Self::enqueue_locked(inner, kind, Some(context));
        }
        self.signal_locked(inner);
    }

    /// Append one detection to the pending list, coalescing repeats.
    fn enqueue_locked(inner: &mut KeyInner, mut kind: EventKind, mut context: Option<String>) {
        if let Some(last) = inner.pending.last_mut() {
            // An identical kind+context repeat, or anything at all after
            // an overflow, folds into the last event.
            if last.kind == EventKind::Overflow
                || (last.kind == kind && last.context == context)
            {
                last.repeat_count += 1;
                return;
            }
            // A Modify whose context still has a pending Modify folds
            // into that event in place.
            if kind == EventKind::Modify {
                if let Some(index) = context
                    .as_deref()
                    .and_then(|c| inner.last_modify.get(c))
                    .copied()
                {
                    inner.pending[index].repeat_count += 1;
                    return;
                }
            }
            if inner.pending.len() >= MAX_PENDING_EVENTS {
                kind = EventKind::Overflow;
                context = None;
            }
        }

        match kind {
            EventKind::Overflow => {
                inner.pending.clear();
                inner.last_modify.clear();
            }
            EventKind::Modify => {
                if let Some(c) = &context {
                    inner.last_modify.insert(c.clone(), inner.pending.len());
                }
            }
            _ => {
                // A non-Modify event ends Modify tracking for its context.
                if let Some(c) = &context {
                    inner.last_modify.remove(c);
                }
            }
        }
        inner.pending.push(WatchEvent::new(kind, context));
    }

    /// `READY -> SIGNALLED` enqueues the key on the ready queue exactly
    /// once per signalled period.
    fn signal_locked(&self, inner: &mut KeyInner) {
        if inner.state == KeyState::Ready {
            inner.state = KeyState::Signalled;
            if let Some(me) = self.me.upgrade() {
                let _ = self.ready_tx.send(ReadySlot::Key(me));
            }
        }
    }
}
