//! Watch service: key registry, poll scheduling and the ready queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;

use crate::backend::ListingBackend;
use crate::config::CloudFsConfig;
use crate::error::{CloudFsError, Result};
use crate::path::CloudPath;

use super::event::EventKind;
use super::key::{ReadySlot, Registry, WatchKey};

/// Emulates directory watching over a listing capability.
///
/// One tokio task per registered directory re-lists it on a fixed
/// interval and diffs against the key's snapshot; signalled keys travel
/// over an mpsc ready queue to blocked consumers. Keys polling
/// different directories proceed independently: a failure in one
/// cancels only that key.
pub struct PollingWatchService {
    backend: Arc<dyn ListingBackend>,
    interval: Duration,
    registry: Arc<Registry>,
    ready_tx: UnboundedSender<ReadySlot>,
    ready_rx: Mutex<UnboundedReceiver<ReadySlot>>,
    closed: AtomicBool,
}

impl PollingWatchService {
    /// Create a service polling through `backend` at the configured
    /// interval.
    pub fn new(backend: Arc<dyn ListingBackend>, config: &CloudFsConfig) -> Self {
        let (ready_tx, ready_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            interval: config.poll_interval(),
            registry: Arc::new(StdMutex::new(HashMap::new())),
            ready_tx,
            ready_rx: Mutex::new(ready_rx),
            closed: AtomicBool::new(false),
        }
    }

    /// Register a directory for watching.
    ///
    /// Takes an initial full snapshot of the directory (which also
    /// validates that it is listable) and schedules the poll task.
    /// Registering a directory that already has a valid key updates the
    /// key's subscribed kinds and returns the same key.
    ///
    /// The caller resolves and validates the path; the service never
    /// walks the resource tree itself.
    pub async fn register(
        &self,
        dir: &CloudPath,
        kinds: &[EventKind],
    ) -> Result<Arc<WatchKey>> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CloudFsError::ClosedService);
        }
        if kinds.is_empty() {
            return Err(CloudFsError::InvalidArgument(
                "no event kinds subscribed".to_string(),
            ));
        }
        let dir = dir.to_absolute();
        let registry_key = format!("{}#{}", dir.context().backend_tag(), dir);

        if let Some(existing) = self.registry.lock().unwrap().get(&registry_key).cloned() {
            if existing.is_valid() {
                existing.set_kinds(kinds.to_vec());
                return Ok(existing);
            }
        }

        let initial = self.backend.list_directory(&dir).await?;
        let key = WatchKey::new(
            dir.clone(),
            registry_key.clone(),
            kinds.to_vec(),
            &initial,
            self.ready_tx.clone(),
            Arc::downgrade(&self.registry),
        );
        self.registry
            .lock()
            .unwrap()
            .insert(registry_key, Arc::clone(&key));

        let task = tokio::spawn(poll_loop(
            Arc::clone(&self.backend),
            Arc::clone(&key),
            self.interval,
        ));
        key.set_task(task);
        debug!("registered watch on {}", dir);

        // The service may have closed while the initial snapshot was
        // being taken.
        if self.closed.load(Ordering::SeqCst) {
            key.cancel();
            return Err(CloudFsError::ClosedService);
        }
        Ok(key)
    }

    /// Block until a key is signalled or the service closes.
    pub async fn take(&self) -> Result<Arc<WatchKey>> {
        let mut rx = self.ready_rx.lock().await;
        loop {
            match rx.recv().await {
                Some(ReadySlot::Key(key)) => {
                    // Keys queued before close are stale once every key
                    // has been cancelled.
                    if self.closed.load(Ordering::SeqCst) {
                        continue;
                    }
                    return Ok(key);
                }
                Some(ReadySlot::Closed) | None => {
                    // Keep the sentinel in place for later consumers.
                    let _ = self.ready_tx.send(ReadySlot::Closed);
                    return Err(CloudFsError::ClosedService);
                }
            }
        }
    }

    /// Non-blocking variant of [`PollingWatchService::take`].
    pub async fn poll_key(&self) -> Result<Option<Arc<WatchKey>>> {
        let mut rx = self.ready_rx.lock().await;
        loop {
            match rx.try_recv() {
                Ok(ReadySlot::Key(key)) => {
                    if self.closed.load(Ordering::SeqCst) {
                        continue;
                    }
                    return Ok(Some(key));
                }
                Ok(ReadySlot::Closed) => {
                    let _ = self.ready_tx.send(ReadySlot::Closed);
                    return Err(CloudFsError::ClosedService);
                }
                Err(_) => {
                    if self.closed.load(Ordering::SeqCst) {
                        return Err(CloudFsError::ClosedService);
                    }
                    return Ok(None);
                }
            }
        }
    }

    /// Like `take`, but gives up after `timeout` with `Ok(None)`.
    pub async fn poll_timeout(&self, timeout: Duration) -> Result<Option<Arc<WatchKey>>> {
        let deadline = tokio::time::Instant::now() + timeout;
        let mut rx = self.ready_rx.lock().await;
        loop {
            match tokio::time::timeout_at(deadline, rx.recv()).await {
                Ok(Some(ReadySlot::Key(key))) => {
                    if self.closed.load(Ordering::SeqCst) {
                        continue;
                    }
                    return Ok(Some(key));
                }
                Ok(Some(ReadySlot::Closed)) | Ok(None) => {
                    let _ = self.ready_tx.send(ReadySlot::Closed);
                    return Err(CloudFsError::ClosedService);
                }
                Err(_) => return Ok(None),
            }
        }
    }

    /// Cancel every key and unblock consumers. Idempotent; later
    /// `register`/`take` calls fail with `ClosedService`.
    ///
    /// Never touches the receiver half of the ready queue: a consumer
    /// blocked in `take` holds that lock, so close only pushes the
    /// sentinel and lets consumers discard whatever stale keys precede
    /// it.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let keys: Vec<Arc<WatchKey>> = {
            let mut registry = self.registry.lock().unwrap();
            registry.drain().map(|(_, key)| key).collect()
        };
        for key in keys {
            key.cancel();
        }
        let _ = self.ready_tx.send(ReadySlot::Closed);
        debug!("watch service closed");
    }
}

/// Fixed-rate poll loop for one key. Runs until the key is cancelled
/// or a listing failure cancels it from inside.
async fn poll_loop(backend: Arc<dyn ListingBackend>, key: Arc<WatchKey>, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; the initial snapshot was
    // already taken at registration.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        if !key.is_valid() {
            break;
        }
        match backend.list_directory(key.watchable()).await {
            Ok(entries) => key.apply_listing(&entries),
            Err(err) => {
                warn!(
                    "poll of {} failed ({}); cancelling its watch key",
                    key.watchable(),
                    err
                );
                key.cancel();
                key.force_signal();
                break;
            }
        }
    }
}
