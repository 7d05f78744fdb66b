//! Polling change-notification engine.
//!
//! Remote backends have no native change notifications, so directory
//! watching is emulated: every registered directory is re-listed on a
//! fixed interval, the listing is diffed against a per-key snapshot,
//! and the differences are coalesced into pending events consumers
//! drain through a ready queue.

pub mod event;
pub mod key;
pub mod service;

pub use event::{EventKind, WatchEvent};
pub use key::WatchKey;
pub use service::PollingWatchService;
