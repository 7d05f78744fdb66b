//! Watch event types.

use serde::{Deserialize, Serialize};

/// Kind of a directory change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    /// An entry appeared.
    Create,
    /// An entry's modification time changed.
    Modify,
    /// A previously seen entry disappeared.
    Delete,
    /// The pending queue overflowed; individual events were discarded.
    Overflow,
}

/// One coalesced directory change.
///
/// `context` is the entry name relative to the watched directory
/// (`None` for `Overflow`); `repeat_count` counts how many identical
/// detections were merged into this event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    /// What happened
    pub kind: EventKind,
    /// Entry name, if the event is about one entry
    pub context: Option<String>,
    /// Number of merged identical detections (at least 1)
    pub repeat_count: u32,
}

impl WatchEvent {
    pub(crate) fn new(kind: EventKind, context: Option<String>) -> Self {
        Self {
            kind,
            context,
            repeat_count: 1,
        }
    }
}
