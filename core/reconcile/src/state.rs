//! Per-item state tracking for a reconciliation run.

use serde::Serialize;

use bwkeys_common::Operation;

/// Processing state of a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ItemState {
    /// Not yet examined.
    Pending,
    /// A key was found; the operation has not completed.
    Matched,
    /// The operation succeeded.
    Applied,
    /// The item declares no usable key.
    Skipped,
    /// The agent or key tool rejected the key.
    Failed,
}

/// Tracking record for one item.
#[derive(Debug, Clone, Serialize)]
pub struct ItemRecord {
    /// Item name.
    pub name: String,
    /// Current state.
    pub state: ItemState,
    /// Skip reason or failure message.
    pub detail: Option<String>,
}

impl ItemRecord {
    /// Create a pending record.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ItemState::Pending,
            detail: None,
        }
    }

    /// Mark as matched.
    pub fn mark_matched(&mut self) {
        self.state = ItemState::Matched;
    }

    /// Mark as applied.
    pub fn mark_applied(&mut self) {
        self.state = ItemState::Applied;
        self.detail = None;
    }

    /// Mark as skipped.
    pub fn mark_skipped(&mut self, reason: impl Into<String>) {
        self.state = ItemState::Skipped;
        self.detail = Some(reason.into());
    }

    /// Mark as failed.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        self.state = ItemState::Failed;
        self.detail = Some(error.into());
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Operation that was applied.
    pub operation: Operation,
    /// Records in listing order.
    pub records: Vec<ItemRecord>,
}

impl RunReport {
    /// Create an empty report.
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            records: Vec::new(),
        }
    }

    /// Append a record.
    pub fn push(&mut self, record: ItemRecord) {
        self.records.push(record);
    }

    fn count(&self, state: ItemState) -> usize {
        self.records.iter().filter(|r| r.state == state).count()
    }

    /// Items whose key was added or removed.
    pub fn applied(&self) -> usize {
        self.count(ItemState::Applied)
    }

    /// Items without a usable key.
    pub fn skipped(&self) -> usize {
        self.count(ItemState::Skipped)
    }

    /// Items the agent rejected.
    pub fn failed(&self) -> usize {
        self.count(ItemState::Failed)
    }

    /// A run succeeds if it applied at least one key or had nothing to do.
    pub fn is_success(&self) -> bool {
        self.records.is_empty() || self.applied() > 0
    }

    /// One-line summary for logging.
    pub fn summary(&self) -> String {
        format!(
            "{}: {} applied, {} skipped, {} failed",
            self.operation.verb(),
            self.applied(),
            self.skipped(),
            self.failed()
        )
    }
}
