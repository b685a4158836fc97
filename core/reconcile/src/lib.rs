//! Key reconciliation for bw-sshkeys.
//!
//! This module provides:
//! - The key matcher, mapping vault items to key specifications
//! - Per-item state tracking and the run report
//! - The reconciliation driver applying add or remove to every matched item

pub mod engine;
pub mod matcher;
pub mod state;

pub use engine::Reconciler;
pub use matcher::{KeyMatcher, KeySpec, MatchOutcome, SkipReason};
pub use state::{ItemRecord, ItemState, RunReport};
