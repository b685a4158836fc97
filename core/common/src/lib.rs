//! Common utilities and types shared across the bw-sshkeys crates.
//!
//! This module provides foundational types that are used throughout the codebase:
//! the error taxonomy, identifier newtypes for vault objects, secret wrappers
//! that zeroize on drop, and the run configuration.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Operation, ResolutionParams, RunConfig};
pub use error::{Error, Result};
pub use types::{AttachmentId, FolderId, ItemId, Passphrase, SensitiveBytes, SessionToken};
