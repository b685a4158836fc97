//! Vault access for bw-sshkeys.
//!
//! This module provides:
//! - A backend trait describing the vault operations the key loader needs
//! - The `bw` command line backend, run as child processes
//! - Session resolution (explicit token, environment, login or unlock)
//! - Folder resolution and item listing
//! - An in-memory backend for tests
//!
//! # Architecture
//! Everything above this crate talks to [`VaultBackend`] only. Secrets
//! returned by the backend travel in zeroizing wrappers and are never written
//! to disk.

pub mod backend;
pub mod bw;
pub mod capability;
pub mod item;
pub mod memory;
pub mod query;
pub mod session;

pub use backend::{Folder, VaultBackend};
pub use bw::BwCli;
pub use capability::{CliVersion, Feature};
pub use item::{Attachment, Field, FieldType, Item, Login};
pub use memory::MemoryBackend;
pub use query::{list_items, resolve_folder, select_folder};
pub use session::{Prompter, SessionResolver, SessionSource, SESSION_ENV};
