//! Secure key transfer between the vault and the SSH agent.
//!
//! This module provides:
//! - Attachment retrieval into zeroizing memory buffers
//! - Key registration and removal through `ssh-add`, fed over stdin
//! - The askpass contract used to hand passphrases to the agent
//! - Public key derivation for removal
//!
//! # Security Guarantees
//! - Key material only crosses process boundaries through pipes
//! - Passphrases only travel in the environment of a single child process
//! - Nothing is written to a filesystem path

pub mod agent;
pub mod askpass;
pub mod pubkey;
pub mod transfer;

pub use agent::{IdentityAgent, SshAdd};
pub use askpass::{AskpassHelper, ASKPASS_PASSPHRASE_ENV};
pub use pubkey::PublicKeyDeriver;
pub use transfer::{fetch_attachment, TransferPipeline};
