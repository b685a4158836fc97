//! Run configuration.
//!
//! Values are layered: built-in defaults, then an optional JSON file, then
//! command line flags. The result is validated once, before any backend call.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Default folder searched for key items.
pub const DEFAULT_FOLDER: &str = "ssh-agent";

/// Default custom field holding the private key attachment name.
pub const DEFAULT_KEY_FIELD: &str = "private";

/// Default custom field holding the key passphrase.
pub const DEFAULT_PASSPHRASE_FIELD: &str = "passphrase";

/// What to do with each matched key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Register the key with the agent.
    #[default]
    Add,
    /// Deregister the key from the agent.
    Remove,
}

impl Operation {
    /// Select the operation from the add/remove flags.
    ///
    /// # Errors
    /// - Both flags set
    pub fn from_flags(add: bool, remove: bool) -> Result<Self> {
        match (add, remove) {
            (true, true) => Err(Error::Misconfiguration(
                "cannot add and remove keys in the same run".to_string(),
            )),
            (_, true) => Ok(Operation::Remove),
            _ => Ok(Operation::Add),
        }
    }

    /// Verb used in log messages.
    pub fn verb(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Remove => "remove",
        }
    }
}

/// Parameters used to map a vault item to a key.
///
/// Immutable once built; passed by reference to the matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolutionParams {
    /// Custom field naming the private key attachment.
    pub key_field: String,
    /// Custom field holding the key passphrase.
    pub passphrase_field: String,
    /// Use the item's login password as the key passphrase.
    pub password_as_passphrase: bool,
    /// Only process the item with this name.
    pub entry: Option<String>,
    /// Treat the entry name as the attachment file name.
    pub assume_filename: bool,
}

impl Default for ResolutionParams {
    fn default() -> Self {
        Self {
            key_field: DEFAULT_KEY_FIELD.to_string(),
            passphrase_field: DEFAULT_PASSPHRASE_FIELD.to_string(),
            password_as_passphrase: false,
            entry: None,
            assume_filename: false,
        }
    }
}

impl ResolutionParams {
    /// Target entry name, if single-entry mode is active.
    pub fn target(&self) -> Option<&str> {
        self.entry.as_deref().filter(|e| !e.is_empty())
    }

    /// Check option combinations.
    ///
    /// `assume_filename` and `password_as_passphrase` only make sense for a
    /// single named entry.
    ///
    /// # Errors
    /// - Empty field names
    /// - Entry-only options used without an entry
    pub fn validate(&self) -> Result<()> {
        if !self.assume_filename && self.key_field.is_empty() {
            return Err(Error::Misconfiguration(
                "key field name cannot be empty".to_string(),
            ));
        }
        if !self.password_as_passphrase && self.passphrase_field.is_empty() {
            return Err(Error::Misconfiguration(
                "passphrase field name cannot be empty".to_string(),
            ));
        }
        if self.target().is_none() {
            if self.assume_filename {
                return Err(Error::Misconfiguration(
                    "--assume-filename requires --entry".to_string(),
                ));
            }
            if self.password_as_passphrase {
                return Err(Error::Misconfiguration(
                    "--login-password requires --entry".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Complete configuration for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Vault folder holding the key items.
    pub folder: String,
    /// Item matching parameters.
    pub params: ResolutionParams,
    /// Add or remove.
    pub operation: Operation,
    /// Key lifetime in seconds passed to the agent.
    pub lifetime: Option<u32>,
    /// Ask the agent to confirm each use of the key.
    pub confirm: bool,
    /// Vault CLI program.
    pub bw_program: PathBuf,
    /// Agent registration program.
    pub ssh_add_program: PathBuf,
    /// Key tool used to derive public keys the parser cannot read.
    pub ssh_keygen_program: PathBuf,
    /// Passphrase helper; located next to the running executable when unset.
    pub askpass_program: Option<PathBuf>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            folder: DEFAULT_FOLDER.to_string(),
            params: ResolutionParams::default(),
            operation: Operation::Add,
            lifetime: None,
            confirm: false,
            bw_program: PathBuf::from("bw"),
            ssh_add_program: PathBuf::from("ssh-add"),
            ssh_keygen_program: PathBuf::from("ssh-keygen"),
            askpass_program: None,
        }
    }
}

impl RunConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    /// - Empty folder name
    /// - Invalid resolution parameters
    /// - Zero lifetime
    pub fn validate(&self) -> Result<()> {
        if self.folder.is_empty() {
            return Err(Error::Misconfiguration(
                "folder name cannot be empty".to_string(),
            ));
        }
        if self.lifetime == Some(0) {
            return Err(Error::Misconfiguration(
                "key lifetime must be at least one second".to_string(),
            ));
        }
        self.params.validate()
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON.
    ///
    /// Missing keys take their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}
