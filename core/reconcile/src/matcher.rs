//! Mapping vault items to SSH keys.

use tracing::{debug, warn};

use bwkeys_common::{AttachmentId, Error, ItemId, Passphrase, ResolutionParams, Result};
use bwkeys_vault::Item;

/// The key an item declares.
#[derive(Debug, Clone)]
pub struct KeySpec {
    /// Item the key belongs to.
    pub item_id: ItemId,
    /// Item display name.
    pub item_name: String,
    /// Attachment file name holding the private key.
    pub key_file_name: String,
    /// Passphrase for the key, if the item carries one.
    pub passphrase: Option<Passphrase>,
    /// Attachment holding the private key.
    pub attachment_id: AttachmentId,
}

/// Why an item was not turned into a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Single-entry mode is active and this is not the entry.
    NotTarget,
    /// The item has no field naming its key file.
    MissingKeyField { field: String },
    /// No attachment carries the declared file name.
    MissingAttachment { file: String },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::NotTarget => write!(f, "not the requested entry"),
            SkipReason::MissingKeyField { field } => write!(f, "no \"{}\" field", field),
            SkipReason::MissingAttachment { file } => {
                write!(f, "no attachment named \"{}\"", file)
            }
        }
    }
}

/// Result of matching one item.
#[derive(Debug, Clone)]
pub enum MatchOutcome {
    /// The item declares a usable key.
    Matched(KeySpec),
    /// The item is passed over.
    Skipped(SkipReason),
}

/// Maps items to key specifications under fixed resolution parameters.
pub struct KeyMatcher<'a> {
    params: &'a ResolutionParams,
}

impl<'a> KeyMatcher<'a> {
    /// Create a matcher.
    pub fn new(params: &'a ResolutionParams) -> Self {
        Self { params }
    }

    /// Match a single item.
    ///
    /// # Postconditions
    /// - `Matched` only when the item has an attachment named after its key file
    ///
    /// # Errors
    /// - `Error::Misconfiguration` if the targeted entry has no key field
    pub fn match_item(&self, item: &Item) -> Result<MatchOutcome> {
        let target = self.params.target();
        if let Some(entry) = target {
            if item.name != entry {
                return Ok(MatchOutcome::Skipped(SkipReason::NotTarget));
            }
        }
        debug!(item = %item.name, "Processing item");

        let key_file_name = if self.params.assume_filename {
            item.name.clone()
        } else {
            match item.field(&self.params.key_field) {
                Some(name) => name.to_string(),
                None if target.is_some() => {
                    return Err(Error::Misconfiguration(format!(
                        "entry \"{}\" has no \"{}\" field",
                        item.name, self.params.key_field
                    )));
                }
                None => {
                    warn!(
                        "No \"{}\" field found for item {}",
                        self.params.key_field, item.name
                    );
                    return Ok(MatchOutcome::Skipped(SkipReason::MissingKeyField {
                        field: self.params.key_field.clone(),
                    }));
                }
            }
        };
        debug!("Private key file declared");

        let Some(attachment) = item.attachment(&key_file_name) else {
            warn!(
                "No attachment named {} found for item {}",
                key_file_name, item.name
            );
            return Ok(MatchOutcome::Skipped(SkipReason::MissingAttachment {
                file: key_file_name,
            }));
        };
        debug!("Private key ID found");

        let passphrase = self.passphrase(item);
        Ok(MatchOutcome::Matched(KeySpec {
            item_id: item.id.clone(),
            item_name: item.name.clone(),
            key_file_name,
            passphrase,
            attachment_id: attachment.id.clone(),
        }))
    }

    fn passphrase(&self, item: &Item) -> Option<Passphrase> {
        let value = if self.params.password_as_passphrase {
            item.login_password()
        } else {
            item.field(&self.params.passphrase_field)
        };
        match value.filter(|v| !v.is_empty()) {
            Some(value) => {
                debug!("Passphrase declared");
                Some(Passphrase::new(value))
            }
            None => {
                warn!("No passphrase found for item {}, trying without", item.name);
                None
            }
        }
    }
}
