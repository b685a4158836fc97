//! Vault backend trait definition.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use bwkeys_common::{
    AttachmentId, FolderId, ItemId, Passphrase, Result, SensitiveBytes, SessionToken,
};

use crate::item::Item;

/// A folder as returned by a folder search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Folder {
    /// Folder identifier; `None` for the implicit "No Folder" bucket.
    pub id: Option<FolderId>,
    /// Folder name.
    pub name: String,
}

/// Vault backend trait.
///
/// All operations are blocking from the caller's point of view: the key
/// loader issues one call at a time and awaits it before the next.
/// Implementations report failures with the backend's own diagnostic text.
#[async_trait]
pub trait VaultBackend: Send + Sync {
    /// Get the backend name (e.g., "bw", "memory").
    fn name(&self) -> &str;

    /// Check whether an account is logged in.
    ///
    /// This is a side-effect free detect. `Ok(false)` means "not logged in",
    /// never an authentication failure.
    async fn is_logged_in(&self) -> Result<bool>;

    /// Log in and return a session token.
    ///
    /// # Errors
    /// - `Error::Auth` with the backend's diagnostics if the exchange fails
    async fn login(&self, email: &str, password: &Passphrase) -> Result<SessionToken>;

    /// Unlock an already logged-in vault and return a session token.
    ///
    /// # Errors
    /// - `Error::Auth` with the backend's diagnostics if the exchange fails
    async fn unlock(&self, password: &Passphrase) -> Result<SessionToken>;

    /// Search folders by name.
    ///
    /// The backend may match substrings; callers filter for exact names.
    async fn search_folders(&self, session: &SessionToken, name: &str) -> Result<Vec<Folder>>;

    /// List all items in a folder, in backend order.
    async fn list_items(&self, session: &SessionToken, folder: &FolderId) -> Result<Vec<Item>>;

    /// Retrieve the raw content of an attachment.
    ///
    /// # Postconditions
    /// - Content is held in memory only
    ///
    /// # Errors
    /// - `Error::Retrieval` if the attachment cannot be fetched
    async fn get_attachment(
        &self,
        session: &SessionToken,
        item: &ItemId,
        attachment: &AttachmentId,
    ) -> Result<SensitiveBytes>;
}
