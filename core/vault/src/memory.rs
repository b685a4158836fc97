//! In-memory vault backend for testing.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use bwkeys_common::{
    AttachmentId, Error, FolderId, ItemId, Passphrase, Result, SensitiveBytes, SessionToken,
};

use crate::backend::{Folder, VaultBackend};
use crate::item::Item;

/// Token handed out by successful login or unlock exchanges.
pub const MEMORY_SESSION: &str = "memory-session";

#[derive(Default)]
struct State {
    account: Option<(String, String)>,
    logged_in: bool,
    folders: Vec<Folder>,
    items: Vec<(FolderId, Item)>,
    attachments: HashMap<(String, String), Vec<u8>>,
    calls: Vec<String>,
}

/// In-memory vault backend.
///
/// Useful for testing. Folder searches behave like `bw`: they match on
/// substrings, leaving exact-name filtering to the caller. Every call is
/// recorded and can be inspected with [`MemoryBackend::calls`].
#[derive(Clone, Default)]
pub struct MemoryBackend {
    state: Arc<RwLock<State>>,
}

impl MemoryBackend {
    /// Create an empty, logged-out backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the account accepted by login and unlock.
    pub fn with_account(self, email: &str, password: &str) -> Self {
        self.write().account = Some((email.to_string(), password.to_string()));
        self
    }

    /// Mark the account as logged in (but locked).
    pub fn logged_in(self) -> Self {
        self.write().logged_in = true;
        self
    }

    /// Add a folder.
    pub fn with_folder(self, id: &str, name: &str) -> Self {
        self.write().folders.push(Folder {
            id: FolderId::new(id).ok(),
            name: name.to_string(),
        });
        self
    }

    /// Add an item to a folder.
    ///
    /// # Panics
    /// Panics if `folder` is empty or `item` is not a valid item document.
    pub fn with_item(self, folder: &str, item: serde_json::Value) -> Self {
        let folder = FolderId::new(folder).expect("folder id");
        let item: Item = serde_json::from_value(item).expect("item document");
        self.write().items.push((folder, item));
        self
    }

    /// Store attachment content.
    pub fn with_attachment(self, item: &str, attachment: &str, data: &[u8]) -> Self {
        self.write()
            .attachments
            .insert((item.to_string(), attachment.to_string()), data.to_vec());
        self
    }

    /// Calls made so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.read().calls.clone()
    }

    fn record(&self, call: impl Into<String>) {
        self.write().calls.push(call.into());
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_password(&self, email: Option<&str>, password: &Passphrase) -> Result<SessionToken> {
        let state = self.read();
        let Some((known_email, known_password)) = state.account.as_ref() else {
            return Err(Error::Auth("No account configured.".to_string()));
        };
        if email.is_some_and(|e| e != known_email) || password.expose() != known_password {
            return Err(Error::Auth("Invalid master password.".to_string()));
        }
        SessionToken::new(MEMORY_SESSION)
    }
}

#[async_trait]
impl VaultBackend for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn is_logged_in(&self) -> Result<bool> {
        self.record("is_logged_in");
        Ok(self.read().logged_in)
    }

    async fn login(&self, email: &str, password: &Passphrase) -> Result<SessionToken> {
        self.record("login");
        let token = self.check_password(Some(email), password)?;
        self.write().logged_in = true;
        Ok(token)
    }

    async fn unlock(&self, password: &Passphrase) -> Result<SessionToken> {
        self.record("unlock");
        if !self.read().logged_in {
            return Err(Error::Auth("You are not logged in.".to_string()));
        }
        self.check_password(None, password)
    }

    async fn search_folders(&self, _session: &SessionToken, name: &str) -> Result<Vec<Folder>> {
        self.record("search_folders");
        let needle = name.to_lowercase();
        Ok(self
            .read()
            .folders
            .iter()
            .filter(|f| f.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn list_items(&self, _session: &SessionToken, folder: &FolderId) -> Result<Vec<Item>> {
        self.record("list_items");
        Ok(self
            .read()
            .items
            .iter()
            .filter(|(f, _)| f == folder)
            .map(|(_, item)| item.clone())
            .collect())
    }

    async fn get_attachment(
        &self,
        _session: &SessionToken,
        item: &ItemId,
        attachment: &AttachmentId,
    ) -> Result<SensitiveBytes> {
        self.record(format!("get_attachment:{}", attachment));
        self.read()
            .attachments
            .get(&(item.to_string(), attachment.to_string()))
            .map(|data| SensitiveBytes::new(data.clone()))
            .ok_or_else(|| Error::Retrieval("Attachment not found.".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_search_matches_substrings() {
        let backend = MemoryBackend::new()
            .with_folder("f-1", "ssh-agent")
            .with_folder("f-2", "old-ssh-agent")
            .with_folder("f-3", "work");
        let session = SessionToken::new(MEMORY_SESSION).unwrap();

        let found = backend.search_folders(&session, "ssh-agent").await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn test_items_filtered_by_folder() {
        let backend = MemoryBackend::new()
            .with_item("f-1", json!({"id": "a", "name": "one"}))
            .with_item("f-2", json!({"id": "b", "name": "two"}))
            .with_item("f-1", json!({"id": "c", "name": "three"}));
        let session = SessionToken::new(MEMORY_SESSION).unwrap();

        let items = backend
            .list_items(&session, &FolderId::new("f-1").unwrap())
            .await
            .unwrap();
        let names: Vec<_> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["one", "three"]);
    }

    #[tokio::test]
    async fn test_missing_attachment() {
        let backend = MemoryBackend::new();
        let session = SessionToken::new(MEMORY_SESSION).unwrap();

        let result = backend
            .get_attachment(
                &session,
                &ItemId::new("a").unwrap(),
                &AttachmentId::new("x").unwrap(),
            )
            .await;
        assert!(matches!(result, Err(Error::Retrieval(_))));
        assert_eq!(backend.calls(), vec!["get_attachment:x"]);
    }
}
