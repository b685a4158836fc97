//! Vault-to-agent key transfer.

use tracing::{debug, info};

use bwkeys_common::{AttachmentId, Error, ItemId, Passphrase, Result, SensitiveBytes, SessionToken};
use bwkeys_vault::VaultBackend;

use crate::agent::IdentityAgent;
use crate::pubkey::PublicKeyDeriver;

/// Retrieve an attachment into memory.
///
/// # Postconditions
/// - The returned bytes end with a newline
///
/// # Errors
/// - `Error::Retrieval` with the backend's diagnostics
pub async fn fetch_attachment(
    backend: &dyn VaultBackend,
    session: &SessionToken,
    item: &ItemId,
    attachment: &AttachmentId,
) -> Result<SensitiveBytes> {
    debug!(item_id = %item, attachment_id = %attachment, "Fetching attachment");
    let mut bytes = backend
        .get_attachment(session, item, attachment)
        .await
        .map_err(|e| match e {
            Error::Retrieval(message) => Error::Retrieval(message),
            other => Error::Retrieval(other.to_string()),
        })?;
    if bytes.is_empty() {
        return Err(Error::Retrieval(format!(
            "attachment {} of item {} is empty",
            attachment, item
        )));
    }
    bytes.ensure_trailing_newline();
    Ok(bytes)
}

/// Moves keys from the vault into the agent, and back out.
pub struct TransferPipeline<'a> {
    backend: &'a dyn VaultBackend,
    agent: &'a dyn IdentityAgent,
    deriver: &'a PublicKeyDeriver,
}

impl<'a> TransferPipeline<'a> {
    /// Create a pipeline.
    pub fn new(
        backend: &'a dyn VaultBackend,
        agent: &'a dyn IdentityAgent,
        deriver: &'a PublicKeyDeriver,
    ) -> Self {
        Self {
            backend,
            agent,
            deriver,
        }
    }

    /// Fetch a key and register it with the agent.
    ///
    /// # Errors
    /// - `Error::Retrieval` if the attachment cannot be fetched
    /// - `Error::Agent` if registration fails
    pub async fn add(
        &self,
        session: &SessionToken,
        item: &ItemId,
        attachment: &AttachmentId,
        passphrase: Option<&Passphrase>,
    ) -> Result<()> {
        let key = fetch_attachment(self.backend, session, item, attachment).await?;
        info!("Running ssh-add");
        self.agent.add_identity(&key, passphrase).await
    }

    /// Fetch a key, derive its public half and remove it from the agent.
    ///
    /// # Errors
    /// - `Error::Retrieval` if the attachment cannot be fetched
    /// - `Error::Key` if the public key cannot be derived
    /// - `Error::Agent` if removal fails
    pub async fn remove(
        &self,
        session: &SessionToken,
        item: &ItemId,
        attachment: &AttachmentId,
        passphrase: Option<&Passphrase>,
    ) -> Result<()> {
        let key = fetch_attachment(self.backend, session, item, attachment).await?;
        let public_key = self.deriver.derive(&key, passphrase).await?;
        drop(key);
        info!("Running ssh-add -d");
        self.agent.remove_identity(&public_key, passphrase).await
    }
}
