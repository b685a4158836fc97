//! Reconciliation driver.
//!
//! Walks the items of the configured folder in listing order, matches each
//! one to a key and adds or removes that key. Skipped items and keys the
//! agent rejects are recorded and the walk continues; vault failures and
//! single-entry resolution errors end the run.

use tracing::{debug, info, warn};

use bwkeys_agent::{IdentityAgent, PublicKeyDeriver, TransferPipeline};
use bwkeys_common::{Error, Operation, Result, RunConfig, SessionToken};
use bwkeys_vault::{list_items, resolve_folder, Item, VaultBackend};

use crate::matcher::{KeyMatcher, KeySpec, MatchOutcome, SkipReason};
use crate::state::{ItemRecord, RunReport};

/// Drives one add or remove run.
pub struct Reconciler<'a> {
    backend: &'a dyn VaultBackend,
    pipeline: TransferPipeline<'a>,
    config: RunConfig,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler.
    ///
    /// # Errors
    /// - `Error::Misconfiguration` if `config` does not validate
    pub fn new(
        backend: &'a dyn VaultBackend,
        agent: &'a dyn IdentityAgent,
        deriver: &'a PublicKeyDeriver,
        config: RunConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            backend,
            pipeline: TransferPipeline::new(backend, agent, deriver),
            config,
        })
    }

    /// Configuration of this run.
    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Resolve the folder, list its items and reconcile them.
    ///
    /// # Errors
    /// - `Error::NotFound` / `Error::Ambiguous` for folder resolution
    /// - Listing, retrieval and single-entry errors from [`Reconciler::reconcile`]
    pub async fn run(&self, session: &SessionToken) -> Result<RunReport> {
        info!("Getting folder list");
        let folder = resolve_folder(self.backend, session, &self.config.folder).await?;

        info!("Getting folder items");
        let items = list_items(self.backend, session, &folder).await?;
        if items.is_empty() {
            warn!("No items found in folder \"{}\"", self.config.folder);
        }

        self.reconcile(session, &items).await
    }

    /// Reconcile a listed set of items.
    ///
    /// # Postconditions
    /// - Every requested item has a final record, in listing order
    /// - In single-entry mode, nothing after the entry is examined
    ///
    /// # Errors
    /// - `Error::NotFound` if the requested entry is not among `items`
    /// - `Error::Misconfiguration` if the entry has no key field
    /// - `Error::Retrieval` if a key cannot be fetched
    pub async fn reconcile(&self, session: &SessionToken, items: &[Item]) -> Result<RunReport> {
        let params = &self.config.params;
        let matcher = KeyMatcher::new(params);
        let mut report = RunReport::new(self.config.operation);
        let mut found_target = false;

        for item in items {
            let outcome = matcher.match_item(item)?;
            let mut record = ItemRecord::new(&item.name);

            match outcome {
                MatchOutcome::Skipped(SkipReason::NotTarget) => {
                    debug!(item = %item.name, "Not the requested entry");
                    continue;
                }
                MatchOutcome::Skipped(reason) => record.mark_skipped(reason.to_string()),
                MatchOutcome::Matched(spec) => {
                    record.mark_matched();
                    match self.apply(session, &spec).await {
                        Ok(()) => record.mark_applied(),
                        Err(e) if e.is_item_local() => {
                            warn!(
                                "Could not {} key for item {}: {}",
                                self.config.operation.verb(),
                                spec.item_name,
                                e
                            );
                            record.mark_failed(e.to_string());
                        }
                        Err(e) => return Err(e),
                    }
                }
            }

            report.push(record);
            if params.target().is_some() {
                found_target = true;
                break;
            }
        }

        if let Some(entry) = params.target() {
            if !found_target {
                return Err(Error::NotFound(format!("entry \"{}\"", entry)));
            }
        }

        info!("{}", report.summary());
        Ok(report)
    }

    async fn apply(&self, session: &SessionToken, spec: &KeySpec) -> Result<()> {
        debug!(
            item = %spec.item_name,
            file = %spec.key_file_name,
            "Applying {}",
            self.config.operation.verb()
        );
        let passphrase = spec.passphrase.as_ref();
        match self.config.operation {
            Operation::Add => {
                self.pipeline
                    .add(session, &spec.item_id, &spec.attachment_id, passphrase)
                    .await
            }
            Operation::Remove => {
                self.pipeline
                    .remove(session, &spec.item_id, &spec.attachment_id, passphrase)
                    .await
            }
        }
    }
}
