//! Vault session resolution.
//!
//! A session token is obtained once per run, in this order:
//! 1. a token supplied by the caller
//! 2. the ambient `BW_SESSION` environment variable
//! 3. an interactive login (not logged in) or unlock (logged in, locked)
//!
//! Freshly obtained tokens are echoed to the caller as an `export` line so
//! they can be reused by later invocations. The resolver never stores them.

use std::io::Write;
use tracing::{debug, info};

use bwkeys_common::{Error, Passphrase, Result, SessionToken};

use crate::backend::VaultBackend;

/// Environment variable holding a reusable session token.
pub const SESSION_ENV: &str = "BW_SESSION";

/// Source of interactive credentials.
pub trait Prompter {
    /// Ask for the account identity (email address).
    fn identity(&self, prompt: &str) -> Result<String>;

    /// Ask for a secret without echoing it.
    fn secret(&self, prompt: &str) -> Result<Passphrase>;
}

/// Where a resolved session came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionSource {
    /// Supplied by the caller.
    Explicit,
    /// Taken from the environment.
    Environment,
    /// Obtained by logging in.
    Login,
    /// Obtained by unlocking a logged-in vault.
    Unlock,
}

impl SessionSource {
    /// Whether the token was created during this run.
    pub fn is_fresh(&self) -> bool {
        matches!(self, SessionSource::Login | SessionSource::Unlock)
    }
}

/// Resolves a usable session token.
pub struct SessionResolver<'a> {
    backend: &'a dyn VaultBackend,
    prompter: &'a dyn Prompter,
    ambient: Option<String>,
}

impl<'a> SessionResolver<'a> {
    /// Create a resolver reading the ambient token from `BW_SESSION`.
    pub fn new(backend: &'a dyn VaultBackend, prompter: &'a dyn Prompter) -> Self {
        Self {
            backend,
            prompter,
            ambient: std::env::var(SESSION_ENV).ok(),
        }
    }

    /// Replace the ambient token.
    pub fn with_ambient(mut self, ambient: Option<String>) -> Self {
        self.ambient = ambient;
        self
    }

    /// Resolve a session token.
    ///
    /// # Postconditions
    /// - For a fresh token, an `export BW_SESSION=...` line has been written
    ///   to `out`
    ///
    /// # Errors
    /// - `Error::Auth` if login or unlock fails
    /// - Prompt or output I/O failures
    pub async fn resolve(
        &self,
        explicit: Option<&str>,
        out: &mut dyn Write,
    ) -> Result<(SessionToken, SessionSource)> {
        if let Some(token) = explicit.and_then(|t| SessionToken::new(t).ok()) {
            debug!("Using caller supplied vault session");
            return Ok((token, SessionSource::Explicit));
        }

        if let Some(token) = self
            .ambient
            .as_deref()
            .and_then(|t| SessionToken::new(t).ok())
        {
            debug!("Existing vault session found in {}", SESSION_ENV);
            return Ok((token, SessionSource::Environment));
        }

        let (token, source) = if self.backend.is_logged_in().await? {
            info!("Vault is locked, unlocking");
            let password = self.prompter.secret("Vault master password: ")?;
            (self.backend.unlock(&password).await?, SessionSource::Unlock)
        } else {
            info!("Not logged into the vault, logging in");
            let email = self.prompter.identity("Vault user: ")?;
            if email.trim().is_empty() {
                return Err(Error::Auth("no vault user given".to_string()));
            }
            let password = self.prompter.secret("Vault master password: ")?;
            (
                self.backend.login(email.trim(), &password).await?,
                SessionSource::Login,
            )
        };

        writeln!(out, "export {}=\"{}\"", SESSION_ENV, token.expose())?;
        out.flush()?;

        Ok((token, source))
    }
}
