//! SSH agent registration.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use bwkeys_common::{Error, Passphrase, Result, SensitiveBytes};

use crate::askpass::AskpassHelper;
use crate::pubkey::verify_passphrase;

/// Agent that keys can be registered with and removed from.
#[async_trait]
pub trait IdentityAgent: Send + Sync {
    /// Register a private key.
    ///
    /// # Errors
    /// - `Error::Agent` with the agent's diagnostics
    async fn add_identity(&self, key: &SensitiveBytes, passphrase: Option<&Passphrase>)
        -> Result<()>;

    /// Remove the identity matching an OpenSSH public key line.
    ///
    /// # Errors
    /// - `Error::Agent` with the agent's diagnostics, including when the key
    ///   was never added
    async fn remove_identity(&self, public_key: &str, passphrase: Option<&Passphrase>)
        -> Result<()>;
}

/// Agent driven through the `ssh-add` program.
///
/// Keys are written to `ssh-add -` over stdin; the agent socket is taken from
/// the ambient `SSH_AUTH_SOCK`.
#[derive(Debug, Clone)]
pub struct SshAdd {
    program: PathBuf,
    askpass: AskpassHelper,
    lifetime: Option<u32>,
    confirm: bool,
}

impl SshAdd {
    /// Create an agent running `program` (usually `ssh-add`).
    pub fn new(program: impl Into<PathBuf>, askpass: AskpassHelper) -> Self {
        Self {
            program: program.into(),
            askpass,
            lifetime: None,
            confirm: false,
        }
    }

    /// Limit how long added keys stay in the agent.
    pub fn with_lifetime(mut self, seconds: Option<u32>) -> Self {
        self.lifetime = seconds;
        self
    }

    /// Require confirmation for every use of added keys.
    pub fn with_confirm(mut self, confirm: bool) -> Self {
        self.confirm = confirm;
        self
    }

    /// Program this agent runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for adding a key from stdin.
    pub fn add_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(lifetime) = self.lifetime {
            args.push("-t".to_string());
            args.push(lifetime.to_string());
        }
        if self.confirm {
            args.push("-c".to_string());
        }
        args.push("-".to_string());
        args
    }

    /// Arguments for removing a key read from stdin.
    pub fn remove_args(&self) -> Vec<String> {
        vec!["-d".to_string(), "-".to_string()]
    }

    /// Run the program with `input` on stdin.
    async fn run(
        &self,
        args: &[String],
        input: &[u8],
        passphrase: Option<&Passphrase>,
    ) -> Result<()> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        self.askpass.configure(&mut cmd, passphrase);

        debug!(program = %self.program.display(), ?args, "Running agent command");
        let mut child = cmd.spawn().map_err(|e| {
            Error::Agent(format!("Failed to run {}: {}", self.program.display(), e))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            // A child that exits early closes the pipe; its status explains why.
            if let Err(e) = stdin.write_all(input).await {
                debug!("Agent closed stdin early: {}", e);
            }
            drop(stdin);
        }

        let output = child.wait_with_output().await.map_err(|e| {
            Error::Agent(format!("Failed to wait for {}: {}", self.program.display(), e))
        })?;
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(Error::Agent(if stderr.is_empty() {
                format!("{} exited with {}", self.program.display(), output.status)
            } else {
                stderr
            }));
        }
        if !stderr.is_empty() {
            debug!("{}", stderr);
        }
        Ok(())
    }
}

#[async_trait]
impl IdentityAgent for SshAdd {
    async fn add_identity(
        &self,
        key: &SensitiveBytes,
        passphrase: Option<&Passphrase>,
    ) -> Result<()> {
        // ssh-add keeps prompting while the passphrase is wrong.
        if let Some(passphrase) = passphrase.filter(|p| !p.is_empty()) {
            verify_passphrase(key, passphrase)?;
        }
        self.run(&self.add_args(), key.as_bytes(), passphrase).await
    }

    async fn remove_identity(
        &self,
        public_key: &str,
        passphrase: Option<&Passphrase>,
    ) -> Result<()> {
        let mut line = public_key.trim_end().to_string();
        line.push('\n');
        self.run(&self.remove_args(), line.as_bytes(), passphrase).await
    }
}
