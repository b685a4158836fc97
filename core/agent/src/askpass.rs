//! Askpass passphrase handoff.
//!
//! OpenSSH tools ask for passphrases by running the program named in
//! `SSH_ASKPASS` and reading its stdout. When a key has a passphrase, the
//! agent child is pointed at the `bw-ssh-askpass` helper and the passphrase is
//! placed in [`ASKPASS_PASSPHRASE_ENV`] of that child only. The helper prints
//! the variable and exits.
//!
//! Without a passphrase the prompt is disabled outright so the agent fails
//! instead of waiting on a terminal. When the agent rejects the stored
//! passphrase it prompts again with a retry prompt; the helper refuses to
//! answer that one so the agent gives up on the key.

use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use zeroize::Zeroizing;

use bwkeys_common::{Error, Passphrase, Result};

/// Variable carrying the passphrase from the orchestrator to the helper.
pub const ASKPASS_PASSPHRASE_ENV: &str = "BW_SSH_ASKPASS_PASSPHRASE";

/// Default helper binary name.
pub const ASKPASS_BINARY: &str = "bw-ssh-askpass";

/// Start of the prompt OpenSSH shows after a rejected passphrase.
pub const RETRY_PROMPT_PREFIX: &str = "Bad passphrase";

const SSH_ASKPASS: &str = "SSH_ASKPASS";
const SSH_ASKPASS_REQUIRE: &str = "SSH_ASKPASS_REQUIRE";
const DISPLAY: &str = "DISPLAY";

/// Configures child processes to use the askpass helper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskpassHelper {
    program: PathBuf,
}

impl AskpassHelper {
    /// Use `program` as the helper.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Find the helper next to the running executable.
    ///
    /// Falls back to the bare binary name, resolved through `PATH` by the
    /// agent when it runs the helper.
    pub fn locate() -> Self {
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let candidate = dir.join(ASKPASS_BINARY);
                if candidate.is_file() {
                    return Self::new(candidate);
                }
            }
        }
        Self::new(ASKPASS_BINARY)
    }

    /// Helper program path.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Prepare `cmd` for a key with or without a passphrase.
    pub fn configure(&self, cmd: &mut Command, passphrase: Option<&Passphrase>) {
        match passphrase.filter(|p| !p.is_empty()) {
            Some(passphrase) => {
                cmd.env(SSH_ASKPASS, &self.program)
                    .env(SSH_ASKPASS_REQUIRE, "force")
                    .env(ASKPASS_PASSPHRASE_ENV, passphrase.expose());
                // OpenSSH releases without SSH_ASKPASS_REQUIRE only consult
                // the helper when a display is set.
                if std::env::var_os(DISPLAY).is_none() {
                    cmd.env(DISPLAY, ":0");
                }
            }
            None => {
                cmd.env(SSH_ASKPASS_REQUIRE, "never")
                    .env_remove(SSH_ASKPASS)
                    .env_remove(ASKPASS_PASSPHRASE_ENV);
            }
        }
    }
}

impl Default for AskpassHelper {
    fn default() -> Self {
        Self::locate()
    }
}

/// Helper side of the contract: print the passphrase from the environment.
///
/// `prompt` is the text the agent asked with, if any.
///
/// # Errors
/// - `Error::Agent` if the agent already rejected the passphrase
/// - `Error::InvalidInput` if no passphrase was provided
/// - Output failures
pub fn respond(prompt: Option<&str>, out: &mut dyn Write) -> Result<()> {
    let passphrase = std::env::var(ASKPASS_PASSPHRASE_ENV).ok().map(Zeroizing::new);
    respond_with(prompt, passphrase.as_deref().map(String::as_str), out)
}

/// Print `passphrase` followed by a newline, unless `prompt` is a retry.
pub fn respond_with(
    prompt: Option<&str>,
    passphrase: Option<&str>,
    out: &mut dyn Write,
) -> Result<()> {
    if prompt.is_some_and(|p| p.trim_start().starts_with(RETRY_PROMPT_PREFIX)) {
        return Err(Error::Agent("stored passphrase was rejected".to_string()));
    }
    let passphrase = passphrase.ok_or_else(|| {
        Error::InvalidInput(format!("{} is not set", ASKPASS_PASSPHRASE_ENV))
    })?;
    writeln!(out, "{}", passphrase)?;
    out.flush()?;
    Ok(())
}
