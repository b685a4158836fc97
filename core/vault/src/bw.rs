//! `bw` command line backend.
//!
//! Every operation is a single child process. The session token and master
//! password are handed over through environment variables scoped to that
//! child; attachment content is read from the child's stdout pipe. Nothing is
//! written to disk.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};
use tokio::process::Command;
use tracing::{debug, warn};
use zeroize::Zeroize;

use bwkeys_common::{
    AttachmentId, Error, FolderId, ItemId, Passphrase, Result, SensitiveBytes, SessionToken,
};

use crate::backend::{Folder, VaultBackend};
use crate::capability::{Capabilities, CliVersion, Feature};
use crate::item::Item;

/// Environment variable `bw` reads the session token from.
pub const BW_SESSION_ENV: &str = "BW_SESSION";

/// Environment variable used to hand the master password to `bw`.
pub const BW_PASSWORD_ENV: &str = "BW_PASSWORD";

/// Vault backend driving the Bitwarden CLI.
pub struct BwCli {
    program: PathBuf,
    capabilities: Capabilities,
}

impl BwCli {
    /// Create a backend running `program` (usually `bw`).
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            capabilities: Capabilities::new(),
        }
    }

    /// Create a backend with a known CLI version, skipping the version detect.
    pub fn with_version(program: impl Into<PathBuf>, version: CliVersion) -> Self {
        Self {
            program: program.into(),
            capabilities: Capabilities::with_version(version),
        }
    }

    /// Program this backend runs.
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Installed CLI version, detected once per backend.
    pub async fn version(&self) -> Result<CliVersion> {
        self.capabilities.version(|| self.detect_version()).await
    }

    async fn detect_version(&self) -> Result<CliVersion> {
        let output = self.base_command().arg("--version").output().await?;
        if !output.status.success() {
            return Err(Error::Backend(format!(
                "Unable to fetch vault CLI version: {}",
                stderr_text(&output)
            )));
        }
        CliVersion::parse(&String::from_utf8_lossy(&output.stdout))
    }

    async fn supports(&self, feature: Feature) -> Result<bool> {
        self.capabilities
            .supports(feature, || self.detect_version())
            .await
    }

    fn base_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Build a command with the global flags the installed CLI supports.
    ///
    /// `raw` places `--raw` before the subcommand, as `login`/`unlock` expect.
    pub async fn command(&self, raw: bool) -> Result<Command> {
        let mut cmd = self.base_command();
        if raw {
            cmd.arg("--raw");
        }
        if self.supports(Feature::NoInteraction).await? {
            cmd.arg("--nointeraction");
        }
        Ok(cmd)
    }

    /// Build a command authenticated with `session`.
    async fn session_command(&self, session: &SessionToken) -> Result<Command> {
        let mut cmd = self.command(false).await?;
        cmd.env(BW_SESSION_ENV, session.expose());
        Ok(cmd)
    }

    /// Run an authentication exchange and read the raw token from stdout.
    async fn authenticate(&self, mut cmd: Command, password: &Passphrase) -> Result<SessionToken> {
        if self.supports(Feature::PasswordEnv).await? {
            cmd.args(["--passwordenv", BW_PASSWORD_ENV])
                .env(BW_PASSWORD_ENV, password.expose());
        } else {
            warn!("Vault CLI predates --passwordenv; passing the password as an argument");
            cmd.arg(password.expose());
        }

        let mut output = cmd.output().await?;
        if !output.status.success() {
            let message = stderr_text(&output);
            output.stdout.zeroize();
            return Err(Error::Auth(message));
        }

        let raw = String::from_utf8(std::mem::take(&mut output.stdout))
            .map_err(|_| Error::Auth("Vault CLI returned a non UTF-8 session token".to_string()))?;
        SessionToken::new(raw)
            .map_err(|_| Error::Auth("Vault CLI returned an empty session token".to_string()))
    }

    async fn run_json<T: serde::de::DeserializeOwned>(&self, mut cmd: Command) -> Result<T> {
        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(Error::Backend(stderr_text(&output)));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl Default for BwCli {
    fn default() -> Self {
        Self::new("bw")
    }
}

#[async_trait]
impl VaultBackend for BwCli {
    fn name(&self) -> &str {
        "bw"
    }

    async fn is_logged_in(&self) -> Result<bool> {
        let status = self
            .base_command()
            .args(["login", "--check", "--quiet"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        debug!(logged_in = status.success(), "Vault login check");
        Ok(status.success())
    }

    async fn login(&self, email: &str, password: &Passphrase) -> Result<SessionToken> {
        let mut cmd = self.command(true).await?;
        cmd.args(["login", email]);
        self.authenticate(cmd, password).await
    }

    async fn unlock(&self, password: &Passphrase) -> Result<SessionToken> {
        let mut cmd = self.command(true).await?;
        cmd.arg("unlock");
        self.authenticate(cmd, password).await
    }

    async fn search_folders(&self, session: &SessionToken, name: &str) -> Result<Vec<Folder>> {
        let mut cmd = self.session_command(session).await?;
        cmd.args(["list", "folders", "--search", name]);
        self.run_json(cmd).await
    }

    async fn list_items(&self, session: &SessionToken, folder: &FolderId) -> Result<Vec<Item>> {
        let mut cmd = self.session_command(session).await?;
        cmd.args(["list", "items", "--folderid", folder.as_str()]);
        self.run_json(cmd).await
    }

    async fn get_attachment(
        &self,
        session: &SessionToken,
        item: &ItemId,
        attachment: &AttachmentId,
    ) -> Result<SensitiveBytes> {
        let mut cmd = self.session_command(session).await?;
        cmd.args([
            "get",
            "attachment",
            attachment.as_str(),
            "--itemid",
            item.as_str(),
            "--raw",
        ]);

        let mut output: Output = cmd.output().await.map_err(|e| {
            Error::Retrieval(format!("Failed to run {}: {}", self.program.display(), e))
        })?;
        if !output.status.success() {
            output.stdout.zeroize();
            return Err(Error::Retrieval(stderr_text(&output)));
        }
        Ok(SensitiveBytes::new(std::mem::take(&mut output.stdout)))
    }
}

/// Backend diagnostics, trimmed, with a fallback when stderr is empty.
fn stderr_text(output: &Output) -> String {
    let text = String::from_utf8_lossy(&output.stderr).trim().to_string();
    if text.is_empty() {
        format!("vault CLI exited with {}", output.status)
    } else {
        text
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write a fake `bw` shell script into a temp dir.
    fn fake_bw(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("bw");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn session() -> SessionToken {
        SessionToken::new("tok-123").unwrap()
    }

    #[tokio::test]
    async fn test_version_detection() {
        let dir = TempDir::new().unwrap();
        let bw = BwCli::new(fake_bw(&dir, "echo 2024.6.0"));
        assert_eq!(bw.version().await.unwrap(), CliVersion::new(2024, 6, 0));
    }

    #[tokio::test]
    async fn test_login_check_uses_exit_status() {
        let dir = TempDir::new().unwrap();
        let bw = BwCli::new(fake_bw(&dir, "exit 1"));
        assert!(!bw.is_logged_in().await.unwrap());

        let dir = TempDir::new().unwrap();
        let bw = BwCli::new(fake_bw(&dir, "exit 0"));
        assert!(bw.is_logged_in().await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_reads_password_from_env() {
        let dir = TempDir::new().unwrap();
        let script = r#"
for arg in "$@"; do
  if [ "$arg" = "unlock" ]; then
    if [ "$BW_PASSWORD" = "master" ]; then printf 'raw-token'; exit 0; fi
    echo "Invalid master password." >&2; exit 1
  fi
done
exit 2"#;
        let bw = BwCli::with_version(fake_bw(&dir, script), CliVersion::new(2024, 1, 0));

        let token = bw.unlock(&Passphrase::new("master")).await.unwrap();
        assert_eq!(token.expose(), "raw-token");

        let err = bw.unlock(&Passphrase::new("wrong")).await.unwrap_err();
        match err {
            Error::Auth(message) => assert_eq!(message, "Invalid master password."),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_passed_through_env() {
        let dir = TempDir::new().unwrap();
        let script = r#"
if [ "$BW_SESSION" != "tok-123" ]; then echo "You are not logged in." >&2; exit 1; fi
echo '[{"object":"folder","id":"f-1","name":"ssh-agent"},{"object":"folder","id":"f-2","name":"ssh-agent-old"}]'"#;
        let bw = BwCli::with_version(fake_bw(&dir, script), CliVersion::new(2024, 1, 0));

        let folders = bw.search_folders(&session(), "ssh-agent").await.unwrap();
        assert_eq!(folders.len(), 2);
        assert_eq!(folders[1].name, "ssh-agent-old");
    }

    #[tokio::test]
    async fn test_attachment_streamed_from_stdout() {
        let dir = TempDir::new().unwrap();
        let script = r#"
case "$*" in
  *"get attachment att1 --itemid item-1 --raw"*) printf 'KEYDATA' ;;
  *) echo "Attachment not found." >&2; exit 1 ;;
esac"#;
        let bw = BwCli::with_version(fake_bw(&dir, script), CliVersion::new(1, 8, 0));
        let item = ItemId::new("item-1").unwrap();

        let bytes = bw
            .get_attachment(&session(), &item, &AttachmentId::new("att1").unwrap())
            .await
            .unwrap();
        assert_eq!(bytes.as_bytes(), b"KEYDATA");

        let err = bw
            .get_attachment(&session(), &item, &AttachmentId::new("att2").unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Retrieval(ref m) if m == "Attachment not found."));
    }

    #[tokio::test]
    async fn test_nointeraction_follows_version() {
        let dir = TempDir::new().unwrap();
        let script = r#"
case "$1" in
  --nointeraction) echo '[]' ;;
  *) echo "unexpected: $*" >&2; exit 1 ;;
esac"#;
        let path = fake_bw(&dir, script);

        let modern = BwCli::with_version(&path, CliVersion::new(1, 9, 0));
        assert!(modern.search_folders(&session(), "x").await.unwrap().is_empty());

        let legacy = BwCli::with_version(&path, CliVersion::new(1, 8, 0));
        assert!(matches!(
            legacy.search_folders(&session(), "x").await,
            Err(Error::Backend(_))
        ));
    }
}
