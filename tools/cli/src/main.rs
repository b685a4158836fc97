//! bw-add-sshkeys - Load SSH keys stored in a Bitwarden vault into the agent.
//!
//! Keys live as attachments on items in a vault folder. Each item names its
//! private key attachment in a custom field and may carry a passphrase in
//! another. The tool resolves a vault session, walks the folder and adds
//! (or removes) every key it finds.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use bwkeys_agent::{AskpassHelper, PublicKeyDeriver, SshAdd};
use bwkeys_common::{Error, Operation, Passphrase, RunConfig};
use bwkeys_reconcile::Reconciler;
use bwkeys_vault::{BwCli, Prompter, SessionResolver};

/// Exit code when items existed but no key could be processed.
const NO_KEY_EXIT: u8 = 5;

/// Exit code for errors without a more specific class.
const GENERIC_EXIT: u8 = 1;

#[derive(Parser)]
#[command(name = "bw-add-sshkeys")]
#[command(about = "Add SSH keys stored in a Bitwarden vault to the SSH agent")]
#[command(version)]
struct Cli {
    /// Show debug output.
    #[arg(short, long)]
    debug: bool,

    /// Folder name to use to search for SSH keys [default: ssh-agent].
    #[arg(short, long)]
    foldername: Option<String>,

    /// Custom field name where the private key filename is stored [default: private].
    #[arg(short = 'c', long)]
    customfield: Option<String>,

    /// Custom field name where the key passphrase is stored [default: passphrase].
    #[arg(short, long)]
    passphrasefield: Option<String>,

    /// Use the login password as the key passphrase (requires --entry).
    #[arg(short, long)]
    login_password: bool,

    /// Only load the key of the item with this name.
    #[arg(short, long)]
    entry: Option<String>,

    /// Use the entry name as the attachment file name (requires --entry).
    #[arg(long)]
    assume_filename: bool,

    /// Vault session token, instead of BW_SESSION or an interactive login.
    #[arg(short, long)]
    session: Option<String>,

    /// Add keys to the agent (the default).
    #[arg(long)]
    add: bool,

    /// Remove keys from the agent instead of adding them.
    #[arg(short, long)]
    remove: bool,

    /// Lifetime of added keys, in seconds.
    #[arg(short = 't', long)]
    lifetime: Option<u32>,

    /// Require confirmation for each use of added keys.
    #[arg(long)]
    confirm: bool,

    /// JSON configuration file; flags take precedence over its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Vault CLI program.
    #[arg(long)]
    bw_binary: Option<PathBuf>,

    /// ssh-add program.
    #[arg(long)]
    ssh_add_binary: Option<PathBuf>,

    /// ssh-keygen program, used for keys not in OpenSSH format.
    #[arg(long)]
    ssh_keygen_binary: Option<PathBuf>,

    /// Passphrase helper [default: bw-ssh-askpass next to this program].
    #[arg(long)]
    askpass: Option<PathBuf>,

    /// Print shell completions and exit.
    #[arg(long, value_enum)]
    completions: Option<Shell>,
}

impl Cli {
    /// Layer flags over the optional configuration file.
    fn run_config(&self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => load_config(path)?,
            None => RunConfig::default(),
        };

        if let Some(folder) = &self.foldername {
            config.folder = folder.clone();
        }
        if let Some(field) = &self.customfield {
            config.params.key_field = field.clone();
        }
        if let Some(field) = &self.passphrasefield {
            config.params.passphrase_field = field.clone();
        }
        if self.login_password {
            config.params.password_as_passphrase = true;
        }
        if let Some(entry) = &self.entry {
            config.params.entry = Some(entry.clone());
        }
        if self.assume_filename {
            config.params.assume_filename = true;
        }
        if self.add || self.remove {
            config.operation = Operation::from_flags(self.add, self.remove)?;
        }
        if self.lifetime.is_some() {
            config.lifetime = self.lifetime;
        }
        if self.confirm {
            config.confirm = true;
        }
        if let Some(program) = &self.bw_binary {
            config.bw_program = program.clone();
        }
        if let Some(program) = &self.ssh_add_binary {
            config.ssh_add_program = program.clone();
        }
        if let Some(program) = &self.ssh_keygen_binary {
            config.ssh_keygen_program = program.clone();
        }
        if let Some(program) = &self.askpass {
            config.askpass_program = Some(program.clone());
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_config(path: &Path) -> Result<RunConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(Error::from)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = RunConfig::from_json(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    Ok(config)
}

/// Terminal prompts for the vault login.
struct TtyPrompter;

impl Prompter for TtyPrompter {
    fn identity(&self, prompt: &str) -> bwkeys_common::Result<String> {
        let mut stderr = io::stderr();
        write!(stderr, "{}", prompt)?;
        stderr.flush()?;
        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    fn secret(&self, prompt: &str) -> bwkeys_common::Result<Passphrase> {
        Ok(Passphrase::new(rpassword::prompt_password(prompt)?))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut command = Cli::command();
        clap_complete::generate(shell, &mut command, "bw-add-sshkeys", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    // Setup logging
    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    match run(&cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(NO_KEY_EXIT),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

/// Run one reconciliation; `Ok(false)` when no key could be processed.
async fn run(cli: &Cli) -> Result<bool> {
    let config = cli.run_config()?;
    let operation = config.operation;

    let askpass = config
        .askpass_program
        .clone()
        .map(AskpassHelper::new)
        .unwrap_or_else(AskpassHelper::locate);
    let backend = BwCli::new(&config.bw_program);
    let agent = SshAdd::new(&config.ssh_add_program, askpass.clone())
        .with_lifetime(config.lifetime)
        .with_confirm(config.confirm);
    let deriver = PublicKeyDeriver::new(&config.ssh_keygen_program, askpass);
    let reconciler = Reconciler::new(&backend, &agent, &deriver, config)?;

    let prompter = TtyPrompter;
    let (session, source) = SessionResolver::new(&backend, &prompter)
        .resolve(cli.session.as_deref(), &mut io::stdout())
        .await
        .context("Could not obtain a vault session")?;
    if source.is_fresh() {
        info!("Vault session created; export the line above to reuse it");
    }

    let report = reconciler.run(&session).await?;
    if !report.is_success() {
        error!("No key could be processed ({})", operation.verb());
    }
    Ok(report.is_success())
}

/// Map an aborted run to a process exit code.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<Error>())
        .map(Error::exit_code)
        .unwrap_or(GENERIC_EXIT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(args: &[&str]) -> Cli {
        let mut argv = vec!["bw-add-sshkeys"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]).run_config().unwrap();
        assert_eq!(config.folder, "ssh-agent");
        assert_eq!(config.params.key_field, "private");
        assert_eq!(config.params.passphrase_field, "passphrase");
        assert_eq!(config.operation, Operation::Add);
    }

    #[test]
    fn test_short_flags() {
        let config = parse(&["-f", "keys", "-c", "key", "-p", "pw", "-r", "-e", "prod", "-l"])
            .run_config()
            .unwrap();
        assert_eq!(config.folder, "keys");
        assert_eq!(config.params.key_field, "key");
        assert_eq!(config.params.passphrase_field, "pw");
        assert_eq!(config.params.entry.as_deref(), Some("prod"));
        assert!(config.params.password_as_passphrase);
        assert_eq!(config.operation, Operation::Remove);
    }

    #[test]
    fn test_add_and_remove_is_misconfiguration() {
        let err = parse(&["--add", "--remove"]).run_config().unwrap_err();
        assert_eq!(exit_code(&err), 64);
    }

    #[test]
    fn test_assume_filename_requires_entry() {
        let err = parse(&["--assume-filename"]).run_config().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::Misconfiguration(_))
        ));
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"folder": "from-file", "lifetime": 300, "params": {"key_field": "file-key"}}"#,
        )
        .unwrap();

        let config = parse(&["--config", path.to_str().unwrap(), "-f", "from-flag"])
            .run_config()
            .unwrap();
        assert_eq!(config.folder, "from-flag");
        assert_eq!(config.lifetime, Some(300));
        assert_eq!(config.params.key_field, "file-key");
        assert_eq!(config.params.passphrase_field, "passphrase");
    }

    #[test]
    fn test_invalid_config_file_maps_to_serialization_exit() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let err = parse(&["--config", path.to_str().unwrap()])
            .run_config()
            .unwrap_err();
        assert_eq!(exit_code(&err), 3);
    }

    #[test]
    fn test_missing_config_file_maps_to_io_exit() {
        let err = parse(&["--config", "/nonexistent/bw-sshkeys.json"])
            .run_config()
            .unwrap_err();
        assert_eq!(exit_code(&err), 74);
    }
}
