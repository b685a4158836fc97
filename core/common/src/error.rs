//! Common error types for bw-sshkeys.

use thiserror::Error;

/// Top-level error type for key loading operations.
///
/// Payloads carry the backend's own diagnostic text where one exists, so the
/// operator sees exactly what `bw` or `ssh-add` reported.
#[derive(Debug, Error)]
pub enum Error {
    /// Vault login or unlock exchange failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Folder or entry could not be found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// More than one folder matched the requested name.
    #[error("Ambiguous: {0}")]
    Ambiguous(String),

    /// Vault backend command failed outside of authentication.
    #[error("Vault backend error: {0}")]
    Backend(String),

    /// Attachment content could not be retrieved.
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// Agent registration or deregistration failed.
    #[error("Agent error: {0}")]
    Agent(String),

    /// Key material could not be parsed or decrypted.
    #[error("Key error: {0}")]
    Key(String),

    /// Invalid combination of options.
    #[error("Misconfiguration: {0}")]
    Misconfiguration(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Process exit code for a run aborted by this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::Auth(_) => 1,
            Error::NotFound(_) | Error::Ambiguous(_) => 2,
            Error::Backend(_) | Error::Serialization(_) => 3,
            Error::Retrieval(_) => 4,
            Error::Agent(_) | Error::Key(_) => 5,
            Error::Misconfiguration(_) | Error::InvalidInput(_) => 64,
            Error::Io(_) => 74,
        }
    }

    /// Whether the error only affects the item being processed.
    ///
    /// Everything else aborts the run.
    pub fn is_item_local(&self) -> bool {
        matches!(self, Error::Agent(_) | Error::Key(_))
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
