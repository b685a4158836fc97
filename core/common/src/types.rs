//! Common types used throughout bw-sshkeys.

use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

macro_rules! vault_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Create a new ", $label, " from a string.")]
            ///
            /// # Errors
            /// - Returns error if id is empty
            pub fn new(id: impl Into<String>) -> crate::Result<Self> {
                let id = id.into();
                if id.is_empty() {
                    return Err(crate::Error::InvalidInput(
                        concat!($label, " cannot be empty").to_string(),
                    ));
                }
                Ok(Self(id))
            }

            /// Get the inner string value.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

vault_id!(
    /// Identifier of a vault folder.
    FolderId,
    "FolderId"
);

vault_id!(
    /// Identifier of a vault item.
    ItemId,
    "ItemId"
);

vault_id!(
    /// Identifier of an attachment within a vault item.
    AttachmentId,
    "AttachmentId"
);

/// Vault session token.
///
/// Valid for a single invocation. The core never persists it; callers may
/// export it into their own environment for reuse.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionToken(String);

impl SessionToken {
    /// Create a session token, trimming surrounding whitespace.
    ///
    /// # Errors
    /// - Returns error if the token is empty after trimming
    pub fn new(token: impl Into<String>) -> crate::Result<Self> {
        let mut token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            token.zeroize();
            return Err(crate::Error::InvalidInput(
                "Session token cannot be empty".to_string(),
            ));
        }
        let value = trimmed.to_string();
        token.zeroize();
        Ok(Self(value))
    }

    /// Get the token string.
    ///
    /// # Security
    /// The returned slice should be handed to a child process and not stored.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken([REDACTED])")
    }
}

/// Passphrase for a private key or vault master password.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase(String);

impl Passphrase {
    /// Wrap a passphrase.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the passphrase string.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Get the passphrase bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Passphrase([REDACTED])")
    }
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Append a trailing newline unless the data already ends with one.
    ///
    /// `ssh-add` and `ssh-keygen` refuse keys whose final line is unterminated.
    pub fn ensure_trailing_newline(&mut self) {
        if self.0.last() != Some(&b'\n') {
            self.0.push(b'\n');
        }
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}
