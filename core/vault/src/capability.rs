//! Vault CLI capability detection.
//!
//! Some flags only exist in newer `bw` releases. The version is detected once
//! and each feature answer is cached for the lifetime of the backend, which
//! is the lifetime of the run.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tokio::sync::OnceCell;
use tracing::debug;

use bwkeys_common::{Error, Result};

/// CLI features whose availability depends on the installed version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// `--nointeraction` global flag.
    NoInteraction,
    /// `--passwordenv` option on `login` and `unlock`.
    PasswordEnv,
}

impl Feature {
    /// First version that ships the feature.
    pub fn minimum_version(&self) -> CliVersion {
        match self {
            Feature::NoInteraction => CliVersion::new(1, 9, 0),
            Feature::PasswordEnv => CliVersion::new(1, 12, 0),
        }
    }
}

/// Parsed `major.minor.patch` version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CliVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl CliVersion {
    /// Create a version.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Parse the output of `bw --version`.
    ///
    /// Accepts both semantic (`1.22.1`) and calendar (`2024.6.0`) versions.
    /// Missing components count as zero; pre-release suffixes are ignored.
    ///
    /// # Errors
    /// - Returns error if no numeric major version is present
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim().trim_start_matches('v');
        let core = text.split(['-', '+', ' ']).next().unwrap_or_default();
        let mut parts = core.split('.').map(leading_number);

        let major = parts.next().flatten().ok_or_else(|| {
            Error::Backend(format!("Unrecognised vault CLI version: {:?}", text))
        })?;
        let minor = parts.next().flatten().unwrap_or(0);
        let patch = parts.next().flatten().unwrap_or(0);

        Ok(Self::new(major, minor, patch))
    }

    /// Whether this version provides the feature.
    pub fn supports(&self, feature: Feature) -> bool {
        *self >= feature.minimum_version()
    }
}

impl fmt::Display for CliVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

fn leading_number(part: &str) -> Option<u32> {
    let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

/// Write-once capability cache.
#[derive(Debug, Default)]
pub struct Capabilities {
    version: OnceCell<CliVersion>,
    features: Mutex<HashMap<Feature, bool>>,
}

impl Capabilities {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache with a known version, skipping detection.
    pub fn with_version(version: CliVersion) -> Self {
        Self {
            version: OnceCell::new_with(Some(version)),
            features: Mutex::new(HashMap::new()),
        }
    }

    /// Get the CLI version, running `detect` on first use only.
    pub async fn version<F, Fut>(&self, detect: F) -> Result<CliVersion>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<CliVersion>>,
    {
        self.version.get_or_try_init(detect).await.copied()
    }

    /// Whether `feature` is supported, probing the version on first use.
    pub async fn supports<F, Fut>(&self, feature: Feature, detect: F) -> Result<bool>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<CliVersion>>,
    {
        if let Some(known) = self.cached(feature) {
            return Ok(known);
        }

        let version = self.version(detect).await?;
        let supported = version.supports(feature);
        debug!(?feature, %version, supported, "Vault CLI capability");

        self.features
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(feature)
            .or_insert(supported);
        Ok(supported)
    }

    fn cached(&self, feature: Feature) -> Option<bool> {
        self.features
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&feature)
            .copied()
    }
}
