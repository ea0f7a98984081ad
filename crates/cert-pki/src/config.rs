//! Trust-store configuration.
//!
//! Nothing in the engine reads global state: callers build a [`PkiConfig`]
//! (defaults, optionally overlaid with a JSON file) and pass values from it
//! into each request.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::keys::{KeyType, DEFAULT_KEY_BITS};
use crate::types::{
    CertificateOptions, DEFAULT_INTERMEDIATE_VALIDITY_DAYS, DEFAULT_LEAF_VALIDITY_DAYS,
    DEFAULT_ROOT_VALIDITY_DAYS,
};

/// Directory name used under the user's data directory.
pub const APP_DIR_NAME: &str = "cert-helper";

/// Organization given to root CAs whose subject has none.
pub const DEFAULT_ORGANIZATION: &str = "cert-helper CA";

/// Trust-store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PkiConfig {
    /// Trust-store base directory.
    pub output_dir: PathBuf,
    /// Root CA validity in days.
    pub root_validity_days: u32,
    /// Intermediate CA validity in days.
    pub intermediate_validity_days: u32,
    /// Leaf validity in days.
    pub leaf_validity_days: u32,
    /// Leaf key algorithm.
    pub key_type: KeyType,
    /// RSA modulus size for every issuance.
    pub key_bits: u32,
    /// Organization applied to root CAs without one.
    pub default_organization: String,
}

impl Default for PkiConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            root_validity_days: DEFAULT_ROOT_VALIDITY_DAYS,
            intermediate_validity_days: DEFAULT_INTERMEDIATE_VALIDITY_DAYS,
            leaf_validity_days: DEFAULT_LEAF_VALIDITY_DAYS,
            key_type: KeyType::Rsa,
            key_bits: DEFAULT_KEY_BITS,
            default_organization: DEFAULT_ORGANIZATION.to_string(),
        }
    }
}

impl PkiConfig {
    /// Loads a configuration file; missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, is not valid
    /// JSON, or holds invalid values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {e}", path.display())))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("failed to parse {}: {e}", path.display())))?;
        config.validate()?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Checks that every validity period is positive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] naming the first bad field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("root_validity_days", self.root_validity_days),
            ("intermediate_validity_days", self.intermediate_validity_days),
            ("leaf_validity_days", self.leaf_validity_days),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{field} must be greater than 0")));
            }
        }
        Ok(())
    }

    /// Leaf options derived from this configuration.
    #[must_use]
    pub fn leaf_options(&self) -> CertificateOptions {
        CertificateOptions {
            key_bits: self.key_bits,
            key_type: self.key_type,
            ..CertificateOptions::default()
        }
    }
}

/// Returns `<data dir>/cert-helper`, or `./cert-helper` if there is no data dir.
#[must_use]
pub fn default_output_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}
