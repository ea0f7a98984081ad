//! PKI error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::Role;

/// Result type for PKI operations.
pub type Result<T> = std::result::Result<T, Error>;

/// PKI error variants.
#[derive(Debug, Error)]
pub enum Error {
    /// A required field is missing or a selector is malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The issuing CA could not be loaded from the trust store.
    #[error("{role} CA '{name}' is unavailable: {source}")]
    IssuerUnavailable {
        /// Role of the CA that failed to load.
        role: Role,
        /// Sanitized logical name of the CA.
        name: String,
        /// Underlying load failure.
        #[source]
        source: Box<Error>,
    },

    /// Key pair generation failed.
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    /// Encoding failed (IDNA, PEM, PKCS#12 or X.509 signing).
    #[error("encoding failed: {0}")]
    Encoding(String),

    /// A PEM file could not be decoded into a certificate or key.
    #[error("failed to decode {}: {reason}", path.display())]
    Decode {
        /// File that was being read.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Filesystem operation failed.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        /// Path of the file or directory involved.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Certificate parsing failed.
    #[error("certificate parsing failed: {0}")]
    Parse(String),

    /// Certificate is outside its validity window.
    #[error("certificate is not valid at this time: {0}")]
    Validity(String),

    /// Invalid certificate chain.
    #[error("invalid certificate chain: {0}")]
    InvalidChain(String),

    /// Signature verification failed.
    #[error("signature verification failed: {0}")]
    SignatureVerification(String),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Wraps an I/O error with the path it occurred on.
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Wraps a load failure as an unusable issuer.
    pub(crate) fn issuer_unavailable(role: Role, name: impl Into<String>, source: Self) -> Self {
        Self::IssuerUnavailable {
            role,
            name: name.into(),
            source: Box::new(source),
        }
    }

    /// Returns true if this error means the issuing CA could not be used.
    #[must_use]
    pub const fn is_issuer_unavailable(&self) -> bool {
        matches!(self, Self::IssuerUnavailable { .. })
    }
}
