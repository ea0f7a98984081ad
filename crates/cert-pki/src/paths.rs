//! Name sanitization and trust-store path resolution.
//!
//! Layout under a base directory:
//!
//! ```text
//! ca.pem, ca.key                                   default root CA
//! ca/root/<root>/ca.pem|ca.key                     named root CAs
//! ca/intermediate/<root>/<name>/ca.pem|ca.key      intermediate CAs
//! certs/root/<root>/cert_<cn>.pem|.key|.pfx        leaves issued by a root
//! certs/intermediate/<root>/<name>/cert_<cn>.*     leaves issued by an intermediate
//! ```
//!
//! Every component derived from user input goes through [`sanitize_name`].

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::IssuerRef;

/// Name of the root CA stored directly under the base directory.
pub const DEFAULT_ROOT_NAME: &str = "default";
/// Fallback name for intermediates.
pub const DEFAULT_INTERMEDIATE_NAME: &str = "intermediate";
/// Fallback name for leaf files.
pub const DEFAULT_CERTIFICATE_NAME: &str = "certificate";

/// CA certificate file name.
pub const CA_CERT_FILE: &str = "ca.pem";
/// CA private key file name.
pub const CA_KEY_FILE: &str = "ca.key";

const CA_DIR: &str = "ca";
const CERTS_DIR: &str = "certs";
const ROOT_DIR: &str = "root";
const INTERMEDIATE_DIR: &str = "intermediate";
const LEAF_PREFIX: &str = "cert_";

/// Runs of characters outside `[A-Za-z0-9_-]`.
static UNSAFE_RUN_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\-]+").unwrap_or_else(|_| unreachable!()));

/// Turns a logical name into a filesystem-safe identifier.
///
/// Unsafe runs become a single `_`, leading and trailing `_` are trimmed,
/// and `fallback` is returned when nothing is left.
#[must_use]
pub fn sanitize_name(raw: &str, fallback: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return fallback.to_string();
    }
    let replaced = UNSAFE_RUN_REGEX.replace_all(trimmed, "_");
    let sanitized = replaced.trim_matches('_');
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized.to_string()
    }
}

/// Certificate and key locations of a CA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaPaths {
    /// Certificate PEM.
    pub cert: PathBuf,
    /// Private key PEM.
    pub key: PathBuf,
}

impl CaPaths {
    fn in_dir(dir: &Path) -> Self {
        Self {
            cert: dir.join(CA_CERT_FILE),
            key: dir.join(CA_KEY_FILE),
        }
    }

    /// Returns true if both files exist.
    #[must_use]
    pub fn exist(&self) -> bool {
        self.cert.is_file() && self.key.is_file()
    }
}

/// File locations of a leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafPaths {
    /// Certificate PEM.
    pub cert: PathBuf,
    /// Private key PEM.
    pub key: PathBuf,
    /// PKCS#12 bundle.
    pub pfx: PathBuf,
}

/// Resolves the files of a root CA.
///
/// The default root lives directly under `base`; every other root lives
/// under `ca/root/<name>/`.
#[must_use]
pub fn root_paths(base: &Path, name: &str) -> CaPaths {
    let name = sanitize_name(name, DEFAULT_ROOT_NAME);
    if name == DEFAULT_ROOT_NAME {
        return CaPaths::in_dir(base);
    }
    CaPaths::in_dir(&root_ca_dir(base).join(name))
}

/// Resolves the files of an intermediate CA.
#[must_use]
pub fn intermediate_paths(base: &Path, root_name: &str, name: &str) -> CaPaths {
    CaPaths::in_dir(
        &intermediate_ca_dir(base)
            .join(sanitize_name(root_name, DEFAULT_ROOT_NAME))
            .join(sanitize_name(name, DEFAULT_INTERMEDIATE_NAME)),
    )
}

/// Resolves the files of the CA an issuer reference points to.
#[must_use]
pub fn ca_paths(base: &Path, issuer: &IssuerRef) -> CaPaths {
    match issuer {
        IssuerRef::Root { name } => root_paths(base, name),
        IssuerRef::Intermediate { root_name, name } => intermediate_paths(base, root_name, name),
    }
}

/// Resolves the directory that holds leaves signed by `issuer`.
#[must_use]
pub fn cert_dir(base: &Path, issuer: &IssuerRef) -> PathBuf {
    let certs = base.join(CERTS_DIR);
    match issuer {
        IssuerRef::Root { name } => certs
            .join(ROOT_DIR)
            .join(sanitize_name(name, DEFAULT_ROOT_NAME)),
        IssuerRef::Intermediate { root_name, name } => certs
            .join(INTERMEDIATE_DIR)
            .join(sanitize_name(root_name, DEFAULT_ROOT_NAME))
            .join(sanitize_name(name, DEFAULT_INTERMEDIATE_NAME)),
    }
}

/// Resolves `cert_<cn>.pem|.key|.pfx` inside `dir`.
#[must_use]
pub fn leaf_paths(dir: &Path, common_name: &str) -> LeafPaths {
    let stem = format!(
        "{LEAF_PREFIX}{}",
        sanitize_name(common_name, DEFAULT_CERTIFICATE_NAME)
    );
    LeafPaths {
        cert: dir.join(format!("{stem}.pem")),
        key: dir.join(format!("{stem}.key")),
        pfx: dir.join(format!("{stem}.pfx")),
    }
}

/// Directory holding named root CAs.
#[must_use]
pub fn root_ca_dir(base: &Path) -> PathBuf {
    base.join(CA_DIR).join(ROOT_DIR)
}

/// Directory holding intermediate CAs, one subdirectory per root.
#[must_use]
pub fn intermediate_ca_dir(base: &Path) -> PathBuf {
    base.join(CA_DIR).join(INTERMEDIATE_DIR)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test_case("My CA! #1", "default", "My_CA_1" ; "punctuation runs")]
    #[test_case("   ", "default", "default" ; "blank")]
    #[test_case("!!!", "intermediate", "intermediate" ; "only unsafe")]
    #[test_case("__x__", "default", "x" ; "trims underscores")]
    #[test_case("web-01_prod", "default", "web-01_prod" ; "already safe")]
    #[test_case("bücher", "default", "b_cher" ; "non ascii")]
    #[test_case("../../etc", "default", "etc" ; "traversal")]
    fn sanitize(raw: &str, fallback: &str, expected: &str) {
        assert_eq!(sanitize_name(raw, fallback), expected);
    }

    #[test]
    fn default_root_lives_at_base() {
        let base = Path::new("/pki");
        let paths = root_paths(base, "");
        assert_eq!(paths.cert, Path::new("/pki/ca.pem"));
        assert_eq!(paths.key, Path::new("/pki/ca.key"));
        assert_eq!(root_paths(base, " default "), paths);
    }

    #[test]
    fn named_root_lives_under_ca_root() {
        let paths = root_paths(Path::new("/pki"), "Corp Root");
        assert_eq!(paths.cert, Path::new("/pki/ca/root/Corp_Root/ca.pem"));
        assert_eq!(paths.key, Path::new("/pki/ca/root/Corp_Root/ca.key"));
    }

    #[test]
    fn intermediate_keyed_by_root() {
        let paths = intermediate_paths(Path::new("/pki"), "", "mid");
        assert_eq!(paths.cert, Path::new("/pki/ca/intermediate/default/mid/ca.pem"));

        let paths = intermediate_paths(Path::new("/pki"), "corp", "");
        assert_eq!(paths.key, Path::new("/pki/ca/intermediate/corp/intermediate/ca.key"));
    }

    #[test]
    fn cert_dirs() {
        let base = Path::new("/pki");
        assert_eq!(
            cert_dir(base, &IssuerRef::default_root()),
            Path::new("/pki/certs/root/default")
        );
        let issuer = IssuerRef::intermediate("corp", "mid").unwrap();
        assert_eq!(cert_dir(base, &issuer), Path::new("/pki/certs/intermediate/corp/mid"));
        assert_eq!(ca_paths(base, &issuer), intermediate_paths(base, "corp", "mid"));
    }

    #[test]
    fn leaf_files() {
        let paths = leaf_paths(Path::new("/d"), "svc.local");
        assert_eq!(paths.cert, Path::new("/d/cert_svc_local.pem"));
        assert_eq!(paths.key, Path::new("/d/cert_svc_local.key"));
        assert_eq!(paths.pfx, Path::new("/d/cert_svc_local.pfx"));

        let paths = leaf_paths(Path::new("/d"), "*");
        assert_eq!(paths.cert, Path::new("/d/cert_certificate.pem"));
    }

    proptest! {
        #[test]
        fn sanitized_names_are_safe(raw in ".{0,40}") {
            let name = sanitize_name(&raw, "default");
            prop_assert!(!name.is_empty());
            prop_assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'));
            prop_assert!(!name.starts_with('_') && !name.ends_with('_'));
            prop_assert!(!name.contains('/') && !name.contains(".."));
        }

        #[test]
        fn sanitize_is_idempotent(raw in ".{0,40}") {
            let once = sanitize_name(&raw, "default");
            prop_assert_eq!(sanitize_name(&once, "default"), once.clone());
        }
    }
}
