//! PEM and PKCS#12 encoding, and reading CA material back from disk.
//!
//! Writes are plain truncating writes, not atomic renames. Private keys and
//! PKCS#12 bundles are created owner-only on Unix.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use pem::{EncodeConfig, LineEnding, Pem};
use tracing::debug;

use crate::error::{Error, Result};
use crate::keys::KeyMaterial;
use crate::types::Certificate;

/// PEM label for certificates.
pub const CERTIFICATE_LABEL: &str = "CERTIFICATE";

/// Encodes a PEM block with LF line endings.
#[must_use]
pub fn encode_pem(block: &Pem) -> String {
    pem::encode_config(block, EncodeConfig::new().set_line_ending(LineEnding::LF))
}

/// Writes a DER certificate as a `CERTIFICATE` PEM block.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be written.
pub fn write_certificate_pem(path: &Path, der: &[u8]) -> Result<()> {
    let encoded = encode_pem(&Pem::new(CERTIFICATE_LABEL, der.to_vec()));
    fs::write(path, encoded).map_err(|e| Error::io(path, e))?;
    debug!(path = %path.display(), "wrote certificate");
    Ok(())
}

/// Writes a private key PEM block, owner-only.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the key cannot be serialized, or
/// [`Error::Io`] if the file cannot be written.
pub fn write_private_key_pem(path: &Path, key: &KeyMaterial) -> Result<()> {
    let encoded = zeroize::Zeroizing::new(encode_pem(&key.to_pem()?));
    write_owner_only(path, encoded.as_bytes())?;
    debug!(path = %path.display(), key_type = %key.key_type(), "wrote private key");
    Ok(())
}

/// Writes a PKCS#12 bundle holding `key` and the certificate, without a chain.
///
/// The bundle uses legacy encryption (3DES keys, RC2 certificates, SHA-1 MAC).
/// An empty password is accepted and used as-is.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if the bundle cannot be built, or
/// [`Error::Io`] if the file cannot be written.
pub fn write_pfx(path: &Path, key: &KeyMaterial, cert_der: &[u8], password: &str) -> Result<()> {
    let key_der = key.to_pkcs8_der()?;
    let friendly_name = Certificate::from_der(cert_der)
        .ok()
        .and_then(|cert| cert.common_name().map(String::from))
        .unwrap_or_default();

    let pfx = p12::PFX::new(cert_der, &key_der, None, password, &friendly_name)
        .ok_or_else(|| Error::Encoding("failed to build PKCS#12 bundle".into()))?;

    write_owner_only(path, &pfx.to_der())?;
    debug!(path = %path.display(), "wrote PKCS#12 bundle");
    Ok(())
}

/// Loads a CA private key from the first PEM block of a file.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the file is missing, unreadable, not PEM,
/// or not a supported key.
pub fn load_ca_private_key(path: &Path) -> Result<KeyMaterial> {
    let block = read_first_block(path)?;
    KeyMaterial::from_pem(&block).map_err(|reason| Error::Decode {
        path: path.to_path_buf(),
        reason,
    })
}

/// Loads a CA certificate from the first PEM block of a file.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the file is missing, unreadable, not PEM,
/// or not a valid certificate.
pub fn load_ca_certificate(path: &Path) -> Result<Certificate> {
    let block = read_first_block(path)?;
    if block.tag() != CERTIFICATE_LABEL {
        return Err(Error::Decode {
            path: path.to_path_buf(),
            reason: format!("expected a CERTIFICATE block, found '{}'", block.tag()),
        });
    }
    Certificate::from_der(block.contents()).map_err(|e| Error::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Creates a directory and its parents, owner-only on Unix.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be created.
pub fn ensure_dir(dir: &Path) -> Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o700);
    }
    builder.create(dir).map_err(|e| Error::io(dir, e))
}

/// Creates the parent directory of `path`.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory cannot be created.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ensure_dir(parent),
        _ => Ok(()),
    }
}

fn read_first_block(path: &Path) -> Result<Pem> {
    let data = fs::read(path).map_err(|e| Error::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    pem::parse(&data).map_err(|e| Error::Decode {
        path: path.to_path_buf(),
        reason: format!("failed to decode PEM block: {e}"),
    })
}

fn write_owner_only(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(|e| Error::io(path, e))?;

    // The mode above only applies on creation.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(|e| Error::io(path, e))?;
    }

    file.write_all(contents).map_err(|e| Error::io(path, e))?;
    file.flush().map_err(|e| Error::io(path, e))
}
