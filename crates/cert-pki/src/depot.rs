//! Certificate depot for enrollment protocol servers.
//!
//! An enrollment server (for example SCEP) does its own protocol work and
//! only calls back into the trust store for the four operations of
//! [`CertificateDepot`].

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::ca::CertificateAuthority;
use crate::encoding::write_certificate_pem;
use crate::error::{Error, Result};
use crate::keys::KeyMaterial;
use crate::paths::leaf_paths;
use crate::types::{Certificate, IssuerRef, SerialNumber};

/// Storage callbacks needed by an enrollment protocol server.
pub trait CertificateDepot {
    /// Returns the CA chain (signing CA first) and the signing key.
    ///
    /// # Errors
    ///
    /// Returns an error if the CA cannot be loaded.
    fn ca(&self) -> Result<(Vec<Certificate>, KeyMaterial)>;

    /// Allocates a serial number for a new certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if no serial can be allocated.
    fn serial(&self) -> Result<SerialNumber>;

    /// Returns true if a certificate for `common_name` was already issued.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails.
    fn has_common_name(&self, common_name: &str) -> Result<bool>;

    /// Persists an issued certificate and returns where it was written.
    ///
    /// # Errors
    ///
    /// Returns an error if the certificate cannot be stored.
    fn put(&self, certificate: &Certificate) -> Result<PathBuf>;
}

/// A depot over a trust-store base directory, signing with the default root.
///
/// Issued certificates are stored flat in the base directory as `cert_<cn>.pem`.
#[derive(Debug, Clone)]
pub struct FileDepot {
    dir: PathBuf,
}

impl FileDepot {
    /// Creates a depot over `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the depot directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl CertificateDepot for FileDepot {
    fn ca(&self) -> Result<(Vec<Certificate>, KeyMaterial)> {
        let (certificate, key) = CertificateAuthority::load(&self.dir, &IssuerRef::default_root())?.into_parts();
        Ok((vec![certificate], key))
    }

    fn serial(&self) -> Result<SerialNumber> {
        Ok(SerialNumber::generate())
    }

    fn has_common_name(&self, common_name: &str) -> Result<bool> {
        let path = leaf_paths(&self.dir, common_name).cert;
        match path.try_exists() {
            Ok(exists) => {
                debug!(common_name, exists, "depot lookup");
                Ok(exists)
            }
            Err(e) => Err(Error::io(path, e)),
        }
    }

    fn put(&self, certificate: &Certificate) -> Result<PathBuf> {
        let common_name = certificate
            .common_name()
            .ok_or_else(|| Error::Validation("certificate has no common name".into()))?;
        let path = leaf_paths(&self.dir, common_name).cert;
        write_certificate_pem(&path, certificate.der())?;
        info!(common_name, path = %path.display(), "depot stored certificate");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ca::{issue_certificate, issue_root};
    use crate::keys::KeyType;
    use crate::subject::Subject;
    use crate::types::{CaRequest, LeafRequest};

    #[test]
    fn ca_requires_default_root() {
        let dir = tempfile::tempdir().unwrap();
        let depot = FileDepot::new(dir.path());
        assert!(depot.ca().unwrap_err().is_issuer_unavailable());
    }

    #[test]
    fn ca_returns_default_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = issue_root(dir.path(), &CaRequest::builder(Subject::new("Test CA")).build().unwrap()).unwrap();

        let (chain, key) = FileDepot::new(dir.path()).ca().unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].der(), root.der.as_slice());
        assert_eq!(chain[0].public_key_der(), key.public_key_der().unwrap().as_slice());
    }

    #[test]
    fn serials_differ_per_call() {
        let depot = FileDepot::new("/unused");
        assert_ne!(depot.serial().unwrap(), depot.serial().unwrap());
    }

    #[test]
    fn put_then_has_common_name() {
        let dir = tempfile::tempdir().unwrap();
        issue_root(dir.path(), &CaRequest::builder(Subject::new("Test CA")).build().unwrap()).unwrap();
        let request = LeafRequest::builder(Subject::new("device-01"))
            .key_type(KeyType::EcdsaP256)
            .export_private_key(false)
            .build()
            .unwrap();
        let cert = issue_certificate(dir.path(), &request).unwrap().record.certificate().unwrap();

        let depot = FileDepot::new(dir.path());
        assert!(!depot.has_common_name("device-01").unwrap());

        let path = depot.put(&cert).unwrap();
        assert_eq!(path, dir.path().join("cert_device-01.pem"));
        assert!(depot.has_common_name("device-01").unwrap());
        assert!(!depot.has_common_name("device-02").unwrap());
    }
}
