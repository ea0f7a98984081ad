//! File-system trust store.
//!
//! The directory tree is the database: a CA exists when its directory
//! exists. Enumeration never parses certificates.

// Issuance deliberately holds the per-target guard for its whole duration.
#![allow(clippy::significant_drop_tightening)]

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::ca::{self, CertificateAuthority};
use crate::encoding::ensure_dir;
use crate::error::{Error, Result};
use crate::paths::{
    self, sanitize_name, DEFAULT_CERTIFICATE_NAME, DEFAULT_INTERMEDIATE_NAME, DEFAULT_ROOT_NAME,
};
use crate::types::{CaRequest, CertificateRecord, IssuedCertificate, IssuerRef, LeafRequest, Role};

/// An intermediate CA found in the trust store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntermediateCaInfo {
    /// Name of the parent root.
    pub root_name: String,
    /// Name of the intermediate.
    pub name: String,
}

/// Lists root CA names, sorted.
///
/// `default` is included when both `<base>/ca.pem` and `<base>/ca.key` exist.
///
/// # Errors
///
/// Returns [`Error::Io`] if a directory exists but cannot be read.
pub fn list_root_cas(base: &Path) -> Result<Vec<String>> {
    let mut roots = Vec::new();
    if paths::root_paths(base, DEFAULT_ROOT_NAME).exist() {
        roots.push(DEFAULT_ROOT_NAME.to_string());
    }
    roots.extend(list_dirs(&paths::root_ca_dir(base))?);
    roots.sort();
    debug!(base = %base.display(), count = roots.len(), "listed root CAs");
    Ok(roots)
}

/// Lists the intermediate CA names under a root, sorted.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory exists but cannot be read.
pub fn list_intermediate_cas(base: &Path, root_name: &str) -> Result<Vec<String>> {
    let dir = paths::intermediate_ca_dir(base).join(sanitize_name(root_name, DEFAULT_ROOT_NAME));
    let mut names = list_dirs(&dir)?;
    names.sort();
    Ok(names)
}

/// Lists every intermediate CA, sorted by root name then name.
///
/// # Errors
///
/// Returns [`Error::Io`] if a directory exists but cannot be read.
pub fn list_all_intermediate_cas(base: &Path) -> Result<Vec<IntermediateCaInfo>> {
    let dir = paths::intermediate_ca_dir(base);
    let mut all = Vec::new();
    for root_name in list_dirs(&dir)? {
        for name in list_dirs(&dir.join(&root_name))? {
            all.push(IntermediateCaInfo {
                root_name: root_name.clone(),
                name,
            });
        }
    }
    all.sort();
    debug!(base = %base.display(), count = all.len(), "listed intermediate CAs");
    Ok(all)
}

/// Names of the subdirectories of `dir`; a missing directory is empty.
fn list_dirs(dir: &Path) -> Result<Vec<String>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::io(dir, e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| Error::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| Error::io(entry.path(), e))?;
        if file_type.is_dir() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    Ok(names)
}

/// Identity of an issuance target: role, parent, sanitized name.
type LockKey = (Role, String, String);

/// A trust store rooted at a base directory.
///
/// Issuance through a `TrustStore` holds an advisory lock per logical
/// target, so callers in one process never interleave writes to the same
/// CA or leaf files. Reads take no lock.
pub struct TrustStore {
    base: PathBuf,
    locks: Mutex<HashMap<LockKey, Arc<Mutex<()>>>>,
}

impl TrustStore {
    /// Creates a trust store over `base` without touching the filesystem.
    #[must_use]
    pub fn new(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Creates the base directory (owner-only) and opens the trust store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the directory cannot be created.
    pub fn open(base: impl Into<PathBuf>) -> Result<Self> {
        let store = Self::new(base);
        ensure_dir(&store.base)?;
        Ok(store)
    }

    /// Returns the base directory.
    #[must_use]
    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Issues a root CA under the root's lock.
    ///
    /// # Errors
    ///
    /// See [`ca::issue_root`].
    pub fn issue_root(&self, request: &CaRequest) -> Result<CertificateRecord> {
        let key = (Role::Root, String::new(), sanitize_name(&request.name, DEFAULT_ROOT_NAME));
        self.with_lock(key, || ca::issue_root(&self.base, request))
    }

    /// Issues an intermediate CA under the intermediate's lock.
    ///
    /// # Errors
    ///
    /// See [`ca::issue_intermediate`].
    pub fn issue_intermediate(&self, root_name: &str, request: &CaRequest) -> Result<CertificateRecord> {
        let key = (
            Role::Intermediate,
            sanitize_name(root_name, DEFAULT_ROOT_NAME),
            sanitize_name(&request.name, DEFAULT_INTERMEDIATE_NAME),
        );
        self.with_lock(key, || ca::issue_intermediate(&self.base, root_name, request))
    }

    /// Issues a leaf certificate under the leaf's lock.
    ///
    /// # Errors
    ///
    /// See [`ca::issue_certificate`].
    pub fn issue_certificate(&self, request: &LeafRequest) -> Result<IssuedCertificate> {
        let common_name = request.subject.common_name().unwrap_or_default();
        let key = (
            Role::Leaf,
            request.issuer.to_string(),
            sanitize_name(common_name, DEFAULT_CERTIFICATE_NAME),
        );
        self.with_lock(key, || ca::issue_certificate(&self.base, request))
    }

    /// Loads a CA from this store.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IssuerUnavailable`] if the CA cannot be loaded.
    pub fn load_ca(&self, issuer: &IssuerRef) -> Result<CertificateAuthority> {
        CertificateAuthority::load(&self.base, issuer)
    }

    /// Lists root CA names. See [`list_root_cas`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on unreadable directories.
    pub fn list_root_cas(&self) -> Result<Vec<String>> {
        list_root_cas(&self.base)
    }

    /// Lists intermediates of one root. See [`list_intermediate_cas`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on unreadable directories.
    pub fn list_intermediate_cas(&self, root_name: &str) -> Result<Vec<String>> {
        list_intermediate_cas(&self.base, root_name)
    }

    /// Lists every intermediate. See [`list_all_intermediate_cas`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] on unreadable directories.
    pub fn list_all_intermediate_cas(&self) -> Result<Vec<IntermediateCaInfo>> {
        list_all_intermediate_cas(&self.base)
    }

    fn lock_for(&self, key: LockKey) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.lock().entry(key).or_default())
    }

    /// Runs `issue` under the target's lock, then drops the lock entry if
    /// no other caller is holding or waiting on it.
    fn with_lock<T>(&self, key: LockKey, issue: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.lock_for(key.clone());
        let result = {
            let _guard = lock.lock();
            issue()
        };

        let mut locks = self.locks.lock();
        // One reference in the map, one held here.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&key);
        }
        result
    }
}

impl std::fmt::Debug for TrustStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrustStore")
            .field("base", &self.base)
            .field("locks", &self.locks.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyType;
    use crate::subject::Subject;

    fn touch_ca(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("ca.pem"), "").unwrap();
        fs::write(dir.join("ca.key"), "").unwrap();
    }

    #[test]
    fn empty_store_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(list_root_cas(dir.path()).unwrap().is_empty());
        assert!(list_intermediate_cas(dir.path(), "default").unwrap().is_empty());
        assert!(list_all_intermediate_cas(dir.path()).unwrap().is_empty());

        let missing = dir.path().join("nope");
        assert!(list_root_cas(&missing).unwrap().is_empty());
    }

    #[test]
    fn default_root_needs_both_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("ca.pem"), "").unwrap();
        assert!(list_root_cas(dir.path()).unwrap().is_empty());

        fs::write(dir.path().join("ca.key"), "").unwrap();
        assert_eq!(list_root_cas(dir.path()).unwrap(), vec!["default"]);
    }

    #[test]
    fn roots_are_sorted_and_dirs_only() {
        let dir = tempfile::tempdir().unwrap();
        touch_ca(dir.path());
        touch_ca(&dir.path().join("ca/root/zeta"));
        touch_ca(&dir.path().join("ca/root/alpha"));
        fs::write(dir.path().join("ca/root/stray.txt"), "").unwrap();

        assert_eq!(list_root_cas(dir.path()).unwrap(), vec!["alpha", "default", "zeta"]);
    }

    #[test]
    fn intermediates_by_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ca/intermediate/default/mid-b")).unwrap();
        fs::create_dir_all(dir.path().join("ca/intermediate/default/mid-a")).unwrap();
        fs::create_dir_all(dir.path().join("ca/intermediate/corp/edge")).unwrap();

        assert_eq!(list_intermediate_cas(dir.path(), "").unwrap(), vec!["mid-a", "mid-b"]);
        assert_eq!(list_intermediate_cas(dir.path(), "corp").unwrap(), vec!["edge"]);

        let all = list_all_intermediate_cas(dir.path()).unwrap();
        let pairs: Vec<_> = all.iter().map(|i| (i.root_name.as_str(), i.name.as_str())).collect();
        assert_eq!(pairs, vec![("corp", "edge"), ("default", "mid-a"), ("default", "mid-b")]);
    }

    #[cfg(unix)]
    #[test]
    fn file_where_directory_expected_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("ca")).unwrap();
        fs::write(dir.path().join("ca/root"), "").unwrap();

        let err = list_root_cas(dir.path()).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn open_creates_base() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("nested/pki");
        let store = TrustStore::open(&base).unwrap();
        assert!(base.is_dir());
        assert_eq!(store.base(), base.as_path());
    }

    #[test]
    fn locks_are_shared_per_target() {
        let store = TrustStore::new("/unused");
        let a = store.lock_for((Role::Leaf, "root/default".into(), "svc".into()));
        let b = store.lock_for((Role::Leaf, "root/default".into(), "svc".into()));
        let c = store.lock_for((Role::Leaf, "root/default".into(), "other".into()));
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[test]
    fn idle_locks_are_released_after_issuance() {
        let dir = tempfile::tempdir().unwrap();
        let store = TrustStore::open(dir.path()).unwrap();
        store
            .issue_root(&CaRequest::builder(Subject::new("Test CA")).build().unwrap())
            .unwrap();
        for cn in ["a.local", "b.local", "c.local"] {
            let request = LeafRequest::builder(Subject::new(cn))
                .key_type(KeyType::EcdsaP256)
                .build()
                .unwrap();
            store.issue_certificate(&request).unwrap();
        }

        let err = store
            .issue_intermediate("missing", &CaRequest::builder(Subject::new("mid")).build().unwrap())
            .unwrap_err();
        assert!(err.is_issuer_unavailable());
        assert!(store.locks.lock().is_empty());
    }

    #[test]
    fn held_lock_is_kept_while_shared() {
        let store = TrustStore::new("/unused");
        let key: LockKey = (Role::Leaf, "root/default".into(), "svc".into());
        let held = store.lock_for(key.clone());

        let result: Result<()> = store.with_lock(key.clone(), || Ok(()));
        result.unwrap();
        assert!(store.locks.lock().contains_key(&key));

        drop(held);
        store.with_lock(key.clone(), || Ok(())).unwrap();
        assert!(!store.locks.lock().contains_key(&key));
    }

    #[test]
    fn concurrent_leaf_issuance_serializes() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(TrustStore::open(dir.path()).unwrap());
        store
            .issue_root(&CaRequest::builder(Subject::new("Test CA")).build().unwrap())
            .unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    let request = LeafRequest::builder(Subject::new("svc.local"))
                        .key_type(KeyType::EcdsaP256)
                        .build()
                        .unwrap();
                    store.issue_certificate(&request).unwrap().record.serial
                })
            })
            .collect();
        let serials: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        let path = dir.path().join("certs/root/default/cert_svc_local.pem");
        let on_disk = crate::encoding::load_ca_certificate(&path).unwrap();
        assert!(serials.contains(&on_disk.serial().unwrap()));

        let key = crate::encoding::load_ca_private_key(&path.with_extension("key")).unwrap();
        assert_eq!(on_disk.public_key_der(), key.public_key_der().unwrap().as_slice());
    }
}
