//! Integration tests for the on-disk trust store.
//!
//! These tests verify:
//! 1. Root CA validity window and basic constraints
//! 2. Intermediate CAs chain to their root
//! 3. Leaf certificates chain to their issuer
//! 4. SAN normalization
//! 5. Name sanitization
//! 6. Re-issuance overwrites
//! 7. Full root -> intermediate -> leaf chains
//! 8. Half-written CAs are rejected

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;

use chrono::Duration;
use cert_pki::{
    list_all_intermediate_cas, list_root_cas, normalize_sans, sanitize_name, validate_certificate,
    validate_chain, CaRequest, Certificate, CertificateAuthority, Error, IntermediateCaInfo,
    IssuerRef, KeyType, LeafRequest, Subject, TrustStore,
};

// ============================================================================
// Helpers
// ============================================================================

fn root_request(cn: &str) -> CaRequest {
    CaRequest::builder(Subject::new(cn).with_organization("Acme"))
        .build()
        .expect("valid root request")
}

fn mid_request(name: &str) -> CaRequest {
    CaRequest::builder(Subject::new(name))
        .name(name)
        .validity_days(1800)
        .build()
        .expect("valid intermediate request")
}

fn ec_leaf(cn: &str, issuer: IssuerRef) -> LeafRequest {
    LeafRequest::builder(Subject::new(cn))
        .issuer(issuer)
        .key_type(KeyType::EcdsaP256)
        .pfx_password("changeit")
        .build()
        .expect("valid leaf request")
}

fn read_cert(path: &Path) -> Certificate {
    let pem = fs::read_to_string(path).expect("certificate file");
    Certificate::from_pem(&pem).expect("certificate PEM")
}

// ============================================================================
// Root CAs
// ============================================================================

#[test]
fn test_root_validity_and_constraints() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();

    let record = store.issue_root(&root_request("Test CA")).unwrap();
    let cert = read_cert(&record.cert_path);

    let span = cert.not_after() - cert.not_before();
    let drift = (span - Duration::days(3600)).num_seconds().abs();
    assert!(drift <= Duration::hours(24).num_seconds(), "drift was {drift}s");

    assert!(cert.is_ca());
    assert_eq!(cert.path_len_constraint(), None);
    assert!(cert.is_self_issued());
    assert_eq!(cert.subject(), cert.issuer());
    assert_eq!(cert.serial(), Some(record.serial));
}

#[test]
fn test_default_and_named_roots_are_listed() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();
    assert!(list_root_cas(dir.path()).unwrap().is_empty());

    store.issue_root(&root_request("Test CA")).unwrap();
    let named = CaRequest::builder(Subject::new("Corp Root"))
        .name("corp")
        .build()
        .unwrap();
    let record = store.issue_root(&named).unwrap();

    assert_eq!(record.cert_path, dir.path().join("ca/root/corp/ca.pem"));
    assert!(dir.path().join("ca.pem").is_file());
    assert!(dir.path().join("ca.key").is_file());
    assert_eq!(list_root_cas(dir.path()).unwrap(), ["corp", "default"]);
}

// ============================================================================
// Intermediates and leaves
// ============================================================================

#[test]
fn test_intermediate_signed_by_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();

    let root = store.issue_root(&root_request("Test CA")).unwrap().certificate().unwrap();
    let mid = store.issue_intermediate("default", &mid_request("mid")).unwrap();
    let mid_cert = read_cert(&mid.cert_path);

    assert_eq!(mid_cert.issuer(), root.subject());
    assert!(mid_cert.is_ca());
    assert_eq!(mid_cert.path_len_constraint(), Some(0));
    validate_certificate(&mid_cert, &root).unwrap();

    assert_eq!(
        list_all_intermediate_cas(dir.path()).unwrap(),
        [IntermediateCaInfo {
            root_name: "default".into(),
            name: "mid".into(),
        }]
    );
}

#[test]
fn test_leaf_signed_by_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();
    let root = store.issue_root(&root_request("Test CA")).unwrap().certificate().unwrap();

    let issued = store
        .issue_certificate(&ec_leaf("svc.local", IssuerRef::default_root()))
        .unwrap();
    let leaf = read_cert(&issued.record.cert_path);

    assert_eq!(
        issued.record.cert_path,
        dir.path().join("certs/root/default/cert_svc_local.pem")
    );
    assert_eq!(leaf.issuer(), root.subject());
    assert!(!leaf.is_ca());
    validate_certificate(&leaf, &root).unwrap();
}

#[test]
fn test_full_chain_root_mid_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();

    let root = store.issue_root(&root_request("Test CA")).unwrap().certificate().unwrap();
    let mid = store
        .issue_intermediate("default", &mid_request("mid"))
        .unwrap()
        .certificate()
        .unwrap();

    let request = LeafRequest::builder(Subject::new("svc.local"))
        .issuer(IssuerRef::intermediate("default", "mid").unwrap())
        .san("10.0.0.1")
        .key_type(KeyType::EcdsaP256)
        .build()
        .unwrap();
    let issued = store.issue_certificate(&request).unwrap();
    let leaf = read_cert(&issued.record.cert_path);

    assert!(issued.record.cert_path.starts_with(dir.path().join("certs/intermediate/default/mid")));
    assert_eq!(leaf.dns_names(), ["svc.local"]);
    assert_eq!(leaf.ip_addresses(), [IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))]);
    validate_chain(&[leaf, mid, root]).unwrap();
}

#[test]
fn test_rsa_leaf_writes_key_and_pfx() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();
    store.issue_root(&root_request("Test CA")).unwrap();

    let request = LeafRequest::builder(Subject::new("web.local"))
        .pfx_password("changeit")
        .build()
        .unwrap();
    let issued = store.issue_certificate(&request).unwrap();

    let key_path = issued.record.key_path.expect("key written");
    let pfx_path = issued.record.pfx_path.expect("pfx written");
    assert!(fs::read_to_string(key_path).unwrap().contains("BEGIN RSA PRIVATE KEY"));
    assert!(!fs::read(pfx_path).unwrap().is_empty());
    assert!(issued.private_key.is_none());
}

#[test]
fn test_unexported_key_stays_in_memory() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();
    store.issue_root(&root_request("Test CA")).unwrap();

    let request = LeafRequest::builder(Subject::new("device"))
        .key_type(KeyType::EcdsaP256)
        .export_private_key(false)
        .build()
        .unwrap();
    let issued = store.issue_certificate(&request).unwrap();
    let leaf = read_cert(&issued.record.cert_path);

    let key = issued.private_key.expect("key returned");
    assert_eq!(leaf.public_key_der(), key.public_key_der().unwrap().as_slice());
    assert!(issued.record.key_path.is_none());
    assert!(!dir.path().join("certs/root/default/cert_device.key").exists());
    assert!(!dir.path().join("certs/root/default/cert_device.pfx").exists());
}

// ============================================================================
// SANs and names
// ============================================================================

#[test]
fn test_san_normalization() {
    let set = normalize_sans(["a.example.com", "10.0.0.5", "  ", "xn--valid"]).unwrap();

    assert_eq!(set.ip_addresses, [IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))]);
    assert_eq!(set.dns_names, ["a.example.com", "xn--valid"]);
    assert!(!set.dns_names.iter().any(|name| name == "10.0.0.5"));
}

#[test]
fn test_name_sanitization() {
    assert_eq!(sanitize_name("My CA! #1", "default"), "My_CA_1");
    assert_eq!(sanitize_name("   ", "default"), "default");

    let escaped = sanitize_name("../../etc", "default");
    assert!(!escaped.contains('/'));
    assert!(!escaped.contains(".."));
}

#[test]
fn test_hostile_intermediate_name_stays_inside_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();
    store.issue_root(&root_request("Test CA")).unwrap();

    let record = store.issue_intermediate("default", &mid_request("../../escape")).unwrap();
    assert!(record.cert_path.starts_with(dir.path().join("ca/intermediate/default")));
    assert_eq!(record.name, "escape");
}

// ============================================================================
// Re-issuance and failure modes
// ============================================================================

#[test]
fn test_reissue_overwrites_leaf() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();
    store.issue_root(&root_request("Test CA")).unwrap();

    let request = ec_leaf("svc.local", IssuerRef::default_root());
    let first = store.issue_certificate(&request).unwrap();
    let second = store.issue_certificate(&request).unwrap();

    assert_eq!(first.record.cert_path, second.record.cert_path);
    assert_ne!(first.record.serial, second.record.serial);
    assert_eq!(read_cert(&second.record.cert_path).serial(), Some(second.record.serial));
}

#[test]
fn test_ca_without_key_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();
    store.issue_root(&root_request("Test CA")).unwrap();
    fs::remove_file(dir.path().join("ca.key")).unwrap();

    let err = CertificateAuthority::load(dir.path(), &IssuerRef::default_root()).unwrap_err();
    assert!(err.is_issuer_unavailable());

    let err = store
        .issue_certificate(&ec_leaf("svc.local", IssuerRef::default_root()))
        .unwrap_err();
    assert!(matches!(err, Error::IssuerUnavailable { .. }));
    assert!(!dir.path().join("certs").exists());
}

#[test]
fn test_intermediate_requires_existing_root() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();

    let err = store.issue_intermediate("missing", &mid_request("mid")).unwrap_err();
    assert!(err.is_issuer_unavailable());
    assert!(list_all_intermediate_cas(dir.path()).unwrap().is_empty());
}

#[test]
fn test_invalid_san_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = TrustStore::open(dir.path()).unwrap();
    store.issue_root(&root_request("Test CA")).unwrap();

    let request = LeafRequest::builder(Subject::new("svc.local"))
        .san("bü cher.example")
        .key_type(KeyType::EcdsaP256)
        .build()
        .unwrap();
    let err = store.issue_certificate(&request).unwrap_err();

    assert!(matches!(err, Error::Encoding(_)));
    assert!(!dir.path().join("certs").exists());
}
