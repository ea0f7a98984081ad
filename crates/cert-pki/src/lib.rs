//! File-system trust store and certificate issuance engine for cert-helper.
#![forbid(unsafe_code)]
//!
//! This crate maintains root CAs, intermediate CAs and leaf certificates on
//! disk and issues new ones on demand.
//!
//! # Overview
//!
//! The `cert-pki` crate enables:
//! - Creating self-signed root CAs and intermediates beneath them
//! - Issuing leaf certificates with SANs, key usages and PKCS#12 bundles
//! - Listing the CAs already present in a trust store
//! - Validating certificates and chains
//! - Serving CA material to enrollment servers through [`CertificateDepot`]
//!
//! # Example
//!
//! ```no_run
//! use cert_pki::{CaRequest, IssuerRef, LeafRequest, Subject, TrustStore};
//!
//! let store = TrustStore::open("/var/lib/cert-helper")?;
//!
//! // Root and intermediate
//! store.issue_root(&CaRequest::builder(Subject::new("Test CA")).build()?)?;
//! let mid = CaRequest::builder(Subject::new("mid")).name("mid").validity_days(1800).build()?;
//! store.issue_intermediate("default", &mid)?;
//!
//! // Leaf signed by the intermediate
//! let request = LeafRequest::builder(Subject::new("svc.local"))
//!     .issuer(IssuerRef::intermediate("default", "mid")?)
//!     .san("10.0.0.1")
//!     .pfx_password("changeit")
//!     .build()?;
//! let issued = store.issue_certificate(&request)?;
//! println!("wrote {}", issued.record.cert_path.display());
//! # Ok::<(), cert_pki::Error>(())
//! ```
//!
//! # Modules
//!
//! - [`ca`] - Root, intermediate and leaf issuance
//! - [`store`] - Serialized issuance and CA listing
//! - [`depot`] - Storage callbacks for enrollment servers
//! - [`validation`] - Certificate validation utilities
//! - [`types`] - Requests, records and the parsed certificate view
//! - [`paths`] - Trust-store layout
//! - [`error`] - Error types

pub mod ca;
pub mod config;
pub mod depot;
pub mod encoding;
pub mod error;
pub mod keys;
pub mod paths;
pub mod san;
pub mod store;
pub mod subject;
pub mod types;
pub mod validation;

// Re-export commonly used types at crate root
pub use ca::{issue_certificate, issue_intermediate, issue_root, CertificateAuthority};
pub use config::{default_output_dir, PkiConfig};
pub use depot::{CertificateDepot, FileDepot};
pub use error::{Error, Result};
pub use keys::{generate_key_pair, normalize_key_bits, KeyMaterial, KeyType};
pub use paths::sanitize_name;
pub use san::{normalize_sans, SanSet};
pub use store::{list_all_intermediate_cas, list_intermediate_cas, list_root_cas, IntermediateCaInfo, TrustStore};
pub use subject::Subject;
pub use types::{
    CaRequest, CaRequestBuilder, Certificate, CertificateOptions, CertificateRecord, ExtKeyUsage,
    IssuedCertificate, IssuerRef, KeyUsage, LeafRequest, LeafRequestBuilder, Role, SerialNumber,
};
pub use validation::{
    is_expired, is_not_yet_valid, is_valid_now, remaining_validity, validate_certificate, validate_chain,
};
