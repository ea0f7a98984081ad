//! Certificate issuance.
//!
//! Every operation is one forward pass: validate the request, load the
//! issuer from disk, generate a fresh key, build the template, sign, then
//! write the certificate followed by the key. Nothing is retried or rolled
//! back, and issuers are never cached between calls.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Duration, SubsecRound, Utc};
use rcgen::{BasicConstraints, CertificateParams, IsCa, Issuer};
use tracing::{debug, info, warn};

use crate::encoding::{
    ensure_dir, ensure_parent_dir, load_ca_certificate, load_ca_private_key,
    write_certificate_pem, write_pfx, write_private_key_pem,
};
use crate::error::{Error, Result};
use crate::keys::KeyMaterial;
use crate::paths::{self, sanitize_name, DEFAULT_CERTIFICATE_NAME, DEFAULT_INTERMEDIATE_NAME, DEFAULT_ROOT_NAME};
use crate::san::normalize_sans;
use crate::subject::Subject;
use crate::types::{
    CaRequest, Certificate, CertificateRecord, IssuedCertificate, IssuerRef, KeyUsage, LeafRequest,
    Role, SerialNumber,
};

/// How far `NotBefore` is backdated to absorb clock skew.
pub const BACKDATE_HOURS: i64 = 24;

/// A CA loaded from the trust store, ready to sign.
pub struct CertificateAuthority {
    issuer: IssuerRef,
    certificate: Certificate,
    key: KeyMaterial,
}

impl CertificateAuthority {
    /// Loads a CA's key, then its certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::IssuerUnavailable`] wrapping the load failure.
    pub fn load(base: &Path, issuer: &IssuerRef) -> Result<Self> {
        let paths = paths::ca_paths(base, issuer);
        debug!(issuer = %issuer, cert = %paths.cert.display(), "loading CA");

        let loaded = load_ca_private_key(&paths.key)
            .and_then(|key| load_ca_certificate(&paths.cert).map(|certificate| (key, certificate)));

        match loaded {
            Ok((key, certificate)) => Ok(Self {
                issuer: issuer.clone(),
                certificate,
                key,
            }),
            Err(e) => {
                warn!(issuer = %issuer, error = %e, "CA is unusable");
                Err(Error::issuer_unavailable(issuer.role(), issuer.name(), e))
            }
        }
    }

    /// Returns the reference this CA was loaded from.
    #[must_use]
    pub const fn issuer_ref(&self) -> &IssuerRef {
        &self.issuer
    }

    /// Returns the CA certificate.
    #[must_use]
    pub const fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    /// Returns the CA private key.
    #[must_use]
    pub const fn key(&self) -> &KeyMaterial {
        &self.key
    }

    /// Splits the CA into its certificate and key.
    #[must_use]
    pub fn into_parts(self) -> (Certificate, KeyMaterial) {
        (self.certificate, self.key)
    }

    /// Signs `params` for `subject_key`, with this CA as issuer.
    ///
    /// The issuer name and authority key identifier come from the CA certificate.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if signing fails.
    pub fn sign(&self, params: &CertificateParams, subject_key: &KeyMaterial) -> Result<Vec<u8>> {
        let issuer = Issuer::from_ca_cert_pem(&self.certificate.pem(), self.key.signing_key_pair()?)
            .map_err(|e| Error::Encoding(format!("failed to load issuer {}: {e}", self.issuer)))?;
        let subject_key_pair = subject_key.signing_key_pair()?;

        let cert = params
            .signed_by(&subject_key_pair, &issuer)
            .map_err(|e| Error::Encoding(format!("failed to sign certificate: {e}")))?;
        Ok(cert.der().to_vec())
    }
}

impl fmt::Debug for CertificateAuthority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateAuthority")
            .field("issuer", &self.issuer)
            .field("subject", &self.certificate.subject())
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Issues a self-signed root CA and writes it to the trust store.
///
/// The key is always RSA with `request.key_bits`. The certificate has no
/// path length constraint.
///
/// # Arguments
///
/// * `base` - Trust-store base directory.
/// * `request` - Name, subject, validity and key usage of the root.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a bad request, or a key generation,
/// encoding or I/O error from the later steps.
pub fn issue_root(base: &Path, request: &CaRequest) -> Result<CertificateRecord> {
    request.validate()?;
    let name = sanitize_name(&request.name, DEFAULT_ROOT_NAME);
    info!(name = %name, validity_days = request.validity_days, "issuing root CA");

    let paths = paths::root_paths(base, &name);
    ensure_parent_dir(&paths.cert)?;

    let key = KeyMaterial::generate_rsa(request.key_bits)?;
    let serial = SerialNumber::generate();
    let (not_before, not_after) = validity_window(request.validity_days)?;

    let mut params = base_params(&request.subject, serial, not_before, not_after)?;
    params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
    params.key_usages = to_rcgen_key_usages(&request.effective_key_usage());

    let signer = key.signing_key_pair()?;
    let der = params
        .self_signed(&signer)
        .map_err(|e| Error::Encoding(format!("failed to self-sign root CA: {e}")))?
        .der()
        .to_vec();

    write_certificate_pem(&paths.cert, &der)?;
    write_private_key_pem(&paths.key, &key)?;

    info!(name = %name, serial = %serial, "root CA issued");
    Ok(CertificateRecord {
        name,
        role: Role::Root,
        issuer: None,
        serial,
        not_before,
        not_after,
        cert_path: paths.cert,
        key_path: Some(paths.key),
        pfx_path: None,
        der,
    })
}

/// Issues an intermediate CA signed by a root and writes it to the trust store.
///
/// The certificate is constrained to path length 0, so it can only sign leaves.
///
/// # Arguments
///
/// * `base` - Trust-store base directory.
/// * `root_name` - Name of the signing root; blank means the default root.
/// * `request` - Name, subject, validity and key usage of the intermediate.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a bad request, [`Error::IssuerUnavailable`]
/// if the root cannot be loaded, or an error from the later steps.
pub fn issue_intermediate(base: &Path, root_name: &str, request: &CaRequest) -> Result<CertificateRecord> {
    request.validate()?;
    let root_ref = IssuerRef::root(root_name);
    let name = sanitize_name(&request.name, DEFAULT_INTERMEDIATE_NAME);
    info!(root = root_ref.name(), name = %name, "issuing intermediate CA");

    let root = CertificateAuthority::load(base, &root_ref)?;

    let paths = paths::intermediate_paths(base, root_ref.name(), &name);
    ensure_parent_dir(&paths.cert)?;

    let key = KeyMaterial::generate_rsa(request.key_bits)?;
    let serial = SerialNumber::generate();
    let (not_before, not_after) = validity_window(request.validity_days)?;

    let mut params = base_params(&request.subject, serial, not_before, not_after)?;
    params.is_ca = IsCa::Ca(BasicConstraints::Constrained(0));
    params.key_usages = to_rcgen_key_usages(&request.effective_key_usage());
    params.use_authority_key_identifier_extension = true;

    let der = root.sign(&params, &key)?;

    write_certificate_pem(&paths.cert, &der)?;
    write_private_key_pem(&paths.key, &key)?;

    info!(root = root_ref.name(), name = %name, serial = %serial, "intermediate CA issued");
    Ok(CertificateRecord {
        name,
        role: Role::Intermediate,
        issuer: Some(root_ref),
        serial,
        not_before,
        not_after,
        cert_path: paths.cert,
        key_path: Some(paths.key),
        pfx_path: None,
        der,
    })
}

/// Issues a leaf certificate signed by a root or intermediate CA.
///
/// The common name is always the first SAN. When
/// `request.options.export_private_key` is set, the key PEM and a PKCS#12
/// bundle are written next to the certificate; otherwise no key touches disk
/// and the key is returned in [`IssuedCertificate::private_key`].
///
/// # Arguments
///
/// * `base` - Trust-store base directory.
/// * `request` - Subject, issuer, SANs, validity and key options.
///
/// # Errors
///
/// Returns [`Error::Validation`] for a bad request, [`Error::IssuerUnavailable`]
/// if the issuer cannot be loaded, [`Error::Encoding`] if a SAN cannot be
/// converted, or an error from the later steps.
pub fn issue_certificate(base: &Path, request: &LeafRequest) -> Result<IssuedCertificate> {
    request.validate()?;
    let common_name = request
        .subject
        .common_name()
        .ok_or_else(|| Error::Validation("common name is required".into()))?;
    info!(common_name, issuer = %request.issuer, "issuing certificate");

    let ca = CertificateAuthority::load(base, &request.issuer)?;

    let sans = normalize_sans(std::iter::once(common_name).chain(request.sans.iter().map(String::as_str)))?;

    let options = &request.options;
    let key = KeyMaterial::generate(options.key_type, options.key_bits)?;
    let serial = SerialNumber::generate();
    let (not_before, not_after) = validity_window(request.validity_days)?;

    let mut params = base_params(&request.subject, serial, not_before, not_after)?;
    params.is_ca = IsCa::NoCa;
    params.key_usages = to_rcgen_key_usages(&options.key_usage);
    params.extended_key_usages = options
        .effective_ext_key_usage()
        .into_iter()
        .map(|usage| usage.to_rcgen())
        .collect();
    params.subject_alt_names = sans.to_rcgen()?;
    params.use_authority_key_identifier_extension = true;

    let der = ca.sign(&params, &key)?;

    let dir = paths::cert_dir(base, &request.issuer);
    ensure_dir(&dir)?;
    let files = paths::leaf_paths(&dir, common_name);
    write_certificate_pem(&files.cert, &der)?;

    let (key_path, pfx_path, private_key) = if options.export_private_key {
        write_private_key_pem(&files.key, &key)?;
        write_pfx(&files.pfx, &key, &der, &request.pfx_password)?;
        (Some(files.key), Some(files.pfx), None)
    } else {
        debug!(common_name, "private key kept in memory");
        (None, None, Some(key))
    };

    info!(common_name, serial = %serial, cert = %files.cert.display(), "certificate issued");
    Ok(IssuedCertificate {
        record: CertificateRecord {
            name: sanitize_name(common_name, DEFAULT_CERTIFICATE_NAME),
            role: Role::Leaf,
            issuer: Some(request.issuer.clone()),
            serial,
            not_before,
            not_after,
            cert_path: files.cert,
            key_path,
            pfx_path,
            der,
        },
        private_key,
    })
}

/// Returns `[now - 24h, now + days)`, truncated to whole seconds.
fn validity_window(days: u32) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let now = Utc::now().trunc_subsecs(0);
    let not_before = now - Duration::hours(BACKDATE_HOURS);
    let not_after = now
        .checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| Error::Validation(format!("validity of {days} days is out of range")))?;
    Ok((not_before, not_after))
}

fn base_params(
    subject: &Subject,
    serial: SerialNumber,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
) -> Result<CertificateParams> {
    let mut params = CertificateParams::default();
    params.distinguished_name = subject.distinguished_name();
    params.serial_number = Some(serial.to_rcgen());
    params.not_before = to_rcgen_time(not_before)?;
    params.not_after = to_rcgen_time(not_after)?;
    Ok(params)
}

fn to_rcgen_key_usages(usages: &[KeyUsage]) -> Vec<rcgen::KeyUsagePurpose> {
    usages.iter().map(|usage| usage.to_rcgen()).collect()
}

/// Converts a chrono `DateTime` to rcgen `OffsetDateTime`.
fn to_rcgen_time(dt: DateTime<Utc>) -> Result<time::OffsetDateTime> {
    time::OffsetDateTime::from_unix_timestamp(dt.timestamp())
        .map_err(|e| Error::Validation(format!("invalid timestamp: {e}")))
}
