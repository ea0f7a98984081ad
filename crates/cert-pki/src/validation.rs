//! Certificate validation utilities.

use chrono::Utc;
use tracing::debug;

use crate::error::{Error, Result};
use crate::types::Certificate;

/// Validates a certificate against its issuing CA certificate.
///
/// This performs the following checks:
/// - The certificate is inside its validity window
/// - The issuer name matches the CA's subject
/// - The CA certificate is marked as a CA
/// - The certificate was signed by the CA
///
/// # Arguments
///
/// * `cert` - The certificate to validate.
/// * `ca_cert` - The CA certificate that should have issued this certificate.
///
/// # Errors
///
/// Returns [`Error::Validity`], [`Error::InvalidChain`] or
/// [`Error::SignatureVerification`] naming the failed check.
pub fn validate_certificate(cert: &Certificate, ca_cert: &Certificate) -> Result<()> {
    debug!(subject = cert.subject(), issuer = ca_cert.subject(), "validating certificate");

    check_validity(cert)?;

    if cert.issuer() != ca_cert.subject() {
        return Err(Error::InvalidChain(format!(
            "issuer '{}' does not match CA subject '{}'",
            cert.issuer(),
            ca_cert.subject()
        )));
    }

    if !ca_cert.is_ca() {
        return Err(Error::InvalidChain(format!(
            "'{}' is not a CA certificate",
            ca_cert.subject()
        )));
    }

    verify_signature(cert, ca_cert)
}

/// Validates a certificate chain.
///
/// The chain is ordered from end-entity to root. Each certificate must be
/// signed by the next one, the last one must be self-signed, and no CA may
/// have more CAs below it than its path length constraint allows.
///
/// # Errors
///
/// Returns [`Error::InvalidChain`] for structural problems, or the error of
/// the first failing link.
pub fn validate_chain(chain: &[Certificate]) -> Result<()> {
    let Some((root, _)) = chain.split_last() else {
        return Err(Error::InvalidChain("empty certificate chain".into()));
    };

    for (position, pair) in chain.windows(2).enumerate() {
        let (cert, issuer) = (&pair[0], &pair[1]);
        validate_certificate(cert, issuer)?;

        // CAs strictly between the issuer and the end-entity.
        let cas_below = position;
        if let Some(max) = issuer.path_len_constraint() {
            if cas_below > max as usize {
                return Err(Error::InvalidChain(format!(
                    "'{}' allows {max} intermediate CA(s) below it, chain has {cas_below}",
                    issuer.subject()
                )));
            }
        }
    }

    validate_self_signed(root)
}

/// Checks if a certificate is expired.
#[must_use]
pub fn is_expired(cert: &Certificate) -> bool {
    cert.not_after() < Utc::now()
}

/// Checks if a certificate is not yet valid.
#[must_use]
pub fn is_not_yet_valid(cert: &Certificate) -> bool {
    cert.not_before() > Utc::now()
}

/// Checks if a certificate is currently valid (not expired and `not_before` has passed).
#[must_use]
pub fn is_valid_now(cert: &Certificate) -> bool {
    !is_expired(cert) && !is_not_yet_valid(cert)
}

/// Calculates the remaining validity period.
///
/// # Returns
///
/// The duration until expiry, or None if already expired.
#[must_use]
pub fn remaining_validity(cert: &Certificate) -> Option<chrono::Duration> {
    let now = Utc::now();
    (cert.not_after() > now).then(|| cert.not_after() - now)
}

/// Validates a self-signed certificate.
///
/// # Errors
///
/// Returns an error if the certificate is not self-issued, outside its
/// validity window, or its signature does not verify with its own key.
pub fn validate_self_signed(cert: &Certificate) -> Result<()> {
    if !cert.is_self_issued() {
        return Err(Error::InvalidChain(format!(
            "'{}' is not self-signed",
            cert.subject()
        )));
    }
    check_validity(cert)?;
    verify_signature(cert, cert)
}

fn check_validity(cert: &Certificate) -> Result<()> {
    if is_expired(cert) {
        return Err(Error::Validity(format!(
            "'{}' expired at {}",
            cert.subject(),
            cert.not_after()
        )));
    }
    if is_not_yet_valid(cert) {
        return Err(Error::Validity(format!(
            "'{}' is not valid before {}",
            cert.subject(),
            cert.not_before()
        )));
    }
    Ok(())
}

/// Verifies that a certificate was signed by the given issuer.
fn verify_signature(cert: &Certificate, issuer: &Certificate) -> Result<()> {
    let (_, parsed_cert) = x509_parser::parse_x509_certificate(cert.der())
        .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

    let (_, parsed_issuer) = x509_parser::parse_x509_certificate(issuer.der())
        .map_err(|e| Error::Parse(format!("failed to parse issuer certificate: {e}")))?;

    parsed_cert
        .verify_signature(Some(parsed_issuer.public_key()))
        .map_err(|e| {
            Error::SignatureVerification(format!(
                "signature verification failed for '{}': {e:?}",
                cert.subject()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{KeyMaterial, KeyType};
    use crate::subject::Subject;
    use chrono::{DateTime, Duration};
    use rcgen::{BasicConstraints, CertificateParams, IsCa, Issuer};

    struct TestCa {
        cert: Certificate,
        key: KeyMaterial,
    }

    fn params(cn: &str, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> CertificateParams {
        let mut params = CertificateParams::default();
        params.distinguished_name = Subject::new(cn).distinguished_name();
        params.not_before = time::OffsetDateTime::from_unix_timestamp(not_before.timestamp()).unwrap();
        params.not_after = time::OffsetDateTime::from_unix_timestamp(not_after.timestamp()).unwrap();
        params
    }

    fn window(days: i64) -> (DateTime<Utc>, DateTime<Utc>) {
        let now = Utc::now();
        (now - Duration::hours(1), now + Duration::days(days))
    }

    fn root(cn: &str, constraint: BasicConstraints) -> TestCa {
        let key = KeyMaterial::generate(KeyType::EcdsaP256, 0).unwrap();
        let (nb, na) = window(30);
        let mut params = params(cn, nb, na);
        params.is_ca = IsCa::Ca(constraint);
        let der = params.self_signed(&key.signing_key_pair().unwrap()).unwrap().der().to_vec();
        TestCa {
            cert: Certificate::from_der(&der).unwrap(),
            key,
        }
    }

    fn issue(ca: &TestCa, cn: &str, is_ca: IsCa, not_before: DateTime<Utc>, not_after: DateTime<Utc>) -> TestCa {
        let key = KeyMaterial::generate(KeyType::EcdsaP256, 0).unwrap();
        let mut params = params(cn, not_before, not_after);
        params.is_ca = is_ca;
        let issuer = Issuer::from_ca_cert_pem(&ca.cert.pem(), ca.key.signing_key_pair().unwrap()).unwrap();
        let der = params
            .signed_by(&key.signing_key_pair().unwrap(), &issuer)
            .unwrap()
            .der()
            .to_vec();
        TestCa {
            cert: Certificate::from_der(&der).unwrap(),
            key,
        }
    }

    fn leaf(ca: &TestCa, cn: &str) -> Certificate {
        let (nb, na) = window(30);
        issue(ca, cn, IsCa::NoCa, nb, na).cert
    }

    #[test]
    fn validity_helpers() {
        let ca = root("Test CA", BasicConstraints::Unconstrained);
        let now = Utc::now();

        let current = leaf(&ca, "current");
        assert!(is_valid_now(&current));
        assert!(remaining_validity(&current).unwrap().num_days() >= 29);

        let expired = issue(&ca, "expired", IsCa::NoCa, now - Duration::days(60), now - Duration::days(30)).cert;
        assert!(is_expired(&expired));
        assert!(!is_valid_now(&expired));
        assert!(remaining_validity(&expired).is_none());

        let future = issue(&ca, "future", IsCa::NoCa, now + Duration::days(30), now + Duration::days(60)).cert;
        assert!(is_not_yet_valid(&future));
        assert!(!is_valid_now(&future));
    }

    #[test]
    fn validate_certificate_with_real_ca() {
        let ca = root("Test CA", BasicConstraints::Unconstrained);
        let cert = leaf(&ca, "test.example.com");
        validate_certificate(&cert, &ca.cert).unwrap();
    }

    #[test]
    fn validate_certificate_rejects_expired() {
        let ca = root("Test CA", BasicConstraints::Unconstrained);
        let now = Utc::now();
        let expired = issue(&ca, "expired", IsCa::NoCa, now - Duration::days(60), now - Duration::days(30)).cert;

        let err = validate_certificate(&expired, &ca.cert).unwrap_err();
        assert!(matches!(err, Error::Validity(_)));
    }

    #[test]
    fn validate_certificate_wrong_issuer() {
        let ca1 = root("CA One", BasicConstraints::Unconstrained);
        let ca2 = root("CA Two", BasicConstraints::Unconstrained);
        let cert = leaf(&ca1, "test.example.com");

        let err = validate_certificate(&cert, &ca2.cert).unwrap_err();
        assert!(matches!(err, Error::InvalidChain(_)));
    }

    #[test]
    fn validate_certificate_same_name_different_key() {
        let real = root("Test CA", BasicConstraints::Unconstrained);
        let impostor = root("Test CA", BasicConstraints::Unconstrained);
        let cert = leaf(&real, "svc");

        let err = validate_certificate(&cert, &impostor.cert).unwrap_err();
        assert!(matches!(err, Error::SignatureVerification(_)));
    }

    #[test]
    fn leaf_cannot_act_as_issuer() {
        let ca = root("Test CA", BasicConstraints::Unconstrained);
        let (nb, na) = window(30);
        let not_a_ca = issue(&ca, "leaf", IsCa::NoCa, nb, na);
        let child = leaf(&not_a_ca, "child");

        let err = validate_certificate(&child, &not_a_ca.cert).unwrap_err();
        assert!(matches!(err, Error::InvalidChain(_)));
    }

    #[test]
    fn validate_chain_single_self_signed() {
        let ca = root("Root CA", BasicConstraints::Unconstrained);
        validate_chain(&[ca.cert]).unwrap();
    }

    #[test]
    fn validate_chain_three_certs() {
        let ca = root("Root CA", BasicConstraints::Unconstrained);
        let (nb, na) = window(30);
        let mid = issue(&ca, "mid", IsCa::Ca(BasicConstraints::Constrained(0)), nb, na);
        let end_entity = leaf(&mid, "svc.local");

        validate_chain(&[end_entity, mid.cert, ca.cert]).unwrap();
    }

    #[test]
    fn validate_chain_enforces_path_length() {
        let ca = root("Root CA", BasicConstraints::Unconstrained);
        let (nb, na) = window(30);
        let mid = issue(&ca, "mid", IsCa::Ca(BasicConstraints::Constrained(0)), nb, na);
        let sub = issue(&mid, "sub", IsCa::Ca(BasicConstraints::Constrained(0)), nb, na);
        let end_entity = leaf(&sub, "svc.local");

        let err = validate_chain(&[end_entity, sub.cert, mid.cert, ca.cert]).unwrap_err();
        assert!(matches!(err, Error::InvalidChain(msg) if msg.contains("mid")));
    }

    #[test]
    fn validate_chain_requires_self_signed_root() {
        let ca = root("Root CA", BasicConstraints::Unconstrained);
        let (nb, na) = window(30);
        let mid = issue(&ca, "mid", IsCa::Ca(BasicConstraints::Constrained(0)), nb, na);
        let end_entity = leaf(&mid, "svc.local");

        let err = validate_chain(&[end_entity, mid.cert]).unwrap_err();
        assert!(matches!(err, Error::InvalidChain(_)));
    }

    #[test]
    fn validate_chain_empty() {
        let result = validate_chain(&[]);
        assert!(matches!(result.unwrap_err(), Error::InvalidChain(_)));
    }
}
