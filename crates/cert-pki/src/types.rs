//! Core PKI types for issuance and the trust store.

use std::fmt;
use std::net::IpAddr;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rcgen::{ExtendedKeyUsagePurpose, KeyUsagePurpose};
use serde::{Deserialize, Serialize, Serializer};

use crate::error::{Error, Result};
use crate::keys::{KeyMaterial, KeyType, DEFAULT_KEY_BITS};
use crate::paths::{sanitize_name, DEFAULT_INTERMEDIATE_NAME, DEFAULT_ROOT_NAME};
use crate::subject::Subject;

/// Default validity of a root CA, in days.
pub const DEFAULT_ROOT_VALIDITY_DAYS: u32 = 3600;
/// Default validity of an intermediate CA, in days.
pub const DEFAULT_INTERMEDIATE_VALIDITY_DAYS: u32 = 1800;
/// Default validity of a leaf certificate, in days.
pub const DEFAULT_LEAF_VALIDITY_DAYS: u32 = 365;

/// Position of a certificate in the hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Self-signed root CA.
    Root,
    /// CA signed by a root, path length 0.
    Intermediate,
    /// End-entity certificate.
    Leaf,
}

impl Role {
    /// Returns the lowercase name of the role.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Intermediate => "intermediate",
            Self::Leaf => "leaf",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to the CA that signs a certificate.
///
/// Names are stored sanitized, so they match the on-disk directory names.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum IssuerRef {
    /// A root CA.
    Root {
        /// Root name (`default` is the root at the store base).
        name: String,
    },
    /// An intermediate CA, keyed by its parent root.
    Intermediate {
        /// Name of the parent root.
        root_name: String,
        /// Name of the intermediate.
        name: String,
    },
}

impl IssuerRef {
    /// References a root CA by name.
    #[must_use]
    pub fn root(name: &str) -> Self {
        Self::Root {
            name: sanitize_name(name, DEFAULT_ROOT_NAME),
        }
    }

    /// References the default root CA.
    #[must_use]
    pub fn default_root() -> Self {
        Self::root(DEFAULT_ROOT_NAME)
    }

    /// References an intermediate CA under a root.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if `name` is blank.
    pub fn intermediate(root_name: &str, name: &str) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(Error::Validation(
                "an intermediate issuer requires a name".into(),
            ));
        }
        Ok(Self::Intermediate {
            root_name: sanitize_name(root_name, DEFAULT_ROOT_NAME),
            name: sanitize_name(name, DEFAULT_INTERMEDIATE_NAME),
        })
    }

    /// Builds an issuer reference from loosely-typed selector fields.
    ///
    /// `issuer_type` is trimmed and lowercased; `intermediate` selects an
    /// intermediate under `root_name`, anything else selects the root named
    /// `issuer_name`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if an intermediate is selected without a name.
    pub fn select(issuer_type: &str, root_name: &str, issuer_name: &str) -> Result<Self> {
        if issuer_type.trim().eq_ignore_ascii_case("intermediate") {
            Self::intermediate(root_name, issuer_name)
        } else {
            Ok(Self::root(issuer_name))
        }
    }

    /// Returns the role of the referenced CA.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::Root { .. } => Role::Root,
            Self::Intermediate { .. } => Role::Intermediate,
        }
    }

    /// Returns the name of the referenced CA.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Root { name } | Self::Intermediate { name, .. } => name,
        }
    }

    /// Returns the name of the root this CA belongs to.
    #[must_use]
    pub fn root_name(&self) -> &str {
        match self {
            Self::Root { name } => name,
            Self::Intermediate { root_name, .. } => root_name,
        }
    }
}

impl Default for IssuerRef {
    fn default() -> Self {
        Self::default_root()
    }
}

impl fmt::Display for IssuerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Root { name } => write!(f, "root/{name}"),
            Self::Intermediate { root_name, name } => write!(f, "intermediate/{root_name}/{name}"),
        }
    }
}

/// A 128-bit certificate serial number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerialNumber(u128);

impl SerialNumber {
    /// Generates a uniformly random serial in `[0, 2^128)`.
    #[must_use]
    pub fn generate() -> Self {
        Self(rand::random())
    }

    /// Wraps a raw value.
    #[must_use]
    pub const fn from_u128(value: u128) -> Self {
        Self(value)
    }

    /// Parses big-endian magnitude bytes, as found in a DER INTEGER.
    ///
    /// Returns `None` if the value does not fit in 128 bits.
    #[must_use]
    pub fn from_be_bytes(bytes: &[u8]) -> Option<Self> {
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
        let significant = &bytes[start..];
        if significant.len() > 16 {
            return None;
        }
        let mut buf = [0u8; 16];
        buf[16 - significant.len()..].copy_from_slice(significant);
        Some(Self(u128::from_be_bytes(buf)))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(&self) -> u128 {
        self.0
    }

    /// Returns the minimal big-endian encoding (at least one byte).
    #[must_use]
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let bytes = self.0.to_be_bytes();
        let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        bytes[start..].to_vec()
    }

    pub(crate) fn to_rcgen(self) -> rcgen::SerialNumber {
        rcgen::SerialNumber::from(self.to_be_bytes())
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:x}", self.0)
    }
}

impl Serialize for SerialNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// `KeyUsage` extension bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyUsage {
    /// digitalSignature
    DigitalSignature,
    /// nonRepudiation / contentCommitment
    ContentCommitment,
    /// keyEncipherment
    KeyEncipherment,
    /// dataEncipherment
    DataEncipherment,
    /// keyAgreement
    KeyAgreement,
    /// keyCertSign
    CertSign,
    /// cRLSign
    CrlSign,
    /// encipherOnly
    EncipherOnly,
    /// decipherOnly
    DecipherOnly,
}

/// Key usage applied to a CA when none is requested.
pub const DEFAULT_CA_KEY_USAGE: [KeyUsage; 3] = [
    KeyUsage::DigitalSignature,
    KeyUsage::CertSign,
    KeyUsage::CrlSign,
];

impl KeyUsage {
    /// Returns the snake-case name of this usage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DigitalSignature => "digital_signature",
            Self::ContentCommitment => "content_commitment",
            Self::KeyEncipherment => "key_encipherment",
            Self::DataEncipherment => "data_encipherment",
            Self::KeyAgreement => "key_agreement",
            Self::CertSign => "cert_sign",
            Self::CrlSign => "crl_sign",
            Self::EncipherOnly => "encipher_only",
            Self::DecipherOnly => "decipher_only",
        }
    }

    pub(crate) const fn to_rcgen(self) -> KeyUsagePurpose {
        match self {
            Self::DigitalSignature => KeyUsagePurpose::DigitalSignature,
            Self::ContentCommitment => KeyUsagePurpose::ContentCommitment,
            Self::KeyEncipherment => KeyUsagePurpose::KeyEncipherment,
            Self::DataEncipherment => KeyUsagePurpose::DataEncipherment,
            Self::KeyAgreement => KeyUsagePurpose::KeyAgreement,
            Self::CertSign => KeyUsagePurpose::KeyCertSign,
            Self::CrlSign => KeyUsagePurpose::CrlSign,
            Self::EncipherOnly => KeyUsagePurpose::EncipherOnly,
            Self::DecipherOnly => KeyUsagePurpose::DecipherOnly,
        }
    }
}

impl fmt::Display for KeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for KeyUsage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "digital_signature" => Ok(Self::DigitalSignature),
            "content_commitment" | "non_repudiation" => Ok(Self::ContentCommitment),
            "key_encipherment" => Ok(Self::KeyEncipherment),
            "data_encipherment" => Ok(Self::DataEncipherment),
            "key_agreement" => Ok(Self::KeyAgreement),
            "cert_sign" => Ok(Self::CertSign),
            "crl_sign" => Ok(Self::CrlSign),
            "encipher_only" => Ok(Self::EncipherOnly),
            "decipher_only" => Ok(Self::DecipherOnly),
            other => Err(Error::Validation(format!("unknown key usage '{other}'"))),
        }
    }
}

/// Extended key usage purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtKeyUsage {
    /// TLS server authentication.
    ServerAuth,
    /// TLS client authentication.
    ClientAuth,
    /// Code signing.
    CodeSigning,
    /// S/MIME email protection.
    EmailProtection,
    /// Trusted timestamping.
    TimeStamping,
    /// OCSP response signing.
    OcspSigning,
}

/// Extended key usage applied to a leaf when none is requested.
pub const DEFAULT_EXT_KEY_USAGE: [ExtKeyUsage; 2] = [ExtKeyUsage::ClientAuth, ExtKeyUsage::ServerAuth];

impl ExtKeyUsage {
    /// Returns the OID string for this usage.
    #[must_use]
    pub const fn oid(&self) -> &'static str {
        match self {
            Self::ServerAuth => "1.3.6.1.5.5.7.3.1",
            Self::ClientAuth => "1.3.6.1.5.5.7.3.2",
            Self::CodeSigning => "1.3.6.1.5.5.7.3.3",
            Self::EmailProtection => "1.3.6.1.5.5.7.3.4",
            Self::TimeStamping => "1.3.6.1.5.5.7.3.8",
            Self::OcspSigning => "1.3.6.1.5.5.7.3.9",
        }
    }

    /// Returns the snake-case name of this usage.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ServerAuth => "server_auth",
            Self::ClientAuth => "client_auth",
            Self::CodeSigning => "code_signing",
            Self::EmailProtection => "email_protection",
            Self::TimeStamping => "time_stamping",
            Self::OcspSigning => "ocsp_signing",
        }
    }

    pub(crate) const fn to_rcgen(self) -> ExtendedKeyUsagePurpose {
        match self {
            Self::ServerAuth => ExtendedKeyUsagePurpose::ServerAuth,
            Self::ClientAuth => ExtendedKeyUsagePurpose::ClientAuth,
            Self::CodeSigning => ExtendedKeyUsagePurpose::CodeSigning,
            Self::EmailProtection => ExtendedKeyUsagePurpose::EmailProtection,
            Self::TimeStamping => ExtendedKeyUsagePurpose::TimeStamping,
            Self::OcspSigning => ExtendedKeyUsagePurpose::OcspSigning,
        }
    }
}

impl fmt::Display for ExtKeyUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtKeyUsage {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "server_auth" => Ok(Self::ServerAuth),
            "client_auth" => Ok(Self::ClientAuth),
            "code_signing" => Ok(Self::CodeSigning),
            "email_protection" => Ok(Self::EmailProtection),
            "time_stamping" => Ok(Self::TimeStamping),
            "ocsp_signing" => Ok(Self::OcspSigning),
            other => Err(Error::Validation(format!("unknown extended key usage '{other}'"))),
        }
    }
}

/// Per-issuance options for a leaf certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateOptions {
    /// RSA modulus size; ignored for ECDSA.
    pub key_bits: u32,
    /// Key algorithm.
    pub key_type: KeyType,
    /// `KeyUsage` bits; empty omits the extension.
    pub key_usage: Vec<KeyUsage>,
    /// Extended key usages; empty means client and server auth.
    pub ext_key_usage: Vec<ExtKeyUsage>,
    /// Write the private key and PKCS#12 bundle next to the certificate.
    pub export_private_key: bool,
}

impl Default for CertificateOptions {
    fn default() -> Self {
        Self {
            key_bits: DEFAULT_KEY_BITS,
            key_type: KeyType::Rsa,
            key_usage: Vec::new(),
            ext_key_usage: Vec::new(),
            export_private_key: true,
        }
    }
}

impl CertificateOptions {
    /// Returns the extended key usages to encode, applying the default.
    #[must_use]
    pub fn effective_ext_key_usage(&self) -> Vec<ExtKeyUsage> {
        if self.ext_key_usage.is_empty() {
            DEFAULT_EXT_KEY_USAGE.to_vec()
        } else {
            self.ext_key_usage.clone()
        }
    }
}

/// Request to issue a root or intermediate CA.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaRequest {
    /// Logical name; sanitized before it touches the filesystem.
    pub name: String,
    /// Subject of the CA certificate.
    pub subject: Subject,
    /// Validity period in days.
    pub validity_days: u32,
    /// RSA modulus size.
    pub key_bits: u32,
    /// `KeyUsage` bits; empty means digital signature, cert sign and CRL sign.
    pub key_usage: Vec<KeyUsage>,
}

impl CaRequest {
    /// Creates a new CA request builder.
    #[must_use]
    pub fn builder(subject: Subject) -> CaRequestBuilder {
        CaRequestBuilder {
            name: String::new(),
            subject,
            validity_days: DEFAULT_ROOT_VALIDITY_DAYS,
            key_bits: DEFAULT_KEY_BITS,
            key_usage: Vec::new(),
        }
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the common name is missing or validity is zero.
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.subject, self.validity_days)
    }

    /// Returns the key usage to encode, applying the CA default.
    #[must_use]
    pub fn effective_key_usage(&self) -> Vec<KeyUsage> {
        if self.key_usage.is_empty() {
            DEFAULT_CA_KEY_USAGE.to_vec()
        } else {
            self.key_usage.clone()
        }
    }
}

/// Builder for CA requests.
#[derive(Debug)]
pub struct CaRequestBuilder {
    name: String,
    subject: Subject,
    validity_days: u32,
    key_bits: u32,
    key_usage: Vec<KeyUsage>,
}

impl CaRequestBuilder {
    /// Sets the logical name of the CA.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the validity period in days.
    #[must_use]
    pub const fn validity_days(mut self, days: u32) -> Self {
        self.validity_days = days;
        self
    }

    /// Sets the RSA modulus size.
    #[must_use]
    pub const fn key_bits(mut self, bits: u32) -> Self {
        self.key_bits = bits;
        self
    }

    /// Adds a key usage.
    #[must_use]
    pub fn key_usage(mut self, usage: KeyUsage) -> Self {
        self.key_usage.push(usage);
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid.
    pub fn build(self) -> Result<CaRequest> {
        let request = CaRequest {
            name: self.name,
            subject: self.subject,
            validity_days: self.validity_days,
            key_bits: self.key_bits,
            key_usage: self.key_usage,
        };
        request.validate()?;
        Ok(request)
    }
}

/// Request to issue a leaf certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeafRequest {
    /// Subject of the leaf.
    pub subject: Subject,
    /// CA that signs the leaf.
    pub issuer: IssuerRef,
    /// Extra hostnames and IP addresses; the common name is always included.
    pub sans: Vec<String>,
    /// Validity period in days.
    pub validity_days: u32,
    /// PKCS#12 password; may be empty.
    #[serde(default, skip_serializing)]
    pub pfx_password: String,
    /// Key and extension options.
    pub options: CertificateOptions,
}

impl LeafRequest {
    /// Creates a new leaf request builder, issued by the default root.
    #[must_use]
    pub fn builder(subject: Subject) -> LeafRequestBuilder {
        LeafRequestBuilder {
            request: Self {
                subject,
                issuer: IssuerRef::default_root(),
                sans: Vec::new(),
                validity_days: DEFAULT_LEAF_VALIDITY_DAYS,
                pfx_password: String::new(),
                options: CertificateOptions::default(),
            },
        }
    }

    /// Validates the request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the common name is missing or validity is zero.
    pub fn validate(&self) -> Result<()> {
        validate_common(&self.subject, self.validity_days)
    }
}

/// Builder for leaf requests.
#[derive(Debug)]
pub struct LeafRequestBuilder {
    request: LeafRequest,
}

impl LeafRequestBuilder {
    /// Sets the issuing CA.
    #[must_use]
    pub fn issuer(mut self, issuer: IssuerRef) -> Self {
        self.request.issuer = issuer;
        self
    }

    /// Adds a hostname or IP address.
    #[must_use]
    pub fn san(mut self, san: impl Into<String>) -> Self {
        self.request.sans.push(san.into());
        self
    }

    /// Adds several hostnames or IP addresses.
    #[must_use]
    pub fn sans<I, S>(mut self, sans: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.request.sans.extend(sans.into_iter().map(Into::into));
        self
    }

    /// Sets the validity period in days.
    #[must_use]
    pub const fn validity_days(mut self, days: u32) -> Self {
        self.request.validity_days = days;
        self
    }

    /// Sets the PKCS#12 password.
    #[must_use]
    pub fn pfx_password(mut self, password: impl Into<String>) -> Self {
        self.request.pfx_password = password.into();
        self
    }

    /// Replaces the key and extension options.
    #[must_use]
    pub fn options(mut self, options: CertificateOptions) -> Self {
        self.request.options = options;
        self
    }

    /// Sets the key algorithm.
    #[must_use]
    pub const fn key_type(mut self, key_type: KeyType) -> Self {
        self.request.options.key_type = key_type;
        self
    }

    /// Sets the RSA modulus size.
    #[must_use]
    pub const fn key_bits(mut self, bits: u32) -> Self {
        self.request.options.key_bits = bits;
        self
    }

    /// Adds a key usage.
    #[must_use]
    pub fn key_usage(mut self, usage: KeyUsage) -> Self {
        self.request.options.key_usage.push(usage);
        self
    }

    /// Adds an extended key usage.
    #[must_use]
    pub fn ext_key_usage(mut self, usage: ExtKeyUsage) -> Self {
        self.request.options.ext_key_usage.push(usage);
        self
    }

    /// Adds server authentication extended key usage.
    #[must_use]
    pub fn server_auth(self) -> Self {
        self.ext_key_usage(ExtKeyUsage::ServerAuth)
    }

    /// Adds client authentication extended key usage.
    #[must_use]
    pub fn client_auth(self) -> Self {
        self.ext_key_usage(ExtKeyUsage::ClientAuth)
    }

    /// Controls whether the private key is written to disk.
    #[must_use]
    pub const fn export_private_key(mut self, export: bool) -> Self {
        self.request.options.export_private_key = export;
        self
    }

    /// Builds the request.
    ///
    /// # Errors
    ///
    /// Returns an error if the request is invalid.
    pub fn build(self) -> Result<LeafRequest> {
        self.request.validate()?;
        Ok(self.request)
    }
}

fn validate_common(subject: &Subject, validity_days: u32) -> Result<()> {
    if subject.common_name().is_none() {
        return Err(Error::Validation("common name is required".into()));
    }
    if validity_days == 0 {
        return Err(Error::Validation("validity_days must be greater than 0".into()));
    }
    Ok(())
}

/// A signed certificate with its placement in the trust store.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateRecord {
    /// Sanitized logical name (CA name, or leaf common name).
    pub name: String,
    /// Role of the certificate.
    pub role: Role,
    /// Signing CA; `None` for self-signed roots.
    pub issuer: Option<IssuerRef>,
    /// Serial number.
    pub serial: SerialNumber,
    /// Start of validity.
    pub not_before: DateTime<Utc>,
    /// End of validity.
    pub not_after: DateTime<Utc>,
    /// Certificate PEM path.
    pub cert_path: PathBuf,
    /// Private key PEM path, if the key was written.
    pub key_path: Option<PathBuf>,
    /// PKCS#12 bundle path, if one was written.
    pub pfx_path: Option<PathBuf>,
    /// DER-encoded certificate.
    #[serde(skip)]
    pub der: Vec<u8>,
}

impl CertificateRecord {
    /// Parses the signed certificate.
    ///
    /// # Errors
    ///
    /// Returns an error if the DER cannot be parsed.
    pub fn certificate(&self) -> Result<Certificate> {
        Certificate::from_der(&self.der)
    }
}

/// Result of a leaf issuance.
#[derive(Debug, Clone)]
pub struct IssuedCertificate {
    /// The signed certificate and where it was written.
    pub record: CertificateRecord,
    /// The leaf key when it was not exported to disk.
    pub private_key: Option<KeyMaterial>,
}

/// Read-only parsed view of a DER-encoded X.509 certificate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    der: Vec<u8>,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
    subject: String,
    issuer: String,
    common_name: Option<String>,
    serial: Vec<u8>,
    is_ca: bool,
    path_len_constraint: Option<u32>,
    key_usage: Vec<KeyUsage>,
    ext_key_usage: Vec<ExtKeyUsage>,
    dns_names: Vec<String>,
    ip_addresses: Vec<IpAddr>,
    public_key: Vec<u8>,
}

impl Certificate {
    /// Parses a certificate from DER-encoded bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if parsing fails.
    pub fn from_der(der: &[u8]) -> Result<Self> {
        let (_, cert) = x509_parser::parse_x509_certificate(der)
            .map_err(|e| Error::Parse(format!("failed to parse certificate: {e}")))?;

        let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_before timestamp".into()))?;
        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| Error::Parse("invalid not_after timestamp".into()))?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(String::from);

        let (is_ca, path_len_constraint) = match cert.basic_constraints() {
            Ok(Some(ext)) => (ext.value.ca, ext.value.path_len_constraint),
            Ok(None) => (false, None),
            Err(e) => return Err(Error::Parse(format!("invalid basic constraints: {e}"))),
        };

        let key_usage = match cert.key_usage() {
            Ok(Some(ext)) => extract_key_usage(ext.value),
            Ok(None) => Vec::new(),
            Err(e) => return Err(Error::Parse(format!("invalid key usage: {e}"))),
        };

        let ext_key_usage = match cert.extended_key_usage() {
            Ok(Some(ext)) => extract_ext_key_usage(ext.value),
            Ok(None) => Vec::new(),
            Err(e) => return Err(Error::Parse(format!("invalid extended key usage: {e}"))),
        };

        let (dns_names, ip_addresses) = extract_san(&cert);

        Ok(Self {
            der: der.to_vec(),
            not_before,
            not_after,
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            common_name,
            serial: cert.raw_serial().to_vec(),
            is_ca,
            path_len_constraint,
            key_usage,
            ext_key_usage,
            dns_names,
            ip_addresses,
            public_key: cert.public_key().raw.to_vec(),
        })
    }

    /// Parses the first `CERTIFICATE` block of a PEM document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the input is not a PEM certificate.
    pub fn from_pem(input: &str) -> Result<Self> {
        let block = pem::parse(input).map_err(|e| Error::Parse(format!("invalid PEM: {e}")))?;
        if block.tag() != "CERTIFICATE" {
            return Err(Error::Parse(format!(
                "expected a CERTIFICATE block, found '{}'",
                block.tag()
            )));
        }
        Self::from_der(block.contents())
    }

    /// Returns the DER-encoded certificate bytes.
    #[must_use]
    pub fn der(&self) -> &[u8] {
        &self.der
    }

    /// Returns the PEM-encoded certificate.
    #[must_use]
    pub fn pem(&self) -> String {
        crate::encoding::encode_pem(&pem::Pem::new("CERTIFICATE", self.der.clone()))
    }

    /// Returns the certificate validity start time.
    #[must_use]
    pub const fn not_before(&self) -> DateTime<Utc> {
        self.not_before
    }

    /// Returns the certificate validity end time.
    #[must_use]
    pub const fn not_after(&self) -> DateTime<Utc> {
        self.not_after
    }

    /// Returns the subject distinguished name, e.g. `CN=Test CA, O=cert-helper CA`.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the issuer distinguished name.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the first subject common name.
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref()
    }

    /// Returns the raw serial number bytes.
    #[must_use]
    pub fn raw_serial(&self) -> &[u8] {
        &self.serial
    }

    /// Returns the serial number if it fits in 128 bits.
    #[must_use]
    pub fn serial(&self) -> Option<SerialNumber> {
        SerialNumber::from_be_bytes(&self.serial)
    }

    /// Returns true if the basic constraints mark this certificate as a CA.
    #[must_use]
    pub const fn is_ca(&self) -> bool {
        self.is_ca
    }

    /// Returns the path length constraint; `None` means unconstrained.
    #[must_use]
    pub const fn path_len_constraint(&self) -> Option<u32> {
        self.path_len_constraint
    }

    /// Returns true if subject and issuer are the same name.
    #[must_use]
    pub fn is_self_issued(&self) -> bool {
        self.subject == self.issuer
    }

    /// Returns the `KeyUsage` bits that are set.
    #[must_use]
    pub fn key_usage(&self) -> &[KeyUsage] {
        &self.key_usage
    }

    /// Returns the extended key usages.
    #[must_use]
    pub fn ext_key_usage(&self) -> &[ExtKeyUsage] {
        &self.ext_key_usage
    }

    /// Returns the DNS subject alternative names.
    #[must_use]
    pub fn dns_names(&self) -> &[String] {
        &self.dns_names
    }

    /// Returns the IP subject alternative names.
    #[must_use]
    pub fn ip_addresses(&self) -> &[IpAddr] {
        &self.ip_addresses
    }

    /// Returns the DER `SubjectPublicKeyInfo`.
    #[must_use]
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_key
    }
}

fn extract_key_usage(ku: &x509_parser::extensions::KeyUsage) -> Vec<KeyUsage> {
    [
        (ku.digital_signature(), KeyUsage::DigitalSignature),
        (ku.non_repudiation(), KeyUsage::ContentCommitment),
        (ku.key_encipherment(), KeyUsage::KeyEncipherment),
        (ku.data_encipherment(), KeyUsage::DataEncipherment),
        (ku.key_agreement(), KeyUsage::KeyAgreement),
        (ku.key_cert_sign(), KeyUsage::CertSign),
        (ku.crl_sign(), KeyUsage::CrlSign),
        (ku.encipher_only(), KeyUsage::EncipherOnly),
        (ku.decipher_only(), KeyUsage::DecipherOnly),
    ]
    .into_iter()
    .filter_map(|(set, usage)| set.then_some(usage))
    .collect()
}

fn extract_ext_key_usage(eku: &x509_parser::extensions::ExtendedKeyUsage) -> Vec<ExtKeyUsage> {
    [
        (eku.server_auth, ExtKeyUsage::ServerAuth),
        (eku.client_auth, ExtKeyUsage::ClientAuth),
        (eku.code_signing, ExtKeyUsage::CodeSigning),
        (eku.email_protection, ExtKeyUsage::EmailProtection),
        (eku.time_stamping, ExtKeyUsage::TimeStamping),
        (eku.ocsp_signing, ExtKeyUsage::OcspSigning),
    ]
    .into_iter()
    .filter_map(|(set, usage)| set.then_some(usage))
    .collect()
}

fn extract_san(cert: &x509_parser::certificate::X509Certificate) -> (Vec<String>, Vec<IpAddr>) {
    use x509_parser::extensions::GeneralName;

    let mut dns_names = Vec::new();
    let mut ip_addresses = Vec::new();

    if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
        for name in &san_ext.value.general_names {
            match name {
                GeneralName::DNSName(dns) => dns_names.push((*dns).to_string()),
                GeneralName::IPAddress(bytes) => {
                    if let Some(ip) = parse_ip_bytes(bytes) {
                        ip_addresses.push(ip);
                    }
                }
                _ => {}
            }
        }
    }

    (dns_names, ip_addresses)
}

fn parse_ip_bytes(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => <[u8; 4]>::try_from(bytes).ok().map(IpAddr::from),
        16 => <[u8; 16]>::try_from(bytes).ok().map(IpAddr::from),
        _ => None,
    }
}
