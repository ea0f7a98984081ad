//! Key material generation and encoding.
//!
//! Every issuance generates a fresh key pair. RSA and ECDSA P-256 keys are
//! modelled as one tagged enum, [`KeyMaterial`], and every capability
//! (PEM encoding, PKCS#8 export, signing) dispatches on the variant.

use std::fmt;

use rand::rngs::OsRng;
use rsa::pkcs1::{DecodeRsaPrivateKey, EncodeRsaPrivateKey};
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::RsaPrivateKey;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// RSA modulus size used when none (or an unsupported one) is requested.
pub const DEFAULT_KEY_BITS: u32 = 2048;

/// RSA modulus sizes accepted as-is.
pub const SUPPORTED_RSA_BITS: [u32; 3] = [2048, 3072, 4096];

/// PEM label for PKCS#1 RSA keys.
pub const RSA_PRIVATE_KEY_LABEL: &str = "RSA PRIVATE KEY";
/// PEM label for SEC1 EC keys.
pub const EC_PRIVATE_KEY_LABEL: &str = "EC PRIVATE KEY";
/// PEM label for PKCS#8 keys.
pub const PRIVATE_KEY_LABEL: &str = "PRIVATE KEY";

/// Asymmetric algorithm of a key pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyType {
    /// RSA with a 2048, 3072 or 4096 bit modulus.
    #[default]
    Rsa,
    /// ECDSA over NIST P-256.
    #[serde(alias = "ecdsa", alias = "ecdsa-p256")]
    EcdsaP256,
}

impl KeyType {
    /// Normalizes a free-form key type. Unrecognized values fall back to RSA.
    #[must_use]
    pub fn normalize(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "ecdsa" | "ecdsa_p256" | "ecdsa-p256" => Self::EcdsaP256,
            _ => Self::Rsa,
        }
    }

    /// Returns the canonical name of the key type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Rsa => "rsa",
            Self::EcdsaP256 => "ecdsa_p256",
        }
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalizes an RSA modulus size: supported sizes pass through, anything else becomes 2048.
#[must_use]
pub const fn normalize_key_bits(bits: u32) -> u32 {
    match bits {
        2048 | 3072 | 4096 => bits,
        _ => DEFAULT_KEY_BITS,
    }
}

/// Generates a key pair from a free-form key type and bit length.
///
/// # Errors
///
/// Returns [`Error::KeyGeneration`] if the entropy source or algorithm fails.
pub fn generate_key_pair(key_type: &str, key_bits: u32) -> Result<KeyMaterial> {
    KeyMaterial::generate(KeyType::normalize(key_type), key_bits)
}

/// A private key tagged with its algorithm.
#[derive(Clone)]
pub enum KeyMaterial {
    /// RSA private key.
    Rsa(Box<RsaPrivateKey>),
    /// ECDSA P-256 private key.
    EcdsaP256(p256::SecretKey),
}

impl KeyMaterial {
    /// Generates a fresh key pair.
    ///
    /// `key_bits` only applies to RSA and is normalized with [`normalize_key_bits`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyGeneration`] if the entropy source or algorithm fails.
    pub fn generate(key_type: KeyType, key_bits: u32) -> Result<Self> {
        match key_type {
            KeyType::Rsa => Self::generate_rsa(key_bits),
            KeyType::EcdsaP256 => {
                debug!("generating ECDSA P-256 key");
                Ok(Self::EcdsaP256(p256::SecretKey::random(&mut OsRng)))
            }
        }
    }

    /// Generates a fresh RSA key pair.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyGeneration`] if key generation fails.
    pub fn generate_rsa(key_bits: u32) -> Result<Self> {
        let bits = normalize_key_bits(key_bits);
        debug!(bits, "generating RSA key");
        let key = RsaPrivateKey::new(&mut OsRng, bits as usize)
            .map_err(|e| Error::KeyGeneration(format!("failed to generate {bits}-bit RSA key: {e}")))?;
        Ok(Self::Rsa(Box::new(key)))
    }

    /// Returns the algorithm of this key.
    #[must_use]
    pub const fn key_type(&self) -> KeyType {
        match self {
            Self::Rsa(_) => KeyType::Rsa,
            Self::EcdsaP256(_) => KeyType::EcdsaP256,
        }
    }

    /// Returns the key strength in bits.
    #[must_use]
    pub fn bits(&self) -> usize {
        match self {
            Self::Rsa(key) => key.size() * 8,
            Self::EcdsaP256(_) => 256,
        }
    }

    /// Returns the PEM block label this key is written with.
    #[must_use]
    pub const fn pem_label(&self) -> &'static str {
        match self {
            Self::Rsa(_) => RSA_PRIVATE_KEY_LABEL,
            Self::EcdsaP256(_) => EC_PRIVATE_KEY_LABEL,
        }
    }

    /// Encodes the key as a PEM block: PKCS#1 for RSA, SEC1 for EC.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if DER serialization fails.
    pub fn to_pem(&self) -> Result<pem::Pem> {
        let der = match self {
            Self::Rsa(key) => key
                .to_pkcs1_der()
                .map_err(|e| Error::Encoding(format!("failed to encode RSA key: {e}")))?
                .as_bytes()
                .to_vec(),
            Self::EcdsaP256(key) => key
                .to_sec1_der()
                .map_err(|e| Error::Encoding(format!("failed to encode EC key: {e}")))?
                .to_vec(),
        };
        Ok(pem::Pem::new(self.pem_label(), der))
    }

    /// Exports the key as PKCS#8 DER.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if DER serialization fails.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let document = match self {
            Self::Rsa(key) => key.to_pkcs8_der(),
            Self::EcdsaP256(key) => key.to_pkcs8_der(),
        }
        .map_err(|e| Error::Encoding(format!("failed to encode PKCS#8 key: {e}")))?;
        Ok(Zeroizing::new(document.as_bytes().to_vec()))
    }

    /// Returns the DER `SubjectPublicKeyInfo` of the public half.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encoding`] if DER serialization fails.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        let document = match self {
            Self::Rsa(key) => key.to_public_key().to_public_key_der(),
            Self::EcdsaP256(key) => key.public_key().to_public_key_der(),
        }
        .map_err(|e| Error::Encoding(format!("failed to encode public key: {e}")))?;
        Ok(document.as_bytes().to_vec())
    }

    /// Decodes a key from a PEM block, dispatching on the block label.
    ///
    /// A generic `PRIVATE KEY` block is tried as RSA first, then P-256.
    ///
    /// # Errors
    ///
    /// Returns a description of the failure; callers attach the file path.
    pub fn from_pem(block: &pem::Pem) -> std::result::Result<Self, String> {
        match block.tag() {
            RSA_PRIVATE_KEY_LABEL => RsaPrivateKey::from_pkcs1_der(block.contents())
                .map(|key| Self::Rsa(Box::new(key)))
                .map_err(|e| format!("invalid PKCS#1 RSA key: {e}")),
            EC_PRIVATE_KEY_LABEL => p256::SecretKey::from_sec1_der(block.contents())
                .map(Self::EcdsaP256)
                .map_err(|e| format!("invalid SEC1 P-256 key: {e}")),
            PRIVATE_KEY_LABEL => RsaPrivateKey::from_pkcs8_der(block.contents())
                .map(|key| Self::Rsa(Box::new(key)))
                .or_else(|_| p256::SecretKey::from_pkcs8_der(block.contents()).map(Self::EcdsaP256))
                .map_err(|e| format!("unsupported PKCS#8 key: {e}")),
            other => Err(format!("unexpected PEM block '{other}', expected a private key")),
        }
    }

    /// Builds the rcgen signer for this key.
    pub(crate) fn signing_key_pair(&self) -> Result<rcgen::KeyPair> {
        let der = self.to_pkcs8_der()?;
        rcgen::KeyPair::try_from(der.as_slice())
            .map_err(|e| Error::Encoding(format!("failed to load {} signing key: {e}", self.key_type())))
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_type", &self.key_type())
            .field("bits", &self.bits())
            .field("key", &"[REDACTED]")
            .finish()
    }
}
