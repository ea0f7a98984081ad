//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`ca`] - Root and intermediate CA management
//! - [`cert`] - Leaf certificate issuance

pub mod ca;
pub mod cert;

pub use ca::CaCommand;
pub use cert::CertCommand;

use cert_pki::{ExtKeyUsage, KeyUsage};

use crate::error::CliError;

/// Parses `--key-usage` values, skipping blanks.
pub(crate) fn parse_key_usages(values: &[String]) -> Result<Vec<KeyUsage>, CliError> {
    values
        .iter()
        .map(String::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse()
                .map_err(|_| CliError::InvalidArgument(format!("unknown key usage '{v}'")))
        })
        .collect()
}

/// Parses `--ext-key-usage` values, skipping blanks.
pub(crate) fn parse_ext_key_usages(values: &[String]) -> Result<Vec<ExtKeyUsage>, CliError> {
    values
        .iter()
        .map(String::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse()
                .map_err(|_| CliError::InvalidArgument(format!("unknown extended key usage '{v}'")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_string()).collect()
    }

    #[test]
    fn parses_usage_lists() {
        let usages = parse_key_usages(&strings(&["cert_sign", " ", "CRL_SIGN"])).unwrap();
        assert_eq!(usages, [KeyUsage::CertSign, KeyUsage::CrlSign]);

        let ext = parse_ext_key_usages(&strings(&["client_auth"])).unwrap();
        assert_eq!(ext, [ExtKeyUsage::ClientAuth]);
    }

    #[test]
    fn rejects_unknown_usage() {
        let err = parse_ext_key_usages(&strings(&["teleport"])).unwrap_err();
        assert_eq!(err.to_string(), "invalid argument: unknown extended key usage 'teleport'");
    }
}
