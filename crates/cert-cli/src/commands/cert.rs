//! Leaf certificate command implementation.

use std::io::Write;

use tracing::warn;

use cert_pki::{IssuerRef, KeyType, LeafRequest, PkiConfig, TrustStore};

use super::{parse_ext_key_usages, parse_key_usages};
use crate::cli::{CertCommands, CertGenerateArgs};
use crate::error::CliError;
use crate::output::OutputFormat;

/// Handler for certificate subcommands.
pub struct CertCommand<'a> {
    config: &'a PkiConfig,
}

impl<'a> CertCommand<'a> {
    /// Creates a new certificate command handler.
    #[must_use]
    pub const fn new(config: &'a PkiConfig) -> Self {
        Self { config }
    }

    /// Executes the certificate subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &CertCommands,
    ) -> Result<(), CliError> {
        match command {
            CertCommands::Generate(args) => self.generate(out, format, args),
        }
    }

    fn generate<W: Write>(&self, out: &mut W, format: &OutputFormat, args: &CertGenerateArgs) -> Result<(), CliError> {
        let request = self.build_request(args)?;
        let issued = TrustStore::new(&self.config.output_dir).issue_certificate(&request)?;
        if issued.private_key.is_some() {
            warn!(name = %issued.record.name, "private key was not exported and is discarded");
        }
        format.write(out, &issued.record)
    }

    /// Merges flags and configuration into a leaf request.
    fn build_request(&self, args: &CertGenerateArgs) -> Result<LeafRequest, CliError> {
        let mut subject = args.subject.to_subject("");
        if subject.common_name().is_none() {
            if let Some(cn) = &args.common_name {
                subject = subject.with_common_name(cn.as_str());
            }
        }

        let issuer = IssuerRef::select(&args.issuer_type, &args.issuer_root, &args.issuer_name)?;

        let mut options = self.config.leaf_options();
        if let Some(key_type) = &args.key_type {
            options.key_type = KeyType::normalize(key_type);
        }
        if let Some(bits) = args.key_bits {
            options.key_bits = bits;
        }
        options.key_usage = parse_key_usages(&args.key_usage)?;
        options.ext_key_usage = parse_ext_key_usages(&args.ext_key_usage)?;
        options.export_private_key = !args.no_export_key;

        Ok(LeafRequest::builder(subject)
            .issuer(issuer)
            .sans(&args.san)
            .validity_days(args.validity.unwrap_or(self.config.leaf_validity_days))
            .pfx_password(args.pfx_password.as_str())
            .options(options)
            .build()?)
    }
}
