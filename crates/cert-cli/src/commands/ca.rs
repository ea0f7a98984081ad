//! CA command implementation.
//!
//! Creates root and intermediate CAs and lists the ones already present.

use std::io::Write;

use tracing::debug;

use cert_pki::{CaRequest, PkiConfig, TrustStore};

use super::parse_key_usages;
use crate::cli::{
    CaCommands, CaGenerateArgs, CaIntermediateArgs, DEFAULT_CA_SUBJECT, DEFAULT_INTERMEDIATE_SUBJECT,
};
use crate::error::CliError;
use crate::output::{CaList, OutputFormat};

/// Handler for CA subcommands.
pub struct CaCommand<'a> {
    config: &'a PkiConfig,
}

impl<'a> CaCommand<'a> {
    /// Creates a new CA command handler.
    #[must_use]
    pub const fn new(config: &'a PkiConfig) -> Self {
        Self { config }
    }

    /// Executes the CA subcommand.
    ///
    /// # Errors
    ///
    /// Returns error if the command fails.
    pub fn execute<W: Write>(
        &self,
        out: &mut W,
        format: &OutputFormat,
        command: &CaCommands,
    ) -> Result<(), CliError> {
        let store = TrustStore::new(&self.config.output_dir);
        match command {
            CaCommands::Generate(args) => self.generate(&store, out, format, args),
            CaCommands::Intermediate(args) => self.intermediate(&store, out, format, args),
            CaCommands::List => Self::list(&store, out, format),
        }
    }

    fn generate<W: Write>(
        &self,
        store: &TrustStore,
        out: &mut W,
        format: &OutputFormat,
        args: &CaGenerateArgs,
    ) -> Result<(), CliError> {
        let mut subject = args.subject.to_subject(DEFAULT_CA_SUBJECT);
        if subject.organization.is_none() {
            subject = subject.with_organization(self.config.default_organization.as_str());
        }

        let mut builder = CaRequest::builder(subject)
            .name(args.name.as_str())
            .validity_days(args.validity.unwrap_or(self.config.root_validity_days))
            .key_bits(args.key_bits.unwrap_or(self.config.key_bits));
        for usage in parse_key_usages(&args.key_usage)? {
            builder = builder.key_usage(usage);
        }
        let request = builder.build()?;

        let record = store.issue_root(&request)?;
        format.write(out, &record)
    }

    fn intermediate<W: Write>(
        &self,
        store: &TrustStore,
        out: &mut W,
        format: &OutputFormat,
        args: &CaIntermediateArgs,
    ) -> Result<(), CliError> {
        let subject = args.subject.to_subject(DEFAULT_INTERMEDIATE_SUBJECT);
        let name = args
            .name
            .clone()
            .or_else(|| subject.common_name().map(str::to_string))
            .unwrap_or_default();
        debug!(root = %args.root, name = %name, "resolved intermediate name");

        let mut builder = CaRequest::builder(subject)
            .name(name)
            .validity_days(args.validity.unwrap_or(self.config.intermediate_validity_days))
            .key_bits(args.key_bits.unwrap_or(self.config.key_bits));
        for usage in parse_key_usages(&args.key_usage)? {
            builder = builder.key_usage(usage);
        }
        let request = builder.build()?;

        let record = store.issue_intermediate(&args.root, &request)?;
        format.write(out, &record)
    }

    fn list<W: Write>(store: &TrustStore, out: &mut W, format: &OutputFormat) -> Result<(), CliError> {
        let list = CaList {
            roots: store.list_root_cas()?,
            intermediates: store.list_all_intermediate_cas()?,
        };
        format.write(out, &list)
    }
}
