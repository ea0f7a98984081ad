//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use cert_pki::{PkiConfig, Subject};

use crate::error::CliError;

/// Subject used by `ca generate` when none is given.
pub const DEFAULT_CA_SUBJECT: &str = "CN=Test CA";

/// Subject used by `ca intermediate` when no subject flags are given.
pub const DEFAULT_INTERMEDIATE_SUBJECT: &str = "CN=Intermediate CA";

/// cert-helper - local certificate authority and trust store.
#[derive(Parser, Debug, Clone)]
#[command(name = "cert-helper")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Trust-store directory.
    #[arg(short, long, env = "CERT_HELPER_OUTPUT_DIR", global = true)]
    pub output_dir: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long, env = "CERT_HELPER_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table, global = true)]
    pub format: Format,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Builds the effective configuration: defaults, then the config file,
    /// then `--output-dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded.
    pub fn load_config(&self) -> Result<PkiConfig, CliError> {
        let mut config = match &self.config {
            Some(path) => PkiConfig::from_file(path)?,
            None => PkiConfig::default(),
        };
        if let Some(dir) = &self.output_dir {
            config.output_dir.clone_from(dir);
        }
        Ok(config)
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Certificate authority management.
    Ca {
        /// CA subcommand to execute.
        #[command(subcommand)]
        command: CaCommands,
    },

    /// Leaf certificate issuance.
    Cert {
        /// Certificate subcommand to execute.
        #[command(subcommand)]
        command: CertCommands,
    },
}

/// CA subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum CaCommands {
    /// Create a self-signed root CA.
    Generate(CaGenerateArgs),

    /// Create an intermediate CA signed by a root.
    Intermediate(CaIntermediateArgs),

    /// List the root and intermediate CAs in the trust store.
    List,
}

/// Certificate subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum CertCommands {
    /// Issue a leaf certificate.
    Generate(CertGenerateArgs),
}

/// Distinguished-name flags shared by every issuing command.
///
/// `--subject` is parsed first; the individual flags then override its fields.
#[derive(Args, Debug, Clone, Default)]
pub struct SubjectArgs {
    /// Subject as `CN=..,O=..,OU=..,C=..,ST=..,L=..`.
    #[arg(long)]
    pub subject: Option<String>,

    /// Common name.
    #[arg(long, alias = "common-name")]
    pub cn: Option<String>,

    /// Organization.
    #[arg(long, alias = "organization")]
    pub org: Option<String>,

    /// Organizational unit.
    #[arg(long, alias = "organizational-unit")]
    pub ou: Option<String>,

    /// Country.
    #[arg(long)]
    pub country: Option<String>,

    /// State or province.
    #[arg(long, alias = "state")]
    pub province: Option<String>,

    /// Locality.
    #[arg(long)]
    pub locality: Option<String>,
}

impl SubjectArgs {
    /// Merges the flags into a subject, parsing `fallback` when `--subject`
    /// was not given.
    #[must_use]
    pub fn to_subject(&self, fallback: &str) -> Subject {
        let mut subject = Subject::parse(self.subject.as_deref().unwrap_or(fallback));
        for (field, value) in [
            (&mut subject.common_name, &self.cn),
            (&mut subject.organization, &self.org),
            (&mut subject.organizational_unit, &self.ou),
            (&mut subject.country, &self.country),
            (&mut subject.province, &self.province),
            (&mut subject.locality, &self.locality),
        ] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *field = Some(value.to_string());
            }
        }
        subject
    }
}

/// Arguments for `ca generate`.
#[derive(Args, Debug, Clone)]
pub struct CaGenerateArgs {
    /// Root CA name; blank is the default root.
    #[arg(long, default_value = "")]
    pub name: String,

    /// Subject fields.
    #[command(flatten)]
    pub subject: SubjectArgs,

    /// Validity in days [default: 3600].
    #[arg(long)]
    pub validity: Option<u32>,

    /// RSA key size.
    #[arg(long)]
    pub key_bits: Option<u32>,

    /// Key usages (comma-separated, e.g. `cert_sign,crl_sign`).
    #[arg(long, value_delimiter = ',')]
    pub key_usage: Vec<String>,
}

/// Arguments for `ca intermediate`.
#[derive(Args, Debug, Clone)]
pub struct CaIntermediateArgs {
    /// Name of the signing root.
    #[arg(long, default_value = "default")]
    pub root: String,

    /// Intermediate name; defaults to the common name.
    #[arg(long)]
    pub name: Option<String>,

    /// Subject fields.
    #[command(flatten)]
    pub subject: SubjectArgs,

    /// Validity in days [default: 1800].
    #[arg(long)]
    pub validity: Option<u32>,

    /// RSA key size.
    #[arg(long)]
    pub key_bits: Option<u32>,

    /// Key usages (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub key_usage: Vec<String>,
}

/// Arguments for `cert generate`.
#[derive(Args, Debug, Clone)]
pub struct CertGenerateArgs {
    /// Common name, used when the subject flags carry none.
    pub common_name: Option<String>,

    /// Subject fields.
    #[command(flatten)]
    pub subject: SubjectArgs,

    /// Issuer type: `root` or `intermediate`.
    #[arg(long, default_value = "root")]
    pub issuer_type: String,

    /// Issuer name (the root name, or the intermediate name).
    #[arg(long, default_value = "")]
    pub issuer_name: String,

    /// Parent root of an intermediate issuer.
    #[arg(long, default_value = "default")]
    pub issuer_root: String,

    /// Validity in days [default: 365].
    #[arg(long)]
    pub validity: Option<u32>,

    /// Extra subject alternative names (comma-separated or repeated).
    #[arg(long, value_delimiter = ',')]
    pub san: Vec<String>,

    /// Password for the PKCS#12 bundle.
    #[arg(long, default_value = "")]
    pub pfx_password: String,

    /// Key type: `rsa` or `ecdsa`.
    #[arg(long)]
    pub key_type: Option<String>,

    /// RSA key size.
    #[arg(long)]
    pub key_bits: Option<u32>,

    /// Key usages (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub key_usage: Vec<String>,

    /// Extended key usages (comma-separated) [default: client_auth,server_auth].
    #[arg(long, value_delimiter = ',')]
    pub ext_key_usage: Vec<String>,

    /// Do not write the private key or PKCS#12 bundle.
    #[arg(long)]
    pub no_export_key: bool,
}
