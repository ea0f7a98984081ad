//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use cert_pki::{CertificateRecord, IntermediateCaInfo};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

impl TableDisplay for CertificateRecord {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "✓ Issued {} '{}'", self.role, self.name)?;
        writeln!(writer, "══════════════════════════════════")?;
        if let Some(issuer) = &self.issuer {
            writeln!(writer, "Issuer:      {issuer}")?;
        }
        writeln!(writer, "Serial:      {}", self.serial)?;
        writeln!(writer, "Not Before:  {}", self.not_before.to_rfc3339())?;
        writeln!(writer, "Not After:   {}", self.not_after.to_rfc3339())?;
        writeln!(writer)?;
        writeln!(writer, "Certificate: {}", self.cert_path.display())?;
        writeln!(writer, "Key:         {}", optional_path(self.key_path.as_deref()))?;
        if self.pfx_path.is_some() || self.role == cert_pki::Role::Leaf {
            writeln!(writer, "PKCS#12:     {}", optional_path(self.pfx_path.as_deref()))?;
        }
        Ok(())
    }
}

/// Root and intermediate CAs present in a trust store.
#[derive(Debug, Clone, Serialize)]
pub struct CaList {
    /// Root CA names.
    pub roots: Vec<String>,
    /// Intermediate CAs with their parent root.
    pub intermediates: Vec<IntermediateCaInfo>,
}

impl TableDisplay for CaList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.roots.is_empty() && self.intermediates.is_empty() {
            writeln!(writer, "No CAs in trust store")?;
            writeln!(writer)?;
            writeln!(writer, "Create one with: cert-helper ca generate")?;
            return Ok(());
        }

        writeln!(writer, "{:<14}  {:<24}  {:<24}", "ROLE", "NAME", "ROOT")?;
        writeln!(writer, "{}", "─".repeat(66))?;
        for root in &self.roots {
            writeln!(writer, "{:<14}  {:<24}  {:<24}", "root", root, "-")?;
        }
        for info in &self.intermediates {
            writeln!(
                writer,
                "{:<14}  {:<24}  {:<24}",
                "intermediate", info.name, info.root_name
            )?;
        }

        writeln!(writer)?;
        writeln!(
            writer,
            "Total: {} root(s), {} intermediate(s)",
            self.roots.len(),
            self.intermediates.len()
        )?;
        Ok(())
    }
}

fn optional_path(path: Option<&Path>) -> String {
    path.map_or_else(|| "(not exported)".to_string(), |p| p.display().to_string())
}
