//! CLI error types.

use std::fmt;

/// CLI-specific errors.
#[derive(Debug)]
pub enum CliError {
    /// Trust-store or issuance failure.
    Pki(cert_pki::Error),
    /// Invalid argument.
    InvalidArgument(String),
    /// Output formatting error.
    Format(String),
    /// IO error.
    Io(std::io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pki(e) => write!(f, "{e}"),
            Self::InvalidArgument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Format(msg) => write!(f, "format error: {msg}"),
            Self::Io(e) => write!(f, "IO error: {e}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Pki(e) => Some(e),
            Self::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<cert_pki::Error> for CliError {
    fn from(err: cert_pki::Error) -> Self {
        Self::Pki(err)
    }
}

impl From<std::io::Error> for CliError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_error_display_invalid_argument() {
        let err = CliError::InvalidArgument("unknown key usage 'sign'".into());
        assert_eq!(err.to_string(), "invalid argument: unknown key usage 'sign'");
    }

    #[test]
    fn cli_error_passes_pki_message_through() {
        let err = CliError::from(cert_pki::Error::Validation("common name is required".into()));
        assert_eq!(err.to_string(), "validation failed: common name is required");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn cli_error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let cli_err = CliError::from(io_err);
        assert!(matches!(cli_err, CliError::Io(_)));
    }
}
