//! # cert-cli
//!
//! Command-line front end for the cert-helper trust store.
//!
//! Provides commands for:
//! - Creating root CAs (`ca generate`)
//! - Creating intermediate CAs (`ca intermediate`)
//! - Listing CAs (`ca list`)
//! - Issuing leaf certificates (`cert generate`)
//!
//! The CLI holds no issuance logic. It merges flags and the configuration
//! file into request structs and hands them to [`cert_pki::TrustStore`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;

pub use cli::{Cli, Commands, Format};
pub use error::CliError;
pub use output::OutputFormat;
