//! Subject alternative name normalization.

use std::net::IpAddr;

use rcgen::string::Ia5String;
use rcgen::SanType;
use tracing::debug;

use crate::error::{Error, Result};

/// Normalized DNS and IP subject alternative names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanSet {
    /// ASCII hostnames, in first-seen order.
    pub dns_names: Vec<String>,
    /// IP addresses, in first-seen order.
    pub ip_addresses: Vec<IpAddr>,
}

impl SanSet {
    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dns_names.is_empty() && self.ip_addresses.is_empty()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.dns_names.len() + self.ip_addresses.len()
    }

    pub(crate) fn to_rcgen(&self) -> Result<Vec<SanType>> {
        let dns = self.dns_names.iter().map(|name| {
            Ia5String::try_from(name.clone())
                .map(SanType::DnsName)
                .map_err(|e| Error::Encoding(format!("invalid DNS name '{name}': {e}")))
        });
        let ips = self.ip_addresses.iter().map(|ip| Ok(SanType::IpAddress(*ip)));
        dns.chain(ips).collect()
    }
}

/// Splits raw SAN candidates into DNS names and IP addresses.
///
/// Entries are trimmed and blank ones dropped. Anything that parses as an
/// IPv4 or IPv6 address is an IP SAN. Other entries become DNS SANs: pure
/// ASCII passes through untouched, anything else goes through IDNA ToASCII
/// with the STD3 hostname rules, so spaces, slashes and control characters
/// are rejected rather than punycoded.
/// Duplicates are kept once, at their first position.
///
/// # Errors
///
/// Returns [`Error::Encoding`] if a hostname cannot be converted to ASCII.
pub fn normalize_sans<I, S>(entries: I) -> Result<SanSet>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut set = SanSet::default();

    for entry in entries {
        let trimmed = entry.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            if !set.ip_addresses.contains(&ip) {
                set.ip_addresses.push(ip);
            }
            continue;
        }

        let ascii = to_ascii_hostname(trimmed)?;
        if !set.dns_names.contains(&ascii) {
            set.dns_names.push(ascii);
        }
    }

    debug!(
        dns = set.dns_names.len(),
        ips = set.ip_addresses.len(),
        "normalized subject alternative names"
    );
    Ok(set)
}

fn to_ascii_hostname(host: &str) -> Result<String> {
    if host.is_ascii() {
        return Ok(host.to_string());
    }
    idna::domain_to_ascii_strict(host)
        .map_err(|e| Error::Encoding(format!("failed to convert SAN '{host}' to ASCII: {e}")))
}
