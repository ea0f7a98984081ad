//! Distinguished-name subjects.
//!
//! A [`Subject`] is built either field by field or by parsing a
//! `CN=..,O=..` string. It is converted to an X.500 name only at signing
//! time, in the fixed order CN, O, OU, C, ST, L.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use rcgen::{DistinguishedName, DnType, DnValue};
use serde::{Deserialize, Serialize};

/// Certificate subject. Every field is optional; issuance requires a common name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct Subject {
    /// CN
    pub common_name: Option<String>,
    /// O
    pub organization: Option<String>,
    /// OU
    pub organizational_unit: Option<String>,
    /// C
    pub country: Option<String>,
    /// ST
    pub province: Option<String>,
    /// L
    pub locality: Option<String>,
}

impl Subject {
    /// Creates a subject with only a common name.
    #[must_use]
    pub fn new(common_name: impl Into<String>) -> Self {
        Self::default().with_common_name(common_name)
    }

    /// Parses a `K=V,K=V` subject string.
    ///
    /// Blank input gives an empty subject. Input without any `=` is taken
    /// whole as the common name. Otherwise keys (`CN`, `O`, `OU`, `C`, `ST`,
    /// `L`) match case-insensitively; unknown keys, pairs without `=`, and
    /// empty values are ignored.
    #[must_use]
    pub fn parse(input: &str) -> Self {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Self::default();
        }
        if !trimmed.contains('=') {
            return Self::new(trimmed);
        }

        let mut subject = Self::default();
        for part in trimmed.split(',') {
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let slot = match key.trim().to_ascii_uppercase().as_str() {
                "CN" => &mut subject.common_name,
                "O" => &mut subject.organization,
                "OU" => &mut subject.organizational_unit,
                "C" => &mut subject.country,
                "ST" => &mut subject.province,
                "L" => &mut subject.locality,
                _ => continue,
            };
            *slot = Some(value.to_string());
        }
        subject
    }

    /// Sets the common name.
    #[must_use]
    pub fn with_common_name(mut self, value: impl Into<String>) -> Self {
        self.common_name = non_empty(value.into());
        self
    }

    /// Sets the organization.
    #[must_use]
    pub fn with_organization(mut self, value: impl Into<String>) -> Self {
        self.organization = non_empty(value.into());
        self
    }

    /// Returns the common name if set and non-blank.
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.common_name.as_deref().map(str::trim).filter(|cn| !cn.is_empty())
    }

    /// Returns true if no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields().all(|(_, value)| value.is_none())
    }

    /// Builds the X.500 name, omitting unset fields.
    #[must_use]
    pub fn distinguished_name(&self) -> DistinguishedName {
        let mut dn = DistinguishedName::new();
        for (dn_type, value) in self.dn_fields() {
            if let Some(value) = value {
                let value = dn_value(&dn_type, value);
                dn.push(dn_type, value);
            }
        }
        dn
    }

    fn fields(&self) -> impl Iterator<Item = (&'static str, Option<&str>)> {
        [
            ("CN", self.common_name.as_deref()),
            ("O", self.organization.as_deref()),
            ("OU", self.organizational_unit.as_deref()),
            ("C", self.country.as_deref()),
            ("ST", self.province.as_deref()),
            ("L", self.locality.as_deref()),
        ]
        .into_iter()
    }

    fn dn_fields(&self) -> [(DnType, Option<&str>); 6] {
        [
            (DnType::CommonName, self.common_name.as_deref()),
            (DnType::OrganizationName, self.organization.as_deref()),
            (DnType::OrganizationalUnitName, self.organizational_unit.as_deref()),
            (DnType::CountryName, self.country.as_deref()),
            (DnType::StateOrProvinceName, self.province.as_deref()),
            (DnType::LocalityName, self.locality.as_deref()),
        ]
    }
}

// Country codes are PrintableString in practice.
fn dn_value(dn_type: &DnType, value: &str) -> DnValue {
    if *dn_type == DnType::CountryName {
        if let Ok(printable) = rcgen::string::PrintableString::try_from(value) {
            return DnValue::PrintableString(printable);
        }
    }
    DnValue::Utf8String(value.to_string())
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in self.fields() {
            if let Some(value) = value {
                if !first {
                    f.write_str(",")?;
                }
                write!(f, "{key}={value}")?;
                first = false;
            }
        }
        Ok(())
    }
}

impl FromStr for Subject {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}
