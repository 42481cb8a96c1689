// SPDX-License-Identifier: MPL-2.0

use std::{fmt, str::FromStr};

/// A two-letter, uppercase country code, e.g. `FR`.
///
/// ISO 3166-1 alpha-2 is assumed but not checked; any two uppercase ASCII letters are accepted.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CountryCode([u8; 2]);

impl CountryCode {
    /// Creates a country code from two bytes, returning `None` unless both are uppercase ASCII
    /// letters.
    pub const fn new(bytes: [u8; 2]) -> Option<Self> {
        if bytes[0].is_ascii_uppercase() && bytes[1].is_ascii_uppercase() {
            Some(Self(bytes))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        // Both bytes are ASCII.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("expected two uppercase ASCII letters")]
pub struct ParseCountryCodeError;

impl FromStr for CountryCode {
    type Err = ParseCountryCodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match *s.as_bytes() {
            [a, b] => Self::new([a, b]).ok_or(ParseCountryCodeError),
            _ => Err(ParseCountryCodeError),
        }
    }
}

impl TryFrom<&str> for CountryCode {
    type Error = ParseCountryCodeError;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}
