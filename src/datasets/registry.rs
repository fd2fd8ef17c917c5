//! Regional Internet Registries and the country-to-registry table

use crate::error::PrefixError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// One of the five Regional Internet Registries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rir {
    RipeNcc,
    Apnic,
    Arin,
    Lacnic,
    Afrinic,
}

impl Rir {
    pub fn all() -> [Rir; 5] {
        [Rir::RipeNcc, Rir::Apnic, Rir::Arin, Rir::Lacnic, Rir::Afrinic]
    }

    /// Display name, e.g. "RIPE NCC"
    pub fn name(&self) -> &'static str {
        match self {
            Rir::RipeNcc => "RIPE NCC",
            Rir::Apnic => "APNIC",
            Rir::Arin => "ARIN",
            Rir::Lacnic => "LACNIC",
            Rir::Afrinic => "AFRINIC",
        }
    }

    /// Registry identifier as it appears in the first column of delegated files
    pub fn code(&self) -> &'static str {
        match self {
            Rir::RipeNcc => "ripencc",
            Rir::Apnic => "apnic",
            Rir::Arin => "arin",
            Rir::Lacnic => "lacnic",
            Rir::Afrinic => "afrinic",
        }
    }

    /// URL of the latest delegated statistics file
    pub fn url(&self) -> &'static str {
        match self {
            Rir::RipeNcc => "https://ftp.ripe.net/ripe/stats/delegated-ripencc-latest",
            Rir::Apnic => "https://ftp.apnic.net/stats/apnic/delegated-apnic-latest",
            Rir::Arin => "https://ftp.arin.net/pub/stats/arin/delegated-arin-extended-latest",
            Rir::Lacnic => "https://ftp.lacnic.net/pub/stats/lacnic/delegated-lacnic-latest",
            Rir::Afrinic => "https://ftp.afrinic.net/pub/stats/afrinic/delegated-afrinic-latest",
        }
    }
}

impl fmt::Display for Rir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Rir {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ripencc" | "ripe" | "ripe ncc" | "ripe-ncc" => Ok(Rir::RipeNcc),
            "apnic" => Ok(Rir::Apnic),
            "arin" => Ok(Rir::Arin),
            "lacnic" => Ok(Rir::Lacnic),
            "afrinic" => Ok(Rir::Afrinic),
            _ => Err(format!(
                "Unknown registry '{}'. Valid registries: ripencc, apnic, arin, lacnic, afrinic",
                s
            )),
        }
    }
}

/// Immutable mapping from ISO 3166 alpha-2 country code to its registry.
///
/// Codes are stored upper case; lookups accept either case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryTable {
    entries: BTreeMap<String, Rir>,
}

impl Default for RegistryTable {
    fn default() -> Self {
        Self::empty()
            .with_entry("IR", Rir::RipeNcc)
            .with_entry("RU", Rir::RipeNcc)
            .with_entry("CN", Rir::Apnic)
    }
}

impl RegistryTable {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Add or replace the registry for a country
    pub fn with_entry(mut self, country: &str, rir: Rir) -> Self {
        self.entries.insert(country.trim().to_uppercase(), rir);
        self
    }

    /// Parse `CC=registry` pairs separated by commas, e.g. `TR=ripencc,VN=apnic`
    pub fn with_entries_str(mut self, entries: &str) -> Result<Self, String> {
        for pair in entries.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (country, rir) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected CC=registry, got '{}'", pair))?;
            let country = country.trim();
            if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
                return Err(format!("invalid country code '{}'", country));
            }
            self = self.with_entry(country, rir.parse()?);
        }
        Ok(self)
    }

    pub fn registry_for(&self, country: &str) -> Result<Rir, PrefixError> {
        self.entries
            .get(&country.trim().to_uppercase())
            .copied()
            .ok_or_else(|| PrefixError::UnsupportedCountry {
                country: country.to_string(),
            })
    }

    /// Supported country codes in ascending order
    pub fn supported_countries(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Rir)> {
        self.entries.iter().map(|(cc, rir)| (cc.as_str(), *rir))
    }
}
