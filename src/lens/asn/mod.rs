//! Country ASN lens
//!
//! This module resolves the public ASNs a country holds, using the delegated
//! file of the registry responsible for it.
//!
//! # Example
//!
//! ```rust,ignore
//! use prefix_fetcher::lens::asn::{AsnLens, AsnLookupArgs};
//!
//! let lens = AsnLens::from_config(&config)?;
//! let resolution = lens.resolve_with_rir("IR")?;
//! println!("{} ASNs from {}", resolution.asns.len(), resolution.registry);
//! ```

use crate::config::PrefixFetcherConfig;
use crate::datasets::{
    parse_delegated, DelegatedRecord, HttpTransport, RecordType, RegistryTable, Rir, Transport,
};
use crate::error::PrefixError;
use crate::lens::utils::OutputFormat;
use serde::{Deserialize, Serialize};
use std::io::BufReader;
use std::ops::Range;
use tracing::info;

// =============================================================================
// ASN validity
// =============================================================================

/// Whether `asn` is a publicly assignable AS number.
///
/// Accepts 1-64511 and 131072-4199999999. Rejects 0, the 16-bit private range
/// 64512-65534, 65535, the 32-bit private range 4200000000-4294967294 and
/// 4294967295. 65536-131071 is rejected as well.
pub fn is_valid_public_asn(asn: u64) -> bool {
    match asn {
        0 => false,
        64_512..=65_534 => false,
        65_535 => false,
        4_200_000_000..=4_294_967_294 => false,
        4_294_967_295 => false,
        1..=64_511 => true,
        131_072..=4_199_999_999 => true,
        _ => false,
    }
}

/// Publicly assignable ASN ranges, as half-open intervals
const PUBLIC_ASN_RANGES: [Range<u64>; 2] = [1..64_512, 131_072..4_200_000_000];

/// Part of `range` that lies inside the public ASN space.
fn public_part(range: Range<u64>) -> impl Iterator<Item = u64> {
    PUBLIC_ASN_RANGES
        .into_iter()
        .flat_map(move |public| range.start.max(public.start)..range.end.min(public.end))
}

/// Collect the valid public ASNs delegated to `country`.
///
/// Keeps ASN records of that exact country code whose status is not reserved
/// or available, expands each `[start, start + count)` range, and returns the
/// ASNs sorted ascending without duplicates. Private and reserved stretches of
/// a range are skipped without being walked.
pub fn extract_asns<I>(records: I, country: &str) -> Vec<u32>
where
    I: IntoIterator<Item = DelegatedRecord>,
{
    let mut asns: Vec<u32> = records
        .into_iter()
        .filter(|r| r.record_type == RecordType::Asn && r.country == country)
        .filter(|r| !r.status.is_inventory())
        .filter_map(|r| r.asn_range())
        .flat_map(public_part)
        .filter(|asn| is_valid_public_asn(*asn))
        .filter_map(|asn| u32::try_from(asn).ok())
        .collect();
    asns.sort_unstable();
    asns.dedup();
    asns
}

// =============================================================================
// Types
// =============================================================================

/// ASNs resolved for one country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsnResolution {
    /// ISO 3166-1 alpha-2 country code, upper case
    pub country: String,
    /// Registry whose delegated file was used
    pub registry: Rir,
    /// Valid public ASNs, ascending
    pub asns: Vec<u32>,
}

#[cfg(feature = "display")]
#[derive(tabled::Tabled)]
struct AsnRow {
    asn: u32,
    country: String,
    registry: String,
}

// =============================================================================
// Args
// =============================================================================

/// Arguments for ASN lookup operations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct AsnLookupArgs {
    /// Country code, e.g. "IR"
    #[cfg_attr(feature = "cli", clap(value_name = "COUNTRY"))]
    pub country: String,

    /// Output format
    #[cfg_attr(feature = "cli", clap(short, long, default_value = "simple"))]
    #[serde(default = "simple_format")]
    pub format: OutputFormat,
}

fn simple_format() -> OutputFormat {
    OutputFormat::Simple
}

impl Default for AsnLookupArgs {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl AsnLookupArgs {
    pub fn new(country: impl Into<String>) -> Self {
        Self {
            country: country.into(),
            format: OutputFormat::Simple,
        }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

// =============================================================================
// Lens
// =============================================================================

/// Resolves countries to ASNs through registry delegated files.
///
/// Registry fetches are not retried; a failed fetch fails the resolution.
pub struct AsnLens<T> {
    transport: T,
    registries: RegistryTable,
}

impl AsnLens<HttpTransport> {
    pub fn from_config(config: &PrefixFetcherConfig) -> anyhow::Result<Self> {
        let transport = HttpTransport::new(config.registry_timeout(), config.user_agent.clone());
        Ok(Self::new(transport, config.registry_table()?))
    }
}

impl<T: Transport> AsnLens<T> {
    pub fn new(transport: T, registries: RegistryTable) -> Self {
        Self {
            transport,
            registries,
        }
    }

    pub fn registries(&self) -> &RegistryTable {
        &self.registries
    }

    /// Sorted, distinct public ASNs of `country`
    pub fn resolve(&self, country: &str) -> Result<Vec<u32>, PrefixError> {
        Ok(self.resolve_with_rir(country)?.asns)
    }

    pub fn resolve_with_rir(&self, country: &str) -> Result<AsnResolution, PrefixError> {
        let registry = self.registries.registry_for(country)?;
        let country = country.trim().to_uppercase();
        let url = registry.url();
        info!("fetching ASNs for {} from {} ({})", country, registry, url);

        let reader = self
            .transport
            .open(url)
            .map_err(|e| PrefixError::transport(url, e))?;
        let records = parse_delegated(BufReader::new(reader))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| PrefixError::transport(url, e))?;

        let asns = extract_asns(records, &country);
        info!("found {} ASNs for {} from {}", asns.len(), country, registry);

        Ok(AsnResolution {
            country,
            registry,
            asns,
        })
    }

    pub fn search(&self, args: &AsnLookupArgs) -> Result<AsnResolution, PrefixError> {
        self.resolve_with_rir(&args.country)
    }

    /// Format a resolution for display
    ///
    /// Without the `display` feature, `Table` falls back to `Simple`.
    pub fn format_results(&self, resolution: &AsnResolution, format: &OutputFormat) -> String {
        match format {
            OutputFormat::Json | OutputFormat::JsonPretty => format.to_json(resolution),
            #[cfg(feature = "display")]
            OutputFormat::Table => {
                use tabled::settings::Style;
                use tabled::Table;

                let rows: Vec<AsnRow> = resolution
                    .asns
                    .iter()
                    .map(|asn| AsnRow {
                        asn: *asn,
                        country: resolution.country.clone(),
                        registry: resolution.registry.name().to_string(),
                    })
                    .collect();
                Table::new(rows).with(Style::rounded()).to_string()
            }
            _ => resolution
                .asns
                .iter()
                .map(|a| a.to_string())
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
