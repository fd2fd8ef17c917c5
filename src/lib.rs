#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! prefix-fetcher - country IP prefix lists from public routing data
//!
//! prefix-fetcher resolves a country to the IPv4 /24 blocks and IPv6 prefixes
//! announced by its autonomous systems. ASNs come from the delegated statistics
//! file of the country's Regional Internet Registry; announced prefixes come
//! from the bgp.tools global BGP table. The result is written as two sorted
//! plain-text lists, ready for firewall or routing configuration.
//!
//! It can be used as both a command-line application and a library.
//!
//! # Feature Flags
//!
//! | Feature | Description | Key Dependencies |
//! |---------|-------------|------------------|
//! | `display` | Table formatting with `tabled` | `tabled` |
//! | `cli` | CLI binary (default) | All above + `clap`, `tracing-subscriber` |
//!
//! ```toml
//! # Library only
//! prefix-fetcher = { version = "0.1", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - **[`datasets`]**: Raw data sources
//!   - `registry`: RIRs and the country-to-registry table
//!   - `delegated`: RIR delegated file parser
//!   - `bgp_table`: bgp.tools table parser and retrying fetcher
//!   - `blocks`: /24 alignment, splitting and prefix ordering
//!   - `transport`: HTTP and local-file access
//!
//! - **[`lens`]**: High-level operations
//!   - `asn`: country to public ASNs
//!   - `prefix`: ASNs to normalized prefix lists, file output
//!
//! - **[`config`]**: Configuration management
//!
//! - **[`error`]**: Error types
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use prefix_fetcher::{PrefixFetcherConfig, PrefixLens};
//!
//! let config = PrefixFetcherConfig::new(&None)?;
//! let lens = PrefixLens::from_config(&config)?;
//!
//! for result in lens.resolve_many(&["IR".to_string(), "RU".to_string()])? {
//!     let (v4, v6) = result.prefixes.write_files(config.output_path(), &result.country)?;
//!     println!("{}: {} and {}", result.country, v4.display(), v6.display());
//! }
//! ```

pub mod config;
pub mod datasets;
pub mod error;
pub mod lens;

// =============================================================================
// Configuration
// =============================================================================

pub use config::PrefixFetcherConfig;

// =============================================================================
// Errors
// =============================================================================

pub use error::{PrefixError, TransportError};

// =============================================================================
// Datasets
// =============================================================================

pub use datasets::{BgpTableFetcher, HttpTransport, RegistryTable, RetryPolicy, Rir, Transport};

// =============================================================================
// Lenses
// =============================================================================

pub use lens::asn::{AsnLens, AsnLookupArgs, AsnResolution};
pub use lens::prefix::{CountryPrefixes, PrefixFetchArgs, PrefixLens, PrefixSet};
pub use lens::utils::OutputFormat;
