//! Lens module
//!
//! This module provides the high-level operations of the crate. Each lens
//! combines the raw data sources from [`crate::datasets`] with output
//! formatting, so the CLI and library users go through the same entry points.
//!
//! | Lens | Purpose | Data sources |
//! |------|---------|--------------|
//! | `AsnLens` | country -> public ASNs | RIR delegated files |
//! | `PrefixLens` | country -> IPv4 /24 blocks and IPv6 prefixes | delegated files, bgp.tools table |
//!
//! # Architecture
//!
//! Each lens module exports:
//! - A **Lens struct** (e.g., `AsnLens`, `PrefixLens`), the entry point for all operations
//! - **Args structs**, input arguments for lens methods (clap-derivable with the `cli` feature)
//! - **Output types**, serializable results
//!
//! # Usage
//!
//! ```rust,ignore
//! use prefix_fetcher::lens::asn::{AsnLens, AsnLookupArgs};
//! use prefix_fetcher::lens::prefix::{PrefixLens, PrefixFetchArgs, PrefixSet};
//! use prefix_fetcher::lens::utils::OutputFormat;
//! ```

// =============================================================================
// Utility module
// =============================================================================
pub mod utils;

// =============================================================================
// Lenses
// =============================================================================

// AsnLens - country to ASN resolution
pub mod asn;

// PrefixLens - ASN to normalized prefix lists
pub mod prefix;
