/*!
error module defines the error types used in prefix-fetcher.

Only data-source failures are errors. Malformed individual lines in a delegated
file or the BGP table are skipped by the parsers and never show up here.
*/
use thiserror::Error;

/// Failure of a single fetch from a remote or local data source.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection, TLS, timeout or non-2xx status reported by the HTTP client.
    #[error(transparent)]
    Http(#[from] ureq::Error),
    /// The body stream broke while it was being read, or a local file could not be opened.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum PrefixError {
    /// The country code has no entry in the registry table.
    ///
    /// ## Occurs during:
    ///  - ASN resolution, before any network access
    #[error("no RIR mapping found for country code {country:?}")]
    UnsupportedCountry { country: String },
    /// Fetching or streaming a registry delegated file failed. Never retried.
    ///
    /// ## Occurs during:
    ///  - ASN resolution
    ///  - a single BGP table attempt (wrapped by [PrefixError::FetchExhausted] once the budget is spent)
    #[error("failed to fetch {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: TransportError,
    },
    /// Every BGP table attempt failed; `source` is the error of the last attempt.
    #[error("all {attempts} attempts to fetch {url} failed: {source}")]
    FetchExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: TransportError,
    },
    /// An address could not be represented. Indicates a bug, not bad input.
    #[error("address conversion failed: {0}")]
    Conversion(String),
}

impl PrefixError {
    pub(crate) fn transport(url: &str, source: impl Into<TransportError>) -> Self {
        PrefixError::Transport {
            url: url.to_string(),
            source: source.into(),
        }
    }
}
