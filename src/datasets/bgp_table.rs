//! Global BGP table snapshot
//!
//! The table is newline-delimited JSON, one announced prefix per line:
//!
//! ```text
//! {"CIDR":"2.144.0.0/14","ASN":12880,"Hits":620}
//! ```
//!
//! Lines that fail to decode are skipped. Fetching is retried with a linear
//! backoff; each attempt downloads the full table or counts as failed.

use crate::datasets::transport::Transport;
use crate::error::{PrefixError, TransportError};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const BGP_TOOLS_TABLE_URL: &str = "https://bgp.tools/table.jsonl";
pub const DEFAULT_USER_AGENT: &str = "compassvpn-prefix-fetcher bgp.tools";

/// One announced prefix and its origin AS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoutedPrefix {
    #[serde(rename = "CIDR")]
    pub prefix: IpNet,
    #[serde(rename = "ASN")]
    pub asn: u32,
}

/// Lazy iterator over the entries of a BGP table stream.
///
/// Undecodable lines are skipped; a stream error is yielded once and ends the
/// iteration.
pub struct RoutedPrefixes<R> {
    reader: R,
    buf: Vec<u8>,
    done: bool,
}

impl<R: BufRead> Iterator for RoutedPrefixes<R> {
    type Item = std::io::Result<RoutedPrefix>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            self.buf.clear();
            match self.reader.read_until(b'\n', &mut self.buf) {
                Ok(0) => self.done = true,
                Ok(_) => {
                    let line = self.buf.trim_ascii();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_slice::<RoutedPrefix>(line) {
                        Ok(entry) => return Some(Ok(entry)),
                        Err(e) => debug!("invalid JSON line: {}", e),
                    }
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        None
    }
}

pub fn parse_bgp_table<R: BufRead>(reader: R) -> RoutedPrefixes<R> {
    RoutedPrefixes {
        reader,
        buf: Vec::new(),
        done: false,
    }
}

/// Waits between attempts. Replaced in tests to avoid real delays.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration);
}

pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

impl<S: Sleeper + ?Sized> Sleeper for &S {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Attempt budget and backoff unit.
///
/// After failed attempt `n` (1-based) the fetcher waits `n * base_delay`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt`; saturates instead of overflowing.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

pub struct BgpTableFetcher<T, S = ThreadSleeper> {
    transport: T,
    sleeper: S,
    url: String,
    policy: RetryPolicy,
}

impl<T: Transport> BgpTableFetcher<T, ThreadSleeper> {
    pub fn new(transport: T, url: impl Into<String>, policy: RetryPolicy) -> Self {
        Self::with_sleeper(transport, ThreadSleeper, url, policy)
    }
}

impl<T: Transport, S: Sleeper> BgpTableFetcher<T, S> {
    pub fn with_sleeper(
        transport: T,
        sleeper: S,
        url: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            sleeper,
            url: url.into(),
            policy,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Download the whole table, retrying failed attempts.
    ///
    /// Attempts run one after another; an empty table is a success.
    pub fn fetch(&self) -> Result<Vec<RoutedPrefix>, PrefixError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.fetch_once() {
                Ok(entries) => {
                    info!("fetched {} BGP table entries from {}", entries.len(), self.url);
                    return Ok(entries);
                }
                Err(e) if attempt < attempts => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        "BGP table fetch attempt {}/{} failed, retrying in {:?}: {}",
                        attempt, attempts, delay, e
                    );
                    self.sleeper.sleep(delay);
                    attempt += 1;
                }
                Err(e) => {
                    return Err(PrefixError::FetchExhausted {
                        url: self.url.clone(),
                        attempts,
                        source: e,
                    })
                }
            }
        }
    }

    fn fetch_once(&self) -> Result<Vec<RoutedPrefix>, TransportError> {
        let reader = self.transport.open(&self.url)?;
        let entries = parse_bgp_table(BufReader::new(reader)).collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSleeper;
    use super::*;
    use crate::datasets::transport::testing::{Reply, ScriptedTransport};
    use std::io::Cursor;

    const URL: &str = "https://bgp.tools/table.jsonl";

    const TABLE: &str = r#"{"CIDR":"2.144.0.0/14","ASN":12880,"Hits":512}
{"CIDR":"5.22.192.0/18","ASN":12880}
not json at all
{"CIDR":"2a01:5ec0::/29","ASN":12880}
{"CIDR":"300.1.1.0/24","ASN":1}
{"CIDR":"1.1.1.0/24"}

{"CIDR":"1.1.1.0/24","ASN":13335}
"#;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_parse_skips_invalid_lines() {
        let entries: Vec<RoutedPrefix> = parse_bgp_table(Cursor::new(TABLE))
            .collect::<Result<_, _>>()
            .unwrap();
        let prefixes: Vec<String> = entries.iter().map(|e| e.prefix.to_string()).collect();
        assert_eq!(
            prefixes,
            vec!["2.144.0.0/14", "5.22.192.0/18", "2a01:5ec0::/29", "1.1.1.0/24"]
        );
        assert_eq!(entries[3].asn, 13335);
    }

    #[test]
    fn test_delay_is_linear_and_saturates() {
        assert_eq!(policy().delay_after(3), Duration::from_secs(3));

        let huge = RetryPolicy {
            max_attempts: 4,
            base_delay: Duration::from_secs(u64::MAX / 2),
        };
        assert_eq!(huge.delay_after(3), Duration::MAX);
    }

    #[test]
    fn test_parse_empty_table() {
        assert_eq!(parse_bgp_table(Cursor::new("")).count(), 0);
    }

    #[test]
    fn test_fetch_first_attempt() {
        let transport = ScriptedTransport::new().body(URL, TABLE);
        let sleeper = RecordingSleeper::default();
        let fetcher = BgpTableFetcher::with_sleeper(&transport, &sleeper, URL, policy());

        assert_eq!(fetcher.fetch().unwrap().len(), 4);
        assert_eq!(transport.calls().len(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn test_fetch_succeeds_on_fourth_attempt() {
        let transport = ScriptedTransport::new()
            .fail(URL, "attempt 1")
            .fail(URL, "attempt 2")
            .fail(URL, "attempt 3")
            .body(URL, TABLE);
        let sleeper = RecordingSleeper::default();
        let fetcher = BgpTableFetcher::with_sleeper(&transport, &sleeper, URL, policy());

        let entries = fetcher.fetch().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(transport.calls().len(), 4);
        assert_eq!(
            sleeper.delays(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3)
            ]
        );
    }

    #[test]
    fn test_fetch_exhausted_wraps_last_error() {
        let transport = ScriptedTransport::new()
            .fail(URL, "attempt 1")
            .fail(URL, "attempt 2")
            .fail(URL, "attempt 3")
            .fail(URL, "attempt 4")
            .body(URL, TABLE);
        let sleeper = RecordingSleeper::default();
        let fetcher = BgpTableFetcher::with_sleeper(&transport, &sleeper, URL, policy());

        match fetcher.fetch() {
            Err(PrefixError::FetchExhausted {
                url,
                attempts,
                source,
            }) => {
                assert_eq!(url, URL);
                assert_eq!(attempts, 4);
                assert_eq!(source.to_string(), "attempt 4");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(transport.calls().len(), 4);
        // no wait after the final attempt
        assert_eq!(sleeper.delays().len(), 3);
    }

    #[test]
    fn test_broken_stream_is_an_attempt_failure() {
        let transport = ScriptedTransport::new()
            .reply(URL, Reply::BrokenAfter(TABLE.to_string()))
            .body(URL, r#"{"CIDR":"1.1.1.0/24","ASN":13335}"#);
        let sleeper = RecordingSleeper::default();
        let fetcher = BgpTableFetcher::with_sleeper(&transport, &sleeper, URL, policy());

        // entries from the broken attempt are not merged into the result
        let entries = fetcher.fetch().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].asn, 13335);
    }

    #[test]
    fn test_empty_table_is_success() {
        let transport = ScriptedTransport::new().body(URL, "");
        let sleeper = RecordingSleeper::default();
        let fetcher = BgpTableFetcher::with_sleeper(&transport, &sleeper, URL, policy());

        assert!(fetcher.fetch().unwrap().is_empty());
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn test_zero_attempt_budget_still_tries_once() {
        let transport = ScriptedTransport::new().fail(URL, "down");
        let sleeper = RecordingSleeper::default();
        let fetcher = BgpTableFetcher::with_sleeper(
            &transport,
            &sleeper,
            URL,
            RetryPolicy {
                max_attempts: 0,
                base_delay: Duration::from_millis(10),
            },
        );

        assert!(matches!(
            fetcher.fetch(),
            Err(PrefixError::FetchExhausted { attempts: 1, .. })
        ));
        assert_eq!(transport.calls().len(), 1);
    }
}
