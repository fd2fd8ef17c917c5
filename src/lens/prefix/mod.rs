//! Country prefix lens
//!
//! Joins a country's ASNs against the global BGP table and shapes the result
//! into two ordered lists: IPv4 normalized to /24 blocks and IPv6 at native
//! prefix length.
//!
//! # Example
//!
//! ```rust,ignore
//! use prefix_fetcher::lens::prefix::PrefixLens;
//!
//! let lens = PrefixLens::from_config(&config)?;
//! let result = lens.resolve("IR")?;
//! let (v4, v6) = result.prefixes.write_files(config.output_path(), &result.country)?;
//! ```

use crate::config::PrefixFetcherConfig;
use crate::datasets::{
    compare_v4, compare_v6, split_into_24s, BgpTableFetcher, HttpTransport, RoutedPrefix, Rir,
    Sleeper, ThreadSleeper, Transport,
};
use crate::error::PrefixError;
use crate::lens::asn::{AsnLens, AsnResolution};
use crate::lens::utils::OutputFormat;
use ipnet::{IpNet, Ipv4Net, Ipv6Net};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Display;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

// =============================================================================
// Filter & normalize
// =============================================================================

/// Keep the routes originated by one of `asns`, split by address family.
pub fn filter_by_asn(asns: &[u32], routes: &[RoutedPrefix]) -> (Vec<Ipv4Net>, Vec<Ipv6Net>) {
    let members: HashSet<u32> = asns.iter().copied().collect();

    let mut ipv4 = Vec::new();
    let mut ipv6 = Vec::new();
    for route in routes.iter().filter(|r| members.contains(&r.asn)) {
        match route.prefix {
            IpNet::V4(p) => ipv4.push(p),
            IpNet::V6(p) => ipv6.push(p),
        }
    }
    (ipv4, ipv6)
}

/// Cover every prefix with /24 blocks, deduplicate, and sort.
pub fn normalize_ipv4<I>(prefixes: I) -> Result<Vec<Ipv4Net>, PrefixError>
where
    I: IntoIterator<Item = Ipv4Net>,
{
    let mut blocks: HashSet<Ipv4Net> = HashSet::new();
    for prefix in prefixes {
        blocks.extend(split_into_24s(prefix)?);
    }
    let mut blocks: Vec<Ipv4Net> = blocks.into_iter().collect();
    blocks.sort_by(compare_v4);
    Ok(blocks)
}

/// Deduplicate by exact equality and sort; lengths are kept as announced.
pub fn normalize_ipv6<I>(prefixes: I) -> Vec<Ipv6Net>
where
    I: IntoIterator<Item = Ipv6Net>,
{
    let unique: HashSet<Ipv6Net> = prefixes.into_iter().collect();
    let mut prefixes: Vec<Ipv6Net> = unique.into_iter().collect();
    prefixes.sort_by(compare_v6);
    prefixes
}

// =============================================================================
// Types
// =============================================================================

/// Normalized prefixes of one country
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefixSet {
    pub ipv4: Vec<Ipv4Net>,
    pub ipv6: Vec<Ipv6Net>,
}

impl PrefixSet {
    pub fn from_routes(asns: &[u32], routes: &[RoutedPrefix]) -> Result<Self, PrefixError> {
        if asns.is_empty() {
            return Ok(Self::default());
        }
        let (ipv4, ipv6) = filter_by_asn(asns, routes);
        Ok(Self {
            ipv4: normalize_ipv4(ipv4)?,
            ipv6: normalize_ipv6(ipv6),
        })
    }

    pub fn ipv4(&self) -> &[Ipv4Net] {
        &self.ipv4
    }

    pub fn ipv6(&self) -> &[Ipv6Net] {
        &self.ipv6
    }

    pub fn len(&self) -> usize {
        self.ipv4.len() + self.ipv6.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ipv4.is_empty() && self.ipv6.is_empty()
    }

    /// Write `<cc>_prefixes_v4.txt` and `<cc>_prefixes_v6.txt` into `dir`.
    ///
    /// One CIDR per line in list order. Both files are written, even when
    /// empty. Returns the IPv4 and IPv6 paths.
    pub fn write_files(&self, dir: &Path, country: &str) -> std::io::Result<(PathBuf, PathBuf)> {
        std::fs::create_dir_all(dir)?;
        let cc = country.trim().to_lowercase();
        let v4_path = dir.join(format!("{}_prefixes_v4.txt", cc));
        let v6_path = dir.join(format!("{}_prefixes_v6.txt", cc));

        let (v4, v6) = rayon::join(
            || write_lines(&v4_path, &self.ipv4),
            || write_lines(&v6_path, &self.ipv6),
        );
        v4?;
        v6?;

        info!(
            "wrote {} IPv4 blocks to {} and {} IPv6 prefixes to {}",
            self.ipv4.len(),
            v4_path.display(),
            self.ipv6.len(),
            v6_path.display()
        );
        Ok((v4_path, v6_path))
    }
}

fn write_lines<T: Display>(path: &Path, items: &[T]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for item in items {
        writeln!(writer, "{}", item)?;
    }
    writer.flush()
}

/// Resolution result for one country
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountryPrefixes {
    pub country: String,
    pub registry: Rir,
    pub asns: Vec<u32>,
    pub prefixes: PrefixSet,
}

impl CountryPrefixes {
    fn from_resolution(
        resolution: AsnResolution,
        routes: &[RoutedPrefix],
    ) -> Result<Self, PrefixError> {
        let prefixes = PrefixSet::from_routes(&resolution.asns, routes)?;
        info!(
            "{}: {} ASNs, {} IPv4 /24 blocks, {} IPv6 prefixes",
            resolution.country,
            resolution.asns.len(),
            prefixes.ipv4.len(),
            prefixes.ipv6.len()
        );
        Ok(Self {
            country: resolution.country,
            registry: resolution.registry,
            asns: resolution.asns,
            prefixes,
        })
    }

    fn empty(resolution: AsnResolution) -> Self {
        info!("{}: no public ASNs found", resolution.country);
        Self {
            country: resolution.country,
            registry: resolution.registry,
            asns: resolution.asns,
            prefixes: PrefixSet::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "display", derive(tabled::Tabled))]
struct SummaryRow {
    country: String,
    registry: String,
    asns: usize,
    ipv4_blocks: usize,
    ipv6_prefixes: usize,
}

impl From<&CountryPrefixes> for SummaryRow {
    fn from(result: &CountryPrefixes) -> Self {
        Self {
            country: result.country.clone(),
            registry: result.registry.code().to_string(),
            asns: result.asns.len(),
            ipv4_blocks: result.prefixes.ipv4.len(),
            ipv6_prefixes: result.prefixes.ipv6.len(),
        }
    }
}

// =============================================================================
// Args
// =============================================================================

/// Arguments for prefix fetch operations
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::Args))]
pub struct PrefixFetchArgs {
    /// Country codes, e.g. "IR RU"
    #[cfg_attr(feature = "cli", clap(required = true, value_name = "COUNTRY"))]
    pub countries: Vec<String>,

    /// Directory for the prefix list files [default: from config]
    #[cfg_attr(feature = "cli", clap(short, long))]
    #[serde(default)]
    pub output_dir: Option<String>,

    /// Output format for the summary
    #[cfg_attr(feature = "cli", clap(short, long, default_value = "table"))]
    #[serde(default)]
    pub format: OutputFormat,
}

impl PrefixFetchArgs {
    pub fn new<S: Into<String>>(countries: impl IntoIterator<Item = S>) -> Self {
        Self {
            countries: countries.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn with_output_dir(mut self, dir: impl Into<String>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

// =============================================================================
// Lens
// =============================================================================

/// Resolves countries to normalized prefix sets.
///
/// The registry fetch and the BGP table fetch are independent and run in
/// parallel; only the BGP table fetch is retried.
pub struct PrefixLens<A, B, S = ThreadSleeper> {
    asns: AsnLens<A>,
    table: BgpTableFetcher<B, S>,
}

impl PrefixLens<HttpTransport, HttpTransport, ThreadSleeper> {
    pub fn from_config(config: &PrefixFetcherConfig) -> anyhow::Result<Self> {
        let table = BgpTableFetcher::new(
            HttpTransport::new(config.bgp_timeout(), config.user_agent.clone()),
            config.bgp_table_url.clone(),
            config.retry_policy(),
        );
        Ok(Self::new(AsnLens::from_config(config)?, table))
    }
}

impl<A: Transport, B: Transport, S: Sleeper> PrefixLens<A, B, S> {
    pub fn new(asns: AsnLens<A>, table: BgpTableFetcher<B, S>) -> Self {
        Self { asns, table }
    }

    pub fn asn_lens(&self) -> &AsnLens<A> {
        &self.asns
    }

    /// Resolve one country.
    ///
    /// Unsupported countries fail before anything is fetched. When both
    /// fetches fail, the registry error is returned.
    ///
    /// The BGP table download starts before the ASN list is known, so a
    /// country without public ASNs still waits for that download (retries
    /// included) before its empty result is returned. Its outcome is ignored.
    pub fn resolve(&self, country: &str) -> Result<CountryPrefixes, PrefixError> {
        self.asns.registries().registry_for(country)?;

        let (resolution, routes) = rayon::join(
            || self.asns.resolve_with_rir(country),
            || self.table.fetch(),
        );
        let resolution = resolution?;
        if resolution.asns.is_empty() {
            return Ok(CountryPrefixes::empty(resolution));
        }
        CountryPrefixes::from_resolution(resolution, &routes?)
    }

    /// Resolve several countries against a single BGP table download.
    ///
    /// Registry fetches run in parallel with each other and with the table
    /// fetch. Results follow the order of `countries`.
    pub fn resolve_many(&self, countries: &[String]) -> Result<Vec<CountryPrefixes>, PrefixError> {
        for country in countries {
            self.asns.registries().registry_for(country)?;
        }
        if countries.is_empty() {
            return Ok(Vec::new());
        }

        let (resolutions, routes) = rayon::join(
            || {
                countries
                    .par_iter()
                    .map(|cc| self.asns.resolve_with_rir(cc))
                    .collect::<Result<Vec<_>, _>>()
            },
            || self.table.fetch(),
        );
        let resolutions = resolutions?;
        if resolutions.iter().all(|r| r.asns.is_empty()) {
            return Ok(resolutions.into_iter().map(CountryPrefixes::empty).collect());
        }

        let routes = routes?;
        resolutions
            .into_par_iter()
            .map(|r| CountryPrefixes::from_resolution(r, &routes))
            .collect()
    }

    pub fn search(&self, args: &PrefixFetchArgs) -> Result<Vec<CountryPrefixes>, PrefixError> {
        self.resolve_many(&args.countries)
    }

    /// Format a per-country summary for display
    pub fn format_results(&self, results: &[CountryPrefixes], format: &OutputFormat) -> String {
        let rows: Vec<SummaryRow> = results.iter().map(SummaryRow::from).collect();
        match format {
            OutputFormat::Json | OutputFormat::JsonPretty => format.to_json(&rows),
            #[cfg(feature = "display")]
            OutputFormat::Table => {
                use tabled::settings::Style;
                use tabled::Table;
                Table::new(rows).with(Style::rounded()).to_string()
            }
            _ => rows
                .iter()
                .map(|r| {
                    format!(
                        "{}|{}|{}|{}|{}",
                        r.country, r.registry, r.asns, r.ipv4_blocks, r.ipv6_prefixes
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasets::bgp_table::testing::RecordingSleeper;
    use crate::datasets::transport::testing::ScriptedTransport;
    use crate::datasets::{RegistryTable, RetryPolicy};
    use std::time::Duration;

    const RIPE_URL: &str = "https://ftp.ripe.net/ripe/stats/delegated-ripencc-latest";
    const APNIC_URL: &str = "https://ftp.apnic.net/stats/apnic/delegated-apnic-latest";
    const TABLE_URL: &str = "https://bgp.tools/table.jsonl";

    const RIPE_FILE: &str = "\
2|ripencc|1700000000|3|19830705|20231114|+0100
ripencc|IR|asn|12880|1|20110101|allocated
ripencc|RU|asn|64600|1|20110101|allocated
";

    const APNIC_FILE: &str = "\
apnic|CN|asn|4134|1|20020401|allocated
";

    const TABLE: &str = r#"{"CIDR":"2.144.0.0/14","ASN":12880}
{"CIDR":"5.22.192.0/18","ASN":12880}
{"CIDR":"8.8.8.0/24","ASN":15169}
{"CIDR":"202.97.0.0/24","ASN":4134}
{"CIDR":"240e::/20","ASN":4134}
"#;

    fn route(prefix: &str, asn: u32) -> RoutedPrefix {
        RoutedPrefix {
            prefix: prefix.parse().unwrap(),
            asn,
        }
    }

    fn v4(s: &str) -> Ipv4Net {
        s.parse().unwrap()
    }

    fn v6(s: &str) -> Ipv6Net {
        s.parse().unwrap()
    }

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            base_delay: Duration::from_secs(1),
        }
    }

    fn lens<'a>(
        transport: &'a ScriptedTransport,
        sleeper: &'a RecordingSleeper,
    ) -> PrefixLens<&'a ScriptedTransport, &'a ScriptedTransport, &'a RecordingSleeper> {
        PrefixLens::new(
            AsnLens::new(transport, RegistryTable::default()),
            BgpTableFetcher::with_sleeper(transport, sleeper, TABLE_URL, policy()),
        )
    }

    #[test]
    fn test_filter_by_asn_splits_families() {
        let routes = vec![
            route("2.144.0.0/14", 12880),
            route("2a01:5ec0::/29", 12880),
            route("8.8.8.0/24", 15169),
        ];
        let (ipv4, ipv6) = filter_by_asn(&[12880], &routes);
        assert_eq!(ipv4, vec![v4("2.144.0.0/14")]);
        assert_eq!(ipv6, vec![v6("2a01:5ec0::/29")]);
    }

    #[test]
    fn test_normalize_ipv4_dedupes_overlaps() {
        let blocks = normalize_ipv4(vec![
            v4("10.0.0.0/22"),
            v4("10.0.1.0/24"),
            v4("10.0.2.128/25"),
            v4("10.0.0.0/22"),
            v4("9.9.9.9/32"),
        ])
        .unwrap();
        assert_eq!(
            blocks,
            vec![
                v4("9.9.9.0/24"),
                v4("10.0.0.0/24"),
                v4("10.0.1.0/24"),
                v4("10.0.2.0/24"),
                v4("10.0.3.0/24"),
            ]
        );
    }

    #[test]
    fn test_normalize_ipv4_is_idempotent() {
        let once = normalize_ipv4(vec![v4("5.22.192.0/18"), v4("2.144.7.0/25")]).unwrap();
        let twice = normalize_ipv4(once.clone()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_ipv6_keeps_length_and_orders() {
        let prefixes = normalize_ipv6(vec![
            v6("2a01:5ec0::/29"),
            v6("2001:db8:1::/48"),
            v6("2001:db8::/32"),
            v6("2a01:5ec0::/29"),
            v6("2001:db8::/48"),
        ]);
        assert_eq!(
            prefixes,
            vec![
                v6("2a01:5ec0::/29"),
                v6("2001:db8::/32"),
                v6("2001:db8::/48"),
                v6("2001:db8:1::/48"),
            ]
        );
    }

    #[test]
    fn test_prefix_set_without_asns_is_empty() {
        let routes = vec![route("2.144.0.0/14", 12880)];
        let set = PrefixSet::from_routes(&[], &routes).unwrap();
        assert!(set.is_empty());
        assert_eq!(set.len(), 0);
    }

    #[test]
    fn test_resolve_end_to_end() {
        let transport = ScriptedTransport::new()
            .body(RIPE_URL, RIPE_FILE)
            .body(TABLE_URL, TABLE);
        let sleeper = RecordingSleeper::default();
        let lens = lens(&transport, &sleeper);

        let result = lens.resolve("IR").unwrap();
        assert_eq!(result.asns, vec![12880]);
        assert_eq!(result.registry, Rir::RipeNcc);

        let ipv4 = result.prefixes.ipv4();
        assert_eq!(ipv4.len(), 1024 + 64);
        assert!(ipv4.iter().all(|b| b.prefix_len() == 24));
        assert_eq!(ipv4.first().copied(), Some(v4("2.144.0.0/24")));
        assert_eq!(ipv4.last().copied(), Some(v4("5.22.255.0/24")));
        assert!(ipv4.windows(2).all(|w| compare_v4(&w[0], &w[1]).is_lt()));
        assert!(result.prefixes.ipv6().is_empty());
    }

    #[test]
    fn test_resolve_unsupported_country_fetches_nothing() {
        let transport = ScriptedTransport::new();
        let sleeper = RecordingSleeper::default();
        let lens = lens(&transport, &sleeper);

        assert!(matches!(
            lens.resolve("ZZ"),
            Err(PrefixError::UnsupportedCountry { .. })
        ));
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_resolve_fails_when_table_exhausted() {
        let transport = ScriptedTransport::new()
            .body(RIPE_URL, RIPE_FILE)
            .fail(TABLE_URL, "503")
            .fail(TABLE_URL, "503");
        let sleeper = RecordingSleeper::default();
        let lens = lens(&transport, &sleeper);

        assert!(matches!(
            lens.resolve("IR"),
            Err(PrefixError::FetchExhausted { attempts: 2, .. })
        ));
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_resolve_registry_failure_wins() {
        let transport = ScriptedTransport::new()
            .fail(RIPE_URL, "connection refused")
            .body(TABLE_URL, TABLE);
        let sleeper = RecordingSleeper::default();
        let lens = lens(&transport, &sleeper);

        assert!(matches!(
            lens.resolve("IR"),
            Err(PrefixError::Transport { .. })
        ));
    }

    #[test]
    fn test_resolve_country_without_public_asns() {
        // AS64600 is private, so RU resolves to nothing
        let transport = ScriptedTransport::new()
            .body(RIPE_URL, RIPE_FILE)
            .body(TABLE_URL, TABLE);
        let sleeper = RecordingSleeper::default();
        let lens = lens(&transport, &sleeper);

        let result = lens.resolve("ru").unwrap();
        assert_eq!(result.country, "RU");
        assert!(result.asns.is_empty());
        assert!(result.prefixes.is_empty());
    }

    #[test]
    fn test_resolve_without_public_asns_ignores_table_failure() {
        let transport = ScriptedTransport::new()
            .body(RIPE_URL, RIPE_FILE)
            .fail(TABLE_URL, "503")
            .fail(TABLE_URL, "503");
        let sleeper = RecordingSleeper::default();
        let lens = lens(&transport, &sleeper);

        let result = lens.resolve("RU").unwrap();
        assert!(result.prefixes.is_empty());
        // the download still ran to exhaustion before the result came back
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(1)]);
    }

    #[test]
    fn test_resolve_many_fetches_table_once() {
        let transport = ScriptedTransport::new()
            .body(RIPE_URL, RIPE_FILE)
            .body(APNIC_URL, APNIC_FILE)
            .body(TABLE_URL, TABLE);
        let sleeper = RecordingSleeper::default();
        let lens = lens(&transport, &sleeper);

        let results = lens
            .resolve_many(&["IR".to_string(), "CN".to_string()])
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].country, "IR");
        assert_eq!(results[0].prefixes.ipv4().len(), 1088);
        assert_eq!(results[1].country, "CN");
        assert_eq!(results[1].registry, Rir::Apnic);
        assert_eq!(results[1].prefixes.ipv4(), &[v4("202.97.0.0/24")]);
        assert_eq!(results[1].prefixes.ipv6(), &[v6("240e::/20")]);

        let table_calls = transport
            .calls()
            .iter()
            .filter(|u| u.as_str() == TABLE_URL)
            .count();
        assert_eq!(table_calls, 1);
    }

    #[test]
    fn test_resolve_many_rejects_unsupported_up_front() {
        let transport = ScriptedTransport::new();
        let sleeper = RecordingSleeper::default();
        let lens = lens(&transport, &sleeper);

        assert!(lens
            .resolve_many(&["IR".to_string(), "XX".to_string()])
            .is_err());
        assert!(transport.calls().is_empty());
    }

    #[test]
    fn test_write_files() {
        let dir = tempfile::tempdir().unwrap();
        let set = PrefixSet {
            ipv4: vec![v4("2.144.0.0/24"), v4("2.144.1.0/24")],
            ipv6: vec![],
        };

        let (v4_path, v6_path) = set.write_files(dir.path(), "IR").unwrap();
        assert_eq!(v4_path, dir.path().join("ir_prefixes_v4.txt"));
        assert_eq!(v6_path, dir.path().join("ir_prefixes_v6.txt"));
        assert_eq!(
            std::fs::read_to_string(&v4_path).unwrap(),
            "2.144.0.0/24\n2.144.1.0/24\n"
        );
        assert_eq!(std::fs::read_to_string(&v6_path).unwrap(), "");
    }

    #[test]
    fn test_format_results() {
        let transport = ScriptedTransport::new();
        let sleeper = RecordingSleeper::default();
        let lens = lens(&transport, &sleeper);
        let results = vec![CountryPrefixes {
            country: "IR".to_string(),
            registry: Rir::RipeNcc,
            asns: vec![12880],
            prefixes: PrefixSet {
                ipv4: vec![v4("2.144.0.0/24")],
                ipv6: vec![v6("2a01:5ec0::/29")],
            },
        }];

        assert_eq!(
            lens.format_results(&results, &OutputFormat::Simple),
            "IR|ripencc|1|1|1"
        );
        let json = lens.format_results(&results, &OutputFormat::Json);
        assert!(json.contains("\"ipv4_blocks\":1"));
    }

    #[test]
    fn test_args_builder() {
        let args = PrefixFetchArgs::new(["IR", "RU"])
            .with_output_dir("/tmp/out")
            .with_format(OutputFormat::Json);
        assert_eq!(args.countries, vec!["IR", "RU"]);
        assert_eq!(args.output_dir.as_deref(), Some("/tmp/out"));
        assert_eq!(args.format, OutputFormat::Json);
    }
}
