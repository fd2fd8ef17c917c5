use crate::datasets::{RegistryTable, RetryPolicy, BGP_TOOLS_TABLE_URL, DEFAULT_USER_AGENT};
use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixFetcherConfig {
    /// Directory the prefix list files are written to
    pub output_dir: String,

    /// BGP table endpoint (http(s) URL or local path)
    pub bgp_table_url: String,

    /// User-Agent sent with the BGP table request
    pub user_agent: String,

    /// BGP table attempt budget
    pub max_attempts: u32,

    /// Backoff unit between BGP table attempts, in seconds
    pub retry_delay_secs: u64,

    /// Per-request timeout for the BGP table, in seconds
    pub bgp_timeout_secs: u64,

    /// Per-request timeout for registry delegated files, in seconds
    pub registry_timeout_secs: u64,

    /// Extra country-to-registry entries, e.g. "TR=ripencc,VN=apnic"
    pub countries: String,
}

const EMPTY_CONFIG: &str = r#"### prefix-fetcher configuration file

### directory for the <cc>_prefixes_v4.txt / <cc>_prefixes_v6.txt files
# output_dir = "."

### BGP table source and client identification
# bgp_table_url = "https://bgp.tools/table.jsonl"
# user_agent = "compassvpn-prefix-fetcher bgp.tools"

### BGP table retry settings
# max_attempts = 4
# retry_delay_secs = 1

### request timeouts (in seconds)
# bgp_timeout_secs = 30
# registry_timeout_secs = 60

### additional countries, as CC=registry pairs
# countries = "TR=ripencc,VN=apnic"
"#;

impl Default for PrefixFetcherConfig {
    fn default() -> Self {
        Self {
            output_dir: ".".to_string(),
            bgp_table_url: BGP_TOOLS_TABLE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_attempts: 4,
            retry_delay_secs: 1,
            bgp_timeout_secs: 30,
            registry_timeout_secs: 60,
            countries: String::new(),
        }
    }
}

impl PrefixFetcherConfig {
    /// Load configuration from a TOML file and `PREFIX_FETCHER_*` environment variables.
    ///
    /// By default `$HOME/.prefix-fetcher/prefix-fetcher.toml` is used. A missing
    /// file is created from a commented template.
    pub fn new(path: &Option<String>) -> Result<PrefixFetcherConfig> {
        let mut builder = Config::builder();

        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => {
                let home_dir =
                    dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
                let dir = home_dir.join(".prefix-fetcher");
                std::fs::create_dir_all(&dir)
                    .map_err(|e| anyhow!("Unable to create prefix-fetcher directory: {}", e))?;
                dir.join("prefix-fetcher.toml")
            }
        };

        if config_path.exists() {
            builder = builder.add_source(config::File::from(config_path.as_path()));
        } else {
            std::fs::write(&config_path, EMPTY_CONFIG).map_err(|e| {
                anyhow!(
                    "Unable to create config file {}: {}",
                    config_path.display(),
                    e
                )
            })?;
        }

        // E.g., `PREFIX_FETCHER_OUTPUT_DIR=/etc/firewall prefix-fetcher fetch IR`
        builder = builder.add_source(config::Environment::with_prefix("PREFIX_FETCHER"));

        let settings = builder
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        Self::from_map(&config)
    }

    fn from_map(config: &HashMap<String, String>) -> Result<PrefixFetcherConfig> {
        let defaults = PrefixFetcherConfig::default();

        let string_or = |key: &str, default: String| {
            config
                .get(key)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .unwrap_or(default)
        };

        let parsed = PrefixFetcherConfig {
            output_dir: string_or("output_dir", defaults.output_dir),
            bgp_table_url: string_or("bgp_table_url", defaults.bgp_table_url),
            user_agent: string_or("user_agent", defaults.user_agent),
            max_attempts: config
                .get("max_attempts")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            retry_delay_secs: config
                .get("retry_delay_secs")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.retry_delay_secs),
            bgp_timeout_secs: config
                .get("bgp_timeout_secs")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bgp_timeout_secs),
            registry_timeout_secs: config
                .get("registry_timeout_secs")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.registry_timeout_secs),
            countries: string_or("countries", defaults.countries),
        };

        // fail at load time rather than on first lookup
        parsed.registry_table()?;
        Ok(parsed)
    }

    /// Default registry table extended with the configured countries
    pub fn registry_table(&self) -> Result<RegistryTable> {
        RegistryTable::default()
            .with_entries_str(&self.countries)
            .map_err(|e| anyhow!("Invalid countries setting: {}", e))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            base_delay: Duration::from_secs(self.retry_delay_secs),
        }
    }

    pub fn bgp_timeout(&self) -> Duration {
        Duration::from_secs(self.bgp_timeout_secs)
    }

    pub fn registry_timeout(&self) -> Duration {
        Duration::from_secs(self.registry_timeout_secs)
    }

    pub fn output_path(&self) -> &Path {
        Path::new(&self.output_dir)
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let countries = self
            .registry_table()
            .map(|t| {
                t.iter()
                    .map(|(cc, rir)| format!("{}={}", cc, rir.code()))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_else(|e| e.to_string());

        let lines = [
            format!("Output directory:   {}", self.output_dir),
            format!("BGP table:          {}", self.bgp_table_url),
            format!("User agent:         {}", self.user_agent),
            format!(
                "Retry:              {} attempts, {}s linear backoff",
                self.max_attempts, self.retry_delay_secs
            ),
            format!(
                "Timeouts:           BGP {}s, registry {}s",
                self.bgp_timeout_secs, self.registry_timeout_secs
            ),
            format!("Countries:          {}", countries),
        ];
        lines.join("\n")
    }
}
