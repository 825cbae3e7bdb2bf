use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

const PREFIX: &str = "STAYBOOK_";

/// Runtime settings, read once from `STAYBOOK_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    /// Prometheus listener; `None` disables it.
    pub metrics_port: Option<u16>,
    /// Remote pricing service; `None` prices in-process.
    pub pricing_url: Option<String>,
    pub pricing_timeout: Duration,
    pub compact_threshold: u64,
    /// Zero disables the availability cache.
    pub cache_ttl: Duration,
    pub events: bool,
    /// JSON dataset; `None` uses the built-in demo hotel.
    pub seed_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(format!("{PREFIX}{key}")).ok())
    }

    /// Unparseable values fall back to the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parsed = |key: &str| -> Option<u64> { parse(&lookup, key) };
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            port: parse(&lookup, "PORT").unwrap_or(8080),
            bind: non_empty("BIND").unwrap_or_else(|| "0.0.0.0".into()),
            data_dir: non_empty("DATA_DIR").map_or_else(|| PathBuf::from("./data"), PathBuf::from),
            metrics_port: parse(&lookup, "METRICS_PORT"),
            pricing_url: non_empty("PRICING_URL"),
            pricing_timeout: Duration::from_millis(parsed("PRICING_TIMEOUT_MS").unwrap_or(2000)),
            compact_threshold: parsed("COMPACT_THRESHOLD").unwrap_or(1000),
            cache_ttl: Duration::from_secs(parsed("CACHE_TTL_SECS").unwrap_or(30)),
            events: lookup("EVENTS").and_then(|v| parse_flag(&v)).unwrap_or(true),
            seed_file: non_empty("SEED_FILE").map(PathBuf::from),
        }
    }

    pub fn journal_path(&self) -> PathBuf {
        self.data_dir.join("staybook.journal")
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

fn parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|s| s.trim().parse().ok())
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
