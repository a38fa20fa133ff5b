use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::rate_limit::RateLimit;

/// Process settings, read from `INNKEEP_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub bind: String,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub max_connections: usize,
    /// WAL appends since the last compaction that trigger a new one.
    pub compact_threshold: u64,
    /// Public sites are served from `{tenant}.{root_domain}`.
    pub root_domain: String,
    /// Subdomain reserved for the admin app; never resolves to a tenant.
    pub admin_subdomain: String,
    pub booking_rate: RateLimit,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind: "0.0.0.0".into(),
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            max_connections: 256,
            compact_threshold: 1000,
            root_domain: "localhost".into(),
            admin_subdomain: "app".into(),
            booking_rate: RateLimit::BOOKING_REQUESTS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup. Unset or unparsable values keep their default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
            lookup(key).and_then(|v| v.trim().parse().ok())
        }

        Self {
            port: parsed(&lookup, "INNKEEP_PORT").unwrap_or(defaults.port),
            bind: lookup("INNKEEP_BIND").unwrap_or(defaults.bind),
            data_dir: lookup("INNKEEP_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: parsed(&lookup, "INNKEEP_METRICS_PORT"),
            max_connections: parsed(&lookup, "INNKEEP_MAX_CONNECTIONS").unwrap_or(defaults.max_connections),
            compact_threshold: parsed(&lookup, "INNKEEP_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            root_domain: lookup("INNKEEP_ROOT_DOMAIN")
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .unwrap_or(defaults.root_domain),
            admin_subdomain: lookup("INNKEEP_ADMIN_SUBDOMAIN")
                .map(|s| s.trim().to_ascii_lowercase())
                .unwrap_or(defaults.admin_subdomain),
            booking_rate: RateLimit {
                window: parsed(&lookup, "INNKEEP_BOOKING_RATE_WINDOW_SECS")
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.booking_rate.window),
                max: parsed(&lookup, "INNKEEP_BOOKING_RATE_MAX").unwrap_or(defaults.booking_rate.max),
            },
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
