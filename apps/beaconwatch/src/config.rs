use std::{env, fmt, fs, path, time::Duration};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub chain: ChainConfig,
    pub cache: CacheConfig,
    pub frontend: FrontendConfig,
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// libsql database holding the `service_status` table
    pub status_path: path::PathBuf,
    /// libsql database holding the indexed chain tables
    pub chain_path: path::PathBuf,
    pub pool_size: usize,
    /// Upper bound for every query issued by a probe
    #[serde(with = "humantime_serde")]
    pub store_timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    pub genesis_time: DateTime<Utc>,
    pub seconds_per_slot: u64,
    pub slots_per_epoch: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// `host:port` of the redis-compatible cache
    pub endpoint: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrontendConfig {
    /// Scheme and host of the public site, e.g. `https://beaconcha.in`
    pub site_url: String,
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Value of `indicesOrPubkey` posted to the dashboard endpoint
    pub dashboard_validators: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub services_window: Duration,
    #[serde(with = "humantime_serde")]
    pub retention: Duration,
    pub expected_services: Vec<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            status_path: "beaconwatch.db".into(),
            chain_path: "chain.db".into(),
            pool_size: 8,
            store_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            // mainnet beacon chain genesis
            genesis_time: DateTime::from_timestamp(1_606_824_023, 0).unwrap_or_default(),
            seconds_per_slot: 12,
            slots_per_epoch: 32,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { endpoint: "127.0.0.1:6379".into(), timeout: Duration::from_secs(30) }
    }
}

impl Default for FrontendConfig {
    fn default() -> Self {
        Self {
            site_url: "https://beaconcha.in".into(),
            timeout: Duration::from_secs(10),
            dashboard_validators: "1,2".into(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(60),
            services_window: Duration::from_secs(15 * 60),
            retention: Duration::from_secs(7 * 24 * 3600),
            expected_services: [
                "eth1indexer",
                "slotVizUpdater",
                "slotUpdater",
                "latestProposedSlotUpdater",
                "epochUpdater",
                "rewardsExporter",
                "mempoolUpdater",
                "indexPageDataUpdater",
                "latestBlockUpdater",
                "notification-collector",
                "relaysUpdater",
                "ethstoreExporter",
                "statsUpdater",
                "poolsUpdater",
                "epochExporter",
                "statistics",
                "poolInfoUpdater",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
        }
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Get default config path ($XDG_CONFIG_HOME/beaconwatch/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::ConfigPathUnavailable);
    };

    Ok(path.join("beaconwatch/config.toml"))
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let write_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str, value: &dyn fmt::Display| {
                writeln!(f, "  {:indent$}{}: {}", "", label, value, indent = level * 2)
            }
        };
        let write_title_indented = |level: usize| {
            move |f: &mut fmt::Formatter<'_>, label: &str| {
                writeln!(f, "{:indent$}{}", "", label, indent = level * 2)
            }
        };
        let duration = |d: Duration| humantime::format_duration(d).to_string();

        let write_title_1 = write_title_indented(1);
        let write_1 = write_indented(1);

        writeln!(f, "Current Internal Configuration State:")?;
        write_title_1(f, "Database")?;
        write_1(f, "Status Store", &self.database.status_path.display())?;
        write_1(f, "Chain Store", &self.database.chain_path.display())?;
        write_1(f, "Pool Size", &self.database.pool_size)?;
        write_1(f, "Store Timeout", &duration(self.database.store_timeout))?;
        write_title_1(f, "Chain")?;
        write_1(f, "Genesis", &self.chain.genesis_time)?;
        write_1(f, "Seconds Per Slot", &self.chain.seconds_per_slot)?;
        write_1(f, "Slots Per Epoch", &self.chain.slots_per_epoch)?;
        write_title_1(f, "Cache")?;
        write_1(f, "Endpoint", &self.cache.endpoint)?;
        write_1(f, "Timeout", &duration(self.cache.timeout))?;
        write_title_1(f, "Frontend")?;
        write_1(f, "Site", &self.frontend.site_url)?;
        write_1(f, "Timeout", &duration(self.frontend.timeout))?;
        write_title_1(f, "Monitoring")?;
        write_1(f, "Interval", &duration(self.monitoring.interval))?;
        write_1(f, "Services Window", &duration(self.monitoring.services_window))?;
        write_1(f, "Retention", &duration(self.monitoring.retention))?;
        write_1(f, "Expected Services", &self.monitoring.expected_services.join(", "))?;

        Ok(())
    }
}

impl Config {
    /// Generate Config structure from file
    ///
    /// Creates a default config in ~/.config/beaconwatch/config.toml
    ///  or the specified path, with the name config.toml if one does not exist
    ///
    /// ```rust,ignore
    /// let cfg = config::Config::from_config(None::<&path::Path>)?;
    /// println!("{}", cfg);
    /// ```
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        if config_path.exists() {
            let raw_string = fs::read_to_string(&config_path)
                .map_err(|source| ConfigError::ReadFailed { path: config_path.clone(), source })?;
            Ok(toml::from_str(raw_string.as_str())?)
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            Ok(config)
        }
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str: String = toml::to_string_pretty(self)?;
        let write_failed =
            |source| ConfigError::WriteFailed { path: path.to_path_buf(), source };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_failed)?;
        }

        fs::write(path, config_str).map_err(write_failed)
    }
}
