//! Route manager configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use routemgr_core::{CoreError, LiquidityCurve, ShardConfig, ShardRouteConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("at least one shard must be configured")]
    NoShards,

    #[error("duplicate shard prefix: {0}")]
    DuplicateShard(String),

    #[error("shard {shard} routes through unknown shard host {host}")]
    UnknownShardHost { shard: String, host: String },

    #[error(
        "broadcast interval ({interval_ms} ms) must be shorter than the hold-down time ({hold_down_ms} ms)"
    )]
    IntervalTooLong { interval_ms: u64, hold_down_ms: u64 },

    #[error(transparent)]
    Shard(#[from] CoreError),
}

/// Full configuration for the route manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteManagerConfig {
    /// Port of the internal API the shards talk to.
    #[serde(default = "default_private_port")]
    pub private_port: u16,

    /// How long peers keep our routes, and we keep theirs, without a refresh.
    #[serde(default = "default_hold_down_time_ms")]
    pub hold_down_time_ms: u64,

    /// Pause between scheduler cycles.
    #[serde(default = "default_broadcast_interval_ms")]
    pub broadcast_interval_ms: u64,

    /// Outbound HTTP settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// The shards being coordinated.
    #[serde(default)]
    pub shards: Vec<ShardConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Timeout for a single request to a shard.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (text, json).
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_private_port() -> u16 {
    8071
}
fn default_hold_down_time_ms() -> u64 {
    45_000
}
fn default_broadcast_interval_ms() -> u64 {
    30_000
}
fn default_request_timeout_ms() -> u64 {
    10_000
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "text".into()
}

impl Default for RouteManagerConfig {
    fn default() -> Self {
        Self {
            private_port: default_private_port(),
            hold_down_time_ms: default_hold_down_time_ms(),
            broadcast_interval_ms: default_broadcast_interval_ms(),
            http: HttpConfig::default(),
            logging: LoggingConfig::default(),
            shards: Vec::new(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl RouteManagerConfig {
    /// Load config from a TOML file, falling back to defaults for missing fields.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            let config: RouteManagerConfig = toml::from_str(&contents)?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save the current config to a TOML file.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// A two-shard deployment bridging a USD and a EUR ledger, written by `--init`.
    pub fn example() -> Self {
        let west = "g.usd.connie.west.";
        let east = "g.eur.connie.east.";
        Self {
            shards: vec![
                ShardConfig {
                    prefix: west.into(),
                    host: "http://connie-west:8081".into(),
                    account: "g.usd.connie.west.server".into(),
                    peer_account: "g.usd.connie.west.client".into(),
                    initial_table: vec![ShardRouteConfig {
                        prefix: east.into(),
                        shard: "http://connie-east:8081".into(),
                        curve_local: Some(LiquidityCurve::new(vec![[0.0, 0.0], [50.0, 100.0]])),
                        local: true,
                    }],
                },
                ShardConfig {
                    prefix: east.into(),
                    host: "http://connie-east:8081".into(),
                    account: "g.eur.connie.east.client".into(),
                    peer_account: "g.eur.connie.east.server".into(),
                    initial_table: vec![ShardRouteConfig {
                        prefix: west.into(),
                        shard: "http://connie-west:8081".into(),
                        curve_local: Some(LiquidityCurve::new(vec![[0.0, 0.0], [100.0, 50.0]])),
                        local: true,
                    }],
                },
            ],
            ..Self::default()
        }
    }

    pub fn hold_down_time(&self) -> Duration {
        Duration::from_millis(self.hold_down_time_ms)
    }

    pub fn broadcast_interval(&self) -> Duration {
        Duration::from_millis(self.broadcast_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.http.request_timeout_ms)
    }

    /// Reject configurations the route manager cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.broadcast_interval_ms >= self.hold_down_time_ms {
            return Err(ConfigError::IntervalTooLong {
                interval_ms: self.broadcast_interval_ms,
                hold_down_ms: self.hold_down_time_ms,
            });
        }
        if self.shards.is_empty() {
            return Err(ConfigError::NoShards);
        }

        let mut prefixes = HashSet::new();
        for shard in &self.shards {
            shard.validate()?;
            if !prefixes.insert(shard.prefix.as_str()) {
                return Err(ConfigError::DuplicateShard(shard.prefix.clone()));
            }
        }

        let hosts: HashSet<&str> = self.shards.iter().map(|s| s.host.as_str()).collect();
        for shard in &self.shards {
            if let Some(route) = shard
                .initial_table
                .iter()
                .find(|route| !hosts.contains(route.shard.as_str()))
            {
                return Err(ConfigError::UnknownShardHost {
                    shard: shard.prefix.clone(),
                    host: route.shard.clone(),
                });
            }
        }
        Ok(())
    }
}
