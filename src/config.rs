use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use tracing::{info, warn};

/// Startup configuration read from `ROOMBOARD_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub admin_token: String,
    /// Prometheus exporter port; no exporter when unset.
    pub metrics_port: Option<u16>,
    /// Journal appends between compactions.
    pub compact_threshold: u64,
    /// Days a temporary booking is kept after its date; purging is off when
    /// unset.
    pub booking_retention_days: Option<u32>,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let admin_token = lookup("ROOMBOARD_ADMIN_TOKEN").unwrap_or_else(|| {
            warn!("ROOMBOARD_ADMIN_TOKEN not set, using the default token");
            "roomboard".to_string()
        });
        let data_dir = lookup("ROOMBOARD_DATA_DIR").unwrap_or_else(|| {
            info!("ROOMBOARD_DATA_DIR not set, using default: ./data");
            "./data".to_string()
        });
        Self {
            bind: try_load(&lookup, "ROOMBOARD_BIND", "0.0.0.0".to_string()),
            port: try_load(&lookup, "ROOMBOARD_PORT", 8080),
            data_dir: PathBuf::from(data_dir),
            admin_token,
            metrics_port: try_load_optional(&lookup, "ROOMBOARD_METRICS_PORT"),
            compact_threshold: try_load(&lookup, "ROOMBOARD_COMPACT_THRESHOLD", 1000),
            booking_retention_days: try_load_optional(&lookup, "ROOMBOARD_BOOKING_RETENTION_DAYS"),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("roomboard.wal")
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value {raw:?}: {e}, using default: {default}");
        default
    })
}

fn try_load_optional<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key)?;
    raw.trim()
        .parse()
        .map_err(|e| warn!("Invalid {key} value {raw:?}: {e}, ignoring"))
        .ok()
}
