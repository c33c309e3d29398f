// src/config.rs
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;

use crate::domain::rules::DiffRules;
use crate::errors::ServerError;
use crate::tesla::TeslaApiConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub max_workers: usize,
    pub db_path: PathBuf,
    /// Optional JSON file overriding the built-in ignore list and labels.
    pub rules_path: Option<PathBuf>,
    pub log_format: LogFormat,
    pub tesla: TeslaApiConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
            max_workers: 8,
            db_path: PathBuf::from("order_tracker.sqlite3"),
            rules_path: None,
            log_format: LogFormat::Compact,
            tesla: TeslaApiConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ServerError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ServerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("ORDER_TRACKER_ADDR") {
            cfg.bind_addr = parse("ORDER_TRACKER_ADDR", &v)?;
        }
        if let Some(v) = get("ORDER_TRACKER_WORKERS") {
            cfg.max_workers = parse("ORDER_TRACKER_WORKERS", &v)?;
            if cfg.max_workers == 0 {
                return Err(ServerError::Config("ORDER_TRACKER_WORKERS must be at least 1".into()));
            }
        }
        if let Some(v) = get("ORDER_TRACKER_DB") {
            cfg.db_path = PathBuf::from(v);
        }
        cfg.rules_path = get("ORDER_TRACKER_RULES").map(PathBuf::from);
        if let Some(v) = get("ORDER_TRACKER_LOG_FORMAT") {
            cfg.log_format = match v.to_ascii_lowercase().as_str() {
                "compact" => LogFormat::Compact,
                "json" => LogFormat::Json,
                other => {
                    return Err(ServerError::Config(format!(
                        "ORDER_TRACKER_LOG_FORMAT must be compact or json, got {other}"
                    )))
                }
            };
        }

        if let Some(v) = get("TESLA_CLIENT_ID") {
            cfg.tesla.client_id = v;
        }
        if let Some(v) = get("TESLA_ORDERS_URL") {
            cfg.tesla.orders_url = v;
        }
        if let Some(v) = get("TESLA_ORDER_DETAILS_URL") {
            cfg.tesla.order_details_url = v;
        }
        if let Some(v) = get("TESLA_TOKEN_URL") {
            cfg.tesla.token_url = v;
        }
        if let Some(v) = get("TESLA_TIMEOUT_SECS") {
            cfg.tesla.timeout_secs = parse("TESLA_TIMEOUT_SECS", &v)?;
        }

        Ok(cfg)
    }

    pub fn load_rules(&self) -> Result<DiffRules, ServerError> {
        match &self.rules_path {
            Some(path) => DiffRules::from_file(path),
            None => Ok(DiffRules::default()),
        }
    }
}

fn parse<T>(key: &str, value: &str) -> Result<T, ServerError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ServerError::Config(format!("{key}: {e}")))
}
