//! Typed configuration from environment variables.
//!
//! Loads once at startup and fails fast on values that do not parse.
//! Every variable is optional; defaults suit a local run.

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::report::{DrainMode, ReportConfig};

pub const DEFAULT_WORKERS: usize = 8;
pub const DEFAULT_MAX_ROUNDS: u32 = 20;

#[derive(Debug, Clone)]
pub struct Config {
    /// Worker threads per report run (`BGQUEUE_WORKERS`).
    pub worker_count: usize,
    /// Drain-and-retry rounds before giving up on failures
    /// (`BGQUEUE_MAX_ROUNDS`, `0` = unlimited).
    pub max_rounds: Option<u32>,
    /// `id,endpoint` list to report on (`DEALERSHIPS_FILE`).
    pub dealerships_file: Option<PathBuf>,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let max_rounds = parsed_var("BGQUEUE_MAX_ROUNDS")?.unwrap_or(DEFAULT_MAX_ROUNDS);
        Ok(Self {
            worker_count: parsed_var("BGQUEUE_WORKERS")?.unwrap_or(DEFAULT_WORKERS),
            max_rounds: (max_rounds > 0).then_some(max_rounds),
            dealerships_file: std::env::var_os("DEALERSHIPS_FILE").map(PathBuf::from),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Report settings derived from this configuration.
    pub fn report_config(&self) -> ReportConfig {
        ReportConfig {
            worker_count: self.worker_count,
            max_rounds: self.max_rounds,
            drain: DrainMode::Block,
        }
    }
}

fn parsed_var<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Config(format!("environment variable {name}={raw:?}: {e}"))),
        Err(_) => Ok(None),
    }
}
