use anyhow::{bail, Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::PathBuf,
    sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::footprint::DEFAULT_COOKIE_NAME;
use crate::models::AttributionRecord;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// Environment variable forcing queued dispatch regardless of the file setting.
pub const ASYNC_ENV_VAR: &str = "FOOTPRINTS_ASYNC";

const DEFAULT_ATTRIBUTION_DURATION_SECS: u64 = 2_628_000;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FootprintsConfig {
    /// Store the remote address on each visit.
    pub attribution_ip: bool,
    /// Extra request parameters captured alongside the fixed attribution fields.
    pub custom_parameters: Vec<String>,
    /// Hand visits to the job queue instead of recording them in-line.
    #[serde(rename = "async")]
    pub async_dispatch: bool,
    /// Cookie holding a previously issued footprint.
    pub cookie_name: String,
    /// Seconds a visit stays eligible for attribution before it can be pruned.
    pub attribution_duration: u64,
    pub queue_capacity: usize,
}

impl Default for FootprintsConfig {
    fn default() -> Self {
        Self {
            attribution_ip: false,
            custom_parameters: Vec::new(),
            async_dispatch: false,
            cookie_name: DEFAULT_COOKIE_NAME.into(),
            attribution_duration: DEFAULT_ATTRIBUTION_DURATION_SECS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl FootprintsConfig {
    /// Reject custom parameter names that would shadow a fixed attribution field.
    pub fn validate(&self) -> Result<()> {
        for name in &self.custom_parameters {
            if name.is_empty() {
                bail!("custom parameter names must not be empty");
            }
            if AttributionRecord::FIXED_KEYS.contains(&name.as_str()) {
                bail!("custom parameter '{name}' collides with a built-in attribution field");
            }
        }

        if self.cookie_name.is_empty() {
            bail!("cookie_name must not be empty");
        }

        Ok(())
    }

    pub fn attribution_window(&self) -> Duration {
        i64::try_from(self.attribution_duration)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Apply overrides from the process environment.
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(forced) = std::env::var(ASYNC_ENV_VAR).ok().and_then(|raw| parse_flag(&raw)) {
            self.async_dispatch = forced;
        }
        self
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    let value = value.trim();
    if value == "1" || value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value == "0" || value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// JSON-file backed configuration, shared across request handlers.
pub struct ConfigStore {
    path: PathBuf,
    data: RwLock<FootprintsConfig>,
}

impl ConfigStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            match serde_json::from_str(&contents) {
                Ok(config) => config,
                Err(err) => {
                    log_warn!(
                        "Ignoring malformed config at {} ({err}); using defaults",
                        path.display()
                    );
                    FootprintsConfig::default()
                }
            }
        } else {
            FootprintsConfig::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    /// Snapshot of the effective configuration, environment overrides included.
    pub fn current(&self) -> FootprintsConfig {
        self.read().clone().with_env_overrides()
    }

    pub fn update(&self, config: FootprintsConfig) -> Result<()> {
        config.validate()?;
        let mut guard = self.write();
        self.persist(&config)?;
        *guard = config;
        Ok(())
    }

    pub fn reload(&self) -> Result<()> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read config from {}", self.path.display()))?;
        let data: FootprintsConfig = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config at {}", self.path.display()))?;
        *self.write() = data;
        Ok(())
    }

    fn persist(&self, data: &FootprintsConfig) -> Result<()> {
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write config to {}", self.path.display()))
    }

    fn read(&self) -> RwLockReadGuard<'_, FootprintsConfig> {
        match self.data.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, FootprintsConfig> {
        match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
