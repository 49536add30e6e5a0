//! Model configuration from YAML and the clock used for default timestamps

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;

/// Tunables for the node model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Hours added to the creation time to default a node's `timeout`
    #[serde(default = "default_timeout_hours")]
    pub default_timeout_hours: i64,

    /// Extra minutes added on top of `default_timeout_hours`
    #[serde(default)]
    pub default_timeout_minutes: i64,

    /// How long event history records are kept (in seconds)
    #[serde(default = "default_event_retention_secs")]
    pub event_retention_secs: i64,

    /// Reject unknown filter operators at translation time instead of
    /// leaving them to the store
    #[serde(default)]
    pub strict_operators: bool,
}

fn default_timeout_hours() -> i64 {
    6
}

fn default_event_retention_secs() -> i64 {
    86400
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_timeout_hours: default_timeout_hours(),
            default_timeout_minutes: 0,
            event_retention_secs: default_event_retention_secs(),
            strict_operators: false,
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model config {}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: ModelConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.default_timeout_hours < 0 || self.default_timeout_minutes < 0 {
            anyhow::bail!(
                "Default timeout must not be negative ({}h {}m)",
                self.default_timeout_hours,
                self.default_timeout_minutes
            );
        }
        let Some(timeout) = self.default_timeout() else {
            anyhow::bail!(
                "Default timeout is out of range ({}h {}m)",
                self.default_timeout_hours,
                self.default_timeout_minutes
            );
        };
        if timeout <= Duration::zero() {
            anyhow::bail!("Default timeout must be greater than zero");
        }
        if Utc::now().checked_add_signed(timeout).is_none() {
            anyhow::bail!(
                "Default timeout of {}h {}m overflows the supported date range",
                self.default_timeout_hours,
                self.default_timeout_minutes
            );
        }
        if Duration::try_seconds(self.event_retention_secs).is_none() {
            anyhow::bail!(
                "Event retention is out of range, got {}",
                self.event_retention_secs
            );
        }
        if self.event_retention_secs <= 0 {
            anyhow::bail!(
                "Event retention must be greater than zero, got {}",
                self.event_retention_secs
            );
        }
        Ok(())
    }

    pub fn with_default_timeout(mut self, hours: i64, minutes: i64) -> Self {
        self.default_timeout_hours = hours;
        self.default_timeout_minutes = minutes;
        self
    }

    pub fn with_event_retention_secs(mut self, secs: i64) -> Self {
        self.event_retention_secs = secs;
        self
    }

    pub fn with_strict_operators(mut self, strict: bool) -> Self {
        self.strict_operators = strict;
        self
    }

    /// Offset applied to "now" for a new node's `timeout`, `None` when
    /// the hours and minutes do not fit in a duration
    pub fn default_timeout(&self) -> Option<Duration> {
        Duration::try_hours(self.default_timeout_hours)?
            .checked_add(&Duration::try_minutes(self.default_timeout_minutes)?)
    }

    /// Retention window for event history, saturating when out of range
    pub fn event_retention(&self) -> Duration {
        Duration::try_seconds(self.event_retention_secs).unwrap_or(Duration::MAX)
    }
}

/// Source of the current time
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a fixed instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
