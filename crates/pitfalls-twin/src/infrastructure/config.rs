//! Harness Configuration
//!
//! One `HarnessConfig` aggregates every scenario's parameters. All fields
//! have defaults, so a JSON file only needs the values it overrides:
//!
//! ```json
//! {
//!   "deadlock": { "dwell": 50 },
//!   "starvation": { "readers": 6, "bound": 2000 },
//!   "accounting": "disabled"
//! }
//! ```
//!
//! Durations are written as milliseconds; fractions are allowed
//! (`0.05` is 50 µs).

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::introspect::DEFAULT_DUMP_LIMIT;
use crate::domain::locks::LockConfig;
use crate::domain::registry::Accounting;
use crate::domain::scenarios::{
    CheckThenActConfig, CompoundConfig, DeadlockConfig, LivelockConfig, RunOptions,
    StarvationConfig, ToctouConfig,
};
use crate::error::{HarnessError, Result};

/// Parameters of every scenario plus the run environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    pub deadlock: DeadlockConfig,
    pub livelock: LivelockConfig,
    pub check_then_act: CheckThenActConfig,
    pub compound: CompoundConfig,
    pub toctou: ToctouConfig,
    pub starvation: StarvationConfig,
    /// Lock tuning shared by all scenarios
    pub lock: LockConfig,
    /// Contention accounting mode
    pub accounting: Accounting,
    /// Rows shown in thread dumps
    pub dump_limit: usize,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            deadlock: DeadlockConfig::default(),
            livelock: LivelockConfig::default(),
            check_then_act: CheckThenActConfig::default(),
            compound: CompoundConfig::default(),
            toctou: ToctouConfig::default(),
            starvation: StarvationConfig::default(),
            lock: LockConfig::default(),
            accounting: Accounting::default(),
            dump_limit: DEFAULT_DUMP_LIMIT,
        }
    }
}

impl HarnessConfig {
    /// Load and validate a JSON configuration file
    ///
    /// # Errors
    ///
    /// `ConfigIo` if the file cannot be read, `ConfigParse` if it is not
    /// valid JSON for this schema, `InvalidConfig` if a value is out of
    /// range.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Pretty JSON of this configuration
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Validate every scenario's parameters
    pub fn validate(&self) -> Result<()> {
        self.deadlock.validate()?;
        self.livelock.validate()?;
        self.check_then_act.validate()?;
        self.compound.validate()?;
        self.toctou.validate()?;
        self.starvation.validate()?;
        if self.lock.interrupt_poll.is_zero() {
            return Err(HarnessError::invalid("lock: interrupt_poll must be positive"));
        }
        Ok(())
    }

    /// Run environment derived from this configuration
    pub fn run_options(&self) -> RunOptions {
        RunOptions {
            accounting: self.accounting,
            lock: self.lock,
        }
    }
}

/// Serde adapter for `Duration` fields stored as (fractional) milliseconds
pub mod millis {
    use std::time::Duration;

    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    const NANOS_PER_MILLI: u128 = 1_000_000;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = value.as_nanos();
        if nanos % NANOS_PER_MILLI == 0 {
            serializer.serialize_u64((nanos / NANOS_PER_MILLI) as u64)
        } else {
            serializer.serialize_f64(nanos as f64 / NANOS_PER_MILLI as f64)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let ms = f64::deserialize(deserializer)?;
        let nanos = (ms * NANOS_PER_MILLI as f64).round();
        if !nanos.is_finite() || nanos < 0.0 || nanos > u64::MAX as f64 {
            return Err(D::Error::custom(format!("invalid duration: {ms} ms")));
        }
        Ok(Duration::from_nanos(nanos as u64))
    }
}
