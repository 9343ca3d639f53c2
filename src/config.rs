//! Configuration loaded from `skimrun.toml`.
//!
//! Every field is optional and falls back to a default. The environment
//! variable `SKIMRUN_CONCURRENCY` takes precedence over the file; command
//! line flags take precedence over both (applied in `main`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::SkimrunError;
use crate::runner::Budget;

pub const CONFIG_FILE: &str = "skimrun.toml";
pub const CONCURRENCY_ENV: &str = "SKIMRUN_CONCURRENCY";

#[derive(Debug, Clone, Deserialize)]
pub struct SkimrunConfig {
    /// Maximum number of items running at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Kill an item still running after this many seconds.
    #[serde(default)]
    pub item_timeout_secs: Option<u64>,

    /// Directory receiving one stdout file per item.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

fn default_concurrency() -> usize {
    Budget::DEFAULT
}

impl Default for SkimrunConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            item_timeout_secs: None,
            output_dir: None,
        }
    }
}

impl SkimrunConfig {
    /// Load `skimrun.toml` from the current directory, then apply the environment.
    pub fn load() -> Result<Self, SkimrunError> {
        let mut config = Self::load_from(Path::new(CONFIG_FILE))?;
        if let Ok(value) = std::env::var(CONCURRENCY_ENV) {
            config.apply_concurrency_override(&value)?;
        }
        Ok(config)
    }

    /// Load from `path`, using defaults if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self, SkimrunError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config = toml::from_str::<SkimrunConfig>(&contents)?;
        config.budget()?;
        Ok(config)
    }

    fn apply_concurrency_override(&mut self, value: &str) -> Result<(), SkimrunError> {
        let value = value.trim();
        if value.is_empty() {
            return Ok(());
        }
        self.concurrency = value.parse().map_err(|e| {
            SkimrunError::Config(format!("{CONCURRENCY_ENV}={value:?} is not a number: {e}"))
        })?;
        self.budget()?;
        Ok(())
    }

    pub fn budget(&self) -> Result<Budget, SkimrunError> {
        Budget::new(self.concurrency)
            .map_err(|_| SkimrunError::Config("concurrency must be at least 1".into()))
    }

    pub fn item_timeout(&self) -> Option<Duration> {
        self.item_timeout_secs.map(Duration::from_secs)
    }
}
