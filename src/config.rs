use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

/// Default timeout budget applied to every recycled cycle, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// What `expired()` does with a still-suspended cycle after the timeout
/// listeners have run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeoutAction {
    /// Move the cycle toward completion (the default).
    Complete,
    /// Re-dispatch the request through the handler pipeline instead.
    Dispatch,
}

/// Per-cycle defaults handed to each `RequestCycle` at construction.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CycleConfig {
    /// Timeout budget restored on every recycle, in milliseconds.
    /// Zero disables timeout enforcement.
    pub default_timeout_ms: u64,
    /// Post-expiry transition policy.
    pub on_timeout: TimeoutAction,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: DEFAULT_TIMEOUT_MS,
            on_timeout: TimeoutAction::Complete,
        }
    }
}

impl CycleConfig {
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.default_timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub cycle: CycleConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "127.0.0.1:7070".to_string(),
            cycle: CycleConfig::default(),
        }
    }
}

impl Config {
    /// Loads configuration from the YAML file named by `RESPITE_CONFIG`,
    /// falling back to defaults when the variable is unset. A `LISTEN`
    /// env var overrides the listen address either way.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("RESPITE_CONFIG") {
            Ok(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file {}", path))?;
                Self::from_yaml(&raw)?
            }
            Err(_) => Self::default(),
        };

        if let Ok(listen) = std::env::var("LISTEN") {
            cfg.listen_addr = listen;
        }

        Ok(cfg)
    }

    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        serde_yaml::from_str(raw).context("Invalid config YAML")
    }
}
