//! TOML configuration for a monitoring session.

use std::{path::Path, time::Duration};

use serde::Deserialize;

use crate::error::ConfigError;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct MonitorConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub monitor: PollConfig,
}

/// Engine pool and per-rank loop parameters.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SimulationConfig {
    /// Engines to start in local mode; ignored under `mpirun`
    #[serde(default = "default_engines")]
    pub engines: usize,
    #[serde(default = "default_nsteps")]
    pub nsteps: usize,
    #[serde(default = "default_step_delay_ms")]
    pub step_delay_ms: u64,
    /// Mesh rows, split across ranks
    #[serde(default = "default_mesh_size")]
    pub rows: usize,
    #[serde(default = "default_mesh_size")]
    pub cols: usize,
    /// Fixes the engine-to-rank layout; random when absent
    #[serde(default)]
    pub rank_seed: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct PollConfig {
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
    /// Stop polling after this many seconds; no limit when absent
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: Option<u64>,
}

fn default_engines() -> usize {
    4
}
fn default_nsteps() -> usize {
    100
}
fn default_step_delay_ms() -> u64 {
    100
}
fn default_mesh_size() -> usize {
    100
}
fn default_refresh_ms() -> u64 {
    1000
}
fn default_timeout_secs() -> Option<u64> {
    Some(60)
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            engines: default_engines(),
            nsteps: default_nsteps(),
            step_delay_ms: default_step_delay_ms(),
            rows: default_mesh_size(),
            cols: default_mesh_size(),
            rank_seed: None,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            refresh_ms: default_refresh_ms(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SimulationConfig {
    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    /// Steps between two gathers, so gathers roughly follow `refresh`.
    pub fn steps_per_refresh(&self, refresh: Duration) -> usize {
        if self.step_delay_ms == 0 {
            return 1;
        }
        ((refresh.as_millis() / self.step_delay_ms as u128) as usize).max(1)
    }
}

impl PollConfig {
    pub fn refresh(&self) -> Duration {
        Duration::from_millis(self.refresh_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

impl MonitorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sim = &self.simulation;
        if sim.engines == 0 {
            return Err(ConfigError::Invalid("engines must be >= 1".into()));
        }
        if sim.nsteps == 0 {
            return Err(ConfigError::Invalid("nsteps must be >= 1".into()));
        }
        if sim.cols == 0 {
            return Err(ConfigError::Invalid("cols must be >= 1".into()));
        }
        if sim.rows < sim.engines {
            return Err(ConfigError::Invalid(format!(
                "rows ({}) must be at least the number of engines ({})",
                sim.rows, sim.engines
            )));
        }
        if self.monitor.refresh_ms == 0 {
            return Err(ConfigError::Invalid("refresh_ms must be > 0".into()));
        }
        Ok(())
    }
}

pub fn parse_config(text: &str) -> Result<MonitorConfig, ConfigError> {
    let config: MonitorConfig = toml::from_str(text)?;
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let text = std::fs::read_to_string(path)?;
    parse_config(&text)
}
