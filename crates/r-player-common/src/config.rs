//! ---
//! ems_section: "01-core-functionality"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Shared primitives and utilities for the player runtime."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::{LogFormat, LogRotation};

fn default_config_file() -> PathBuf {
    PathBuf::from("configs/assets.csv")
}

fn default_endless() -> bool {
    true
}

fn default_path_separator() -> String {
    ".".to_owned()
}

fn default_fast_forward_factor() -> u32 {
    2
}

fn default_idle_poll() -> Duration {
    Duration::from_secs(1)
}

fn default_loop_pause() -> Duration {
    Duration::from_secs(1)
}

fn default_monitor_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_correction_gain() -> f64 {
    1.0
}

fn default_max_frequency_hz() -> u32 {
    10_000
}

fn default_sink_output() -> PathBuf {
    PathBuf::from("target/samples.log")
}

fn default_sink_capacity() -> usize {
    65_536
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_drain_poll() -> Duration {
    Duration::from_millis(500)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_log_file() -> bool {
    true
}

/// Primary configuration object for the player runtime.
///
/// Built once at startup and handed to every component that needs it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub sink: SinkConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "R_PLAYER_CONFIG";

    /// Load configuration from disk, respecting the `R_PLAYER_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.player.validate()?;
        self.simulation.validate()?;
        self.sink.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Input files and replay behaviour.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    #[serde(default = "default_config_file")]
    pub config_file: PathBuf,
    #[serde(default)]
    pub data_file: Option<PathBuf>,
    #[serde(default = "default_endless")]
    pub endless: bool,
    #[serde(default)]
    pub autostart: bool,
    #[serde(default = "default_path_separator")]
    pub path_separator: String,
    #[serde(default = "default_fast_forward_factor")]
    pub fast_forward_factor: u32,
    #[serde(default = "default_idle_poll")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub idle_poll: Duration,
    #[serde(default = "default_loop_pause")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub loop_pause: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            config_file: default_config_file(),
            data_file: None,
            endless: default_endless(),
            autostart: false,
            path_separator: default_path_separator(),
            fast_forward_factor: default_fast_forward_factor(),
            idle_poll: default_idle_poll(),
            loop_pause: default_loop_pause(),
        }
    }
}

impl PlayerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.path_separator.is_empty() {
            return Err(anyhow!("player path_separator must not be empty"));
        }
        if self.fast_forward_factor == 0 {
            return Err(anyhow!("player fast_forward_factor must be at least 1"));
        }
        if self.idle_poll.is_zero() {
            return Err(anyhow!("player idle_poll must be greater than zero"));
        }
        Ok(())
    }
}

/// Formula scheduler tuning.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_monitor_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub monitor_interval: Duration,
    #[serde(default = "default_correction_gain")]
    pub correction_gain: f64,
    #[serde(default = "default_max_frequency_hz")]
    pub max_frequency_hz: u32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            monitor_interval: default_monitor_interval(),
            correction_gain: default_correction_gain(),
            max_frequency_hz: default_max_frequency_hz(),
        }
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.monitor_interval.is_zero() {
            return Err(anyhow!("simulation monitor_interval must be greater than zero"));
        }
        if !(self.correction_gain > 0.0 && self.correction_gain <= 1.0) {
            return Err(anyhow!(
                "simulation correction_gain {} must lie in (0, 1]",
                self.correction_gain
            ));
        }
        if self.max_frequency_hz == 0 {
            return Err(anyhow!("simulation max_frequency_hz must be at least 1"));
        }
        Ok(())
    }
}

/// Behaviour of the sample queue once it reaches capacity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OverflowPolicy {
    #[default]
    DropOldest,
    DropNewest,
}

/// File sample logger settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_sink_output")]
    pub output_file: PathBuf,
    #[serde(default = "default_sink_capacity")]
    pub capacity: usize,
    #[serde(default)]
    pub overflow: OverflowPolicy,
    #[serde(default = "default_drain_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub drain_timeout: Duration,
    #[serde(default = "default_drain_poll")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub drain_poll: Duration,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            output_file: default_sink_output(),
            capacity: default_sink_capacity(),
            overflow: OverflowPolicy::default(),
            drain_timeout: default_drain_timeout(),
            drain_poll: default_drain_poll(),
        }
    }
}

impl SinkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(anyhow!("sink capacity must be at least 1"));
        }
        if self.drain_poll.is_zero() {
            return Err(anyhow!("sink drain_poll must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Write a JSON log file under `directory` next to stdout.
    #[serde(default = "default_log_file")]
    pub file: bool,
    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            file: default_log_file(),
            rotation: LogRotation::default(),
        }
    }
}
