//! ---
//! iw_section: "01-core-functionality"
//! iw_subsection: "module"
//! iw_type: "source"
//! iw_scope: "code"
//! iw_description: "Shared primitives and utilities for the simulator runtime."
//! iw_version: "v0.1.0"
//! iw_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;

use crate::connstr::ConnectionString;
use crate::logging::LogFormat;

fn default_send_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_publish_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_sensor_type() -> String {
    "skateway".to_owned()
}

fn default_grace_period() -> Duration {
    Duration::from_secs(5)
}

fn default_random_seed() -> u64 {
    0x1CE0u64
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

/// The set of devices participating in a simulation run, keyed by device id.
pub type Roster = IndexMap<String, DeviceConfig>;

/// Primary configuration object for the Icewatch simulator.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Device roster; entry keys are the unique device identifiers.
    #[serde(default)]
    pub devices: Roster,
    /// Named sensor ranges shared read-only across all sessions.
    #[serde(default)]
    pub sensors: IndexMap<String, SensorRange>,
    #[serde(default)]
    pub send: SendConfig,
    #[serde(default)]
    pub supervisor: SupervisorConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "ICEWATCH_CONFIG";

    /// Load configuration from disk, respecting the `ICEWATCH_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                return Self::from_path(PathBuf::from(env_path));
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                return Self::from_path(candidate.as_ref().to_path_buf());
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
        if self.sensors.is_empty() {
            return Err(anyhow!("configuration must declare at least one sensor range"));
        }
        for (name, range) in &self.sensors {
            range.validate(name)?;
        }
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

/// One simulated device. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Opaque connection string handed to the publisher collaborator.
    pub connection: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl DeviceConfig {
    /// Whether the device carries usable (non-placeholder) credentials.
    pub fn is_configured(&self) -> bool {
        ConnectionString::parse(&self.connection).is_ok()
    }
}

/// Inclusive measurement bounds for one named sensor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct SensorRange {
    pub min: f64,
    pub max: f64,
}

impl SensorRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn validate(&self, name: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() {
            return Err(anyhow!("sensor range '{}' bounds must be finite", name));
        }
        if self.min > self.max {
            return Err(anyhow!(
                "sensor range '{}' has min {} greater than max {}",
                name,
                self.min,
                self.max
            ));
        }
        Ok(())
    }
}

/// Send-loop cadence and message settings.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendConfig {
    /// Seconds between telemetry cycles for every device.
    #[serde(default = "default_send_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
    /// Upper bound on a single connect or publish call so cancellation is
    /// never starved by a blocked transport.
    #[serde(default = "default_publish_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub publish_timeout: Duration,
    /// Transport-level `sensorType` label attached to outgoing messages.
    #[serde(default = "default_sensor_type")]
    pub sensor_type: String,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            interval: default_send_interval(),
            publish_timeout: default_publish_timeout(),
            sensor_type: default_sensor_type(),
        }
    }
}

/// Supervisor shutdown and seeding behaviour.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Time allowed for sessions to finish cleanup after a cancellation.
    #[serde(default = "default_grace_period")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub grace_period: Duration,
    /// Base seed; each session derives its own independent stream from it.
    #[serde(default = "default_random_seed")]
    pub random_seed: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            grace_period: default_grace_period(),
            random_seed: default_random_seed(),
        }
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
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [devices.dows-lake]
        connection = "HostName=hub.local;DeviceId=dows-lake;SharedAccessKey=c2VjcmV0"

        [devices.nac]
        connection = "HostName=your-iot-hub.azure-devices.net;DeviceId=nac;SharedAccessKey=..."

        [sensors.IceThickness]
        min = 28.0
        max = 35.0

        [sensors.SurfaceTemperature]
        min = -12.0
        max = -2.0

        [send]
        interval = 10
    "#;

    #[test]
    fn parses_sample_configuration() {
        let config: AppConfig = SAMPLE.parse().expect("sample parses");
        assert_eq!(config.devices.len(), 2);
        assert_eq!(config.sensors.len(), 2);
        assert_eq!(config.send.interval, Duration::from_secs(10));
        assert_eq!(config.send.publish_timeout, Duration::from_secs(30));
        assert_eq!(config.supervisor.grace_period, Duration::from_secs(5));
    }

    #[test]
    fn detects_placeholder_devices() {
        let config: AppConfig = SAMPLE.parse().expect("sample parses");
        assert!(config.devices["dows-lake"].is_configured());
        assert!(!config.devices["nac"].is_configured());
    }

    #[test]
    fn rejects_inverted_sensor_range() {
        let inverted = r#"
            [sensors.SnowAccumulation]
            min = 5.0
            max = 0.0
        "#;
        let err = inverted.parse::<AppConfig>().expect_err("range must fail");
        assert!(err.to_string().contains("SnowAccumulation"));
    }

    #[test]
    fn rejects_missing_sensor_table() {
        let err = "".parse::<AppConfig>().expect_err("empty config must fail");
        assert!(err.to_string().contains("sensor range"));
    }

    #[test]
    fn loads_first_existing_candidate_from_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("icewatch.toml");
        std::fs::write(&path, SAMPLE).expect("write sample config");

        let missing = dir.path().join("absent.toml");
        let config = AppConfig::load(&[missing, path]).expect("load succeeds");
        assert_eq!(config.devices.len(), 2);
    }

    #[test]
    fn preserves_sensor_declaration_order() {
        let config: AppConfig = SAMPLE.parse().expect("sample parses");
        let names: Vec<&String> = config.sensors.keys().collect();
        assert_eq!(names, ["IceThickness", "SurfaceTemperature"]);
    }
}
