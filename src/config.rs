/// Service configuration loader - parses pegelalarm.toml
///
/// Separates the query slots and timing from code, making it easy to add a
/// water body or station to the poll without recompiling the service.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::ingest::pegelalarm::LIST_URL;

/// Upper bound on independent query slots per cycle.
pub const MAX_SLOTS: usize = 5;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "pegelalarm.toml";

/// One query against the list API. Empty strings mean "no filter".
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct SlotConfig {
    pub stationname: String,
    pub region: String,
    pub water: String,
}

impl SlotConfig {
    /// A slot with every filter blank is unused and never polled.
    pub fn is_active(&self) -> bool {
        !self.stationname.trim().is_empty()
            || !self.region.trim().is_empty()
            || !self.water.trim().is_empty()
    }
}

/// Delays and ceilings for one cycle, in seconds.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Pause between consecutive API calls.
    pub pacing_seconds: u64,
    /// Hard ceiling for the whole process.
    pub watchdog_seconds: u64,
    /// Pause before stopping when the configuration is absent.
    pub grace_seconds: u64,
    pub request_timeout_seconds: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            pacing_seconds: 1,
            watchdog_seconds: 240,
            grace_seconds: 1,
            request_timeout_seconds: 30,
        }
    }
}

impl TimingConfig {
    pub fn pacing(&self) -> Duration {
        Duration::from_secs(self.pacing_seconds)
    }

    pub fn watchdog(&self) -> Duration {
        Duration::from_secs(self.watchdog_seconds)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_seconds)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

/// Root configuration structure for TOML parsing
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Set once the operator has filled in the file.
    #[serde(default)]
    pub configured: bool,
    #[serde(default)]
    pub country: String,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default, rename = "slot")]
    pub slots: Vec<SlotConfig>,
    #[serde(default)]
    pub timing: TimingConfig,
}

fn default_api_url() -> String {
    LIST_URL.to_string()
}

impl ServiceConfig {
    /// A configuration polling the given slots with default timing.
    pub fn new(country: &str, slots: Vec<SlotConfig>) -> Self {
        Self {
            configured: true,
            country: country.to_string(),
            api_url: default_api_url(),
            slots,
            timing: TimingConfig::default(),
        }
    }

    pub fn active_slots(&self) -> impl Iterator<Item = (usize, &SlotConfig)> {
        self.slots.iter().enumerate().filter(|(_, slot)| slot.is_active())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file {0} not found")]
    NotFound(String),
    #[error("Failed to read {path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Adapter is not configured (set configured = true)")]
    NotConfigured,
    #[error("No country code configured")]
    MissingCountry,
    #[error("{0} query slots configured, at most 5 are supported")]
    TooManySlots(usize),
}

impl ConfigError {
    /// Errors that mean "the operator has not set this up yet" as opposed
    /// to a broken file.
    pub fn is_absent(&self) -> bool {
        matches!(
            self,
            ConfigError::NotFound(_) | ConfigError::NotConfigured | ConfigError::MissingCountry
        )
    }
}

/// Parses and validates configuration text.
pub fn parse_config(contents: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig = toml::from_str(contents)?;

    if !config.configured {
        return Err(ConfigError::NotConfigured);
    }
    if config.country.trim().is_empty() {
        return Err(ConfigError::MissingCountry);
    }
    if config.slots.len() > MAX_SLOTS {
        return Err(ConfigError::TooManySlots(config.slots.len()));
    }

    Ok(config)
}

/// Loads the service configuration from a TOML file.
pub fn load_config(path: impl AsRef<Path>) -> Result<ServiceConfig, ConfigError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => ConfigError::NotFound(path.display().to_string()),
        _ => ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        },
    })?;

    parse_config(&contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
configured = true
country = "AT"

[[slot]]
water = "Donau"

[[slot]]
stationname = "Salzburg"
region = ""

[[slot]]

[timing]
pacing_seconds = 2
"#;

    #[test]
    fn test_parse_sample_config() {
        let config = parse_config(SAMPLE).unwrap();
        assert_eq!(config.country, "AT");
        assert_eq!(config.api_url, LIST_URL);
        assert_eq!(config.slots.len(), 3);
        assert_eq!(config.slots[0].water, "Donau");
        assert_eq!(config.timing.pacing_seconds, 2);
        assert_eq!(config.timing.watchdog_seconds, 240);
    }

    #[test]
    fn test_blank_slots_are_inactive() {
        let config = parse_config(SAMPLE).unwrap();
        let active: Vec<usize> = config.active_slots().map(|(i, _)| i).collect();
        assert_eq!(active, vec![0, 1]);

        let whitespace_only = SlotConfig {
            stationname: "   ".to_string(),
            ..Default::default()
        };
        assert!(!whitespace_only.is_active());
    }

    #[test]
    fn test_unconfigured_is_absent() {
        let err = parse_config("country = \"AT\"").unwrap_err();
        assert!(matches!(err, ConfigError::NotConfigured));
        assert!(err.is_absent());

        let err = parse_config("configured = true\ncountry = \" \"").unwrap_err();
        assert!(matches!(err, ConfigError::MissingCountry));
    }

    #[test]
    fn test_too_many_slots() {
        let mut text = String::from("configured = true\ncountry = \"DE\"\n");
        for _ in 0..6 {
            text.push_str("[[slot]]\nwater = \"Rhein\"\n");
        }
        let err = parse_config(&text).unwrap_err();
        assert!(matches!(err, ConfigError::TooManySlots(6)));
        assert!(!err.is_absent());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(dir.path().join("pegelalarm.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
        assert!(err.is_absent());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = load_config(file.path()).unwrap();
        assert_eq!(config.slots[1].stationname, "Salzburg");
    }

    #[test]
    fn test_bundled_config_parses() {
        let config = load_config(concat!(env!("CARGO_MANIFEST_DIR"), "/pegelalarm.toml")).unwrap();
        assert!(config.slots.len() <= MAX_SLOTS);
        assert!(config.active_slots().count() >= 1);
    }
}
