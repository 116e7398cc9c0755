//! Configuration loading with Figment.
//!
//! Configuration comes from a TOML file plus environment overrides
//! (prefixed with `DETCON_`). Every field has a default, so a missing file
//! yields a usable one-module simulated setup.
//!
//! ```toml
//! [application]
//! log_level = "debug"
//!
//! [acquisition]
//! exptime = "10ms"
//! frames = 100
//!
//! [[modules]]
//! hostname = "bchip007"
//! type = "jungfrau"
//! ```

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use crate::defs::DetectorType;

/// Default config file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/detcon.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Application settings
    pub application: ApplicationConfig,
    /// Acquisition defaults applied at detector construction
    pub acquisition: AcquisitionConfig,
    /// Module definitions
    pub modules: Vec<ModuleDefinition>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            acquisition: AcquisitionConfig::default(),
            modules: vec![ModuleDefinition::default()],
        }
    }
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "detcon".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Acquisition defaults programmed into every module at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Exposure time per frame
    #[serde(with = "humantime_serde")]
    pub exptime: Duration,
    /// Frame period
    #[serde(with = "humantime_serde")]
    pub period: Duration,
    /// Frames per cycle
    pub frames: u64,
    /// Trigger cycles
    pub cycles: u64,
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            exptime: Duration::ZERO,
            period: Duration::ZERO,
            frames: 1,
            cycles: 1,
        }
    }
}

/// One module definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModuleDefinition {
    /// Hostname the module answers under
    pub hostname: String,
    /// Detector type (e.g. "jungfrau")
    #[serde(rename = "type")]
    pub detector_type: DetectorType,
    /// Whether this module takes part in operations
    pub enabled: bool,
}

impl Default for ModuleDefinition {
    fn default() -> Self {
        Self {
            hostname: "sim0".to_string(),
            detector_type: DetectorType::Generic,
            enabled: true,
        }
    }
}

impl Config {
    /// Load configuration from the default path and environment variables.
    ///
    /// Environment variables can override configuration with prefix DETCON_
    /// Example: DETCON_APPLICATION_NAME=bchip-lab
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DETCON_").split("_"))
            .extract()
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        if self.acquisition.frames == 0 {
            return Err("acquisition.frames must be >= 1".to_string());
        }
        if self.acquisition.cycles == 0 {
            return Err("acquisition.cycles must be >= 1".to_string());
        }

        let mut hostnames = HashSet::new();
        for module in &self.modules {
            if module.hostname.is_empty() {
                return Err("module hostname must not be empty".to_string());
            }
            if !hostnames.insert(&module.hostname) {
                return Err(format!("Duplicate module hostname: {}", module.hostname));
            }
        }
        Ok(())
    }

    /// Enabled module definitions.
    pub fn enabled_modules(&self) -> impl Iterator<Item = &ModuleDefinition> {
        self.modules.iter().filter(|m| m.enabled)
    }
}
