//! Clinic configuration: booking limits, shift hours and logging.
//!
//! Every field has a default, so a JSON document only needs to name what it
//! overrides.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::calendar::ShiftCatalog;
use crate::error::{Result, SchedulingError};
use crate::policy::PolicyConfig;

pub const APP_NAME: &str = "clinicsched";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Environment variable holding the path of a JSON config file.
pub const CONFIG_ENV: &str = "CLINICSCHED_CONFIG";

pub fn default_log_filter() -> String {
    format!("{APP_NAME}=info")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicConfig {
    pub policy: PolicyConfig,
    pub shifts: ShiftCatalog,
    pub log_filter: String,
}

impl Default for ClinicConfig {
    fn default() -> Self {
        ClinicConfig {
            policy: PolicyConfig::default(),
            shifts: ShiftCatalog::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl ClinicConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ClinicConfig =
            serde_json::from_str(json).map_err(|e| SchedulingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| SchedulingError::Config(format!("{}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    /// Load from the file named by `CLINICSCHED_CONFIG`, or use defaults.
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.policy.check().map_err(SchedulingError::Config)?;
        self.shifts.check().map_err(SchedulingError::Config)?;
        Ok(())
    }
}
