//! # Economy Configuration
//!
//! All balance knobs live in an external TOML file loaded once at
//! startup; code carries no tunable constants.
//!
//! ```toml
//! coins_per_major_unit = 2000
//! history_capacity = 200
//! data_dir = "data"
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{EconomyError, EconomyResult};

/// Durable snapshot file name inside `data_dir`.
const SNAPSHOT_FILE: &str = "economy.json";

/// Runtime configuration for the economy engine.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EconomyConfig {
    /// Coins minted per major currency unit paid. The launch deployment
    /// sold 6000 coins for 3.00, hence the default of 2000.
    pub coins_per_major_unit: u32,
    /// Activity log entries kept per account; oldest evicted first.
    pub history_capacity: usize,
    /// Directory holding the durable snapshot.
    pub data_dir: PathBuf,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            coins_per_major_unit: 2000,
            history_capacity: 200,
            data_dir: PathBuf::from("data"),
        }
    }
}

impl EconomyConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::Storage`] if the file cannot be read and
    /// [`EconomyError::InvalidConfig`] if it does not parse or validate.
    pub fn from_toml(path: impl AsRef<Path>) -> EconomyResult<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|source| {
            EconomyError::Storage { op: "read config", source }
        })?;
        let config: Self =
            toml::from_str(&text).map_err(|e| EconomyError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the knobs make a workable economy.
    ///
    /// # Errors
    ///
    /// Returns [`EconomyError::InvalidConfig`] on a zero exchange rate or
    /// a zero history capacity.
    pub fn validate(&self) -> EconomyResult<()> {
        if self.coins_per_major_unit == 0 {
            return Err(EconomyError::InvalidConfig(
                "coins_per_major_unit must be positive".to_owned(),
            ));
        }
        if self.history_capacity == 0 {
            return Err(EconomyError::InvalidConfig(
                "history_capacity must be positive".to_owned(),
            ));
        }
        Ok(())
    }

    /// Path of the durable snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(SNAPSHOT_FILE)
    }
}
