//! # Compute Configuration
//!
//! Gas constants and recursion limits of the invocation engine.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};

/// Invocation engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComputeConfig {
    /// Engine gas units per host gas unit.
    pub gas_multiplier: u64,
    /// Engine gas ceiling per call.
    pub max_engine_gas: u64,
    /// Host gas charged for loading a contract instance.
    pub instance_cost: u64,
    /// Host gas charged per byte of uploaded code.
    pub compile_cost: u64,
    /// Host gas limit of a query run under the default capped meter.
    pub smart_query_gas_limit: u64,
    /// Maximum query-from-query nesting depth.
    pub max_query_depth: u32,
    /// Maximum nesting of instantiate/execute/reply frames.
    pub max_call_depth: usize,
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            gas_multiplier: 1_000,
            max_engine_gas: 10_000_000_000,
            instance_cost: 40_000,
            compile_cost: 2,
            smart_query_gas_limit: 3_000_000,
            max_query_depth: 10,
            max_call_depth: 64,
        }
    }
}

impl ComputeConfig {
    /// Rejects values the engine cannot run with.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gas_multiplier == 0 {
            return Err(ConfigError::Invalid {
                field: "gas_multiplier",
                reason: "must be positive".into(),
            });
        }
        if self.max_engine_gas == 0 {
            return Err(ConfigError::Invalid {
                field: "max_engine_gas",
                reason: "must be positive".into(),
            });
        }
        if self.max_call_depth == 0 {
            return Err(ConfigError::Invalid {
                field: "max_call_depth",
                reason: "must allow at least one frame".into(),
            });
        }
        Ok(())
    }
}

#[cfg(feature = "config-file")]
mod toml_config {
    use super::{ComputeConfig, ConfigError};
    use serde::Deserialize;
    use std::fs;
    use std::path::Path;

    /// Configuration file structure.
    #[derive(Debug, Deserialize, Default)]
    struct ConfigFile {
        #[serde(default)]
        gas: GasSection,
        #[serde(default)]
        limits: LimitsSection,
    }

    #[derive(Debug, Deserialize, Default)]
    struct GasSection {
        multiplier: Option<u64>,
        max_engine_gas: Option<u64>,
        instance_cost: Option<u64>,
        compile_cost: Option<u64>,
        smart_query_gas_limit: Option<u64>,
    }

    #[derive(Debug, Deserialize, Default)]
    struct LimitsSection {
        max_query_depth: Option<u32>,
        max_call_depth: Option<usize>,
    }

    impl ComputeConfig {
        /// Load configuration from a TOML file.
        ///
        /// # Config File Format
        ///
        /// ```toml
        /// [gas]
        /// multiplier = 1000
        /// max_engine_gas = 10000000000
        /// instance_cost = 40000
        /// compile_cost = 2
        /// smart_query_gas_limit = 3000000
        ///
        /// [limits]
        /// max_query_depth = 10
        /// max_call_depth = 64
        /// ```
        ///
        /// # Errors
        ///
        /// Returns error if file cannot be read, parsed or validated.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
            let content = fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
                path: path.as_ref().display().to_string(),
                error: e.to_string(),
            })?;

            Self::from_toml_str(&content)
        }

        /// Parse configuration from a TOML string. Missing keys keep their
        /// defaults.
        ///
        /// # Errors
        ///
        /// Returns error if the content cannot be parsed or validated.
        pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
            let file: ConfigFile =
                toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

            let defaults = Self::default();
            let gas = file.gas;
            let limits = file.limits;
            let config = Self {
                gas_multiplier: gas.multiplier.unwrap_or(defaults.gas_multiplier),
                max_engine_gas: gas.max_engine_gas.unwrap_or(defaults.max_engine_gas),
                instance_cost: gas.instance_cost.unwrap_or(defaults.instance_cost),
                compile_cost: gas.compile_cost.unwrap_or(defaults.compile_cost),
                smart_query_gas_limit: gas
                    .smart_query_gas_limit
                    .unwrap_or(defaults.smart_query_gas_limit),
                max_query_depth: limits.max_query_depth.unwrap_or(defaults.max_query_depth),
                max_call_depth: limits.max_call_depth.unwrap_or(defaults.max_call_depth),
            };
            config.validate()?;
            Ok(config)
        }
    }
}
