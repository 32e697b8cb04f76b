//! Engine Configuration Module
//!
//! Loads router and logging settings from a TOML file with optional
//! environment-specific overlays and `SPLITROUTE__*` environment variables.
//!
//! Decimal settings should be written as strings (`price_tolerance = "0.001"`)
//! so they never pass through binary floating point.

use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

use crate::defaults;

/// Top-level configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Router convergence settings
    pub router: RouterSettings,

    /// Logging settings
    pub logging: LoggingSettings,
}

/// Convergence and execution knobs for the multi-pool router
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RouterSettings {
    /// Sweep cap; the best split seen is returned once it is reached
    pub max_sweeps: usize,
    /// Relative marginal-price gap considered converged
    pub price_tolerance: Decimal,
    /// Per-pool amount change (relative to the total) considered stable
    pub amount_tolerance: Decimal,
    /// Legs below this amount are not executed
    pub min_routed_amount: Decimal,
}

/// Logging output settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// Filter directive used when `RUST_LOG` is unset (e.g. "info", "splitroute_amm=debug")
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for RouterSettings {
    fn default() -> Self {
        Self {
            max_sweeps: defaults::MAX_SWEEPS,
            price_tolerance: defaults::PRICE_TOLERANCE,
            amount_tolerance: defaults::AMOUNT_TOLERANCE,
            min_routed_amount: defaults::MIN_ROUTED_AMOUNT,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: defaults::DEFAULT_LOG_LEVEL.to_string(),
            json: false,
        }
    }
}

impl RouterSettings {
    /// Reject settings the router cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_sweeps == 0 {
            bail!("router.max_sweeps must be at least 1");
        }
        if self.price_tolerance <= Decimal::ZERO || self.price_tolerance >= Decimal::ONE {
            bail!(
                "router.price_tolerance must be in (0, 1), got {}",
                self.price_tolerance
            );
        }
        if self.amount_tolerance <= Decimal::ZERO || self.amount_tolerance >= Decimal::ONE {
            bail!(
                "router.amount_tolerance must be in (0, 1), got {}",
                self.amount_tolerance
            );
        }
        if self.min_routed_amount < Decimal::ZERO {
            bail!(
                "router.min_routed_amount must be non-negative, got {}",
                self.min_routed_amount
            );
        }
        Ok(())
    }
}

impl EngineConfig {
    /// Load configuration from a base file with environment overrides
    ///
    /// The environment overlay is looked up as
    /// `<base dir>/environments/<environment>.toml` and is optional.
    pub fn load(base_path: &Path, environment: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder().add_source(File::from(base_path).required(true));

        if let Some(env) = environment {
            let env_file = base_path
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("environments")
                .join(format!("{}.toml", env));

            if env_file.exists() {
                info!("Loading environment config: {:?}", env_file);
                builder = builder.add_source(File::from(env_file));
            } else {
                warn!("Environment config not found: {:?}", env_file);
            }
        }

        // SPLITROUTE__ROUTER__MAX_SWEEPS=3 style overrides
        builder = builder.add_source(
            Environment::with_prefix(defaults::ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .context("Failed to build configuration")?;

        let engine: EngineConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        engine
            .router
            .validate()
            .context("Invalid router configuration")?;

        info!(
            max_sweeps = engine.router.max_sweeps,
            price_tolerance = %engine.router.price_tolerance,
            "Router configuration loaded"
        );

        Ok(engine)
    }
}

/// Load `splitroute.toml` and its overlays from `config_dir`
pub fn load_config_from(config_dir: &Path, environment: Option<&str>) -> Result<EngineConfig> {
    EngineConfig::load(&config_dir.join(defaults::CONFIG_FILE), environment)
}

/// Convenience function to load configuration from the conventional location
pub fn load_config(environment: Option<&str>) -> Result<EngineConfig> {
    load_config_from(Path::new(defaults::CONFIG_DIR), environment)
}
