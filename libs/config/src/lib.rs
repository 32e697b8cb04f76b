//! # Splitroute Configuration
//!
//! Centralized defaults, configuration loading and logging setup for the
//! splitroute pool model and router.
//!
//! ## Features
//!
//! - **Defaults**: Sweep cap, convergence tolerances, invariant tolerance
//! - **Settings**: TOML + environment overlay loading via the `config` crate
//! - **Logging**: `tracing-subscriber` initialisation driven by settings
//!
//! ## Usage
//!
//! ```rust
//! use splitroute_config::{defaults, RouterSettings};
//!
//! let settings = RouterSettings::default();
//! assert_eq!(settings.max_sweeps, defaults::MAX_SWEEPS);
//! assert!(settings.validate().is_ok());
//! ```

pub mod defaults;
pub mod logging;
pub mod settings;

// Re-export commonly used types
pub use logging::init_tracing;
pub use settings::{load_config, load_config_from, EngineConfig, LoggingSettings, RouterSettings};
