//! Router and pool defaults
//!
//! Constants shared by the router, the pool model and the configuration
//! loader so every component agrees on the same tolerances.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Maximum number of pairwise balancing sweeps before the router gives up
/// and returns its best split.
pub const MAX_SWEEPS: usize = 5;

/// Relative marginal-price gap under which a split counts as converged (0.1%)
pub const PRICE_TOLERANCE: Decimal = dec!(0.001);

/// Largest per-pool amount change between sweeps, relative to the total,
/// under which the split counts as stable (0.1%)
pub const AMOUNT_TOLERANCE: Decimal = dec!(0.001);

/// Legs smaller than this are skipped when a split is executed
pub const MIN_ROUTED_AMOUNT: Decimal = dec!(0.0001);

/// Allowed relative drift between the split sum and the requested total (0.1%)
pub const SPLIT_SUM_TOLERANCE: Decimal = dec!(0.001);

/// Relative tolerance for `reserve_x * reserve_y` invariant checks
pub const INVARIANT_TOLERANCE: Decimal = dec!(0.000000001);

/// Directory, relative to the working directory, holding the config files
pub const CONFIG_DIR: &str = "config";

/// Base configuration file inside [`CONFIG_DIR`]
pub const CONFIG_FILE: &str = "splitroute.toml";

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "SPLITROUTE";

/// Default log filter when neither the config nor `RUST_LOG` sets one
pub const DEFAULT_LOG_LEVEL: &str = "info";
