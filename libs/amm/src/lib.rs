//! # Splitroute AMM Library - Tiered-Fee Pools and Split Routing
//!
//! ## Purpose
//!
//! Exact-decimal model of constant product (x*y=k) pools whose swap fee is a
//! function of trade size, plus a router that splits one trade across several
//! such pools so the marginal execution rate is equalised between them.
//!
//! ## Integration Points
//!
//! - **Input**: pool reserves and fee tiers, a total trade amount and a [`Direction`]
//! - **Output**: a [`RouteSplit`] (per-pool amounts) and, when executed, one
//!   [`TradeRecord`] per routed leg
//! - **Configuration**: [`RouterConfig`] built from `splitroute_config::RouterSettings`
//! - **Concurrency**: [`SharedPool`] for pools read and written from several threads
//!
//! ## Architecture Role
//!
//! ```text
//! FeeSchedule ──► Pool (PoolView + PoolHandle) ──► Router::compute_split ──► RouteSplit
//!                      ▲                                                        │
//!                      └──────────────── Router::execute_split ◄────────────────┘
//! ```
//!
//! The router only reads pools through [`PoolView`]; nothing is mutated until
//! a split is explicitly executed through [`PoolHandle`].
//!
//! ## Precision
//!
//! Every amount, rate and reserve is a [`Decimal`]; there is no floating point
//! anywhere in the pricing or routing path.
//!
//! ## Example
//!
//! ```
//! use splitroute_amm::{dec, Direction, FeeSchedule, Pool, Router};
//!
//! let fee = FeeSchedule::flat(dec!(0.003)).unwrap();
//! let mut pools = vec![
//!     Pool::new("a", dec!(1000), dec!(1000), fee.clone()).unwrap(),
//!     Pool::new("b", dec!(1000), dec!(1000), fee).unwrap(),
//! ];
//!
//! let router = Router::default();
//! let (split, records) = router
//!     .route_and_execute(dec!(100), Direction::BuyX, &mut pools, 0)
//!     .unwrap();
//! assert_eq!(split.amounts, vec![dec!(50), dec!(50)]);
//! assert_eq!(records.len(), 2);
//! ```

pub mod error;
pub mod fee_schedule;
pub mod pool;
pub mod pool_traits;
pub mod router;
pub mod shared;
pub mod trade;
pub mod v2_math;

pub use error::{AmmError, Result};
pub use fee_schedule::{FeeSchedule, FeeTier};
pub use pool::Pool;
pub use pool_traits::{PoolHandle, PoolView};
pub use router::{ConvergenceWarning, RouteSplit, Router, RouterConfig, SearchOutcome};
pub use shared::SharedPool;
pub use trade::{Direction, PoolState, SwapQuote, TradeRecord};
pub use v2_math::{LocalCurve, V2Math};

/// Common types for AMM calculations
pub use rust_decimal::Decimal;
pub use rust_decimal_macros::dec;
