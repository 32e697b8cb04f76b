//! Error types for fee schedules, pool operations and routing
//!
//! Schedule errors surface at construction, liquidity errors at execution,
//! and numerical precondition failures at the boundary of each operation.
//! Router non-convergence is not an error; see `router::ConvergenceWarning`.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::trade::Direction;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, AmmError>;

/// Errors raised by the pool model and the router
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AmmError {
    /// Fee tiers are empty, unordered, or carry an out-of-range rate
    #[error("Invalid fee schedule: {reason}")]
    InvalidSchedule { reason: String },

    /// Trade amount is zero or negative
    #[error("Trade amount must be positive, got {amount}")]
    InvalidAmount { amount: Decimal },

    /// Reserves are negative at construction
    #[error("Pool {pool} has invalid reserves ({reserve_x}, {reserve_y})")]
    InvalidReserves {
        pool: String,
        reserve_x: Decimal,
        reserve_y: Decimal,
    },

    /// Trade would fully drain or invert the output reserve
    #[error("Insufficient liquidity in {pool}: requested {requested}, available {available}")]
    InsufficientLiquidity {
        pool: String,
        requested: Decimal,
        available: Decimal,
    },

    /// Trade is too small to move the output reserve at decimal precision
    #[error("Trade of {amount_in} into {pool} produces no output")]
    NegligibleOutput { pool: String, amount_in: Decimal },

    /// Guarded division with a zero denominator
    #[error("Division by zero: {context}")]
    DivisionByZero { context: &'static str },

    /// Decimal arithmetic exceeded the representable range
    #[error("Arithmetic overflow: {context}")]
    Overflow { context: &'static str },

    /// Router called with an empty pool set
    #[error("No pools supplied to the router")]
    NoPools,

    /// Every supplied pool lacks liquidity for the direction
    #[error("No pool has liquidity for {direction}")]
    NoLiquidity { direction: Direction },

    /// Same shared pool supplied twice to one locked route
    #[error("Pool {pool} appears more than once in the route")]
    DuplicatePool { pool: String },

    /// Split length or sum does not match the routed pools/total
    #[error("Split mismatch: expected {expected}, got {actual}")]
    SplitMismatch { expected: String, actual: String },
}

impl AmmError {
    pub(crate) fn schedule(reason: impl Into<String>) -> Self {
        Self::InvalidSchedule {
            reason: reason.into(),
        }
    }

    /// Liquidity errors are per-pool and recoverable by routing elsewhere
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientLiquidity { .. } | Self::NegligibleOutput { .. }
        )
    }
}
