//! Trade direction, quotes and execution records

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{AmmError, Result};

/// Side of a trade from the trader's perspective
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Trader pays Y and receives X; fees are charged in Y
    BuyX,
    /// Trader pays X and receives Y; fees are charged in X
    SellX,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::BuyX => Direction::SellX,
            Direction::SellX => Direction::BuyX,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::BuyX => f.write_str("buy X with Y"),
            Direction::SellX => f.write_str("sell X for Y"),
        }
    }
}

/// Hypothetical outcome of a trade against the current pool state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapQuote {
    /// Gross input paid by the trader
    pub amount_in: Decimal,
    /// Blended tier fee taken from the input
    pub fee: Decimal,
    /// Input that reaches the reserves (`amount_in - fee`)
    pub net_in: Decimal,
    /// Output the trader receives
    pub amount_out: Decimal,
}

/// Public, side-effect free view of a pool's balances
///
/// This is the stable surface snapshot and PnL tooling reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolState {
    pub reserve_x: Decimal,
    pub reserve_y: Decimal,
    pub accumulated_fees_x: Decimal,
    pub accumulated_fees_y: Decimal,
}

impl PoolState {
    /// Constant product of the reserves
    pub fn k(&self) -> Result<Decimal> {
        self.reserve_x
            .checked_mul(self.reserve_y)
            .ok_or(AmmError::Overflow {
                context: "reserve product",
            })
    }
}

/// Record of an executed trade
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub pool: String,
    pub direction: Direction,
    pub amount_in: Decimal,
    pub fee: Decimal,
    pub amount_out: Decimal,
    /// Spot price (Y per X) after the trade
    pub price: Decimal,
    pub timestamp: u64,
    /// Post-trade reserves
    pub reserve_x: Decimal,
    pub reserve_y: Decimal,
}

impl TradeRecord {
    /// Average execution price of this trade in Y per X, fees included
    pub fn implied_price(&self) -> Decimal {
        let (amount_x, amount_y) = match self.direction {
            Direction::BuyX => (self.amount_out, self.amount_in),
            Direction::SellX => (self.amount_in, self.amount_out),
        };
        amount_y.checked_div(amount_x).unwrap_or(Decimal::ZERO)
    }
}
