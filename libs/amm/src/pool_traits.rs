//! Capability split between read-only pool views and exclusive pool handles
//!
//! The router only ever needs [`PoolView`]; committing a split needs
//! [`PoolHandle`], which requires `&mut` access (or a write lock for shared
//! pools, see [`crate::shared::SharedPool`]).

use rust_decimal::Decimal;

use crate::error::{AmmError, Result};
use crate::fee_schedule::FeeSchedule;
use crate::trade::{Direction, PoolState, SwapQuote, TradeRecord};
use crate::v2_math::V2Math;

/// Read-only pool interface used during route search
pub trait PoolView {
    /// Diagnostic label
    fn name(&self) -> &str;

    /// Current reserves and accumulated fees
    fn state(&self) -> PoolState;

    /// Schedule applied to the input of trades in `direction`
    fn fee_schedule(&self, direction: Direction) -> &FeeSchedule;

    /// `(reserve_in, reserve_out)` for a trade in `direction`
    fn reserves_for(&self, direction: Direction) -> (Decimal, Decimal) {
        let state = self.state();
        match direction {
            Direction::BuyX => (state.reserve_y, state.reserve_x),
            Direction::SellX => (state.reserve_x, state.reserve_y),
        }
    }

    /// Whether the pool can absorb any trade in `direction`
    fn has_liquidity(&self, direction: Direction) -> bool {
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        reserve_in > Decimal::ZERO && reserve_out > Decimal::ZERO
    }

    /// Quote a trade of gross input `amount_in` without touching state
    fn quote(&self, direction: Direction, amount_in: Decimal) -> Result<SwapQuote> {
        if amount_in <= Decimal::ZERO {
            return Err(AmmError::InvalidAmount { amount: amount_in });
        }

        let (reserve_in, reserve_out) = self.reserves_for(direction);
        if !self.has_liquidity(direction) {
            return Err(AmmError::InsufficientLiquidity {
                pool: self.name().to_string(),
                requested: amount_in,
                available: reserve_out,
            });
        }

        let fee = self.fee_schedule(direction).blended_fee(amount_in);
        let net_in = amount_in - fee;
        let amount_out = V2Math::output_amount(net_in, reserve_in, reserve_out)?;

        if amount_out >= reserve_out {
            return Err(AmmError::InsufficientLiquidity {
                pool: self.name().to_string(),
                requested: amount_out,
                available: reserve_out,
            });
        }
        if amount_out <= Decimal::ZERO {
            return Err(AmmError::NegligibleOutput {
                pool: self.name().to_string(),
                amount_in,
            });
        }

        Ok(SwapQuote {
            amount_in,
            fee,
            net_in,
            amount_out,
        })
    }

    /// Marginal output per unit of input once `amount_in` has been absorbed
    ///
    /// Uses the fee rate of the tier the next input unit falls in.
    fn marginal_rate_after(&self, direction: Direction, amount_in: Decimal) -> Result<Decimal> {
        if amount_in < Decimal::ZERO {
            return Err(AmmError::InvalidAmount { amount: amount_in });
        }
        let (reserve_in, reserve_out) = self.reserves_for(direction);
        let schedule = self.fee_schedule(direction);
        let net_in = amount_in - schedule.blended_fee(amount_in);
        V2Math::marginal_output_rate(
            net_in,
            schedule.marginal_rate(amount_in),
            reserve_in,
            reserve_out,
        )
    }
}

/// Exclusive pool interface used to commit trades
pub trait PoolHandle: PoolView {
    /// Execute a trade, updating reserves and accumulated fees together
    fn execute(
        &mut self,
        direction: Direction,
        amount_in: Decimal,
        timestamp: u64,
    ) -> Result<TradeRecord>;
}

impl<T: PoolView + ?Sized> PoolView for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn state(&self) -> PoolState {
        (**self).state()
    }

    fn fee_schedule(&self, direction: Direction) -> &FeeSchedule {
        (**self).fee_schedule(direction)
    }
}

impl<T: PoolView + ?Sized> PoolView for &mut T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn state(&self) -> PoolState {
        (**self).state()
    }

    fn fee_schedule(&self, direction: Direction) -> &FeeSchedule {
        (**self).fee_schedule(direction)
    }
}

impl<T: PoolHandle + ?Sized> PoolHandle for &mut T {
    fn execute(
        &mut self,
        direction: Direction,
        amount_in: Decimal,
        timestamp: u64,
    ) -> Result<TradeRecord> {
        (**self).execute(direction, amount_in, timestamp)
    }
}
