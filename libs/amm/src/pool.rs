//! Tiered-fee constant product pool
//!
//! Fees are taken from the trade input before it reaches the x*y=k formula
//! and are credited to a separate accumulated-fee bucket, never to the
//! reserves. The reserve product therefore stays constant (up to decimal
//! rounding, see `INVARIANT_TOLERANCE`) across every execution.

use rust_decimal::Decimal;
use tracing::debug;

use crate::error::{AmmError, Result};
use crate::fee_schedule::FeeSchedule;
use crate::pool_traits::{PoolHandle, PoolView};
use crate::trade::{Direction, PoolState, SwapQuote, TradeRecord};

/// Constant product pool with one fee schedule per trade direction
#[derive(Debug, Clone)]
pub struct Pool {
    name: String,
    reserve_x: Decimal,
    reserve_y: Decimal,
    accumulated_fees_x: Decimal,
    accumulated_fees_y: Decimal,
    /// Applied to Y input when the trader buys X
    buy_schedule: FeeSchedule,
    /// Applied to X input when the trader sells X
    sell_schedule: FeeSchedule,
}

impl Pool {
    /// Pool charging the same schedule in both directions
    pub fn new(
        name: impl Into<String>,
        reserve_x: Decimal,
        reserve_y: Decimal,
        schedule: FeeSchedule,
    ) -> Result<Self> {
        Self::with_schedules(name, reserve_x, reserve_y, schedule.clone(), schedule)
    }

    /// Pool with distinct buy-side and sell-side schedules
    pub fn with_schedules(
        name: impl Into<String>,
        reserve_x: Decimal,
        reserve_y: Decimal,
        buy_schedule: FeeSchedule,
        sell_schedule: FeeSchedule,
    ) -> Result<Self> {
        let name = name.into();
        if reserve_x < Decimal::ZERO || reserve_y < Decimal::ZERO {
            return Err(AmmError::InvalidReserves {
                pool: name,
                reserve_x,
                reserve_y,
            });
        }

        if reserve_x.checked_mul(reserve_y).is_none() {
            return Err(AmmError::Overflow {
                context: "reserve product at construction",
            });
        }

        Ok(Self {
            name,
            reserve_x,
            reserve_y,
            accumulated_fees_x: Decimal::ZERO,
            accumulated_fees_y: Decimal::ZERO,
            buy_schedule,
            sell_schedule,
        })
    }

    pub fn reserve_x(&self) -> Decimal {
        self.reserve_x
    }

    pub fn reserve_y(&self) -> Decimal {
        self.reserve_y
    }

    /// Constant product of the reserves
    pub fn k(&self) -> Result<Decimal> {
        self.state().k()
    }

    /// Instantaneous price of X in units of Y
    pub fn spot_price(&self) -> Result<Decimal> {
        self.reserve_y
            .checked_div(self.reserve_x)
            .ok_or(AmmError::DivisionByZero {
                context: "spot price with empty X reserve",
            })
    }

    /// Quote paying `input_y` for X: returns output X and the fee in Y
    pub fn quote_buy_x(&self, input_y: Decimal) -> Result<SwapQuote> {
        self.quote(Direction::BuyX, input_y)
    }

    /// Quote selling `input_x` for Y: returns output Y and the fee in X
    pub fn quote_sell_x(&self, input_x: Decimal) -> Result<SwapQuote> {
        self.quote(Direction::SellX, input_x)
    }

    /// Pay `input_y` for X, moving the fee into the Y bucket
    ///
    /// A zero or negative `input_y` fails with `InvalidAmount`;
    /// `InsufficientLiquidity` is reserved for trades the reserves cannot
    /// absorb. State is untouched on error.
    pub fn execute_buy_x(&mut self, input_y: Decimal, timestamp: u64) -> Result<TradeRecord> {
        self.execute(Direction::BuyX, input_y, timestamp)
    }

    /// Sell `input_x` for Y, moving the fee into the X bucket
    ///
    /// Fails with `InvalidAmount` for a zero or negative `input_x`.
    pub fn execute_sell_x(&mut self, input_x: Decimal, timestamp: u64) -> Result<TradeRecord> {
        self.execute(Direction::SellX, input_x, timestamp)
    }

    /// Price of X in Y at the margin after absorbing `hypothetical_input`
    ///
    /// Derived analytically from the constant product curve: for buys this is
    /// the Y cost of the next unit of X, for sells the Y proceeds of the next
    /// unit of X sold. At zero input it equals the spot price adjusted by the
    /// first tier's fee.
    pub fn marginal_price_after(
        &self,
        direction: Direction,
        hypothetical_input: Decimal,
    ) -> Result<Decimal> {
        let rate = self.marginal_rate_after(direction, hypothetical_input)?;
        match direction {
            Direction::BuyX => Decimal::ONE
                .checked_div(rate)
                .ok_or(AmmError::DivisionByZero {
                    context: "marginal price with zero output rate",
                }),
            Direction::SellX => Ok(rate),
        }
    }
}

impl PoolView for Pool {
    fn name(&self) -> &str {
        &self.name
    }

    fn state(&self) -> PoolState {
        PoolState {
            reserve_x: self.reserve_x,
            reserve_y: self.reserve_y,
            accumulated_fees_x: self.accumulated_fees_x,
            accumulated_fees_y: self.accumulated_fees_y,
        }
    }

    fn fee_schedule(&self, direction: Direction) -> &FeeSchedule {
        match direction {
            Direction::BuyX => &self.buy_schedule,
            Direction::SellX => &self.sell_schedule,
        }
    }
}

impl PoolHandle for Pool {
    fn execute(
        &mut self,
        direction: Direction,
        amount_in: Decimal,
        timestamp: u64,
    ) -> Result<TradeRecord> {
        let SwapQuote {
            amount_in,
            fee,
            net_in,
            amount_out,
        } = self.quote(direction, amount_in)?;

        // Fees go to a separate bucket, not into liquidity
        match direction {
            Direction::BuyX => {
                self.reserve_y += net_in;
                self.reserve_x -= amount_out;
                self.accumulated_fees_y += fee;
            }
            Direction::SellX => {
                self.reserve_x += net_in;
                self.reserve_y -= amount_out;
                self.accumulated_fees_x += fee;
            }
        }

        let price = self.spot_price()?;
        debug!(
            pool = %self.name,
            %direction,
            %amount_in,
            %fee,
            %amount_out,
            %price,
            "Executed trade"
        );

        Ok(TradeRecord {
            pool: self.name.clone(),
            direction,
            amount_in,
            fee,
            amount_out,
            price,
            timestamp,
            reserve_x: self.reserve_x,
            reserve_y: self.reserve_y,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use splitroute_config::defaults::INVARIANT_TOLERANCE;

    fn flat_pool(name: &str, x: Decimal, y: Decimal, fee: Decimal) -> Pool {
        Pool::new(name, x, y, FeeSchedule::flat(fee).unwrap()).unwrap()
    }

    fn within_invariant(before: Decimal, after: Decimal) -> bool {
        ((after - before) / before).abs() <= INVARIANT_TOLERANCE
    }

    #[test]
    fn test_quote_buy_x_flat_fee() {
        let pool = flat_pool("a", dec!(1000), dec!(1000), dec!(0.003));
        let quote = pool.quote_buy_x(dec!(50)).unwrap();

        assert_eq!(quote.fee, dec!(0.15));
        assert_eq!(quote.net_in, dec!(49.85));
        // 1000 - 1000000 / 1049.85
        assert!((quote.amount_out - dec!(47.482973758)).abs() < dec!(0.000001));
        // Quoting never mutates
        assert_eq!(pool.state().reserve_x, dec!(1000));
    }

    #[test]
    fn test_execute_buy_and_sell_preserve_k() {
        let mut pool = flat_pool("a", dec!(1000), dec!(1000), dec!(0.003));
        let k = pool.k().unwrap();

        let buy = pool.execute_buy_x(dec!(50), 1).unwrap();
        assert!(within_invariant(k, pool.k().unwrap()));
        assert_eq!(pool.state().accumulated_fees_y, dec!(0.15));
        assert_eq!(buy.reserve_x, pool.reserve_x());
        assert_eq!(buy.timestamp, 1);

        let sell = pool.execute_sell_x(dec!(20), 2).unwrap();
        assert!(within_invariant(k, pool.k().unwrap()));
        assert_eq!(pool.state().accumulated_fees_x, dec!(0.06));
        assert_eq!(sell.direction, Direction::SellX);
        assert!(sell.implied_price() > dec!(0));
    }

    #[test]
    fn test_tiered_execution_charges_blended_fee() {
        let schedule =
            FeeSchedule::from_pairs(&[(dec!(0), dec!(0.003)), (dec!(100), dec!(0.002))]).unwrap();
        let mut pool = Pool::new("tiered", dec!(10000), dec!(10000), schedule).unwrap();

        let record = pool.execute_buy_x(dec!(150), 0).unwrap();
        assert_eq!(record.fee, dec!(0.4));
        assert_eq!(pool.state().accumulated_fees_y, dec!(0.4));
        assert_eq!(pool.reserve_y(), dec!(10149.6));
    }

    #[test]
    fn test_buy_moves_price_up_and_sell_moves_it_down() {
        let mut pool = flat_pool("a", dec!(1000), dec!(2000), dec!(0.001));
        let before = pool.spot_price().unwrap();
        assert_eq!(before, dec!(2));

        let record = pool.execute_buy_x(dec!(100), 0).unwrap();
        assert!(record.price > before);
        assert!(record.implied_price() > before);

        let after_buy = pool.spot_price().unwrap();
        pool.execute_sell_x(dec!(10), 1).unwrap();
        assert!(pool.spot_price().unwrap() < after_buy);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let mut pool = flat_pool("a", dec!(1000), dec!(1000), dec!(0.003));
        assert!(matches!(
            pool.execute_buy_x(dec!(0), 0),
            Err(AmmError::InvalidAmount { .. })
        ));
        assert!(matches!(
            pool.execute_sell_x(dec!(-3), 0),
            Err(AmmError::InvalidAmount { .. })
        ));
        // Failed executions leave state untouched
        assert_eq!(pool.state().accumulated_fees_y, dec!(0));
        assert_eq!(pool.k().unwrap(), dec!(1000000));

        assert!(matches!(
            Pool::new("bad", dec!(-1), dec!(10), FeeSchedule::flat(dec!(0)).unwrap()),
            Err(AmmError::InvalidReserves { .. })
        ));
    }

    #[test]
    fn test_unrepresentable_reserve_product_rejected() {
        let huge = dec!(100_000_000_000_000_000);
        assert!(matches!(
            Pool::new("huge", huge, huge, FeeSchedule::flat(dec!(0)).unwrap()),
            Err(AmmError::Overflow { .. })
        ));

        let deep = Pool::new(
            "deep",
            dec!(1_000_000_000),
            dec!(1_000_000_000_000_000_000),
            FeeSchedule::flat(dec!(0.003)).unwrap(),
        )
        .unwrap();
        assert_eq!(deep.k().unwrap(), dec!(1_000_000_000_000_000_000_000_000_000));
    }

    #[test]
    fn test_empty_pool_guards() {
        let mut empty = flat_pool("empty", dec!(0), dec!(1000), dec!(0.003));
        assert!(matches!(
            empty.spot_price(),
            Err(AmmError::DivisionByZero { .. })
        ));
        assert!(!empty.has_liquidity(Direction::BuyX));
        assert!(matches!(
            empty.execute_buy_x(dec!(10), 0),
            Err(AmmError::InsufficientLiquidity { .. })
        ));
    }

    #[test]
    fn test_output_never_drains_reserve() {
        let mut pool = flat_pool("shallow", dec!(1), dec!(1), dec!(0.003));
        let record = pool.execute_buy_x(dec!(1000000), 0).unwrap();
        assert!(record.amount_out < dec!(1));
        assert!(pool.reserve_x() > dec!(0));
    }

    #[test]
    fn test_marginal_price_after() {
        let pool = flat_pool("a", dec!(1000), dec!(1000), dec!(0.003));

        // At zero input: buy side pays spot / (1 - fee), sell side receives spot * (1 - fee)
        let buy = pool.marginal_price_after(Direction::BuyX, dec!(0)).unwrap();
        assert!((buy - dec!(1) / dec!(0.997)).abs() < dec!(0.0000001));
        let sell = pool.marginal_price_after(Direction::SellX, dec!(0)).unwrap();
        assert_eq!(sell, dec!(0.997));

        // Larger hypothetical buys cost more at the margin
        let deeper = pool.marginal_price_after(Direction::BuyX, dec!(100)).unwrap();
        assert!(deeper > buy);
        assert!(pool.marginal_price_after(Direction::BuyX, dec!(-1)).is_err());
    }

    #[test]
    fn test_asymmetric_schedules() {
        let pool = Pool::with_schedules(
            "asym",
            dec!(1000),
            dec!(1000),
            FeeSchedule::flat(dec!(0.01)).unwrap(),
            FeeSchedule::flat(dec!(0.001)).unwrap(),
        )
        .unwrap();

        assert_eq!(pool.quote_buy_x(dec!(10)).unwrap().fee, dec!(0.1));
        assert_eq!(pool.quote_sell_x(dec!(10)).unwrap().fee, dec!(0.01));
    }
}
