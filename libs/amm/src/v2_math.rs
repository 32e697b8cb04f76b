//! Constant product (x*y=k) math with fee-on-input
//!
//! Preserves full precision using Decimal; every intermediate that can grow
//! (products of reserves) goes through checked arithmetic so extreme
//! reserve ratios surface as errors instead of panics.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{AmmError, Result};

/// Constant product math functions with zero floating point
pub struct V2Math;

impl V2Math {
    /// Output released when `net_in` (input already net of fees) reaches the pool
    ///
    /// `output = reserve_out - (reserve_in * reserve_out) / (reserve_in + net_in)`
    pub fn output_amount(
        net_in: Decimal,
        reserve_in: Decimal,
        reserve_out: Decimal,
    ) -> Result<Decimal> {
        if net_in < Decimal::ZERO {
            return Err(AmmError::InvalidAmount { amount: net_in });
        }
        if reserve_in <= Decimal::ZERO || reserve_out <= Decimal::ZERO {
            return Err(AmmError::DivisionByZero {
                context: "constant product output with empty reserve",
            });
        }

        let k = reserve_in
            .checked_mul(reserve_out)
            .ok_or(AmmError::Overflow {
                context: "reserve product",
            })?;
        let new_reserve_in = reserve_in
            .checked_add(net_in)
            .ok_or(AmmError::Overflow {
                context: "post-trade input reserve",
            })?;
        let new_reserve_out = k.checked_div(new_reserve_in).ok_or(AmmError::DivisionByZero {
            context: "post-trade input reserve",
        })?;

        Ok(reserve_out - new_reserve_out)
    }

    /// Marginal output per unit of gross input after `net_in` has been absorbed
    ///
    /// Derivative of `output_amount` with respect to the gross input:
    /// `k * (1 - fee_rate) / (reserve_in + net_in)^2`, evaluated as a product
    /// of two ratios so the squared reserve never materialises.
    pub fn marginal_output_rate(
        net_in: Decimal,
        fee_rate: Decimal,
        reserve_in: Decimal,
        reserve_out: Decimal,
    ) -> Result<Decimal> {
        if reserve_in <= Decimal::ZERO || reserve_out <= Decimal::ZERO {
            return Err(AmmError::DivisionByZero {
                context: "marginal rate with empty reserve",
            });
        }
        let depth = reserve_in
            .checked_add(net_in.max(Decimal::ZERO))
            .ok_or(AmmError::Overflow {
                context: "post-trade input reserve",
            })?;

        let out_ratio = reserve_out.checked_div(depth).ok_or(AmmError::Overflow {
            context: "marginal rate reserve ratio",
        })?;
        let in_ratio = reserve_in / depth;
        out_ratio
            .checked_mul(in_ratio)
            .and_then(|rate| rate.checked_mul(Decimal::ONE - fee_rate))
            .ok_or(AmmError::Overflow {
                context: "marginal output rate",
            })
    }

    /// Transfer from `worse` to `better` that equalises their marginal rates
    ///
    /// Each pool is treated as a flat-fee constant product curve at its
    /// current point, where `sqrt(rate) * depth` is constant along the curve.
    /// Solving `rate_b(+t) = rate_w(-t)` on those curves gives
    ///
    /// `t = (u_b - u_w) / (u_b * g_w / D_w + u_w * g_b / D_b)`
    ///
    /// with `u = sqrt(rate)`, `D` the post-trade input reserve and `g = 1 - fee`.
    /// Depths are normalised by the larger of the two so deep pools never
    /// square their reserves. Exact for flat fees; for tiered fees it uses the
    /// fee tier in force at the current allocation. Not clipped to the worse
    /// pool's amount.
    pub fn equalizing_transfer(better: &LocalCurve, worse: &LocalCurve) -> Result<Decimal> {
        let root_b = Self::decimal_sqrt(better.rate)?;
        let root_w = Self::decimal_sqrt(worse.rate)?;

        let scale = better.depth.max(worse.depth);
        let (Some(rel_b), Some(rel_w)) = (
            scale.checked_div(better.depth),
            scale.checked_div(worse.depth),
        ) else {
            return Err(AmmError::DivisionByZero {
                context: "equalizing transfer with empty depth",
            });
        };

        let denominator = root_b
            .checked_mul(worse.gamma)
            .and_then(|term| term.checked_mul(rel_w))
            .zip(
                root_w
                    .checked_mul(better.gamma)
                    .and_then(|term| term.checked_mul(rel_b)),
            )
            .and_then(|(left, right)| left.checked_add(right))
            .ok_or(AmmError::Overflow {
                context: "equalizing transfer denominator",
            })?;
        let numerator = (root_b - root_w)
            .checked_mul(scale)
            .ok_or(AmmError::Overflow {
                context: "equalizing transfer numerator",
            })?;

        numerator
            .checked_div(denominator)
            .ok_or(AmmError::DivisionByZero {
                context: "equalizing transfer with flat curves",
            })
    }

    /// Square root by Newton's method
    pub fn decimal_sqrt(value: Decimal) -> Result<Decimal> {
        if value < Decimal::ZERO {
            return Err(AmmError::InvalidAmount { amount: value });
        }
        if value.is_zero() {
            return Ok(Decimal::ZERO);
        }

        let epsilon = dec!(0.0000000000001);
        let mut x = if value > Decimal::ONE {
            value / Decimal::TWO
        } else {
            Decimal::ONE
        };
        for _ in 0..SQRT_MAX_ITERATIONS {
            let next_x = (x + value / x) / Decimal::TWO;
            if (next_x - x).abs() < epsilon {
                return Ok(next_x);
            }
            x = next_x;
        }

        // Best approximation if not fully converged
        Ok(x)
    }
}

const SQRT_MAX_ITERATIONS: usize = 100;

/// A pool's constant product curve seen from its current allocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalCurve {
    /// Marginal output per unit of gross input
    pub rate: Decimal,
    /// Input reserve after the current allocation's net input
    pub depth: Decimal,
    /// `1 - fee_rate` for the tier in force
    pub gamma: Decimal,
}

impl LocalCurve {
    pub fn new(
        net_in: Decimal,
        fee_rate: Decimal,
        reserve_in: Decimal,
        reserve_out: Decimal,
    ) -> Result<Self> {
        let rate = V2Math::marginal_output_rate(net_in, fee_rate, reserve_in, reserve_out)?;
        let depth = reserve_in
            .checked_add(net_in.max(Decimal::ZERO))
            .ok_or(AmmError::Overflow {
                context: "post-trade input reserve",
            })?;
        Ok(Self {
            rate,
            depth,
            gamma: Decimal::ONE - fee_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_v2_output_calculation() {
        // 99.7 net in against 1000:1000 → 1000 - 1000000/1099.7
        let output = V2Math::output_amount(dec!(99.7), dec!(1000), dec!(1000)).unwrap();

        assert!((output - dec!(90.661089388)).abs() < dec!(0.000001));
    }

    #[test]
    fn test_output_preserves_product() {
        let (reserve_in, reserve_out) = (dec!(5000), dec!(20000));
        let net_in = dec!(123.456);
        let output = V2Math::output_amount(net_in, reserve_in, reserve_out).unwrap();

        let k_before = reserve_in * reserve_out;
        let k_after = (reserve_in + net_in) * (reserve_out - output);
        assert!(((k_after - k_before) / k_before).abs() < dec!(0.000000001));
    }

    #[test]
    fn test_zero_input_and_empty_reserves() {
        assert_eq!(
            V2Math::output_amount(dec!(0), dec!(10), dec!(10)).unwrap(),
            dec!(0)
        );
        assert!(matches!(
            V2Math::output_amount(dec!(1), dec!(0), dec!(10)),
            Err(AmmError::DivisionByZero { .. })
        ));
        assert!(matches!(
            V2Math::output_amount(dec!(-1), dec!(10), dec!(10)),
            Err(AmmError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn test_marginal_rate_matches_spot_at_zero() {
        // At zero input the marginal rate is spot * (1 - fee)
        let rate = V2Math::marginal_output_rate(dec!(0), dec!(0.003), dec!(1000), dec!(2000)).unwrap();
        assert_eq!(rate, dec!(1.994));
    }

    #[test]
    fn test_marginal_rate_close_to_finite_difference() {
        let (reserve_in, reserve_out, fee) = (dec!(1000), dec!(1000), dec!(0.003));
        let gross = dec!(50);
        let net = gross * (Decimal::ONE - fee);
        let step = dec!(0.0001);

        let out_a = V2Math::output_amount(net, reserve_in, reserve_out).unwrap();
        let out_b =
            V2Math::output_amount(net + step * (Decimal::ONE - fee), reserve_in, reserve_out)
                .unwrap();
        let numeric = (out_b - out_a) / step;
        let analytic = V2Math::marginal_output_rate(net, fee, reserve_in, reserve_out).unwrap();

        assert!((numeric - analytic).abs() < dec!(0.000001));
    }

    #[test]
    fn test_decimal_sqrt() {
        assert_eq!(V2Math::decimal_sqrt(dec!(0)).unwrap(), dec!(0));
        let close = |value: Decimal, expected: Decimal| {
            (V2Math::decimal_sqrt(value).unwrap() - expected).abs() < dec!(0.0000001)
        };
        assert!(close(dec!(2), dec!(1.41421356237)));
        assert!(close(dec!(0.25), dec!(0.5)));
        assert!(close(dec!(1000000), dec!(1000)));
        assert!(V2Math::decimal_sqrt(dec!(-1)).is_err());
    }

    #[test]
    fn test_equalizing_transfer_balances_flat_pools() {
        // 30bps and 100bps pools, 50 each on 1000:1000
        let (cheap_fee, dear_fee) = (dec!(0.003), dec!(0.01));
        let curve = |gross: Decimal, fee: Decimal| {
            LocalCurve::new(gross * (Decimal::ONE - fee), fee, dec!(1000), dec!(1000)).unwrap()
        };
        let cheap = curve(dec!(50), cheap_fee);
        let dear = curve(dec!(50), dear_fee);
        assert!(cheap.rate > dear.rate);

        let transfer = V2Math::equalizing_transfer(&cheap, &dear).unwrap();
        assert!((transfer - dec!(1.68492)).abs() < dec!(0.0001));

        let after_cheap = curve(dec!(50) + transfer, cheap_fee);
        let after_dear = curve(dec!(50) - transfer, dear_fee);
        assert!((after_cheap.rate - after_dear.rate).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_equalizing_transfer_on_deep_pools() {
        // Depths whose product would not fit in a Decimal
        let (reserve_in, reserve_out) = (dec!(1_000_000_000_000_000_000), dec!(1_000_000_000));
        let curve = |fee: Decimal| LocalCurve::new(dec!(0), fee, reserve_in, reserve_out).unwrap();

        let transfer =
            V2Math::equalizing_transfer(&curve(dec!(0.003)), &curve(dec!(0.01))).unwrap();
        assert!(transfer > dec!(1_000_000_000_000_000));
    }

    #[test]
    fn test_marginal_rate_overflow_is_reported() {
        assert!(matches!(
            V2Math::marginal_output_rate(dec!(0), dec!(0), dec!(0.0000000001), Decimal::MAX),
            Err(AmmError::Overflow { .. })
        ));
    }

    #[test]
    fn test_overflow_is_reported() {
        let huge = Decimal::MAX / dec!(2);
        assert!(matches!(
            V2Math::output_amount(dec!(1), huge, huge),
            Err(AmmError::Overflow { .. })
        ));
    }
}
