//! Tiered fee schedules
//!
//! A schedule is a list of `(threshold, rate)` tiers sorted by strictly
//! increasing threshold. A trade is cut into segments at the thresholds and
//! each segment pays its own tier's rate, so a trade that straddles a tier
//! boundary pays a blended fee rather than a single rate.
//!
//! Thresholds are inclusive lower bounds of the tier they introduce: with
//! tiers `[(0, 0.003), (100, 0.002)]` the first 100 units pay 30 bps and
//! every unit past 100 pays 20 bps. Amounts below the first threshold (when
//! it is not zero) pay the first tier's rate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AmmError, Result};

/// One bracket of a tiered fee schedule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeTier {
    /// Cumulative trade size at which this tier starts
    pub threshold: Decimal,
    /// Fee rate in `[0, 1)` (0.003 = 30 bps)
    pub rate: Decimal,
}

impl FeeTier {
    pub fn new(threshold: Decimal, rate: Decimal) -> Self {
        Self { threshold, rate }
    }
}

/// Immutable, validated tier list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<FeeTier>", into = "Vec<FeeTier>")]
pub struct FeeSchedule {
    tiers: Vec<FeeTier>,
}

impl FeeSchedule {
    /// Validate and build a schedule
    pub fn new(tiers: Vec<FeeTier>) -> Result<Self> {
        if tiers.is_empty() {
            return Err(AmmError::schedule("tier list is empty"));
        }

        for (index, tier) in tiers.iter().enumerate() {
            if tier.threshold < Decimal::ZERO {
                return Err(AmmError::schedule(format!(
                    "tier {} has negative threshold {}",
                    index, tier.threshold
                )));
            }
            if tier.rate < Decimal::ZERO || tier.rate >= Decimal::ONE {
                return Err(AmmError::schedule(format!(
                    "tier {} rate {} is outside [0, 1)",
                    index, tier.rate
                )));
            }
        }

        if let Some(pair) = tiers.windows(2).find(|w| w[1].threshold <= w[0].threshold) {
            return Err(AmmError::schedule(format!(
                "thresholds must be strictly increasing ({} then {})",
                pair[0].threshold, pair[1].threshold
            )));
        }

        Ok(Self { tiers })
    }

    /// Single-tier schedule charging `rate` on every unit
    pub fn flat(rate: Decimal) -> Result<Self> {
        Self::new(vec![FeeTier::new(Decimal::ZERO, rate)])
    }

    /// Build from `(threshold, rate)` pairs
    pub fn from_pairs(pairs: &[(Decimal, Decimal)]) -> Result<Self> {
        Self::new(
            pairs
                .iter()
                .map(|&(threshold, rate)| FeeTier::new(threshold, rate))
                .collect(),
        )
    }

    pub fn tiers(&self) -> &[FeeTier] {
        &self.tiers
    }

    /// Rate of the first tier
    pub fn base_rate(&self) -> Decimal {
        self.tiers[0].rate
    }

    pub fn is_flat(&self) -> bool {
        self.tiers.len() == 1
    }

    /// Total fee for a trade of `trade_size`, blended across tiers
    ///
    /// Always within `[0, trade_size]`; non-positive sizes pay nothing.
    pub fn blended_fee(&self, trade_size: Decimal) -> Decimal {
        if trade_size <= Decimal::ZERO {
            return Decimal::ZERO;
        }

        let mut fee = Decimal::ZERO;
        for (index, tier) in self.tiers.iter().enumerate() {
            let lower = if index == 0 {
                Decimal::ZERO
            } else {
                tier.threshold
            };
            let upper = self.tiers.get(index + 1).map(|next| next.threshold);

            let segment_end = match upper {
                Some(upper) => trade_size.min(upper),
                None => trade_size,
            };
            if segment_end > lower {
                fee += (segment_end - lower) * tier.rate;
            }

            match upper {
                Some(upper) if trade_size > upper => continue,
                _ => break,
            }
        }

        fee.min(trade_size)
    }

    /// Blended fee divided by size; the base rate for an empty trade
    pub fn effective_rate(&self, trade_size: Decimal) -> Decimal {
        if trade_size <= Decimal::ZERO {
            return self.base_rate();
        }
        self.blended_fee(trade_size) / trade_size
    }

    /// Rate charged on the next unit once `cumulative` has been traded
    pub fn marginal_rate(&self, cumulative: Decimal) -> Decimal {
        self.tiers
            .iter()
            .rev()
            .find(|tier| tier.threshold <= cumulative)
            .unwrap_or(&self.tiers[0])
            .rate
    }
}

impl TryFrom<Vec<FeeTier>> for FeeSchedule {
    type Error = AmmError;

    fn try_from(tiers: Vec<FeeTier>) -> Result<Self> {
        Self::new(tiers)
    }
}

impl From<FeeSchedule> for Vec<FeeTier> {
    fn from(schedule: FeeSchedule) -> Self {
        schedule.tiers
    }
}
