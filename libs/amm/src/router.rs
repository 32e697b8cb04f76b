//! Multi-pool trade router
//!
//! Splits one trade across N constant product pools so that the marginal
//! output rate (output per unit of input at the margin) is roughly equal in
//! every pool that receives volume. The search is a bounded fixed-point
//! iteration:
//!
//! 1. Start from a split proportional to each pool's reserve of the input asset.
//! 2. Sweep over every unordered pool pair, moving volume from the pool with
//!    the lower marginal rate to the one with the higher rate.
//! 3. Stop once the widest marginal gap is inside `price_tolerance`, or once
//!    no pool's amount moved by more than `amount_tolerance` of the total.
//! 4. After `max_sweeps` return the best split seen with a
//!    [`ConvergenceWarning`] instead of failing.
//!
//! ## Transfer rule
//!
//! For a pair with marginal rates `m_b > m_w`, the router moves the amount
//! `t` from the worse pool to the better one that makes both rates equal on
//! their constant product curves (see [`V2Math::equalizing_transfer`]),
//! clipped to `[0, amount_w]`. The step grows with the rate gap and with the
//! liquidity depth of both pools. With flat fees one pair step lands exactly
//! on equal rates; with tiers, crossing a threshold changes the fee and the
//! next sweep corrects for it.
//!
//! Buys and sells run the identical code; the direction only selects which
//! reserve is the input side and which fee schedule applies.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use splitroute_config::{defaults, RouterSettings};
use std::fmt;
use tracing::{debug, trace, warn};

use crate::error::{AmmError, Result};
use crate::pool_traits::{PoolHandle, PoolView};
use crate::trade::{Direction, TradeRecord};
use crate::v2_math::{LocalCurve, V2Math};

/// Router convergence parameters
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// Sweep cap
    pub max_sweeps: usize,
    /// Relative marginal-rate gap considered converged
    pub price_tolerance: Decimal,
    /// Largest per-pool move between sweeps, relative to the total, considered stable
    pub amount_tolerance: Decimal,
    /// Legs below this amount are skipped on execution
    pub min_routed_amount: Decimal,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_sweeps: defaults::MAX_SWEEPS,
            price_tolerance: defaults::PRICE_TOLERANCE,
            amount_tolerance: defaults::AMOUNT_TOLERANCE,
            min_routed_amount: defaults::MIN_ROUTED_AMOUNT,
        }
    }
}

impl From<&RouterSettings> for RouterConfig {
    fn from(settings: &RouterSettings) -> Self {
        Self {
            max_sweeps: settings.max_sweeps,
            price_tolerance: settings.price_tolerance,
            amount_tolerance: settings.amount_tolerance,
            min_routed_amount: settings.min_routed_amount,
        }
    }
}

/// How a route search terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Only one pool could take the trade; no sweeps were run
    SinglePool,
    /// Widest marginal gap fell inside the price tolerance
    PriceGapClosed,
    /// Amounts stopped moving between sweeps
    SplitStable,
    /// Sweep cap reached; best split seen was returned
    CapExhausted,
    /// Search finished but some legs could not be filled and their volume
    /// was moved to the other legs afterwards
    Rerouted,
}

impl SearchOutcome {
    pub fn is_converged(self) -> bool {
        !matches!(self, SearchOutcome::CapExhausted | SearchOutcome::Rerouted)
    }
}

/// Non-fatal signal that the sweep cap was reached before convergence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceWarning {
    pub sweeps: usize,
    /// Widest marginal gap of the returned split
    pub best_gap: Decimal,
    pub tolerance: Decimal,
}

impl fmt::Display for ConvergenceWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "router did not converge after {} sweeps: best gap {} > tolerance {}",
            self.sweeps, self.best_gap, self.tolerance
        )
    }
}

/// Amounts to route to each pool, in input order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSplit {
    pub direction: Direction,
    pub total: Decimal,
    pub amounts: Vec<Decimal>,
    /// Pairwise sweeps performed
    pub sweeps: usize,
    /// Widest relative marginal gap among pools receiving volume
    pub max_price_gap: Decimal,
    pub outcome: SearchOutcome,
    pub warning: Option<ConvergenceWarning>,
    /// Pools whose leg could not be filled, in the order they were emptied
    #[serde(default)]
    pub rerouted: Vec<usize>,
}

impl RouteSplit {
    pub fn sum(&self) -> Decimal {
        self.amounts.iter().copied().sum()
    }

    /// Share of the total routed to each pool
    pub fn proportions(&self) -> Vec<Decimal> {
        self.amounts
            .iter()
            .map(|amount| amount.checked_div(self.total).unwrap_or(Decimal::ZERO))
            .collect()
    }

    pub fn is_converged(&self) -> bool {
        self.outcome.is_converged()
    }
}

/// Explicit search state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchState {
    Searching { sweep: usize },
    Converged { outcome: SearchOutcome, sweeps: usize },
    CapExhausted { sweeps: usize },
}

/// Iterative pairwise-balancing router
#[derive(Debug, Clone, Default)]
pub struct Router {
    config: RouterConfig,
}

impl Router {
    pub fn new(config: RouterConfig) -> Self {
        Self { config }
    }

    pub fn from_settings(settings: &RouterSettings) -> Self {
        Self::new(RouterConfig::from(settings))
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Compute a split of `total` across `pools` without mutating them
    pub fn compute_split<P: PoolView>(
        &self,
        total: Decimal,
        direction: Direction,
        pools: &[P],
    ) -> Result<RouteSplit> {
        if total <= Decimal::ZERO {
            return Err(AmmError::InvalidAmount { amount: total });
        }
        if pools.is_empty() {
            return Err(AmmError::NoPools);
        }

        let eligible: Vec<usize> = pools
            .iter()
            .enumerate()
            .filter(|(_, pool)| pool.has_liquidity(direction))
            .map(|(index, _)| index)
            .collect();

        if eligible.is_empty() {
            return Err(AmmError::NoLiquidity { direction });
        }

        let mut search = Search {
            pools,
            direction,
            total,
            eligible,
            amounts: vec![Decimal::ZERO; pools.len()],
            config: &self.config,
        };

        let split = if search.eligible.len() == 1 {
            search.amounts[search.eligible[0]] = total;
            RouteSplit {
                direction,
                total,
                amounts: search.amounts.clone(),
                sweeps: 0,
                max_price_gap: Decimal::ZERO,
                outcome: SearchOutcome::SinglePool,
                warning: None,
                rerouted: Vec::new(),
            }
        } else {
            search.initialize()?;
            search.run()?
        };

        let split = search.reroute_unfillable(split)?;
        debug!(
            %direction,
            %total,
            sweeps = split.sweeps,
            gap = %split.max_price_gap,
            outcome = ?split.outcome,
            "Route computed"
        );
        Ok(split)
    }

    /// Commit a split: every leg is quoted first, then executed in pool order
    ///
    /// Legs at or below `min_routed_amount` are skipped; a split with no leg
    /// above it fails with `InvalidAmount`. No pool is mutated if any leg
    /// fails to quote.
    pub fn execute_split<H: PoolHandle>(
        &self,
        split: &RouteSplit,
        pools: &mut [H],
        timestamp: u64,
    ) -> Result<Vec<TradeRecord>> {
        if pools.len() != split.amounts.len() {
            return Err(AmmError::SplitMismatch {
                expected: format!("{} pools", split.amounts.len()),
                actual: format!("{} pools", pools.len()),
            });
        }

        let (legs, skipped): (Vec<(usize, Decimal)>, Vec<(usize, Decimal)>) = split
            .amounts
            .iter()
            .copied()
            .enumerate()
            .partition(|(_, amount)| *amount > self.config.min_routed_amount);

        let skipped: Vec<Decimal> = skipped
            .into_iter()
            .map(|(_, amount)| amount)
            .filter(|amount| !amount.is_zero())
            .collect();
        if !skipped.is_empty() {
            let skipped_volume: Decimal = skipped.iter().copied().sum();
            debug!(
                legs = skipped.len(),
                volume = %skipped_volume,
                minimum = %self.config.min_routed_amount,
                "Skipping legs below the routing minimum"
            );
        }
        if legs.is_empty() {
            return Err(AmmError::InvalidAmount {
                amount: split.total,
            });
        }

        for &(index, amount) in &legs {
            pools[index].quote(split.direction, amount)?;
        }

        let mut records = Vec::with_capacity(legs.len());
        for (index, amount) in legs {
            records.push(pools[index].execute(split.direction, amount, timestamp)?);
        }
        Ok(records)
    }

    /// Compute a split and commit it against the same pools
    pub fn route_and_execute<H: PoolHandle>(
        &self,
        total: Decimal,
        direction: Direction,
        pools: &mut [H],
        timestamp: u64,
    ) -> Result<(RouteSplit, Vec<TradeRecord>)> {
        let split = self.compute_split(total, direction, &*pools)?;
        let records = self.execute_split(&split, pools, timestamp)?;
        Ok((split, records))
    }
}

/// Working state of one route search
struct Search<'a, P> {
    pools: &'a [P],
    direction: Direction,
    total: Decimal,
    eligible: Vec<usize>,
    amounts: Vec<Decimal>,
    config: &'a RouterConfig,
}

impl<'a, P: PoolView> Search<'a, P> {
    /// Liquidity-weighted first guess: proportional to the input-side reserve
    fn initialize(&mut self) -> Result<()> {
        let weights: Vec<Decimal> = self
            .eligible
            .iter()
            .map(|&index| self.pools[index].reserves_for(self.direction).0)
            .collect();
        let weight_sum = weights
            .iter()
            .try_fold(Decimal::ZERO, |sum, weight| sum.checked_add(*weight))
            .ok_or(AmmError::Overflow {
                context: "sum of input reserves",
            })?;

        let mut assigned = Decimal::ZERO;
        let last = self.eligible.len() - 1;
        for (position, &index) in self.eligible.iter().enumerate() {
            let amount = if position == last {
                self.total - assigned
            } else {
                self.total * (weights[position] / weight_sum)
            };
            self.amounts[index] = amount;
            assigned += amount;
        }
        Ok(())
    }

    fn run(&mut self) -> Result<RouteSplit> {
        let mut best_amounts = self.amounts.clone();
        let mut best_gap = self.max_gap()?;
        let mut current_gap = best_gap;

        let mut state = SearchState::Searching { sweep: 0 };
        loop {
            state = match state {
                SearchState::Searching { sweep } if sweep >= self.config.max_sweeps => {
                    SearchState::CapExhausted { sweeps: sweep }
                }
                SearchState::Searching { sweep } => {
                    let before = self.amounts.clone();
                    self.sweep()?;

                    current_gap = self.max_gap()?;
                    if current_gap < best_gap {
                        best_gap = current_gap;
                        best_amounts.clone_from(&self.amounts);
                    }

                    let moved = before
                        .iter()
                        .zip(&self.amounts)
                        .map(|(old, new)| (*new - *old).abs())
                        .max()
                        .unwrap_or(Decimal::ZERO);

                    debug!(
                        sweep = sweep + 1,
                        gap = %current_gap,
                        %moved,
                        "Router sweep complete"
                    );

                    if current_gap <= self.config.price_tolerance {
                        SearchState::Converged {
                            outcome: SearchOutcome::PriceGapClosed,
                            sweeps: sweep + 1,
                        }
                    } else if moved <= self.config.amount_tolerance * self.total {
                        SearchState::Converged {
                            outcome: SearchOutcome::SplitStable,
                            sweeps: sweep + 1,
                        }
                    } else {
                        SearchState::Searching { sweep: sweep + 1 }
                    }
                }
                SearchState::Converged { outcome, sweeps } => {
                    return Ok(self.finish(self.amounts.clone(), current_gap, outcome, sweeps, None));
                }
                SearchState::CapExhausted { sweeps } => {
                    let warning = ConvergenceWarning {
                        sweeps,
                        best_gap,
                        tolerance: self.config.price_tolerance,
                    };
                    warn!(%warning, "Returning best-effort split");
                    return Ok(self.finish(
                        best_amounts,
                        best_gap,
                        SearchOutcome::CapExhausted,
                        sweeps,
                        Some(warning),
                    ));
                }
            };
        }
    }

    /// One pass of pairwise balancing over every unordered pair
    fn sweep(&mut self) -> Result<()> {
        for first in 0..self.eligible.len() {
            for second in first + 1..self.eligible.len() {
                self.balance_pair(self.eligible[first], self.eligible[second])?;
            }
        }
        Ok(())
    }

    fn balance_pair(&mut self, i: usize, j: usize) -> Result<()> {
        let rate_i = self.marginal_rate(i)?;
        let rate_j = self.marginal_rate(j)?;
        if relative_gap(rate_i, rate_j) <= self.config.price_tolerance {
            return Ok(());
        }

        let (better, worse) = if rate_i > rate_j { (i, j) } else { (j, i) };
        if self.amounts[worse].is_zero() {
            return Ok(());
        }

        let transfer =
            V2Math::equalizing_transfer(&self.local_curve(better)?, &self.local_curve(worse)?)?
                .max(Decimal::ZERO)
                .min(self.amounts[worse]);
        self.amounts[worse] -= transfer;
        self.amounts[better] += transfer;

        trace!(
            from = self.pools[worse].name(),
            to = self.pools[better].name(),
            %transfer,
            "Rebalanced pool pair"
        );
        Ok(())
    }

    fn marginal_rate(&self, index: usize) -> Result<Decimal> {
        self.pools[index].marginal_rate_after(self.direction, self.amounts[index])
    }

    fn local_curve(&self, index: usize) -> Result<LocalCurve> {
        let pool = &self.pools[index];
        let amount = self.amounts[index];
        let schedule = pool.fee_schedule(self.direction);
        let (reserve_in, reserve_out) = pool.reserves_for(self.direction);
        LocalCurve::new(
            amount - schedule.blended_fee(amount),
            schedule.marginal_rate(amount),
            reserve_in,
            reserve_out,
        )
    }

    fn max_gap(&self) -> Result<Decimal> {
        self.gap_of(&self.amounts)
    }

    /// Widest relative marginal gap among pools holding a positive amount
    fn gap_of(&self, amounts: &[Decimal]) -> Result<Decimal> {
        let mut lowest: Option<Decimal> = None;
        let mut highest: Option<Decimal> = None;
        for &index in &self.eligible {
            if amounts[index] <= Decimal::ZERO {
                continue;
            }
            let rate = self.pools[index].marginal_rate_after(self.direction, amounts[index])?;
            lowest = Some(lowest.map_or(rate, |low| low.min(rate)));
            highest = Some(highest.map_or(rate, |high| high.max(rate)));
        }

        Ok(match (lowest, highest) {
            (Some(low), Some(high)) => relative_gap(low, high),
            _ => Decimal::ZERO,
        })
    }

    fn finish(
        &self,
        mut amounts: Vec<Decimal>,
        gap: Decimal,
        outcome: SearchOutcome,
        sweeps: usize,
        warning: Option<ConvergenceWarning>,
    ) -> RouteSplit {
        absorb_residual(&mut amounts, self.total);
        RouteSplit {
            direction: self.direction,
            total: self.total,
            amounts,
            sweeps,
            max_price_gap: gap,
            outcome,
            warning,
            rerouted: Vec::new(),
        }
    }

    /// Move volume away from legs a pool cannot fill onto legs it can
    ///
    /// Every pass re-quotes the whole split, so the returned amounts have all
    /// been quoted successfully. A rerouted split reports the marginal gap of
    /// its final amounts and the [`SearchOutcome::Rerouted`] outcome.
    fn reroute_unfillable(&self, mut split: RouteSplit) -> Result<RouteSplit> {
        let mut last_error = None;
        for _ in 0..=self.eligible.len() {
            let (unfillable, error) = self.unfillable_legs(&split.amounts)?;
            let Some(err) = error else {
                if !split.rerouted.is_empty() {
                    split.max_price_gap = self.gap_of(&split.amounts)?;
                    split.outcome = SearchOutcome::Rerouted;
                }
                return Ok(split);
            };

            let receivers: Vec<usize> = self
                .eligible
                .iter()
                .copied()
                .filter(|index| !unfillable.contains(index) && split.amounts[*index] > Decimal::ZERO)
                .collect();
            if receivers.is_empty() {
                return Err(err);
            }

            let stranded: Decimal = unfillable.iter().map(|&index| split.amounts[index]).sum();
            let receiving: Decimal = receivers.iter().map(|&index| split.amounts[index]).sum();
            for &index in &unfillable {
                split.amounts[index] = Decimal::ZERO;
            }
            for &index in &receivers {
                let share = stranded * (split.amounts[index] / receiving);
                split.amounts[index] += share;
            }
            absorb_residual(&mut split.amounts, self.total);

            warn!(
                pools = ?unfillable.iter().map(|&index| self.pools[index].name()).collect::<Vec<_>>(),
                %stranded,
                "Re-routed volume away from pools that cannot fill their leg"
            );
            split.rerouted.extend(unfillable);
            last_error = Some(err);
        }
        Err(last_error.unwrap_or(AmmError::NoLiquidity {
            direction: self.direction,
        }))
    }

    /// Legs above the routing minimum whose pool rejects the quote
    fn unfillable_legs(&self, amounts: &[Decimal]) -> Result<(Vec<usize>, Option<AmmError>)> {
        let mut unfillable = Vec::new();
        let mut last_error = None;
        for (index, amount) in amounts.iter().enumerate() {
            if *amount <= self.config.min_routed_amount {
                continue;
            }
            match self.pools[index].quote(self.direction, *amount) {
                Ok(_) => {}
                Err(err) if err.is_recoverable() => {
                    unfillable.push(index);
                    last_error = Some(err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok((unfillable, last_error))
    }
}

/// `|a - b| / max(a, b)`, zero when both are zero
fn relative_gap(a: Decimal, b: Decimal) -> Decimal {
    let high = a.max(b);
    if high <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    (a - b).abs() / high
}

/// Put decimal rounding drift onto the largest leg so the split sums exactly
fn absorb_residual(amounts: &mut [Decimal], total: Decimal) {
    let residual = total - amounts.iter().copied().sum::<Decimal>();
    if residual.is_zero() {
        return;
    }
    if let Some(largest) = amounts.iter_mut().max_by(|a, b| (**a).cmp(&**b)) {
        *largest = (*largest + residual).max(Decimal::ZERO);
    }
}
