//! Shared fixtures for pool and router tests
//!
//! Fee profiles and reserve balances used across the integration suites.

#![allow(dead_code)]

use splitroute_amm::{dec, Decimal, FeeSchedule, Pool, PoolState};
use splitroute_config::defaults::INVARIANT_TOLERANCE;

/// Named fee tier profiles
pub struct FeeProfiles;

impl FeeProfiles {
    /// 30 / 20 / 10 bps with breaks at 100 and 1000
    pub fn conservative() -> FeeSchedule {
        FeeSchedule::from_pairs(&[
            (dec!(0), dec!(0.003)),
            (dec!(100), dec!(0.002)),
            (dec!(1000), dec!(0.001)),
        ])
        .unwrap()
    }

    /// 50 / 30 / 10 bps with breaks at 50 and 500
    pub fn moderate() -> FeeSchedule {
        FeeSchedule::from_pairs(&[
            (dec!(0), dec!(0.005)),
            (dec!(50), dec!(0.003)),
            (dec!(500), dec!(0.001)),
        ])
        .unwrap()
    }

    /// 100 / 50 / 5 bps with breaks at 10 and 100
    pub fn aggressive() -> FeeSchedule {
        FeeSchedule::from_pairs(&[
            (dec!(0), dec!(0.01)),
            (dec!(10), dec!(0.005)),
            (dec!(100), dec!(0.0005)),
        ])
        .unwrap()
    }

    /// 1000 bps for the first unit, then almost free
    pub fn pathological() -> FeeSchedule {
        FeeSchedule::from_pairs(&[
            (dec!(0), dec!(0.1)),
            (dec!(1), dec!(0.0001)),
            (dec!(2), dec!(0.00001)),
        ])
        .unwrap()
    }

    pub fn flat_30bps() -> FeeSchedule {
        FeeSchedule::flat(dec!(0.003)).unwrap()
    }

    pub fn all() -> Vec<(&'static str, FeeSchedule)> {
        vec![
            ("conservative", Self::conservative()),
            ("moderate", Self::moderate()),
            ("aggressive", Self::aggressive()),
            ("pathological", Self::pathological()),
        ]
    }
}

/// Named `(reserve_x, reserve_y)` balances
pub struct Balances;

impl Balances {
    pub fn balanced() -> (Decimal, Decimal) {
        (dec!(10000), dec!(10000))
    }

    pub fn skewed_x() -> (Decimal, Decimal) {
        (dec!(20000), dec!(5000))
    }

    pub fn skewed_y() -> (Decimal, Decimal) {
        (dec!(5000), dec!(20000))
    }

    pub fn extreme() -> (Decimal, Decimal) {
        (dec!(1), dec!(1000000))
    }

    pub fn all() -> Vec<(&'static str, (Decimal, Decimal))> {
        vec![
            ("balanced", Self::balanced()),
            ("skewed_x", Self::skewed_x()),
            ("skewed_y", Self::skewed_y()),
            ("extreme", Self::extreme()),
        ]
    }
}

pub fn pool(name: &str, (reserve_x, reserve_y): (Decimal, Decimal), schedule: FeeSchedule) -> Pool {
    Pool::new(name, reserve_x, reserve_y, schedule).unwrap()
}

/// Same reserves and schedule, X and Y swapped
pub fn mirrored(pool: &Pool, schedule: FeeSchedule) -> Pool {
    Pool::new(
        format!("{}-mirror", splitroute_amm::PoolView::name(pool)),
        pool.reserve_y(),
        pool.reserve_x(),
        schedule,
    )
    .unwrap()
}

pub fn invariant_held(before: &PoolState, after: &PoolState) -> bool {
    let (k_before, k_after) = (before.k().unwrap(), after.k().unwrap());
    ((k_after - k_before) / k_before).abs() <= INVARIANT_TOLERANCE
}
