//! Global emission schedule: geometric halving on wall-clock time with a tail floor.

use crate::domain::{Amount, MathError, Timestamp};
use crate::engine::constants::{HALVING_PERIOD, INITIAL_UPS, TAIL_UPS};
use serde::Serialize;

/// Time-based halving schedule, fixed at deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EmissionSchedule {
    pub deploy_time: Timestamp,
    pub halving_period: u64,
    pub initial_ups: Amount,
    pub tail_ups: Amount,
}

impl EmissionSchedule {
    /// Schedule with the protocol constants, starting at `deploy_time`.
    pub fn new(deploy_time: Timestamp) -> Self {
        Self {
            deploy_time,
            halving_period: HALVING_PERIOD,
            initial_ups: INITIAL_UPS,
            tail_ups: TAIL_UPS,
        }
    }

    /// Completed halvings at `now`. Times before deployment count as zero.
    pub fn halvings(&self, now: Timestamp) -> u64 {
        if self.halving_period == 0 {
            return 0;
        }
        now.since(self.deploy_time) / self.halving_period
    }

    /// Global units-per-second at `now`: `initial >> halvings`, floored at the tail rate.
    pub fn global_ups(&self, now: Timestamp) -> Amount {
        let shifted = self.initial_ups.shr(self.halvings(now));
        if shifted < self.tail_ups {
            self.tail_ups
        } else {
            shifted
        }
    }

    /// Per-slot rate locked at acquisition: global rate split over current capacity.
    pub fn slot_ups(&self, now: Timestamp, capacity: u32) -> Result<Amount, MathError> {
        self.global_ups(now)
            .checked_div(Amount::from(u64::from(capacity)))
    }
}

/// Reward earned over a completed hold: `duration * ups * multiplier / PRECISION`.
pub fn accrued(duration: u64, ups: Amount, multiplier: Amount) -> Result<Amount, MathError> {
    Amount::from(duration)
        .checked_mul(ups)?
        .mul_div(multiplier, Amount::PRECISION)
}
