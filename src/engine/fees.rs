//! Splitting a takeover payment between treasury, team, faction and previous holder.

use crate::domain::{Address, Amount, FeeRecipient, MathError};
use crate::engine::constants::{FACTION_FEE, FEE_DIVISOR, TEAM_FEE, TOTAL_FEE};

/// Fee rates over a common divisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeRates {
    pub total: u64,
    pub team: u64,
    pub faction: u64,
    pub divisor: u64,
}

impl Default for FeeRates {
    fn default() -> Self {
        Self {
            total: TOTAL_FEE,
            team: TEAM_FEE,
            faction: FACTION_FEE,
            divisor: FEE_DIVISOR,
        }
    }
}

/// Shares of one payment. Always sums to the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FeeSplit {
    pub treasury: Amount,
    pub team: Amount,
    pub faction: Amount,
    pub holder: Amount,
}

impl FeeSplit {
    /// Split `price`. A disabled team or faction share is absorbed by the treasury.
    pub fn compute(
        price: Amount,
        team: Option<Address>,
        faction: Option<Address>,
        rates: &FeeRates,
    ) -> Result<Self, MathError> {
        let divisor = Amount::from(rates.divisor);

        let team_fee = match team {
            Some(_) => price.mul_div(Amount::from(rates.team), divisor)?,
            None => Amount::ZERO,
        };
        let faction_fee = match faction {
            Some(_) => price.mul_div(Amount::from(rates.faction), divisor)?,
            None => Amount::ZERO,
        };
        let treasury_fee = price
            .mul_div(Amount::from(rates.total), divisor)?
            .checked_sub(team_fee)?
            .checked_sub(faction_fee)?;
        let holder_fee = price
            .checked_sub(treasury_fee)?
            .checked_sub(team_fee)?
            .checked_sub(faction_fee)?;

        Ok(Self {
            treasury: treasury_fee,
            team: team_fee,
            faction: faction_fee,
            holder: holder_fee,
        })
    }

    pub fn total(&self) -> Result<Amount, MathError> {
        self.treasury
            .checked_add(self.team)?
            .checked_add(self.faction)?
            .checked_add(self.holder)
    }

    /// Transfers in payout order (treasury, team, faction, holder), skipping zero shares.
    pub fn transfers(
        &self,
        treasury: Address,
        team: Option<Address>,
        faction: Option<Address>,
        holder: Address,
    ) -> Vec<(FeeRecipient, Address, Amount)> {
        let mut out = Vec::with_capacity(4);
        let mut push = |kind, to: Option<Address>, amount: Amount| {
            if let Some(to) = to {
                if !amount.is_zero() {
                    out.push((kind, to, amount));
                }
            }
        };
        push(FeeRecipient::Treasury, Some(treasury), self.treasury);
        push(FeeRecipient::Team, team, self.team);
        push(FeeRecipient::Faction, faction, self.faction);
        push(FeeRecipient::Holder, holder.non_zero(), self.holder);
        out
    }
}
