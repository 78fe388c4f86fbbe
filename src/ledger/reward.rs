//! Reward token: only the authorized minter may mint.

use super::{lock, LedgerError};
use crate::domain::{Address, Amount};
use std::collections::HashMap;
use std::sync::Mutex;

pub trait RewardToken: Send + Sync {
    /// The single address allowed to mint.
    fn minter(&self) -> Address;

    fn mint(&self, caller: Address, to: Address, amount: Amount) -> Result<(), LedgerError>;
}

#[derive(Debug, Default)]
struct Supply {
    balances: HashMap<Address, Amount>,
    total: Amount,
}

#[derive(Debug)]
pub struct InMemoryRewardToken {
    minter: Address,
    supply: Mutex<Supply>,
}

impl InMemoryRewardToken {
    pub fn new(minter: Address) -> Self {
        Self {
            minter,
            supply: Mutex::new(Supply::default()),
        }
    }

    pub fn balance_of(&self, owner: &Address) -> Amount {
        lock(&self.supply)
            .balances
            .get(owner)
            .copied()
            .unwrap_or_default()
    }

    pub fn total_supply(&self) -> Amount {
        lock(&self.supply).total
    }
}

impl RewardToken for InMemoryRewardToken {
    fn minter(&self) -> Address {
        self.minter
    }

    fn mint(&self, caller: Address, to: Address, amount: Amount) -> Result<(), LedgerError> {
        if caller != self.minter {
            return Err(LedgerError::NotMinter { caller });
        }
        let mut supply = lock(&self.supply);
        let total = supply.total.checked_add(amount)?;
        let balance = supply
            .balances
            .get(&to)
            .copied()
            .unwrap_or_default()
            .checked_add(amount)?;
        supply.total = total;
        supply.balances.insert(to, balance);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_minter_can_mint() {
        let minter = Address::from_low_u64(1);
        let token = InMemoryRewardToken::new(minter);

        let err = token
            .mint(Address::from_low_u64(2), Address::from_low_u64(3), Amount::from(5u64))
            .unwrap_err();
        assert_eq!(
            err,
            LedgerError::NotMinter {
                caller: Address::from_low_u64(2)
            }
        );
        assert_eq!(token.total_supply(), Amount::ZERO);

        token
            .mint(minter, Address::from_low_u64(3), Amount::from(5u64))
            .unwrap();
        assert_eq!(token.balance_of(&Address::from_low_u64(3)), Amount::from(5u64));
        assert_eq!(token.total_supply(), Amount::from(5u64));
    }
}
