//! Payment asset with transfer-from-allowance semantics toward the registry.

use super::{lock, LedgerError};
use crate::domain::{Address, Amount};
use std::collections::HashMap;
use std::sync::Mutex;

/// Asset the takeover price is paid in.
///
/// The registry is the only spender; allowances are what each owner has
/// approved the registry to pull. Payment is two-phase: [`hold`](Self::hold)
/// debits the payer, then exactly one of [`settle`](Self::settle) or
/// [`release`](Self::release) finishes it. Neither can fail.
pub trait PaymentAsset: Send + Sync {
    /// Verify `from` could pay `total` right now without moving funds.
    fn can_pay(&self, from: Address, total: Amount) -> Result<(), LedgerError>;

    /// Debit `from` for the whole batch. Nothing is credited yet.
    fn hold(
        &self,
        from: Address,
        transfers: &[(Address, Amount)],
    ) -> Result<PaymentHold, LedgerError>;

    /// Credit a hold to its recipients in order.
    fn settle(&self, hold: PaymentHold);

    /// Return a hold to its payer, allowance included.
    fn release(&self, hold: PaymentHold);
}

/// Funds taken from a payer and not yet credited to anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct PaymentHold {
    pub from: Address,
    pub transfers: Vec<(Address, Amount)>,
    pub total: Amount,
}

#[derive(Debug, Default)]
struct Book {
    balances: HashMap<Address, Amount>,
    allowances: HashMap<Address, Amount>,
    escrow: Amount,
}

impl Book {
    fn balance(&self, owner: &Address) -> Amount {
        self.balances.get(owner).copied().unwrap_or_default()
    }

    fn allowance(&self, owner: &Address) -> Amount {
        self.allowances.get(owner).copied().unwrap_or_default()
    }

    fn check(&self, from: Address, total: Amount) -> Result<(), LedgerError> {
        let balance = self.balance(&from);
        if balance < total {
            return Err(LedgerError::InsufficientBalance {
                owner: from,
                needed: total,
                available: balance,
            });
        }
        let allowance = self.allowance(&from);
        if allowance < total {
            return Err(LedgerError::InsufficientAllowance {
                owner: from,
                needed: total,
                available: allowance,
            });
        }
        Ok(())
    }
}

/// In-process payment asset.
#[derive(Debug, Default)]
pub struct InMemoryAsset {
    book: Mutex<Book>,
}

impl InMemoryAsset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit `owner` and approve the registry for the same amount.
    pub fn fund(&self, owner: Address, amount: Amount) -> Result<(), LedgerError> {
        let mut book = lock(&self.book);
        let balance = book.balance(&owner).checked_add(amount)?;
        let allowance = book.allowance(&owner).checked_add(amount)?;
        book.balances.insert(owner, balance);
        book.allowances.insert(owner, allowance);
        Ok(())
    }

    /// Set the registry allowance for `owner`.
    pub fn approve(&self, owner: Address, amount: Amount) {
        lock(&self.book).allowances.insert(owner, amount);
    }

    pub fn balance_of(&self, owner: &Address) -> Amount {
        lock(&self.book).balance(owner)
    }

    pub fn allowance_of(&self, owner: &Address) -> Amount {
        lock(&self.book).allowance(owner)
    }

    /// Funds held and not yet settled or released.
    pub fn escrowed(&self) -> Amount {
        lock(&self.book).escrow
    }
}

impl PaymentAsset for InMemoryAsset {
    fn can_pay(&self, from: Address, total: Amount) -> Result<(), LedgerError> {
        lock(&self.book).check(from, total)
    }

    fn hold(
        &self,
        from: Address,
        transfers: &[(Address, Amount)],
    ) -> Result<PaymentHold, LedgerError> {
        let mut book = lock(&self.book);

        let mut total = Amount::ZERO;
        for (_, amount) in transfers {
            total = total.checked_add(*amount)?;
        }
        book.check(from, total)?;
        let escrow = book.escrow.checked_add(total)?;

        let from_balance = book.balance(&from).checked_sub(total)?;
        let from_allowance = book.allowance(&from).checked_sub(total)?;
        book.balances.insert(from, from_balance);
        book.allowances.insert(from, from_allowance);
        book.escrow = escrow;

        Ok(PaymentHold {
            from,
            transfers: transfers.to_vec(),
            total,
        })
    }

    fn settle(&self, hold: PaymentHold) {
        let mut book = lock(&self.book);
        book.escrow = book.escrow.saturating_sub(hold.total);
        for (to, amount) in hold.transfers {
            let balance = book.balance(&to).saturating_add(amount);
            book.balances.insert(to, balance);
        }
    }

    fn release(&self, hold: PaymentHold) {
        let mut book = lock(&self.book);
        book.escrow = book.escrow.saturating_sub(hold.total);
        let balance = book.balance(&hold.from).saturating_add(hold.total);
        let allowance = book.allowance(&hold.from).saturating_add(hold.total);
        book.balances.insert(hold.from, balance);
        book.allowances.insert(hold.from, allowance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    #[test]
    fn test_fund_sets_balance_and_allowance() {
        let asset = InMemoryAsset::new();
        asset.fund(addr(1), Amount::from(500u64)).unwrap();
        assert_eq!(asset.balance_of(&addr(1)), Amount::from(500u64));
        assert_eq!(asset.allowance_of(&addr(1)), Amount::from(500u64));
    }

    #[test]
    fn test_settled_hold_moves_funds_in_order() {
        let asset = InMemoryAsset::new();
        asset.fund(addr(1), Amount::from(100u64)).unwrap();
        let hold = asset
            .hold(
                addr(1),
                &[(addr(2), Amount::from(20u64)), (addr(3), Amount::from(80u64))],
            )
            .unwrap();
        assert_eq!(hold.total, Amount::from(100u64));
        assert_eq!(asset.balance_of(&addr(1)), Amount::ZERO);
        assert_eq!(asset.balance_of(&addr(2)), Amount::ZERO);
        assert_eq!(asset.escrowed(), Amount::from(100u64));

        asset.settle(hold);
        assert_eq!(asset.balance_of(&addr(2)), Amount::from(20u64));
        assert_eq!(asset.balance_of(&addr(3)), Amount::from(80u64));
        assert_eq!(asset.allowance_of(&addr(1)), Amount::ZERO);
        assert_eq!(asset.escrowed(), Amount::ZERO);
    }

    #[test]
    fn test_released_hold_restores_payer() {
        let asset = InMemoryAsset::new();
        asset.fund(addr(1), Amount::from(100u64)).unwrap();
        asset.approve(addr(1), Amount::from(60u64));
        let hold = asset
            .hold(addr(1), &[(addr(2), Amount::from(40u64))])
            .unwrap();
        assert_eq!(asset.allowance_of(&addr(1)), Amount::from(20u64));

        asset.release(hold);
        assert_eq!(asset.balance_of(&addr(1)), Amount::from(100u64));
        assert_eq!(asset.allowance_of(&addr(1)), Amount::from(60u64));
        assert_eq!(asset.balance_of(&addr(2)), Amount::ZERO);
        assert_eq!(asset.escrowed(), Amount::ZERO);
    }

    #[test]
    fn test_hold_is_all_or_nothing() {
        let asset = InMemoryAsset::new();
        asset.fund(addr(1), Amount::from(50u64)).unwrap();
        let err = asset
            .hold(
                addr(1),
                &[(addr(2), Amount::from(30u64)), (addr(3), Amount::from(30u64))],
            )
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(asset.balance_of(&addr(1)), Amount::from(50u64));
        assert_eq!(asset.escrowed(), Amount::ZERO);
    }

    #[test]
    fn test_allowance_is_enforced() {
        let asset = InMemoryAsset::new();
        asset.fund(addr(1), Amount::from(100u64)).unwrap();
        asset.approve(addr(1), Amount::from(10u64));
        assert!(matches!(
            asset.can_pay(addr(1), Amount::from(11u64)),
            Err(LedgerError::InsufficientAllowance { .. })
        ));
        assert!(asset.can_pay(addr(1), Amount::from(10u64)).is_ok());
    }

    #[test]
    fn test_self_transfer_keeps_balance() {
        let asset = InMemoryAsset::new();
        asset.fund(addr(1), Amount::from(100u64)).unwrap();
        let hold = asset
            .hold(
                addr(1),
                &[(addr(9), Amount::from(20u64)), (addr(1), Amount::from(80u64))],
            )
            .unwrap();
        asset.settle(hold);
        assert_eq!(asset.balance_of(&addr(1)), Amount::from(80u64));
        assert_eq!(asset.balance_of(&addr(9)), Amount::from(20u64));
    }
}
