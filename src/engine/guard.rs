//! Execution lock held for the duration of a takeover.
//!
//! Takeover calls out to the payment asset, the reward token and the oracle.
//! If any of them calls back into takeover on the same thread the inner call
//! must fail instead of deadlocking on the registry mutex.

use std::cell::Cell;

thread_local! {
    static ENTERED: Cell<bool> = const { Cell::new(false) };
}

/// RAII marker; the lock is released on drop.
#[derive(Debug)]
pub struct ReentrancyGuard {
    _private: (),
}

impl ReentrancyGuard {
    /// `None` if this thread is already inside a guarded section.
    pub fn enter() -> Option<Self> {
        ENTERED.with(|entered| {
            if entered.get() {
                None
            } else {
                entered.set(true);
                Some(Self { _private: () })
            }
        })
    }

    pub fn is_entered() -> bool {
        ENTERED.with(|entered| entered.get())
    }
}

impl Drop for ReentrancyGuard {
    fn drop(&mut self) {
        ENTERED.with(|entered| entered.set(false));
    }
}
