//! Linear Dutch-auction price decay and next-round starting price.

use crate::domain::{Amount, MathError};

/// Current price of a round that started at `init_price`, `elapsed` seconds ago.
///
/// Decays linearly from `init_price` to exactly zero at `elapsed == period`
/// and stays zero afterwards.
pub fn price(init_price: Amount, elapsed: u64, period: u64) -> Result<Amount, MathError> {
    if elapsed > period {
        return Ok(Amount::ZERO);
    }
    let decayed = init_price.mul_div(Amount::from(elapsed), Amount::from(period))?;
    init_price.checked_sub(decayed)
}

/// Starting price of the next round: `paid * price_multiplier / PRECISION`,
/// clamped to `[min_floor, abs_max]` after the multiply.
pub fn next_init_price(
    paid: Amount,
    price_multiplier: Amount,
    min_floor: Amount,
    abs_max: Amount,
) -> Result<Amount, MathError> {
    let scaled = paid.mul_div(price_multiplier, Amount::PRECISION)?;
    if scaled < min_floor {
        Ok(min_floor)
    } else if scaled > abs_max {
        Ok(abs_max)
    } else {
        Ok(scaled)
    }
}
