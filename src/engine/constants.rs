use crate::domain::Amount;
use primitive_types::U256;

/// Length of one Dutch auction round, seconds.
pub const EPOCH_PERIOD: u64 = 3_600;

/// Next round starts at 2x the paid price (1e18 scale).
pub const PRICE_MULTIPLIER: Amount = Amount::new_const(2_000_000_000_000_000_000);

/// Floor for a round's starting price: 0.001 units.
pub const MIN_INIT_PRICE: Amount = Amount::new_const(1_000_000_000_000_000);

/// Ceiling for a round's starting price: 2^192 - 1.
pub const ABS_MAX_INIT_PRICE: Amount =
    Amount::new(U256([u64::MAX, u64::MAX, u64::MAX, 0]));

/// Emission at deployment: 4 units per second.
pub const INITIAL_UPS: Amount = Amount::new_const(4_000_000_000_000_000_000);

/// Emission never drops below 0.01 units per second.
pub const TAIL_UPS: Amount = Amount::new_const(10_000_000_000_000_000);

/// 30 days.
pub const HALVING_PERIOD: u64 = 30 * 24 * 3_600;

/// A fulfilled multiplier is kept for 24h before a takeover requests a new one.
pub const MULTIPLIER_DURATION: u64 = 24 * 3_600;

/// 1x.
pub const DEFAULT_MULTIPLIER: Amount = Amount::PRECISION;

/// Fee rates in basis points of `FEE_DIVISOR`.
pub const TOTAL_FEE: u64 = 2_000;
pub const TEAM_FEE: u64 = 200;
pub const FACTION_FEE: u64 = 200;
pub const FEE_DIVISOR: u64 = 10_000;

pub const MAX_CAPACITY: u32 = 1_000_000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abs_max_is_2_pow_192_minus_1() {
        assert_eq!(ABS_MAX_INIT_PRICE, Amount::max_bits(192));
    }

    #[test]
    fn test_unit_constants() {
        assert_eq!(PRICE_MULTIPLIER, Amount::from_whole(2));
        assert_eq!(INITIAL_UPS, Amount::from_whole(4));
        assert_eq!(TAIL_UPS, Amount::parse_units("0.01").unwrap());
        assert_eq!(MIN_INIT_PRICE, Amount::parse_units("0.001").unwrap());
        assert!(TEAM_FEE + FACTION_FEE <= TOTAL_FEE);
    }
}
