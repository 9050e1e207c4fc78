use alloy::primitives::U256;
use bigdecimal::{BigDecimal, RoundingMode};
use num_bigint::{BigInt, Sign};

use crate::error::{Result, TokenError};

/// Scale a raw base-unit amount into human units
pub fn to_decimal(raw: U256, decimals: u8) -> BigDecimal {
    let digits = BigInt::from_bytes_be(Sign::Plus, &raw.to_be_bytes::<32>());
    BigDecimal::new(digits, i64::from(decimals))
}

/// Convert a human amount into base units, rounding half-even to an integer
pub fn to_base_units(amount: &BigDecimal, decimals: u8) -> Result<U256> {
    if amount.sign() == Sign::Minus {
        return Err(TokenError::InvalidAmount(format!("{amount} is negative")));
    }

    let factor = BigDecimal::new(BigInt::from(1u8), -i64::from(decimals));
    let scaled = (amount.clone() * factor).with_scale_round(0, RoundingMode::HalfEven);
    let (digits, _) = scaled.into_bigint_and_exponent();
    let (_, bytes) = digits.to_bytes_be();

    U256::try_from_be_slice(&bytes)
        .ok_or_else(|| TokenError::InvalidAmount(format!("{amount} overflows uint256")))
}
