//! # Fixed point
//! Converts chain-native fixed-point integers (RAY, WAD, token units) into decimals.
//! All arithmetic stays in `U256` until the final step, which splits the value into an integer
//! quotient and a fractional remainder so the integer part is never subject to rounding.
use ethers::types::U256;
use lazy_static::lazy_static;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::MetricsError;

pub const SECONDS_PER_YEAR: u64 = 31_536_000;
pub const PERCENT_DECIMALS: u32 = 2;
// Digits kept from the remainder term before rounding.
const FRACTION_DIGITS: u32 = 18;

lazy_static! {
    pub static ref RAY: U256 = U256::exp10(27);
    pub static ref WAD: U256 = U256::exp10(18);
    static ref FRACTION_SCALE: U256 = U256::exp10(FRACTION_DIGITS as usize);
    static ref HUNDRED: U256 = U256::from(100u64);
}

type Result<T> = std::result::Result<T, MetricsError>;

fn checked_mul(a: U256, b: U256) -> Result<U256> {
    a.checked_mul(b)
        .ok_or_else(|| MetricsError::Overflow(format!("{} * {} exceeds 256 bits", a, b)))
}

/// Converts an integer to a `Decimal`, failing if it does not fit the 96-bit mantissa.
pub fn u256_to_decimal(value: U256) -> Result<Decimal> {
    let too_large = || MetricsError::Overflow(format!("{} does not fit a decimal", value));
    let value = u128::try_from(value).map_err(|_| too_large())?;
    let value = i128::try_from(value).map_err(|_| too_large())?;
    Decimal::try_from_i128_with_scale(value, 0).map_err(|_| too_large())
}

/// `numerator / denominator` as `quotient + remainder / denominator`.
pub fn ratio_to_decimal(numerator: U256, denominator: U256) -> Result<Decimal> {
    if denominator.is_zero() {
        return Err(MetricsError::Overflow(format!(
            "{} divided by zero",
            numerator
        )));
    }
    let (quotient, remainder) = numerator.div_mod(denominator);
    // remainder < denominator, so the scaled fraction is always < 10^FRACTION_DIGITS
    let fraction = checked_mul(remainder, *FRACTION_SCALE)? / denominator;
    let fraction = Decimal::from_i128_with_scale(fraction.low_u128() as i128, FRACTION_DIGITS);
    let whole = u256_to_decimal(quotient)?;
    whole
        .checked_add(fraction)
        .ok_or_else(|| MetricsError::Overflow(format!("{} / {}", numerator, denominator)))
}

/// Rounds half away from zero to two decimal places.
pub fn round_percent(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(PERCENT_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// RAY-scaled rate (1e27 == 100%) to a percentage.
pub fn ray_to_percent(raw: U256) -> Result<Decimal> {
    let value = ratio_to_decimal(checked_mul(raw, *HUNDRED)?, *RAY)?;
    Ok(round_percent(value))
}

/// WAD-scaled per-second rate to an annualised percentage (no compounding).
pub fn per_second_wad_to_annual_percent(raw: U256) -> Result<Decimal> {
    let annual = checked_mul(raw, U256::from(SECONDS_PER_YEAR))?;
    let value = ratio_to_decimal(checked_mul(annual, *HUNDRED)?, *WAD)?;
    Ok(round_percent(value))
}

/// WAD-scaled ratio (1e18 == 100%) to a percentage.
pub fn wad_ratio_to_percent(raw: U256) -> Result<Decimal> {
    let value = ratio_to_decimal(checked_mul(raw, *HUNDRED)?, *WAD)?;
    Ok(round_percent(value))
}

/// Base units of a token with `decimals` decimals to a whole-token amount. Exact, not rounded.
pub fn token_amount(raw: U256, decimals: u32) -> Result<Decimal> {
    let unit = U256::from(10u64)
        .checked_pow(U256::from(decimals))
        .ok_or_else(|| MetricsError::Overflow(format!("10^{} exceeds 256 bits", decimals)))?;
    Ok(ratio_to_decimal(raw, unit)?.normalize())
}

/// Borrowed over supplied as a percentage, zero when nothing is supplied.
pub fn utilization_from_amounts(borrowed: U256, supplied: U256) -> Result<Decimal> {
    if supplied.is_zero() {
        return Ok(Decimal::ZERO);
    }
    let value = ratio_to_decimal(checked_mul(borrowed, *HUNDRED)?, supplied)?;
    Ok(round_percent(value))
}
