//! Round-half-up ratios in integer arithmetic.

#[must_use]
pub fn percent(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let numerator = u128::from(numerator);
    let denominator = u128::from(denominator);
    let rounded = (numerator * 200 + denominator) / (denominator * 2);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// `numerator / denominator` rounded half-up, in whole units.
#[must_use]
pub fn rounded_div(numerator: u64, denominator: u64) -> u64 {
    if denominator == 0 {
        return 0;
    }
    let numerator = u128::from(numerator);
    let denominator = u128::from(denominator);
    let rounded = (numerator * 2 + denominator) / (denominator * 2);
    u64::try_from(rounded).unwrap_or(u64::MAX)
}

/// `numerator / denominator` rounded half-up to one decimal place.
#[must_use]
pub fn tenths(numerator: u64, denominator: u64) -> f64 {
    if denominator == 0 {
        return 0.0;
    }
    let numerator = u128::from(numerator);
    let denominator = u128::from(denominator);
    let rounded = (numerator * 20 + denominator) / (denominator * 2);
    rounded as f64 / 10.0
}

/// One-decimal rounding for values that only exist as floats.
#[must_use]
pub fn round_tenths(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value * 10.0 + 0.5).floor() / 10.0
}
