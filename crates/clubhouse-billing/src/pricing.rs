// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-based rental pricing.
//!
//! `cost = round(hours * price_per_hour, 2)` where hours come from the exact
//! millisecond duration. Rounding is banker's rounding (midpoint to even).

use chrono::TimeDelta;
use clubhouse_core::Money;
use rust_decimal::Decimal;

const MILLIS_PER_HOUR: i64 = 3_600_000;

/// Price of renting for `duration` at `price_per_hour`.
///
/// Non-positive durations and prices cost zero.
pub fn cost(duration: TimeDelta, price_per_hour: Money) -> Money {
    let millis = duration.num_milliseconds();
    if millis <= 0 || price_per_hour <= Money::ZERO {
        return Money::ZERO;
    }
    // Multiply before dividing so exact hour fractions stay exact.
    Decimal::from(millis)
        .checked_mul(price_per_hour)
        .and_then(|scaled| scaled.checked_div(Decimal::from(MILLIS_PER_HOUR)))
        .map(|c| c.round_dp(2))
        .unwrap_or(Decimal::MAX)
}
