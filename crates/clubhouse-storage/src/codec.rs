// SPDX-FileCopyrightText: 2026 Clubhouse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Column encodings shared by the query modules.
//!
//! Timestamps are fixed-width UTC text with millisecond precision so that
//! lexical order in SQL matches chronological order. Money is decimal
//! text. Enums are stored by their `Display` name.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use clubhouse_core::Money;
use rusqlite::Row;
use rusqlite::types::Type;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn ts(at: DateTime<Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_ts(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

pub fn money(amount: Money) -> String {
    amount.to_string()
}

pub fn millis(duration: TimeDelta) -> i64 {
    duration.num_milliseconds()
}

fn conversion_failure(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(idx)?;
    parse_ts(&text).map_err(|e| conversion_failure(idx, e))
}

pub fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| parse_ts(&t).map_err(|e| conversion_failure(idx, e)))
        .transpose()
}

pub fn get_money(row: &Row<'_>, idx: usize) -> rusqlite::Result<Money> {
    let text: String = row.get(idx)?;
    Money::from_str(&text).map_err(|e| conversion_failure(idx, e))
}

pub fn get_opt_money(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Money>> {
    let text: Option<String> = row.get(idx)?;
    text.map(|t| Money::from_str(&t).map_err(|e| conversion_failure(idx, e)))
        .transpose()
}

/// Decode a strum-backed enum column.
pub fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = strum::ParseError>,
{
    let text: String = row.get(idx)?;
    T::from_str(&text).map_err(|e| conversion_failure(idx, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn timestamps_are_fixed_width_and_sortable() {
        let a = Utc.with_ymd_and_hms(2026, 3, 1, 9, 5, 0).unwrap();
        let b = a + TimeDelta::milliseconds(1500);
        assert_eq!(ts(a), "2026-03-01T09:05:00.000Z");
        assert_eq!(ts(b), "2026-03-01T09:05:01.500Z");
        assert!(ts(a) < ts(b));
        assert_eq!(parse_ts(&ts(b)).unwrap(), b);
    }

    #[test]
    fn money_text_keeps_scale() {
        assert_eq!(money(dec!(200.00)), "200.00");
        assert_eq!(money(dec!(-12.5)), "-12.5");
        assert_eq!(Money::from_str(&money(dec!(0.01))).unwrap(), dec!(0.01));
    }
}
