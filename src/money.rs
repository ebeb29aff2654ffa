//! Helpers for storing money in SQLite.
//!
//! Balances and amounts are [Decimal]s stored as TEXT so that adding and
//! reverting amounts is exact.

use rusqlite::{Row, types::Type};
use rust_decimal::Decimal;

use crate::Error;

/// Read a decimal money value from the column at `index`.
///
/// # Errors
/// Returns a [rusqlite::Error::FromSqlConversionFailure] if the column text is not a valid decimal.
pub fn get_money(row: &Row, index: usize) -> Result<Decimal, rusqlite::Error> {
    let text: String = row.get(index)?;

    text.parse::<Decimal>()
        .map_err(|error| rusqlite::Error::FromSqlConversionFailure(index, Type::Text, Box::new(error)))
}

/// Check that a transaction amount is a strictly positive magnitude.
///
/// # Errors
/// Returns [Error::InvalidAmount] if `amount` is zero or negative.
pub fn ensure_positive(amount: Decimal) -> Result<Decimal, Error> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(amount));
    }

    Ok(amount)
}
