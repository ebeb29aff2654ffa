//! Creates the application's database schema and holds shared query helpers.

use std::sync::{Mutex, MutexGuard};

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior, ffi};

use crate::{
    Error,
    account::create_account_table,
    audit_log::create_activity_log_table,
    budget::create_budget_table,
    category::create_category_table,
    error::Entity,
    recurring::create_recurring_transaction_table,
    transaction::create_transaction_table,
};

/// Create all of the application's tables and indices if they do not already exist.
///
/// Also enables foreign key enforcement for `connection`.
///
/// # Errors
/// Returns an [Error::SqlError] if any of the tables could not be created.
pub fn initialize(connection: &Connection) -> Result<(), Error> {
    connection.pragma_update(None, "foreign_keys", "ON")?;

    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Exclusive)?;

    create_category_table(&transaction)?;
    create_account_table(&transaction)?;
    create_budget_table(&transaction)?;
    create_recurring_transaction_table(&transaction)?;
    create_transaction_table(&transaction)?;
    create_activity_log_table(&transaction)?;

    transaction.commit()?;

    Ok(())
}

/// Start an atomic unit of work that takes the database write lock up front.
///
/// Taking the write lock immediately (rather than on the first write) means
/// two read-modify-write sequences on the same row cannot interleave, even
/// across processes sharing the database file.
///
/// # Errors
/// Returns an [Error::SqlError] if the transaction could not be started.
pub fn begin_immediate(connection: &Connection) -> Result<SqlTransaction<'_>, Error> {
    SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate).map_err(Error::from)
}

/// Acquire the shared database connection.
///
/// # Errors
/// Returns [Error::DatabaseLockError] if the lock is poisoned.
pub fn lock_connection(
    db_connection: &Mutex<Connection>,
) -> Result<MutexGuard<'_, Connection>, Error> {
    db_connection.lock().map_err(|error| {
        tracing::error!("could not acquire database lock: {error}");
        Error::DatabaseLockError
    })
}

/// Returns a closure that converts a missing row into [Error::NotFound] for `entity`.
pub fn map_not_found(entity: Entity) -> impl Fn(rusqlite::Error) -> Error {
    move |error| match error {
        rusqlite::Error::QueryReturnedNoRows => Error::NotFound(entity),
        error => error.into(),
    }
}

/// Whether `error` was caused by a `UNIQUE` constraint.
pub fn is_unique_violation(error: &rusqlite::Error) -> bool {
    has_extended_code(error, ffi::SQLITE_CONSTRAINT_UNIQUE)
}

/// Whether `error` was caused by a row that is still referenced by a foreign key.
pub fn is_foreign_key_violation(error: &rusqlite::Error) -> bool {
    has_extended_code(error, ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

fn has_extended_code(error: &rusqlite::Error, code: std::ffi::c_int) -> bool {
    error
        .sqlite_error()
        .is_some_and(|error| error.extended_code == code)
}
