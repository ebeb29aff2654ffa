//! Defines the core data models and database queries for transactions.
//!
//! Creating, updating and deleting transactions is done by [crate::Ledger],
//! which keeps account balances and budgets in step with the transaction rows.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    database_id::{
        AccountId, BudgetId, CategoryId, RecurringTransactionId, TransactionId, UserId,
    },
    db::map_not_found,
    money::get_money,
};

// ============================================================================
// MODELS
// ============================================================================

/// Whether money was earned or spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Money coming in, adds to the account balance.
    Income,
    /// Money going out, subtracts from the account balance.
    Expense,
}

impl TransactionType {
    /// The name used for this type in the database and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    /// The change to an account balance when `amount` is posted with this type.
    pub fn signed(&self, amount: Decimal) -> Decimal {
        match self {
            TransactionType::Income => amount,
            TransactionType::Expense => -amount,
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "income" => Ok(TransactionType::Income),
            "expense" => Ok(TransactionType::Expense),
            other => Err(Error::InvalidTransactionType(other.to_owned())),
        }
    }
}

impl ToSql for TransactionType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for TransactionType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// An expense or income, i.e. an event where money was either spent or earned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// The ID of the transaction.
    pub id: TransactionId,
    /// The user that owns the transaction.
    pub owner_id: UserId,
    /// The account the transaction is posted against.
    pub account_id: AccountId,
    /// The category the transaction is filed under.
    pub category_id: CategoryId,
    /// The budget the transaction is attributed to, if any.
    pub budget_id: Option<BudgetId>,
    /// A text description of what the transaction was for.
    pub description: String,
    /// The unsigned magnitude of the transaction.
    pub amount: Decimal,
    /// Income or expense, taken from the category when the transaction was created.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    /// When the transaction happened.
    pub date: Date,
    /// An optional free-text note.
    pub note: Option<String>,
    /// The recurring transaction that produced this transaction, if any.
    pub recurring_transaction_id: Option<RecurringTransactionId>,
    /// When the transaction was created.
    pub created_at: OffsetDateTime,
    /// When the transaction was last changed.
    pub updated_at: OffsetDateTime,
}

/// The columns of the transaction table in the order [map_transaction_row] expects.
pub(crate) const TRANSACTION_COLUMNS: &str = "id, owner_id, account_id, category_id, budget_id, \
    description, amount, type, date, note, recurring_transaction_id, created_at, updated_at";

// ============================================================================
// DATABASE FUNCTIONS
// ============================================================================

/// Retrieve a transaction from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid transaction,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_transaction(id: TransactionId, connection: &Connection) -> Result<Transaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM \"transaction\" WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_transaction_row)
        .map_err(map_not_found("transaction"))
}

/// Check whether a transaction has already been created from the recurring
/// transaction `recurring_transaction_id` on `date`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn is_materialized(
    recurring_transaction_id: RecurringTransactionId,
    date: Date,
    connection: &Connection,
) -> Result<bool, Error> {
    connection
        .query_row(
            "SELECT EXISTS (
                SELECT 1 FROM \"transaction\" WHERE recurring_transaction_id = ?1 AND date = ?2
            )",
            (recurring_transaction_id, date),
            |row| row.get(0),
        )
        .map_err(Error::from)
}

#[cfg(test)]
/// Get the total number of transactions in the database.
///
/// # Errors
/// This function will return a [Error::SqlError] there is some SQL error.
pub fn count_transactions(connection: &Connection) -> Result<u32, Error> {
    connection
        .query_row("SELECT COUNT(id) FROM \"transaction\";", [], |row| {
            row.get(0)
        })
        .map_err(|error| error.into())
}

/// Create the transaction table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS \"transaction\" (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                account_id INTEGER NOT NULL,
                category_id INTEGER NOT NULL,
                budget_id INTEGER,
                description TEXT NOT NULL,
                amount TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
                date TEXT NOT NULL,
                note TEXT,
                recurring_transaction_id INTEGER,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE,
                FOREIGN KEY(category_id) REFERENCES category(id) ON UPDATE CASCADE,
                FOREIGN KEY(budget_id) REFERENCES budget(id) ON UPDATE CASCADE ON DELETE SET NULL,
                FOREIGN KEY(recurring_transaction_id) REFERENCES recurring_transaction(id)
                    ON UPDATE CASCADE ON DELETE SET NULL
                )",
        (),
    )?;

    // At most one transaction per recurring transaction per day. NULLs are
    // distinct, so manually created transactions are unaffected.
    connection.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_transaction_recurring_date
            ON \"transaction\"(recurring_transaction_id, date)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_owner_date ON \"transaction\"(owner_id, date)",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_transaction_account ON \"transaction\"(account_id)",
        (),
    )?;

    Ok(())
}

/// Map a database row to a Transaction.
pub fn map_transaction_row(row: &Row) -> Result<Transaction, rusqlite::Error> {
    Ok(Transaction {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        account_id: row.get(2)?,
        category_id: row.get(3)?,
        budget_id: row.get(4)?,
        description: row.get(5)?,
        amount: get_money(row, 6)?,
        transaction_type: row.get(7)?,
        date: row.get(8)?,
        note: row.get(9)?,
        recurring_transaction_id: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
