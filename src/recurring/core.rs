//! Recurring transaction templates.
//!
//! A template has no effect on balances itself. The materializer turns it into
//! real transactions through [crate::Ledger] on the days it is due.

use std::{fmt::Display, str::FromStr};

use rusqlite::{
    Connection, Row, ToSql,
    types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    account::get_account,
    budget::get_budget,
    category::get_category,
    database_id::{AccountId, BudgetId, CategoryId, RecurringTransactionId, UserId},
    db::map_not_found,
    money::{ensure_positive, get_money},
    transaction::TransactionType,
};

/// How often a recurring transaction is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    /// Due on the recurring date of every month.
    Monthly,
    /// Due on the recurring date of the month the template was created in.
    Yearly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Frequency::Monthly => "monthly",
            Frequency::Yearly => "yearly",
        }
    }
}

impl Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Frequency::Monthly),
            "yearly" => Ok(Frequency::Yearly),
            other => Err(Error::InvalidFrequency(other.to_owned())),
        }
    }
}

impl ToSql for Frequency {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Frequency {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// A template for a transaction that repeats every month or every year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecurringTransaction {
    pub id: RecurringTransactionId,
    pub owner_id: UserId,
    pub account_id: AccountId,
    /// Not enforced by a foreign key, the materializer checks it each time.
    pub category_id: CategoryId,
    pub budget_id: Option<BudgetId>,
    pub description: String,
    pub amount: Decimal,
    /// Taken from the category when the template is saved.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
    pub note: Option<String>,
    pub frequency: Frequency,
    /// The day of the month the template is due, from 1 to 31.
    pub recurring_date: u8,
    /// For yearly templates, the month of this timestamp is the month the template is due.
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The user supplied fields of a recurring transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RecurringTransactionForm {
    pub account_id: AccountId,
    pub category_id: CategoryId,
    #[serde(default)]
    pub budget_id: Option<BudgetId>,
    pub description: String,
    pub amount: Decimal,
    #[serde(default)]
    pub note: Option<String>,
    pub frequency: Frequency,
    pub recurring_date: u8,
}

const RECURRING_TRANSACTION_COLUMNS: &str = "id, owner_id, account_id, category_id, budget_id, \
    description, amount, type, note, frequency, recurring_date, created_at, updated_at";

pub fn create_recurring_transaction_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS recurring_transaction (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            account_id INTEGER NOT NULL,
            category_id INTEGER NOT NULL,
            budget_id INTEGER,
            description TEXT NOT NULL,
            amount TEXT NOT NULL,
            type TEXT NOT NULL CHECK (type IN ('income', 'expense')),
            note TEXT,
            frequency TEXT NOT NULL CHECK (frequency IN ('monthly', 'yearly')),
            recurring_date INTEGER NOT NULL CHECK (recurring_date BETWEEN 1 AND 31),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(account_id) REFERENCES account(id) ON UPDATE CASCADE ON DELETE CASCADE,
            FOREIGN KEY(budget_id) REFERENCES budget(id) ON UPDATE CASCADE ON DELETE SET NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_recurring_transaction_owner
            ON recurring_transaction(owner_id)",
        (),
    )?;

    Ok(())
}

fn map_row_to_recurring_transaction(row: &Row) -> Result<RecurringTransaction, rusqlite::Error> {
    Ok(RecurringTransaction {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        account_id: row.get(2)?,
        category_id: row.get(3)?,
        budget_id: row.get(4)?,
        description: row.get(5)?,
        amount: get_money(row, 6)?,
        transaction_type: row.get(7)?,
        note: row.get(8)?,
        frequency: row.get(9)?,
        recurring_date: row.get(10)?,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}

/// Check the form and return the type of its category.
fn validate(form: &RecurringTransactionForm, connection: &Connection) -> Result<TransactionType, Error> {
    ensure_positive(form.amount)?;

    if !(1..=31).contains(&form.recurring_date) {
        return Err(Error::InvalidRecurringDate(form.recurring_date));
    }

    get_account(form.account_id, connection)?;

    if let Some(budget_id) = form.budget_id {
        get_budget(budget_id, connection)?;
    }

    Ok(get_category(form.category_id, connection)?.transaction_type)
}

/// Create a recurring transaction for `owner_id`.
///
/// # Errors
/// Returns:
/// - [Error::InvalidAmount] if the amount is not positive,
/// - [Error::InvalidRecurringDate] if the recurring date is not from 1 to 31,
/// - [Error::NotFound] if the account, category or budget does not exist,
/// - or [Error::SqlError] for other SQL errors.
pub fn create_recurring_transaction(
    owner_id: UserId,
    form: RecurringTransactionForm,
    connection: &Connection,
) -> Result<RecurringTransaction, Error> {
    let transaction_type = validate(&form, connection)?;

    connection
        .prepare(&format!(
            "INSERT INTO recurring_transaction (owner_id, account_id, category_id, budget_id,
                description, amount, type, note, frequency, recurring_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)
             RETURNING {RECURRING_TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                owner_id,
                form.account_id,
                form.category_id,
                form.budget_id,
                &form.description,
                form.amount.to_string(),
                transaction_type,
                &form.note,
                form.frequency,
                form.recurring_date,
                OffsetDateTime::now_utc(),
            ),
            map_row_to_recurring_transaction,
        )
        .map_err(Error::from)
}

/// Replace the fields of the recurring transaction `id`.
///
/// Transactions already created from the template are not changed.
///
/// # Errors
/// Returns the same errors as [create_recurring_transaction], and
/// [Error::NotFound] if `id` does not refer to a recurring transaction.
pub fn update_recurring_transaction(
    id: RecurringTransactionId,
    form: RecurringTransactionForm,
    connection: &Connection,
) -> Result<RecurringTransaction, Error> {
    let transaction_type = validate(&form, connection)?;

    connection
        .prepare(&format!(
            "UPDATE recurring_transaction SET account_id = ?1, category_id = ?2, budget_id = ?3,
                description = ?4, amount = ?5, type = ?6, note = ?7, frequency = ?8,
                recurring_date = ?9, updated_at = ?10
             WHERE id = ?11
             RETURNING {RECURRING_TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                form.account_id,
                form.category_id,
                form.budget_id,
                &form.description,
                form.amount.to_string(),
                transaction_type,
                &form.note,
                form.frequency,
                form.recurring_date,
                OffsetDateTime::now_utc(),
                id,
            ),
            map_row_to_recurring_transaction,
        )
        .map_err(map_not_found("recurring transaction"))
}

/// Delete the recurring transaction `id` and return it.
///
/// Transactions created from it are kept.
///
/// # Errors
/// Returns [Error::NotFound] if `id` does not refer to a recurring transaction,
/// or [Error::SqlError] for other SQL errors.
pub fn delete_recurring_transaction(
    id: RecurringTransactionId,
    connection: &Connection,
) -> Result<RecurringTransaction, Error> {
    connection
        .prepare(&format!(
            "DELETE FROM recurring_transaction WHERE id = :id \
            RETURNING {RECURRING_TRANSACTION_COLUMNS}"
        ))?
        .query_row(&[(":id", &id)], map_row_to_recurring_transaction)
        .map_err(map_not_found("recurring transaction"))
}

#[cfg(test)]
pub fn get_recurring_transaction(
    id: RecurringTransactionId,
    connection: &Connection,
) -> Result<RecurringTransaction, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECURRING_TRANSACTION_COLUMNS} FROM recurring_transaction WHERE id = :id"
        ))?
        .query_row(&[(":id", &id)], map_row_to_recurring_transaction)
        .map_err(map_not_found("recurring transaction"))
}

/// Get the recurring transactions of `owner_id`, in the order they were created.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_recurring_transactions(
    owner_id: UserId,
    connection: &Connection,
) -> Result<Vec<RecurringTransaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECURRING_TRANSACTION_COLUMNS} FROM recurring_transaction \
            WHERE owner_id = :owner_id ORDER BY id ASC"
        ))?
        .query_map(&[(":owner_id", &owner_id)], map_row_to_recurring_transaction)?
        .map(|maybe_template| maybe_template.map_err(Error::from))
        .collect()
}

/// Get every recurring transaction of every user, in the order they were created.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_all_recurring_transactions(
    connection: &Connection,
) -> Result<Vec<RecurringTransaction>, Error> {
    connection
        .prepare(&format!(
            "SELECT {RECURRING_TRANSACTION_COLUMNS} FROM recurring_transaction ORDER BY id ASC"
        ))?
        .query_map([], map_row_to_recurring_transaction)?
        .map(|maybe_template| maybe_template.map_err(Error::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;

    use crate::{
        Error,
        account::{AccountType, NewAccount, create_account},
        category::create_category,
        database_id::{AccountId, CategoryId},
        db::initialize,
        transaction::TransactionType,
    };

    use super::{
        Frequency, RecurringTransactionForm, create_recurring_transaction,
        delete_recurring_transaction, get_all_recurring_transactions, get_recurring_transaction,
        get_recurring_transactions, update_recurring_transaction,
    };

    fn get_test_connection() -> (Connection, AccountId, CategoryId) {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let account = create_account(
            1,
            NewAccount {
                name: "Everyday".to_owned(),
                account_type: AccountType::Checking,
                balance: dec!(0),
            },
            &connection,
        )
        .unwrap();
        let category = create_category("Rent", TransactionType::Expense, &connection).unwrap();

        (connection, account.id, category.id)
    }

    fn form(account_id: AccountId, category_id: CategoryId) -> RecurringTransactionForm {
        RecurringTransactionForm {
            account_id,
            category_id,
            budget_id: None,
            description: "Rent".to_owned(),
            amount: dec!(450.00),
            note: Some("Paid to landlord".to_owned()),
            frequency: Frequency::Monthly,
            recurring_date: 15,
        }
    }

    #[test]
    fn create_takes_type_from_category() {
        let (conn, account_id, category_id) = get_test_connection();

        let created =
            create_recurring_transaction(1, form(account_id, category_id), &conn).unwrap();

        assert_eq!(created.transaction_type, TransactionType::Expense);
        assert_eq!(created.recurring_date, 15);
        assert_eq!(get_recurring_transaction(created.id, &conn), Ok(created));
    }

    #[test]
    fn rejects_invalid_recurring_date() {
        let (conn, account_id, category_id) = get_test_connection();

        for recurring_date in [0, 32] {
            let result = create_recurring_transaction(
                1,
                RecurringTransactionForm {
                    recurring_date,
                    ..form(account_id, category_id)
                },
                &conn,
            );

            assert_eq!(result, Err(Error::InvalidRecurringDate(recurring_date)));
        }
    }

    #[test]
    fn rejects_missing_references() {
        let (conn, account_id, category_id) = get_test_connection();

        assert_eq!(
            create_recurring_transaction(1, form(99, category_id), &conn),
            Err(Error::NotFound("account"))
        );
        assert_eq!(
            create_recurring_transaction(1, form(account_id, 99), &conn),
            Err(Error::NotFound("category"))
        );
        assert_eq!(
            create_recurring_transaction(
                1,
                RecurringTransactionForm {
                    budget_id: Some(99),
                    ..form(account_id, category_id)
                },
                &conn
            ),
            Err(Error::NotFound("budget"))
        );
    }

    #[test]
    fn update_changes_fields() {
        let (conn, account_id, category_id) = get_test_connection();
        let created =
            create_recurring_transaction(1, form(account_id, category_id), &conn).unwrap();
        let salary = create_category("Salary", TransactionType::Income, &conn).unwrap();

        let updated = update_recurring_transaction(
            created.id,
            RecurringTransactionForm {
                category_id: salary.id,
                frequency: Frequency::Yearly,
                recurring_date: 1,
                ..form(account_id, category_id)
            },
            &conn,
        )
        .unwrap();

        assert_eq!(updated.transaction_type, TransactionType::Income);
        assert_eq!(updated.frequency, Frequency::Yearly);
        assert_eq!(updated.recurring_date, 1);
        assert_eq!(updated.created_at, created.created_at);
    }

    #[test]
    fn update_missing_is_not_found() {
        let (conn, account_id, category_id) = get_test_connection();

        assert_eq!(
            update_recurring_transaction(7, form(account_id, category_id), &conn),
            Err(Error::NotFound("recurring transaction"))
        );
    }

    #[test]
    fn delete_then_list() {
        let (conn, account_id, category_id) = get_test_connection();
        let first = create_recurring_transaction(1, form(account_id, category_id), &conn).unwrap();
        let second =
            create_recurring_transaction(1, form(account_id, category_id), &conn).unwrap();
        create_recurring_transaction(2, form(account_id, category_id), &conn).unwrap();

        delete_recurring_transaction(first.id, &conn).unwrap();

        assert_eq!(get_recurring_transactions(1, &conn), Ok(vec![second]));
        assert_eq!(get_all_recurring_transactions(&conn).unwrap().len(), 2);
        assert_eq!(
            delete_recurring_transaction(first.id, &conn),
            Err(Error::NotFound("recurring transaction"))
        );
    }

    #[test]
    fn parses_frequencies() {
        assert_eq!("yearly".parse(), Ok(Frequency::Yearly));
        assert_eq!(
            "weekly".parse::<Frequency>(),
            Err(Error::InvalidFrequency("weekly".to_owned()))
        );
    }
}
