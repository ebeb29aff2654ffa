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
    database_id::{AccountId, UserId},
    db::map_not_found,
    money::get_money,
};

/// The kind of money container an account represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Checking,
    Savings,
    CreditCard,
    Cash,
    Investment,
    Loan,
    Upi,
}

impl AccountType {
    /// The name used for this type in the database and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::CreditCard => "credit_card",
            AccountType::Cash => "cash",
            AccountType::Investment => "investment",
            AccountType::Loan => "loan",
            AccountType::Upi => "upi",
        }
    }
}

impl Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            "credit_card" => Ok(AccountType::CreditCard),
            "cash" => Ok(AccountType::Cash),
            "investment" => Ok(AccountType::Investment),
            "loan" => Ok(AccountType::Loan),
            "upi" => Ok(AccountType::Upi),
            other => Err(Error::InvalidAccountType(other.to_owned())),
        }
    }
}

impl ToSql for AccountType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for AccountType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|error| FromSqlError::Other(Box::new(error)))
    }
}

/// A named money container with a running balance, e.g. a bank account or credit card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// The id for the account.
    pub id: AccountId,
    /// The user that owns the account.
    pub owner_id: UserId,
    /// The display name of the account.
    pub name: String,
    /// The kind of account.
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// The running balance.
    ///
    /// Only [crate::Ledger] changes the balance after the account is created.
    pub balance: Decimal,
    /// Inactive accounts are left out of the total balance.
    pub is_active: bool,
    /// When the account was created.
    pub created_at: OffsetDateTime,
    /// When the account was last changed.
    pub updated_at: OffsetDateTime,
}

/// The data needed to open an account.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewAccount {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    /// The opening balance.
    #[serde(default)]
    pub balance: Decimal,
}

/// The account details a user may edit. The balance is deliberately absent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AccountUpdate {
    pub name: String,
    #[serde(rename = "type")]
    pub account_type: AccountType,
    pub is_active: bool,
}

const ACCOUNT_COLUMNS: &str =
    "id, owner_id, name, type, balance, is_active, created_at, updated_at";

pub fn create_account_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS account (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            balance TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_account_owner ON account(owner_id)",
        (),
    )?;

    Ok(())
}

pub fn map_row_to_account(row: &Row) -> Result<Account, rusqlite::Error> {
    Ok(Account {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        account_type: row.get(3)?,
        balance: get_money(row, 4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Open a new, active account for `owner_id` with an opening balance.
///
/// # Errors
/// Returns an [Error::SqlError] if the account could not be inserted.
pub fn create_account(
    owner_id: UserId,
    account: NewAccount,
    connection: &Connection,
) -> Result<Account, Error> {
    let now = OffsetDateTime::now_utc();

    connection
        .prepare(&format!(
            "INSERT INTO account (owner_id, name, type, balance, is_active, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
             RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(
            (
                owner_id,
                &account.name,
                account.account_type,
                account.balance.to_string(),
                now,
            ),
            map_row_to_account,
        )
        .map_err(Error::from)
}

/// Retrieve an account by its `id`.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist, or [Error::SqlError] for other SQL errors.
pub fn get_account(id: AccountId, connection: &Connection) -> Result<Account, Error> {
    connection
        .prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM account WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_row_to_account)
        .map_err(map_not_found("account"))
}

/// Retrieve all accounts owned by `owner_id`, ordered by name.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_accounts(owner_id: UserId, connection: &Connection) -> Result<Vec<Account>, Error> {
    connection
        .prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM account WHERE owner_id = :owner_id ORDER BY name ASC, id ASC"
        ))?
        .query_map(&[(":owner_id", &owner_id)], map_row_to_account)?
        .map(|maybe_account| maybe_account.map_err(Error::from))
        .collect()
}

/// Change the name, type and active flag of an account.
///
/// # Errors
/// Returns [Error::NotFound] if the account does not exist, or [Error::SqlError] for other SQL errors.
pub fn update_account(
    id: AccountId,
    update: AccountUpdate,
    connection: &Connection,
) -> Result<Account, Error> {
    connection
        .prepare(&format!(
            "UPDATE account SET name = ?1, type = ?2, is_active = ?3, updated_at = ?4
             WHERE id = ?5
             RETURNING {ACCOUNT_COLUMNS}"
        ))?
        .query_row(
            (
                &update.name,
                update.account_type,
                update.is_active,
                OffsetDateTime::now_utc(),
                id,
            ),
            map_row_to_account,
        )
        .map_err(map_not_found("account"))
}

/// Get the total balance across the active accounts of `owner_id`.
///
/// # Errors
/// Returns [Error] if:
/// - Database connection fails
/// - SQL query preparation or execution fails
pub fn get_total_account_balance(owner_id: UserId, connection: &Connection) -> Result<Decimal, Error> {
    let mut stmt =
        connection.prepare("SELECT balance FROM account WHERE owner_id = ?1 AND is_active = 1")?;

    let balances = stmt.query_map([owner_id], |row| get_money(row, 0))?;

    let mut total = Decimal::ZERO;
    for balance in balances {
        total += balance?;
    }

    Ok(total)
}

#[cfg(test)]
mod create_table_tests {
    use rusqlite::Connection;

    use super::create_account_table;

    #[test]
    fn sql_is_valid() {
        let connection =
            Connection::open_in_memory().expect("Could not initialise in-memory SQLite database");

        assert_eq!(Ok(()), create_account_table(&connection));
    }
}


#[cfg(test)]
mod get_total_account_balance_tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;

    use crate::db::initialize;

    use super::{
        AccountType, AccountUpdate, NewAccount, create_account, get_total_account_balance,
        update_account,
    };

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    fn open(owner_id: i64, name: &str, balance: rust_decimal::Decimal, conn: &Connection) -> i64 {
        create_account(
            owner_id,
            NewAccount {
                name: name.to_owned(),
                account_type: AccountType::Checking,
                balance,
            },
            conn,
        )
        .unwrap()
        .id
    }

    #[test]
    fn returns_sum_of_active_accounts() {
        let conn = get_test_connection();
        open(1, "Account 1", dec!(100.50), &conn);
        open(1, "Account 2", dec!(250.75), &conn);
        let closed = open(1, "Account 3", dec!(999.99), &conn);
        open(2, "Someone else's", dec!(5000), &conn);
        update_account(
            closed,
            AccountUpdate {
                name: "Account 3".to_owned(),
                account_type: AccountType::Checking,
                is_active: false,
            },
            &conn,
        )
        .unwrap();

        let result = get_total_account_balance(1, &conn).unwrap();

        assert_eq!(result, dec!(351.25));
    }

    #[test]
    fn returns_zero_for_no_accounts() {
        let conn = get_test_connection();

        let result = get_total_account_balance(1, &conn).unwrap();

        assert_eq!(result, dec!(0));
    }

    #[test]
    fn handles_negative_balances() {
        let conn = get_test_connection();
        open(1, "Account 1", dec!(-200.0), &conn);
        open(1, "Account 2", dec!(100.0), &conn);

        let result = get_total_account_balance(1, &conn).unwrap();

        assert_eq!(result, dec!(-100.0));
    }
}
