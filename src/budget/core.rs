use rusqlite::{Connection, Row};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    Error,
    database_id::{BudgetId, UserId},
    db::map_not_found,
    money::get_money,
};

/// A spending allowance whose amount goes down as transactions are attributed to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Budget {
    pub id: BudgetId,
    pub owner_id: UserId,
    pub name: String,
    /// What is left of the budget.
    pub amount: Decimal,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// The name and target amount of a budget, as sent by a client.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct BudgetForm {
    pub name: String,
    pub amount: Decimal,
}

const BUDGET_COLUMNS: &str = "id, owner_id, name, amount, created_at, updated_at";

pub fn create_budget_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS budget (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            amount TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        (),
    )?;

    connection.execute(
        "CREATE INDEX IF NOT EXISTS idx_budget_owner ON budget(owner_id)",
        (),
    )?;

    Ok(())
}

pub fn map_row_to_budget(row: &Row) -> Result<Budget, rusqlite::Error> {
    Ok(Budget {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        name: row.get(2)?,
        amount: get_money(row, 3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

/// Create a budget for `owner_id` starting at `amount`.
///
/// # Errors
/// Returns an [Error::SqlError] if the budget could not be inserted.
pub fn create_budget(
    owner_id: UserId,
    name: &str,
    amount: Decimal,
    connection: &Connection,
) -> Result<Budget, Error> {
    connection
        .prepare(&format!(
            "INSERT INTO budget (owner_id, name, amount, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             RETURNING {BUDGET_COLUMNS}"
        ))?
        .query_row(
            (owner_id, name, amount.to_string(), OffsetDateTime::now_utc()),
            map_row_to_budget,
        )
        .map_err(Error::from)
}

/// Retrieve a budget by its `id`.
///
/// # Errors
/// Returns [Error::NotFound] if the budget does not exist, or [Error::SqlError] for other SQL errors.
pub fn get_budget(id: BudgetId, connection: &Connection) -> Result<Budget, Error> {
    connection
        .prepare(&format!("SELECT {BUDGET_COLUMNS} FROM budget WHERE id = :id"))?
        .query_row(&[(":id", &id)], map_row_to_budget)
        .map_err(map_not_found("budget"))
}

/// Retrieve the budgets owned by `owner_id`, ordered by name.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_budgets(owner_id: UserId, connection: &Connection) -> Result<Vec<Budget>, Error> {
    connection
        .prepare(&format!(
            "SELECT {BUDGET_COLUMNS} FROM budget WHERE owner_id = :owner_id ORDER BY name ASC, id ASC"
        ))?
        .query_map(&[(":owner_id", &owner_id)], map_row_to_budget)?
        .map(|maybe_budget| maybe_budget.map_err(Error::from))
        .collect()
}

/// Delete a budget. Transactions attributed to it keep their amounts and lose the reference.
///
/// Returns the deleted budget.
///
/// # Errors
/// Returns [Error::NotFound] if the budget does not exist, or [Error::SqlError] for other SQL errors.
pub fn delete_budget(id: BudgetId, connection: &Connection) -> Result<Budget, Error> {
    connection
        .prepare(&format!(
            "DELETE FROM budget WHERE id = :id RETURNING {BUDGET_COLUMNS}"
        ))?
        .query_row(&[(":id", &id)], map_row_to_budget)
        .map_err(map_not_found("budget"))
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal_macros::dec;

    use crate::{Error, db::initialize};

    use super::{create_budget, delete_budget, get_budget, get_budgets};

    fn get_test_connection() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        initialize(&conn).unwrap();
        conn
    }

    #[test]
    fn create_then_get() {
        let conn = get_test_connection();

        let created = create_budget(1, "Groceries", dec!(450.00), &conn).unwrap();

        assert_eq!(get_budget(created.id, &conn), Ok(created.clone()));
        assert_eq!(created.amount, dec!(450.00));
    }

    #[test]
    fn list_is_scoped_to_owner() {
        let conn = get_test_connection();
        create_budget(1, "Travel", dec!(100), &conn).unwrap();
        create_budget(1, "Eating out", dec!(100), &conn).unwrap();
        create_budget(2, "Hobbies", dec!(100), &conn).unwrap();

        let names: Vec<String> = get_budgets(1, &conn)
            .unwrap()
            .into_iter()
            .map(|budget| budget.name)
            .collect();

        assert_eq!(names, vec!["Eating out".to_owned(), "Travel".to_owned()]);
    }

    #[test]
    fn delete_removes_budget() {
        let conn = get_test_connection();
        let budget = create_budget(1, "Travel", dec!(100), &conn).unwrap();

        assert_eq!(delete_budget(budget.id, &conn), Ok(budget.clone()));
        assert_eq!(get_budget(budget.id, &conn), Err(Error::NotFound("budget")));
        assert_eq!(delete_budget(budget.id, &conn), Err(Error::NotFound("budget")));
    }
}
