//! Defines the category model and its database queries.
//!
//! A category's type is authoritative for every transaction filed under it:
//! the income/expense direction of a transaction is never supplied by the caller.

use rusqlite::{Connection, Row};
use serde::{Deserialize, Serialize};

use crate::{
    Error,
    database_id::CategoryId,
    db::{is_foreign_key_violation, map_not_found},
    transaction::TransactionType,
};

/// A reusable income or expense classification, e.g. "Groceries" or "Salary".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    /// The ID of the category.
    pub id: CategoryId,
    /// The display name of the category.
    pub name: String,
    /// Whether transactions in this category add to or subtract from an account.
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
}

/// Create a category in the database.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn create_category(
    name: &str,
    transaction_type: TransactionType,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "INSERT INTO category (name, type) VALUES (?1, ?2)
             RETURNING id, name, type",
        )?
        .query_row((name, transaction_type), map_category_row)
        .map_err(Error::from)
}

/// Retrieve a category from the database by its `id`.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - or [Error::SqlError] there is some other SQL error.
pub fn get_category(id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    connection
        .prepare("SELECT id, name, type FROM category WHERE id = :id")?
        .query_row(&[(":id", &id)], map_category_row)
        .map_err(map_not_found("category"))
}

/// Retrieve all categories ordered by name.
///
/// # Errors
/// This function will return an error if there is an SQL error.
pub fn get_all_categories(connection: &Connection) -> Result<Vec<Category>, Error> {
    connection
        .prepare("SELECT id, name, type FROM category ORDER BY name ASC, id ASC")?
        .query_map([], map_category_row)?
        .map(|maybe_category| maybe_category.map_err(Error::from))
        .collect()
}

/// Rename a category or change its type.
///
/// Transactions keep the type they were created with, so changing the type
/// only affects transactions created afterwards.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - or [Error::SqlError] there is some other SQL error.
pub fn update_category(
    id: CategoryId,
    name: &str,
    transaction_type: TransactionType,
    connection: &Connection,
) -> Result<Category, Error> {
    connection
        .prepare(
            "UPDATE category SET name = ?1, type = ?2 WHERE id = ?3
             RETURNING id, name, type",
        )?
        .query_row((name, transaction_type, id), map_category_row)
        .map_err(map_not_found("category"))
}

/// Delete a category that no transaction is filed under.
///
/// Returns the deleted category.
///
/// # Errors
/// This function will return a:
/// - [Error::NotFound] if `id` does not refer to a valid category,
/// - [Error::CategoryInUse] if a transaction still refers to the category,
/// - or [Error::SqlError] there is some other SQL error.
pub fn delete_category(id: CategoryId, connection: &Connection) -> Result<Category, Error> {
    let category = get_category(id, connection)?;

    connection
        .execute("DELETE FROM category WHERE id = ?1", [id])
        .map_err(|error| {
            if is_foreign_key_violation(&error) {
                Error::CategoryInUse(category.name.clone())
            } else {
                error.into()
            }
        })?;

    Ok(category)
}

/// Create the category table in the database.
///
/// # Errors
/// Returns an error if the table cannot be created or if there is an SQL error.
pub fn create_category_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                type TEXT NOT NULL CHECK (type IN ('income', 'expense'))
                )",
        (),
    )?;

    Ok(())
}

fn map_category_row(row: &Row) -> Result<Category, rusqlite::Error> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        transaction_type: row.get(2)?,
    })
}
