//! The ledger mutation engine.
//!
//! Account balances and budget amounts are stored rather than derived, so every
//! change to a transaction must update them in the same atomic unit as the
//! transaction row. The functions in this module are the only code that writes
//! `account.balance` and `budget.amount` after those rows are created.

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};

use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Deserialize;
use time::{Date, OffsetDateTime};

use crate::{
    Error,
    account::{Account, get_account},
    audit_log::AuditLog,
    budget::{Budget, get_budget, map_row_to_budget},
    category::get_category,
    database_id::{
        AccountId, BudgetId, CategoryId, RecurringTransactionId, TransactionId, UserId,
    },
    db::{begin_immediate, is_unique_violation, lock_connection, map_not_found},
    money::{ensure_positive, get_money},
};

use super::core::{
    TRANSACTION_COLUMNS, Transaction, get_transaction, is_materialized, map_transaction_row,
};

/// The data needed to create a transaction.
///
/// The transaction type is not part of this struct, it is taken from the category.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct NewTransaction {
    /// The user that owns the transaction.
    #[serde(skip, default)]
    pub owner_id: UserId,
    pub account_id: AccountId,
    pub category_id: CategoryId,
    #[serde(default)]
    pub budget_id: Option<BudgetId>,
    pub description: String,
    /// The unsigned magnitude, must be greater than zero.
    pub amount: Decimal,
    pub date: Date,
    #[serde(default)]
    pub note: Option<String>,
    /// Set when the transaction is materialized from a recurring transaction.
    #[serde(skip, default)]
    pub recurring_transaction_id: Option<RecurringTransactionId>,
}

/// The new values for an existing transaction.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionUpdate {
    pub account_id: AccountId,
    pub category_id: CategoryId,
    #[serde(default)]
    pub budget_id: Option<BudgetId>,
    pub description: String,
    pub amount: Decimal,
    pub date: Date,
    #[serde(default)]
    pub note: Option<String>,
}

/// The single entry point for changes that affect account balances or budget amounts.
///
/// Each operation locks the shared connection, re-reads the rows it needs and
/// commits every affected row in one immediate SQLite transaction. Audit log
/// entries are recorded after the commit and never fail the operation.
#[derive(Debug, Clone)]
pub struct Ledger {
    db_connection: Arc<Mutex<Connection>>,
    audit_log: AuditLog,
}

impl Ledger {
    /// Create a ledger over `db_connection` that reports changes to `audit_log`.
    pub fn new(db_connection: Arc<Mutex<Connection>>, audit_log: AuditLog) -> Self {
        Self {
            db_connection,
            audit_log,
        }
    }

    /// Acquire the shared database connection for read-only queries.
    ///
    /// # Errors
    /// Returns [Error::DatabaseLockError] if the lock is poisoned.
    pub fn connection(&self) -> Result<MutexGuard<'_, Connection>, Error> {
        lock_connection(&self.db_connection)
    }

    /// The audit log that this ledger reports to.
    pub fn audit_log(&self) -> &AuditLog {
        &self.audit_log
    }

    /// Create a transaction and post it to its account and budget.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the category, account or budget does not exist,
    /// [Error::InvalidAmount] if the amount is not positive,
    /// [Error::AlreadyMaterialized] if the recurring transaction already has a
    /// transaction on that date, or [Error::SqlError] if the commit fails.
    pub fn create_transaction(&self, transaction: NewTransaction) -> Result<Transaction, Error> {
        let transaction = {
            let connection = self.connection()?;
            create_transaction(transaction, &connection)?
        };

        self.audit_log.record(
            transaction.owner_id,
            format!("New transaction '{}' created", transaction.description),
        );

        Ok(transaction)
    }

    /// Update a transaction and move its effect between accounts and budgets as needed.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the transaction or any referenced record does
    /// not exist, [Error::InvalidAmount] if the amount is not positive, or
    /// [Error::SqlError] if the commit fails.
    pub fn update_transaction(
        &self,
        id: TransactionId,
        update: TransactionUpdate,
    ) -> Result<Transaction, Error> {
        let transaction = {
            let connection = self.connection()?;
            update_transaction(id, update, &connection)?
        };

        self.audit_log.record(
            transaction.owner_id,
            format!("Transaction '{}' updated", transaction.description),
        );

        Ok(transaction)
    }

    /// Delete a transaction and revert its effect on its account and budget.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the transaction does not exist, or
    /// [Error::SqlError] if the commit fails.
    pub fn delete_transaction(&self, id: TransactionId) -> Result<Transaction, Error> {
        let transaction = {
            let connection = self.connection()?;
            delete_transaction(id, &connection)?
        };

        self.audit_log.record(
            transaction.owner_id,
            format!("Transaction '{}' removed", transaction.description),
        );

        Ok(transaction)
    }

    /// Delete an account along with its transactions, giving back to each
    /// budget what those transactions took from it.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the account does not exist, or
    /// [Error::SqlError] if the commit fails.
    pub fn delete_account(&self, id: AccountId) -> Result<Account, Error> {
        let account = {
            let connection = self.connection()?;
            delete_account(id, &connection)?
        };

        self.audit_log.record(
            account.owner_id,
            format!("Account '{}' removed", account.name),
        );

        Ok(account)
    }

    /// Rename a budget and set a new target.
    ///
    /// The stored amount becomes `target` minus what the budget's transactions
    /// have already taken from it.
    ///
    /// # Errors
    /// Returns [Error::NotFound] if the budget does not exist, or
    /// [Error::SqlError] if the commit fails.
    pub fn update_budget(&self, id: BudgetId, name: &str, target: Decimal) -> Result<Budget, Error> {
        let budget = {
            let connection = self.connection()?;
            update_budget(id, name, target, &connection)?
        };

        self.audit_log
            .record(budget.owner_id, format!("Budget '{}' updated", budget.name));

        Ok(budget)
    }
}

/// Create a transaction in one atomic unit with its account and budget updates.
pub(crate) fn create_transaction(
    new: NewTransaction,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let amount = ensure_positive(new.amount)?;
    let sql_transaction = begin_immediate(connection)?;

    let category = get_category(new.category_id, &sql_transaction)?;
    let account = get_account(new.account_id, &sql_transaction)?;
    let budget = new
        .budget_id
        .map(|budget_id| get_budget(budget_id, &sql_transaction))
        .transpose()?;

    if let Some(recurring_transaction_id) = new.recurring_transaction_id {
        if is_materialized(recurring_transaction_id, new.date, &sql_transaction)? {
            return Err(Error::AlreadyMaterialized(recurring_transaction_id, new.date));
        }
    }

    let now = OffsetDateTime::now_utc();
    let transaction = sql_transaction
        .prepare(&format!(
            "INSERT INTO \"transaction\" (owner_id, account_id, category_id, budget_id, \
            description, amount, type, date, note, recurring_transaction_id, created_at, updated_at) \
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11) \
            RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                new.owner_id,
                account.id,
                category.id,
                new.budget_id,
                &new.description,
                amount.to_string(),
                category.transaction_type,
                new.date,
                &new.note,
                new.recurring_transaction_id,
                now,
            ),
            map_transaction_row,
        )
        .map_err(|error| match new.recurring_transaction_id {
            Some(recurring_transaction_id) if is_unique_violation(&error) => {
                Error::AlreadyMaterialized(recurring_transaction_id, new.date)
            }
            _ => error.into(),
        })?;

    write_account_balance(
        account.id,
        account.balance + transaction.transaction_type.signed(amount),
        &sql_transaction,
    )?;

    // Budgets track consumption, so income attributed to a budget also uses it up.
    if let Some(budget) = budget {
        write_budget_amount(budget.id, budget.amount - amount, &sql_transaction)?;
    }

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Update a transaction in one atomic unit with its account and budget updates.
///
/// The transaction keeps its original type, the category only changes where it is filed.
pub(crate) fn update_transaction(
    id: TransactionId,
    update: TransactionUpdate,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let new_amount = ensure_positive(update.amount)?;
    let sql_transaction = begin_immediate(connection)?;

    let old = get_transaction(id, &sql_transaction)?;
    if update.category_id != old.category_id {
        get_category(update.category_id, &sql_transaction)?;
    }

    let transaction_type = old.transaction_type;
    let amount_difference = new_amount - old.amount;

    if update.account_id != old.account_id {
        let new_account = get_account(update.account_id, &sql_transaction)?;
        let old_account = get_account(old.account_id, &sql_transaction)?;

        write_account_balance(
            old_account.id,
            old_account.balance - transaction_type.signed(old.amount),
            &sql_transaction,
        )?;
        write_account_balance(
            new_account.id,
            new_account.balance + transaction_type.signed(new_amount),
            &sql_transaction,
        )?;
    } else if !amount_difference.is_zero() {
        let account = get_account(old.account_id, &sql_transaction)?;

        write_account_balance(
            account.id,
            account.balance + transaction_type.signed(amount_difference),
            &sql_transaction,
        )?;
    }

    if update.budget_id != old.budget_id {
        let new_budget = update
            .budget_id
            .map(|budget_id| get_budget(budget_id, &sql_transaction))
            .transpose()?;

        if let Some(old_budget_id) = old.budget_id {
            let old_budget = get_budget(old_budget_id, &sql_transaction)?;
            write_budget_amount(
                old_budget.id,
                old_budget.amount + old.amount,
                &sql_transaction,
            )?;
        }

        if let Some(new_budget) = new_budget {
            write_budget_amount(
                new_budget.id,
                new_budget.amount - new_amount,
                &sql_transaction,
            )?;
        }
    } else if !amount_difference.is_zero() {
        if let Some(budget_id) = old.budget_id {
            let budget = get_budget(budget_id, &sql_transaction)?;
            write_budget_amount(
                budget.id,
                budget.amount - amount_difference,
                &sql_transaction,
            )?;
        }
    }

    let transaction = sql_transaction
        .prepare(&format!(
            "UPDATE \"transaction\" SET account_id = ?1, category_id = ?2, budget_id = ?3, \
            description = ?4, amount = ?5, date = ?6, note = ?7, updated_at = ?8 \
            WHERE id = ?9 \
            RETURNING {TRANSACTION_COLUMNS}"
        ))?
        .query_row(
            (
                update.account_id,
                update.category_id,
                update.budget_id,
                &update.description,
                new_amount.to_string(),
                update.date,
                &update.note,
                OffsetDateTime::now_utc(),
                id,
            ),
            map_transaction_row,
        )
        .map_err(map_not_found("transaction"))?;

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Delete a transaction in one atomic unit with its account and budget updates.
///
/// Returns the deleted transaction.
pub(crate) fn delete_transaction(
    id: TransactionId,
    connection: &Connection,
) -> Result<Transaction, Error> {
    let sql_transaction = begin_immediate(connection)?;

    let transaction = get_transaction(id, &sql_transaction)?;
    let account = get_account(transaction.account_id, &sql_transaction)?;

    write_account_balance(
        account.id,
        account.balance - transaction.transaction_type.signed(transaction.amount),
        &sql_transaction,
    )?;

    if let Some(budget_id) = transaction.budget_id {
        let budget = get_budget(budget_id, &sql_transaction)?;
        write_budget_amount(
            budget.id,
            budget.amount + transaction.amount,
            &sql_transaction,
        )?;
    }

    sql_transaction.execute("DELETE FROM \"transaction\" WHERE id = ?1", [id])?;

    sql_transaction.commit()?;

    Ok(transaction)
}

/// Delete an account, its transactions and its recurring transactions in one atomic unit.
///
/// Returns the deleted account.
pub(crate) fn delete_account(id: AccountId, connection: &Connection) -> Result<Account, Error> {
    let sql_transaction = begin_immediate(connection)?;

    let account = get_account(id, &sql_transaction)?;

    let mut refunds: BTreeMap<BudgetId, Decimal> = BTreeMap::new();
    {
        let mut statement = sql_transaction.prepare(
            "SELECT budget_id, amount FROM \"transaction\" \
            WHERE account_id = ?1 AND budget_id IS NOT NULL",
        )?;
        let rows = statement.query_map([id], |row| {
            Ok((row.get::<_, BudgetId>(0)?, get_money(row, 1)?))
        })?;

        for row in rows {
            let (budget_id, amount) = row?;
            *refunds.entry(budget_id).or_insert(Decimal::ZERO) += amount;
        }
    }

    for (budget_id, refund) in refunds {
        let budget = get_budget(budget_id, &sql_transaction)?;
        write_budget_amount(budget.id, budget.amount + refund, &sql_transaction)?;
    }

    sql_transaction.execute("DELETE FROM \"transaction\" WHERE account_id = ?1", [id])?;
    sql_transaction.execute("DELETE FROM account WHERE id = ?1", [id])?;

    sql_transaction.commit()?;

    Ok(account)
}

/// Rename a budget and reset its amount to `target` minus the amounts of its transactions.
pub(crate) fn update_budget(
    id: BudgetId,
    name: &str,
    target: Decimal,
    connection: &Connection,
) -> Result<Budget, Error> {
    let sql_transaction = begin_immediate(connection)?;

    get_budget(id, &sql_transaction)?;

    let mut attributed = Decimal::ZERO;
    {
        let mut statement =
            sql_transaction.prepare("SELECT amount FROM \"transaction\" WHERE budget_id = ?1")?;
        for amount in statement.query_map([id], |row| get_money(row, 0))? {
            attributed += amount?;
        }
    }

    let budget = sql_transaction
        .prepare(
            "UPDATE budget SET name = ?1, amount = ?2, updated_at = ?3 WHERE id = ?4 \
            RETURNING id, owner_id, name, amount, created_at, updated_at",
        )?
        .query_row(
            (
                name,
                (target - attributed).to_string(),
                OffsetDateTime::now_utc(),
                id,
            ),
            map_row_to_budget,
        )
        .map_err(map_not_found("budget"))?;

    sql_transaction.commit()?;

    Ok(budget)
}

fn write_account_balance(
    id: AccountId,
    balance: Decimal,
    connection: &Connection,
) -> Result<(), Error> {
    connection.execute(
        "UPDATE account SET balance = ?1, updated_at = ?2 WHERE id = ?3",
        (balance.to_string(), OffsetDateTime::now_utc(), id),
    )?;

    Ok(())
}

fn write_budget_amount(id: BudgetId, amount: Decimal, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "UPDATE budget SET amount = ?1, updated_at = ?2 WHERE id = ?3",
        (amount.to_string(), OffsetDateTime::now_utc(), id),
    )?;

    Ok(())
}
