//! Read-only queries over transactions: filtered listing and totals.

use std::collections::BTreeMap;

use rusqlite::{Connection, params_from_iter, types::Value};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{
    Error,
    database_id::{AccountId, BudgetId, CategoryId, UserId},
    money::get_money,
    pagination::Pagination,
};

use super::core::{TRANSACTION_COLUMNS, Transaction, TransactionType, map_transaction_row};

/// An inclusive date range where either end may be open.
#[derive(Debug, Default, Clone, Copy, PartialEq, Deserialize)]
pub struct DateRange {
    /// Include transactions on or after this date.
    pub start_date: Option<Date>,
    /// Include transactions on or before this date.
    pub end_date: Option<Date>,
}

/// Defines which transactions are returned by [get_transactions].
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct TransactionFilter {
    /// Only include transactions whose description contains this text.
    pub description: Option<String>,
    /// Only include transactions posted against this account.
    pub account_id: Option<AccountId>,
    /// Only include transactions filed under this category.
    pub category_id: Option<CategoryId>,
    /// Only include transactions attributed to this budget.
    pub budget_id: Option<BudgetId>,
    /// Include transactions on or after this date.
    pub start_date: Option<Date>,
    /// Include transactions on or before this date.
    pub end_date: Option<Date>,
}

/// Income and expense totals for a date range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Aggregate {
    /// The sum of all income transactions.
    pub total_income: Decimal,
    /// The sum of all expense transactions.
    pub total_expenses: Decimal,
    /// Income minus expenses.
    pub net_income: Decimal,
}

/// The total spent in one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySpending {
    /// The category name.
    pub category: String,
    /// The sum of expense transactions in the category.
    pub amount: Decimal,
}

/// Holds the SQL conditions and their parameters for a transaction query.
#[derive(Default)]
struct WhereClause {
    parts: Vec<String>,
    parameters: Vec<Value>,
}

impl WhereClause {
    fn new(owner_id: UserId) -> Self {
        let mut clause = Self::default();
        clause.push("t.owner_id = ?", Value::Integer(owner_id));
        clause
    }

    /// Add a condition with a single `?` placeholder.
    fn push(&mut self, condition: &str, parameter: Value) {
        self.parameters.push(parameter);
        let placeholder = format!("?{}", self.parameters.len());
        self.parts.push(condition.replacen('?', &placeholder, 1));
    }

    fn push_date_range(&mut self, start_date: Option<Date>, end_date: Option<Date>) {
        if let Some(start_date) = start_date {
            self.push("t.date >= ?", Value::Text(start_date.to_string()));
        }

        if let Some(end_date) = end_date {
            self.push("t.date <= ?", Value::Text(end_date.to_string()));
        }
    }

    fn to_sql(&self) -> String {
        format!("WHERE {}", self.parts.join(" AND "))
    }
}

/// Get a page of the transactions owned by `owner_id` that match `filter`.
///
/// Transactions are sorted newest first, then by descending ID so that the
/// order is stable across pages.
///
/// # Errors
/// This function will return a [Error::SqlError] there is a SQL error.
pub fn get_transactions(
    owner_id: UserId,
    filter: &TransactionFilter,
    pagination: Pagination,
    connection: &Connection,
) -> Result<Vec<Transaction>, Error> {
    let mut clause = WhereClause::new(owner_id);

    if let Some(description) = filter.description.as_ref().filter(|text| !text.is_empty()) {
        clause.push(
            "t.description LIKE ?",
            Value::Text(format!("%{description}%")),
        );
    }

    if let Some(account_id) = filter.account_id {
        clause.push("t.account_id = ?", Value::Integer(account_id));
    }

    if let Some(category_id) = filter.category_id {
        clause.push("t.category_id = ?", Value::Integer(category_id));
    }

    if let Some(budget_id) = filter.budget_id {
        clause.push("t.budget_id = ?", Value::Integer(budget_id));
    }

    clause.push_date_range(filter.start_date, filter.end_date);

    let columns = TRANSACTION_COLUMNS
        .split(", ")
        .map(|column| format!("t.{column}"))
        .collect::<Vec<_>>()
        .join(", ");
    let query = format!(
        "SELECT {columns} FROM \"transaction\" t {} \
        ORDER BY t.date DESC, t.id DESC LIMIT {} OFFSET {}",
        clause.to_sql(),
        pagination.limit(),
        pagination.offset(),
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(clause.parameters.iter()), map_transaction_row)?
        .map(|maybe_transaction| maybe_transaction.map_err(Error::from))
        .collect()
}

/// Sum the income and expenses of `owner_id` over `date_range`.
///
/// # Errors
/// This function will return a [Error::SqlError] there is a SQL error.
pub fn get_aggregate(
    owner_id: UserId,
    date_range: DateRange,
    connection: &Connection,
) -> Result<Aggregate, Error> {
    let mut clause = WhereClause::new(owner_id);
    clause.push_date_range(date_range.start_date, date_range.end_date);

    let query = format!("SELECT t.type, t.amount FROM \"transaction\" t {}", clause.to_sql());

    let mut total_income = Decimal::ZERO;
    let mut total_expenses = Decimal::ZERO;

    let mut statement = connection.prepare(&query)?;
    let rows = statement.query_map(params_from_iter(clause.parameters.iter()), |row| {
        Ok((row.get::<_, TransactionType>(0)?, get_money(row, 1)?))
    })?;

    for row in rows {
        match row? {
            (TransactionType::Income, amount) => total_income += amount,
            (TransactionType::Expense, amount) => total_expenses += amount,
        }
    }

    Ok(Aggregate {
        total_income,
        total_expenses,
        net_income: total_income - total_expenses,
    })
}

/// Sum the expenses of `owner_id` over `date_range`, grouped by category name.
///
/// The result is sorted by category name.
///
/// # Errors
/// This function will return a [Error::SqlError] there is a SQL error.
pub fn get_spending_by_category(
    owner_id: UserId,
    date_range: DateRange,
    connection: &Connection,
) -> Result<Vec<CategorySpending>, Error> {
    let mut clause = WhereClause::new(owner_id);
    clause.push("t.type = ?", Value::Text(TransactionType::Expense.to_string()));
    clause.push_date_range(date_range.start_date, date_range.end_date);

    let query = format!(
        "SELECT c.name, t.amount FROM \"transaction\" t \
        INNER JOIN category c ON c.id = t.category_id {}",
        clause.to_sql()
    );

    let mut totals: BTreeMap<String, Decimal> = BTreeMap::new();

    let mut statement = connection.prepare(&query)?;
    let rows = statement.query_map(params_from_iter(clause.parameters.iter()), |row| {
        Ok((row.get::<_, String>(0)?, get_money(row, 1)?))
    })?;

    for row in rows {
        let (category, amount) = row?;
        *totals.entry(category).or_insert(Decimal::ZERO) += amount;
    }

    Ok(totals
        .into_iter()
        .map(|(category, amount)| CategorySpending { category, amount })
        .collect())
}

#[cfg(test)]
mod tests {
    use rusqlite::Connection;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use time::{Date, macros::date};

    use crate::{
        account::{AccountType, NewAccount, create_account},
        category::create_category,
        database_id::{AccountId, CategoryId},
        db::initialize,
        pagination::Pagination,
        transaction::{
            TransactionType,
            ledger::{NewTransaction, create_transaction},
        },
    };

    use super::{
        Aggregate, CategorySpending, DateRange, TransactionFilter, get_aggregate,
        get_spending_by_category, get_transactions,
    };

    const OWNER: i64 = 1;

    struct Fixture {
        connection: Connection,
        account_id: AccountId,
        groceries: CategoryId,
        rent: CategoryId,
        salary: CategoryId,
    }

    fn get_fixture() -> Fixture {
        let connection = Connection::open_in_memory().unwrap();
        initialize(&connection).unwrap();
        let account = create_account(
            OWNER,
            NewAccount {
                name: "Everyday".to_owned(),
                account_type: AccountType::Checking,
                balance: dec!(0),
            },
            &connection,
        )
        .unwrap();
        let groceries = create_category("Groceries", TransactionType::Expense, &connection)
            .unwrap()
            .id;
        let rent = create_category("Rent", TransactionType::Expense, &connection)
            .unwrap()
            .id;
        let salary = create_category("Salary", TransactionType::Income, &connection)
            .unwrap()
            .id;

        Fixture {
            connection,
            account_id: account.id,
            groceries,
            rent,
            salary,
        }
    }

    fn add(
        fixture: &Fixture,
        category_id: CategoryId,
        description: &str,
        amount: Decimal,
        date: Date,
    ) {
        create_transaction(
            NewTransaction {
                owner_id: OWNER,
                account_id: fixture.account_id,
                category_id,
                budget_id: None,
                description: description.to_owned(),
                amount,
                date,
                note: None,
                recurring_transaction_id: None,
            },
            &fixture.connection,
        )
        .expect("could not create test transaction");
    }

    #[test]
    fn filters_by_description_and_dates() {
        let fixture = get_fixture();
        add(&fixture, fixture.groceries, "Corner store", dec!(10), date!(2025 - 01 - 01));
        add(&fixture, fixture.groceries, "Supermarket", dec!(20), date!(2025 - 01 - 05));
        add(&fixture, fixture.groceries, "Corner store", dec!(30), date!(2025 - 02 - 01));

        let got = get_transactions(
            OWNER,
            &TransactionFilter {
                description: Some("Corner".to_owned()),
                end_date: Some(date!(2025 - 01 - 31)),
                ..Default::default()
            },
            Pagination::default(),
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(got.len(), 1);
        assert_eq!(got[0].amount, dec!(10));
    }

    #[test]
    fn sorts_newest_first_and_pages() {
        let fixture = get_fixture();
        for day in 1..=5 {
            let date = Date::from_calendar_date(2025, time::Month::March, day).unwrap();
            add(&fixture, fixture.groceries, "Shop", Decimal::from(day), date);
        }

        let got = get_transactions(
            OWNER,
            &TransactionFilter::default(),
            Pagination {
                page: 2,
                per_page: 2,
            },
            &fixture.connection,
        )
        .unwrap();

        let dates: Vec<Date> = got.iter().map(|transaction| transaction.date).collect();
        assert_eq!(dates, vec![date!(2025 - 03 - 03), date!(2025 - 03 - 02)]);
    }

    #[test]
    fn excludes_other_owners() {
        let fixture = get_fixture();
        add(&fixture, fixture.groceries, "Shop", dec!(5), date!(2025 - 01 - 01));

        let got = get_transactions(
            OWNER + 1,
            &TransactionFilter::default(),
            Pagination::default(),
            &fixture.connection,
        )
        .unwrap();

        assert!(got.is_empty());
    }

    #[test]
    fn aggregates_income_and_expenses() {
        let fixture = get_fixture();
        add(&fixture, fixture.salary, "Pay", dec!(1000.00), date!(2025 - 01 - 15));
        add(&fixture, fixture.groceries, "Shop", dec!(120.50), date!(2025 - 01 - 16));
        add(&fixture, fixture.rent, "Rent", dec!(400.00), date!(2025 - 01 - 20));
        add(&fixture, fixture.rent, "Rent", dec!(400.00), date!(2025 - 02 - 20));

        let got = get_aggregate(
            OWNER,
            DateRange {
                start_date: Some(date!(2025 - 01 - 01)),
                end_date: Some(date!(2025 - 01 - 31)),
            },
            &fixture.connection,
        )
        .unwrap();

        assert_eq!(
            got,
            Aggregate {
                total_income: dec!(1000.00),
                total_expenses: dec!(520.50),
                net_income: dec!(479.50),
            }
        );
    }

    #[test]
    fn groups_spending_by_category() {
        let fixture = get_fixture();
        add(&fixture, fixture.salary, "Pay", dec!(1000), date!(2025 - 01 - 15));
        add(&fixture, fixture.groceries, "Shop", dec!(20), date!(2025 - 01 - 16));
        add(&fixture, fixture.groceries, "Shop", dec!(15), date!(2025 - 01 - 17));
        add(&fixture, fixture.rent, "Rent", dec!(400), date!(2025 - 01 - 20));

        let got =
            get_spending_by_category(OWNER, DateRange::default(), &fixture.connection).unwrap();

        assert_eq!(
            got,
            vec![
                CategorySpending {
                    category: "Groceries".to_owned(),
                    amount: dec!(35),
                },
                CategorySpending {
                    category: "Rent".to_owned(),
                    amount: dec!(400),
                },
            ]
        );
    }
}
