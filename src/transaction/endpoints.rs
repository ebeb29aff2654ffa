//! JSON endpoints for transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;
use time::Date;

use crate::{
    AppState, Error, Ledger,
    database_id::{AccountId, BudgetId, CategoryId, TransactionId, UserId},
    db::lock_connection,
    pagination::{PageParams, PaginationConfig},
};

use super::{
    core::Transaction,
    ledger::{NewTransaction, TransactionUpdate},
    query::{
        Aggregate, CategorySpending, DateRange, TransactionFilter, get_aggregate,
        get_spending_by_category, get_transactions,
    },
};

/// The state needed by the transaction endpoints.
#[derive(Debug, Clone)]
pub struct TransactionState {
    pub ledger: Ledger,
    pub db_connection: Arc<Mutex<Connection>>,
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for TransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            ledger: state.ledger.clone(),
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query string for listing transactions.
#[derive(Debug, Default, Deserialize)]
pub struct TransactionsQuery {
    description: Option<String>,
    account_id: Option<AccountId>,
    category_id: Option<CategoryId>,
    budget_id: Option<BudgetId>,
    start_date: Option<Date>,
    end_date: Option<Date>,
    page: Option<u64>,
    per_page: Option<u64>,
}

pub async fn create_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(user_id): Path<UserId>,
    Json(transaction): Json<NewTransaction>,
) -> Result<(StatusCode, Json<Transaction>), Error> {
    let transaction = state.ledger.create_transaction(NewTransaction {
        owner_id: user_id,
        recurring_transaction_id: None,
        ..transaction
    })?;

    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn get_transactions_endpoint(
    State(state): State<TransactionState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<TransactionsQuery>,
) -> Result<Json<Vec<Transaction>>, Error> {
    let pagination = PageParams {
        page: query.page,
        per_page: query.per_page,
    }
    .resolve(&state.pagination_config);
    let filter = TransactionFilter {
        description: query.description,
        account_id: query.account_id,
        category_id: query.category_id,
        budget_id: query.budget_id,
        start_date: query.start_date,
        end_date: query.end_date,
    };

    let connection = lock_connection(&state.db_connection)?;
    get_transactions(user_id, &filter, pagination, &connection).map(Json)
}

pub async fn update_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<TransactionId>,
    Json(update): Json<TransactionUpdate>,
) -> Result<Json<Transaction>, Error> {
    state
        .ledger
        .update_transaction(transaction_id, update)
        .map(Json)
}

pub async fn delete_transaction_endpoint(
    State(state): State<TransactionState>,
    Path(transaction_id): Path<TransactionId>,
) -> Result<StatusCode, Error> {
    state.ledger.delete_transaction(transaction_id)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_aggregate_endpoint(
    State(state): State<TransactionState>,
    Path(user_id): Path<UserId>,
    Query(date_range): Query<DateRange>,
) -> Result<Json<Aggregate>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    get_aggregate(user_id, date_range, &connection).map(Json)
}

pub async fn get_spending_endpoint(
    State(state): State<TransactionState>,
    Path(user_id): Path<UserId>,
    Query(date_range): Query<DateRange>,
) -> Result<Json<Vec<CategorySpending>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    get_spending_by_category(user_id, date_range, &connection).map(Json)
}
