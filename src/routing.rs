//! Application router configuration.

use axum::{
    Json, Router,
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::{get, put},
};
use serde_json::json;

use crate::{
    AppState,
    account::{
        create_account_endpoint, delete_account_endpoint, get_accounts_endpoint,
        get_total_balance_endpoint, update_account_endpoint,
    },
    audit_log::get_activity_log_endpoint,
    budget::{
        create_budget_endpoint, delete_budget_endpoint, get_budgets_endpoint,
        update_budget_endpoint,
    },
    category::{
        create_category_endpoint, delete_category_endpoint, get_categories_endpoint,
        update_category_endpoint,
    },
    endpoints,
    logging::logging_middleware,
    recurring::{
        create_recurring_transaction_endpoint, delete_recurring_transaction_endpoint,
        get_recurring_transactions_endpoint, update_recurring_transaction_endpoint,
    },
    transaction::{
        create_transaction_endpoint, delete_transaction_endpoint, get_aggregate_endpoint,
        get_spending_endpoint, get_transactions_endpoint, update_transaction_endpoint,
    },
};

/// Return a router with all the app's routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route(
            endpoints::USER_TRANSACTIONS,
            get(get_transactions_endpoint).post(create_transaction_endpoint),
        )
        .route(
            endpoints::USER_TRANSACTIONS_AGGREGATE,
            get(get_aggregate_endpoint),
        )
        .route(
            endpoints::USER_TRANSACTIONS_SPENDING,
            get(get_spending_endpoint),
        )
        .route(
            endpoints::TRANSACTION,
            put(update_transaction_endpoint).delete(delete_transaction_endpoint),
        )
        .route(
            endpoints::USER_ACCOUNTS,
            get(get_accounts_endpoint).post(create_account_endpoint),
        )
        .route(
            endpoints::USER_TOTAL_BALANCE,
            get(get_total_balance_endpoint),
        )
        .route(
            endpoints::ACCOUNT,
            put(update_account_endpoint).delete(delete_account_endpoint),
        )
        .route(
            endpoints::USER_BUDGETS,
            get(get_budgets_endpoint).post(create_budget_endpoint),
        )
        .route(
            endpoints::BUDGET,
            put(update_budget_endpoint).delete(delete_budget_endpoint),
        )
        .route(
            endpoints::CATEGORIES,
            get(get_categories_endpoint).post(create_category_endpoint),
        )
        .route(
            endpoints::CATEGORY,
            put(update_category_endpoint).delete(delete_category_endpoint),
        )
        .route(
            endpoints::USER_RECURRING_TRANSACTIONS,
            get(get_recurring_transactions_endpoint).post(create_recurring_transaction_endpoint),
        )
        .route(
            endpoints::RECURRING_TRANSACTION,
            put(update_recurring_transaction_endpoint).delete(delete_recurring_transaction_endpoint),
        )
        .route(endpoints::USER_ACTIVITY_LOG, get(get_activity_log_endpoint))
        .fallback(get_404_not_found)
        .layer(middleware::from_fn(logging_middleware))
        .with_state(state)
}

async fn get_404_not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "the requested resource could not be found" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use crate::{
        AppState, account::Account, audit_log::AuditLog, build_router, endpoints,
        endpoints::format_endpoint, pagination::PaginationConfig, transaction::Transaction,
    };

    #[tokio::test]
    async fn unknown_route_is_json_not_found() {
        let (audit_log, _) = AuditLog::new(4);
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "Etc/UTC",
            PaginationConfig::default(),
            audit_log,
        )
        .unwrap();
        let server = TestServer::new(build_router(state));

        let response = server.get("/api/coffee").await;

        response.assert_status_not_found();
        response.assert_json(&json!({ "error": "the requested resource could not be found" }));
    }

    #[tokio::test]
    async fn moving_transaction_between_accounts() {
        let (audit_log, _) = AuditLog::new(16);
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "Etc/UTC",
            PaginationConfig::default(),
            audit_log,
        )
        .unwrap();
        let server = TestServer::new(build_router(state));
        let mut account_ids = Vec::new();
        for name in ["X", "Y"] {
            let account: Account = server
                .post(&format_endpoint(endpoints::USER_ACCOUNTS, 1))
                .json(&json!({ "name": name, "type": "savings", "balance": "100" }))
                .await
                .json();
            account_ids.push(account.id);
        }
        let category: serde_json::Value = server
            .post(endpoints::CATEGORIES)
            .json(&json!({ "name": "Salary", "type": "income" }))
            .await
            .json();
        let transaction: Transaction = server
            .post(&format_endpoint(endpoints::USER_TRANSACTIONS, 1))
            .json(&json!({
                "account_id": account_ids[0],
                "category_id": category["id"],
                "description": "Pay",
                "amount": "50",
                "date": "2025-06-01",
            }))
            .await
            .json();

        server
            .put(&format_endpoint(endpoints::TRANSACTION, transaction.id))
            .json(&json!({
                "account_id": account_ids[1],
                "category_id": category["id"],
                "description": "Pay",
                "amount": "50",
                "date": "2025-06-01",
            }))
            .await
            .assert_status_ok();

        let accounts: Vec<Account> = server
            .get(&format_endpoint(endpoints::USER_ACCOUNTS, 1))
            .await
            .json();
        let balances: Vec<_> = accounts.iter().map(|account| account.balance).collect();
        assert_eq!(balances, vec![dec!(100), dec!(150)]);
    }

    #[tokio::test]
    async fn category_in_use_cannot_be_deleted() {
        let (audit_log, _) = AuditLog::new(16);
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "Etc/UTC",
            PaginationConfig::default(),
            audit_log,
        )
        .unwrap();
        let server = TestServer::new(build_router(state));
        let account: Account = server
            .post(&format_endpoint(endpoints::USER_ACCOUNTS, 1))
            .json(&json!({ "name": "Everyday", "type": "checking", "balance": "100" }))
            .await
            .json();
        let category: serde_json::Value = server
            .post(endpoints::CATEGORIES)
            .json(&json!({ "name": "Rent", "type": "expense" }))
            .await
            .json();
        server
            .post(&format_endpoint(endpoints::USER_TRANSACTIONS, 1))
            .json(&json!({
                "account_id": account.id,
                "category_id": category["id"],
                "description": "June rent",
                "amount": "60",
                "date": "2025-06-01",
            }))
            .await
            .assert_status(StatusCode::CREATED);

        let category_id = category["id"].as_i64().unwrap();
        let response = server
            .delete(&format_endpoint(endpoints::CATEGORY, category_id))
            .add_query_param("user_id", 1)
            .await;

        response.assert_status(StatusCode::CONFLICT);
        response.assert_json(&json!({
            "error": "the category \"Rent\" is used by transactions and cannot be deleted"
        }));
    }
}
