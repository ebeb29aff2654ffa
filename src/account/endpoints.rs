//! JSON endpoints for accounts.
//!
//! Balances cannot be edited here. They change only through transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::{
    AppState, Error, Ledger,
    database_id::{AccountId, UserId},
    db::lock_connection,
};

use super::core::{
    Account, AccountUpdate, NewAccount, create_account, get_accounts, get_total_account_balance,
    update_account,
};

/// The state needed by the account endpoints.
#[derive(Debug, Clone)]
pub struct AccountState {
    pub ledger: Ledger,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for AccountState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            ledger: state.ledger.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TotalBalance {
    pub total_balance: Decimal,
}

pub async fn create_account_endpoint(
    State(state): State<AccountState>,
    Path(user_id): Path<UserId>,
    Json(account): Json<NewAccount>,
) -> Result<(StatusCode, Json<Account>), Error> {
    let account = {
        let connection = lock_connection(&state.db_connection)?;
        create_account(user_id, account, &connection)?
    };

    state
        .ledger
        .audit_log()
        .record(user_id, format!("New account '{}' created", account.name));

    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_accounts_endpoint(
    State(state): State<AccountState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Account>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    get_accounts(user_id, &connection).map(Json)
}

pub async fn update_account_endpoint(
    State(state): State<AccountState>,
    Path(account_id): Path<AccountId>,
    Json(update): Json<AccountUpdate>,
) -> Result<Json<Account>, Error> {
    let account = {
        let connection = lock_connection(&state.db_connection)?;
        update_account(account_id, update, &connection)?
    };

    state
        .ledger
        .audit_log()
        .record(account.owner_id, format!("Account '{}' updated", account.name));

    Ok(Json(account))
}

pub async fn delete_account_endpoint(
    State(state): State<AccountState>,
    Path(account_id): Path<AccountId>,
) -> Result<StatusCode, Error> {
    state.ledger.delete_account(account_id)?;

    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_total_balance_endpoint(
    State(state): State<AccountState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<TotalBalance>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    let total_balance = get_total_account_balance(user_id, &connection)?;

    Ok(Json(TotalBalance { total_balance }))
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
        endpoints::format_endpoint, pagination::PaginationConfig,
    };

    fn get_test_server() -> TestServer {
        let (audit_log, _) = AuditLog::new(16);
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "Etc/UTC",
            PaginationConfig::default(),
            audit_log,
        )
        .unwrap();

        TestServer::new(build_router(state))
    }

    #[tokio::test]
    async fn create_list_update_delete() {
        let server = get_test_server();

        let response = server
            .post(&format_endpoint(endpoints::USER_ACCOUNTS, 3))
            .json(&json!({ "name": "Visa", "type": "credit_card", "balance": "-120.50" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let account: Account = response.json();
        assert_eq!(account.balance, dec!(-120.50));

        let updated: Account = server
            .put(&format_endpoint(endpoints::ACCOUNT, account.id))
            .json(&json!({ "name": "Old Visa", "type": "credit_card", "is_active": false }))
            .await
            .json();
        assert_eq!(updated.name, "Old Visa");
        assert!(!updated.is_active);
        assert_eq!(updated.balance, dec!(-120.50));

        let total: serde_json::Value = server
            .get(&format_endpoint(endpoints::USER_TOTAL_BALANCE, 3))
            .await
            .json();
        assert_eq!(total["total_balance"], "0");

        server
            .delete(&format_endpoint(endpoints::ACCOUNT, account.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        let accounts: Vec<Account> = server
            .get(&format_endpoint(endpoints::USER_ACCOUNTS, 3))
            .await
            .json();
        assert!(accounts.is_empty());
    }

    #[tokio::test]
    async fn unknown_account_type_is_rejected() {
        let server = get_test_server();

        let response = server
            .post(&format_endpoint(endpoints::USER_ACCOUNTS, 3))
            .json(&json!({ "name": "Jar", "type": "piggy_bank" }))
            .await;

        assert!(response.status_code().is_client_error());
    }

    #[tokio::test]
    async fn deleting_missing_account_is_not_found() {
        let server = get_test_server();

        server
            .delete(&format_endpoint(endpoints::ACCOUNT, 42))
            .await
            .assert_status_not_found();
    }
}
