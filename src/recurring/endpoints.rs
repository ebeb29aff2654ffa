//! JSON endpoints for recurring transactions.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error,
    audit_log::AuditLog,
    database_id::{RecurringTransactionId, UserId},
    db::lock_connection,
};

use super::core::{
    RecurringTransaction, RecurringTransactionForm, create_recurring_transaction,
    delete_recurring_transaction, get_recurring_transactions, update_recurring_transaction,
};

/// The state needed by the recurring transaction endpoints.
#[derive(Debug, Clone)]
pub struct RecurringTransactionState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub audit_log: AuditLog,
}

impl FromRef<AppState> for RecurringTransactionState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            audit_log: state.ledger.audit_log().clone(),
        }
    }
}

pub async fn create_recurring_transaction_endpoint(
    State(state): State<RecurringTransactionState>,
    Path(user_id): Path<UserId>,
    Json(form): Json<RecurringTransactionForm>,
) -> Result<(StatusCode, Json<RecurringTransaction>), Error> {
    let template = {
        let connection = lock_connection(&state.db_connection)?;
        create_recurring_transaction(user_id, form, &connection)?
    };

    state.audit_log.record(
        user_id,
        format!("New recurring transaction '{}' created", template.description),
    );

    Ok((StatusCode::CREATED, Json(template)))
}

pub async fn get_recurring_transactions_endpoint(
    State(state): State<RecurringTransactionState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<RecurringTransaction>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    get_recurring_transactions(user_id, &connection).map(Json)
}

pub async fn update_recurring_transaction_endpoint(
    State(state): State<RecurringTransactionState>,
    Path(recurring_transaction_id): Path<RecurringTransactionId>,
    Json(form): Json<RecurringTransactionForm>,
) -> Result<Json<RecurringTransaction>, Error> {
    let template = {
        let connection = lock_connection(&state.db_connection)?;
        update_recurring_transaction(recurring_transaction_id, form, &connection)?
    };

    state.audit_log.record(
        template.owner_id,
        format!("Recurring transaction '{}' updated", template.description),
    );

    Ok(Json(template))
}

pub async fn delete_recurring_transaction_endpoint(
    State(state): State<RecurringTransactionState>,
    Path(recurring_transaction_id): Path<RecurringTransactionId>,
) -> Result<StatusCode, Error> {
    let template = {
        let connection = lock_connection(&state.db_connection)?;
        delete_recurring_transaction(recurring_transaction_id, &connection)?
    };

    state.audit_log.record(
        template.owner_id,
        format!("Recurring transaction '{}' removed", template.description),
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use serde_json::json;

    use crate::{
        AppState, audit_log::AuditLog, build_router, endpoints, endpoints::format_endpoint,
        pagination::PaginationConfig,
        recurring::{Frequency, RecurringTransaction},
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

    async fn set_up(server: &TestServer) -> serde_json::Value {
        let account: serde_json::Value = server
            .post(&format_endpoint(endpoints::USER_ACCOUNTS, 1))
            .json(&json!({ "name": "Everyday", "type": "checking" }))
            .await
            .json();
        let category: serde_json::Value = server
            .post(endpoints::CATEGORIES)
            .json(&json!({ "name": "Rent", "type": "expense" }))
            .await
            .json();

        json!({
            "account_id": account["id"],
            "category_id": category["id"],
            "description": "Rent",
            "amount": "450",
            "frequency": "monthly",
            "recurring_date": 1,
        })
    }

    #[tokio::test]
    async fn create_update_list_delete() {
        let server = get_test_server();
        let mut form = set_up(&server).await;

        let response = server
            .post(&format_endpoint(endpoints::USER_RECURRING_TRANSACTIONS, 1))
            .json(&form)
            .await;
        response.assert_status(StatusCode::CREATED);
        let template: RecurringTransaction = response.json();

        form["frequency"] = json!("yearly");
        let updated: RecurringTransaction = server
            .put(&format_endpoint(endpoints::RECURRING_TRANSACTION, template.id))
            .json(&form)
            .await
            .json();
        assert_eq!(updated.frequency, Frequency::Yearly);

        let templates: Vec<RecurringTransaction> = server
            .get(&format_endpoint(endpoints::USER_RECURRING_TRANSACTIONS, 1))
            .await
            .json();
        assert_eq!(templates, vec![updated]);

        server
            .delete(&format_endpoint(endpoints::RECURRING_TRANSACTION, template.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server
            .delete(&format_endpoint(endpoints::RECURRING_TRANSACTION, template.id))
            .await
            .assert_status_not_found();
    }

    #[tokio::test]
    async fn rejects_recurring_date_out_of_range() {
        let server = get_test_server();
        let mut form = set_up(&server).await;
        form["recurring_date"] = json!(32);

        server
            .post(&format_endpoint(endpoints::USER_RECURRING_TRANSACTIONS, 1))
            .json(&form)
            .await
            .assert_status_bad_request();
    }
}
