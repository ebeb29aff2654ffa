//! JSON endpoints for budgets.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, State},
    http::StatusCode,
};
use rusqlite::Connection;

use crate::{
    AppState, Error, Ledger,
    database_id::{BudgetId, UserId},
    db::lock_connection,
};

use super::core::{Budget, BudgetForm, create_budget, delete_budget, get_budgets};

/// The state needed by the budget endpoints.
#[derive(Debug, Clone)]
pub struct BudgetState {
    pub ledger: Ledger,
    pub db_connection: Arc<Mutex<Connection>>,
}

impl FromRef<AppState> for BudgetState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            ledger: state.ledger.clone(),
            db_connection: state.db_connection.clone(),
        }
    }
}

pub async fn create_budget_endpoint(
    State(state): State<BudgetState>,
    Path(user_id): Path<UserId>,
    Json(form): Json<BudgetForm>,
) -> Result<(StatusCode, Json<Budget>), Error> {
    let budget = {
        let connection = lock_connection(&state.db_connection)?;
        create_budget(user_id, &form.name, form.amount, &connection)?
    };

    state
        .ledger
        .audit_log()
        .record(user_id, format!("New budget '{}' created", budget.name));

    Ok((StatusCode::CREATED, Json(budget)))
}

pub async fn get_budgets_endpoint(
    State(state): State<BudgetState>,
    Path(user_id): Path<UserId>,
) -> Result<Json<Vec<Budget>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    get_budgets(user_id, &connection).map(Json)
}

/// Rename a budget and set its target, see [Ledger::update_budget].
pub async fn update_budget_endpoint(
    State(state): State<BudgetState>,
    Path(budget_id): Path<BudgetId>,
    Json(form): Json<BudgetForm>,
) -> Result<Json<Budget>, Error> {
    state
        .ledger
        .update_budget(budget_id, &form.name, form.amount)
        .map(Json)
}

pub async fn delete_budget_endpoint(
    State(state): State<BudgetState>,
    Path(budget_id): Path<BudgetId>,
) -> Result<StatusCode, Error> {
    let budget = {
        let connection = lock_connection(&state.db_connection)?;
        delete_budget(budget_id, &connection)?
    };

    state
        .ledger
        .audit_log()
        .record(budget.owner_id, format!("Budget '{}' removed", budget.name));

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use rusqlite::Connection;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use tokio::sync::mpsc::Receiver;

    use crate::{
        AppState,
        audit_log::{AuditEntry, AuditLog},
        budget::Budget,
        build_router, endpoints,
        endpoints::format_endpoint,
        pagination::PaginationConfig,
    };

    fn get_test_server() -> (TestServer, Receiver<AuditEntry>) {
        let (audit_log, receiver) = AuditLog::new(16);
        let state = AppState::new(
            Connection::open_in_memory().unwrap(),
            "Etc/UTC",
            PaginationConfig::default(),
            audit_log,
        )
        .unwrap();

        (
            TestServer::new(build_router(state)),
            receiver,
        )
    }

    #[tokio::test]
    async fn budget_lifecycle_is_audited() {
        let (server, mut receiver) = get_test_server();

        let response = server
            .post(&format_endpoint(endpoints::USER_BUDGETS, 1))
            .json(&json!({ "name": "Food", "amount": "500" }))
            .await;
        response.assert_status(StatusCode::CREATED);
        let budget: Budget = response.json();

        let updated: Budget = server
            .put(&format_endpoint(endpoints::BUDGET, budget.id))
            .json(&json!({ "name": "Groceries", "amount": "650" }))
            .await
            .json();
        assert_eq!(updated.amount, dec!(650));

        server
            .delete(&format_endpoint(endpoints::BUDGET, budget.id))
            .await
            .assert_status(StatusCode::NO_CONTENT);

        let budgets: Vec<Budget> = server
            .get(&format_endpoint(endpoints::USER_BUDGETS, 1))
            .await
            .json();
        assert!(budgets.is_empty());

        let mut messages = Vec::new();
        while let Ok(entry) = receiver.try_recv() {
            messages.push(entry.message);
        }
        assert_eq!(
            messages,
            vec![
                "New budget 'Food' created".to_owned(),
                "Budget 'Groceries' updated".to_owned(),
                "Budget 'Groceries' removed".to_owned(),
            ]
        );
    }

    #[tokio::test]
    async fn updating_missing_budget_is_not_found() {
        let (server, _receiver) = get_test_server();

        server
            .put(&format_endpoint(endpoints::BUDGET, 9))
            .json(&json!({ "name": "Nothing", "amount": "1" }))
            .await
            .assert_status_not_found();
    }
}
