//! JSON endpoints for categories.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
    http::StatusCode,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::{
    AppState, Error,
    audit_log::AuditLog,
    database_id::{CategoryId, UserId},
    db::lock_connection,
    transaction::TransactionType,
};

use super::core::{
    Category, create_category, delete_category, get_all_categories, update_category,
};

/// The state needed by the category endpoints.
#[derive(Debug, Clone)]
pub struct CategoryState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub audit_log: AuditLog,
}

impl FromRef<AppState> for CategoryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            audit_log: state.ledger.audit_log().clone(),
        }
    }
}

/// The user making a change to a shared category, for the activity log.
#[derive(Debug, Deserialize)]
pub struct ActingUser {
    pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
pub struct CategoryForm {
    pub name: String,
    #[serde(rename = "type")]
    pub transaction_type: TransactionType,
}

pub async fn create_category_endpoint(
    State(state): State<CategoryState>,
    Json(form): Json<CategoryForm>,
) -> Result<(StatusCode, Json<Category>), Error> {
    let connection = lock_connection(&state.db_connection)?;
    let category = create_category(&form.name, form.transaction_type, &connection)?;

    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_categories_endpoint(
    State(state): State<CategoryState>,
) -> Result<Json<Vec<Category>>, Error> {
    let connection = lock_connection(&state.db_connection)?;
    get_all_categories(&connection).map(Json)
}

pub async fn update_category_endpoint(
    State(state): State<CategoryState>,
    Path(category_id): Path<CategoryId>,
    Query(actor): Query<ActingUser>,
    Json(form): Json<CategoryForm>,
) -> Result<Json<Category>, Error> {
    let category = {
        let connection = lock_connection(&state.db_connection)?;
        update_category(category_id, &form.name, form.transaction_type, &connection)?
    };

    state.audit_log.record(
        actor.user_id,
        format!("Category '{}' updated", category.name),
    );

    Ok(Json(category))
}

pub async fn delete_category_endpoint(
    State(state): State<CategoryState>,
    Path(category_id): Path<CategoryId>,
    Query(actor): Query<ActingUser>,
) -> Result<StatusCode, Error> {
    let category = {
        let connection = lock_connection(&state.db_connection)?;
        delete_category(category_id, &connection)?
    };

    state.audit_log.record(
        actor.user_id,
        format!("Category '{}' removed", category.name),
    );

    Ok(StatusCode::NO_CONTENT)
}
