//! A best-effort record of what users changed.
//!
//! [AuditLog::record] never blocks and never fails: entries go onto a bounded
//! channel and a background task writes them to the `activity_log` table.

use std::sync::{Arc, Mutex};

use axum::{
    Json,
    extract::{FromRef, Path, Query, State},
};
use rusqlite::{Connection, Row, params_from_iter, types::Value};
use serde::{Deserialize, Serialize};
use time::{Date, OffsetDateTime};
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};

use crate::{
    AppState, Error,
    database_id::UserId,
    db::lock_connection,
    pagination::{PageParams, Pagination, PaginationConfig},
    transaction::DateRange,
};

/// One line in a user's activity log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub owner_id: UserId,
    pub message: String,
    pub created_at: OffsetDateTime,
}

/// A cloneable handle for recording activity log entries.
#[derive(Debug, Clone)]
pub struct AuditLog {
    sender: Sender<AuditEntry>,
}

impl AuditLog {
    /// Create a handle that buffers up to `capacity` entries, and the receiver
    /// that [run_audit_log_writer] drains.
    pub fn new(capacity: usize) -> (Self, Receiver<AuditEntry>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        (Self { sender }, receiver)
    }

    /// Queue `message` for `owner_id`.
    ///
    /// If the buffer is full or the writer has stopped, the entry is dropped with a warning.
    pub fn record(&self, owner_id: UserId, message: impl Into<String>) {
        let entry = AuditEntry {
            owner_id,
            message: message.into(),
            created_at: OffsetDateTime::now_utc(),
        };

        match self.sender.try_send(entry) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                tracing::warn!("Audit log is full, dropping entry: {}", entry.message);
            }
            Err(TrySendError::Closed(entry)) => {
                tracing::warn!("Audit log writer has stopped, dropping entry: {}", entry.message);
            }
        }
    }
}

/// Write entries from `receiver` to the database until every [AuditLog] handle is dropped.
pub async fn run_audit_log_writer(
    mut receiver: Receiver<AuditEntry>,
    db_connection: Arc<Mutex<Connection>>,
) {
    while let Some(entry) = receiver.recv().await {
        let result = lock_connection(&db_connection)
            .and_then(|connection| insert_audit_entry(&entry, &connection));

        if let Err(error) = result {
            tracing::error!("Could not write audit log entry \"{}\": {error}", entry.message);
        }
    }

    tracing::debug!("Audit log writer stopped.");
}

fn insert_audit_entry(entry: &AuditEntry, connection: &Connection) -> Result<(), Error> {
    connection.execute(
        "INSERT INTO activity_log (owner_id, message, created_at) VALUES (?1, ?2, ?3)",
        (entry.owner_id, &entry.message, entry.created_at),
    )?;

    Ok(())
}

pub fn create_activity_log_table(connection: &Connection) -> Result<(), rusqlite::Error> {
    connection.execute(
        "CREATE TABLE IF NOT EXISTS activity_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            owner_id INTEGER NOT NULL,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        (),
    )?;

    Ok(())
}

fn map_row_to_entry(row: &Row) -> Result<AuditEntry, rusqlite::Error> {
    Ok(AuditEntry {
        owner_id: row.get(0)?,
        message: row.get(1)?,
        created_at: row.get(2)?,
    })
}

/// Get a page of the activity log of `owner_id`, newest first.
///
/// `date_range` is compared against the UTC date each entry was recorded on.
///
/// # Errors
/// Returns an [Error::SqlError] if the query fails.
pub fn get_activity_log(
    owner_id: UserId,
    date_range: DateRange,
    pagination: Pagination,
    connection: &Connection,
) -> Result<Vec<AuditEntry>, Error> {
    let mut conditions = vec!["owner_id = ?1".to_owned()];
    let mut parameters = vec![Value::Integer(owner_id)];

    if let Some(start_date) = date_range.start_date {
        parameters.push(Value::Text(start_date.to_string()));
        conditions.push(format!("date(created_at) >= ?{}", parameters.len()));
    }

    if let Some(end_date) = date_range.end_date {
        parameters.push(Value::Text(end_date.to_string()));
        conditions.push(format!("date(created_at) <= ?{}", parameters.len()));
    }

    let query = format!(
        "SELECT owner_id, message, created_at FROM activity_log
        WHERE {} ORDER BY id DESC LIMIT {} OFFSET {}",
        conditions.join(" AND "),
        pagination.limit(),
        pagination.offset(),
    );

    connection
        .prepare(&query)?
        .query_map(params_from_iter(parameters.iter()), map_row_to_entry)?
        .map(|maybe_entry| maybe_entry.map_err(Error::from))
        .collect()
}

/// The state needed to read the activity log.
#[derive(Debug, Clone)]
pub struct ActivityLogState {
    pub db_connection: Arc<Mutex<Connection>>,
    pub pagination_config: PaginationConfig,
}

impl FromRef<AppState> for ActivityLogState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            db_connection: state.db_connection.clone(),
            pagination_config: state.pagination_config.clone(),
        }
    }
}

/// The query string for reading the activity log.
#[derive(Debug, Default, Deserialize)]
pub struct ActivityLogQuery {
    start_date: Option<Date>,
    end_date: Option<Date>,
    page: Option<u64>,
    per_page: Option<u64>,
}

pub async fn get_activity_log_endpoint(
    State(state): State<ActivityLogState>,
    Path(user_id): Path<UserId>,
    Query(query): Query<ActivityLogQuery>,
) -> Result<Json<Vec<AuditEntry>>, Error> {
    let pagination = PageParams {
        page: query.page,
        per_page: query.per_page,
    }
    .resolve(&state.pagination_config);
    let date_range = DateRange {
        start_date: query.start_date,
        end_date: query.end_date,
    };

    let connection = lock_connection(&state.db_connection)?;
    get_activity_log(user_id, date_range, pagination, &connection).map(Json)
}
