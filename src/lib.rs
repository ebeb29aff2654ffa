//! Ledgerkeep tracks accounts, categorised transactions, budgets and recurring
//! transactions for personal finances.
//!
//! The [Ledger] keeps every account balance and budget amount in step with the
//! transactions posted against it, and the recurring transaction scheduler
//! creates each due transaction at most once per day.
//!
//! This library provides a JSON REST API over the ledger.

use std::{net::SocketAddr, time::Duration};

use axum_server::Handle;
use tokio::signal;

mod account;
mod app_state;
mod audit_log;
mod budget;
mod category;
mod database_id;
mod db;
mod endpoints;
mod error;
mod logging;
mod money;
mod pagination;
mod recurring;
mod routing;
mod timezone;
mod transaction;

pub use app_state::AppState;
pub use audit_log::{AuditEntry, AuditLog, run_audit_log_writer};
pub use db::initialize as initialize_db;
pub use error::Error;
pub use logging::{LOG_BODY_LENGTH_LIMIT, logging_middleware};
pub use pagination::PaginationConfig;
pub use recurring::{SchedulerConfig, SweepReport, run_recurring_sweep, start_scheduler};
pub use routing::build_router;
pub use timezone::get_local_offset;
pub use transaction::Ledger;

/// An async task that waits for either the ctrl+c or terminate signal, whichever comes first, and
/// then signals the server to shut down gracefully.
///
/// `handle` is a handle to an Axum `Server`.
pub async fn graceful_shutdown(handle: Handle<SocketAddr>) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::debug!("Received ctrl+c signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
        _ = terminate => {
            tracing::debug!("Received terminate signal.");
            handle.graceful_shutdown(Some(Duration::from_secs(1)));
        },
    }
}
