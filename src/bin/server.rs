use std::{fs::OpenOptions, net::SocketAddr, sync::Arc, time::Duration};

use axum::{
    Router,
    extract::{MatchedPath, Request},
};
use axum_server::Handle;
use clap::Parser;
use rusqlite::Connection;
use time::{Time, macros::format_description};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{EnvFilter, Layer, filter, layer::SubscriberExt, util::SubscriberInitExt};

use ledgerkeep::{
    AppState, AuditLog, PaginationConfig, SchedulerConfig, build_router, graceful_shutdown,
    run_audit_log_writer, start_scheduler,
};

/// The REST API server for ledgerkeep.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// File path to the application SQLite database.
    #[arg(long)]
    db_path: String,

    /// The port to serve the API from.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// The canonical name of the local timezone, e.g. "Pacific/Auckland".
    #[arg(long, default_value = "Etc/UTC")]
    timezone: String,

    /// The local time of day to create recurring transactions at, as HH:MM.
    #[arg(long, default_value = "00:00", value_parser = parse_time_of_day)]
    recurring_time: Time,

    /// Do not create due recurring transactions when the server starts.
    #[arg(long)]
    skip_startup_sweep: bool,

    /// How many seconds a recurring transaction sweep may take before it is abandoned.
    #[arg(long, default_value_t = 300)]
    sweep_timeout: u64,

    /// Also write debug logs to this file.
    #[arg(long)]
    debug_log: Option<String>,

    /// How many activity log entries to buffer before dropping new ones.
    #[arg(long, default_value_t = 1024)]
    audit_log_capacity: usize,
}

fn parse_time_of_day(text: &str) -> Result<Time, String> {
    Time::parse(text, format_description!("[hour]:[minute]"))
        .map_err(|error| format!("expected a time as HH:MM: {error}"))
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    setup_logging(args.debug_log.as_deref());

    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));

    let conn = Connection::open(&args.db_path).expect("Could not open the database file.");
    let (audit_log, audit_receiver) = AuditLog::new(args.audit_log_capacity);
    let state = AppState::new(
        conn,
        &args.timezone,
        PaginationConfig::default(),
        audit_log,
    )
    .expect("Could not create the app state.");

    tokio::spawn(run_audit_log_writer(
        audit_receiver,
        state.db_connection.clone(),
    ));

    start_scheduler(
        state.ledger.clone(),
        SchedulerConfig {
            run_at: args.recurring_time,
            local_timezone: args.timezone.clone(),
            sweep_on_startup: !args.skip_startup_sweep,
            sweep_timeout: Duration::from_secs(args.sweep_timeout),
        },
    );

    let handle = Handle::new();
    tokio::spawn(graceful_shutdown(handle.clone()));

    let router = add_tracing_layer(build_router(state));

    tracing::info!("HTTP server listening on {}", addr);
    axum_server::bind(addr)
        .handle(handle)
        .serve(router.into_make_service())
        .await
        .expect("The server stopped unexpectedly.");
}

fn setup_logging(debug_log_path: Option<&str>) {
    let stdout_log = tracing_subscriber::fmt::layer()
        .pretty()
        .with_filter(EnvFilter::from_default_env().add_directive(filter::LevelFilter::INFO.into()));

    let debug_log = debug_log_path.map(|path| {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("Could not create log file");

        tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(Arc::new(log_file))
            .with_filter(filter::LevelFilter::DEBUG)
    });

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(debug_log)
        .init();
}

fn add_tracing_layer(router: Router) -> Router {
    let tracing_layer = TraceLayer::new_for_http()
        .make_span_with(|req: &Request| {
            let method = req.method();
            let uri = req.uri();

            let matched_path = req
                .extensions()
                .get::<MatchedPath>()
                .map(|matched_path| matched_path.as_str());

            tracing::debug_span!("request", %method, %uri, matched_path)
        })
        // By default, `TraceLayer` will log 5xx responses but we're doing our specific
        // logging of errors so disable that
        .on_failure(());

    router.layer(tracing_layer)
}
