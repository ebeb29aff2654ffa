//! Runs the recurring transaction sweep once a day in the background.

use std::time::Duration;

use time::{Date, OffsetDateTime, Time, UtcOffset};
use tokio::task::JoinHandle;

use crate::{Error, Ledger, timezone::get_local_offset};

use super::materializer::{SweepReport, run_recurring_sweep};

/// Controls when the sweep runs.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// The local time of day to run the sweep at.
    pub run_at: Time,
    /// The canonical timezone that decides what "today" is, e.g. "Pacific/Auckland".
    pub local_timezone: String,
    /// Whether to sweep once straight away when the scheduler starts.
    pub sweep_on_startup: bool,
    /// How long to wait for a sweep before giving up on it.
    pub sweep_timeout: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            run_at: Time::MIDNIGHT,
            local_timezone: "Etc/UTC".to_owned(),
            sweep_on_startup: true,
            sweep_timeout: Duration::from_secs(300),
        }
    }
}

type SweepTask = JoinHandle<Result<SweepReport, Error>>;

/// Start the daily sweep on the tokio runtime.
///
/// The scheduler owns a clone of `ledger` and runs until the runtime shuts down.
///
/// The start-up sweep only covers today's local date. Due dates that pass while
/// the server is down are not backfilled.
pub fn start_scheduler(ledger: Ledger, config: SchedulerConfig) -> JoinHandle<()> {
    tokio::spawn(run_scheduler(ledger, config))
}

async fn run_scheduler(ledger: Ledger, config: SchedulerConfig) {
    let mut unfinished: Option<SweepTask> = None;

    if config.sweep_on_startup {
        tracing::info!("Running start-up recurring transaction sweep");
        unfinished = run_sweep(&ledger, &config, unfinished).await;
    }

    loop {
        let now = local_now(&config.local_timezone);
        let wait = duration_until_next_run(now, config.run_at);
        tracing::info!(
            "Next recurring transaction sweep at {} (in {}s)",
            now + wait,
            wait.as_secs()
        );

        tokio::time::sleep(wait).await;
        unfinished = run_sweep(&ledger, &config, unfinished).await;
    }
}

/// Run one sweep on the blocking thread pool.
///
/// Returns the sweep task if it timed out, so that the next tick can skip
/// instead of starting a second sweep alongside it.
async fn run_sweep(
    ledger: &Ledger,
    config: &SchedulerConfig,
    unfinished: Option<SweepTask>,
) -> Option<SweepTask> {
    if let Some(task) = unfinished {
        if !task.is_finished() {
            tracing::warn!("The previous recurring transaction sweep is still running, skipping");
            return Some(task);
        }
    }

    let now = local_now(&config.local_timezone);
    let today = now.date();
    let offset = now.offset();
    let sweep_ledger = ledger.clone();

    let mut task =
        tokio::task::spawn_blocking(move || run_recurring_sweep(&sweep_ledger, today, offset));

    match tokio::time::timeout(config.sweep_timeout, &mut task).await {
        Ok(Ok(Ok(report))) => {
            log_report(today, &report);
            None
        }
        Ok(Ok(Err(error))) => {
            tracing::error!("Recurring transaction sweep for {today} failed: {error}");
            None
        }
        Ok(Err(error)) => {
            tracing::error!("Recurring transaction sweep for {today} panicked: {error}");
            None
        }
        Err(_) => {
            tracing::error!(
                "Recurring transaction sweep for {today} did not finish within {}s",
                config.sweep_timeout.as_secs()
            );
            Some(task)
        }
    }
}

fn log_report(today: Date, report: &SweepReport) {
    tracing::info!(
        "Recurring transaction sweep for {today}: {} created, {} already created, {} failed",
        report.created.len(),
        report.already_materialized,
        report.failures.len()
    );
}

/// The current time in `timezone`, or UTC if the timezone is not known.
fn local_now(timezone: &str) -> OffsetDateTime {
    let offset = get_local_offset(timezone).unwrap_or_else(|| {
        tracing::warn!("Unknown timezone \"{timezone}\", using UTC for the recurring sweep");
        UtcOffset::UTC
    });

    OffsetDateTime::now_utc().to_offset(offset)
}

/// How long to wait from `now` until the next `run_at`.
///
/// If `now` is exactly `run_at`, the next run is a day later.
pub fn duration_until_next_run(now: OffsetDateTime, run_at: Time) -> Duration {
    let today_run = now.replace_time(run_at);
    let next_run = if today_run > now {
        today_run
    } else {
        today_run + time::Duration::DAY
    };

    Duration::try_from(next_run - now).unwrap_or(Duration::ZERO)
}
