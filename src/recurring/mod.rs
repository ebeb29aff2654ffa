//! Recurring transactions and the daily sweep that turns them into transactions.

mod core;
mod endpoints;
mod materializer;
mod scheduler;

pub use core::{
    Frequency, RecurringTransaction, RecurringTransactionForm, create_recurring_transaction,
    create_recurring_transaction_table, delete_recurring_transaction,
    get_all_recurring_transactions, get_recurring_transactions, update_recurring_transaction,
};
pub use endpoints::{
    create_recurring_transaction_endpoint, delete_recurring_transaction_endpoint,
    get_recurring_transactions_endpoint, update_recurring_transaction_endpoint,
};
pub use materializer::{SweepReport, TemplateFailure, is_due, run_recurring_sweep};
pub use scheduler::{SchedulerConfig, duration_until_next_run, start_scheduler};
