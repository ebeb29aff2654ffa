//! Transactions and the ledger that keeps balances in step with them.
//!
//! This module contains:
//! - The `Transaction` model and its table
//! - The [Ledger], the only code that changes account balances and budget amounts
//! - Read-only queries for listing and totalling transactions
//! - The JSON endpoints for transactions

pub(crate) mod core;
mod endpoints;
pub(crate) mod ledger;
mod query;

pub use core::{Transaction, TransactionType, create_transaction_table, get_transaction};
pub use endpoints::{
    create_transaction_endpoint, delete_transaction_endpoint, get_aggregate_endpoint,
    get_spending_endpoint, get_transactions_endpoint, update_transaction_endpoint,
};
pub use ledger::{Ledger, NewTransaction, TransactionUpdate};
pub use query::{Aggregate, CategorySpending, DateRange, TransactionFilter};
