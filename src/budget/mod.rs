//! Budgets: spending allowances that shrink as transactions are attributed to them.

mod core;
mod endpoints;

pub use core::{
    Budget, BudgetForm, create_budget, create_budget_table, delete_budget, get_budget, get_budgets,
    map_row_to_budget,
};
pub use endpoints::{
    create_budget_endpoint, delete_budget_endpoint, get_budgets_endpoint, update_budget_endpoint,
};
