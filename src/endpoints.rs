//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/users/{user_id}/accounts', use [format_endpoint].

/// The route for listing and creating a user's transactions.
pub const USER_TRANSACTIONS: &str = "/api/users/{user_id}/transactions";
/// The route for a user's income and expense totals.
pub const USER_TRANSACTIONS_AGGREGATE: &str = "/api/users/{user_id}/transactions/aggregate";
/// The route for a user's spending grouped by category.
pub const USER_TRANSACTIONS_SPENDING: &str = "/api/users/{user_id}/transactions/spending";
/// The route to update or delete a single transaction.
pub const TRANSACTION: &str = "/api/transactions/{transaction_id}";

/// The route for listing and creating a user's accounts.
pub const USER_ACCOUNTS: &str = "/api/users/{user_id}/accounts";
/// The route for the total balance of a user's active accounts.
pub const USER_TOTAL_BALANCE: &str = "/api/users/{user_id}/accounts/total_balance";
/// The route to update or delete a single account.
pub const ACCOUNT: &str = "/api/accounts/{account_id}";

/// The route for listing and creating a user's budgets.
pub const USER_BUDGETS: &str = "/api/users/{user_id}/budgets";
/// The route to update or delete a single budget.
pub const BUDGET: &str = "/api/budgets/{budget_id}";

/// The route for listing and creating categories.
pub const CATEGORIES: &str = "/api/categories";
/// The route to update or delete a single category.
pub const CATEGORY: &str = "/api/categories/{category_id}";

/// The route for listing and creating a user's recurring transactions.
pub const USER_RECURRING_TRANSACTIONS: &str = "/api/users/{user_id}/recurring_transactions";
/// The route to update or delete a single recurring transaction.
pub const RECURRING_TRANSACTION: &str = "/api/recurring_transactions/{recurring_transaction_id}";

/// The route for a user's activity log.
pub const USER_ACTIVITY_LOG: &str = "/api/users/{user_id}/activity_log";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/users/{user_id}', '{user_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: i64) -> String {
    let mut param_start = None;
    let mut param_end = None;

    for (i, c) in endpoint_path.chars().enumerate() {
        if c == '{' {
            param_start = Some(i);
        } else if param_start.is_some() && c == '}' {
            param_end = Some(i + 1);
            break;
        }
    }

    let param_start = match param_start {
        Some(start) => start,
        None => return endpoint_path.to_string(),
    };

    let param_end = param_end.unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
