//! Database ID type definitions.

/// Alias for the integer type used for mapping to database IDs.
pub type DatabaseId = i64;
/// The ID of the user that owns a record.
pub type UserId = DatabaseId;
/// The ID of an [crate::account::Account].
pub type AccountId = DatabaseId;
/// The ID of a [crate::budget::Budget].
pub type BudgetId = DatabaseId;
/// The ID of a [crate::category::Category].
pub type CategoryId = DatabaseId;
/// The ID of a [crate::transaction::Transaction].
pub type TransactionId = DatabaseId;
/// The ID of a [crate::recurring::RecurringTransaction].
pub type RecurringTransactionId = DatabaseId;
