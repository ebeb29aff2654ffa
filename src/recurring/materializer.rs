//! Turns recurring transactions into real transactions on the days they are due.

use time::{Date, UtcOffset};

use crate::{
    Error, Ledger,
    database_id::{RecurringTransactionId, TransactionId},
    transaction::NewTransaction,
};

use super::core::{Frequency, RecurringTransaction, get_all_recurring_transactions};

/// A recurring transaction that could not be turned into a transaction.
#[derive(Debug, PartialEq)]
pub struct TemplateFailure {
    pub recurring_transaction_id: RecurringTransactionId,
    pub error: Error,
}

/// What one sweep did.
#[derive(Debug, Default, PartialEq)]
pub struct SweepReport {
    /// The transactions created by the sweep.
    pub created: Vec<TransactionId>,
    /// Due templates that already had a transaction for the day.
    pub already_materialized: usize,
    /// Due templates that failed, e.g. because their category was deleted.
    pub failures: Vec<TemplateFailure>,
}

/// Whether `template` should produce a transaction on `today`.
///
/// Monthly templates are due when the day of the month matches the recurring
/// date, so a template for the 31st is skipped in shorter months. Yearly
/// templates must also match the month they were created in, as seen from
/// `local_offset`.
pub fn is_due(template: &RecurringTransaction, today: Date, local_offset: UtcOffset) -> bool {
    if template.recurring_date != today.day() {
        return false;
    }

    match template.frequency {
        Frequency::Monthly => true,
        Frequency::Yearly => template.created_at.to_offset(local_offset).month() == today.month(),
    }
}

/// Create today's transaction for every due recurring transaction of every user.
///
/// Templates are processed one at a time. A template that fails is logged and
/// recorded in the report, and the sweep moves on to the next one. Running the
/// sweep again on the same day creates nothing new.
///
/// # Errors
/// Returns an [Error] only if the recurring transactions could not be loaded.
pub fn run_recurring_sweep(
    ledger: &Ledger,
    today: Date,
    local_offset: UtcOffset,
) -> Result<SweepReport, Error> {
    let templates = get_all_recurring_transactions(&*ledger.connection()?)?;
    let mut report = SweepReport::default();

    for template in templates
        .iter()
        .filter(|template| is_due(template, today, local_offset))
    {
        match ledger.create_transaction(new_transaction_from(template, today)) {
            Ok(transaction) => {
                tracing::info!(
                    "Created transaction {} from recurring transaction {} ({})",
                    transaction.id,
                    template.id,
                    template.description
                );
                report.created.push(transaction.id);
            }
            Err(Error::AlreadyMaterialized(id, date)) => {
                tracing::debug!("Recurring transaction {id} already has a transaction on {date}");
                report.already_materialized += 1;
            }
            Err(error) => {
                tracing::error!(
                    "Could not create transaction from recurring transaction {}: {error}",
                    template.id
                );
                report.failures.push(TemplateFailure {
                    recurring_transaction_id: template.id,
                    error,
                });
            }
        }
    }

    Ok(report)
}

fn new_transaction_from(template: &RecurringTransaction, date: Date) -> NewTransaction {
    NewTransaction {
        owner_id: template.owner_id,
        account_id: template.account_id,
        category_id: template.category_id,
        budget_id: template.budget_id,
        description: template.description.clone(),
        amount: template.amount,
        date,
        note: template.note.clone(),
        recurring_transaction_id: Some(template.id),
    }
}
