//! Defines the app level error type and conversions to JSON error responses.
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde_json::json;
use time::Date;

use crate::database_id::RecurringTransactionId;

/// The kind of record that a [Error::NotFound] refers to.
pub type Entity = &'static str;

/// The errors that may occur in the application.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum Error {
    /// The requested resource was not found.
    ///
    /// For HTTP request handlers, the client should check that the parameters
    /// (e.g., ID) are correct and that the resource has been created.
    ///
    /// Internally, this error may occur when a query returns no rows, in which
    /// case the entity is reported as "record".
    #[error("the {0} could not be found")]
    NotFound(Entity),

    /// Transaction and recurring transaction amounts are unsigned magnitudes
    /// and must be greater than zero. The direction comes from the category.
    #[error("{0} is not a valid amount, amounts must be greater than zero")]
    InvalidAmount(Decimal),

    /// A recurring date must be a day of the month between 1 and 31.
    #[error("{0} is not a valid recurring date, expected a day of the month from 1 to 31")]
    InvalidRecurringDate(u8),

    /// The string does not name one of the supported account types.
    #[error("\"{0}\" is not a valid account type")]
    InvalidAccountType(String),

    /// The string is neither "income" nor "expense".
    #[error("\"{0}\" is not a valid transaction type")]
    InvalidTransactionType(String),

    /// The string is neither "monthly" nor "yearly".
    #[error("\"{0}\" is not a valid recurring frequency")]
    InvalidFrequency(String),

    /// A transaction for the recurring transaction already exists on this date.
    ///
    /// Materializing a recurring transaction must happen at most once per
    /// template per day, even if the sweep runs several times.
    #[error("recurring transaction {0} has already been materialized for {1}")]
    AlreadyMaterialized(RecurringTransactionId, Date),

    /// The category is still used by transactions, so it cannot be deleted.
    ///
    /// The client should move or delete those transactions first.
    #[error("the category \"{0}\" is used by transactions and cannot be deleted")]
    CategoryInUse(String),

    /// An error occurred while getting the local timezone from a canonical timezone string.
    #[error("invalid timezone {0}")]
    InvalidTimezoneError(String),

    /// The body of a request or response could not be read.
    #[error("could not read the message body")]
    BodyReadError,

    /// Could not acquire the database lock
    #[error("could not acquire the database lock")]
    DatabaseLockError,

    /// An unhandled/unexpected SQL error.
    #[error("an unexpected SQL error occurred: {0}")]
    SqlError(rusqlite::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::QueryReturnedNoRows => Error::NotFound("record"),
            error => {
                tracing::error!("an unhandled SQL error occurred: {}", error);
                Error::SqlError(error)
            }
        }
    }
}

impl Error {
    /// The HTTP status code that best describes the error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::InvalidAmount(_)
            | Error::InvalidRecurringDate(_)
            | Error::InvalidAccountType(_)
            | Error::InvalidTransactionType(_)
            | Error::InvalidFrequency(_) => StatusCode::BAD_REQUEST,
            Error::AlreadyMaterialized(_, _) | Error::CategoryInUse(_) => StatusCode::CONFLICT,
            Error::InvalidTimezoneError(_)
            | Error::BodyReadError
            | Error::DatabaseLockError
            | Error::SqlError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        let message = if status_code == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal details are for the server logs only.
            tracing::error!("An unexpected error occurred: {}", self);
            "An unexpected error occurred, check the server logs for more details.".to_owned()
        } else {
            self.to_string()
        };

        (status_code, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::{http::StatusCode, response::IntoResponse};
    use rust_decimal_macros::dec;

    use super::Error;

    #[test]
    fn no_rows_maps_to_not_found() {
        let error: Error = rusqlite::Error::QueryReturnedNoRows.into();

        assert_eq!(error, Error::NotFound("record"));
    }

    #[test]
    fn status_codes() {
        assert_eq!(
            Error::NotFound("account").into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            Error::InvalidAmount(dec!(-1)).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            Error::CategoryInUse("Rent".to_owned())
                .into_response()
                .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            Error::DatabaseLockError.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
