use std::time::Duration;

use thiserror::Error;

use super::{AccountId, CarId, Tokens};

/// Violations raised by the ledger components themselves.
/// The application layer maps each one onto its own error kind.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("User not found: {0}")]
    UserNotFound(AccountId),

    #[error("Car not found: {0}")]
    CarNotFound(CarId),

    #[error("User already registered: {0}")]
    DuplicateUser(AccountId),

    #[error("User {user} already rents car {car_id}")]
    AlreadyRented { user: AccountId, car_id: CarId },

    #[error("Car {0} is not available")]
    CarUnavailable(CarId),

    #[error("User {0} has no active rental")]
    NotRented(AccountId),

    #[error("User {user} has an outstanding debt of {debt}")]
    OutstandingDebt { user: AccountId, debt: Tokens },

    #[error("Rental too short: {elapsed:?} elapsed, minimum is {minimum:?}")]
    RentalTooShort { elapsed: Duration, minimum: Duration },

    #[error("User {0} has no debt to pay")]
    NothingOwed(AccountId),

    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance { available: Tokens, required: Tokens },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid car status: {0}")]
    InvalidStatus(String),
}
