use std::time::Duration;

use thiserror::Error;

use crate::domain::{AccountId, CarId, LedgerError, Tokens};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("User not found: {0}")]
    UserNotFound(AccountId),

    #[error("Car not found: {0}")]
    CarNotFound(CarId),

    #[error("User already registered: {0}")]
    DuplicateUser(AccountId),

    #[error("{caller} is not allowed to {action}")]
    Unauthorized { caller: AccountId, action: String },

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

    #[error("Ledger is owned by {stored}, not {requested}")]
    OwnerMismatch {
        stored: AccountId,
        requested: AccountId,
    },

    #[error("Ledger integrity check failed: {0}")]
    IntegrityViolation(String),

    #[error("Database error: {0}")]
    Database(#[from] anyhow::Error),
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::UserNotFound(id) => AppError::UserNotFound(id),
            LedgerError::CarNotFound(id) => AppError::CarNotFound(id),
            LedgerError::DuplicateUser(id) => AppError::DuplicateUser(id),
            LedgerError::AlreadyRented { user, car_id } => AppError::AlreadyRented { user, car_id },
            LedgerError::CarUnavailable(id) => AppError::CarUnavailable(id),
            LedgerError::NotRented(id) => AppError::NotRented(id),
            LedgerError::OutstandingDebt { user, debt } => AppError::OutstandingDebt { user, debt },
            LedgerError::RentalTooShort { elapsed, minimum } => {
                AppError::RentalTooShort { elapsed, minimum }
            }
            LedgerError::NothingOwed(id) => AppError::NothingOwed(id),
            LedgerError::InsufficientBalance {
                available,
                required,
            } => AppError::InsufficientBalance {
                available,
                required,
            },
            LedgerError::InvalidAmount(msg) => AppError::InvalidAmount(msg),
            LedgerError::InvalidStatus(msg) => AppError::InvalidStatus(msg),
        }
    }
}
