//! Error types for Cashdesk operations.

use crate::{DepositId, Money, MoneyError, RequestStatus, UserId, WithdrawalId};
use std::fmt;
use thiserror::Error;

/// Main error type for Cashdesk operations.
#[derive(Error, Debug)]
pub enum CashdeskError {
    /// Bad input shape or range.
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    /// Unknown user.
    #[error("User with ID {0} not found")]
    UserNotFound(UserId),

    /// Unknown deposit request.
    #[error("Deposit with ID {0} not found")]
    DepositNotFound(DepositId),

    /// Unknown withdrawal request.
    #[error("Withdrawal with ID {0} not found")]
    WithdrawalNotFound(WithdrawalId),

    /// Duplicate username or email.
    #[error("{message}")]
    Conflict { field: String, message: String },

    /// Authentication failed.
    #[error("Invalid username or password")]
    InvalidCredentials,

    /// Request is no longer pending.
    #[error("{kind} with ID {id} has already been processed ({status})")]
    AlreadyProcessed {
        kind: RequestKind,
        id: i64,
        status: RequestStatus,
    },

    /// Balance too low for a debit.
    #[error("Insufficient balance: required {required}, available {available}")]
    InsufficientFunds { required: Money, available: Money },

    /// Storage failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification of an error, as surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    InvalidCredentials,
    AlreadyProcessed,
    InsufficientFunds,
    Internal,
}

/// Which kind of request an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Deposit,
    Withdrawal,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Deposit => f.write_str("Deposit"),
            RequestKind::Withdrawal => f.write_str("Withdrawal"),
        }
    }
}

impl CashdeskError {
    /// Create a validation error tied to an input field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        CashdeskError::Validation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a conflict error tied to a unique field.
    pub fn conflict(field: impl Into<String>, message: impl Into<String>) -> Self {
        CashdeskError::Conflict {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get the error classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CashdeskError::Validation { .. } => ErrorKind::Validation,
            CashdeskError::UserNotFound(_)
            | CashdeskError::DepositNotFound(_)
            | CashdeskError::WithdrawalNotFound(_) => ErrorKind::NotFound,
            CashdeskError::Conflict { .. } => ErrorKind::Conflict,
            CashdeskError::InvalidCredentials => ErrorKind::InvalidCredentials,
            CashdeskError::AlreadyProcessed { .. } => ErrorKind::AlreadyProcessed,
            CashdeskError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            CashdeskError::Database(_)
            | CashdeskError::Configuration(_)
            | CashdeskError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Get error code for RPC responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            CashdeskError::Validation { .. } => "VALIDATION_ERROR",
            CashdeskError::UserNotFound(_) => "USER_NOT_FOUND",
            CashdeskError::DepositNotFound(_) => "DEPOSIT_NOT_FOUND",
            CashdeskError::WithdrawalNotFound(_) => "WITHDRAWAL_NOT_FOUND",
            CashdeskError::Conflict { .. } => "CONFLICT",
            CashdeskError::InvalidCredentials => "INVALID_CREDENTIALS",
            CashdeskError::AlreadyProcessed { .. } => "ALREADY_PROCESSED",
            CashdeskError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            CashdeskError::Database(_) => "DATABASE_ERROR",
            CashdeskError::Configuration(_) => "CONFIGURATION_ERROR",
            CashdeskError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Field that caused the error, if any.
    pub fn field(&self) -> Option<&str> {
        match self {
            CashdeskError::Validation { field, .. } => field.as_deref(),
            CashdeskError::Conflict { field, .. } => Some(field),
            _ => None,
        }
    }
}

impl From<MoneyError> for CashdeskError {
    fn from(err: MoneyError) -> Self {
        CashdeskError::Validation {
            message: err.to_string(),
            field: None,
        }
    }
}

/// Result type alias for Cashdesk operations.
pub type Result<T> = std::result::Result<T, CashdeskError>;
