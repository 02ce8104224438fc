//! Cashdesk Cryptographic Primitives
//!
//! Salted one-way password hashing for user and operator credentials.

pub mod password;

pub use password::{hash_password, verify_password};

/// Errors from cryptographic operations.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Password hashing failed: {0}")]
    HashingFailed(String),
}

pub type Result<T> = std::result::Result<T, CryptoError>;
