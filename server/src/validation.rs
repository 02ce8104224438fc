//! Input validation shared by the workflows.

use rust_decimal::Decimal;

use cashdesk_common::{CashdeskError, Money, MoneyError, Result};

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 50;
pub const PASSWORD_MIN_LEN: usize = 6;

pub fn validate_username(username: &str) -> Result<()> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(CashdeskError::validation(
            "username",
            format!("Username must be between {USERNAME_MIN_LEN} and {USERNAME_MAX_LEN} characters"),
        ));
    }
    Ok(())
}

/// Accepts `local@domain.tld`: a non-empty local part and a dotted domain
/// with no empty labels.
pub fn validate_email(email: &str) -> Result<()> {
    let invalid = || CashdeskError::validation("email", "Invalid email address");

    if email.chars().any(char::is_whitespace) {
        return Err(invalid());
    }

    let (local, domain) = email.split_once('@').ok_or_else(invalid)?;
    if local.is_empty() || domain.contains('@') || !domain.contains('.') {
        return Err(invalid());
    }
    if domain.split('.').any(str::is_empty) {
        return Err(invalid());
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(CashdeskError::validation(
            "password",
            format!("Password must be at least {PASSWORD_MIN_LEN} characters"),
        ));
    }
    Ok(())
}

/// Validate a requested amount: positive, at most two decimal places, and
/// within the storable range.
pub fn parse_amount(value: Decimal) -> Result<Money> {
    if value <= Decimal::ZERO {
        return Err(CashdeskError::validation("amount", "Amount must be positive"));
    }

    Money::new(value).map_err(|e| {
        let message = match e {
            MoneyError::TooPrecise(_) => "Amount must have at most 2 decimal places".to_string(),
            MoneyError::OutOfRange(_) => format!("Amount must not exceed {}", Money::max()),
            other => other.to_string(),
        };
        CashdeskError::validation("amount", message)
    })
}

/// Trim a required free-text field, rejecting blank values.
pub fn required_text(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CashdeskError::validation(field, format!("{field} is required")));
    }
    Ok(trimmed.to_string())
}

/// Normalize an optional free-text field; blank becomes `None`.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
