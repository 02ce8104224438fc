//! Persistent records: users, deposit requests and withdrawal requests.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{DepositId, Money, PaymentMethod, RequestStatus, UserId, WithdrawalId};

/// A registered user and their ledger balance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Unique user identifier.
    pub id: UserId,
    /// Unique login name.
    pub username: String,
    /// Unique email address.
    pub email: String,
    /// PHC-formatted password hash. Never sent to clients.
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    /// Current ledger balance.
    pub balance: Money,
    /// Whether this is the operator account.
    pub is_admin: bool,
    /// When the user was created.
    pub created_at: DateTime<Utc>,
    /// When the user was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub is_admin: bool,
}

/// A request to credit a user's balance, awaiting or past admin review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRequest {
    /// Unique deposit identifier.
    pub id: DepositId,
    /// Owning user.
    pub user_id: UserId,
    /// Amount to credit on approval.
    pub amount: Money,
    /// Channel used to pay.
    pub payment_method: PaymentMethod,
    /// Platform number the user paid into (fixed-target channels only).
    pub target_number: Option<String>,
    /// Proof of payment (proof-upload channel only).
    pub proof_image_url: Option<String>,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Confirmation image attached by the admin.
    pub admin_response_image_url: Option<String>,
    /// Notes attached by the admin.
    pub admin_notes: Option<String>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a deposit request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewDeposit {
    pub user_id: UserId,
    pub amount: Money,
    pub payment_method: PaymentMethod,
    pub target_number: Option<String>,
    pub proof_image_url: Option<String>,
}

impl NewDeposit {
    /// Build a deposit, deriving the target number from the channel.
    pub fn new(
        user_id: UserId,
        amount: Money,
        payment_method: PaymentMethod,
        proof_image_url: Option<String>,
    ) -> Self {
        Self {
            user_id,
            amount,
            payment_method,
            target_number: payment_method.target_number().map(str::to_string),
            proof_image_url,
        }
    }
}

/// Admin outcome written onto a deposit.
#[derive(Debug, Clone, PartialEq)]
pub struct DepositResolution {
    pub status: RequestStatus,
    pub admin_notes: Option<String>,
    pub admin_response_image_url: Option<String>,
}

/// A request to pay out part of a user's balance to a bank account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Unique withdrawal identifier.
    pub id: WithdrawalId,
    /// Owning user.
    pub user_id: UserId,
    /// Amount to debit on approval.
    pub amount: Money,
    /// Destination bank.
    pub bank_name: String,
    /// Destination account number.
    pub account_number: String,
    /// Name on the destination account.
    pub account_holder_name: String,
    /// Lifecycle status.
    pub status: RequestStatus,
    /// Notes attached by the admin.
    pub admin_notes: Option<String>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// When the request was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Fields needed to insert a withdrawal request.
#[derive(Debug, Clone, PartialEq)]
pub struct NewWithdrawal {
    pub user_id: UserId,
    pub amount: Money,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder_name: String,
}

/// Admin outcome written onto a withdrawal.
#[derive(Debug, Clone, PartialEq)]
pub struct WithdrawalResolution {
    pub status: RequestStatus,
    pub admin_notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_new_deposit_derives_target_number() {
        let amount = Money::new(dec!(100)).unwrap();

        let dana = NewDeposit::new(UserId::new(1), amount, PaymentMethod::Dana, None);
        assert_eq!(dana.target_number.as_deref(), Some("083176891367"));

        let qris = NewDeposit::new(
            UserId::new(1),
            amount,
            PaymentMethod::Qris,
            Some("https://cdn.example.com/proof.png".to_string()),
        );
        assert_eq!(qris.target_number, None);
    }

    #[test]
    fn test_password_hash_is_not_serialized() {
        let now = Utc::now();
        let user = User {
            id: UserId::new(1),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            balance: Money::ZERO,
            is_admin: false,
            created_at: now,
            updated_at: now,
        };

        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["balance"], "0.00");
    }
}
