//! Deposit payment channels.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::status::UnknownVariant;

/// Destination number for the DANA wallet channel.
pub const DANA_TARGET_NUMBER: &str = "083176891367";

/// Destination number shared by the OVO and GoPay wallet channels.
pub const OVO_GOPAY_TARGET_NUMBER: &str = "083194537338";

/// Channel through which a user sends a deposit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// DANA e-wallet transfer to a fixed platform number.
    Dana,
    /// OVO e-wallet transfer to a fixed platform number.
    Ovo,
    /// GoPay e-wallet transfer to a fixed platform number.
    Gopay,
    /// QR payment; the user uploads a proof image instead.
    Qris,
}

impl PaymentMethod {
    /// All supported channels.
    pub const ALL: [PaymentMethod; 4] = [
        PaymentMethod::Dana,
        PaymentMethod::Ovo,
        PaymentMethod::Gopay,
        PaymentMethod::Qris,
    ];

    /// Platform account the user must pay into, if the channel has a fixed one.
    pub fn target_number(&self) -> Option<&'static str> {
        match self {
            PaymentMethod::Dana => Some(DANA_TARGET_NUMBER),
            PaymentMethod::Ovo | PaymentMethod::Gopay => Some(OVO_GOPAY_TARGET_NUMBER),
            PaymentMethod::Qris => None,
        }
    }

    /// Whether a deposit on this channel must carry a proof image.
    pub fn requires_proof(&self) -> bool {
        match self {
            PaymentMethod::Qris => true,
            PaymentMethod::Dana | PaymentMethod::Ovo | PaymentMethod::Gopay => false,
        }
    }

    /// Canonical storage representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Dana => "DANA",
            PaymentMethod::Ovo => "OVO",
            PaymentMethod::Gopay => "GOPAY",
            PaymentMethod::Qris => "QRIS",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PaymentMethod::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("payment method", s))
    }
}
