//! Balance arithmetic.

use cashdesk_common::{CashdeskError, Money, MoneyError, Result, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type of balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceChangeType {
    /// Credit (increase).
    Credit,
    /// Debit (decrease).
    Debit,
}

/// A requested change to a user's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Credit(Money),
    Debit(Money),
}

impl Adjustment {
    pub fn amount(&self) -> Money {
        match self {
            Adjustment::Credit(amount) | Adjustment::Debit(amount) => *amount,
        }
    }

    pub fn change_type(&self) -> BalanceChangeType {
        match self {
            Adjustment::Credit(_) => BalanceChangeType::Credit,
            Adjustment::Debit(_) => BalanceChangeType::Debit,
        }
    }

    /// Compute the balance after this adjustment.
    ///
    /// A debit larger than `current` fails with `InsufficientFunds`; a credit
    /// past `Money::max()` fails validation.
    pub fn apply_to(&self, current: Money) -> Result<Money> {
        match self {
            Adjustment::Credit(amount) => current.checked_add(*amount).map_err(|e| match e {
                MoneyError::OutOfRange(_) => CashdeskError::validation(
                    "amount",
                    format!("crediting {amount} would exceed the maximum balance"),
                ),
                other => other.into(),
            }),
            Adjustment::Debit(amount) => {
                current
                    .checked_sub(*amount)
                    .map_err(|_| CashdeskError::InsufficientFunds {
                        required: *amount,
                        available: current,
                    })
            }
        }
    }
}

/// Balance change event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BalanceChange {
    /// User affected.
    pub user_id: UserId,
    /// Change type.
    pub change_type: BalanceChangeType,
    /// Amount changed.
    pub amount: Money,
    /// Balance before change.
    pub balance_before: Money,
    /// Balance after change.
    pub balance_after: Money,
    /// When the change occurred.
    pub timestamp: DateTime<Utc>,
}

impl BalanceChange {
    /// Apply an adjustment to a balance, recording before and after.
    pub fn compute(user_id: UserId, current: Money, adjustment: Adjustment) -> Result<Self> {
        let balance_after = adjustment.apply_to(current)?;

        Ok(Self {
            user_id,
            change_type: adjustment.change_type(),
            amount: adjustment.amount(),
            balance_before: current,
            balance_after,
            timestamp: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashdesk_common::ErrorKind;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn money(value: rust_decimal::Decimal) -> Money {
        Money::new(value).unwrap()
    }

    #[test]
    fn test_credit_and_debit() {
        let user = UserId::new(1);

        let change =
            BalanceChange::compute(user, money(dec!(100)), Adjustment::Credit(money(dec!(50))))
                .unwrap();
        assert_eq!(change.balance_after, money(dec!(150)));
        assert_eq!(change.change_type, BalanceChangeType::Credit);

        let change =
            BalanceChange::compute(user, money(dec!(100)), Adjustment::Debit(money(dec!(100))))
                .unwrap();
        assert_eq!(change.balance_after, Money::ZERO);
    }

    #[test]
    fn test_overdraft_is_insufficient_funds() {
        let err = Adjustment::Debit(money(dec!(100.01)))
            .apply_to(money(dec!(100)))
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    }

    #[test]
    fn test_credit_past_maximum_is_rejected() {
        let err = Adjustment::Credit(money(dec!(0.01)))
            .apply_to(Money::max())
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    proptest! {
        #[test]
        fn prop_balance_never_negative(
            ops in proptest::collection::vec((any::<bool>(), 1i64..1_000_000), 0..200)
        ) {
            let mut balance = Money::ZERO;
            let mut expected: i64 = 0;

            for (is_credit, minor) in ops {
                let amount = Money::from_minor(minor).unwrap();
                let adjustment = if is_credit {
                    Adjustment::Credit(amount)
                } else {
                    Adjustment::Debit(amount)
                };

                match adjustment.apply_to(balance) {
                    Ok(next) => {
                        expected += if is_credit { minor } else { -minor };
                        balance = next;
                    }
                    Err(err) => {
                        prop_assert!(!is_credit);
                        prop_assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
                    }
                }

                prop_assert!(balance.value() >= rust_decimal::Decimal::ZERO);
            }

            prop_assert_eq!(balance, Money::from_minor(expected).unwrap());
        }
    }
}
