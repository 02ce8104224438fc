//! Ledger engine.

use std::sync::Arc;

use tracing::{info, instrument};

use cashdesk_common::{CashdeskError, Money, Result, UserId};

use crate::balance::{Adjustment, BalanceChange};
use crate::store::{LedgerStore, LedgerTx};

/// Reads and mutates user balances on top of a [`LedgerStore`].
#[derive(Clone)]
pub struct LedgerEngine {
    store: Arc<dyn LedgerStore>,
}

impl LedgerEngine {
    /// Create a new ledger engine.
    pub fn new(store: Arc<dyn LedgerStore>) -> Self {
        Self { store }
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<dyn LedgerStore> {
        &self.store
    }

    /// Current balance of a user.
    pub async fn get_balance(&self, user_id: UserId) -> Result<Money> {
        self.store
            .find_user(user_id)
            .await?
            .map(|user| user.balance)
            .ok_or(CashdeskError::UserNotFound(user_id))
    }

    /// Adjust a balance in its own unit of work.
    #[instrument(skip(self))]
    pub async fn adjust_balance(
        &self,
        user_id: UserId,
        adjustment: Adjustment,
    ) -> Result<BalanceChange> {
        let mut tx = self.store.begin().await?;
        let change = self.adjust_in(tx.as_mut(), user_id, adjustment).await?;
        tx.commit().await?;
        Ok(change)
    }

    /// Adjust a balance inside a caller's unit of work.
    ///
    /// Locks the user row, so the read-modify-write cannot interleave with
    /// another adjustment to the same user.
    pub async fn adjust_in(
        &self,
        tx: &mut dyn LedgerTx,
        user_id: UserId,
        adjustment: Adjustment,
    ) -> Result<BalanceChange> {
        let user = tx
            .lock_user(user_id)
            .await?
            .ok_or(CashdeskError::UserNotFound(user_id))?;

        let change = BalanceChange::compute(user_id, user.balance, adjustment)?;
        tx.set_balance(user_id, change.balance_after).await?;

        info!(
            user_id = %user_id,
            change_type = ?change.change_type,
            amount = %change.amount,
            balance_before = %change.balance_before,
            balance_after = %change.balance_after,
            "Balance adjusted"
        );

        Ok(change)
    }
}
