//! Withdrawal workflow: creation and admin processing of withdrawal requests.
//!
//! Creation checks the balance but does not hold funds. Approval re-checks
//! against the balance at that moment, so several pending withdrawals may
//! together exceed what the user owns; only the ones that still fit are
//! approvable.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use cashdesk_common::{
    CashdeskError, Decision, NewWithdrawal, RequestKind, Result, UserId, WithdrawalId,
    WithdrawalRequest, WithdrawalResolution,
};
use cashdesk_ledger::{Adjustment, LedgerEngine};

use crate::metrics::SharedMetrics;
use crate::validation::{optional_text, parse_amount, required_text};

/// Input for `createWithdrawal`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWithdrawalInput {
    pub user_id: UserId,
    pub amount: Decimal,
    pub bank_name: String,
    pub account_number: String,
    pub account_holder_name: String,
}

/// Input for `processWithdrawal`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessWithdrawalInput {
    pub withdrawal_id: WithdrawalId,
    pub status: Decision,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// Creates and processes withdrawal requests.
#[derive(Clone)]
pub struct WithdrawalWorkflow {
    engine: LedgerEngine,
    metrics: SharedMetrics,
}

impl WithdrawalWorkflow {
    pub fn new(engine: LedgerEngine, metrics: SharedMetrics) -> Self {
        Self { engine, metrics }
    }

    /// File a pending withdrawal if the user currently holds the amount.
    #[instrument(skip(self, input), fields(user_id = %input.user_id))]
    pub async fn create_withdrawal(&self, input: CreateWithdrawalInput) -> Result<WithdrawalRequest> {
        let amount = parse_amount(input.amount)?;
        let bank_name = required_text("bank_name", input.bank_name)?;
        let account_number = required_text("account_number", input.account_number)?;
        let account_holder_name = required_text("account_holder_name", input.account_holder_name)?;

        let mut tx = self.engine.store().begin().await?;
        let user = tx
            .lock_user(input.user_id)
            .await?
            .ok_or(CashdeskError::UserNotFound(input.user_id))?;

        if user.balance < amount {
            self.metrics.insufficient_funds();
            warn!(
                balance = %user.balance,
                amount = %amount,
                "Withdrawal exceeds balance"
            );
            return Err(CashdeskError::InsufficientFunds {
                required: amount,
                available: user.balance,
            });
        }

        let withdrawal = tx
            .insert_withdrawal(NewWithdrawal {
                user_id: user.id,
                amount,
                bank_name,
                account_number,
                account_holder_name,
            })
            .await?;
        tx.commit().await?;

        self.metrics.withdrawal_created();
        info!(
            withdrawal_id = %withdrawal.id,
            user_id = %withdrawal.user_id,
            amount = %withdrawal.amount,
            "Withdrawal created"
        );
        Ok(withdrawal)
    }

    /// Withdrawals owned by a user, newest first. Unknown users have none.
    pub async fn get_user_withdrawals(&self, user_id: UserId) -> Result<Vec<WithdrawalRequest>> {
        self.engine.store().list_withdrawals(Some(user_id)).await
    }

    /// All withdrawals, newest first.
    pub async fn get_all_withdrawals(&self) -> Result<Vec<WithdrawalRequest>> {
        self.engine.store().list_withdrawals(None).await
    }

    /// Approve or reject a pending withdrawal.
    ///
    /// Approval debits the current balance; when that is too low the call
    /// fails with `InsufficientFunds` and the request stays pending.
    #[instrument(skip(self, input), fields(withdrawal_id = %input.withdrawal_id, decision = %input.status))]
    pub async fn process_withdrawal(
        &self,
        input: ProcessWithdrawalInput,
    ) -> Result<WithdrawalRequest> {
        let mut tx = self.engine.store().begin().await?;

        let withdrawal = tx
            .lock_withdrawal(input.withdrawal_id)
            .await?
            .ok_or(CashdeskError::WithdrawalNotFound(input.withdrawal_id))?;

        let status = match withdrawal.status.resolve(input.status) {
            Some(status) => status,
            None => {
                self.metrics.processing_conflict();
                warn!(status = %withdrawal.status, "Withdrawal already processed");
                return Err(CashdeskError::AlreadyProcessed {
                    kind: RequestKind::Withdrawal,
                    id: withdrawal.id.get(),
                    status: withdrawal.status,
                });
            }
        };

        if input.status.is_approval() {
            let debit = self
                .engine
                .adjust_in(
                    tx.as_mut(),
                    withdrawal.user_id,
                    Adjustment::Debit(withdrawal.amount),
                )
                .await;

            let change = match debit {
                Ok(change) => change,
                Err(err @ CashdeskError::InsufficientFunds { .. }) => {
                    self.metrics.insufficient_funds();
                    warn!(error = %err, "Withdrawal approval refused");
                    return Err(err);
                }
                Err(err) => return Err(err),
            };

            info!(
                withdrawal_id = %withdrawal.id,
                user_id = %withdrawal.user_id,
                amount = %withdrawal.amount,
                balance_after = %change.balance_after,
                "Withdrawal debited"
            );
        }

        let resolved = tx
            .resolve_withdrawal(
                withdrawal.id,
                WithdrawalResolution {
                    status,
                    admin_notes: optional_text(input.admin_notes),
                },
            )
            .await?;
        tx.commit().await?;

        self.metrics.withdrawal_processed(input.status.is_approval());
        info!(withdrawal_id = %resolved.id, status = %resolved.status, "Withdrawal processed");
        Ok(resolved)
    }
}
