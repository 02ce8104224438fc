//! Deposit workflow: creation and admin processing of deposit requests.

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use cashdesk_common::{
    CashdeskError, Decision, DepositId, DepositRequest, DepositResolution, NewDeposit,
    PaymentMethod, RequestKind, Result, UserId,
};
use cashdesk_ledger::{Adjustment, LedgerEngine};

use crate::metrics::SharedMetrics;
use crate::validation::{optional_text, parse_amount};

/// Input for `createDeposit`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDepositInput {
    pub user_id: UserId,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub proof_image_url: Option<String>,
}

/// Input for `processDeposit`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessDepositInput {
    pub deposit_id: DepositId,
    pub status: Decision,
    #[serde(default)]
    pub admin_response_image_url: Option<String>,
    #[serde(default)]
    pub admin_notes: Option<String>,
}

/// Creates and processes deposit requests.
#[derive(Clone)]
pub struct DepositWorkflow {
    engine: LedgerEngine,
    metrics: SharedMetrics,
}

impl DepositWorkflow {
    pub fn new(engine: LedgerEngine, metrics: SharedMetrics) -> Self {
        Self { engine, metrics }
    }

    /// File a pending deposit. The balance is untouched until approval.
    #[instrument(skip(self, input), fields(user_id = %input.user_id, method = %input.payment_method))]
    pub async fn create_deposit(&self, input: CreateDepositInput) -> Result<DepositRequest> {
        let amount = parse_amount(input.amount)?;
        let proof_image_url = optional_text(input.proof_image_url);

        let mut tx = self.engine.store().begin().await?;
        if tx.lock_user(input.user_id).await?.is_none() {
            return Err(CashdeskError::UserNotFound(input.user_id));
        }

        if input.payment_method.requires_proof() && proof_image_url.is_none() {
            return Err(CashdeskError::validation(
                "proof_image_url",
                format!("{} deposits require proof_image_url", input.payment_method),
            ));
        }

        let deposit = tx
            .insert_deposit(NewDeposit::new(
                input.user_id,
                amount,
                input.payment_method,
                proof_image_url,
            ))
            .await?;
        tx.commit().await?;

        self.metrics.deposit_created();
        info!(
            deposit_id = %deposit.id,
            user_id = %deposit.user_id,
            amount = %deposit.amount,
            "Deposit created"
        );
        Ok(deposit)
    }

    /// Deposits owned by a user, newest first. Unknown users have none.
    pub async fn get_user_deposits(&self, user_id: UserId) -> Result<Vec<DepositRequest>> {
        self.engine.store().list_deposits(Some(user_id)).await
    }

    /// All deposits, newest first.
    pub async fn get_all_deposits(&self) -> Result<Vec<DepositRequest>> {
        self.engine.store().list_deposits(None).await
    }

    /// Approve or reject a pending deposit.
    ///
    /// The status check, the status write and the credit run in one unit of
    /// work with the deposit row locked, so concurrent calls on the same id
    /// credit at most once.
    #[instrument(skip(self, input), fields(deposit_id = %input.deposit_id, decision = %input.status))]
    pub async fn process_deposit(&self, input: ProcessDepositInput) -> Result<DepositRequest> {
        let mut tx = self.engine.store().begin().await?;

        let deposit = tx
            .lock_deposit(input.deposit_id)
            .await?
            .ok_or(CashdeskError::DepositNotFound(input.deposit_id))?;

        let status = match deposit.status.resolve(input.status) {
            Some(status) => status,
            None => {
                self.metrics.processing_conflict();
                warn!(status = %deposit.status, "Deposit already processed");
                return Err(CashdeskError::AlreadyProcessed {
                    kind: RequestKind::Deposit,
                    id: deposit.id.get(),
                    status: deposit.status,
                });
            }
        };

        if input.status.is_approval() {
            let change = self
                .engine
                .adjust_in(tx.as_mut(), deposit.user_id, Adjustment::Credit(deposit.amount))
                .await?;
            info!(
                deposit_id = %deposit.id,
                user_id = %deposit.user_id,
                amount = %deposit.amount,
                balance_after = %change.balance_after,
                "Deposit credited"
            );
        }

        let resolved = tx
            .resolve_deposit(
                deposit.id,
                DepositResolution {
                    status,
                    admin_notes: optional_text(input.admin_notes),
                    admin_response_image_url: optional_text(input.admin_response_image_url),
                },
            )
            .await?;
        tx.commit().await?;

        self.metrics.deposit_processed(input.status.is_approval());
        info!(deposit_id = %resolved.id, status = %resolved.status, "Deposit processed");
        Ok(resolved)
    }
}
