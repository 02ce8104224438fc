//! The Cashdesk service: every remote procedure in one place.

use std::sync::Arc;

use tracing::info;

use cashdesk_common::{DepositRequest, Result, User, UserId, WithdrawalRequest};
use cashdesk_ledger::{LedgerEngine, LedgerStore};

use crate::auth::{AuthService, LoginInput, RegisterUserInput};
use crate::config::AdminConfig;
use crate::deposit::{CreateDepositInput, DepositWorkflow, ProcessDepositInput};
use crate::metrics::{Metrics, MetricsSnapshot, SharedMetrics};
use crate::withdrawal::{CreateWithdrawalInput, ProcessWithdrawalInput, WithdrawalWorkflow};

/// Facade over authentication and the deposit and withdrawal workflows.
#[derive(Clone)]
pub struct Cashdesk {
    engine: LedgerEngine,
    auth: AuthService,
    deposits: DepositWorkflow,
    withdrawals: WithdrawalWorkflow,
    metrics: SharedMetrics,
}

impl Cashdesk {
    /// Build the service on top of a store.
    pub fn new(store: Arc<dyn LedgerStore>, admin: &AdminConfig) -> Result<Self> {
        let engine = LedgerEngine::new(store);
        let metrics: SharedMetrics = Arc::new(Metrics::new());

        Ok(Self {
            auth: AuthService::new(engine.clone(), admin, metrics.clone())?,
            deposits: DepositWorkflow::new(engine.clone(), metrics.clone()),
            withdrawals: WithdrawalWorkflow::new(engine.clone(), metrics.clone()),
            engine,
            metrics,
        })
    }

    /// Make sure the configured admin account exists.
    pub async fn bootstrap(&self) -> Result<User> {
        let admin = self.auth.ensure_admin().await?;
        info!(user_id = %admin.id, username = %admin.username, "Admin account ready");
        Ok(admin)
    }

    pub fn engine(&self) -> &LedgerEngine {
        &self.engine
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub async fn register_user(&self, input: RegisterUserInput) -> Result<User> {
        self.auth.register_user(input).await
    }

    pub async fn login_user(&self, input: LoginInput) -> Result<User> {
        self.auth.login_user(input).await
    }

    pub async fn admin_login(&self, input: LoginInput) -> Result<User> {
        self.auth.admin_login(input).await
    }

    pub async fn get_user_by_id(&self, user_id: UserId) -> Result<User> {
        self.auth.get_user_by_id(user_id).await
    }

    pub async fn create_deposit(&self, input: CreateDepositInput) -> Result<DepositRequest> {
        self.deposits.create_deposit(input).await
    }

    pub async fn get_user_deposits(&self, user_id: UserId) -> Result<Vec<DepositRequest>> {
        self.deposits.get_user_deposits(user_id).await
    }

    pub async fn get_all_deposits(&self) -> Result<Vec<DepositRequest>> {
        self.deposits.get_all_deposits().await
    }

    pub async fn process_deposit(&self, input: ProcessDepositInput) -> Result<DepositRequest> {
        self.deposits.process_deposit(input).await
    }

    pub async fn create_withdrawal(
        &self,
        input: CreateWithdrawalInput,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals.create_withdrawal(input).await
    }

    pub async fn get_user_withdrawals(&self, user_id: UserId) -> Result<Vec<WithdrawalRequest>> {
        self.withdrawals.get_user_withdrawals(user_id).await
    }

    pub async fn get_all_withdrawals(&self) -> Result<Vec<WithdrawalRequest>> {
        self.withdrawals.get_all_withdrawals().await
    }

    pub async fn process_withdrawal(
        &self,
        input: ProcessWithdrawalInput,
    ) -> Result<WithdrawalRequest> {
        self.withdrawals.process_withdrawal(input).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashdesk_common::{Decision, Money, PaymentMethod, RequestStatus};
    use cashdesk_ledger::MemoryStore;
    use rust_decimal_macros::dec;

    fn cashdesk() -> Cashdesk {
        let admin = AdminConfig {
            password: "admin-pass".to_string(),
            ..AdminConfig::default()
        };
        Cashdesk::new(Arc::new(MemoryStore::new()), &admin).unwrap()
    }

    #[tokio::test]
    async fn test_full_lifecycle() {
        let cashdesk = cashdesk();
        let admin = cashdesk.bootstrap().await.unwrap();
        assert!(admin.is_admin);

        let user = cashdesk
            .register_user(RegisterUserInput {
                username: "carol".to_string(),
                email: "carol@example.com".to_string(),
                password: "password123".to_string(),
            })
            .await
            .unwrap();

        let deposit = cashdesk
            .create_deposit(CreateDepositInput {
                user_id: user.id,
                amount: dec!(100),
                payment_method: PaymentMethod::Dana,
                proof_image_url: None,
            })
            .await
            .unwrap();
        cashdesk
            .process_deposit(ProcessDepositInput {
                deposit_id: deposit.id,
                status: Decision::Approved,
                admin_response_image_url: None,
                admin_notes: None,
            })
            .await
            .unwrap();

        let withdrawal = cashdesk
            .create_withdrawal(CreateWithdrawalInput {
                user_id: user.id,
                amount: dec!(50),
                bank_name: "BCA".to_string(),
                account_number: "1234567890".to_string(),
                account_holder_name: "Carol".to_string(),
            })
            .await
            .unwrap();
        let processed = cashdesk
            .process_withdrawal(ProcessWithdrawalInput {
                withdrawal_id: withdrawal.id,
                status: Decision::Approved,
                admin_notes: None,
            })
            .await
            .unwrap();
        assert_eq!(processed.status, RequestStatus::Approved);

        let reloaded = cashdesk.get_user_by_id(user.id).await.unwrap();
        assert_eq!(reloaded.balance, Money::new(dec!(50)).unwrap());

        let metrics = cashdesk.metrics();
        assert_eq!(metrics.users_registered, 1);
        assert_eq!(metrics.deposits_approved, 1);
        assert_eq!(metrics.withdrawals_approved, 1);
    }

    #[tokio::test]
    async fn test_bootstrap_is_idempotent() {
        let cashdesk = cashdesk();

        let first = cashdesk.bootstrap().await.unwrap();
        let second = cashdesk.bootstrap().await.unwrap();
        assert_eq!(first.id, second.id);
    }
}
