//! Simulation controller.

use std::future::Future;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use futures::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use cashdesk_common::{
    CashdeskError, Decision, DepositId, ErrorKind, PaymentMethod, RequestStatus, Result,
    UserId, WithdrawalId,
};
use cashdesk_server::auth::RegisterUserInput;
use cashdesk_server::deposit::{CreateDepositInput, ProcessDepositInput};
use cashdesk_server::withdrawal::{CreateWithdrawalInput, ProcessWithdrawalInput};
use cashdesk_server::Cashdesk;

use crate::metrics::SimulationMetrics;
use crate::scenario::{Report, Scenario};

type SharedMetrics = Arc<Mutex<SimulationMetrics>>;

/// Run an operation, recording its latency and outcome.
async fn timed<T>(metrics: &SharedMetrics, op: impl Future<Output = Result<T>>) -> Result<T> {
    let start = Instant::now();
    let result = op.await;
    let elapsed = start.elapsed();

    let mut metrics = metrics.lock().await;
    match &result {
        Ok(_) => metrics.record_success(elapsed),
        Err(e) if is_refusal(e) => metrics.record_refusal(elapsed),
        Err(_) => metrics.record_failure(),
    }
    result
}

fn is_refusal(err: &CashdeskError) -> bool {
    matches!(
        err.kind(),
        ErrorKind::AlreadyProcessed | ErrorKind::InsufficientFunds
    )
}

/// One step of the mixed scenario. Processing steps pick their target among
/// the requests still pending when they run.
#[derive(Debug, Clone, Copy)]
enum Operation {
    Deposit { user: UserId, amount: Decimal },
    Withdraw { user: UserId, amount: Decimal },
    ProcessDeposit { pick: usize, decision: Decision },
    ProcessWithdrawal { pick: usize, decision: Decision },
}

/// Controls the simulation.
pub struct SimulationController {
    /// Service under test.
    cashdesk: Cashdesk,
    /// Number of users to create.
    user_count: usize,
    /// Concurrent processors per request.
    racers: usize,
    /// Operations in the mixed scenario.
    operations: usize,
    /// Random number generator.
    rng: StdRng,
    /// Prefix keeping usernames unique across runs.
    run_tag: String,
    /// Simulation metrics.
    metrics: SharedMetrics,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(
        cashdesk: Cashdesk,
        user_count: usize,
        racers: usize,
        operations: usize,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        Self {
            cashdesk,
            user_count: user_count.max(1),
            racers: racers.max(2),
            operations,
            rng,
            run_tag: format!("{:08x}", (nanos as u64) & 0xffff_ffff),
            metrics: Arc::new(Mutex::new(SimulationMetrics::new())),
        }
    }

    /// Run a scenario and report any invariant violations.
    pub async fn run(&mut self, scenario: Scenario) -> anyhow::Result<Report> {
        info!(
            scenario = %scenario,
            users = self.user_count,
            racers = self.racers,
            "Running scenario: {}",
            scenario.description()
        );

        let users = self.create_users().await?;
        let report = match scenario {
            Scenario::DoubleApproval => self.double_approval(&users).await?,
            Scenario::Overcommit => self.overcommit(&users).await?,
            Scenario::Mixed => self.mixed(&users).await?,
        };

        for violation in &report.violations {
            warn!(scenario = %scenario, "Invariant violated: {}", violation);
        }
        Ok(report)
    }

    /// Get simulation metrics.
    pub async fn get_metrics(&self) -> SimulationMetrics {
        self.metrics.lock().await.clone()
    }

    async fn create_users(&mut self) -> anyhow::Result<Vec<UserId>> {
        let mut users = Vec::with_capacity(self.user_count);
        for i in 0..self.user_count {
            let username = format!("sim_{}_{}", self.run_tag, i);
            let user = self
                .cashdesk
                .register_user(RegisterUserInput {
                    email: format!("{username}@simulator.local"),
                    username,
                    password: "simulator".to_string(),
                })
                .await?;
            users.push(user.id);
        }
        info!(count = users.len(), "Users created");
        Ok(users)
    }

    fn random_amount(&mut self) -> Decimal {
        Decimal::new(self.rng.gen_range(100..100_000), 2)
    }

    async fn balance(&self, user_id: UserId) -> anyhow::Result<Decimal> {
        Ok(self.cashdesk.engine().get_balance(user_id).await?.value())
    }

    /// Deposit and approve `amount` for a user.
    async fn fund(&self, user_id: UserId, amount: Decimal) -> anyhow::Result<()> {
        let deposit = self
            .cashdesk
            .create_deposit(CreateDepositInput {
                user_id,
                amount,
                payment_method: PaymentMethod::Dana,
                proof_image_url: None,
            })
            .await?;
        self.cashdesk
            .process_deposit(approve_deposit(deposit.id))
            .await?;
        Ok(())
    }

    async fn double_approval(&mut self, users: &[UserId]) -> anyhow::Result<Report> {
        let mut report = Report::default();
        let mut targets = Vec::with_capacity(users.len());

        for &user_id in users {
            let amount = self.random_amount();
            let before = self.balance(user_id).await?;
            let deposit = self
                .cashdesk
                .create_deposit(CreateDepositInput {
                    user_id,
                    amount,
                    payment_method: PaymentMethod::Ovo,
                    proof_image_url: None,
                })
                .await?;
            targets.push((user_id, deposit.id, before, amount));
        }

        let mut handles = Vec::new();
        for &(_, deposit_id, _, _) in &targets {
            for _ in 0..self.racers {
                let cashdesk = self.cashdesk.clone();
                let metrics = self.metrics.clone();
                handles.push(tokio::spawn(async move {
                    let result =
                        timed(&metrics, cashdesk.process_deposit(approve_deposit(deposit_id)))
                            .await;
                    (deposit_id, result)
                }));
            }
        }

        let mut successes: Vec<DepositId> = Vec::new();
        for joined in join_all(handles).await {
            let (deposit_id, result) = joined?;
            match result {
                Ok(_) => successes.push(deposit_id),
                Err(e) if e.kind() == ErrorKind::AlreadyProcessed => {}
                Err(e) => report.violation(format!("deposit {deposit_id}: unexpected error: {e}")),
            }
        }

        for (user_id, deposit_id, before, amount) in targets {
            let wins = successes.iter().filter(|id| **id == deposit_id).count();
            if wins != 1 {
                report.violation(format!("deposit {deposit_id} approved {wins} times"));
            }

            let after = self.balance(user_id).await?;
            if after != before + amount {
                report.violation(format!(
                    "user {user_id}: balance {after}, expected {}",
                    before + amount
                ));
            }
        }

        Ok(report)
    }

    async fn overcommit(&mut self, users: &[UserId]) -> anyhow::Result<Report> {
        let mut report = Report::default();
        let mut targets = Vec::with_capacity(users.len());

        for &user_id in users {
            let amount = self.random_amount();
            self.fund(user_id, amount).await?;
            let before = self.balance(user_id).await?;

            let mut withdrawals = Vec::with_capacity(2);
            for _ in 0..2 {
                let withdrawal = self
                    .cashdesk
                    .create_withdrawal(CreateWithdrawalInput {
                        user_id,
                        amount,
                        bank_name: "SIM BANK".to_string(),
                        account_number: format!("{:010}", user_id.get()),
                        account_holder_name: format!("user {user_id}"),
                    })
                    .await?;
                withdrawals.push(withdrawal.id);
            }
            targets.push((user_id, before, amount, withdrawals));
        }

        let mut handles = Vec::new();
        for (user_id, _, _, withdrawals) in &targets {
            for &withdrawal_id in withdrawals {
                let user_id = *user_id;
                let cashdesk = self.cashdesk.clone();
                let metrics = self.metrics.clone();
                handles.push(tokio::spawn(async move {
                    let result = timed(
                        &metrics,
                        cashdesk.process_withdrawal(approve_withdrawal(withdrawal_id)),
                    )
                    .await;
                    (user_id, withdrawal_id, result)
                }));
            }
        }

        let mut approvals: Vec<UserId> = Vec::new();
        for joined in join_all(handles).await {
            let (user_id, withdrawal_id, result) = joined?;
            match result {
                Ok(_) => approvals.push(user_id),
                Err(e) if e.kind() == ErrorKind::InsufficientFunds => {}
                Err(e) => report.violation(format!(
                    "withdrawal {withdrawal_id}: unexpected error: {e}"
                )),
            }
        }

        for (user_id, before, amount, _) in targets {
            let approved = approvals.iter().filter(|id| **id == user_id).count();
            if approved != 1 {
                report.violation(format!(
                    "user {user_id}: {approved} of 2 over-committed withdrawals approved"
                ));
            }

            let after = self.balance(user_id).await?;
            let expected = before - amount * Decimal::from(approved as u64);
            if after != expected || after.is_sign_negative() {
                report.violation(format!(
                    "user {user_id}: balance {after}, expected {expected}"
                ));
            }
        }

        Ok(report)
    }

    fn plan_operations(&mut self, users: &[UserId]) -> Vec<Operation> {
        let mut plan = Vec::with_capacity(self.operations);
        for _ in 0..self.operations {
            let user = users[self.rng.gen_range(0..users.len())];
            let decision = if self.rng.gen_bool(0.8) {
                Decision::Approved
            } else {
                Decision::Rejected
            };
            let pick = self.rng.gen_range(0..usize::MAX);

            let op = match self.rng.gen_range(0..4) {
                0 => Operation::Deposit {
                    user,
                    amount: self.random_amount(),
                },
                1 => Operation::Withdraw {
                    user,
                    amount: self.random_amount(),
                },
                2 => Operation::ProcessDeposit { pick, decision },
                _ => Operation::ProcessWithdrawal { pick, decision },
            };
            plan.push(op);
        }
        plan
    }

    async fn mixed(&mut self, users: &[UserId]) -> anyhow::Result<Report> {
        let mut report = Report::default();
        let mut starting = Vec::with_capacity(users.len());
        for &user_id in users {
            starting.push((user_id, self.balance(user_id).await?));
        }

        let plan = self.plan_operations(users);
        for batch in plan.chunks(self.racers) {
            let handles: Vec<_> = batch
                .iter()
                .copied()
                .map(|op| {
                    let cashdesk = self.cashdesk.clone();
                    let metrics = self.metrics.clone();
                    tokio::spawn(async move { execute(&cashdesk, &metrics, op).await })
                })
                .collect();

            for joined in join_all(handles).await {
                if let Err(e) = joined? {
                    if !is_refusal(&e) {
                        report.violation(format!("unexpected error: {e}"));
                    }
                }
            }
        }

        let deposits = self.cashdesk.get_all_deposits().await?;
        let withdrawals = self.cashdesk.get_all_withdrawals().await?;

        for (user_id, start) in starting {
            let credited: Decimal = deposits
                .iter()
                .filter(|d| d.user_id == user_id && d.status == RequestStatus::Approved)
                .map(|d| d.amount.value())
                .sum();
            let debited: Decimal = withdrawals
                .iter()
                .filter(|w| w.user_id == user_id && w.status == RequestStatus::Approved)
                .map(|w| w.amount.value())
                .sum();

            let expected = start + credited - debited;
            let after = self.balance(user_id).await?;
            if after != expected {
                report.violation(format!(
                    "user {user_id}: balance {after}, expected {expected}"
                ));
            }
        }

        Ok(report)
    }
}

fn approve_deposit(deposit_id: DepositId) -> ProcessDepositInput {
    ProcessDepositInput {
        deposit_id,
        status: Decision::Approved,
        admin_response_image_url: None,
        admin_notes: Some("approved by simulator".to_string()),
    }
}

fn approve_withdrawal(withdrawal_id: WithdrawalId) -> ProcessWithdrawalInput {
    ProcessWithdrawalInput {
        withdrawal_id,
        status: Decision::Approved,
        admin_notes: Some("approved by simulator".to_string()),
    }
}

async fn execute(cashdesk: &Cashdesk, metrics: &SharedMetrics, op: Operation) -> Result<()> {
    match op {
        Operation::Deposit { user, amount } => {
            let input = CreateDepositInput {
                user_id: user,
                amount,
                payment_method: PaymentMethod::Gopay,
                proof_image_url: None,
            };
            timed(metrics, cashdesk.create_deposit(input)).await?;
        }
        Operation::Withdraw { user, amount } => {
            let input = CreateWithdrawalInput {
                user_id: user,
                amount,
                bank_name: "SIM BANK".to_string(),
                account_number: format!("{:010}", user.get()),
                account_holder_name: format!("user {user}"),
            };
            timed(metrics, cashdesk.create_withdrawal(input)).await?;
        }
        Operation::ProcessDeposit { pick, decision } => {
            let pending: Vec<_> = cashdesk
                .get_all_deposits()
                .await?
                .into_iter()
                .filter(|d| d.status == RequestStatus::Pending)
                .collect();
            if let Some(target) = pending.get(pick % pending.len().max(1)) {
                let input = ProcessDepositInput {
                    status: decision,
                    ..approve_deposit(target.id)
                };
                timed(metrics, cashdesk.process_deposit(input)).await?;
            }
        }
        Operation::ProcessWithdrawal { pick, decision } => {
            let pending: Vec<_> = cashdesk
                .get_all_withdrawals()
                .await?
                .into_iter()
                .filter(|w| w.status == RequestStatus::Pending)
                .collect();
            if let Some(target) = pending.get(pick % pending.len().max(1)) {
                let input = ProcessWithdrawalInput {
                    status: decision,
                    ..approve_withdrawal(target.id)
                };
                timed(metrics, cashdesk.process_withdrawal(input)).await?;
            }
        }
    }
    Ok(())
}
