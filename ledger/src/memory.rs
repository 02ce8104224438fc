//! In-memory ledger backend.
//!
//! A unit of work holds the store lock for its whole lifetime and edits a
//! private copy of the state; commit swaps the copy in. Units of work are
//! therefore fully serialized, which gives the same outcome as row locks for
//! every interleaving the Postgres backend allows.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use cashdesk_common::{
    CashdeskError, DepositId, DepositRequest, DepositResolution, Money, NewDeposit, NewUser,
    NewWithdrawal, RequestStatus, Result, User, UserId, WithdrawalId, WithdrawalRequest,
    WithdrawalResolution,
};

use crate::store::{LedgerStore, LedgerTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: BTreeMap<UserId, User>,
    deposits: BTreeMap<DepositId, DepositRequest>,
    withdrawals: BTreeMap<WithdrawalId, WithdrawalRequest>,
    last_user_id: i64,
    last_deposit_id: i64,
    last_withdrawal_id: i64,
}

impl MemoryState {
    fn username_taken(&self, username: &str) -> bool {
        self.users.values().any(|u| u.username == username)
    }

    fn email_taken(&self, email: &str) -> bool {
        self.users.values().any(|u| u.email == email)
    }

    fn insert_user(&mut self, user: NewUser) -> User {
        self.last_user_id += 1;
        let now = Utc::now();
        let record = User {
            id: UserId::new(self.last_user_id),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            balance: Money::ZERO,
            is_admin: user.is_admin,
            created_at: now,
            updated_at: now,
        };
        self.users.insert(record.id, record.clone());
        record
    }
}

/// Process-local ledger store, used when no database is configured and in
/// tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first<T, K: Ord>(items: &mut [T], key: impl Fn(&T) -> K) {
    items.sort_by(|a, b| key(b).cmp(&key(a)));
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.state.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let state = self.state.lock().await;
        Ok(state.users.values().find(|u| u.username == username).cloned())
    }

    async fn list_deposits(&self, user_id: Option<UserId>) -> Result<Vec<DepositRequest>> {
        let state = self.state.lock().await;
        let mut deposits: Vec<_> = state
            .deposits
            .values()
            .filter(|d| user_id.map_or(true, |id| d.user_id == id))
            .cloned()
            .collect();
        newest_first(&mut deposits, |d| (d.created_at, d.id));
        Ok(deposits)
    }

    async fn list_withdrawals(&self, user_id: Option<UserId>) -> Result<Vec<WithdrawalRequest>> {
        let state = self.state.lock().await;
        let mut withdrawals: Vec<_> = state
            .withdrawals
            .values()
            .filter(|w| user_id.map_or(true, |id| w.user_id == id))
            .cloned()
            .collect();
        newest_first(&mut withdrawals, |w| (w.created_at, w.id));
        Ok(withdrawals)
    }
}

/// Unit of work over a [`MemoryStore`].
pub struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl LedgerTx for MemoryTx {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn set_balance(&mut self, id: UserId, balance: Money) -> Result<User> {
        let user = self
            .working
            .users
            .get_mut(&id)
            .ok_or(CashdeskError::UserNotFound(id))?;
        user.balance = balance;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        if self.working.username_taken(&user.username) {
            return Err(CashdeskError::conflict("username", "Username already exists"));
        }
        if self.working.email_taken(&user.email) {
            return Err(CashdeskError::conflict("email", "Email already exists"));
        }
        Ok(self.working.insert_user(user))
    }

    async fn upsert_admin(&mut self, user: NewUser) -> Result<User> {
        if let Some(existing) = self
            .working
            .users
            .values()
            .find(|u| u.username == user.username)
        {
            return Ok(existing.clone());
        }
        if self.working.email_taken(&user.email) {
            return Err(CashdeskError::conflict("email", "Email already exists"));
        }
        Ok(self.working.insert_user(NewUser {
            is_admin: true,
            ..user
        }))
    }

    async fn insert_deposit(&mut self, deposit: NewDeposit) -> Result<DepositRequest> {
        if !self.working.users.contains_key(&deposit.user_id) {
            return Err(CashdeskError::UserNotFound(deposit.user_id));
        }

        self.working.last_deposit_id += 1;
        let now = Utc::now();
        let record = DepositRequest {
            id: DepositId::new(self.working.last_deposit_id),
            user_id: deposit.user_id,
            amount: deposit.amount,
            payment_method: deposit.payment_method,
            target_number: deposit.target_number,
            proof_image_url: deposit.proof_image_url,
            status: RequestStatus::Pending,
            admin_response_image_url: None,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        };
        self.working.deposits.insert(record.id, record.clone());
        Ok(record)
    }

    async fn insert_withdrawal(&mut self, withdrawal: NewWithdrawal) -> Result<WithdrawalRequest> {
        if !self.working.users.contains_key(&withdrawal.user_id) {
            return Err(CashdeskError::UserNotFound(withdrawal.user_id));
        }

        self.working.last_withdrawal_id += 1;
        let now = Utc::now();
        let record = WithdrawalRequest {
            id: WithdrawalId::new(self.working.last_withdrawal_id),
            user_id: withdrawal.user_id,
            amount: withdrawal.amount,
            bank_name: withdrawal.bank_name,
            account_number: withdrawal.account_number,
            account_holder_name: withdrawal.account_holder_name,
            status: RequestStatus::Pending,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        };
        self.working.withdrawals.insert(record.id, record.clone());
        Ok(record)
    }

    async fn lock_deposit(&mut self, id: DepositId) -> Result<Option<DepositRequest>> {
        Ok(self.working.deposits.get(&id).cloned())
    }

    async fn lock_withdrawal(&mut self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        Ok(self.working.withdrawals.get(&id).cloned())
    }

    async fn resolve_deposit(
        &mut self,
        id: DepositId,
        resolution: DepositResolution,
    ) -> Result<DepositRequest> {
        let deposit = self
            .working
            .deposits
            .get_mut(&id)
            .ok_or(CashdeskError::DepositNotFound(id))?;
        deposit.status = resolution.status;
        deposit.admin_notes = resolution.admin_notes;
        deposit.admin_response_image_url = resolution.admin_response_image_url;
        deposit.updated_at = Utc::now();
        Ok(deposit.clone())
    }

    async fn resolve_withdrawal(
        &mut self,
        id: WithdrawalId,
        resolution: WithdrawalResolution,
    ) -> Result<WithdrawalRequest> {
        let withdrawal = self
            .working
            .withdrawals
            .get_mut(&id)
            .ok_or(CashdeskError::WithdrawalNotFound(id))?;
        withdrawal.status = resolution.status;
        withdrawal.admin_notes = resolution.admin_notes;
        withdrawal.updated_at = Utc::now();
        Ok(withdrawal.clone())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cashdesk_common::{ErrorKind, PaymentMethod};
    use rust_decimal_macros::dec;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
            is_admin: false,
        }
    }

    async fn seed_user(store: &MemoryStore, name: &str) -> User {
        let mut tx = store.begin().await.unwrap();
        let user = tx.insert_user(new_user(name)).await.unwrap();
        tx.commit().await.unwrap();
        user
    }

    #[tokio::test]
    async fn test_dropped_tx_rolls_back() {
        let store = MemoryStore::new();
        let user = seed_user(&store, "alice").await;

        {
            let mut tx = store.begin().await.unwrap();
            tx.set_balance(user.id, Money::new(dec!(500)).unwrap())
                .await
                .unwrap();
            tx.insert_user(new_user("bob")).await.unwrap();
        }

        let reloaded = store.find_user(user.id).await.unwrap().unwrap();
        assert_eq!(reloaded.balance, Money::ZERO);
        assert!(store.find_user_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_username_and_email() {
        let store = MemoryStore::new();
        seed_user(&store, "alice").await;

        let mut tx = store.begin().await.unwrap();
        let err = tx.insert_user(new_user("alice")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.field(), Some("username"));

        let err = tx
            .insert_user(NewUser {
                email: "alice@example.com".to_string(),
                ..new_user("alice2")
            })
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("email"));
    }

    #[tokio::test]
    async fn test_upsert_admin_is_idempotent() {
        let store = MemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let first = tx.upsert_admin(new_user("admin")).await.unwrap();
        let second = tx.upsert_admin(new_user("admin")).await.unwrap();
        tx.commit().await.unwrap();

        assert!(first.is_admin);
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_listing_is_newest_first() {
        let store = MemoryStore::new();
        let alice = seed_user(&store, "alice").await;
        let bob = seed_user(&store, "bob").await;

        let mut tx = store.begin().await.unwrap();
        for user in [&alice, &bob, &alice] {
            tx.insert_deposit(NewDeposit::new(
                user.id,
                Money::new(dec!(10)).unwrap(),
                PaymentMethod::Dana,
                None,
            ))
            .await
            .unwrap();
        }
        tx.commit().await.unwrap();

        let all = store.list_deposits(None).await.unwrap();
        let ids: Vec<i64> = all.iter().map(|d| d.id.get()).collect();
        assert_eq!(ids, vec![3, 2, 1]);

        let mine = store.list_deposits(Some(alice.id)).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|d| d.user_id == alice.id));

        assert!(store
            .list_withdrawals(Some(UserId::new(42)))
            .await
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = MemoryStore::new();

        let users = tokio_test::block_on(store.find_user_by_username("alice")).unwrap();
        let deposits = tokio_test::block_on(store.list_deposits(None)).unwrap();

        assert!(users.is_none());
        assert!(deposits.is_empty());
    }

    #[tokio::test]
    async fn test_deposit_for_unknown_user() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let err = tx
            .insert_deposit(NewDeposit::new(
                UserId::new(7),
                Money::new(dec!(10)).unwrap(),
                PaymentMethod::Ovo,
                None,
            ))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
