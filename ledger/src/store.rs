//! Storage traits for users, deposits and withdrawals.
//!
//! Reads go through [`LedgerStore`] directly. Anything that writes goes
//! through a [`LedgerTx`] obtained from [`LedgerStore::begin`]: rows locked
//! inside a unit of work stay locked until it commits or is dropped, and
//! dropping an uncommitted unit of work discards its writes.
//!
//! Callers holding a `LedgerTx` must not call back into the `LedgerStore`
//! reads; the in-memory backend serializes both on the same lock. When a
//! request row and a user row are both locked, the request row is locked
//! first.

use async_trait::async_trait;

use cashdesk_common::{
    DepositId, DepositRequest, DepositResolution, Money, NewDeposit, NewUser, NewWithdrawal,
    Result, User, UserId, WithdrawalId, WithdrawalRequest, WithdrawalResolution,
};

/// Entry point to a ledger backend.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Start a unit of work.
    async fn begin(&self) -> Result<Box<dyn LedgerTx>>;

    /// Look up a user by id.
    async fn find_user(&self, id: UserId) -> Result<Option<User>>;

    /// Look up a user by exact username.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>>;

    /// Deposits, newest first, optionally restricted to one user.
    async fn list_deposits(&self, user_id: Option<UserId>) -> Result<Vec<DepositRequest>>;

    /// Withdrawals, newest first, optionally restricted to one user.
    async fn list_withdrawals(&self, user_id: Option<UserId>) -> Result<Vec<WithdrawalRequest>>;
}

/// A unit of work against the ledger.
#[async_trait]
pub trait LedgerTx: Send {
    /// Lock a user row for the rest of the unit of work.
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>>;

    /// Overwrite a locked user's balance.
    async fn set_balance(&mut self, id: UserId, balance: Money) -> Result<User>;

    /// Insert a user with a zero balance.
    ///
    /// Fails with `Conflict` when the username or email is taken.
    async fn insert_user(&mut self, user: NewUser) -> Result<User>;

    /// Insert an admin user, or return the existing row with that username.
    async fn upsert_admin(&mut self, user: NewUser) -> Result<User>;

    /// Insert a pending deposit.
    async fn insert_deposit(&mut self, deposit: NewDeposit) -> Result<DepositRequest>;

    /// Insert a pending withdrawal.
    async fn insert_withdrawal(&mut self, withdrawal: NewWithdrawal) -> Result<WithdrawalRequest>;

    /// Lock a deposit row for the rest of the unit of work.
    async fn lock_deposit(&mut self, id: DepositId) -> Result<Option<DepositRequest>>;

    /// Lock a withdrawal row for the rest of the unit of work.
    async fn lock_withdrawal(&mut self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>>;

    /// Write an admin outcome onto a locked deposit.
    async fn resolve_deposit(
        &mut self,
        id: DepositId,
        resolution: DepositResolution,
    ) -> Result<DepositRequest>;

    /// Write an admin outcome onto a locked withdrawal.
    async fn resolve_withdrawal(
        &mut self,
        id: WithdrawalId,
        resolution: WithdrawalResolution,
    ) -> Result<WithdrawalRequest>;

    /// Make every write in this unit of work durable and release its locks.
    async fn commit(self: Box<Self>) -> Result<()>;
}
