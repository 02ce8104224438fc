//! PostgreSQL ledger backend.
//!
//! Row locks are taken with `SELECT ... FOR UPDATE` inside a
//! `sqlx::Transaction`; dropping a [`PgTx`] without committing rolls back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{FromRow, Postgres, Transaction};
use tracing::info;

use cashdesk_common::{
    CashdeskError, DepositId, DepositRequest, DepositResolution, Money, NewDeposit, NewUser,
    NewWithdrawal, Result, User, UserId, WithdrawalId, WithdrawalRequest, WithdrawalResolution,
};

use crate::store::{LedgerStore, LedgerTx};

/// Ledger store backed by a Postgres connection pool.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to the database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(database_error)?;

        info!(max_connections, "Connected to database");
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply pending schema migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| CashdeskError::Database(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn database_error(err: sqlx::Error) -> CashdeskError {
    CashdeskError::Database(err.to_string())
}

/// Map a failed users insert onto the unique constraint it tripped.
fn user_insert_error(err: sqlx::Error) -> CashdeskError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            return match db_err.constraint() {
                Some("users_email_key") => {
                    CashdeskError::conflict("email", "Email already exists")
                }
                _ => CashdeskError::conflict("username", "Username already exists"),
            };
        }
    }
    database_error(err)
}

/// Map a failed request insert whose owner does not exist.
fn request_insert_error(user_id: UserId) -> impl FnOnce(sqlx::Error) -> CashdeskError {
    move |err| {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_foreign_key_violation() {
                return CashdeskError::UserNotFound(user_id);
            }
        }
        database_error(err)
    }
}

fn stored_money(value: Decimal) -> Result<Money> {
    Money::new(value).map_err(|e| CashdeskError::Database(format!("stored amount: {e}")))
}

fn stored_enum<T: std::str::FromStr>(value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse()
        .map_err(|e: T::Err| CashdeskError::Database(e.to_string()))
}

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    balance: Decimal,
    is_admin: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = CashdeskError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: UserId::new(row.id),
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            balance: stored_money(row.balance)?,
            is_admin: row.is_admin,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct DepositRow {
    id: i64,
    user_id: i64,
    amount: Decimal,
    payment_method: String,
    target_number: Option<String>,
    proof_image_url: Option<String>,
    status: String,
    admin_response_image_url: Option<String>,
    admin_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<DepositRow> for DepositRequest {
    type Error = CashdeskError;

    fn try_from(row: DepositRow) -> Result<Self> {
        Ok(DepositRequest {
            id: DepositId::new(row.id),
            user_id: UserId::new(row.user_id),
            amount: stored_money(row.amount)?,
            payment_method: stored_enum(&row.payment_method)?,
            target_number: row.target_number,
            proof_image_url: row.proof_image_url,
            status: stored_enum(&row.status)?,
            admin_response_image_url: row.admin_response_image_url,
            admin_notes: row.admin_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct WithdrawalRow {
    id: i64,
    user_id: i64,
    amount: Decimal,
    bank_name: String,
    account_number: String,
    account_holder_name: String,
    status: String,
    admin_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<WithdrawalRow> for WithdrawalRequest {
    type Error = CashdeskError;

    fn try_from(row: WithdrawalRow) -> Result<Self> {
        Ok(WithdrawalRequest {
            id: WithdrawalId::new(row.id),
            user_id: UserId::new(row.user_id),
            amount: stored_money(row.amount)?,
            bank_name: row.bank_name,
            account_number: row.account_number,
            account_holder_name: row.account_holder_name,
            status: stored_enum(&row.status)?,
            admin_notes: row.admin_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = CashdeskError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn begin(&self) -> Result<Box<dyn LedgerTx>> {
        let tx = self.pool.begin().await.map_err(database_error)?;
        Ok(Box::new(PgTx { tx }))
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .map(User::try_from)
            .transpose()
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE username = $1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .map_err(database_error)?
            .map(User::try_from)
            .transpose()
    }

    async fn list_deposits(&self, user_id: Option<UserId>) -> Result<Vec<DepositRequest>> {
        let rows = sqlx::query_as::<_, DepositRow>(
            r#"
            SELECT * FROM deposits
            WHERE $1::BIGINT IS NULL OR user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.map(|id| id.get()))
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        convert_all(rows)
    }

    async fn list_withdrawals(&self, user_id: Option<UserId>) -> Result<Vec<WithdrawalRequest>> {
        let rows = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            SELECT * FROM withdrawals
            WHERE $1::BIGINT IS NULL OR user_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id.map(|id| id.get()))
        .fetch_all(&self.pool)
        .await
        .map_err(database_error)?;

        convert_all(rows)
    }
}

/// Unit of work over a [`PgStore`].
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl LedgerTx for PgTx {
    async fn lock_user(&mut self, id: UserId) -> Result<Option<User>> {
        sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(database_error)?
            .map(User::try_from)
            .transpose()
    }

    async fn set_balance(&mut self, id: UserId, balance: Money) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            "UPDATE users SET balance = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id.get())
        .bind(balance.value())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(database_error)?
        .ok_or(CashdeskError::UserNotFound(id))?;

        row.try_into()
    }

    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, password_hash, is_admin)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.is_admin)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(user_insert_error)?;

        row.try_into()
    }

    async fn upsert_admin(&mut self, user: NewUser) -> Result<User> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            INSERT INTO users (username, email, password_hash, is_admin)
            VALUES ($1, $2, $3, TRUE)
            ON CONFLICT (username) DO UPDATE SET username = EXCLUDED.username
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(user_insert_error)?;

        row.try_into()
    }

    async fn insert_deposit(&mut self, deposit: NewDeposit) -> Result<DepositRequest> {
        let row = sqlx::query_as::<_, DepositRow>(
            r#"
            INSERT INTO deposits (user_id, amount, payment_method, target_number, proof_image_url)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(deposit.user_id.get())
        .bind(deposit.amount.value())
        .bind(deposit.payment_method.as_str())
        .bind(&deposit.target_number)
        .bind(&deposit.proof_image_url)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(request_insert_error(deposit.user_id))?;

        row.try_into()
    }

    async fn insert_withdrawal(&mut self, withdrawal: NewWithdrawal) -> Result<WithdrawalRequest> {
        let row = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            INSERT INTO withdrawals (user_id, amount, bank_name, account_number, account_holder_name)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(withdrawal.user_id.get())
        .bind(withdrawal.amount.value())
        .bind(&withdrawal.bank_name)
        .bind(&withdrawal.account_number)
        .bind(&withdrawal.account_holder_name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(request_insert_error(withdrawal.user_id))?;

        row.try_into()
    }

    async fn lock_deposit(&mut self, id: DepositId) -> Result<Option<DepositRequest>> {
        sqlx::query_as::<_, DepositRow>("SELECT * FROM deposits WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(database_error)?
            .map(DepositRequest::try_from)
            .transpose()
    }

    async fn lock_withdrawal(&mut self, id: WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        sqlx::query_as::<_, WithdrawalRow>("SELECT * FROM withdrawals WHERE id = $1 FOR UPDATE")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(database_error)?
            .map(WithdrawalRequest::try_from)
            .transpose()
    }

    async fn resolve_deposit(
        &mut self,
        id: DepositId,
        resolution: DepositResolution,
    ) -> Result<DepositRequest> {
        let row = sqlx::query_as::<_, DepositRow>(
            r#"
            UPDATE deposits
            SET status = $2, admin_notes = $3, admin_response_image_url = $4, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.get())
        .bind(resolution.status.as_str())
        .bind(&resolution.admin_notes)
        .bind(&resolution.admin_response_image_url)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(database_error)?
        .ok_or(CashdeskError::DepositNotFound(id))?;

        row.try_into()
    }

    async fn resolve_withdrawal(
        &mut self,
        id: WithdrawalId,
        resolution: WithdrawalResolution,
    ) -> Result<WithdrawalRequest> {
        let row = sqlx::query_as::<_, WithdrawalRow>(
            r#"
            UPDATE withdrawals
            SET status = $2, admin_notes = $3, updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id.get())
        .bind(resolution.status.as_str())
        .bind(&resolution.admin_notes)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(database_error)?
        .ok_or(CashdeskError::WithdrawalNotFound(id))?;

        row.try_into()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await.map_err(database_error)
    }
}
