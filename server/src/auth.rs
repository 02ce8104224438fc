//! User registration and authentication.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{info, instrument, warn};

use cashdesk_common::{CashdeskError, NewUser, Result, User, UserId};
use cashdesk_crypto::{hash_password, verify_password};
use cashdesk_ledger::LedgerEngine;

use crate::config::AdminConfig;
use crate::metrics::SharedMetrics;
use crate::validation::{validate_email, validate_password, validate_username};

/// Input for `registerUser`.
#[derive(Clone, Deserialize)]
pub struct RegisterUserInput {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Input for `loginUser` and `adminLogin`.
#[derive(Clone, Deserialize)]
pub struct LoginInput {
    pub username: String,
    pub password: String,
}

/// Admin identity with the password already hashed.
struct AdminIdentity {
    username: String,
    email: String,
    password_hash: String,
}

/// Registers users and checks credentials.
#[derive(Clone)]
pub struct AuthService {
    engine: LedgerEngine,
    admin: Arc<AdminIdentity>,
    metrics: SharedMetrics,
}

async fn hash_off_thread(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| CashdeskError::Internal(e.to_string()))?
        .map_err(|e| CashdeskError::Internal(e.to_string()))
}

async fn verify_off_thread(password: String, stored_hash: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &stored_hash))
        .await
        .map_err(|e| CashdeskError::Internal(e.to_string()))
}

impl AuthService {
    /// Create the service, hashing the configured admin password.
    pub fn new(engine: LedgerEngine, admin: &AdminConfig, metrics: SharedMetrics) -> Result<Self> {
        let password_hash =
            hash_password(&admin.password).map_err(|e| CashdeskError::Internal(e.to_string()))?;

        Ok(Self {
            engine,
            admin: Arc::new(AdminIdentity {
                username: admin.username.clone(),
                email: admin.email.clone(),
                password_hash,
            }),
            metrics,
        })
    }

    /// Register a new non-admin user with a zero balance.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn register_user(&self, input: RegisterUserInput) -> Result<User> {
        validate_username(&input.username)?;
        validate_email(&input.email)?;
        validate_password(&input.password)?;

        if input.username == self.admin.username {
            return Err(CashdeskError::conflict("username", "Username already exists"));
        }

        let password_hash = hash_off_thread(input.password).await?;

        let mut tx = self.engine.store().begin().await?;
        let user = tx
            .insert_user(NewUser {
                username: input.username,
                email: input.email,
                password_hash,
                is_admin: false,
            })
            .await?;
        tx.commit().await?;

        self.metrics.user_registered();
        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Authenticate by username and password.
    ///
    /// Unknown usernames and wrong passwords fail identically.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn login_user(&self, input: LoginInput) -> Result<User> {
        let user = self
            .engine
            .store()
            .find_user_by_username(&input.username)
            .await?;

        let user = match user {
            Some(user) => user,
            None => return Err(self.reject_login()),
        };

        if !verify_off_thread(input.password, user.password_hash.clone()).await? {
            return Err(self.reject_login());
        }

        info!(user_id = %user.id, "User logged in");
        Ok(user)
    }

    /// Authenticate as the configured admin and return the admin row,
    /// creating it on first use.
    #[instrument(skip(self, input), fields(username = %input.username))]
    pub async fn admin_login(&self, input: LoginInput) -> Result<User> {
        if input.username != self.admin.username {
            return Err(self.reject_login());
        }

        if !verify_off_thread(input.password, self.admin.password_hash.clone()).await? {
            return Err(self.reject_login());
        }

        let admin = self.ensure_admin().await?;
        info!(user_id = %admin.id, "Admin logged in");
        Ok(admin)
    }

    /// Create the admin row if it does not exist yet.
    pub async fn ensure_admin(&self) -> Result<User> {
        let mut tx = self.engine.store().begin().await?;
        let user = tx
            .upsert_admin(NewUser {
                username: self.admin.username.clone(),
                email: self.admin.email.clone(),
                password_hash: self.admin.password_hash.clone(),
                is_admin: true,
            })
            .await?;
        tx.commit().await?;

        if !user.is_admin {
            return Err(CashdeskError::conflict(
                "username",
                "Admin username belongs to a non-admin account",
            ));
        }
        Ok(user)
    }

    /// Fetch a user by id.
    pub async fn get_user_by_id(&self, user_id: UserId) -> Result<User> {
        self.engine
            .store()
            .find_user(user_id)
            .await?
            .ok_or(CashdeskError::UserNotFound(user_id))
    }

    fn reject_login(&self) -> CashdeskError {
        self.metrics.login_failed();
        warn!("Login rejected");
        CashdeskError::InvalidCredentials
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::Metrics;
    use cashdesk_common::{ErrorKind, Money};
    use cashdesk_ledger::{LedgerStore, MemoryStore};

    fn service_with_store() -> (AuthService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let admin = AdminConfig {
            username: "admin".to_string(),
            password: "admin-pass".to_string(),
            email: "admin@cashdesk.local".to_string(),
        };
        let service = AuthService::new(
            LedgerEngine::new(store.clone()),
            &admin,
            Arc::new(Metrics::new()),
        )
        .unwrap();
        (service, store)
    }

    fn register(username: &str) -> RegisterUserInput {
        RegisterUserInput {
            username: username.to_string(),
            email: format!("{username}@example.com"),
            password: "password123".to_string(),
        }
    }

    fn login(username: &str, password: &str) -> LoginInput {
        LoginInput {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let (service, _) = service_with_store();

        let user = service.register_user(register("alice")).await.unwrap();
        assert_eq!(user.balance, Money::ZERO);
        assert!(!user.is_admin);
        assert!(user.password_hash.starts_with("$argon2id$"));

        let logged_in = service
            .login_user(login("alice", "password123"))
            .await
            .unwrap();
        assert_eq!(logged_in.id, user.id);
    }

    #[tokio::test]
    async fn test_duplicate_registration_conflicts() {
        let (service, _) = service_with_store();
        service.register_user(register("alice")).await.unwrap();

        let err = service.register_user(register("alice")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        let err = service
            .register_user(RegisterUserInput {
                email: "alice@example.com".to_string(),
                ..register("alice2")
            })
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("email"));
    }

    #[tokio::test]
    async fn test_admin_username_is_reserved() {
        let (service, _) = service_with_store();

        let err = service.register_user(register("admin")).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let (service, _) = service_with_store();

        let err = service.register_user(register("al")).await.unwrap_err();
        assert_eq!(err.field(), Some("username"));

        let err = service
            .register_user(RegisterUserInput {
                password: "12345".to_string(),
                ..register("alice")
            })
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("password"));

        let err = service
            .register_user(RegisterUserInput {
                email: "not-an-email".to_string(),
                ..register("alice")
            })
            .await
            .unwrap_err();
        assert_eq!(err.field(), Some("email"));
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (service, _) = service_with_store();
        service.register_user(register("alice")).await.unwrap();

        let wrong_password = service
            .login_user(login("alice", "nope-nope"))
            .await
            .unwrap_err();
        let unknown_user = service
            .login_user(login("mallory", "password123"))
            .await
            .unwrap_err();

        assert_eq!(wrong_password.kind(), ErrorKind::InvalidCredentials);
        assert_eq!(wrong_password.to_string(), unknown_user.to_string());
        assert_eq!(service.metrics.snapshot().logins_failed, 2);
    }

    #[tokio::test]
    async fn test_malformed_stored_hash_never_logs_in() {
        let (service, store) = service_with_store();
        let mut tx = store.begin().await.unwrap();
        tx.insert_user(NewUser {
            username: "legacy".to_string(),
            email: "legacy@example.com".to_string(),
            password_hash: "admin_hash".to_string(),
            is_admin: false,
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let err = service
            .login_user(login("legacy", "admin_hash"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_admin_login_is_idempotent() {
        let (service, store) = service_with_store();

        let first = service
            .admin_login(login("admin", "admin-pass"))
            .await
            .unwrap();
        let second = service
            .admin_login(login("admin", "admin-pass"))
            .await
            .unwrap();

        assert!(first.is_admin);
        assert_eq!(first.id, second.id);
        assert_eq!(
            store.find_user_by_username("admin").await.unwrap().unwrap().id,
            first.id
        );

        let err = service
            .admin_login(login("admin", "admin"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);

        let err = service
            .admin_login(login("Admin", "admin-pass"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_concurrent_admin_logins_create_one_row() {
        let (service, store) = service_with_store();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.admin_login(login("admin", "admin-pass")).await })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap().unwrap().id);
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let admin = store.find_user_by_username("admin").await.unwrap().unwrap();
        assert!(admin.is_admin);
    }

    #[tokio::test]
    async fn test_get_user_by_id() {
        let (service, _) = service_with_store();
        let user = service.register_user(register("alice")).await.unwrap();

        assert_eq!(service.get_user_by_id(user.id).await.unwrap().id, user.id);

        let err = service.get_user_by_id(UserId::new(999)).await.unwrap_err();
        assert_eq!(err.error_code(), "USER_NOT_FOUND");
    }
}
