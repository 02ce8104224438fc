//! JSON RPC over HTTP.
//!
//! Every procedure is `POST /rpc/<procedureName>` taking a JSON object with
//! snake_case fields. Failures are returned as
//! `{"error": {"code": ..., "message": ...}}` with a status matching the
//! error kind.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::error;

use cashdesk_common::{
    CashdeskError, DepositRequest, ErrorKind, User, UserId, WithdrawalRequest,
};

use crate::metrics::MetricsSnapshot;
use crate::service::Cashdesk;

/// Input for procedures keyed by a user id.
#[derive(Debug, Clone, Deserialize)]
pub struct UserIdInput {
    pub user_id: UserId,
}

/// Error wrapper that renders as an RPC error response.
#[derive(Debug)]
pub struct ApiError(pub CashdeskError);

impl From<CashdeskError> for ApiError {
    fn from(err: CashdeskError) -> Self {
        ApiError(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

/// HTTP status for an error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict | ErrorKind::AlreadyProcessed => StatusCode::CONFLICT,
        ErrorKind::InvalidCredentials => StatusCode::UNAUTHORIZED,
        ErrorKind::InsufficientFunds => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = status_for(err.kind());

        let message = match &err {
            CashdeskError::Database(_) => "A storage error occurred".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            error!(error = %err, code = err.error_code(), "Request failed");
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: err.error_code(),
                message,
                field: err.field().map(str::to_string),
            },
        };
        (status, Json(body)).into_response()
    }
}

type RpcResult<T> = Result<Json<T>, ApiError>;

/// Decode a procedure body. A blank body reads as `{}`.
fn parse_input<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    let raw: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
        b"{}"
    } else {
        body
    };

    serde_json::from_slice(raw).map_err(|e| {
        ApiError(CashdeskError::Validation {
            message: format!("Invalid request body: {e}"),
            field: None,
        })
    })
}

/// Build the HTTP router.
pub fn router(cashdesk: Cashdesk) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/rpc/registerUser", post(register_user))
        .route("/rpc/loginUser", post(login_user))
        .route("/rpc/adminLogin", post(admin_login))
        .route("/rpc/getUserById", post(get_user_by_id))
        .route("/rpc/createDeposit", post(create_deposit))
        .route("/rpc/getUserDeposits", post(get_user_deposits))
        .route("/rpc/getAllDeposits", post(get_all_deposits))
        .route("/rpc/processDeposit", post(process_deposit))
        .route("/rpc/createWithdrawal", post(create_withdrawal))
        .route("/rpc/getUserWithdrawals", post(get_user_withdrawals))
        .route("/rpc/getAllWithdrawals", post(get_all_withdrawals))
        .route("/rpc/processWithdrawal", post(process_withdrawal))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(cashdesk)
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
    timestamp: String,
}

async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        timestamp: Utc::now().to_rfc3339(),
    })
}

async fn metrics(State(cashdesk): State<Cashdesk>) -> Json<MetricsSnapshot> {
    Json(cashdesk.metrics())
}

async fn register_user(State(cashdesk): State<Cashdesk>, body: Bytes) -> RpcResult<User> {
    Ok(Json(cashdesk.register_user(parse_input(&body)?).await?))
}

async fn login_user(State(cashdesk): State<Cashdesk>, body: Bytes) -> RpcResult<User> {
    Ok(Json(cashdesk.login_user(parse_input(&body)?).await?))
}

async fn admin_login(State(cashdesk): State<Cashdesk>, body: Bytes) -> RpcResult<User> {
    Ok(Json(cashdesk.admin_login(parse_input(&body)?).await?))
}

async fn get_user_by_id(State(cashdesk): State<Cashdesk>, body: Bytes) -> RpcResult<User> {
    let input: UserIdInput = parse_input(&body)?;
    Ok(Json(cashdesk.get_user_by_id(input.user_id).await?))
}

async fn create_deposit(State(cashdesk): State<Cashdesk>, body: Bytes) -> RpcResult<DepositRequest> {
    Ok(Json(cashdesk.create_deposit(parse_input(&body)?).await?))
}

async fn get_user_deposits(
    State(cashdesk): State<Cashdesk>,
    body: Bytes,
) -> RpcResult<Vec<DepositRequest>> {
    let input: UserIdInput = parse_input(&body)?;
    Ok(Json(cashdesk.get_user_deposits(input.user_id).await?))
}

async fn get_all_deposits(State(cashdesk): State<Cashdesk>) -> RpcResult<Vec<DepositRequest>> {
    Ok(Json(cashdesk.get_all_deposits().await?))
}

async fn process_deposit(
    State(cashdesk): State<Cashdesk>,
    body: Bytes,
) -> RpcResult<DepositRequest> {
    Ok(Json(cashdesk.process_deposit(parse_input(&body)?).await?))
}

async fn create_withdrawal(
    State(cashdesk): State<Cashdesk>,
    body: Bytes,
) -> RpcResult<WithdrawalRequest> {
    Ok(Json(cashdesk.create_withdrawal(parse_input(&body)?).await?))
}

async fn get_user_withdrawals(
    State(cashdesk): State<Cashdesk>,
    body: Bytes,
) -> RpcResult<Vec<WithdrawalRequest>> {
    let input: UserIdInput = parse_input(&body)?;
    Ok(Json(cashdesk.get_user_withdrawals(input.user_id).await?))
}

async fn get_all_withdrawals(
    State(cashdesk): State<Cashdesk>,
) -> RpcResult<Vec<WithdrawalRequest>> {
    Ok(Json(cashdesk.get_all_withdrawals().await?))
}

async fn process_withdrawal(
    State(cashdesk): State<Cashdesk>,
    body: Bytes,
) -> RpcResult<WithdrawalRequest> {
    Ok(Json(cashdesk.process_withdrawal(parse_input(&body)?).await?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AdminConfig;
    use axum::body::Body;
    use axum::http::Request;
    use cashdesk_ledger::MemoryStore;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let admin = AdminConfig {
            password: "admin-pass".to_string(),
            ..AdminConfig::default()
        };
        router(Cashdesk::new(Arc::new(MemoryStore::new()), &admin).unwrap())
    }

    async fn call(app: &Router, procedure: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(format!("/rpc/{procedure}"))
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn register(app: &Router, username: &str) -> i64 {
        let (status, user) = call(
            app,
            "registerUser",
            json!({
                "username": username,
                "email": format!("{username}@example.com"),
                "password": "password123"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        user["id"].as_i64().unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "ok");
        assert!(body["timestamp"].is_string());
    }

    #[tokio::test]
    async fn test_register_hides_password_hash() {
        let app = app();
        let (status, user) = call(
            &app,
            "registerUser",
            json!({"username": "dave", "email": "dave@example.com", "password": "password123"}),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(user["balance"], "0.00");
        assert_eq!(user["is_admin"], false);
        assert!(user.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let app = app();
        register(&app, "erin").await;

        let (status, body) = call(
            &app,
            "registerUser",
            json!({"username": "erin", "email": "other@example.com", "password": "password123"}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "CONFLICT");

        let (status, body) = call(
            &app,
            "loginUser",
            json!({"username": "erin", "password": "wrong-password"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["message"], "Invalid username or password");

        let (status, body) = call(&app, "getUserById", json!({"user_id": 999})).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "USER_NOT_FOUND");

        let (status, body) = call(&app, "getUserById", json!({"user_id": "abc"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_deposit_and_withdrawal_over_rpc() {
        let app = app();
        let user_id = register(&app, "frank").await;

        let (status, deposit) = call(
            &app,
            "createDeposit",
            json!({"user_id": user_id, "amount": 100, "payment_method": "OVO"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(deposit["status"], "PENDING");
        assert_eq!(deposit["target_number"], "083194537338");
        assert_eq!(deposit["amount"], "100.00");

        let (status, processed) = call(
            &app,
            "processDeposit",
            json!({"deposit_id": deposit["id"], "status": "APPROVED", "admin_notes": "ok"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(processed["status"], "APPROVED");

        let (status, body) = call(
            &app,
            "processDeposit",
            json!({"deposit_id": deposit["id"], "status": "REJECTED"}),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["code"], "ALREADY_PROCESSED");

        let (status, body) = call(
            &app,
            "createWithdrawal",
            json!({
                "user_id": user_id,
                "amount": "150.00",
                "bank_name": "BCA",
                "account_number": "1234567890",
                "account_holder_name": "Frank"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"]["code"], "INSUFFICIENT_FUNDS");

        let (status, withdrawal) = call(
            &app,
            "createWithdrawal",
            json!({
                "user_id": user_id,
                "amount": "40.25",
                "bank_name": "BCA",
                "account_number": "1234567890",
                "account_holder_name": "Frank"
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = call(
            &app,
            "processWithdrawal",
            json!({"withdrawal_id": withdrawal["id"], "status": "APPROVED"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, user) = call(&app, "getUserById", json!({"user_id": user_id})).await;
        assert_eq!(user["balance"], "59.75");

        let (_, deposits) = call(&app, "getUserDeposits", json!({"user_id": user_id})).await;
        assert_eq!(deposits.as_array().unwrap().len(), 1);

        let (_, withdrawals) = call(&app, "getAllWithdrawals", json!({})).await;
        assert_eq!(withdrawals.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_decision_is_validation_error() {
        let app = app();

        let (status, body) = call(
            &app,
            "processDeposit",
            json!({"deposit_id": 1, "status": "PENDING"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_argument_less_procedures_accept_empty_body() {
        let app = app();

        let request = Request::builder()
            .method("POST")
            .uri("/rpc/getAllDeposits")
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&bytes[..], b"[]");
    }

    #[tokio::test]
    async fn test_admin_login_and_metrics() {
        let app = app();

        let (status, admin) = call(
            &app,
            "adminLogin",
            json!({"username": "admin", "password": "admin-pass"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(admin["is_admin"], true);

        let (status, _) = call(
            &app,
            "adminLogin",
            json!({"username": "admin", "password": "admin"}),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let response = app
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let metrics: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(metrics["logins_failed"], 1);
    }

    #[test]
    fn test_database_errors_are_not_leaked() {
        let response = ApiError(CashdeskError::Database(
            "relation \"users\" does not exist".to_string(),
        ))
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
