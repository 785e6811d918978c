//! User handlers (sign-up, login, access token renewal)

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, header},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ok};
use super::super::validation::{ValidatedJson, validate_full_name, validate_username};
use crate::db::{CreateSessionParams, CreateUserParams, UpdateSessionAccessParams, User, queries};
use crate::password;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(
        length(min = 3, max = 100),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(length(min = 6, max = 100))]
    pub password: String,
    #[validate(
        length(min = 3, max = 100),
        custom(function = "validate_full_name")
    )]
    pub full_name: String,
    #[validate(email, length(max = 200))]
    pub email: String,
}

/// User as exposed to clients (no password hash)
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub username: String,
    pub full_name: String,
    pub email: String,
    pub password_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            username: user.username,
            full_name: user.full_name,
            email: user.email,
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
        }
    }
}

/// POST /users
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<UserResponse> {
    let hashed_password = password::hash_password(&req.password)?;
    let user = queries::create_user(
        state.pool(),
        &CreateUserParams {
            username: req.username,
            full_name: req.full_name,
            email: req.email,
            hashed_password,
        },
    )
    .await?;

    tracing::info!(username = %user.username, "User created");
    ok(user.into())
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginUserRequest {
    #[validate(
        length(min = 3, max = 100),
        custom(function = "validate_username")
    )]
    pub username: String,
    #[validate(length(min = 6, max = 100))]
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginUserResponse {
    pub session_id: Uuid,
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_token_expires_at: DateTime<Utc>,
    pub user: UserResponse,
}

/// POST /users/login
///
/// Issues an access token and a refresh token. The refresh token's payload
/// id becomes the session id.
pub async fn login_user(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    ValidatedJson(req): ValidatedJson<LoginUserRequest>,
) -> ApiResult<LoginUserResponse> {
    let user = queries::get_user(state.pool(), &req.username)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ApiError::not_found("user not found")
            } else {
                e.into()
            }
        })?;
    password::check_password(&req.password, &user.hashed_password)?;

    let maker = &state.token_maker;
    let (access_token, access_payload) =
        maker.create_token(&user.username, state.token_config.access_token_duration())?;
    let (refresh_token, refresh_payload) =
        maker.create_token(&user.username, state.token_config.refresh_token_duration())?;

    let session = queries::create_session(
        state.pool(),
        &CreateSessionParams {
            id: refresh_payload.id,
            username: user.username.clone(),
            access_token: access_token.clone(),
            access_expires_at: access_payload.expired_at,
            refresh_token: refresh_token.clone(),
            refresh_expires_at: refresh_payload.expired_at,
            user_agent: header_str(&headers, header::USER_AGENT.as_str()),
            client_ip: client_ip(&headers),
        },
    )
    .await?;

    tracing::info!(username = %user.username, session_id = %session.id, "User logged in");
    ok(LoginUserResponse {
        session_id: session.id,
        access_token,
        access_token_expires_at: access_payload.expired_at,
        refresh_token,
        refresh_token_expires_at: refresh_payload.expired_at,
        user: user.into(),
    })
}

#[derive(Debug, Deserialize, Validate)]
pub struct RenewAccessTokenRequest {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RenewAccessTokenResponse {
    pub access_token: String,
    pub access_token_expires_at: DateTime<Utc>,
}

/// POST /tokens/renew_access
pub async fn renew_access_token(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RenewAccessTokenRequest>,
) -> ApiResult<RenewAccessTokenResponse> {
    let refresh_payload = state.token_maker.verify_token(&req.refresh_token)?;

    let session = queries::get_session(state.pool(), refresh_payload.id)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ApiError::not_found("session not found")
            } else {
                e.into()
            }
        })?;

    if session.is_blocked {
        return ApiError::unauthorized("blocked session").into_err();
    }
    if session.username != refresh_payload.username {
        return ApiError::unauthorized("incorrect session user").into_err();
    }
    if session.refresh_token != req.refresh_token {
        return ApiError::unauthorized("mismatched session token").into_err();
    }
    if Utc::now() > session.refresh_expires_at {
        return ApiError::unauthorized("expired session").into_err();
    }

    let (access_token, access_payload) = state.token_maker.create_token(
        &refresh_payload.username,
        state.token_config.access_token_duration(),
    )?;
    queries::update_session_access(
        state.pool(),
        &UpdateSessionAccessParams {
            id: session.id,
            access_token: access_token.clone(),
            access_expires_at: access_payload.expired_at,
        },
    )
    .await?;

    tracing::debug!(session_id = %session.id, "Access token renewed");
    ok(RenewAccessTokenResponse {
        access_token,
        access_token_expires_at: access_payload.expired_at,
    })
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// First hop of `x-forwarded-for`, else `x-real-ip`
fn client_ip(headers: &HeaderMap) -> Option<String> {
    header_str(headers, "x-forwarded-for")
        .and_then(|v| v.split(',').next().map(|ip| ip.trim().to_string()))
        .filter(|ip| !ip.is_empty())
        .or_else(|| header_str(headers, "x-real-ip"))
}
