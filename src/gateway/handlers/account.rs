//! Account handlers. Every route acts on behalf of the token subject.

use std::sync::Arc;

use axum::{
    Extension,
    extract::{
        Path, Query, State,
        rejection::{PathRejection, QueryRejection},
    },
};
use serde::Deserialize;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, error_codes, ok};
use super::super::validation::{ValidatedJson, validate_currency};
use crate::db::{Account, CreateAccountParams, ListParams, queries};
use crate::token::Payload;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

/// POST /accounts
///
/// Opens a zero-balance account for the authenticated user. A second
/// account in the same currency is a constraint violation (403).
pub async fn create_account(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    ValidatedJson(req): ValidatedJson<CreateAccountRequest>,
) -> ApiResult<Account> {
    let account = queries::create_account(
        state.pool(),
        &CreateAccountParams {
            owner: payload.username,
            currency: req.currency,
            balance: 0,
        },
    )
    .await?;

    tracing::info!(account_id = account.id, owner = %account.owner, "Account created");
    ok(account)
}

/// GET /accounts/{id}
pub async fn get_account(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Account> {
    let account = owned_account(&state, &payload, path_id(id)?).await?;
    ok(account)
}

#[derive(Debug, Deserialize, Validate)]
pub struct ListAccountsQuery {
    /// Page index, zero-based
    #[validate(range(min = 0))]
    pub offset: i64,
    #[validate(range(min = 5, max = 100))]
    pub limit: i64,
}

/// GET /accounts?offset=0&limit=10
pub async fn list_accounts(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    query: Result<Query<ListAccountsQuery>, QueryRejection>,
) -> ApiResult<Vec<Account>> {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    query.validate()?;
    let page = ListParams {
        limit: query.limit,
        offset: query
            .offset
            .checked_mul(query.limit)
            .ok_or_else(|| ApiError::bad_request("offset out of range"))?,
    };
    let accounts = queries::list_accounts(state.pool(), &payload.username, page).await?;
    ok(accounts)
}

/// DELETE /accounts/{id}
///
/// Accounts that already took part in a transfer are referenced by entries
/// and cannot be deleted (403).
pub async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    id: Result<Path<i64>, PathRejection>,
) -> ApiResult<Account> {
    let account = owned_account(&state, &payload, path_id(id)?).await?;
    queries::delete_account(state.pool(), account.id).await?;

    tracing::info!(account_id = account.id, owner = %account.owner, "Account deleted");
    ok(account)
}

fn path_id(id: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    id.map(|Path(id)| id)
        .map_err(|e| ApiError::bad_request(e.body_text()))
}

/// Loads an account the token subject owns
async fn owned_account(
    state: &AppState,
    payload: &Payload,
    id: i64,
) -> Result<Account, ApiError> {
    if id < 1 {
        return Err(ApiError::bad_request("id must be a positive integer"));
    }
    let account = queries::get_account(state.pool(), id)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ApiError::not_found(format!("account {id} not found"))
            } else {
                e.into()
            }
        })?;
    if account.owner != payload.username {
        return Err(ApiError::new(
            axum::http::StatusCode::UNAUTHORIZED,
            error_codes::PERMISSION_DENIED,
            "account doesn't belong to the authenticated user",
        ));
    }
    Ok(account)
}
