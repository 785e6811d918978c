//! Money transfer handler

use std::sync::Arc;

use axum::{Extension, extract::State, http::StatusCode};
use serde::Deserialize;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, error_codes, ok};
use super::super::validation::{ValidatedJson, validate_currency};
use crate::db::{Account, TransferTxParams, TransferTxResult, queries};
use crate::token::Payload;

#[derive(Debug, Deserialize, Validate)]
pub struct TransferRequest {
    #[validate(range(min = 1))]
    pub from_account_id: i64,
    #[validate(range(min = 1))]
    pub to_account_id: i64,
    #[validate(range(min = 1))]
    pub amount: i64,
    #[validate(custom(function = "validate_currency"))]
    pub currency: String,
}

/// POST /transfers
///
/// Checks run before the transfer engine is invoked:
/// 1. body shape, positive amount, supported currency
/// 2. source and destination differ
/// 3. both accounts exist and hold `currency`
/// 4. the source account belongs to the token subject
///
/// The unit of work itself is bounded by the configured transfer timeout;
/// when it fires the in-flight transaction is dropped and rolled back.
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    Extension(payload): Extension<Payload>,
    ValidatedJson(req): ValidatedJson<TransferRequest>,
) -> ApiResult<TransferTxResult> {
    if req.from_account_id == req.to_account_id {
        return ApiError::bad_request("cannot transfer to the same account").into_err();
    }

    let from_account = valid_account(&state, req.from_account_id, &req.currency).await?;
    if from_account.owner != payload.username {
        return ApiError::new(
            StatusCode::UNAUTHORIZED,
            error_codes::PERMISSION_DENIED,
            "from account doesn't belong to the authenticated user",
        )
        .into_err();
    }
    valid_account(&state, req.to_account_id, &req.currency).await?;

    let arg = TransferTxParams {
        from_account_id: req.from_account_id,
        to_account_id: req.to_account_id,
        amount: req.amount,
    };
    let result = tokio::time::timeout(state.transfer_timeout, state.store.transfer_tx(arg))
        .await
        .map_err(|_| {
            tracing::warn!(
                from_account_id = arg.from_account_id,
                to_account_id = arg.to_account_id,
                timeout_ms = state.transfer_timeout.as_millis() as u64,
                "Transfer timed out, rolled back"
            );
            ApiError::new(
                StatusCode::GATEWAY_TIMEOUT,
                error_codes::TIMEOUT,
                "transfer timed out",
            )
        })??;

    ok(result)
}

/// Account must exist and be denominated in `currency`
async fn valid_account(
    state: &AppState,
    account_id: i64,
    currency: &str,
) -> Result<Account, ApiError> {
    let account = queries::get_account(state.pool(), account_id)
        .await
        .map_err(|e| {
            if e.is_not_found() {
                ApiError::not_found(format!("account {account_id} not found"))
            } else {
                e.into()
            }
        })?;

    if account.currency != currency {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            error_codes::CURRENCY_MISMATCH,
            format!(
                "account [{}] currency mismatch: {} vs {}",
                account.id, account.currency, currency
            ),
        ));
    }
    Ok(account)
}
