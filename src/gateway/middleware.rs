use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

use super::state::AppState;
use super::types::{ApiError, error_codes};

const AUTHORIZATION_TYPE_BEARER: &str = "bearer";

/// Splits `<scheme> <token>` and checks the scheme is bearer (any case)
pub fn parse_bearer(header_value: &str) -> Result<&str, ApiError> {
    let mut fields = header_value.split_whitespace();
    let (Some(scheme), Some(token)) = (fields.next(), fields.next()) else {
        return Err(ApiError::unauthorized("invalid authorization header format"));
    };
    if !scheme.eq_ignore_ascii_case(AUTHORIZATION_TYPE_BEARER) {
        return Err(ApiError::unauthorized(format!(
            "unsupported authorization type {scheme}"
        )));
    }
    Ok(token)
}

/// Verifies the bearer token and stores its [`crate::token::Payload`] in
/// the request extensions for handlers to read.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| {
            ApiError::new(
                StatusCode::UNAUTHORIZED,
                error_codes::MISSING_AUTH,
                "authorization header is not provided",
            )
        })?;

    let token = parse_bearer(auth_header)?;
    let payload = state.token_maker.verify_token(token)?;
    tracing::debug!(username = %payload.username, "Request authenticated");

    request.extensions_mut().insert(payload);
    Ok(next.run(request).await)
}
