//! Request validation
//!
//! DTOs derive [`validator::Validate`]; [`ValidatedJson`] runs it at the
//! extractor level so handlers never see an invalid body.

use axum::{
    Json,
    extract::{FromRequest, Request},
};
use serde::de::DeserializeOwned;
use validator::{Validate, ValidationError, ValidationErrors};

use super::types::ApiError;

pub const SUPPORTED_CURRENCIES: [&str; 5] = ["USD", "EUR", "CAD", "YEN", "AUD"];

pub fn is_supported_currency(currency: &str) -> bool {
    SUPPORTED_CURRENCIES.contains(&currency)
}

pub fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if is_supported_currency(currency) {
        Ok(())
    } else {
        Err(ValidationError::new("currency").with_message("unsupported currency".into()))
    }
}

/// Lowercase letters, digits and underscore
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let ok = username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if ok {
        Ok(())
    } else {
        Err(ValidationError::new("username")
            .with_message("must contain only lowercase letters, digits, or underscore".into()))
    }
}

/// Letters and spaces
pub fn validate_full_name(full_name: &str) -> Result<(), ValidationError> {
    if full_name.chars().all(|c| c.is_alphabetic() || c == ' ') {
        Ok(())
    } else {
        Err(ValidationError::new("full_name")
            .with_message("must contain only letters or spaces".into()))
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(err: ValidationErrors) -> Self {
        ApiError::bad_request(err.to_string())
    }
}

/// JSON body extractor that also runs `Validate`
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value): Json<T> = Json::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;
        value.validate()?;
        Ok(ValidatedJson(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_currency_whitelist() {
        for c in SUPPORTED_CURRENCIES {
            assert!(validate_currency(c).is_ok());
        }
        assert!(validate_currency("usd").is_err());
        assert!(validate_currency("BTC").is_err());
        assert!(validate_currency("").is_err());
    }

    #[test]
    fn test_username_charset() {
        assert!(validate_username("alice_01").is_ok());
        assert!(validate_username("Alice").is_err());
        assert!(validate_username("al-ice").is_err());
    }

    #[test]
    fn test_full_name_charset() {
        assert!(validate_full_name("Alice Smith").is_ok());
        assert!(validate_full_name("Alice1").is_err());
    }
}
