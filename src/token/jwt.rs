use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};

use super::payload::{Clock, IdSource, Payload, RandomIds, SystemClock};
use super::{Maker, TokenError};

const MIN_SECRET_KEY_SIZE: usize = 32;

/// HS256-signed JWT maker. The payload is readable by anyone holding the
/// token; only integrity is protected.
pub struct JwtMaker {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
}

impl JwtMaker {
    pub fn new(secret_key: &str) -> Result<Self, TokenError> {
        if secret_key.len() < MIN_SECRET_KEY_SIZE {
            return Err(TokenError::KeyTooSmall {
                min: MIN_SECRET_KEY_SIZE,
            });
        }

        // Only HS256 is accepted. Expiry is checked against our own clock
        // after the signature, with no leeway.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.leeway = 0;

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret_key.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret_key.as_bytes()),
            validation,
            clock: Arc::new(SystemClock),
            ids: Arc::new(RandomIds),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_source(mut self, ids: Arc<dyn IdSource>) -> Self {
        self.ids = ids;
        self
    }
}

impl Maker for JwtMaker {
    fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(self.ids.next_id(), username, duration, self.clock.now())?;
        let token = encode(&Header::new(Algorithm::HS256), &payload, &self.encoding_key)
            .map_err(|e| TokenError::Encode(e.to_string()))?;
        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        let data = decode::<Payload>(token, &self.decoding_key, &self.validation)
            .map_err(|_| TokenError::InvalidToken)?;
        data.claims.check_expiry(self.clock.now())?;
        Ok(data.claims)
    }
}
