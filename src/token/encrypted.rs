use std::sync::Arc;

use aes_gcm::{
    Aes256Gcm, Nonce,
    aead::{Aead, KeyInit, Payload as AeadPayload},
};
use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Duration;
use rand::RngCore;

use super::payload::{Clock, IdSource, Payload, RandomIds, SystemClock};
use super::{Maker, TokenError};

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
/// Version/purpose prefix, also bound into the tag as associated data
const HEADER: &str = "v2.local.";

/// Token maker with a sealed payload (AES-256-GCM).
///
/// Wire format: `v2.local.` followed by base64url(nonce || ciphertext || tag).
/// The payload is confidential as well as tamper-evident.
pub struct EncryptedMaker {
    cipher: Aes256Gcm,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn IdSource>,
}

impl EncryptedMaker {
    pub fn new(symmetric_key: &str) -> Result<Self, TokenError> {
        if symmetric_key.len() != KEY_SIZE {
            return Err(TokenError::KeyWrongSize { expected: KEY_SIZE });
        }
        let cipher = Aes256Gcm::new_from_slice(symmetric_key.as_bytes())
            .map_err(|_| TokenError::KeyWrongSize { expected: KEY_SIZE })?;

        Ok(Self {
            cipher,
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

    fn seal(&self, plaintext: &[u8]) -> Result<String, TokenError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(
                nonce,
                AeadPayload {
                    msg: plaintext,
                    aad: HEADER.as_bytes(),
                },
            )
            .map_err(|e| TokenError::Encode(e.to_string()))?;

        let mut sealed = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(format!("{HEADER}{}", URL_SAFE_NO_PAD.encode(sealed)))
    }

    fn open(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let body = token
            .strip_prefix(HEADER)
            .ok_or(TokenError::InvalidToken)?;
        let sealed = URL_SAFE_NO_PAD
            .decode(body)
            .map_err(|_| TokenError::InvalidToken)?;
        if sealed.len() < NONCE_SIZE {
            return Err(TokenError::InvalidToken);
        }

        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_SIZE);
        self.cipher
            .decrypt(
                Nonce::from_slice(nonce_bytes),
                AeadPayload {
                    msg: ciphertext,
                    aad: HEADER.as_bytes(),
                },
            )
            .map_err(|_| TokenError::InvalidToken)
    }
}

impl Maker for EncryptedMaker {
    fn create_token(
        &self,
        username: &str,
        duration: Duration,
    ) -> Result<(String, Payload), TokenError> {
        let payload = Payload::new(self.ids.next_id(), username, duration, self.clock.now())?;
        let plaintext =
            serde_json::to_vec(&payload).map_err(|e| TokenError::Encode(e.to_string()))?;
        let token = self.seal(&plaintext)?;
        Ok((token, payload))
    }

    fn verify_token(&self, token: &str) -> Result<Payload, TokenError> {
        let plaintext = self.open(token)?;
        let payload: Payload =
            serde_json::from_slice(&plaintext).map_err(|_| TokenError::InvalidToken)?;
        payload.check_expiry(self.clock.now())?;
        Ok(payload)
    }
}
