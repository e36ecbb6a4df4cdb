//! Identity tokens handed out on a successful join.
//!
//! A token is `base64url(<user id>.<hex hmac-sha256 of the user id>)`, so a client can
//! come back later with `[null, token]` instead of a username.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is not valid base64")]
    Encoding,
    #[error("token has no signature")]
    Shape,
    #[error("token carries an invalid user id")]
    UserId,
    #[error("token signature mismatch")]
    Signature,
}

#[derive(Clone)]
pub struct Tokens {
    secret: Vec<u8>,
}

impl Tokens {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self { secret: secret.into() }
    }

    pub fn issue(&self, user_id: Uuid) -> String {
        let user_id = user_id.to_string();
        let signature = hex::encode(self.mac(&user_id).finalize().into_bytes());
        URL_SAFE_NO_PAD.encode(format!("{user_id}.{signature}"))
    }

    pub fn resolve(&self, token: &str) -> Result<Uuid, TokenError> {
        let decoded = URL_SAFE_NO_PAD
            .decode(token.as_bytes())
            .map_err(|_| TokenError::Encoding)?;
        let decoded = String::from_utf8(decoded).map_err(|_| TokenError::Encoding)?;

        let (user_id, signature) = decoded.split_once('.').ok_or(TokenError::Shape)?;
        let signature = hex::decode(signature).map_err(|_| TokenError::Signature)?;

        // constant time
        self.mac(user_id)
            .verify_slice(&signature)
            .map_err(|_| TokenError::Signature)?;

        Uuid::parse_str(user_id).map_err(|_| TokenError::UserId)
    }

    fn mac(&self, user_id: &str) -> HmacSha256 {
        let mut mac = HmacSha256::new_from_slice(&self.secret).expect("HMAC takes keys of any length");
        mac.update(user_id.as_bytes());
        mac
    }
}
