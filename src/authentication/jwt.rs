use chrono::Duration;
use chrono::Local;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::schema::{Id, User};
use crate::error::Error;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct JwtSessionData {
    pub user_id: Id,
    pub email: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Id, email: String, ttl: Duration) -> Self {
        let now = Local::now();
        let iat = now.timestamp();
        let exp = (now + ttl).timestamp();

        Self {
            user_id: id,
            email,
            iat,
            exp,
        }
    }

    pub fn is_expired(&self) -> bool {
        (self.exp - Local::now().timestamp()).is_negative()
    }
}

/// Signs and verifies session tokens with one HMAC-SHA256 key.
#[derive(Clone)]
pub struct SessionKeys {
    key: Hmac<Sha256>,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &[u8], ttl_hours: i64) -> Result<Self, Error> {
        let key = Hmac::new_from_slice(secret)
            .map_err(|e| Error::Internal(format!("Invalid session secret: {e}")))?;

        Ok(Self {
            key,
            ttl: Duration::hours(ttl_hours),
        })
    }

    pub fn generate_session(&self, user: &User) -> Result<String, Error> {
        let claims = JwtSessionData::new(user.id, user.email.to_owned(), self.ttl);

        claims
            .sign_with_key(&self.key)
            .map_err(|e| Error::Internal(format!("Failed to sign session: {e}")))
    }

    pub fn verify_session(&self, token: &str) -> Result<JwtSessionData, Error> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| Error::Authentication("Invalid token.".to_owned()))?;

        if session.is_expired() {
            return Err(Error::Authentication("Token has expired.".to_owned()));
        }
        Ok(session)
    }
}
