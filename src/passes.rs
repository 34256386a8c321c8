//! Signed, time-bound QR pass tokens.
//!
//! A pass binds a registration to an event and attendee and is scanned at
//! the door. Tokens are HS256 JWTs with a configurable lifetime.

use chrono::{Duration, Utc};
use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode, errors::ErrorKind,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::config::PassConfig;

/// Claims carried by a QR pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassClaims {
    pub registration_id: Uuid,
    pub event_id: Uuid,
    pub attendee_id: Uuid,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Error, Debug)]
pub enum PassError {
    #[error("pass has expired")]
    Expired,

    #[error("pass signature is invalid")]
    InvalidSignature,

    #[error("pass is malformed: {0}")]
    Invalid(String),

    #[error("pass could not be minted: {0}")]
    Minting(String),
}

#[derive(Clone)]
pub struct PassCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl_hours: i64,
}

impl PassCodec {
    pub fn new(config: &PassConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.secret.as_bytes()),
            ttl_hours: config.ttl_hours,
        }
    }

    pub fn mint(
        &self,
        registration_id: Uuid,
        event_id: Uuid,
        attendee_id: Uuid,
    ) -> Result<String, PassError> {
        let now = Utc::now();
        let claims = PassClaims {
            registration_id,
            event_id,
            attendee_id,
            iat: now.timestamp(),
            exp: (now + Duration::hours(self.ttl_hours)).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| PassError::Minting(err.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<PassClaims, PassError> {
        let validation = Validation::new(Algorithm::HS256);
        let data = decode::<PassClaims>(token, &self.decoding_key, &validation).map_err(|err| {
            match err.kind() {
                ErrorKind::ExpiredSignature => PassError::Expired,
                ErrorKind::InvalidSignature => PassError::InvalidSignature,
                _ => PassError::Invalid(err.to_string()),
            }
        })?;
        Ok(data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec(secret: &str, ttl_hours: i64) -> PassCodec {
        PassCodec::new(&PassConfig {
            secret: secret.to_string(),
            ttl_hours,
        })
    }

    #[test]
    fn mint_and_verify_round_trip() {
        let codec = codec("test-secret", 72);
        let registration_id = Uuid::new_v4();
        let event_id = Uuid::new_v4();
        let attendee_id = Uuid::new_v4();

        let token = codec.mint(registration_id, event_id, attendee_id).unwrap();
        let claims = codec.verify(&token).unwrap();

        assert_eq!(claims.registration_id, registration_id);
        assert_eq!(claims.event_id, event_id);
        assert_eq!(claims.attendee_id, attendee_id);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_foreign_signature() {
        let minted = codec("secret-a", 72)
            .mint(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        let err = codec("secret-b", 72).verify(&minted).unwrap_err();
        assert!(matches!(err, PassError::InvalidSignature));
    }

    #[test]
    fn rejects_expired_pass() {
        // Negative TTL puts the expiry in the past, beyond the leeway.
        let stale = codec("test-secret", -2)
            .mint(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4())
            .unwrap();
        let err = codec("test-secret", 72).verify(&stale).unwrap_err();
        assert!(matches!(err, PassError::Expired));
    }

    #[test]
    fn rejects_garbage() {
        let err = codec("test-secret", 72).verify("not-a-token").unwrap_err();
        assert!(matches!(err, PassError::Invalid(_)));
    }
}
