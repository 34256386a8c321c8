use std::sync::OnceLock;

use axum::{extract::Request, http::header, middleware::Next, response::Response};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;
use uuid::Uuid;

use crate::core::app_error::AppError;

/// Authenticated caller decoded from the platform bearer token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub role: String,
}

/// Caller identity for guest-facing routes; `None` for anonymous requests.
#[derive(Debug, Clone)]
pub struct Identity(pub Option<CurrentUser>);

#[derive(Debug, Deserialize)]
struct IdentityClaims {
    sub: Uuid,
    email: String,
    role: String,
    #[allow(dead_code)]
    exp: i64,
}

static DECODING_KEY: OnceLock<DecodingKey> = OnceLock::new();

fn decoding_key() -> &'static DecodingKey {
    DECODING_KEY.get_or_init(|| {
        let secret = std::env::var("AUTH_JWT_SECRET")
            .unwrap_or_else(|_| "dev-auth-secret-change-in-production".to_string());
        DecodingKey::from_secret(secret.as_bytes())
    })
}

fn bearer_identity(req: &Request) -> Option<CurrentUser> {
    let header = req.headers().get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?;
    let claims = decode::<IdentityClaims>(
        token,
        decoding_key(),
        &Validation::new(Algorithm::HS256),
    )
    .ok()?
    .claims;
    Some(CurrentUser {
        id: claims.sub,
        email: claims.email,
        role: claims.role,
    })
}

/// Attaches the optional caller identity. Guest-facing routes accept
/// anonymous requests and decide authorization themselves.
pub async fn identity(mut req: Request, next: Next) -> Response {
    let identity = Identity(bearer_identity(&req));
    req.extensions_mut().insert(identity);
    next.run(req).await
}

/// Rejects requests without a valid bearer token and attaches the caller.
pub async fn staff_authorization(mut req: Request, next: Next) -> Result<Response, AppError> {
    let user = bearer_identity(&req).ok_or(AppError::Unauthorized)?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
