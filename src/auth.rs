use actix_web::{dev::Payload, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::env;
use std::future::{ready, Ready};

use crate::error::ApiError;
use crate::models::Id;

/// Cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "utk";
/// Cookie carrying the refresh secret.
pub const REFRESH_COOKIE: &str = "rtk";
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;

#[derive(thiserror::Error, Debug)]
pub enum AuthError {
    #[error("JWT_SECRET not set")]
    MissingSecret,
    #[error("invalid token: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("malformed subject")]
    Subject,
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingSecret => {
                tracing::error!("JWT_SECRET missing at request time");
                ApiError::Internal
            }
            other => ApiError::Unauthorized(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

impl Claims {
    pub fn user_id(&self) -> Result<Id, AuthError> {
        self.sub.parse().map_err(|_| AuthError::Subject)
    }
}

fn secret() -> Result<String, AuthError> {
    env::var("JWT_SECRET").map_err(|_| AuthError::MissingSecret)
}

fn decode_with(token: &str, check_exp: bool) -> Result<Claims, AuthError> {
    let secret = secret()?;
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = check_exp;
    if !check_exp {
        validation.required_spec_claims.remove("exp");
    }
    let data = decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)?;
    Ok(data.claims)
}

/// Validate an access token, including its expiry.
pub fn verify_token(token: &str) -> Result<Claims, AuthError> {
    decode_with(token, true)
}

/// Validate only the signature; the refresh path accepts expired access tokens.
pub fn verify_signature(token: &str) -> Result<Claims, AuthError> {
    decode_with(token, false)
}

/// Create an access token for `user_id`.
pub fn issue_token(user_id: Id) -> Result<String, AuthError> {
    issue_token_with_ttl(user_id, ACCESS_TOKEN_TTL_SECS)
}

pub fn issue_token_with_ttl(user_id: Id, ttl_secs: i64) -> Result<String, AuthError> {
    let secret = secret()?;
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        iat: now.max(0) as usize,
        exp: (now + ttl_secs).max(0) as usize,
    };
    Ok(encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))?)
}

/// Extractor yielding the authenticated user. Reads `Authorization: Bearer`
/// first, then the access cookie.
#[derive(Debug, Clone)]
pub struct Auth {
    pub user_id: Id,
    pub claims: Claims,
}

fn authenticate(req: &HttpRequest, pl: &mut Payload) -> Result<Auth, ApiError> {
    let token = match BearerAuth::from_request(req, pl).into_inner() {
        Ok(bearer) => bearer.token().to_string(),
        Err(_) => req
            .cookie(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or_else(|| ApiError::Unauthorized("Unauthorized".into()))?,
    };
    let claims = verify_token(&token)?;
    let user_id = claims.user_id()?;
    Ok(Auth { user_id, claims })
}

impl FromRequest for Auth {
    type Error = ApiError;
    type Future = Ready<Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        ready(authenticate(req, pl))
    }
}
