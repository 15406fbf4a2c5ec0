use actix_web::{dev::Payload, http::header, web, FromRequest, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::{ready, Ready};
use thiserror::Error;

use crate::error::AppError;

/// Query parameter carrying the token for clients that cannot set headers (EventSource)
pub const ACCESS_TOKEN_PARAM: &str = "access_token";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("token verifier is not configured")]
    NotConfigured,
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        AppError::Unauthorized(err.to_string())
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// User id
    pub sub: String,
    /// Expiry, seconds since the epoch
    pub exp: i64,
}

/// HS256 token verification with a shared secret
#[derive(Clone)]
pub struct TokenVerifier {
    decoding: DecodingKey,
    encoding: EncodingKey,
    validation: Validation,
}

impl TokenVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Self {
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a token and return the user id it was issued for
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let data = decode::<Claims>(token, &self.decoding, &self.validation)?;
        Ok(data.claims.sub)
    }

    /// Issue a token for `user_id` valid for `ttl_secs`
    pub fn issue(&self, user_id: &str, ttl_secs: i64) -> Result<String, AuthError> {
        let claims = Claims {
            sub: user_id.to_string(),
            exp: Utc::now().timestamp() + ttl_secs,
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)?)
    }
}

fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
}

fn query_token(req: &HttpRequest) -> Option<String> {
    web::Query::<HashMap<String, String>>::from_query(req.query_string())
        .ok()
        .and_then(|query| query.get(ACCESS_TOKEN_PARAM).cloned())
}

/// The authenticated user making the request
#[derive(Debug, Clone, PartialEq)]
pub struct Viewer {
    pub user_id: String,
}

impl Viewer {
    fn authenticate(req: &HttpRequest) -> Result<Self, AuthError> {
        let verifier = req
            .app_data::<web::Data<TokenVerifier>>()
            .ok_or(AuthError::NotConfigured)?;
        let token = bearer_token(req)
            .or_else(|| query_token(req))
            .ok_or(AuthError::MissingToken)?;

        let user_id = verifier.verify(&token)?;
        Ok(Viewer { user_id })
    }
}

impl FromRequest for Viewer {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Viewer::authenticate(req).map_err(|e| {
            tracing::debug!("Rejected request to {}: {}", req.path(), e);
            AppError::from(e)
        }))
    }
}
