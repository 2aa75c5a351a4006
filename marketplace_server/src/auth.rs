//! Access-token handling.
//!
//! The server validates HS256 bearer tokens and hands the resulting claims to the flow APIs as an
//! [`Actor`]. Token *issuance to end users* is the identity service's job, not this server's; the
//! [`TokenIssuer`] here exists so that operational tooling and tests can mint tokens against the
//! same secret the validator uses.

use std::future::{ready, Ready};

use actix_web::{error::ErrorUnauthorized, dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use marketplace_engine::{authz::Actor, db_types::Role};
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, errors::AuthError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The authenticated user id.
    pub sub: i64,
    pub role: Role,
    /// Expiry as a unix timestamp.
    pub exp: i64,
}

impl JwtClaims {
    pub fn actor(&self) -> Actor {
        Actor::new(self.sub, self.role)
    }
}

/// Claims are made available to handlers by the jwt middleware via request extensions; this
/// extractor just pulls them out.
impl FromRequest for JwtClaims {
    type Error = actix_web::Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req
            .extensions()
            .get::<JwtClaims>()
            .cloned()
            .ok_or_else(|| ErrorUnauthorized("No access token was provided."));
        ready(claims)
    }
}

#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiry: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let secret = config.jwt_secret.reveal().as_bytes();
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            expiry: config.token_expiry,
        }
    }

    /// Issue a new access token for the given user. The caller is responsible for having
    /// authenticated the user first.
    pub fn issue_token(&self, user_id: i64, role: Role) -> Result<String, AuthError> {
        let claims = JwtClaims { sub: user_id, role, exp: (Utc::now() + self.expiry).timestamp() };
        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.decoding_key, &Validation::default()).map_err(|e| {
            debug!("🔑️ Token validation failed: {e}");
            AuthError::ValidationError(e.to_string())
        })?;
        Ok(data.claims)
    }
}
