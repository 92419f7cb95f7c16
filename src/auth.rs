//! # Verification
//!
//! Every book/review endpoint needs to know who is asking.
//!
//! ## Token
//! - `base64url(claims json).base64url(HMAC-SHA256(secret, first segment))`, unpadded
//! - Claims: user id, username, email, issued-at and expiry (unix seconds)
//! - Issued on login, lives `TOKEN_TTL_SECS`
//!
//! ## Lookup
//! Headers
//! - Authorization: `Bearer <token>`
//!
//! Cookies (only if there is no Authorization header)
//! - access_token: same token
//!
//! Anything missing, malformed, badly signed or expired is rejected with a 401
//! before the handler runs. Nothing is retried.
use std::{sync::Arc, time::Duration};

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap,
        header::{AUTHORIZATION, COOKIE},
        request::Parts,
    },
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use crate::{error::AppError, models::User, state::AppState};

pub(crate) type HmacSha256 = Hmac<Sha256>;

pub const TOKEN_COOKIE: &str = "access_token";

/// Caller identity decoded from a verified token. Lives for one request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("No token supplied")]
    Missing,

    #[error("Malformed token")]
    Malformed,

    #[error("Signature mismatch")]
    BadSignature,

    #[error("Token expired")]
    Expired,

    #[error("Invalid claims: {0}")]
    Claims(#[from] serde_json::Error),

    #[error("Invalid signing key")]
    Key,

    #[error("Token lifetime out of range")]
    Lifetime,
}

pub fn issue(user: &User, secret: &str, ttl: Duration) -> Result<String, TokenError> {
    issue_at(user, secret, ttl, Utc::now().timestamp())
}

fn issue_at(user: &User, secret: &str, ttl: Duration, now: i64) -> Result<String, TokenError> {
    let exp = i64::try_from(ttl.as_secs())
        .ok()
        .and_then(|ttl| now.checked_add(ttl))
        .ok_or(TokenError::Lifetime)?;

    let identity = Identity {
        id: user.id,
        username: user.username.clone(),
        email: user.email.clone(),
        iat: now,
        exp,
    };

    sign(&identity, secret)
}

fn sign(identity: &Identity, secret: &str) -> Result<String, TokenError> {
    let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(identity)?);

    let mut mac = mac(secret)?;
    mac.update(claims.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{claims}.{signature}"))
}

pub fn verify(token: &str, secret: &str) -> Result<Identity, TokenError> {
    verify_at(token, secret, Utc::now().timestamp())
}

fn verify_at(token: &str, secret: &str, now: i64) -> Result<Identity, TokenError> {
    let (claims, signature) = token.split_once('.').ok_or(TokenError::Malformed)?;
    if claims.is_empty() || signature.contains('.') {
        return Err(TokenError::Malformed);
    }

    let signature = URL_SAFE_NO_PAD
        .decode(signature)
        .map_err(|_| TokenError::Malformed)?;

    let mut mac = mac(secret)?;
    mac.update(claims.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let claims = URL_SAFE_NO_PAD
        .decode(claims)
        .map_err(|_| TokenError::Malformed)?;
    let identity: Identity = serde_json::from_slice(&claims)?;

    if identity.exp <= now {
        return Err(TokenError::Expired);
    }

    Ok(identity)
}

pub(crate) fn mac(secret: &str) -> Result<HmacSha256, TokenError> {
    HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::Key)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;

    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|token| !token.is_empty())
}

fn cookie_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == TOKEN_COOKIE)
        .map(|(_, token)| token)
        .filter(|token| !token.is_empty())
}

pub fn authorize(headers: &HeaderMap, secret: &str) -> Result<Identity, TokenError> {
    let token = if headers.contains_key(AUTHORIZATION) {
        bearer_token(headers).ok_or(TokenError::Malformed)?
    } else {
        cookie_token(headers).ok_or(TokenError::Missing)?
    };

    verify(token, secret)
}

impl FromRequestParts<Arc<AppState>> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        authorize(&parts.headers, &state.config.access_secret).map_err(|e| {
            debug!("Rejected {} {}: {e}", parts.method, parts.uri.path());
            AppError::Unauthorized
        })
    }
}
