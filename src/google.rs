//! # Google Sign-In
//!
//! Optional second way in, next to email/password.
//!
//! ## Flow
//! 1. Client calls `GET /user/google`, gets the Google authorize URL back and navigates to it
//! 2. Google redirects to `GOOGLE_REDIRECT_URI` with `code` and `state`
//! 3. `GET /user/google/callback` checks `state`, trades `code` for a Google access token,
//!    reads the profile and logs the user in by email (creating the account on first visit)
//! 4. Response is the same as `POST /user/login`
//!
//! ## State
//! - `issued_at.base64url(HMAC-SHA256(secret, "google-state:" + issued_at))`
//! - Valid for 10 minutes, nothing stored server side
//!
//! Accounts created here get a random password nobody knows, so they can only
//! come back through Google.
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use hmac::Mac;
use reqwest::{Client, Url};
use serde::Deserialize;

use crate::{
    auth::{HmacSha256, mac},
    config::GoogleConfig,
    error::AppError,
};

pub const STATE_TTL_SECS: i64 = 10 * 60;
const STATE_CONTEXT: &[u8] = b"google-state:";
const SCOPE: &str = "openid email profile";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Deserialize)]
pub struct Callback {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
pub struct GoogleProfile {
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    pub name: Option<String>,
}

impl GoogleProfile {
    pub fn username(&self) -> String {
        self.name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| self.email.split('@').next())
            .unwrap_or_default()
            .to_string()
    }
}

pub fn authorize_url(google: &GoogleConfig, secret: &str, now: i64) -> Result<String, AppError> {
    let state = sign_state(secret, now)?;

    let url = Url::parse_with_params(
        &google.auth_url,
        &[
            ("client_id", google.client_id.as_str()),
            ("redirect_uri", google.redirect_uri.as_str()),
            ("response_type", "code"),
            ("scope", SCOPE),
            ("state", state.as_str()),
        ],
    )
    .map_err(anyhow::Error::from)?;

    Ok(url.into())
}

fn state_mac(secret: &str, issued_at: i64) -> Result<HmacSha256, AppError> {
    let mut mac = mac(secret).map_err(anyhow::Error::from)?;
    mac.update(STATE_CONTEXT);
    mac.update(issued_at.to_string().as_bytes());

    Ok(mac)
}

fn sign_state(secret: &str, issued_at: i64) -> Result<String, AppError> {
    let signature = state_mac(secret, issued_at)?.finalize().into_bytes();

    Ok(format!("{issued_at}.{}", URL_SAFE_NO_PAD.encode(signature)))
}

pub fn verify_state(state: &str, secret: &str, now: i64) -> bool {
    let Some((issued_at, signature)) = state.split_once('.') else {
        return false;
    };
    let (Ok(issued_at), Ok(signature)) = (
        issued_at.parse::<i64>(),
        URL_SAFE_NO_PAD.decode(signature),
    ) else {
        return false;
    };

    let age = now.saturating_sub(issued_at);
    if !(0..=STATE_TTL_SECS).contains(&age) {
        return false;
    }

    state_mac(secret, issued_at)
        .map(|mac| mac.verify_slice(&signature).is_ok())
        .unwrap_or(false)
}

pub async fn fetch_profile(
    http: &Client,
    google: &GoogleConfig,
    code: &str,
) -> Result<GoogleProfile, reqwest::Error> {
    let token: TokenResponse = http
        .post(&google.token_url)
        .timeout(REQUEST_TIMEOUT)
        .form(&[
            ("code", code),
            ("client_id", google.client_id.as_str()),
            ("client_secret", google.client_secret.as_str()),
            ("redirect_uri", google.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    http.get(&google.userinfo_url)
        .timeout(REQUEST_TIMEOUT)
        .bearer_auth(&token.access_token)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "state-secret";

    fn google() -> GoogleConfig {
        GoogleConfig {
            client_id: "client-123".to_string(),
            client_secret: "shh".to_string(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
            auth_url: "https://accounts.example.com/auth".to_string(),
            token_url: "https://accounts.example.com/token".to_string(),
            userinfo_url: "https://accounts.example.com/userinfo".to_string(),
        }
    }

    #[test]
    fn test_authorize_url_params() {
        let url = Url::parse(&authorize_url(&google(), SECRET, 5_000).unwrap()).unwrap();
        assert!(url.as_str().starts_with("https://accounts.example.com/auth?"));

        let param = |key: &str| {
            url.query_pairs()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.into_owned())
        };
        assert_eq!(param("client_id").as_deref(), Some("client-123"));
        assert_eq!(
            param("redirect_uri").as_deref(),
            Some("http://localhost:3000/callback")
        );
        assert_eq!(param("response_type").as_deref(), Some("code"));
        assert_eq!(param("scope").as_deref(), Some(SCOPE));

        let state = param("state").unwrap();
        assert!(verify_state(&state, SECRET, 5_000));
    }

    #[test]
    fn test_state_window() {
        let state = sign_state(SECRET, 1_000).unwrap();

        assert!(verify_state(&state, SECRET, 1_000));
        assert!(verify_state(&state, SECRET, 1_000 + STATE_TTL_SECS));
        assert!(!verify_state(&state, SECRET, 1_001 + STATE_TTL_SECS));
        assert!(!verify_state(&state, SECRET, 999));
    }

    #[test]
    fn test_state_rejects_forgery() {
        let state = sign_state(SECRET, 1_000).unwrap();
        let (_, signature) = state.split_once('.').unwrap();

        assert!(!verify_state(&state, "other-secret", 1_000));
        assert!(!verify_state(&format!("1001.{signature}"), SECRET, 1_001));
        assert!(!verify_state("garbage", SECRET, 1_000));
        assert!(!verify_state("abc.def", SECRET, 1_000));
        assert!(!verify_state("", SECRET, 1_000));
    }

    #[test]
    fn test_username_fallback() {
        let profile = GoogleProfile {
            email: "reader@gmail.com".to_string(),
            email_verified: true,
            name: Some("  ".to_string()),
        };
        assert_eq!(profile.username(), "reader");

        let profile = GoogleProfile {
            name: Some("Ada".to_string()),
            ..profile
        };
        assert_eq!(profile.username(), "Ada");
    }
}
