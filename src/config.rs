use std::{env, fmt::Display, fs::read_to_string, path::PathBuf, str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

const SECRETS_DIR: &str = "/run/secrets";

pub const MAX_TOKEN_TTL_SECS: u64 = 365 * 24 * 60 * 60;

const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const GOOGLE_USERINFO_URL: &str = "https://openidconnect.googleapis.com/v1/userinfo";

#[derive(Clone, Debug)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub access_secret: String,
    pub token_ttl: Duration,
    pub google: Option<GoogleConfig>,
}

/// Google sign-in, enabled only when `GOOGLE_CLIENT_ID` is set.
#[derive(Clone, Debug)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub auth_url: String,
    pub token_url: String,
    pub userinfo_url: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        Ok(Self {
            port: try_load("RUST_PORT", "1111")?,
            database_path: try_load("DATABASE_PATH", "books.db")?,
            access_secret: read_secret("ACCESS_SECRET")?,
            token_ttl: token_ttl(try_load("TOKEN_TTL_SECS", "3600")?)?,
            google: load_google()?,
        })
    }
}

fn token_ttl(secs: u64) -> Result<Duration> {
    if secs == 0 || secs > MAX_TOKEN_TTL_SECS {
        warn!("TOKEN_TTL_SECS out of range: {secs}");
        return Err(anyhow!(
            "Environment misconfigured: TOKEN_TTL_SECS must be within 1..={MAX_TOKEN_TTL_SECS}, got {secs}"
        ));
    }

    Ok(Duration::from_secs(secs))
}

fn load_google() -> Result<Option<GoogleConfig>> {
    let Some(client_id) = var("GOOGLE_CLIENT_ID") else {
        info!("GOOGLE_CLIENT_ID not set, Google sign-in disabled");
        return Ok(None);
    };

    Ok(Some(GoogleConfig {
        client_id,
        client_secret: read_secret("GOOGLE_CLIENT_SECRET")?,
        redirect_uri: var("GOOGLE_REDIRECT_URI")
            .context("GOOGLE_REDIRECT_URI required with GOOGLE_CLIENT_ID")?,
        auth_url: try_load("GOOGLE_AUTH_URL", GOOGLE_AUTH_URL)?,
        token_url: try_load("GOOGLE_TOKEN_URL", GOOGLE_TOKEN_URL)?,
        userinfo_url: try_load("GOOGLE_USERINFO_URL", GOOGLE_USERINFO_URL)?,
    }))
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn try_load<T: FromStr>(key: &str, default: &str) -> Result<T>
where
    T::Err: Display,
{
    let raw = var(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("Environment misconfigured: {key}={raw}: {e}")
    })
}

fn read_secret(secret_name: &str) -> Result<String> {
    let path = format!("{SECRETS_DIR}/{secret_name}");

    let secret = match read_to_string(&path) {
        Ok(s) => s.trim().to_string(),
        Err(e) => {
            warn!("Failed to read {secret_name} from file: {e}, trying environment");
            var(secret_name)
                .map(|s| s.trim().to_string())
                .with_context(|| format!("Secret {secret_name} misconfigured"))?
        }
    };

    if secret.is_empty() {
        return Err(anyhow!("Secret {secret_name} is empty"));
    }

    Ok(secret)
}
