//! # Accounts
//!
//! Signup and login payloads, plus the checks run on them.
//!
//! ## Signup
//! - email, username, password, repassword all required
//! - both passwords at least 8 characters and equal
//! - email must look like `local@domain.tld`
//!
//! ## Passwords
//! - Random UUID v4 salt per user
//! - Stored as hex SHA-256 of `salt || password`
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::{error::AppError, models::User};

pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern compiles")
});

#[derive(Deserialize)]
pub struct Signup {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub repassword: String,
}

#[derive(Deserialize)]
pub struct Login {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub password: String,
}

// missing and null both read as ""
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

impl Signup {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty()
            || self.username.trim().is_empty()
            || self.password.is_empty()
            || self.repassword.is_empty()
        {
            return Err(AppError::Validation(
                "Email, username and both passwords are required",
            ));
        }

        if self.password.chars().count() < MIN_PASSWORD_LEN
            || self.repassword.chars().count() < MIN_PASSWORD_LEN
        {
            return Err(AppError::Validation(
                "Password must be at least 8 characters",
            ));
        }

        if self.password != self.repassword {
            return Err(AppError::Validation("Passwords do not match"));
        }

        if !EMAIL.is_match(self.email.trim()) {
            return Err(AppError::Validation("Invalid email"));
        }

        Ok(())
    }
}

impl Login {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.email.trim().is_empty() || self.password.is_empty() {
            return Err(AppError::Validation("Email and password are required"));
        }

        Ok(())
    }
}

pub fn new_salt() -> String {
    Uuid::new_v4().simple().to_string()
}

pub fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());

    hex::encode(hasher.finalize())
}

pub fn check_password(user: &User, password: &str) -> bool {
    let given = hash_password(&user.salt, password);

    given.as_bytes().ct_eq(user.password_hash.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn signup(email: &str, username: &str, password: &str, repassword: &str) -> Signup {
        Signup {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
            repassword: repassword.to_string(),
        }
    }

    fn message(result: Result<(), AppError>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn test_valid_signup() {
        assert!(signup("a@b.io", "reader", "password1", "password1").validate().is_ok());
    }

    #[test]
    fn test_missing_fields() {
        assert_eq!(
            message(signup("", "reader", "password1", "password1").validate()),
            "Email, username and both passwords are required"
        );
        assert_eq!(
            message(signup("a@b.io", "  ", "password1", "password1").validate()),
            "Email, username and both passwords are required"
        );
    }

    #[test]
    fn test_short_password() {
        assert_eq!(
            message(signup("a@b.io", "reader", "short", "short").validate()),
            "Password must be at least 8 characters"
        );
    }

    #[test]
    fn test_mismatch() {
        assert_eq!(
            message(signup("a@b.io", "reader", "password1", "password2").validate()),
            "Passwords do not match"
        );
    }

    #[test]
    fn test_bad_email() {
        for email in ["reader", "reader@", "reader@host", "a b@c.io"] {
            assert_eq!(
                message(signup(email, "reader", "password1", "password1").validate()),
                "Invalid email"
            );
        }
    }

    #[test]
    fn test_password_check() {
        let salt = new_salt();
        let user = User {
            id: 1,
            email: "a@b.io".to_string(),
            username: "reader".to_string(),
            password_hash: hash_password(&salt, "password1"),
            salt,
            created_at: Utc::now(),
        };

        assert!(check_password(&user, "password1"));
        assert!(!check_password(&user, "password2"));
        assert!(!check_password(&user, ""));
    }

    #[test]
    fn test_null_fields_read_as_missing() {
        let signup: Signup = serde_json::from_str(
            r#"{"email": null, "username": "reader", "password": "password1"}"#,
        )
        .unwrap();
        assert_eq!(signup.email, "");
        assert_eq!(signup.repassword, "");
        assert_eq!(
            message(signup.validate()),
            "Email, username and both passwords are required"
        );

        let login: Login = serde_json::from_str(r#"{"email": "a@b.io", "password": null}"#).unwrap();
        assert_eq!(
            message(login.validate()),
            "Email and password are required"
        );
    }

    #[test]
    fn test_password_check_rejects_truncated_hash() {
        let salt = new_salt();
        let full = hash_password(&salt, "password1");
        let user = User {
            id: 1,
            email: "a@b.io".to_string(),
            username: "reader".to_string(),
            password_hash: full[..32].to_string(),
            salt,
            created_at: Utc::now(),
        };

        assert!(!check_password(&user, "password1"));
    }

    #[test]
    fn test_salts_differ() {
        assert_ne!(
            hash_password(&new_salt(), "password1"),
            hash_password(&new_salt(), "password1")
        );
    }
}
