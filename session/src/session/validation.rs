//! Local credential validation and normalization.
//!
//! Everything here runs before any network call; failures are reported as
//! `AuthError::Validation`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::api::{LoginRequest, RegisterRequest};
use crate::error::AuthError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

lazy_static! {
    /// Basic `local@domain.tld` shape, no whitespace
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex is valid");
}

/// Trim and lower-case an email address
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// Check login fields and build the normalized request
pub fn login_request(email: &str, password: &str) -> Result<LoginRequest, AuthError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AuthError::Validation(
            "Email and password are required".to_string(),
        ));
    }

    Ok(LoginRequest {
        email,
        password: password.to_string(),
    })
}

/// Check registration fields and normalize name/email. Extra fields are untouched.
pub fn register_request(profile: RegisterRequest) -> Result<RegisterRequest, AuthError> {
    let name = profile.name.trim().to_string();
    let email = normalize_email(&profile.email);

    if name.is_empty() || email.is_empty() || profile.password.is_empty() {
        return Err(AuthError::Validation(
            "Name, email and password are required".to_string(),
        ));
    }
    if profile.password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if !is_valid_email(&email) {
        return Err(AuthError::Validation(
            "Please enter a valid email address".to_string(),
        ));
    }

    Ok(RegisterRequest {
        name,
        email,
        ..profile
    })
}
