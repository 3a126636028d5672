//! Input validation utilities

use once_cell::sync::Lazy;
use regex::Regex;

/// Regex for validating usernames
static USERNAME_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9._-]*$").unwrap());

/// Regex for validating authorization key values
static AUTH_KEY_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[a-zA-Z0-9_-]+$").unwrap());

/// Validate a username
pub fn validate_username(username: &str) -> bool {
    username.len() >= 3 && username.len() <= 64 && USERNAME_REGEX.is_match(username)
}

/// Validate an authorization key value
pub fn validate_auth_key(key: &str) -> bool {
    !key.is_empty() && key.len() <= 128 && AUTH_KEY_REGEX.is_match(key)
}
