//! Input validation for account fields

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

/// Longest username the schema accepts
pub const MAX_USERNAME_LEN: usize = 80;

/// Longest password hashed; anything longer is rejected before hashing
pub const MAX_PASSWORD_LEN: usize = 1024;

// Printable characters only. Inner spaces are fine, the edges are trimmed.
static USERNAME_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\p{Cc}]+$").expect("static username pattern")
});

/// Trimmed username, or a validation error
pub fn validate_username(username: &str) -> Result<String> {
    let username = username.trim();
    if username.is_empty() {
        return Err(Error::validation("username and password required"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(Error::validation(format!(
            "username longer than {} characters",
            MAX_USERNAME_LEN
        )));
    }
    if !USERNAME_REGEX.is_match(username) {
        return Err(Error::validation("username contains control characters"));
    }
    Ok(username.to_string())
}

/// Trimmed password, or a validation error
pub fn validate_password(password: &str, min_length: usize) -> Result<String> {
    let password = password.trim();
    if password.is_empty() {
        return Err(Error::validation("username and password required"));
    }
    let len = password.chars().count();
    if len < min_length {
        return Err(Error::validation(format!(
            "password must be at least {} characters",
            min_length
        )));
    }
    if len > MAX_PASSWORD_LEN {
        return Err(Error::validation("password too long"));
    }
    Ok(password.to_string())
}

/// `LIKE` pattern matching every username that starts with `query`.
///
/// `%`, `_` and the escape character itself are escaped, so user input is
/// only ever a literal prefix. Pair with `ESCAPE '\'`.
pub fn prefix_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 1);
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_username_is_trimmed() {
        assert_eq!(validate_username("  alice ").unwrap(), "alice");
        assert_eq!(validate_username("mary jane").unwrap(), "mary jane");
    }

    #[test]
    fn test_username_rejections() {
        assert!(validate_username("   ").is_err());
        assert!(validate_username("bad\u{0007}name").is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LEN + 1)).is_err());
        assert!(validate_username(&"x".repeat(MAX_USERNAME_LEN)).is_ok());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("", 1).is_err());
        assert!(validate_password("abc", 4).is_err());
        assert_eq!(validate_password(" abcd ", 4).unwrap(), "abcd");
    }

    #[test]
    fn test_prefix_pattern_escapes_wildcards() {
        assert_eq!(prefix_pattern("al"), "al%");
        assert_eq!(prefix_pattern("50%_"), "50\\%\\_%");
        assert_eq!(prefix_pattern("a\\b"), "a\\\\b%");
    }
}
