//! Input validation for contact identifiers, presented tokens and signup fields.
//!
//! Everything here is pure: no storage access, no logging of raw values.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::models::AuthError;

/// Upper bound on a presented token value; anything longer is rejected unseen
pub const MAX_TOKEN_LENGTH: usize = 256;

// Digits, spaces and the usual punctuation people type into phone fields
static PHONE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9 ()\-]+$").expect("phone pattern compiles"));

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles")
});

// base64url alphabet, also covers hex
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").expect("token pattern compiles"));

const MIN_PHONE_DIGITS: usize = 7;
const MAX_PHONE_DIGITS: usize = 15;

/// A validated way of reaching a candidate
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContactIdentifier {
    /// Trimmed phone number, formatting preserved
    Phone(String),
    /// Trimmed, lower-cased email address
    Email(String),
}

impl ContactIdentifier {
    /// Parse a phone number.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the value is empty or not phone-shaped.
    pub fn phone(raw: &str) -> Result<Self, AuthError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AuthError::InvalidRequest(
                "Phone number is required".to_string(),
            ));
        }

        let digits = trimmed.chars().filter(char::is_ascii_digit).count();
        if !PHONE_PATTERN.is_match(trimmed)
            || !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&digits)
        {
            return Err(AuthError::InvalidRequest(
                "Phone number is not valid".to_string(),
            ));
        }

        Ok(Self::Phone(trimmed.to_string()))
    }

    /// Parse an email address.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the value is empty or not email-shaped.
    pub fn email(raw: &str) -> Result<Self, AuthError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AuthError::InvalidRequest("Email is required".to_string()));
        }
        if !EMAIL_PATTERN.is_match(trimmed) {
            return Err(AuthError::InvalidRequest(
                "Email address is not valid".to_string(),
            ));
        }
        Ok(Self::Email(trimmed.to_lowercase()))
    }

    /// Accept either form; anything containing `@` is treated as an email.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRequest` when the value matches neither form.
    pub fn parse(raw: &str) -> Result<Self, AuthError> {
        if raw.contains('@') {
            Self::email(raw)
        } else {
            Self::phone(raw)
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Phone(value) | Self::Email(value) => value,
        }
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        match self {
            Self::Phone(value) | Self::Email(value) => value,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Phone(_) => "phone",
            Self::Email(_) => "email",
        }
    }
}

// Log-safe rendering: keeps only the last few characters
impl fmt::Display for ContactIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = self.as_str();
        let visible: String = value
            .chars()
            .rev()
            .take(3)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        write!(f, "{}:***{}", self.kind(), visible)
    }
}

/// Canonical form of a phone number used for uniqueness and lookups: the
/// leading `+` (if any) followed by the digits. Display formatting is kept
/// separately on the candidate.
#[must_use]
pub fn phone_key(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut key = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        key.push('+');
    }
    key.extend(trimmed.chars().filter(char::is_ascii_digit));
    key
}

/// Cheap shape check run before a presented token reaches the store
#[must_use]
pub fn is_well_formed_token(value: &str) -> bool {
    !value.is_empty() && value.len() <= MAX_TOKEN_LENGTH && TOKEN_PATTERN.is_match(value)
}

/// Return the trimmed value of a required text field.
///
/// # Errors
///
/// Returns `InvalidRequest` naming the field when it is missing or blank.
pub fn required_field<'a>(value: Option<&'a str>, label: &str) -> Result<&'a str, AuthError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(AuthError::InvalidRequest(format!("{label} is required"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_keeps_formatting() {
        let id = ContactIdentifier::phone("  +44 7700 900000 ").unwrap();
        assert_eq!(id, ContactIdentifier::Phone("+44 7700 900000".to_string()));
        assert!(ContactIdentifier::phone("(020) 7946-0018").is_ok());
    }

    #[test]
    fn test_phone_key_ignores_formatting() {
        assert_eq!(phone_key("+44 7700 900000"), "+447700900000");
        assert_eq!(phone_key("+447700 900000"), "+447700900000");
        assert_eq!(phone_key("(020) 7946-0018"), "02079460018");
        assert_ne!(phone_key("+447700900000"), phone_key("447700900000"));
    }

    #[test]
    fn test_phone_rejections() {
        for bad in ["", "   ", "12345", "+44 7700 900000 ext 1", "1234567890123456", "+"] {
            assert!(
                matches!(
                    ContactIdentifier::phone(bad),
                    Err(AuthError::InvalidRequest(_))
                ),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn test_email_is_lowercased() {
        let id = ContactIdentifier::email(" Amira.Khan@Example.COM ").unwrap();
        assert_eq!(id.as_str(), "amira.khan@example.com");
        assert!(ContactIdentifier::email("not-an-email").is_err());
        assert!(ContactIdentifier::email("a@b").is_err());
    }

    #[test]
    fn test_parse_dispatches_on_at_sign() {
        assert_eq!(ContactIdentifier::parse("ta@school.org").unwrap().kind(), "email");
        assert_eq!(ContactIdentifier::parse("07700900000").unwrap().kind(), "phone");
    }

    #[test]
    fn test_display_masks_value() {
        let id = ContactIdentifier::phone("+44 7700 900123").unwrap();
        assert_eq!(id.to_string(), "phone:***123");
    }

    #[test]
    fn test_token_shape() {
        assert!(is_well_formed_token("abcDEF012-_"));
        assert!(!is_well_formed_token(""));
        assert!(!is_well_formed_token("has space"));
        assert!(!is_well_formed_token("a/b"));
        assert!(!is_well_formed_token(&"a".repeat(MAX_TOKEN_LENGTH + 1)));
    }

    #[test]
    fn test_required_field() {
        assert_eq!(required_field(Some(" Amira "), "First name").unwrap(), "Amira");
        let err = required_field(Some("  "), "First name").unwrap_err();
        assert_eq!(err.to_string(), "invalid request: First name is required");
        assert!(required_field(None, "Password").is_err());
    }
}
