//! Canonical phone number handling
//!
//! The canonical `+<country><subscriber>` string is the sole matching key
//! between identities and the debts recorded against them, so every phone
//! number entering the system passes through [`canonicalize`] first.

use thiserror::Error;

/// Rejected phone number input
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("Phone number must be in international format: {0}")]
    NotInternational(String),

    #[error("Phone number contains invalid characters: {0}")]
    InvalidCharacters(String),

    #[error("Phone number has an invalid length: {0}")]
    InvalidLength(String),
}

/// Normalize a phone number to canonical `+<country><subscriber>` form.
///
/// Separators (spaces, dashes, dots, parentheses) are stripped and a leading
/// `00` international prefix is rewritten to `+`. The result must satisfy the
/// E.164 shape: a `+`, a non-zero leading digit, and 8 to 15 digits total.
pub fn canonicalize(input: &str) -> Result<String, PhoneError> {
    let compact: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    let digits = match compact.strip_prefix('+') {
        Some(rest) => rest,
        None => compact
            .strip_prefix("00")
            .ok_or_else(|| PhoneError::NotInternational(input.to_string()))?,
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(PhoneError::InvalidCharacters(input.to_string()));
    }

    if digits.starts_with('0') || !(8..=15).contains(&digits.len()) {
        return Err(PhoneError::InvalidLength(input.to_string()));
    }

    Ok(format!("+{}", digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_input_passes_through() {
        assert_eq!(
            canonicalize("+2348012345678").unwrap(),
            "+2348012345678"
        );
    }

    #[test]
    fn test_separators_are_stripped() {
        assert_eq!(
            canonicalize("+234 801 234-5678").unwrap(),
            "+2348012345678"
        );
        assert_eq!(canonicalize("+1 (415) 555.0100").unwrap(), "+14155550100");
    }

    #[test]
    fn test_double_zero_prefix_is_rewritten() {
        assert_eq!(
            canonicalize("002348012345678").unwrap(),
            "+2348012345678"
        );
    }

    #[test]
    fn test_national_format_is_rejected() {
        assert!(matches!(
            canonicalize("08012345678"),
            Err(PhoneError::NotInternational(_))
        ));
    }

    #[test]
    fn test_letters_are_rejected() {
        assert!(matches!(
            canonicalize("+23480ABCDEFG"),
            Err(PhoneError::InvalidCharacters(_))
        ));
    }

    #[test]
    fn test_length_bounds() {
        // Too short
        assert!(matches!(
            canonicalize("+1234567"),
            Err(PhoneError::InvalidLength(_))
        ));
        // Too long
        assert!(matches!(
            canonicalize("+1234567890123456"),
            Err(PhoneError::InvalidLength(_))
        ));
        // Country codes never start with zero
        assert!(matches!(
            canonicalize("+0812345678"),
            Err(PhoneError::InvalidLength(_))
        ));
    }
}
