//! Passphrase validation.
//!
//! Passfile passphrases guard one passfile each and are chosen per passfile,
//! so the minimum length is configurable rather than fixed.

use crate::error::{PassfileError, Result};

/// Default minimum passphrase length in characters.
pub const DEFAULT_MIN_PASSPHRASE_LENGTH: usize = 1;

/// Validate passphrase meets minimum requirements.
///
/// # Requirements
///
/// - Not empty or only whitespace
/// - At least `min_length` characters long
///
/// # Examples
///
/// ```
/// use passfile_core::crypto::validate_passphrase;
///
/// assert!(validate_passphrase("my-secure-passphrase-123", 8).is_ok());
/// assert!(validate_passphrase("short", 8).is_err());
/// ```
pub fn validate_passphrase(passphrase: &str, min_length: usize) -> Result<()> {
    if passphrase.trim().is_empty() {
        return Err(PassfileError::InvalidInput(
            "Passphrase cannot be empty".to_string(),
        ));
    }

    let length = passphrase.chars().count();
    if length < min_length {
        return Err(PassfileError::InvalidInput(format!(
            "Passphrase must be at least {} characters (got {})",
            min_length, length
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_passphrase() {
        assert!(validate_passphrase("my-secure-passphrase-123", 8).is_ok());
        assert!(validate_passphrase("x", DEFAULT_MIN_PASSPHRASE_LENGTH).is_ok());
    }

    #[test]
    fn test_passphrase_too_short() {
        let result = validate_passphrase("short", 8);
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("at least 8 characters"));
    }

    #[test]
    fn test_passphrase_empty() {
        assert!(validate_passphrase("", 0).is_err());
        assert!(validate_passphrase("   ", 0).is_err());
        assert!(validate_passphrase("\n\t", 0).is_err());
    }

    #[test]
    fn test_length_counts_characters_not_bytes() {
        assert!(validate_passphrase("пароль", 6).is_ok());
    }
}
