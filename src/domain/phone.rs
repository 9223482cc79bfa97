//! M-Pesa phone number handling.
//!
//! Normalization is lenient and total: it always produces some string, which
//! is then checked separately with [`is_valid`]. The split lets a UI show
//! formatting feedback before enough digits have been typed to validate.

use crate::error::ValidationError;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const COUNTRY_CODE: &str = "254";
pub const TRUNK_PREFIX: char = '0';
pub const SUBSCRIBER_DIGITS: usize = 9;
pub const CANONICAL_LEN: usize = COUNTRY_CODE.len() + SUBSCRIBER_DIGITS;

/// Converts user input into the gateway's `254XXXXXXXXX` shape, best effort.
pub fn normalize(raw: &str) -> String {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if let Some(rest) = digits.strip_prefix(TRUNK_PREFIX) {
        format!("{COUNTRY_CODE}{rest}")
    } else if digits.starts_with(COUNTRY_CODE) {
        digits
    } else if digits.len() == SUBSCRIBER_DIGITS {
        format!("{COUNTRY_CODE}{digits}")
    } else {
        digits
    }
}

/// True iff `canonical` is exactly the country code followed by 9 digits.
pub fn is_valid(canonical: &str) -> bool {
    canonical.len() == CANONICAL_LEN
        && canonical.starts_with(COUNTRY_CODE)
        && canonical.chars().all(|c| c.is_ascii_digit())
}

/// Normalizes and validates, explaining what is wrong on failure.
pub fn validate(raw: &str) -> Result<CanonicalPhone, ValidationError> {
    let digit_count = raw.chars().filter(char::is_ascii_digit).count();
    if digit_count < SUBSCRIBER_DIGITS {
        return Err(ValidationError::TooFewDigits);
    }

    // `normalize` keeps digits only, so prefix and length are all that can fail.
    let formatted = normalize(raw);
    if !formatted.starts_with(COUNTRY_CODE) {
        Err(ValidationError::WrongCountryPrefix)
    } else if formatted.len() != CANONICAL_LEN {
        Err(ValidationError::WrongLength)
    } else {
        Ok(CanonicalPhone(formatted))
    }
}

/// Live-typing feedback: `None` while the user has typed fewer than 9 digits.
pub fn feedback(raw: &str) -> Option<Result<CanonicalPhone, ValidationError>> {
    let digit_count = raw.chars().filter(char::is_ascii_digit).count();
    if digit_count < SUBSCRIBER_DIGITS {
        None
    } else {
        Some(validate(raw))
    }
}

/// A phone number that has passed [`validate`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalPhone(String);

impl CanonicalPhone {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_trunk_prefix() {
        assert_eq!(normalize("0712345678"), "254712345678");
        assert_eq!(normalize("0712 345-678"), "254712345678");
    }

    #[test]
    fn test_normalize_country_code_unchanged() {
        assert_eq!(normalize("+254 712 345 678"), "254712345678");
        assert_eq!(normalize("254712345678"), "254712345678");
    }

    #[test]
    fn test_normalize_bare_subscriber_number() {
        assert_eq!(normalize("712345678"), "254712345678");
        assert_eq!(normalize("112345678"), "254112345678");
    }

    #[test]
    fn test_normalize_is_lenient() {
        assert_eq!(normalize(""), "");
        assert_eq!(normalize("abc"), "");
        assert_eq!(normalize("12345"), "12345");
        assert_eq!(normalize("٣٤٥"), "");
    }

    #[test]
    fn test_is_valid() {
        assert!(is_valid("254712345678"));
        assert!(!is_valid("25471234567"));
        assert!(!is_valid("2547123456789"));
        assert!(!is_valid("255712345678"));
        assert!(!is_valid("254-12345678"));
    }

    #[test]
    fn test_short_inputs_never_validate() {
        for raw in ["", "0", "07123", "07123456", "71234567", "+254"] {
            assert!(!is_valid(&normalize(raw)), "{raw} should not validate");
        }
    }

    #[test]
    fn test_validate_messages() {
        assert_eq!(
            validate("0712345678").unwrap().as_str(),
            "254712345678"
        );
        assert_eq!(validate("0712"), Err(ValidationError::TooFewDigits));
        assert_eq!(
            validate("1234567890"),
            Err(ValidationError::WrongCountryPrefix)
        );
        assert_eq!(validate("07123456789"), Err(ValidationError::WrongLength));
        assert_eq!(validate("2547123456"), Err(ValidationError::WrongLength));
    }

    #[test]
    fn test_feedback_silent_while_typing() {
        assert!(feedback("0712").is_none());
        assert!(matches!(feedback("0712345678"), Some(Ok(_))));
        assert!(matches!(feedback("123456789012"), Some(Err(_))));
    }
}
