//! Vietnamese mobile phone number type.
//!
//! Phone numbers are the login identifier for customers and salon owners, and the
//! contact field on guest bookings.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`PhoneNumber`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PhoneError {
    /// The input string is empty.
    #[error("phone number cannot be empty")]
    Empty,
    /// The input contains something other than digits and separators.
    #[error("phone number contains invalid character '{0}'")]
    InvalidCharacter(char),
    /// The national number does not have 10 digits.
    #[error("phone number must have 10 digits (got {0})")]
    WrongLength(usize),
    /// The number does not start with a known mobile prefix.
    #[error("phone number must start with 03, 05, 07, 08 or 09")]
    UnknownPrefix,
}

/// A normalized Vietnamese mobile number in national format (`0xxxxxxxxx`).
///
/// ## Accepted input
///
/// - National format: `0912345678`
/// - International format: `+84912345678` or `84912345678`
/// - Spaces, dots, dashes and parentheses are ignored
///
/// ## Examples
///
/// ```
/// use barberly_core::PhoneNumber;
///
/// let phone = PhoneNumber::parse("+84 912 345 678").unwrap();
/// assert_eq!(phone.as_str(), "0912345678");
///
/// assert!(PhoneNumber::parse("").is_err());
/// assert!(PhoneNumber::parse("12345").is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type), sqlx(transparent))]
#[serde(try_from = "String", into = "String")]
pub struct PhoneNumber(String);

impl PhoneNumber {
    /// Number of digits in a national mobile number.
    pub const NATIONAL_LENGTH: usize = 10;

    /// Parse and normalize a phone number.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is empty, contains characters other than digits
    /// and separators, has the wrong number of digits, or uses an unknown prefix.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(PhoneError::Empty);
        }

        let mut digits = String::with_capacity(trimmed.len());
        for (i, c) in trimmed.chars().enumerate() {
            match c {
                '0'..='9' => digits.push(c),
                '+' if i == 0 => {}
                ' ' | '.' | '-' | '(' | ')' => {}
                other => return Err(PhoneError::InvalidCharacter(other)),
            }
        }

        let national = if let Some(rest) = digits.strip_prefix("84") {
            if digits.len() == Self::NATIONAL_LENGTH + 1 {
                format!("0{rest}")
            } else {
                digits
            }
        } else {
            digits
        };

        if national.len() != Self::NATIONAL_LENGTH {
            return Err(PhoneError::WrongLength(national.len()));
        }

        let valid_prefix = ["03", "05", "07", "08", "09"]
            .iter()
            .any(|prefix| national.starts_with(prefix));
        if !valid_prefix {
            return Err(PhoneError::UnknownPrefix);
        }

        Ok(Self(national))
    }

    /// Returns the national form as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number in E.164 form (`+84xxxxxxxxx`).
    #[must_use]
    pub fn to_international(&self) -> String {
        format!("+84{}", self.0.trim_start_matches('0'))
    }

    /// Returns the number with all but the last three digits masked.
    ///
    /// Used when a phone number appears in logs or public responses.
    #[must_use]
    pub fn masked(&self) -> String {
        let visible = self.0.len().saturating_sub(3);
        let tail: String = self.0.chars().skip(visible).collect();
        format!("{}{tail}", "*".repeat(visible))
    }
}

impl fmt::Display for PhoneNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PhoneNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PhoneNumber {
    type Error = PhoneError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PhoneNumber> for String {
    fn from(phone: PhoneNumber) -> Self {
        phone.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_national() {
        let phone = PhoneNumber::parse("0912345678").unwrap();
        assert_eq!(phone.as_str(), "0912345678");
    }

    #[test]
    fn test_parse_international_forms() {
        assert_eq!(
            PhoneNumber::parse("+84912345678").unwrap().as_str(),
            "0912345678"
        );
        assert_eq!(
            PhoneNumber::parse("84 912.345-678").unwrap().as_str(),
            "0912345678"
        );
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert_eq!(PhoneNumber::parse("   "), Err(PhoneError::Empty));
        assert_eq!(
            PhoneNumber::parse("09123x5678"),
            Err(PhoneError::InvalidCharacter('x'))
        );
        assert_eq!(PhoneNumber::parse("091234"), Err(PhoneError::WrongLength(6)));
        assert_eq!(
            PhoneNumber::parse("0112345678"),
            Err(PhoneError::UnknownPrefix)
        );
    }

    #[test]
    fn test_plus_only_allowed_first() {
        assert_eq!(
            PhoneNumber::parse("09+12345678"),
            Err(PhoneError::InvalidCharacter('+'))
        );
    }

    #[test]
    fn test_international_and_masked() {
        let phone = PhoneNumber::parse("0987654321").unwrap();
        assert_eq!(phone.to_international(), "+84987654321");
        assert_eq!(phone.masked(), "*******321");
    }

    #[test]
    fn test_serde_validates() {
        let phone: PhoneNumber = serde_json::from_str("\"+84 387 000 111\"").unwrap();
        assert_eq!(phone.as_str(), "0387000111");
        assert!(serde_json::from_str::<PhoneNumber>("\"hello\"").is_err());
    }
}
