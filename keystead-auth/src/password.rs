//! Password hashing and policy
//!
//! Hashes are `hex(SHA-256(pepper ":" password))`. The pepper is a
//! server-side secret shared by every account; there is no per-user salt.

use sha2::{Digest, Sha256};
use std::fmt;
use unicode_general_category::{get_general_category, GeneralCategory};

/// Bounds on the UTF-8 encoded length of a password, in bytes
pub const MIN_PASSWORD_LEN: usize = 12;
pub const MAX_PASSWORD_LEN: usize = 128;

/// Peppered one-way password hasher
#[derive(Clone)]
pub struct PasswordHasher {
    pepper: String,
}

impl fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("pepper", &"<redacted>")
            .finish()
    }
}

impl PasswordHasher {
    /// Returns `None` for an empty pepper
    pub fn new(pepper: impl Into<String>) -> Option<Self> {
        let pepper = pepper.into();
        if pepper.is_empty() {
            return None;
        }
        Some(Self { pepper })
    }

    pub fn hash(&self, password: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.pepper.as_bytes());
        hasher.update(b":");
        hasher.update(password.as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn verify(&self, password: &str, stored_hash: &str) -> bool {
        let computed = self.hash(password);
        constant_time_eq(computed.as_bytes(), stored_hash.as_bytes())
    }
}

/// Constant-time comparison; only the length check short-circuits
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// The first password rule a candidate failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyViolation {
    SurroundingWhitespace,
    TooShort { min: usize },
    TooLong { max: usize },
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSymbol,
}

impl fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SurroundingWhitespace => write!(f, "must not start or end with whitespace"),
            Self::TooShort { min } => write!(f, "must be at least {} bytes", min),
            Self::TooLong { max } => write!(f, "must be at most {} bytes", max),
            Self::MissingUppercase => write!(f, "must contain an uppercase letter"),
            Self::MissingLowercase => write!(f, "must contain a lowercase letter"),
            Self::MissingDigit => write!(f, "must contain a digit"),
            Self::MissingSymbol => write!(f, "must contain a punctuation or symbol character"),
        }
    }
}

/// Complexity rules applied to new passwords
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_len: usize,
    pub max_len: usize,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_len: MIN_PASSWORD_LEN,
            max_len: MAX_PASSWORD_LEN,
        }
    }
}

impl PasswordPolicy {
    pub fn validate(&self, password: &str) -> Result<(), PolicyViolation> {
        if password.trim() != password {
            return Err(PolicyViolation::SurroundingWhitespace);
        }

        let length = password.len();
        if length < self.min_len {
            return Err(PolicyViolation::TooShort { min: self.min_len });
        }
        if length > self.max_len {
            return Err(PolicyViolation::TooLong { max: self.max_len });
        }

        let (mut upper, mut lower, mut digit, mut symbol) = (false, false, false, false);
        for c in password.chars() {
            match get_general_category(c) {
                GeneralCategory::UppercaseLetter => upper = true,
                GeneralCategory::LowercaseLetter => lower = true,
                GeneralCategory::DecimalNumber => digit = true,
                category if is_punctuation_or_symbol(category) => symbol = true,
                _ => {}
            }
        }

        if !upper {
            return Err(PolicyViolation::MissingUppercase);
        }
        if !lower {
            return Err(PolicyViolation::MissingLowercase);
        }
        if !digit {
            return Err(PolicyViolation::MissingDigit);
        }
        if !symbol {
            return Err(PolicyViolation::MissingSymbol);
        }
        Ok(())
    }
}

/// Unicode categories P* and S*
fn is_punctuation_or_symbol(category: GeneralCategory) -> bool {
    matches!(
        category,
        GeneralCategory::ConnectorPunctuation
            | GeneralCategory::DashPunctuation
            | GeneralCategory::OpenPunctuation
            | GeneralCategory::ClosePunctuation
            | GeneralCategory::InitialPunctuation
            | GeneralCategory::FinalPunctuation
            | GeneralCategory::OtherPunctuation
            | GeneralCategory::MathSymbol
            | GeneralCategory::CurrencySymbol
            | GeneralCategory::ModifierSymbol
            | GeneralCategory::OtherSymbol
    )
}
