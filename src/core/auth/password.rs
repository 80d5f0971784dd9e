//! Credential helpers
//!
//! Password policy and bcrypt hashing, opaque random tokens (refresh,
//! password-set and QR tokens) and the public member identifier format.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::rngs::OsRng;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};

/// Cost factor for bcrypt hashing (12 is recommended for production)
pub const DEFAULT_BCRYPT_COST: u32 = 12;

/// Cost factors accepted by bcrypt
pub const BCRYPT_COST_RANGE: std::ops::RangeInclusive<u32> = 4..=31;

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Characters accepted as the "special" class of the password policy
pub const SPECIAL_CHARACTERS: &str = "!@#$%^&*()-_=+[]{}|;:',.<>?/~`\\\"";

/// Prefix of every external member identifier
pub const EXTERNAL_ID_PREFIX: &str = "CCIMRB-";

/// Random bytes behind each opaque token
const TOKEN_BYTES: usize = 32;

/// Which part of the password policy a candidate failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordPolicyViolation {
    TooShort,
    MissingUppercase,
    MissingLowercase,
    MissingDigit,
    MissingSpecial,
}

impl std::fmt::Display for PasswordPolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            PasswordPolicyViolation::TooShort => "must be at least 8 characters",
            PasswordPolicyViolation::MissingUppercase => "must contain an uppercase letter",
            PasswordPolicyViolation::MissingLowercase => "must contain a lowercase letter",
            PasswordPolicyViolation::MissingDigit => "must contain a digit",
            PasswordPolicyViolation::MissingSpecial => "must contain a special character",
        };
        write!(f, "password {}", msg)
    }
}

/// Check a candidate password against the strength policy
pub fn check_password_policy(password: &str) -> Result<(), PasswordPolicyViolation> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordPolicyViolation::TooShort);
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        return Err(PasswordPolicyViolation::MissingUppercase);
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        return Err(PasswordPolicyViolation::MissingLowercase);
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err(PasswordPolicyViolation::MissingDigit);
    }
    if !password.chars().any(|c| SPECIAL_CHARACTERS.contains(c)) {
        return Err(PasswordPolicyViolation::MissingSpecial);
    }

    Ok(())
}

/// Hash a password using bcrypt with automatic salt generation
pub fn hash_password(password: &str, cost: u32) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, cost)
}

/// Verify a password against a bcrypt hash.
///
/// A malformed stored hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// 32 random bytes from the OS, URL-safe base64 without padding
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Hash a token using SHA-256 (hex encoded)
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Random external identifier of the form `CCIMRB-NNNNN`.
///
/// Not unique by construction; the caller retries on collision.
pub fn generate_external_id() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..100_000);
    format!("{EXTERNAL_ID_PREFIX}{n:05}")
}

/// Minimal structural email check: one `@`, non-empty local part, dotted domain
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|part| !part.is_empty())
}
