//! Hashing, CSV sanitization and email validation.
//!
//! Every function here is pure. Hashing keeps no state between calls, so all
//! of them may be called concurrently from any task.

use std::sync::LazyLock;

use regex_lite::Regex;
use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest.
pub const DIGEST_HEX_LENGTH: usize = 64;

/// SHA-256 of the empty string.
pub const EMPTY_DIGEST: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Characters spreadsheet software interprets as the start of a formula.
const FORMULA_TRIGGERS: [char; 4] = ['=', '+', '-', '@'];

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .expect("email pattern must compile")
});

/// Digest UTF-8 text into a lowercase hexadecimal SHA-256.
///
/// # Examples
///
/// ```rust
/// use class_connect::security::hash_string;
///
/// assert_eq!(
///     hash_string(""),
///     "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
/// );
/// ```
pub fn hash_string(text: impl AsRef<str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_ref().as_bytes());
    hex::encode(hasher.finalize())
}

/// Check `text` against a stored hex digest.
///
/// The comparison runs over every byte. Malformed digests never match.
pub fn verify_hash(text: impl AsRef<str>, expected: &str) -> bool {
    if !is_sha256_hex(expected) {
        return false;
    }

    let computed = hash_string(text);
    let expected = expected.to_ascii_lowercase();

    computed
        .bytes()
        .zip(expected.bytes())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Whether `value` looks like a hex-encoded SHA-256 digest.
pub fn is_sha256_hex(value: &str) -> bool {
    value.len() == DIGEST_HEX_LENGTH
        && value.bytes().all(|b| b.is_ascii_hexdigit())
}

/// Neutralize spreadsheet formulas in a CSV cell.
///
/// Absent or empty values become an empty string. Values starting with
/// `=`, `+`, `-` or `@` are prefixed with a single quote.
pub fn sanitize_for_csv(value: Option<&str>) -> String {
    match value {
        None | Some("") => String::new(),
        Some(value) if value.starts_with(FORMULA_TRIGGERS) => {
            format!("'{value}")
        },
        Some(value) => value.to_owned(),
    }
}

/// Syntactic `local-part@domain.tld` check. No DNS lookup.
pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}
