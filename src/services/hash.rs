//! Transaction hash canonicalization from mixed URL / hex / free-text input.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Explorer links look like https://tronscan.org/#/transaction/<hash>
    static ref URL_HASH_REGEX: Regex = Regex::new(r"/transaction/([a-fA-F0-9]{64})").unwrap();
    static ref BARE_HASH_REGEX: Regex = Regex::new(r"^[a-fA-F0-9]{64}$").unwrap();
}

/// Extract a 64-hex-char transaction hash from a URL or raw string.
///
/// Unrecognized input is passed through unchanged; downstream consumers
/// treat unchanged values as unverified. Never fails.
pub fn extract(input: &str) -> String {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    if let Some(captures) = URL_HASH_REGEX.captures(trimmed) {
        return captures[1].to_string();
    }

    if BARE_HASH_REGEX.is_match(trimmed) {
        return trimmed.to_string();
    }

    input.to_string()
}
