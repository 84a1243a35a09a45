use sha2::{Digest, Sha256};

/// Number of hex characters kept from the digest
pub const DEFAULT_HASH_LENGTH: usize = 16;

/// Computes the identity hash of a canonical URL
///
/// This is the first [`DEFAULT_HASH_LENGTH`] lowercase hex characters of the
/// SHA-256 digest of the URL's UTF-8 bytes.
///
/// # Examples
///
/// ```
/// use bundle_harvest::identity::content_hash;
///
/// let hash = content_hash("https://store.steampowered.com/app/2835570/?l=english");
/// assert_eq!(hash, "e241a5d785ada3e2");
/// ```
pub fn content_hash(url: &str) -> String {
    content_hash_with_length(url, DEFAULT_HASH_LENGTH)
}

/// Computes a truncated SHA-256 hex digest of `url`
///
/// Lengths beyond the full 64-character digest return the whole digest.
pub fn content_hash_with_length(url: &str, length: usize) -> String {
    let mut hex = hex::encode(Sha256::digest(url.as_bytes()));
    hex.truncate(length.min(hex.len()));
    hex
}
