//! Cache key derivation.
//!
//! A [`CacheKey`] is the percent-encoded locator, optionally followed by
//! `@<variant tag>`. Every byte outside `a-z 0-9 - . _ ~` is escaped,
//! including `%` itself, so distinct locators always produce distinct keys
//! and every key is a valid file name.
//!
//! Uppercase letters are escaped too (`P` -> `%50`). Escapes always use
//! uppercase hex and literal letters are always lowercase, so two keys never
//! differ only in letter case and stay distinct on case-insensitive
//! filesystems.
//!
//! ```text
//! https://img.example/a.jpg?w=200        ->  https%3A%2F%2Fimg.example%2Fa.jpg%3Fw%3D200
//! https://img.example/a.jpg  (regular)   ->  https%3A%2F%2Fimg.example%2Fa.jpg@large
//! <encoded form longer than 160 bytes>   ->  <first 96 bytes>=<sha256 hex>[@large]
//! ```
//!
//! `@` and `=` are always escaped inside the encoded locator, so the variant
//! suffix and the hashed form can never be confused with a plain key.

use sha2::{Digest, Sha256};
use std::fmt::{self, Write};

use crate::error::{Error, Result};
use crate::models::{ResourceLocator, Variant};

/// Longest encoded locator kept verbatim. Longer ones are hashed so the key
/// stays well under common file name limits (255 bytes).
const MAX_PLAIN_LEN: usize = 160;
/// Readable prefix kept in front of the digest of a hashed key.
const HASHED_PREFIX_LEN: usize = 96;
const VARIANT_SEP: char = '@';
const HASH_SEP: char = '=';

/// Stable, filesystem-safe identifier of one cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when [`decode`] can recover the locator from this key.
    pub fn is_reversible(&self) -> bool {
        !self.0.contains(HASH_SEP)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a locator and variant.
///
/// Fails with [`Error::InvalidLocator`] for blank locators and locators
/// containing control characters.
pub fn encode(locator: &ResourceLocator, variant: Variant) -> Result<CacheKey> {
    let raw = locator.as_str();
    if raw.trim().is_empty() || raw.chars().any(char::is_control) {
        return Err(Error::InvalidLocator(raw.to_string()));
    }

    let mut key = percent_encode(raw);
    if key.len() > MAX_PLAIN_LEN {
        let digest = Sha256::digest(key.as_bytes());
        let mut cut = HASHED_PREFIX_LEN;
        // Don't leave a dangling half escape in the readable prefix.
        while key[..cut].ends_with('%') || key[..cut - 1].ends_with('%') {
            cut -= 1;
        }
        key.truncate(cut);
        key.push(HASH_SEP);
        key.push_str(&hex::encode(digest));
    }

    if let Some(tag) = variant.tag() {
        key.push(VARIANT_SEP);
        key.push_str(tag);
    }

    Ok(CacheKey(key))
}

/// Recover the locator and variant from a stored key.
///
/// Returns `None` for hashed keys and for strings that were not produced
/// by [`encode`].
pub fn decode(key: &str) -> Option<(ResourceLocator, Variant)> {
    if key.contains(HASH_SEP) {
        return None;
    }
    let (encoded, tag) = match key.rsplit_once(VARIANT_SEP) {
        Some((encoded, tag)) => (encoded, Some(tag)),
        None => (key, None),
    };
    let variant = Variant::from_tag(tag)?;
    let locator = percent_decode(encoded)?;
    Some((ResourceLocator::new(locator), variant))
}

/// Bytes written to a key verbatim.
fn is_literal(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'-' | b'.' | b'_' | b'~')
}

fn percent_encode(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() * 3 / 2);
    for (i, b) in raw.bytes().enumerate() {
        // A leading dot would produce hidden files, `.` or `..`.
        if is_literal(b) && !(i == 0 && b == b'.') {
            out.push(b as char);
        } else {
            let _ = write!(out, "%{:02X}", b);
        }
    }
    out
}

fn percent_decode(encoded: &str) -> Option<String> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = encoded.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 3;
            }
            b if is_literal(b) => {
                out.push(b);
                i += 1;
            }
            _ => return None,
        }
    }
    String::from_utf8(out).ok()
}
