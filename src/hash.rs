//! Composite cache key: SHA-256 of `from|to|text`, rendered as lowercase hex.
//!
//! Pure and stateless — no allocation beyond the returned `String`.

use sha2::{Digest, Sha256};

/// Separator byte inserted between the three hash inputs.
const SEPARATOR: u8 = b'|';

/// Hash `(from_lang, to_lang, source_text)` into the cache's 64-char primary key.
///
/// Empty language codes or empty text are accepted here; rejecting them is a
/// validation concern upstream of the cache core.
pub fn composite_key(from_lang: &str, to_lang: &str, source_text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(from_lang.as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(to_lang.as_bytes());
    hasher.update([SEPARATOR]);
    hasher.update(source_text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        let a = composite_key("kor", "eng", "안녕하세요");
        let b = composite_key("kor", "eng", "안녕하세요");
        assert_eq!(a, b);
    }

    #[test]
    fn distinguishes_inputs() {
        let a = composite_key("kor", "eng", "hello");
        let b = composite_key("jpn", "eng", "hello");
        let c = composite_key("kor", "eng", "goodbye");
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn is_64_char_lowercase_hex() {
        let h = composite_key("kor", "eng", "text");
        assert_eq!(h.len(), 64);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn separator_prevents_boundary_collision() {
        // Without a separator, ("a","bc","d") and ("ab","c","d") would collide.
        let a = composite_key("a", "bc", "d");
        let b = composite_key("ab", "c", "d");
        assert_ne!(a, b);
    }

    #[test]
    fn empty_inputs_are_accepted() {
        let h = composite_key("", "", "");
        assert_eq!(h.len(), 64);
    }
}
