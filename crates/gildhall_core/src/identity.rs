//! # Identity Normalization
//!
//! Maps arbitrary user-supplied display names to canonical account keys.
//!
//! Account keys are used as map keys in the ledger and in the durable
//! snapshot, so anything that could collide with those namespaces (path
//! separators, the `:` delimiter, control characters) is stripped before
//! the key is formed. Unusable input falls back to [`GUEST_KEY`].
//!
//! The function is pure and idempotent: `normalize(normalize(x))` always
//! equals `normalize(x)`.

/// Canonical fallback key for empty or unusable display names.
pub const GUEST_KEY: &str = "Guest";

/// Maximum length of a canonical account key, in characters.
pub const MAX_KEY_LEN: usize = 64;

/// Characters that collide with internal key namespaces.
const fn is_reserved(c: char) -> bool {
    c.is_ascii_control() || matches!(c, '/' | '\\' | ':')
}

/// Normalizes a raw display name into a canonical account key.
///
/// Strips reserved characters, trims surrounding whitespace, and bounds
/// the result to [`MAX_KEY_LEN`] characters. An empty result (including
/// `None` input) becomes [`GUEST_KEY`].
///
/// # Example
///
/// ```rust
/// use gildhall_core::identity::normalize;
///
/// assert_eq!(normalize(Some(" a/b:c ")), "abc");
/// assert_eq!(normalize(Some("   ")), "Guest");
/// assert_eq!(normalize(None), "Guest");
/// ```
#[must_use]
pub fn normalize(raw: Option<&str>) -> String {
    let filtered: String = raw
        .unwrap_or("")
        .chars()
        .filter(|c| !is_reserved(*c))
        .collect();

    let bounded: String = filtered.trim().chars().take(MAX_KEY_LEN).collect();

    // Truncation can expose trailing whitespace; trim again so the
    // result is a fixed point of this function.
    let key = bounded.trim_end();

    if key.is_empty() {
        GUEST_KEY.to_owned()
    } else {
        key.to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_whitespace() {
        assert_eq!(normalize(Some("  Alice  ")), "Alice");
        assert_eq!(normalize(Some("\tBob\n")), "Bob");
    }

    #[test]
    fn test_strips_reserved_characters() {
        assert_eq!(normalize(Some("a/b")), "ab");
        assert_eq!(normalize(Some("a\\b")), "ab");
        assert_eq!(normalize(Some("a:b")), "ab");
        assert_eq!(normalize(Some("a\u{7}b")), "ab");
    }

    #[test]
    fn test_empty_falls_back_to_guest() {
        assert_eq!(normalize(None), GUEST_KEY);
        assert_eq!(normalize(Some("")), GUEST_KEY);
        assert_eq!(normalize(Some("   ")), GUEST_KEY);
        assert_eq!(normalize(Some("/:\\")), GUEST_KEY);
    }

    #[test]
    fn test_bounds_length() {
        let long = "x".repeat(500);
        let key = normalize(Some(&long));
        assert_eq!(key.chars().count(), MAX_KEY_LEN);
    }

    #[test]
    fn test_inner_whitespace_is_kept() {
        assert_eq!(normalize(Some("Dark Lord")), "Dark Lord");
    }

    #[test]
    fn test_idempotent() {
        let inputs = [
            "",
            "   ",
            "Alice",
            "  spaced out  ",
            "a/b:c\\d",
            "Dark Lord",
            "/:\\",
            "é🐉 unicode",
        ];
        for raw in inputs {
            let once = normalize(Some(raw));
            let twice = normalize(Some(&once));
            assert_eq!(once, twice, "not idempotent for {raw:?}");
        }

        // Truncation boundary: a space just past the cut must not
        // reappear on the second pass.
        let tricky = format!("{} tail", "x".repeat(MAX_KEY_LEN - 1));
        let once = normalize(Some(&tricky));
        assert_eq!(once, normalize(Some(&once)));
    }
}
