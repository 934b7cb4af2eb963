//! Stable 32-bit rolling hash used to pick among candidate records.
//!
//! Only the first [`HASH_PREFIX_CHARS`] characters of the identifier take part,
//! so two identifiers sharing that prefix always collide. Image identifiers are
//! base64 payloads whose first 100 characters are mostly the data-URL header and
//! image magic, which makes collisions common in practice; reports only need the
//! selection to be reproducible, not well distributed.

/// Number of leading characters of an identifier that feed the hash.
pub const HASH_PREFIX_CHARS: usize = 100;

/// Hash an identifier.
///
/// Per character: `h = ((h << 5) - h + c) & 0xFFFFFFFF`, i.e. `h * 31 + c` wrapped
/// to 32 bits after every step. The final value is read as a signed 32-bit
/// integer and its absolute value returned.
pub fn stable_hash(identifier: &str) -> u32 {
    let h = identifier
        .chars()
        .take(HASH_PREFIX_CHARS)
        .fold(0u32, |h, c| {
            (h << 5).wrapping_sub(h).wrapping_add(c as u32)
        });
    (h as i32).unsigned_abs()
}

/// Deterministic index in `0..candidates` for an identifier.
///
/// Panics if `candidates` is zero.
pub fn selector(identifier: &str, candidates: usize) -> usize {
    stable_hash(identifier) as usize % candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_identifier_hashes_to_zero() {
        assert_eq!(stable_hash(""), 0);
        assert_eq!(selector("", 5), 0);
    }

    #[test]
    fn test_known_values() {
        assert_eq!(stable_hash("a"), 97);
        assert_eq!(stable_hash("ab"), 97 * 31 + 98);
        assert_eq!(stable_hash("abc"), (97 * 31 + 98) * 31 + 99);
    }

    #[test]
    fn test_wraps_and_takes_absolute_value() {
        // Long enough to overflow 32 bits many times over.
        let id = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAOAAAADgCAIAAACVT/22";
        let mut h: u32 = 0;
        for c in id.chars() {
            h = h.wrapping_mul(31).wrapping_add(c as u32);
        }
        let expected = (h as i32).unsigned_abs();
        assert_eq!(stable_hash(id), expected);
        assert!(stable_hash(id) <= 1 << 31);
    }

    #[test]
    fn test_top_bit_is_read_as_sign() {
        // Wrapped sum is 2713988160, which is negative as an i32.
        assert_eq!(stable_hash("zzzzzzzzzz"), 1580979136);
        assert_eq!(selector("zzzzzzzzzz", 5), 1);
    }

    #[test]
    fn test_deterministic() {
        let id = "some-scan-identifier";
        assert_eq!(stable_hash(id), stable_hash(id));
    }

    #[test]
    fn test_only_prefix_matters() {
        let a = "x".repeat(150);
        let b = format!("{}DIFFERENT_TAIL", "x".repeat(100));
        assert_eq!(stable_hash(&a), stable_hash(&b));
        assert_ne!(stable_hash(&"x".repeat(99)), stable_hash(&a));
    }

    #[test]
    fn test_prefix_counts_characters_not_bytes() {
        // 100 two-byte characters followed by a differing tail.
        let base = "é".repeat(100);
        let a = format!("{base}tail-one");
        let b = format!("{base}tail-two");
        assert_eq!(stable_hash(&a), stable_hash(&b));
    }

    #[test]
    fn test_selector_in_range() {
        for id in ["", "a", "scan-1", "scan-2", "zzzzzzzz"] {
            assert!(selector(id, 4) < 4);
            assert!(selector(id, 5) < 5);
        }
    }
}
