//! # Username Hashing
//!
//! Usernames travel as a base-37 packed `u64` inside appearance blocks.

/// Longest name the hash can represent.
pub const MAX_NAME_LENGTH: usize = 12;

/// Packs a username into its base-37 wire form.
///
/// Letters map to 1..=26 (case-insensitive), digits to 27..=36 and every
/// other character to 0. Characters past the twelfth are ignored, and
/// trailing zero digits are stripped so `"bob"` and `"bob "` agree.
#[must_use]
pub fn name_hash(name: &str) -> u64 {
    let mut hash: u64 = 0;
    for c in name.chars().take(MAX_NAME_LENGTH) {
        hash = hash.wrapping_mul(37);
        hash += match c {
            'A'..='Z' => u64::from(c) - u64::from('A') + 1,
            'a'..='z' => u64::from(c) - u64::from('a') + 1,
            '0'..='9' => u64::from(c) - u64::from('0') + 27,
            _ => 0,
        };
    }
    while hash != 0 && hash % 37 == 0 {
        hash /= 37;
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(name_hash("a"), 1);
        assert_eq!(name_hash("b"), 2);
        assert_eq!(name_hash("ab"), 37 + 2);
        assert_eq!(name_hash("0"), 27);
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(name_hash("Zezima"), name_hash("zezima"));
    }

    #[test]
    fn test_trailing_separators_ignored() {
        assert_eq!(name_hash("bob"), name_hash("bob "));
        assert_ne!(name_hash("bob1"), name_hash("bob 1"));
    }

    #[test]
    fn test_length_capped() {
        assert_eq!(name_hash("abcdefghijkl"), name_hash("abcdefghijklmnop"));
    }
}
