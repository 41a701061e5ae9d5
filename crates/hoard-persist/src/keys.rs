//! File-name keys derived from identifiers.

/// Key used when sanitizing leaves nothing.
pub const EMPTY_KEY: &str = "unnamed";

/// Shortest `max_len` honored. Room for a hyphenated UUID.
pub const MIN_KEY_LEN: usize = 36;

/// Hex characters of the digest appended to altered keys.
const DIGEST_LEN: usize = 12;

/// Turn an arbitrary identifier into a safe file-name component.
///
/// Keeps ASCII alphanumerics, `-` and `_` and drops everything else. A raw
/// value that passes through untouched and fits in `max_len` is returned as
/// is. Anything that had to be altered or cut gets a blake3 digest of the
/// raw value as a suffix, so distinct identifiers never share a key. Path
/// separators and `..` can never survive.
///
/// `max_len` below [`MIN_KEY_LEN`] is raised to it.
pub fn sanitize_key(raw: &str, max_len: usize) -> String {
    let max_len = max_len.max(MIN_KEY_LEN);
    let clean: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    if clean.is_empty() {
        return EMPTY_KEY.to_string();
    }
    if clean == raw && clean.len() <= max_len {
        return clean;
    }

    let digest = blake3::hash(raw.as_bytes()).to_hex();
    let keep = max_len - DIGEST_LEN - 1;
    let prefix: String = clean.chars().take(keep).collect();
    format!("{prefix}-{}", &digest.as_str()[..DIGEST_LEN])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_safe_characters() {
        assert_eq!(sanitize_key("group_01-a", 64), "group_01-a");
    }

    #[test]
    fn strips_path_traversal() {
        let key = sanitize_key("../../etc/passwd", 64);
        assert!(key.starts_with("etcpasswd-"));
        assert!(!key.contains('/') && !key.contains(".."));
    }

    #[test]
    fn empty_result_becomes_unnamed() {
        assert_eq!(sanitize_key("", 64), "unnamed");
        assert_eq!(sanitize_key("../..", 64), "unnamed");
    }

    #[test]
    fn truncates_to_max_len() {
        let key = sanitize_key(&"x".repeat(100), 64);
        assert_eq!(key.len(), 64);
    }

    #[test]
    fn uuid_keys_pass_through() {
        let id = "0190f3a2-7b1c-7d4e-9f00-123456789abc";
        assert_eq!(sanitize_key(id, 64), id);
        assert_eq!(sanitize_key(id, 8), id);
    }

    #[test]
    fn altered_keys_stay_distinct() {
        assert_ne!(sanitize_key("a/b", 64), sanitize_key("ab", 64));
        assert_ne!(sanitize_key("a:b", 64), sanitize_key("a/b", 64));

        let long_a = format!("{}a", "x".repeat(80));
        let long_b = format!("{}b", "x".repeat(80));
        let (a, b) = (sanitize_key(&long_a, 40), sanitize_key(&long_b, 40));
        assert_ne!(a, b);
        assert_eq!(a.len(), 40);
    }

    #[test]
    fn small_limits_are_raised() {
        let key = sanitize_key(&"y".repeat(100), 4);
        assert_eq!(key.len(), MIN_KEY_LEN);
    }
}
