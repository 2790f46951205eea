//! Subject tokens and wildcard matching.
//!
//! Subjects are `.`-separated tokens. In a subscription pattern `*` matches
//! exactly one token and `>` (last token only) matches one or more trailing tokens.

/// Token separator.
pub const SEPARATOR: char = '.';

/// Single-token wildcard.
pub const WILDCARD_ONE: &str = "*";

/// Trailing multi-token wildcard.
pub const WILDCARD_TAIL: &str = ">";

/// True if `pattern` contains a wildcard token.
pub fn is_wildcard(pattern: &str) -> bool {
    pattern
        .split(SEPARATOR)
        .any(|t| t == WILDCARD_ONE || t == WILDCARD_TAIL)
}

/// True if the concrete `subject` is matched by `pattern`.
pub fn matches(pattern: &str, subject: &str) -> bool {
    let mut pat = pattern.split(SEPARATOR);
    let mut sub = subject.split(SEPARATOR);
    loop {
        match (pat.next(), sub.next()) {
            (Some(WILDCARD_TAIL), Some(_)) => return pat.next().is_none(),
            (Some(WILDCARD_ONE), Some(_)) => {}
            (Some(p), Some(s)) if p == s => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_subjects_match_exactly() {
        assert!(matches("math.add", "math.add"));
        assert!(!matches("math.add", "math.sub"));
        assert!(!matches("math", "math.add"));
        assert!(!matches("math.add", "math"));
    }

    #[test]
    fn star_matches_one_token() {
        assert!(matches("math.*", "math.add"));
        assert!(matches("*.add", "math.add"));
        assert!(!matches("math.*", "math.add.int"));
        assert!(!matches("math.*", "math"));
    }

    #[test]
    fn tail_matches_one_or_more_tokens() {
        assert!(matches("math.>", "math.add"));
        assert!(matches("math.>", "math.add.int"));
        assert!(!matches("math.>", "math"));
        assert!(matches(">", "anything.at.all"));
    }

    #[test]
    fn tail_only_counts_as_last_token() {
        assert!(!matches("math.>.int", "math.add.int"));
    }

    #[test]
    fn detects_wildcards() {
        assert!(is_wildcard("users.*.get"));
        assert!(is_wildcard("events.>"));
        assert!(!is_wildcard("math.add"));
        assert!(!is_wildcard("math.a*"));
    }
}
