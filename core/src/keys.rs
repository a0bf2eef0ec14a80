//! Key matching shared by location and matcher specs
//!
//! A spec key matches a document key when the two are equal, or when the
//! spec key, read as a regular expression, finds a match anywhere in the
//! document key. Write `^...$` for a whole-key match.

use regex::Regex;

/// One key of a location or matcher spec
#[derive(Debug, Clone)]
pub enum KeyMatcher {
    /// Key that is not a valid expression, compared for equality
    Literal(String),
    /// Key compiled as an unanchored expression
    Pattern { raw: String, regex: Regex },
}

impl KeyMatcher {
    /// Build a matcher from a spec key
    ///
    /// Keys that fail to compile fall back to literal comparison.
    pub fn parse(raw: &str) -> Self {
        match Regex::new(raw) {
            Ok(regex) => KeyMatcher::Pattern {
                raw: raw.to_string(),
                regex,
            },
            Err(e) => {
                tracing::debug!(key = raw, error = %e, "spec key is not a valid pattern, matching literally");
                KeyMatcher::Literal(raw.to_string())
            }
        }
    }

    /// Does this spec key select the given document key?
    pub fn matches(&self, key: &str) -> bool {
        match self {
            KeyMatcher::Literal(literal) => literal == key,
            KeyMatcher::Pattern { raw, regex } => raw == key || regex.is_match(key),
        }
    }

    /// The key as written in the configuration
    pub fn as_str(&self) -> &str {
        match self {
            KeyMatcher::Literal(raw) | KeyMatcher::Pattern { raw, .. } => raw,
        }
    }
}

impl PartialEq for KeyMatcher {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_keys_search_within_the_key() {
        let key = KeyMatcher::parse("Tenant");
        assert!(key.matches("Tenant"));
        assert!(key.matches("Tenant2"));
        assert!(!key.matches("tenant"));
    }

    #[test]
    fn patterns_are_unanchored() {
        let key = KeyMatcher::parse("App.*");
        assert!(key.matches("App1"));
        assert!(key.matches("App"));
        assert!(key.matches("MyApp1"));
        assert!(!key.matches("Other"));
    }

    #[test]
    fn explicit_anchors_are_honoured() {
        let key = KeyMatcher::parse("^vs1$");
        assert!(key.matches("vs1"));
        assert!(!key.matches("vs10"));

        let suffix = KeyMatcher::parse("vs1$");
        assert!(suffix.matches("/Common/app/vs1"));
        assert!(!suffix.matches("vs12"));
    }

    #[test]
    fn pattern_matches_its_own_text() {
        let key = KeyMatcher::parse("a.b");
        assert!(key.matches("a.b"));
        assert!(key.matches("axb"));
    }

    #[test]
    fn invalid_pattern_falls_back_to_literal() {
        let key = KeyMatcher::parse("bad(");
        assert!(key.matches("bad("));
        assert!(!key.matches("bad"));
    }
}
