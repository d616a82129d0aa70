//! Keyword matching against modification authors and comments.

use regex::Regex;

use super::Modification;

/// Comma separated keywords, each matched as a whole word.
///
/// Used to answer "did this instance include one of my check-ins". Matching
/// is case sensitive and keywords are taken literally. An empty matcher
/// never matches.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    keywords: Vec<String>,
    patterns: Vec<Regex>,
}

impl Matcher {
    pub fn new(keywords: &str) -> Self {
        let keywords: Vec<String> = keywords
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();
        let patterns = keywords
            .iter()
            .filter_map(|k| Regex::new(&format!(r"\b{}\b", regex::escape(k))).ok())
            .collect();
        Self { keywords, patterns }
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(text))
    }

    /// Checks author, email and comment.
    pub fn matches_modification(&self, modification: &Modification) -> bool {
        self.matches(modification.author())
            || modification.email().is_some_and(|e| self.matches(e))
            || self.matches(modification.comment())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_matches_whole_words_only() {
        let matcher = Matcher::new("lgao");
        assert!(matcher.matches("fixed by lgao today"));
        assert!(!matcher.matches("fixed by lgaox"));
        assert!(!matcher.matches("xlgao"));
    }

    #[test]
    fn test_matching_is_case_sensitive() {
        assert!(!Matcher::new("lgao").matches("LGAO"));
    }

    #[test]
    fn test_any_keyword_matches() {
        let matcher = Matcher::new("alice, bob");
        assert_eq!(matcher.keywords(), &["alice".to_string(), "bob".to_string()]);
        assert!(matcher.matches("reviewed by bob"));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let matcher = Matcher::new("a.c");
        assert!(matcher.matches("see a.c for details"));
        assert!(!matcher.matches("see abc for details"));
    }

    #[test]
    fn test_empty_matcher_never_matches() {
        let matcher = Matcher::new(" , ");
        assert!(matcher.is_empty());
        assert!(!matcher.matches("anything"));
        assert!(!matcher.matches(""));
    }

    #[test]
    fn test_checks_email_and_comment() {
        let matcher = Matcher::new("story-4521");
        let m = Modification::new("dev", "closes story-4521", "r1", Utc::now());
        assert!(matcher.matches_modification(&m));

        let matcher = Matcher::new("dev");
        let m = Modification::new("someone", "typo", "r1", Utc::now()).with_email("dev@example.com");
        assert!(matcher.matches_modification(&m));
    }
}
