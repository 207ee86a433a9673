//! Query classification
//!
//! Pure keyword-based gate that runs before any retrieval. The rule order is
//! a design decision, not incidental: an injection phrase wins over anything
//! else the message contains, and the greeting check runs before the
//! financial one so "hola" with nothing substantive never triggers a search.

use crate::config::ClassifierConfig;

/// Category assigned to every non-empty user turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryCategory {
    /// Prompt-injection attempt; refused without retrieval
    Injection,
    /// Outside the advisory domain; refused without retrieval
    OutOfScope,
    /// Short salutation; answered from a template
    Greeting,
    /// Fee/price question; retrieved with wider breadth and query expansion
    Financial,
    /// Everything else; retrieved with the general breadth
    General,
}

/// Keyword classifier over raw user text
///
/// Matching is case-insensitive substring search against configured sets.
/// Classification is total: every input maps to exactly one category and
/// nothing here can fail.
#[derive(Debug, Clone)]
pub struct Classifier {
    injection_phrases: Vec<String>,
    out_of_scope_keywords: Vec<String>,
    greeting_words: Vec<String>,
    financial_keywords: Vec<String>,
    greeting_max_words: usize,
}

impl Classifier {
    pub fn new(config: &ClassifierConfig) -> Self {
        let lowered = |words: &[String]| words.iter().map(|w| w.to_lowercase()).collect();
        Self {
            injection_phrases: lowered(&config.injection_phrases),
            out_of_scope_keywords: lowered(&config.out_of_scope_keywords),
            greeting_words: lowered(&config.greeting_words),
            financial_keywords: lowered(&config.financial_keywords),
            greeting_max_words: config.greeting_max_words,
        }
    }

    /// Classify a user turn. First matching rule wins.
    pub fn classify(&self, text: &str) -> QueryCategory {
        let lowered = text.to_lowercase();

        if contains_any(&lowered, &self.injection_phrases) {
            return QueryCategory::Injection;
        }
        if contains_any(&lowered, &self.out_of_scope_keywords) {
            return QueryCategory::OutOfScope;
        }
        if self.is_greeting(&lowered) {
            return QueryCategory::Greeting;
        }
        if contains_any(&lowered, &self.financial_keywords) {
            return QueryCategory::Financial;
        }
        QueryCategory::General
    }

    /// A greeting is a short message whose normalized tokens intersect the
    /// greeting set. Normalization: lowercase, strip punctuation, split on
    /// whitespace.
    fn is_greeting(&self, lowered: &str) -> bool {
        let normalized: String = lowered
            .chars()
            .filter(|c| c.is_alphanumeric() || c.is_whitespace())
            .collect();
        let words: Vec<&str> = normalized.split_whitespace().collect();
        words.len() < self.greeting_max_words
            && words
                .iter()
                .any(|w| self.greeting_words.iter().any(|g| g == w))
    }
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|n| haystack.contains(n.as_str()))
}
