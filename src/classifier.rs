//! # String Classifier
//!
//! Decides whether a string is user-facing text worth externalizing.
//! Rules are evaluated in order and the first match wins; anything no rule
//! accepts is rejected, so ambiguous strings are left untouched.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::ClassifierConfig;
use crate::types::{AcceptRule, RejectRule, Verdict};

/// Statement-shaped Python fragments such as `import os` or `def main(`.
static STATEMENT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\s*(?:",
        r"import\s+[A-Za-z_][\w.]*(?:\s+as\s+\w+)?\s*(?:,|$)|",
        r"from\s+\.*[\w.]*\s+import\b|",
        r"(?:async\s+)?def\s+\w+\s*\(|",
        r"class\s+\w+\s*[(:]|",
        r"return\b|",
        r"raise\s+[A-Z]\w*|",
        r"lambda\b[^:]*:|",
        r"try\s*:|",
        r"except\b|",
        r"finally\s*:|",
        r"elif\b|",
        r"else\s*:",
        r")"
    ))
    .expect("statement regex should compile")
});

/// Module-style dotted names like `os.path` or `sys.modules`, and dunders.
static DOTTED_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-z_][a-z0-9_]+(?:\.[a-z_][a-z0-9_]+)+\b|\.__\w|\b__\w+__\b")
        .expect("dotted name regex should compile")
});

static EXTENSION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\.(?:py|pyc|pyi|json|toml|yaml|yml|lock|tmp|txt|cfg|ini|whl|dist-info|egg-info)\b",
    )
    .expect("extension regex should compile")
});

static FSTRING_PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\b[fF]["']"#).expect("f-string prefix regex should compile"));

static PLACEHOLDER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{[^{}]*\}").expect("placeholder regex should compile"));

const DECORATION_CHARS: &[char] = &['=', '-', '_', '~', '*', '#', '+', '.', '·'];

const SENTENCE_PUNCTUATION: &[char] = &['.', ',', '!', '?', ':'];

/// Pluggable user-facing text detection.
pub trait StringClassifier: Send + Sync {
    /// Classify `content`, using the line it appears on as `context`.
    fn classify(&self, content: &str, context: &str) -> Verdict;
}

/// Rule-based classifier driven by a [`ClassifierConfig`].
#[derive(Debug, Clone, Default)]
pub struct HeuristicClassifier {
    config: ClassifierConfig,
}

impl HeuristicClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }
}

impl StringClassifier for HeuristicClassifier {
    fn classify(&self, content: &str, context: &str) -> Verdict {
        classify(content, context, &self.config)
    }
}

/// Pure classification over explicit content, context and configuration.
pub fn classify(content: &str, context: &str, config: &ClassifierConfig) -> Verdict {
    if let Some(rule) = reject_rule(content) {
        return Verdict::Reject(rule);
    }
    match accept_rule(content, context, config) {
        Some(rule) => Verdict::Accept(rule),
        None => Verdict::Reject(RejectRule::Ambiguous),
    }
}

fn reject_rule(content: &str) -> Option<RejectRule> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Some(RejectRule::Blank);
    }

    let mut visible = trimmed.chars().filter(|c| !c.is_whitespace());
    if visible.clone().all(is_decoration) {
        return Some(RejectRule::Decorative);
    }
    if visible.all(|c| is_pictograph(c) || is_emoji_modifier(c)) {
        return Some(RejectRule::PictographFragment);
    }

    if STATEMENT_PATTERN.is_match(content)
        || DOTTED_PATTERN.is_match(content)
        || EXTENSION_PATTERN.is_match(content)
        || FSTRING_PREFIX_PATTERN.is_match(content)
    {
        return Some(RejectRule::CodeMarker);
    }

    if (content.contains('/') || content.contains('\\')) && !content.contains(' ') {
        return Some(RejectRule::PathLike);
    }

    let residue: Vec<char> = PLACEHOLDER_PATTERN
        .replace_all(content, "")
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_ascii_punctuation())
        .collect();
    if residue.len() <= 3 && (residue.is_empty() || !residue.iter().all(|c| c.is_alphanumeric()))
    {
        return Some(RejectRule::TooShort);
    }

    None
}

fn accept_rule(content: &str, context: &str, config: &ClassifierConfig) -> Option<AcceptRule> {
    let words: Vec<&str> = content.split_whitespace().collect();

    let has_pictograph = content.chars().any(is_pictograph);
    let has_word = words
        .iter()
        .any(|w| w.chars().any(|c| c.is_alphabetic()));
    if has_pictograph && has_word {
        return Some(AcceptRule::Pictograph);
    }

    let lowered = content.to_lowercase();
    if words.len() >= 3
        && config
            .vocabulary
            .iter()
            .any(|term| lowered.contains(term.as_str()))
    {
        return Some(AcceptRule::Vocabulary);
    }

    let context = context.trim_start();
    if config
        .context_prefixes
        .iter()
        .any(|prefix| context.starts_with(prefix.as_str()))
    {
        return Some(AcceptRule::Context);
    }

    if words.len() >= 3
        && content.contains(SENTENCE_PUNCTUATION)
        && !words.iter().all(|w| {
            let w = w.trim_matches(|c: char| c.is_ascii_punctuation());
            is_shouting(w) || is_number(w)
        })
    {
        return Some(AcceptRule::Sentence);
    }

    None
}

fn is_decoration(c: char) -> bool {
    DECORATION_CHARS.contains(&c)
        // box drawing and block elements
        || ('\u{2500}'..='\u{259F}').contains(&c)
}

/// Emoji and dingbat ranges used as status markers in terminal output.
pub fn is_pictograph(c: char) -> bool {
    matches!(c as u32,
        0x1F000..=0x1FAFF | 0x2600..=0x27BF | 0x2B00..=0x2BFF | 0x2300..=0x23FF)
}

fn is_emoji_modifier(c: char) -> bool {
    matches!(c, '\u{FE0E}' | '\u{FE0F}' | '\u{200D}' | '\u{20E3}')
}

fn is_shouting(word: &str) -> bool {
    word.chars().any(|c| c.is_alphabetic()) && !word.chars().any(|c| c.is_lowercase())
}

fn is_number(word: &str) -> bool {
    !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn check(content: &str) -> Verdict {
        classify(content, "", &ClassifierConfig::default())
    }

    #[test]
    fn test_decorative_rejected() {
        assert_eq!(check("----"), Verdict::Reject(RejectRule::Decorative));
        assert_eq!(check("===="), Verdict::Reject(RejectRule::Decorative));
        assert_eq!(check("─────┐"), Verdict::Reject(RejectRule::Decorative));
        assert_eq!(check("  \n"), Verdict::Reject(RejectRule::Blank));
        // pipes are not decoration, but a bare run of them has no text
        assert_eq!(check("|---|---|"), Verdict::Reject(RejectRule::TooShort));
    }

    #[test]
    fn test_pictograph_with_text_accepted() {
        assert_eq!(
            check("✅ Operation complete"),
            Verdict::Accept(AcceptRule::Pictograph)
        );
        assert_eq!(
            check("⚠️"),
            Verdict::Reject(RejectRule::PictographFragment)
        );
    }

    #[test]
    fn test_code_markers_rejected() {
        assert_eq!(check("import os"), Verdict::Reject(RejectRule::CodeMarker));
        assert_eq!(
            check("from pathlib import Path"),
            Verdict::Reject(RejectRule::CodeMarker)
        );
        assert_eq!(
            check("Could not load settings.json for this run"),
            Verdict::Reject(RejectRule::CodeMarker)
        );
        assert_eq!(
            check("value of sys.path is wrong, error"),
            Verdict::Reject(RejectRule::CodeMarker)
        );
    }

    #[test]
    fn test_keywords_inside_sentences_are_not_code() {
        assert_eq!(
            check("Are you sure you want to continue?"),
            Verdict::Accept(AcceptRule::Vocabulary)
        );
        assert_eq!(
            check("Import failed for this package"),
            Verdict::Accept(AcceptRule::Vocabulary)
        );
    }

    #[test]
    fn test_paths_rejected() {
        assert_eq!(check("/usr/local/bin"), Verdict::Reject(RejectRule::PathLike));
        assert_eq!(check("C:\\Temp"), Verdict::Reject(RejectRule::PathLike));
    }

    #[test]
    fn test_short_strings() {
        assert_eq!(check("{}: {}"), Verdict::Reject(RejectRule::TooShort));
        assert_eq!(check("!"), Verdict::Reject(RejectRule::TooShort));
        // short alphanumeric words survive the length rule but nothing accepts them
        assert_eq!(check("OK"), Verdict::Reject(RejectRule::Ambiguous));
        assert_eq!(
            classify("OK", "print(\"OK\")", &ClassifierConfig::default()),
            Verdict::Accept(AcceptRule::Context)
        );
    }

    #[test]
    fn test_sentence_rule() {
        assert_eq!(
            check("Loaded {} items from cache."),
            Verdict::Accept(AcceptRule::Sentence)
        );
        assert_eq!(
            check("HTTP GET 200, OK"),
            Verdict::Reject(RejectRule::Ambiguous)
        );
    }

    #[test]
    fn test_context_accepts_short_greeting() {
        let config = ClassifierConfig::default();
        assert_eq!(
            classify("Hello {}!", "print(f\"Hello {name}!\")", &config),
            Verdict::Accept(AcceptRule::Context)
        );
        assert_eq!(
            classify("Hello {}!", "greeting = f\"Hello {name}!\"", &config),
            Verdict::Reject(RejectRule::Ambiguous)
        );
    }

    #[test]
    fn test_classifier_trait_object() {
        let classifier: Box<dyn StringClassifier> =
            Box::new(HeuristicClassifier::new(ClassifierConfig::default()));
        assert!(classifier.classify("❌ Installation failed", "").is_accept());
    }
}
