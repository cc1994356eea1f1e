//! Turns candidates into replacement source text.

use crate::literal::quote;
use crate::types::{Candidate, Replacement};

#[derive(Debug, Clone)]
pub struct ExpressionBuilder {
    extern_function: String,
    format_method: String,
}

impl ExpressionBuilder {
    pub fn new(extern_function: impl Into<String>, format_method: impl Into<String>) -> Self {
        Self {
            extern_function: extern_function.into(),
            format_method: format_method.into(),
        }
    }

    /// `_("text")`, or `_("template").format(a, b)` when the candidate embeds
    /// expressions.
    pub fn build(&self, candidate: &Candidate) -> String {
        let call = format!("{}({})", self.extern_function, quote(&candidate.text));
        if candidate.variables.is_empty() {
            call
        } else {
            format!(
                "{call}.{}({})",
                self.format_method,
                candidate.variables.join(", ")
            )
        }
    }

    pub fn replacement(&self, candidate: &Candidate) -> Replacement {
        Replacement::new(candidate.span, self.build(candidate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::literal::{StringPrefix, decode_segment};
    use crate::types::{AcceptRule, CandidateKind, Span, Verdict};

    fn candidate(kind: CandidateKind, text: &str, variables: &[&str]) -> Candidate {
        Candidate {
            kind,
            span: Span::new(1, 6, 1, 20),
            text: text.to_string(),
            variables: variables.iter().map(|v| v.to_string()).collect(),
            verdict: Verdict::Accept(AcceptRule::Sentence),
            line_text: String::new(),
        }
    }

    #[test]
    fn test_literal_call() {
        let builder = ExpressionBuilder::new("_", "format");
        let c = candidate(CandidateKind::Literal, "Save changes?", &[]);
        assert_eq!(builder.build(&c), "_(\"Save changes?\")");
    }

    #[test]
    fn test_interpolated_call_keeps_argument_order() {
        let builder = ExpressionBuilder::new("_", "format");
        let c = candidate(
            CandidateKind::Interpolated,
            "Copied {} of {} files to {!r}",
            &["done", "len(files)", "(a, b)"],
        );
        assert_eq!(
            builder.build(&c),
            "_(\"Copied {} of {} files to {!r}\").format(done, len(files), (a, b))"
        );
    }

    #[test]
    fn test_zero_variable_interpolated_uses_plain_call() {
        let builder = ExpressionBuilder::new("_", "format");
        let c = candidate(CandidateKind::Interpolated, "Use {braces} freely", &[]);
        assert_eq!(builder.build(&c), "_(\"Use {braces} freely\")");
    }

    #[test]
    fn test_custom_names() {
        let builder = ExpressionBuilder::new("gettext", "fmt");
        let c = candidate(CandidateKind::Interpolated, "Hi {}", &["user"]);
        assert_eq!(builder.build(&c), "gettext(\"Hi {}\").fmt(user)");
    }

    #[test]
    fn test_escaped_text_decodes_to_original() {
        let builder = ExpressionBuilder::new("_", "format");
        let text = "Say \"hi\"\n\tto C:\\Users \u{1b}[0m";
        let c = candidate(CandidateKind::Literal, text, &[]);
        let built = builder.build(&c);
        let inner = &built[3..built.len() - 2];
        assert_eq!(decode_segment(inner, StringPrefix::default()).unwrap(), text);
    }

    #[test]
    fn test_replacement_carries_span() {
        let builder = ExpressionBuilder::new("_", "format");
        let c = candidate(CandidateKind::Literal, "Done.", &[]);
        let replacement = builder.replacement(&c);
        assert_eq!(replacement.span, c.span);
        assert_eq!(replacement.text, b"_(\"Done.\")");
    }
}
