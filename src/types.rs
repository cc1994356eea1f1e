use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-open source range. Lines are 1-based, columns are 0-based byte offsets
/// into the line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start_line: usize,
    pub start_col: usize,
    pub end_line: usize,
    pub end_col: usize,
}

impl Span {
    pub fn new(start_line: usize, start_col: usize, end_line: usize, end_col: usize) -> Self {
        Self {
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateKind {
    /// Plain string constant passed to a sink function
    Literal,
    /// f-string expression
    Interpolated,
}

/// Why the classifier accepted a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcceptRule {
    Pictograph,
    Vocabulary,
    Context,
    Sentence,
}

/// Why the classifier rejected a string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectRule {
    Blank,
    Decorative,
    PictographFragment,
    CodeMarker,
    PathLike,
    TooShort,
    Ambiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "verdict", content = "rule")]
pub enum Verdict {
    Accept(AcceptRule),
    Reject(RejectRule),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept(_))
    }
}

/// A located, classified opportunity to externalize a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub kind: CandidateKind,
    pub span: Span,
    /// Literal value, or the `{}` template when `variables` is non-empty
    pub text: String,
    /// Source of each embedded expression, in left-to-right order
    pub variables: Vec<String>,
    pub verdict: Verdict,
    /// Trimmed text of the line the candidate starts on
    pub line_text: String,
}

/// Replacement bytes for one span; derived 1:1 from a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub span: Span,
    pub text: Vec<u8>,
}

impl Replacement {
    pub fn new(span: Span, text: impl Into<Vec<u8>>) -> Self {
        Self {
            span,
            text: text.into(),
        }
    }
}
