//! # Patch Engine
//!
//! Applies non-overlapping span replacements to raw file bytes. Columns are
//! byte offsets, so all offset arithmetic happens on the undecoded buffer.

use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::ServiceError;
use crate::types::{Replacement, Span};

/// Byte offsets of line starts in a raw buffer.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(bytes: &[u8]) -> Self {
        let mut starts = vec![0];
        starts.extend(
            bytes
                .iter()
                .enumerate()
                .filter(|(_, b)| **b == b'\n')
                .map(|(i, _)| i + 1),
        );
        Self {
            starts,
            len: bytes.len(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.starts.len()
    }

    /// Absolute offset of a 1-based line and 0-based byte column.
    pub fn offset(&self, line: usize, column: usize) -> Option<usize> {
        let start = *self.starts.get(line.checked_sub(1)?)?;
        let line_end = self.starts.get(line).copied().unwrap_or(self.len);
        let offset = start + column;
        (offset <= line_end).then_some(offset)
    }

    /// 1-based line and 0-based byte column of an absolute offset.
    pub fn position(&self, offset: usize) -> (usize, usize) {
        let offset = offset.min(self.len);
        let line = self.starts.partition_point(|start| *start <= offset);
        (line, offset - self.starts[line - 1])
    }

    pub fn span(&self, range: std::ops::Range<usize>) -> Span {
        let (start_line, start_col) = self.position(range.start);
        let (end_line, end_col) = self.position(range.end);
        Span::new(start_line, start_col, end_line, end_col)
    }

    /// Bytes of a line without its terminator.
    pub fn line<'a>(&self, bytes: &'a [u8], line: usize) -> &'a [u8] {
        let Some(start) = line.checked_sub(1).and_then(|i| self.starts.get(i).copied()) else {
            return &[];
        };
        let end = self.starts.get(line).copied().unwrap_or(self.len);
        let text = &bytes[start..end.min(bytes.len())];
        let text = text.strip_suffix(b"\n").unwrap_or(text);
        text.strip_suffix(b"\r").unwrap_or(text)
    }
}

/// A replacement that could not be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedReplacement {
    pub span: Span,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct PatchOutcome {
    pub bytes: Vec<u8>,
    /// Spans that were written, in ascending order
    pub applied: Vec<Span>,
    pub dropped: Vec<DroppedReplacement>,
}

impl PatchOutcome {
    pub fn changed(&self, original: &[u8]) -> bool {
        self.bytes != original
    }
}

pub struct PatchEngine;

impl PatchEngine {
    /// Apply `replacements` to `source`.
    ///
    /// Spans are applied from the end of the buffer backwards so earlier
    /// offsets stay valid. A span reaching past the already rewritten region,
    /// or pointing outside the buffer, is dropped and reported; the rest still
    /// apply.
    pub fn apply(source: &[u8], replacements: &[Replacement]) -> PatchOutcome {
        if replacements.is_empty() {
            return PatchOutcome {
                bytes: source.to_vec(),
                applied: Vec::new(),
                dropped: Vec::new(),
            };
        }

        let index = LineIndex::new(source);
        let mut dropped = Vec::new();
        let mut resolved: Vec<(usize, usize, &Replacement)> = Vec::with_capacity(replacements.len());

        for replacement in replacements {
            let span = replacement.span;
            match (
                index.offset(span.start_line, span.start_col),
                index.offset(span.end_line, span.end_col),
            ) {
                (Some(start), Some(end)) if start <= end => resolved.push((start, end, replacement)),
                _ => {
                    warn!("Dropping replacement with out-of-range span {}", span);
                    dropped.push(DroppedReplacement {
                        span,
                        reason: "span outside file".to_string(),
                    });
                }
            }
        }

        resolved.sort_by(|a, b| {
            (b.2.span.start_line, b.2.span.start_col, b.1).cmp(&(
                a.2.span.start_line,
                a.2.span.start_col,
                a.1,
            ))
        });

        let mut chunks: Vec<&[u8]> = Vec::with_capacity(resolved.len() * 2 + 1);
        let mut applied = Vec::with_capacity(resolved.len());
        let mut cursor = source.len();

        for (start, end, replacement) in resolved {
            if end > cursor {
                let span = replacement.span;
                let conflict = ServiceError::SpanConflict {
                    start_line: span.start_line,
                    start_col: span.start_col,
                    end_line: span.end_line,
                    end_col: span.end_col,
                };
                warn!("Dropping replacement: {}", conflict);
                dropped.push(DroppedReplacement {
                    span,
                    reason: conflict.to_string(),
                });
                continue;
            }
            chunks.push(&source[end..cursor]);
            chunks.push(&replacement.text);
            cursor = start;
            applied.push(replacement.span);
        }
        chunks.push(&source[..cursor]);

        let mut bytes = Vec::with_capacity(chunks.iter().map(|c| c.len()).sum());
        for chunk in chunks.iter().rev() {
            bytes.extend_from_slice(chunk);
        }
        applied.reverse();

        debug!(
            "Applied {} replacements, dropped {}",
            applied.len(),
            dropped.len()
        );

        PatchOutcome {
            bytes,
            applied,
            dropped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn replace(span: Span, text: &str) -> Replacement {
        Replacement::new(span, text.as_bytes().to_vec())
    }

    #[test]
    fn test_line_index_positions() {
        let src = "ab\ncd\r\n\nxyz".as_bytes();
        let index = LineIndex::new(src);
        assert_eq!(index.line_count(), 4);
        assert_eq!(index.offset(1, 0), Some(0));
        assert_eq!(index.offset(2, 1), Some(4));
        assert_eq!(index.offset(4, 3), Some(11));
        assert_eq!(index.offset(4, 4), None);
        assert_eq!(index.offset(0, 0), None);
        assert_eq!(index.position(4), (2, 1));
        assert_eq!(index.position(11), (4, 3));
        assert_eq!(index.line(src, 2), b"cd");
        assert_eq!(index.line(src, 3), b"");
    }

    #[test]
    fn test_no_replacements_is_identity() {
        let src = "print('hi')\n".as_bytes();
        let outcome = PatchEngine::apply(src, &[]);
        assert_eq!(outcome.bytes, src);
        assert!(!outcome.changed(src));
    }

    #[test]
    fn test_replacements_respect_byte_columns() {
        // the pictograph is four bytes wide, so "go" starts at byte column 14
        let src = "x = \"🚀\"; y(\"go\")\nz\n".as_bytes();
        let start = src.windows(4).position(|w| w == b"\"go\"").unwrap();
        let outcome = PatchEngine::apply(
            src,
            &[
                replace(Span::new(1, start, 1, start + 4), "_(\"go\")"),
                replace(Span::new(1, 4, 1, 10), "_(\"🚀\")"),
            ],
        );
        assert_eq!(
            String::from_utf8(outcome.bytes).unwrap(),
            "x = _(\"🚀\"); y(_(\"go\"))\nz\n"
        );
        assert_eq!(outcome.applied.len(), 2);
        assert!(outcome.applied[0] < outcome.applied[1]);
    }

    #[test]
    fn test_overlap_is_dropped_not_fatal() {
        let src = b"0123456789\n";
        let outcome = PatchEngine::apply(
            src,
            &[
                replace(Span::new(1, 2, 1, 6), "A"),
                replace(Span::new(1, 4, 1, 8), "B"),
                replace(Span::new(1, 9, 1, 10), "C"),
            ],
        );
        assert_eq!(outcome.bytes, b"0123B8C\n");
        assert_eq!(outcome.dropped.len(), 1);
        assert_eq!(outcome.dropped[0].span, Span::new(1, 2, 1, 6));
    }

    #[test]
    fn test_out_of_range_span_dropped() {
        let src = b"abc\n";
        let outcome = PatchEngine::apply(src, &[replace(Span::new(5, 0, 5, 1), "x")]);
        assert_eq!(outcome.bytes, src);
        assert_eq!(outcome.dropped.len(), 1);
    }

    #[test]
    fn test_multiline_span() {
        let src = b"a = (\"x\"\n     \"y\")\n";
        let outcome = PatchEngine::apply(src, &[replace(Span::new(1, 5, 2, 8), "_(\"xy\")")]);
        assert_eq!(outcome.bytes, b"a = (_(\"xy\"))\n");
    }

    #[test]
    fn test_order_independent() {
        let src = b"aa bb cc\n";
        let reps = vec![
            replace(Span::new(1, 0, 1, 2), "X"),
            replace(Span::new(1, 6, 1, 8), "Z"),
            replace(Span::new(1, 3, 1, 5), "Y"),
        ];
        let mut reversed = reps.clone();
        reversed.reverse();
        assert_eq!(
            PatchEngine::apply(src, &reps).bytes,
            PatchEngine::apply(src, &reversed).bytes
        );
    }
}
