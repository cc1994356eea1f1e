//! # Source Analyzer
//!
//! Walks a parsed Python tree and emits the strings that should be wrapped in
//! the externalization function:
//!
//! - direct string-constant arguments of configured sink calls (`print(...)`)
//! - f-strings anywhere outside an existing externalization call
//!
//! Existing `_(...)` and `_(...).format(...)` calls are located first and never
//! entered, which keeps the rewrite idempotent.

use std::collections::HashSet;
use std::ops::Range;

use tracing::debug;

use crate::ast_utils::{ParsedSource, PyNode};
use crate::classifier::StringClassifier;
use crate::config::ConverterConfig;
use crate::literal::{DecodeError, StringPrefix, decode_segment, escape_braces};
use crate::types::{Candidate, CandidateKind};

/// Expression kinds that need parentheses to stay one positional argument.
const TUPLE_KINDS: &[&str] = &["expression_list", "pattern_list", "yield"];

pub struct SourceAnalyzer<'c> {
    config: &'c ConverterConfig,
    classifier: &'c dyn StringClassifier,
}

/// Everything the analyzer found in one file.
#[derive(Debug, Default)]
pub struct Analysis {
    pub candidates: Vec<Candidate>,
    /// Number of externalization calls already present
    pub existing_calls: usize,
    /// Strings that looked like candidates but could not be decoded exactly
    pub undecodable: usize,
    /// Implicit concatenations skipped because rewriting them would drop comments
    pub commented: usize,
}

/// Template under construction for an f-string.
#[derive(Default)]
struct TemplateBuilder {
    template: String,
    plain: String,
    variables: Vec<String>,
}

impl TemplateBuilder {
    fn push_literal(&mut self, value: &str) {
        self.template.push_str(&escape_braces(value));
        self.plain.push_str(value);
    }
}

impl<'c> SourceAnalyzer<'c> {
    pub fn new(config: &'c ConverterConfig, classifier: &'c dyn StringClassifier) -> Self {
        Self { config, classifier }
    }

    pub fn analyze(&self, source: &ParsedSource<'_>) -> Analysis {
        let root = source.root();

        let mut handled = HashSet::new();
        self.collect_extern_calls(&root, &mut handled);

        let mut analysis = Analysis {
            existing_calls: handled.len(),
            ..Default::default()
        };
        self.visit(&root, source, &handled, &mut analysis);

        analysis
            .candidates
            .sort_by_key(|c| (c.span.start_line, c.span.start_col));
        debug!(
            "Found {} candidates, {} existing externalization calls",
            analysis.candidates.len(),
            analysis.existing_calls
        );
        analysis
    }

    /// True for `EXTERN(...)` and `EXTERN(...).FORMAT(...)`.
    pub fn is_extern_call(&self, node: &PyNode<'_>) -> bool {
        if node.kind() != "call" {
            return false;
        }
        let Some(function) = node.field("function") else {
            return false;
        };
        match function.kind().as_ref() {
            "identifier" => function.text() == self.config.extern_function.as_str(),
            "attribute" => {
                let is_format = function
                    .field("attribute")
                    .is_some_and(|a| a.text() == self.config.format_method.as_str());
                is_format
                    && function.field("object").is_some_and(|object| {
                        object.kind() == "call"
                            && object.field("function").is_some_and(|f| {
                                f.kind() == "identifier"
                                    && f.text() == self.config.extern_function.as_str()
                            })
                    })
            }
            _ => false,
        }
    }

    fn collect_extern_calls(&self, node: &PyNode<'_>, handled: &mut HashSet<Range<usize>>) {
        if self.is_extern_call(node) {
            handled.insert(node.range());
            return;
        }
        for child in node.children() {
            self.collect_extern_calls(&child, handled);
        }
    }

    fn visit(
        &self,
        node: &PyNode<'_>,
        source: &ParsedSource<'_>,
        handled: &HashSet<Range<usize>>,
        analysis: &mut Analysis,
    ) {
        match node.kind().as_ref() {
            "call" => {
                if handled.contains(&node.range()) {
                    return;
                }
                if self.is_sink_call(node) {
                    self.inspect_sink_arguments(node, source, analysis);
                }
            }
            "string" | "concatenated_string" => {
                if is_format_string(node) {
                    self.inspect_fstring(node, source, analysis);
                }
                // plain strings outside sink calls are never candidates
                return;
            }
            _ => {}
        }

        for child in node.children() {
            self.visit(&child, source, handled, analysis);
        }
    }

    fn is_sink_call(&self, node: &PyNode<'_>) -> bool {
        let Some(function) = node.field("function") else {
            return false;
        };
        let name = match function.kind().as_ref() {
            "identifier" => function.text().to_string(),
            "attribute" => match function.field("attribute") {
                Some(attribute) => attribute.text().to_string(),
                None => return false,
            },
            _ => return false,
        };
        self.config.sink_functions.iter().any(|sink| *sink == name)
    }

    fn inspect_sink_arguments(
        &self,
        call: &PyNode<'_>,
        source: &ParsedSource<'_>,
        analysis: &mut Analysis,
    ) {
        let Some(arguments) = call.field("arguments") else {
            return;
        };
        for argument in arguments.children() {
            let kind = argument.kind();
            if (kind != "string" && kind != "concatenated_string") || is_format_string(&argument)
            {
                continue;
            }
            if has_comment(&argument) {
                debug!("Skipping literal with embedded comments");
                analysis.commented += 1;
                continue;
            }

            let value = match plain_value(&argument, source) {
                Ok(Some(value)) => value,
                Ok(None) => continue,
                Err(e) => {
                    debug!("Skipping undecodable literal: {}", e);
                    analysis.undecodable += 1;
                    continue;
                }
            };

            let span = source.span_of(&argument);
            let line_text = source.line_text(span.start_line);
            let verdict = self.classifier.classify(&value, &line_text);
            if verdict.is_accept() {
                analysis.candidates.push(Candidate {
                    kind: CandidateKind::Literal,
                    span,
                    text: value,
                    variables: Vec::new(),
                    verdict,
                    line_text,
                });
            }
        }
    }

    fn inspect_fstring(&self, node: &PyNode<'_>, source: &ParsedSource<'_>, analysis: &mut Analysis) {
        if has_comment(node) {
            debug!("Skipping f-string with embedded comments");
            analysis.commented += 1;
            return;
        }
        let built = match build_template(node, source) {
            Ok(Some(built)) => built,
            Ok(None) => return,
            Err(e) => {
                debug!("Skipping undecodable f-string: {}", e);
                analysis.undecodable += 1;
                return;
            }
        };

        let text = if built.variables.is_empty() {
            built.plain
        } else {
            built.template
        };

        let span = source.span_of(node);
        let line_text = source.line_text(span.start_line);
        let verdict = self.classifier.classify(&text, &line_text);
        if verdict.is_accept() {
            analysis.candidates.push(Candidate {
                kind: CandidateKind::Interpolated,
                span,
                text,
                variables: built.variables,
                verdict,
                line_text,
            });
        }
    }
}

/// Parts of a `string` or `concatenated_string` node.
fn string_parts<'r>(node: &PyNode<'r>) -> Vec<PyNode<'r>> {
    if node.kind() == "string" {
        vec![node.clone()]
    } else {
        node.children().filter(|c| c.kind() == "string").collect()
    }
}

/// Comments between the parts of a concatenation sit inside its span.
fn has_comment(node: &PyNode<'_>) -> bool {
    node.dfs().any(|n| n.kind() == "comment")
}

fn part_prefix(part: &PyNode<'_>) -> StringPrefix {
    part.children()
        .find(|c| c.kind() == "string_start")
        .map(|start| StringPrefix::parse(&start.text()))
        .unwrap_or_default()
}

fn is_format_string(node: &PyNode<'_>) -> bool {
    string_parts(node).iter().any(|part| part_prefix(part).format)
}

/// Byte range between the opening and closing quote tokens of a string part.
fn body_range(part: &PyNode<'_>) -> Option<Range<usize>> {
    let start = part.children().find(|c| c.kind() == "string_start")?;
    let end = part.children().find(|c| c.kind() == "string_end")?;
    Some(start.range().end..end.range().start)
}

/// Value of a plain string or implicit concatenation of plain strings.
/// `None` for bytes literals.
fn plain_value(node: &PyNode<'_>, source: &ParsedSource<'_>) -> Result<Option<String>, DecodeError> {
    let mut value = String::new();
    for part in string_parts(node) {
        let prefix = part_prefix(&part);
        if prefix.bytes {
            return Ok(None);
        }
        let Some(body) = body_range(&part) else {
            return Ok(None);
        };
        value.push_str(&decode_segment(source.text(body), prefix)?);
    }
    Ok(Some(value))
}

/// Template, plain value and variables of an f-string (or a concatenation
/// containing one). `None` when the node cannot be rebuilt faithfully.
fn build_template(
    node: &PyNode<'_>,
    source: &ParsedSource<'_>,
) -> Result<Option<TemplateBuilder>, DecodeError> {
    let mut builder = TemplateBuilder::default();

    for part in string_parts(node) {
        let prefix = part_prefix(&part);
        if prefix.bytes {
            return Ok(None);
        }
        let Some(body) = body_range(&part) else {
            return Ok(None);
        };

        let mut cursor = body.start;
        for child in part.children().filter(|c| c.kind() == "interpolation") {
            let range = child.range();
            builder.push_literal(&decode_segment(source.text(cursor..range.start), prefix)?);
            if render_interpolation(&child, source, &mut builder, false).is_none() {
                return Ok(None);
            }
            cursor = range.end;
        }
        builder.push_literal(&decode_segment(source.text(cursor..body.end), prefix)?);
    }

    Ok(Some(builder))
}

fn field_or_kind<'r>(node: &PyNode<'r>, name: &str) -> Option<PyNode<'r>> {
    node.field(name)
        .or_else(|| node.children().find(|c| c.kind() == name))
}

/// Append the placeholder for one interpolation, recording its expression
/// and then any nested expressions of its format specifier.
fn render_interpolation(
    node: &PyNode<'_>,
    source: &ParsedSource<'_>,
    builder: &mut TemplateBuilder,
    nested: bool,
) -> Option<()> {
    let expression = node.field("expression")?;
    let expression_text = if TUPLE_KINDS.contains(&expression.kind().as_ref()) {
        format!("({})", expression.text())
    } else {
        expression.text().to_string()
    };

    let children: Vec<PyNode<'_>> = node.children().collect();
    let marker_index = children
        .iter()
        .position(|c| !c.is_named() && c.kind() == "=");
    let conversion = field_or_kind(node, "type_conversion").map(|c| c.text().to_string());
    let format_spec = field_or_kind(node, "format_specifier");

    if let Some(index) = marker_index {
        if nested {
            return None;
        }
        // `{expr = }` prints the expression source with the spacing around `=`
        let open = children.first()?;
        let until = children.get(index + 1)?.range().start;
        builder.push_literal(source.text(open.range().end..until));
    }

    let mut placeholder = String::from("{");
    match (&conversion, marker_index, &format_spec) {
        (Some(conversion), _, _) => placeholder.push_str(conversion),
        (None, Some(_), None) => placeholder.push_str("!r"),
        _ => {}
    }

    builder.variables.push(expression_text);

    if let Some(spec) = format_spec {
        placeholder.push(':');
        let spec_range = spec.range();
        // skip the leading ':' token
        let mut cursor = spec
            .children()
            .next()
            .filter(|c| c.kind() == ":")
            .map(|c| c.range().end)
            .unwrap_or(spec_range.start);
        for child in spec
            .children()
            .filter(|c| c.kind() == "format_expression" || c.kind() == "interpolation")
        {
            let range = child.range();
            placeholder.push_str(source.text(cursor..range.start));
            let mut inner = TemplateBuilder::default();
            render_interpolation(&child, source, &mut inner, true)?;
            placeholder.push_str(&inner.template);
            builder.variables.extend(inner.variables);
            cursor = range.end;
        }
        placeholder.push_str(source.text(cursor..spec_range.end));
    }

    placeholder.push('}');
    builder.template.push_str(&placeholder);
    Some(())
}
