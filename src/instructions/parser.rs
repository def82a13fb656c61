//! Parser for `jenkins:` instruction documents in comment text.
//!
//! A comment may carry several documents. Each starts at a line beginning
//! with the marker, possibly indented, wrapped in backticks, or inside an
//! HTML comment or a fenced code block. Quoted lines never yield
//! instructions.

use chrono::{DateTime, Utc};
use serde_yaml::Value;
use tracing::debug;

use super::types::Instruction;

/// The keyword that introduces an instruction document.
pub const MARKER: &str = "jenkins:";

const MARKER_KEY: &str = "jenkins";
const FENCE: &str = "```";
const HTML_OPEN: &str = "<!--";
const HTML_CLOSE: &str = "-->";

/// Parses every instruction found in a comment body.
///
/// Instructions come out in document order and carry `author` and `date`.
/// A malformed document is dropped without affecting the others.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use ci_reconciler::instructions::parse_instructions;
///
/// let body = "```yaml\njenkins:\n  colored: [toto]\n```";
/// let instructions = parse_instructions(body, "reviewer", Utc::now());
/// assert_eq!(instructions.len(), 1);
/// assert_eq!(instructions[0].name, "colored");
/// assert_eq!(instructions[0].args, vec!["toto".to_string()]);
///
/// // Citations are ignored.
/// assert!(parse_instructions("> jenkins: rebuild", "reviewer", Utc::now()).is_empty());
/// ```
pub fn parse_instructions(body: &str, author: &str, date: DateTime<Utc>) -> Vec<Instruction> {
    extract_documents(body)
        .iter()
        .flat_map(|document| parse_document(document))
        .map(|(name, args)| Instruction::new(name, args, author, date))
        .collect()
}

/// Splits a comment body into marker-prefixed documents.
fn extract_documents(body: &str) -> Vec<String> {
    let body = body.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<&str> = body.lines().collect();

    let mut documents = Vec::new();
    let mut in_fence = false;
    let mut in_html = false;
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        let trimmed = line.trim_start();
        i += 1;

        if trimmed.starts_with('>') {
            continue;
        }

        if let Some((first, inline)) = marker_line(trimmed) {
            let indent = line.len() - trimmed.len();
            let mut document = vec![first];
            if !inline {
                while i < lines.len() {
                    let next = lines[i];
                    if !continues_block(next, in_fence, in_html) {
                        break;
                    }
                    document.push(dedent(next, indent).to_string());
                    i += 1;
                }
            }
            documents.push(document.join("\n"));
            continue;
        }

        if trimmed.starts_with(FENCE) {
            in_fence = !in_fence;
        } else if let Some(rest) = trimmed.strip_prefix(HTML_OPEN) {
            in_html = !rest.contains(HTML_CLOSE);
        } else if trimmed.contains(HTML_CLOSE) {
            in_html = false;
        }
    }

    documents
}

/// Recognizes a marker line, returning the document's first line and whether
/// the document is confined to this line.
fn marker_line(trimmed: &str) -> Option<(String, bool)> {
    let (text, in_comment) = match trimmed.strip_prefix(HTML_OPEN) {
        Some(rest) => (rest.trim_start(), true),
        None => (trimmed, false),
    };

    let unticked = text.trim_start_matches('`');
    let ticked = unticked.len() != text.len();
    if !unticked.starts_with(MARKER) {
        return None;
    }

    let mut first = unticked.trim_end();
    let mut inline = ticked;
    if in_comment && let Some(stripped) = first.strip_suffix(HTML_CLOSE) {
        first = stripped.trim_end();
        inline = true;
    }
    if ticked {
        first = first.trim_end_matches('`');
    }
    Some((first.to_string(), inline))
}

/// Returns true if `line` belongs to the document opened on a previous line.
fn continues_block(line: &str, in_fence: bool, in_html: bool) -> bool {
    let trimmed = line.trim_start();
    if in_fence {
        return !trimmed.starts_with(FENCE);
    }
    if in_html {
        return !trimmed.contains(HTML_CLOSE);
    }
    // Plain text: only indented continuation lines.
    !trimmed.is_empty() && trimmed.len() != line.len()
}

/// Removes up to `indent` bytes of leading whitespace.
fn dedent(line: &str, indent: usize) -> &str {
    let leading = line.len() - line.trim_start().len();
    line.get(leading.min(indent)..).unwrap_or_else(|| line.trim_start())
}

/// Parses one document into `(name, args)` pairs.
fn parse_document(document: &str) -> Vec<(String, Vec<String>)> {
    let payload: Value = match serde_yaml::from_str(document) {
        Ok(payload) => payload,
        Err(e) => {
            debug!(error = %e, "Dropping malformed instruction block");
            return Vec::new();
        }
    };

    let Value::Mapping(mapping) = payload else {
        debug!("Dropping instruction block that is not a mapping");
        return Vec::new();
    };

    match mapping.get(MARKER_KEY).cloned() {
        // `jenkins:` on its own line followed by unindented keys.
        Some(Value::Null) | None => from_mapping(
            mapping
                .into_iter()
                .filter(|(key, _)| key.as_str() != Some(MARKER_KEY)),
        ),
        Some(value) => from_value(value),
    }
}

fn from_value(value: Value) -> Vec<(String, Vec<String>)> {
    match value {
        Value::Null => Vec::new(),
        Value::Mapping(mapping) => from_mapping(mapping),
        Value::Sequence(items) => items
            .into_iter()
            .flat_map(|item| match item {
                Value::Mapping(mapping) => from_mapping(mapping),
                other => scalar(&other).map(|name| (name, Vec::new())).into_iter().collect(),
            })
            .collect(),
        Value::Tagged(tagged) => from_value(tagged.value),
        other => scalar(&other).map(|name| (name, Vec::new())).into_iter().collect(),
    }
}

fn from_mapping(mapping: impl IntoIterator<Item = (Value, Value)>) -> Vec<(String, Vec<String>)> {
    mapping
        .into_iter()
        .filter_map(|(key, value)| Some((scalar(&key)?, arguments(value))))
        .collect()
}

fn arguments(value: Value) -> Vec<String> {
    match value {
        Value::Null => Vec::new(),
        Value::Sequence(items) => items.iter().filter_map(scalar).collect(),
        Value::Tagged(tagged) => arguments(tagged.value),
        other => scalar(&other).into_iter().collect(),
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
