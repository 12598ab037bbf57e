use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use similar::{Algorithm, ChangeTag, TextDiff};

use crate::Body;

/// Unchanged lines kept around each change.
pub const CONTEXT_LINES: usize = 5;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LineKind {
    Added,
    Removed,
    Unchanged,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DiffLine {
    #[serde(rename = "type")]
    pub kind: LineKind,
    #[serde(rename = "content")]
    pub text: String,
    /// 1-based, counted on this side only
    pub line_number: usize,
}

/// One row of the two-column view. `left` is the reference side.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct AlignedLine {
    pub left: Option<DiffLine>,
    pub right: Option<DiffLine>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiffBlock {
    pub lines: Vec<AlignedLine>,
    pub skipped: bool,
}

impl DiffLine {
    fn new(kind: LineKind, text: &str, line_number: usize) -> Self {
        Self {
            kind,
            text: text.to_string(),
            line_number,
        }
    }
}

impl AlignedLine {
    pub fn is_changed(&self) -> bool {
        let unchanged = |l: &Option<DiffLine>| {
            matches!(l, Some(DiffLine { kind: LineKind::Unchanged, .. }))
        };
        !(unchanged(&self.left) && unchanged(&self.right))
    }
}

impl DiffBlock {
    pub fn shown(lines: Vec<AlignedLine>) -> Self {
        Self {
            lines,
            skipped: false,
        }
    }

    pub fn gap() -> Self {
        Self {
            lines: Vec::new(),
            skipped: true,
        }
    }
}

/// Aligned, context-windowed diff of two bodies.
pub fn diff_blocks(expected: &Body, actual: &Body, normalized: bool) -> Vec<DiffBlock> {
    let old = canonical_text(expected, normalized);
    let new = canonical_text(actual, normalized);
    window(&align_lines(&old, &new), CONTEXT_LINES)
}

/// Deterministic text rendering of a body for line diffing. With
/// `normalized`, object keys are sorted at every depth; array order is kept.
pub fn canonical_text(body: &Body, normalized: bool) -> String {
    match body {
        Body::Textual(s) => s.clone(),
        Body::Structured(v) if normalized => pretty(&sort_keys(v)),
        Body::Structured(v) => pretty(v),
        Body::Empty => pretty(&Value::Null),
    }
}

pub fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let sorted: Map<String, Value> = keys
                .into_iter()
                .map(|k| (k.clone(), sort_keys(&map[k])))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        v => v.clone(),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Walk a line diff keeping independent line counters per side.
pub fn align_lines(old: &str, new: &str) -> Vec<AlignedLine> {
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_lines(old, new);

    let (mut left, mut right) = (0, 0);
    let mut aligned = Vec::new();
    for change in diff.iter_all_changes() {
        let value = change.value();
        let text = value.strip_suffix('\n').unwrap_or(value);
        let line = match change.tag() {
            ChangeTag::Equal => {
                left += 1;
                right += 1;
                AlignedLine {
                    left: Some(DiffLine::new(LineKind::Unchanged, text, left)),
                    right: Some(DiffLine::new(LineKind::Unchanged, text, right)),
                }
            }
            ChangeTag::Insert => {
                right += 1;
                AlignedLine {
                    left: None,
                    right: Some(DiffLine::new(LineKind::Added, text, right)),
                }
            }
            ChangeTag::Delete => {
                left += 1;
                AlignedLine {
                    left: Some(DiffLine::new(LineKind::Removed, text, left)),
                    right: None,
                }
            }
        };
        aligned.push(line);
    }
    aligned
}

/// Keep `context` lines around every changed row and collapse the rest into
/// gap markers. Without changes the whole sequence is a single block.
pub fn window(lines: &[AlignedLine], context: usize) -> Vec<DiffBlock> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();
    for (idx, _) in lines.iter().enumerate().filter(|(_, l)| l.is_changed()) {
        let start = idx.saturating_sub(context);
        let end = (idx + context).min(lines.len() - 1);
        match ranges.last_mut() {
            Some((_, prev_end)) if start <= *prev_end + 1 => *prev_end = (*prev_end).max(end),
            _ => ranges.push((start, end)),
        }
    }

    if ranges.is_empty() {
        return vec![DiffBlock::shown(lines.to_vec())];
    }

    let mut blocks = Vec::with_capacity(ranges.len() * 2 - 1);
    for (i, (start, end)) in ranges.into_iter().enumerate() {
        if i > 0 {
            blocks.push(DiffBlock::gap());
        }
        blocks.push(DiffBlock::shown(lines[start..=end].to_vec()));
    }
    blocks
}
