//! Human-readable rendering of structural changes.
//!
//! One line per change: `- path: old` for deletions, `+ path: new` for
//! additions, both lines for edits. Array-element changes unwrap into the
//! inner change with the element index spliced into the path.

use serde_json::Value;

use crate::change::{Change, PathSegment};

/// Render a list of changes to display lines, preserving input order.
pub fn render(changes: &[Change]) -> Vec<String> {
    let mut lines = Vec::new();
    for change in changes {
        render_into(change, &[], &mut lines);
    }
    lines
}

/// Fallback for events that carry no diffable payload pair: the whole
/// payload, pretty-printed.
pub fn render_payload(payload: &Value) -> String {
    format!("{payload:#}")
}

fn render_into(change: &Change, prefix: &[PathSegment], lines: &mut Vec<String>) {
    match change {
        Change::Deleted { path, lhs } => {
            lines.push(format!("- {}: {}", join_path(prefix, path), lhs));
        }
        Change::Added { path, rhs } => {
            lines.push(format!("+ {}: {}", join_path(prefix, path), rhs));
        }
        Change::Edited { path, lhs, rhs } => {
            let joined = join_path(prefix, path);
            lines.push(format!("- {joined}: {lhs}"));
            lines.push(format!("+ {joined}: {rhs}"));
        }
        Change::ArrayItem { path, index, item } => {
            let mut inner_prefix: Vec<PathSegment> = prefix.to_vec();
            inner_prefix.extend(path.iter().cloned());
            inner_prefix.push(PathSegment::Index(*index));
            render_into(item, &inner_prefix, lines);
        }
    }
}

fn join_path(prefix: &[PathSegment], path: &[PathSegment]) -> String {
    prefix
        .iter()
        .chain(path.iter())
        .map(PathSegment::to_string)
        .collect::<Vec<_>>()
        .join(".")
}
