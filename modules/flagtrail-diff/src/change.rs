//! Structural diff computation.
//!
//! The output is the reduced representation used by the history views: a
//! flat list of changes, each tagged `N` (added), `D` (deleted), `E`
//! (edited) or `A` (array element added/removed), with the path to the
//! changed value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One step in the path to a changed value: an object key or array index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A single structural change between two documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Change {
    /// A value present on the right side only.
    #[serde(rename = "N")]
    Added { path: Vec<PathSegment>, rhs: Value },

    /// A value present on the left side only.
    #[serde(rename = "D")]
    Deleted { path: Vec<PathSegment>, lhs: Value },

    /// A value present on both sides with different contents.
    #[serde(rename = "E")]
    Edited {
        path: Vec<PathSegment>,
        lhs: Value,
        rhs: Value,
    },

    /// An element added to or removed from an array. The inner change
    /// carries an empty path; the element's position is `index`.
    #[serde(rename = "A")]
    ArrayItem {
        path: Vec<PathSegment>,
        index: usize,
        item: Box<Change>,
    },
}

/// Structural diff of `lhs` against `rhs`.
///
/// Objects recurse over the union of their keys; arrays recurse over common
/// indices and report surplus elements as `ArrayItem` changes. Equal inputs
/// produce an empty list.
pub fn diff(lhs: &Value, rhs: &Value) -> Vec<Change> {
    let mut changes = Vec::new();
    diff_inner(lhs, rhs, &mut Vec::new(), &mut changes);
    changes
}

fn diff_inner(lhs: &Value, rhs: &Value, path: &mut Vec<PathSegment>, out: &mut Vec<Change>) {
    match (lhs, rhs) {
        (Value::Object(left), Value::Object(right)) => {
            for (key, left_value) in left {
                match right.get(key) {
                    Some(right_value) => {
                        path.push(PathSegment::Key(key.clone()));
                        diff_inner(left_value, right_value, path, out);
                        path.pop();
                    }
                    None => {
                        let mut full = path.clone();
                        full.push(PathSegment::Key(key.clone()));
                        out.push(Change::Deleted {
                            path: full,
                            lhs: left_value.clone(),
                        });
                    }
                }
            }
            for (key, right_value) in right {
                if !left.contains_key(key) {
                    let mut full = path.clone();
                    full.push(PathSegment::Key(key.clone()));
                    out.push(Change::Added {
                        path: full,
                        rhs: right_value.clone(),
                    });
                }
            }
        }
        (Value::Array(left), Value::Array(right)) => {
            let common = left.len().min(right.len());
            for index in 0..common {
                path.push(PathSegment::Index(index));
                diff_inner(&left[index], &right[index], path, out);
                path.pop();
            }
            for (index, left_value) in left.iter().enumerate().skip(common) {
                out.push(Change::ArrayItem {
                    path: path.clone(),
                    index,
                    item: Box::new(Change::Deleted {
                        path: Vec::new(),
                        lhs: left_value.clone(),
                    }),
                });
            }
            for (index, right_value) in right.iter().enumerate().skip(common) {
                out.push(Change::ArrayItem {
                    path: path.clone(),
                    index,
                    item: Box::new(Change::Added {
                        path: Vec::new(),
                        rhs: right_value.clone(),
                    }),
                });
            }
        }
        _ if lhs == rhs => {}
        _ => {
            out.push(Change::Edited {
                path: path.clone(),
                lhs: lhs.clone(),
                rhs: rhs.clone(),
            });
        }
    }
}
