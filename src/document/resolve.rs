//! Fixpoint resolution of `{{ expr }}` leaves in a composed document.
//!
//! A single [`resolve_pass`] walks every template leaf in document order and
//! evaluates it against the live document, so a leaf resolved early in the
//! pass is visible to leaves evaluated after it. [`resolve_document`] repeats
//! passes until no template leaf is left, or fails once a pass leaves as many
//! unresolved leaves as the one before it.
use std::fmt;

use serde_json::Value;
use thiserror::Error;

use super::Mapping;
use super::template::{EvalError, Evaluator, inner_expr, is_template_value};

/// A template leaf that could not be resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unresolved {
    /// Dotted path of the leaf (`term.color0`, `items.2`).
    pub path: String,
    /// The leaf's literal template text.
    pub expr: String,
}

impl fmt::Display for Unresolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.expr)
    }
}

/// Errors that abort reference resolution.
#[derive(Error, Debug)]
pub enum ResolveError {
    /// References still missing after a pass made no progress.
    #[error("keyword reference for {} not found", quoted_list(.unresolved))]
    Unresolved {
        /// Every remaining unresolved leaf.
        unresolved: Vec<Unresolved>,
        /// Number of passes run before giving up.
        passes: usize,
    },

    /// An expression was malformed or ill-typed.
    #[error("cannot evaluate \"{expr}\" at {path}: {source}")]
    Evaluation {
        /// Dotted path of the leaf.
        path: String,
        /// The leaf's literal template text.
        expr: String,
        /// Underlying evaluator error.
        source: EvalError,
    },
}

fn quoted_list(items: &[Unresolved]) -> String {
    items
        .iter()
        .map(|u| format!("\"{u}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// A fully resolved document and the number of passes it took.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Document with no template leaves left.
    pub document: Mapping,
    /// Passes run, at least one.
    pub passes: usize,
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

fn dotted(path: &[Segment]) -> String {
    path.iter()
        .map(|s| match s {
            Segment::Key(k) => k.clone(),
            Segment::Index(i) => i.to_string(),
        })
        .collect::<Vec<_>>()
        .join(".")
}

/// Collect the paths of every template leaf, in document order.
fn template_leaves(value: &Value, prefix: &mut Vec<Segment>, out: &mut Vec<Vec<Segment>>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                prefix.push(Segment::Key(key.clone()));
                template_leaves(child, prefix, out);
                prefix.pop();
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                prefix.push(Segment::Index(i));
                template_leaves(child, prefix, out);
                prefix.pop();
            }
        }
        leaf if is_template_value(leaf) => out.push(prefix.clone()),
        _ => {}
    }
}

fn leaves_of(doc: &Mapping) -> Vec<Vec<Segment>> {
    let mut out = Vec::new();
    for (key, value) in doc {
        let mut prefix = vec![Segment::Key(key.clone())];
        template_leaves(value, &mut prefix, &mut out);
    }
    out
}

fn value_at<'a>(doc: &'a Mapping, path: &[Segment]) -> Option<&'a Value> {
    let (Segment::Key(first), rest) = path.split_first()? else {
        return None;
    };
    let mut current = doc.get(first)?;
    for segment in rest {
        current = match (segment, current) {
            (Segment::Key(k), Value::Object(map)) => map.get(k)?,
            (Segment::Index(i), Value::Array(items)) => items.get(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

fn value_at_mut<'a>(doc: &'a mut Mapping, path: &[Segment]) -> Option<&'a mut Value> {
    let (Segment::Key(first), rest) = path.split_first()? else {
        return None;
    };
    let mut current = doc.get_mut(first)?;
    for segment in rest {
        current = match (segment, current) {
            (Segment::Key(k), Value::Object(map)) => map.get_mut(k)?,
            (Segment::Index(i), Value::Array(items)) => items.get_mut(*i)?,
            _ => return None,
        };
    }
    Some(current)
}

fn unresolved_of(doc: &Mapping) -> Vec<Unresolved> {
    leaves_of(doc)
        .into_iter()
        .filter_map(|path| {
            let expr = value_at(doc, &path)?.as_str()?.to_string();
            Some(Unresolved {
                path: dotted(&path),
                expr,
            })
        })
        .collect()
}

/// Evaluate every template leaf of `doc` once.
///
/// A leaf whose expression references something missing, or evaluates to
/// another template string, is left unchanged and reported as unresolved.
/// Leaves introduced during the pass (a reference that copied a subtree
/// containing templates) are reported too.
///
/// # Errors
///
/// Returns [`ResolveError::Evaluation`] as soon as an expression is
/// malformed or ill-typed.
pub fn resolve_pass(
    mut doc: Mapping,
    evaluator: &dyn Evaluator,
) -> Result<(Mapping, Vec<Unresolved>), ResolveError> {
    for path in leaves_of(&doc) {
        let Some(text) = value_at(&doc, &path).and_then(Value::as_str) else {
            continue;
        };
        let Some(expr) = inner_expr(text) else {
            continue;
        };
        let resolved = match evaluator.evaluate(expr, &doc) {
            Ok(value) if is_template_value(&value) => continue,
            Ok(value) => value,
            Err(e) if e.is_missing_reference() => continue,
            Err(source) => {
                return Err(ResolveError::Evaluation {
                    path: dotted(&path),
                    expr: text.to_string(),
                    source,
                });
            }
        };
        if let Some(slot) = value_at_mut(&mut doc, &path) {
            *slot = resolved;
        }
    }
    let unresolved = unresolved_of(&doc);
    Ok((doc, unresolved))
}

/// Run [`resolve_pass`] until no template leaf is left.
///
/// After the first pass, another pass runs only while the number of
/// unresolved leaves strictly decreases, so the number of passes is bounded
/// by the unresolved count left after the first one.
///
/// # Errors
///
/// Returns [`ResolveError::Unresolved`] listing every remaining leaf with
/// its expression when a pass makes no progress, or the first
/// [`ResolveError::Evaluation`] encountered.
pub fn resolve_document(doc: Mapping, evaluator: &dyn Evaluator) -> Result<Resolution, ResolveError> {
    let (mut doc, mut pending) = resolve_pass(doc, evaluator)?;
    let mut passes = 1;
    while !pending.is_empty() {
        let previous = pending.len();
        let (next, now_pending) = resolve_pass(doc, evaluator)?;
        passes += 1;
        doc = next;
        pending = now_pending;
        if pending.len() >= previous {
            return Err(ResolveError::Unresolved {
                unresolved: pending,
                passes,
            });
        }
    }
    Ok(Resolution {
        document: doc,
        passes,
    })
}
