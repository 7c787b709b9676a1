//! Template expressions: `{{ expr }}` detection, evaluation, and string
//! rendering.
//!
//! Evaluation goes through the [`Evaluator`] trait so the expression
//! language stays swappable. The built-in [`PathEvaluator`] understands
//! dotted paths, literals, and a handful of filters:
//!
//! ```text
//! {{ primary.bg }}            value at a dotted path (numeric segments index lists)
//! {{ "#ffffff" }}, {{ 12 }}   string, number, `true`/`false`/`none` literals
//! {{ theme_name | upper }}    filters: upper, lower, trim, string, length,
//!                             default(<literal>)
//! {{ primary.bg.nohash }}     color forms, as a last path segment or a filter:
//! {{ primary.bg | alt }}      hex, nohash, alt, maxsat, rgb, hsv
//! ```
use serde_json::Value;
use thiserror::Error;

use super::Mapping;
use super::color::{self, Color};

/// Opening delimiter of a template expression.
pub const OPEN: &str = "{{";
/// Closing delimiter of a template expression.
pub const CLOSE: &str = "}}";

/// Errors produced while evaluating a single expression.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    /// The expression referenced a name or path that does not exist (yet).
    #[error("\"{name}\" is undefined")]
    Undefined {
        /// Path that could not be found.
        name: String,
    },

    /// The expression could not be parsed.
    #[error("invalid expression \"{expr}\": {message}")]
    Syntax {
        /// Expression text.
        expr: String,
        /// Parser diagnostic.
        message: String,
    },

    /// A filter was applied to a value of the wrong type.
    #[error("type error: {message}")]
    Type {
        /// Description of the mismatch.
        message: String,
    },
}

impl EvalError {
    /// Whether a later pass might succeed once more of the document resolves.
    #[must_use]
    pub const fn is_missing_reference(&self) -> bool {
        matches!(self, Self::Undefined { .. })
    }
}

/// Evaluates the inner text of a template expression against a mapping.
pub trait Evaluator: Send + Sync + std::fmt::Debug {
    /// Evaluate `expr` (without the surrounding braces) against `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::Undefined`] for missing references and
    /// [`EvalError::Syntax`] or [`EvalError::Type`] for malformed input.
    fn evaluate(&self, expr: &str, ctx: &Mapping) -> Result<Value, EvalError>;
}

/// Whether `s` is a whole-string template expression.
#[must_use]
pub fn is_template(s: &str) -> bool {
    s.starts_with(OPEN) && s.ends_with(CLOSE) && s.len() >= OPEN.len() + CLOSE.len()
}

/// Whether a value is a string holding a template expression.
#[must_use]
pub fn is_template_value(value: &Value) -> bool {
    value.as_str().is_some_and(is_template)
}

/// Strip the delimiters from a whole-string template expression.
#[must_use]
pub fn inner_expr(s: &str) -> Option<&str> {
    if is_template(s) {
        s.strip_prefix(OPEN)?.strip_suffix(CLOSE)
    } else {
        None
    }
}

/// Render every `{{ ... }}` occurrence in `text` against `ctx`.
///
/// Strings are inserted verbatim, `null` as the empty string, and every
/// other value as compact JSON.
///
/// # Errors
///
/// Returns the first [`EvalError`] encountered, or [`EvalError::Syntax`] for
/// an unterminated expression.
pub fn render_str(
    text: &str,
    ctx: &Mapping,
    evaluator: &dyn Evaluator,
) -> Result<String, EvalError> {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some((before, after)) = rest.split_once(OPEN) {
        out.push_str(before);
        let Some((expr, tail)) = after.split_once(CLOSE) else {
            return Err(EvalError::Syntax {
                expr: format!("{OPEN}{after}"),
                message: "unterminated expression".to_string(),
            });
        };
        let value = evaluator.evaluate(expr, ctx)?;
        out.push_str(&display_value(&value));
        rest = tail;
    }
    out.push_str(rest);
    Ok(out)
}

/// Text form of a value as inserted into rendered strings.
#[must_use]
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Built-in evaluator for dotted paths, literals, and simple filters.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathEvaluator;

impl Evaluator for PathEvaluator {
    fn evaluate(&self, expr: &str, ctx: &Mapping) -> Result<Value, EvalError> {
        let parts = split_pipes(expr).map_err(|message| EvalError::Syntax {
            expr: expr.trim().to_string(),
            message,
        })?;
        let Some((head, filters)) = parts.split_first() else {
            return Err(syntax(expr, "empty expression"));
        };
        let mut value = primary(head.trim(), expr, ctx);
        for filter in filters {
            value = apply_filter(filter.trim(), value, expr);
        }
        value
    }
}

fn syntax(expr: &str, message: &str) -> EvalError {
    EvalError::Syntax {
        expr: expr.trim().to_string(),
        message: message.to_string(),
    }
}

/// Split on `|` outside of quoted strings.
fn split_pipes(expr: &str) -> Result<Vec<String>, String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    for c in expr.chars() {
        match (quote, c) {
            (Some(q), c) if c == q => {
                quote = None;
                current.push(c);
            }
            (Some(_), c) => current.push(c),
            (None, '"' | '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, '|') => parts.push(std::mem::take(&mut current)),
            (None, c) => current.push(c),
        }
    }
    if quote.is_some() {
        return Err("unterminated string literal".to_string());
    }
    parts.push(current);
    Ok(parts)
}

/// Evaluate the leading term of an expression. Missing paths stay as
/// [`EvalError::Undefined`] so that `default(...)` can recover them.
fn primary(term: &str, expr: &str, ctx: &Mapping) -> Result<Value, EvalError> {
    if term.is_empty() {
        return Err(syntax(expr, "empty expression"));
    }
    if let Some(literal) = literal(term) {
        return literal.ok_or_else(|| syntax(expr, "malformed literal"));
    }
    if !is_path(term) {
        return Err(syntax(expr, &format!("unexpected \"{term}\"")));
    }
    lookup(term, ctx)
}

/// Resolve a dotted path. A trailing color form (`primary.bg.nohash`) that is
/// not itself a key applies to the value before it.
fn lookup(path: &str, ctx: &Mapping) -> Result<Value, EvalError> {
    if let Some(value) = ctx.get_path(path) {
        return Ok(value.clone());
    }
    if let Some((head, form)) = path.rsplit_once('.')
        && color::is_property(form)
    {
        return color_form(&lookup(head, ctx)?, form, path);
    }
    Err(EvalError::Undefined {
        name: path.to_string(),
    })
}

/// Apply the color form `form` to a color string. A value that is still an
/// unresolved expression counts as a missing reference to `path`.
fn color_form(value: &Value, form: &str, path: &str) -> Result<Value, EvalError> {
    match value {
        Value::String(s) if is_template(s) => Err(EvalError::Undefined {
            name: path.to_string(),
        }),
        Value::String(s) => Color::parse(s)
            .ok()
            .and_then(|c| c.property(form))
            .ok_or_else(|| EvalError::Type {
                message: format!("\"{form}\" needs a color, got \"{s}\""),
            }),
        other => Err(EvalError::Type {
            message: format!("\"{form}\" needs a color, got {}", type_name(other)),
        }),
    }
}

/// Parse a literal term. `None` means the term is not a literal at all;
/// `Some(None)` means it looked like one but was malformed.
fn literal(term: &str) -> Option<Option<Value>> {
    match term {
        "true" | "True" => return Some(Some(Value::Bool(true))),
        "false" | "False" => return Some(Some(Value::Bool(false))),
        "none" | "None" | "null" => return Some(Some(Value::Null)),
        _ => {}
    }
    let first = term.chars().next()?;
    if first == '"' || first == '\'' {
        let inner = term
            .strip_prefix(first)
            .and_then(|rest| rest.strip_suffix(first));
        return Some(inner.map(|s| Value::String(s.to_string())));
    }
    if first.is_ascii_digit() || first == '-' {
        return Some(serde_json::from_str::<serde_json::Number>(term).ok().map(Value::Number));
    }
    None
}

fn is_path(term: &str) -> bool {
    term.split('.').enumerate().all(|(i, segment)| {
        let mut chars = segment.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            }
            Some(c) if i > 0 && c.is_ascii_digit() => chars.all(|c| c.is_ascii_digit()),
            _ => false,
        }
    })
}

fn apply_filter(
    filter: &str,
    value: Result<Value, EvalError>,
    expr: &str,
) -> Result<Value, EvalError> {
    if let Some(arg) = filter
        .strip_prefix("default(")
        .and_then(|rest| rest.strip_suffix(')'))
    {
        return match value {
            Err(EvalError::Undefined { .. }) | Ok(Value::Null) => {
                match literal(arg.trim()) {
                    Some(Some(v)) => Ok(v),
                    _ => Err(syntax(expr, "default() takes a literal argument")),
                }
            }
            other => other,
        };
    }
    let value = value?;
    match filter {
        "upper" => string_filter(&value, filter, str::to_uppercase),
        "lower" => string_filter(&value, filter, str::to_lowercase),
        "trim" => string_filter(&value, filter, |s| s.trim().to_string()),
        "string" => Ok(Value::String(display_value(&value))),
        "length" => match &value {
            Value::String(s) => Ok(Value::from(s.chars().count())),
            Value::Array(items) => Ok(Value::from(items.len())),
            Value::Object(map) => Ok(Value::from(map.len())),
            other => Err(EvalError::Type {
                message: format!("length of {} is undefined", type_name(other)),
            }),
        },
        form if color::is_property(form) => color_form(&value, form, expr.trim()),
        "" => Err(syntax(expr, "empty filter")),
        unknown => Err(syntax(expr, &format!("unknown filter \"{unknown}\""))),
    }
}

fn string_filter(value: &Value, name: &str, f: impl Fn(&str) -> String) -> Result<Value, EvalError> {
    match value {
        Value::String(s) => Ok(Value::String(f(s))),
        other => Err(EvalError::Type {
            message: format!("filter \"{name}\" expects a string, got {}", type_name(other)),
        }),
    }
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "none",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mapping;
    use serde_json::json;

    fn eval(expr: &str, ctx: &Mapping) -> Result<Value, EvalError> {
        PathEvaluator.evaluate(expr, ctx)
    }

    #[test]
    fn detects_whole_string_templates() {
        assert!(is_template("{{ a }}"));
        assert!(is_template("{{a}}"));
        assert!(!is_template("x {{ a }}"));
        assert!(!is_template("{{ a }} x"));
        assert!(!is_template("{}"));
        assert_eq!(inner_expr("{{ a.b }}"), Some(" a.b "));
    }

    #[test]
    fn evaluates_paths_and_literals() {
        let ctx = mapping!({"primary": {"bg": "#112233"}, "items": [10, 20]});
        assert_eq!(eval(" primary.bg ", &ctx), Ok(json!("#112233")));
        assert_eq!(eval("items.1", &ctx), Ok(json!(20)));
        assert_eq!(eval("primary", &ctx), Ok(json!({"bg": "#112233"})));
        assert_eq!(eval("'lit'", &ctx), Ok(json!("lit")));
        assert_eq!(eval("-1.5", &ctx), Ok(json!(-1.5)));
        assert_eq!(eval("true", &ctx), Ok(json!(true)));
        assert_eq!(eval("none", &ctx), Ok(Value::Null));
    }

    #[test]
    fn missing_path_is_undefined() {
        let err = eval("primary.fg", &mapping!({"primary": {}})).unwrap_err();
        assert!(err.is_missing_reference());
        assert_eq!(err.to_string(), "\"primary.fg\" is undefined");
    }

    #[test]
    fn template_string_result_is_returned_as_is() {
        let ctx = mapping!({"b": "{{ c }}"});
        assert_eq!(eval("b", &ctx), Ok(json!("{{ c }}")));
    }

    #[test]
    fn filters_apply_left_to_right() {
        let ctx = mapping!({"name": "  Gruvbox  "});
        assert_eq!(eval("name | trim | upper", &ctx), Ok(json!("GRUVBOX")));
        assert_eq!(eval("name|trim|length", &ctx), Ok(json!(7)));
        assert_eq!(eval("missing | default('x')", &ctx), Ok(json!("x")));
        assert_eq!(eval("'a|b' | upper", &ctx), Ok(json!("A|B")));
    }

    #[test]
    fn type_and_syntax_errors_are_not_missing_references() {
        let ctx = mapping!({"n": 3});
        let err = eval("n | upper", &ctx).unwrap_err();
        assert!(matches!(err, EvalError::Type { .. }));
        assert!(!err.is_missing_reference());
        assert!(matches!(eval("n | bogus", &ctx), Err(EvalError::Syntax { .. })));
        assert!(matches!(eval("a + b", &ctx), Err(EvalError::Syntax { .. })));
        assert!(matches!(eval("'open", &ctx), Err(EvalError::Syntax { .. })));
        assert!(matches!(eval("  ", &ctx), Err(EvalError::Syntax { .. })));
    }

    #[test]
    fn render_str_substitutes_every_expression() {
        let ctx = mapping!({"home_dir": "/home/u", "n": 2, "flag": null});
        let out = render_str("{{home_dir}}/.config x{{ n }}{{ flag }}", &ctx, &PathEvaluator);
        assert_eq!(out, Ok("/home/u/.config x2".to_string()));
    }

    #[test]
    fn color_forms_as_path_segment_or_filter() {
        let ctx = mapping!({
            "primary": {"bg": "#458588", "hex": "#000000"},
            "term": {"color0": "rgb(255, 255, 255)"},
            "n": 3
        });
        assert_eq!(eval("primary.bg.nohash", &ctx), Ok(json!("458588")));
        assert_eq!(eval("primary.bg | nohash", &ctx), Ok(json!("458588")));
        assert_eq!(eval("term.color0.hex", &ctx), Ok(json!("#ffffff")));
        assert_eq!(eval("term.color0.alt.nohash", &ctx), Ok(json!("e5e5e5")));
        assert_eq!(eval("term.color0 | rgb", &ctx), Ok(json!("rgb(255, 255, 255)")));
        assert_eq!(eval("primary.hex", &ctx), Ok(json!("#000000")));
        assert!(matches!(eval("n.nohash", &ctx), Err(EvalError::Type { .. })));
        assert!(matches!(eval("primary.nohash", &ctx), Err(EvalError::Type { .. })));
        assert!(eval("secondary.bg.nohash", &ctx).unwrap_err().is_missing_reference());
    }

    #[test]
    fn color_form_of_unresolved_value_is_retried() {
        let ctx = mapping!({"a": "{{ b }}"});
        let err = eval("a.nohash", &ctx).unwrap_err();
        assert!(err.is_missing_reference());
    }

    #[test]
    fn render_str_unterminated_is_syntax_error() {
        let err = render_str("echo {{ oops", &Mapping::new(), &PathEvaluator).unwrap_err();
        assert!(matches!(err, EvalError::Syntax { .. }));
    }
}
