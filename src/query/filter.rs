//! Filter expressions over document fields.
//!
//! Field paths are dotted (`address.city`). A filter is a pure description: it
//! renders to store SQL for logging and can be evaluated against a JSON document
//! by stores that execute locally.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;

/// Declarative predicate over a document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    /// Matches every document.
    #[default]
    True,
    Eq(String, Value),
    Ne(String, Value),
    Lt(String, Value),
    Le(String, Value),
    Gt(String, Value),
    Ge(String, Value),
    In(String, Vec<Value>),
    /// Substring for strings, membership for arrays.
    Contains(String, Value),
    StartsWith(String, String),
    IsDefined(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(path.into(), value.into())
    }

    pub fn ne(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ne(path.into(), value.into())
    }

    pub fn lt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Lt(path.into(), value.into())
    }

    pub fn le(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Le(path.into(), value.into())
    }

    pub fn gt(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Gt(path.into(), value.into())
    }

    pub fn ge(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Ge(path.into(), value.into())
    }

    pub fn is_in<I, V>(path: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Filter::In(path.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn contains(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Contains(path.into(), value.into())
    }

    pub fn starts_with(path: impl Into<String>, prefix: impl Into<String>) -> Self {
        Filter::StartsWith(path.into(), prefix.into())
    }

    pub fn is_defined(path: impl Into<String>) -> Self {
        Filter::IsDefined(path.into())
    }

    pub fn negate(self) -> Self {
        Filter::Not(Box::new(self))
    }

    /// Conjunction, flattening nested `And`s and dropping `True`.
    pub fn and(self, other: Filter) -> Self {
        let mut terms = Vec::new();
        for filter in [self, other] {
            match filter {
                Filter::True => {}
                Filter::And(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        match terms.len() {
            0 => Filter::True,
            1 => terms.remove(0),
            _ => Filter::And(terms),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        let mut terms = Vec::new();
        for filter in [self, other] {
            match filter {
                Filter::Or(inner) => terms.extend(inner),
                other => terms.push(other),
            }
        }
        Filter::Or(terms)
    }

    /// Evaluate against a JSON document. Missing fields never satisfy a comparison.
    pub fn matches(&self, document: &Value) -> bool {
        match self {
            Filter::True => true,
            Filter::Eq(path, expected) => {
                resolve_path(document, path).is_some_and(|v| values_equal(v, expected))
            }
            Filter::Ne(path, expected) => {
                resolve_path(document, path).is_some_and(|v| !values_equal(v, expected))
            }
            Filter::Lt(path, bound) => compare_at(document, path, bound, Ordering::is_lt),
            Filter::Le(path, bound) => compare_at(document, path, bound, Ordering::is_le),
            Filter::Gt(path, bound) => compare_at(document, path, bound, Ordering::is_gt),
            Filter::Ge(path, bound) => compare_at(document, path, bound, Ordering::is_ge),
            Filter::In(path, candidates) => resolve_path(document, path)
                .is_some_and(|v| candidates.iter().any(|c| values_equal(v, c))),
            Filter::Contains(path, needle) => match resolve_path(document, path) {
                Some(Value::String(haystack)) => needle
                    .as_str()
                    .is_some_and(|needle| haystack.contains(needle)),
                Some(Value::Array(elements)) => elements.iter().any(|e| values_equal(e, needle)),
                _ => false,
            },
            Filter::StartsWith(path, prefix) => resolve_path(document, path)
                .and_then(Value::as_str)
                .is_some_and(|s| s.starts_with(prefix.as_str())),
            Filter::IsDefined(path) => resolve_path(document, path).is_some(),
            Filter::And(terms) => terms.iter().all(|t| t.matches(document)),
            Filter::Or(terms) => terms.iter().any(|t| t.matches(document)),
            Filter::Not(inner) => !inner.matches(document),
        }
    }
}

/// Resolve a dotted field path inside a document.
pub fn resolve_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn compare_at(document: &Value, path: &str, bound: &Value, accept: fn(Ordering) -> bool) -> bool {
    resolve_path(document, path)
        .and_then(|v| compare_same_kind(v, bound))
        .is_some_and(accept)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Comparison between values of the same JSON kind; `None` across kinds.
fn compare_same_kind(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn kind_rank(value: Option<&Value>) -> u8 {
    match value {
        None => 0,
        Some(Value::Null) => 1,
        Some(Value::Bool(_)) => 2,
        Some(Value::Number(_)) => 3,
        Some(Value::String(_)) => 4,
        Some(Value::Array(_)) => 5,
        Some(Value::Object(_)) => 6,
    }
}

/// Total order used for sorting: undefined < null < bool < number < string < array < object.
pub fn sort_order(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let by_kind = kind_rank(a).cmp(&kind_rank(b));
    if by_kind != Ordering::Equal {
        return by_kind;
    }
    match (a, b) {
        (Some(x), Some(y)) => compare_same_kind(x, y).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

pub(crate) fn field_ref(path: &str) -> String {
    format!("c.{}", path)
}

fn literal(value: &Value) -> String {
    value.to_string()
}

fn write_terms(f: &mut fmt::Formatter<'_>, terms: &[Filter], joiner: &str) -> fmt::Result {
    if terms.is_empty() {
        return write!(f, "{}", if joiner == " AND " { "true" } else { "false" });
    }
    for (i, term) in terms.iter().enumerate() {
        if i > 0 {
            f.write_str(joiner)?;
        }
        match term {
            Filter::And(_) | Filter::Or(_) => write!(f, "({})", term)?,
            _ => write!(f, "{}", term)?,
        }
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::True => f.write_str("true"),
            Filter::Eq(p, v) => write!(f, "{} = {}", field_ref(p), literal(v)),
            Filter::Ne(p, v) => write!(f, "{} != {}", field_ref(p), literal(v)),
            Filter::Lt(p, v) => write!(f, "{} < {}", field_ref(p), literal(v)),
            Filter::Le(p, v) => write!(f, "{} <= {}", field_ref(p), literal(v)),
            Filter::Gt(p, v) => write!(f, "{} > {}", field_ref(p), literal(v)),
            Filter::Ge(p, v) => write!(f, "{} >= {}", field_ref(p), literal(v)),
            Filter::In(p, values) => {
                let list: Vec<String> = values.iter().map(literal).collect();
                write!(f, "{} IN ({})", field_ref(p), list.join(", "))
            }
            Filter::Contains(p, v) => match v {
                Value::String(_) => write!(f, "CONTAINS({}, {})", field_ref(p), literal(v)),
                _ => write!(f, "ARRAY_CONTAINS({}, {})", field_ref(p), literal(v)),
            },
            Filter::StartsWith(p, prefix) => write!(
                f,
                "STARTSWITH({}, {})",
                field_ref(p),
                literal(&Value::from(prefix.as_str()))
            ),
            Filter::IsDefined(p) => write!(f, "IS_DEFINED({})", field_ref(p)),
            Filter::And(terms) => write_terms(f, terms, " AND "),
            Filter::Or(terms) => write_terms(f, terms, " OR "),
            Filter::Not(inner) => write!(f, "NOT ({})", inner),
        }
    }
}
