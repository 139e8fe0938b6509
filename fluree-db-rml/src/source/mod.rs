//! Logical source boundary
//!
//! Record streams are pulled through a credit protocol: the pipeline asks a
//! [`RecordSource`] for at most `n` records at a time and never receives
//! records it did not request. Not requesting is pausing. Every opened
//! source is closed exactly once by the pipeline, on every exit path.
//!
//! Records expose an [`ExpressionEvaluator`]: reference expressions are
//! opaque strings interpreted by the source (JSONPath, XPath, column names,
//! ...). Term generation only ever sees [`RawValue`]s.

mod memory;

use std::fmt;

use async_trait::async_trait;

use crate::error::RmlResult;
use crate::mapping::LogicalSource;
use crate::vocab::xsd;

pub use memory::{InMemoryResolver, JsonRecord};

/// Raw value produced by evaluating an expression against a record
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    /// Collection value; each element becomes its own lexical value
    List(Vec<RawValue>),
}

impl RawValue {
    /// Natural RDF lexical form of a scalar value
    ///
    /// Returns `None` for nulls and collections.
    pub fn lexical(&self) -> Option<String> {
        match self {
            RawValue::Null | RawValue::List(_) => None,
            RawValue::Boolean(b) => Some(b.to_string()),
            RawValue::Integer(n) => Some(n.to_string()),
            RawValue::Double(d) => Some(if d.is_nan() {
                "NaN".to_string()
            } else if d.is_infinite() && d.is_sign_positive() {
                "INF".to_string()
            } else if d.is_infinite() {
                "-INF".to_string()
            } else {
                d.to_string()
            }),
            RawValue::String(s) => Some(s.clone()),
        }
    }

    /// Flatten into per-element lexical values
    ///
    /// Collections contribute one entry per element (recursively); a null
    /// element yields a `None` entry so index alignment is preserved.
    pub fn flatten_into(&self, out: &mut Vec<Option<String>>) {
        match self {
            RawValue::List(items) => {
                for item in items {
                    item.flatten_into(out);
                }
            }
            other => out.push(other.lexical()),
        }
    }

    /// XSD datatype naturally associated with this value, if any
    pub fn natural_datatype(&self) -> Option<&'static str> {
        match self {
            RawValue::Boolean(_) => Some(xsd::BOOLEAN),
            RawValue::Integer(_) => Some(xsd::INTEGER),
            RawValue::Double(_) => Some(xsd::DOUBLE),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, RawValue::Null)
    }
}

impl From<&str> for RawValue {
    fn from(s: &str) -> Self {
        RawValue::String(s.to_string())
    }
}

impl From<String> for RawValue {
    fn from(s: String) -> Self {
        RawValue::String(s)
    }
}

impl From<i64> for RawValue {
    fn from(n: i64) -> Self {
        RawValue::Integer(n)
    }
}

impl From<f64> for RawValue {
    fn from(d: f64) -> Self {
        RawValue::Double(d)
    }
}

impl From<bool> for RawValue {
    fn from(b: bool) -> Self {
        RawValue::Boolean(b)
    }
}

/// Lexical values of an evaluation result, aligned by element
///
/// When every element is null the result is empty: a missing or null
/// reference produces no term.
pub fn lexical_values(values: &[RawValue]) -> Vec<Option<String>> {
    let mut out = Vec::with_capacity(values.len());
    for value in values {
        value.flatten_into(&mut out);
    }
    if out.iter().all(Option::is_none) {
        out.clear();
    }
    out
}

/// Expression evaluation against a single record
///
/// Implementations must be pure: evaluating the same expression twice on
/// the same record yields the same values.
pub trait ExpressionEvaluator: Send + Sync {
    /// Evaluate a reference expression; zero or more raw values
    fn evaluate(&self, expression: &str) -> RmlResult<Vec<RawValue>>;

    /// Datatype IRI the source associates with an expression's values
    ///
    /// Used for reference-valued literals without a configured datatype.
    fn datatype(&self, _expression: &str) -> Option<String> {
        None
    }
}

/// A record handed out by a [`RecordSource`]
pub type Record = Box<dyn ExpressionEvaluator>;

/// Pull-based record stream for one opened logical source
#[async_trait]
pub trait RecordSource: Send {
    /// Request up to `n` more records
    ///
    /// An empty batch means the source is exhausted.
    async fn request(&mut self, n: usize) -> RmlResult<Vec<Record>>;

    /// Release all resources held by this source
    async fn close(&mut self) -> RmlResult<()>;
}

/// Opens record streams for logical sources
#[async_trait]
pub trait LogicalSourceResolver: fmt::Debug + Send + Sync {
    async fn open(&self, source: &LogicalSource) -> RmlResult<Box<dyn RecordSource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexical_forms() {
        assert_eq!(RawValue::Boolean(true).lexical().as_deref(), Some("true"));
        assert_eq!(RawValue::Integer(-7).lexical().as_deref(), Some("-7"));
        assert_eq!(RawValue::Double(1.5).lexical().as_deref(), Some("1.5"));
        assert_eq!(RawValue::Double(f64::NAN).lexical().as_deref(), Some("NaN"));
        assert_eq!(
            RawValue::Double(f64::NEG_INFINITY).lexical().as_deref(),
            Some("-INF")
        );
        assert_eq!(RawValue::Null.lexical(), None);
    }

    #[test]
    fn test_lexical_values_flatten_lists() {
        let values = vec![RawValue::List(vec![
            RawValue::from("a"),
            RawValue::Null,
            RawValue::Integer(3),
        ])];
        assert_eq!(
            lexical_values(&values),
            vec![Some("a".to_string()), None, Some("3".to_string())]
        );
    }

    #[test]
    fn test_lexical_values_all_null_is_empty() {
        assert!(lexical_values(&[RawValue::Null]).is_empty());
        assert!(lexical_values(&[]).is_empty());
        assert!(lexical_values(&[RawValue::List(vec![])]).is_empty());
    }

    #[test]
    fn test_natural_datatype() {
        assert_eq!(RawValue::Integer(1).natural_datatype(), Some(xsd::INTEGER));
        assert_eq!(RawValue::from("x").natural_datatype(), None);
    }
}
