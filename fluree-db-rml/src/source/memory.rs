//! In-memory JSON logical sources
//!
//! Records are `serde_json::Value`s. Reference expressions are dot paths
//! (`a.b.0.c`, optional leading `$.`); a path step that meets an array fans
//! out over its elements, and `*` selects every child.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::{ExpressionEvaluator, LogicalSourceResolver, RawValue, Record, RecordSource};
use crate::error::{RmlError, RmlResult};
use crate::mapping::LogicalSource;
use crate::vocab::xsd;

/// Resolver serving JSON documents registered under a source locator
#[derive(Debug, Default, Clone)]
pub struct InMemoryResolver {
    sources: HashMap<String, Arc<Vec<Value>>>,
    active: Arc<AtomicUsize>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register documents for a source locator
    pub fn with_source(
        mut self,
        name: impl Into<String>,
        documents: impl IntoIterator<Item = Value>,
    ) -> Self {
        self.sources
            .insert(name.into(), Arc::new(documents.into_iter().collect()));
        self
    }

    /// Register a JSON text; a top-level array is one document per element
    pub fn with_json(self, name: impl Into<String>, json: &str) -> RmlResult<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| RmlError::Source(e.to_string()))?;
        let documents = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        Ok(self.with_source(name, documents))
    }

    /// Number of sources opened and not yet closed
    pub fn active_sources(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LogicalSourceResolver for InMemoryResolver {
    async fn open(&self, source: &LogicalSource) -> RmlResult<Box<dyn RecordSource>> {
        let documents = self.sources.get(&source.source).ok_or_else(|| {
            RmlError::Source(format!("unknown logical source '{}'", source.source))
        })?;

        let records: VecDeque<Value> = match &source.iterator {
            Some(iterator) => documents
                .iter()
                .flat_map(|doc| select(doc, iterator))
                .flat_map(|v| match v {
                    Value::Array(items) => items.clone(),
                    other => vec![other.clone()],
                })
                .collect(),
            None => documents.iter().cloned().collect(),
        };

        tracing::debug!(
            source = %source.source,
            records = records.len(),
            "opened in-memory logical source"
        );
        self.active.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemorySource {
            name: source.source.clone(),
            records,
            active: Arc::clone(&self.active),
            closed: false,
        }))
    }
}

struct MemorySource {
    name: String,
    records: VecDeque<Value>,
    active: Arc<AtomicUsize>,
    closed: bool,
}

impl MemorySource {
    fn release(&mut self) {
        if !self.closed {
            self.closed = true;
            self.records.clear();
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RecordSource for MemorySource {
    async fn request(&mut self, n: usize) -> RmlResult<Vec<Record>> {
        if self.closed {
            return Err(RmlError::Source(format!(
                "logical source '{}' is closed",
                self.name
            )));
        }
        let take = n.min(self.records.len());
        Ok(self
            .records
            .drain(..take)
            .map(|v| Box::new(JsonRecord::new(v)) as Record)
            .collect())
    }

    async fn close(&mut self) -> RmlResult<()> {
        self.release();
        Ok(())
    }
}

impl Drop for MemorySource {
    fn drop(&mut self) {
        self.release();
    }
}

/// A JSON record evaluated with dot paths
#[derive(Debug, Clone, PartialEq)]
pub struct JsonRecord {
    value: Value,
}

impl JsonRecord {
    pub fn new(value: Value) -> Self {
        Self { value }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl ExpressionEvaluator for JsonRecord {
    fn evaluate(&self, expression: &str) -> RmlResult<Vec<RawValue>> {
        Ok(select(&self.value, expression)
            .into_iter()
            .map(raw_value)
            .collect())
    }

    fn datatype(&self, expression: &str) -> Option<String> {
        select(&self.value, expression)
            .into_iter()
            .find_map(scalar_datatype)
            .map(str::to_string)
    }
}

fn scalar_datatype(value: &Value) -> Option<&'static str> {
    match value {
        Value::Bool(_) => Some(xsd::BOOLEAN),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(xsd::INTEGER),
        Value::Number(_) => Some(xsd::DOUBLE),
        Value::Array(items) => items.iter().find_map(scalar_datatype),
        _ => None,
    }
}

fn raw_value(value: &Value) -> RawValue {
    match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Boolean(*b),
        Value::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => RawValue::Integer(i),
            (None, Some(d)) => RawValue::Double(d),
            (None, None) => RawValue::String(n.to_string()),
        },
        Value::String(s) => RawValue::String(s.clone()),
        Value::Array(items) => RawValue::List(items.iter().map(raw_value).collect()),
        Value::Object(_) => RawValue::String(value.to_string()),
    }
}

/// Select the values addressed by a dot path
fn select<'a>(root: &'a Value, path: &str) -> Vec<&'a Value> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_prefix('.').unwrap_or(path);

    let mut current = vec![root];
    if path.is_empty() {
        return current;
    }
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            step(value, segment, &mut next);
        }
        current = next;
    }
    current
}

fn step<'a>(value: &'a Value, segment: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) if segment == "*" => out.extend(map.values()),
        Value::Object(map) => out.extend(map.get(segment)),
        Value::Array(items) if segment == "*" => out.extend(items.iter()),
        Value::Array(items) => match segment.parse::<usize>() {
            Ok(idx) => out.extend(items.get(idx)),
            Err(_) => {
                for item in items {
                    step(item, segment, out);
                }
            }
        },
        _ => {}
    }
}
