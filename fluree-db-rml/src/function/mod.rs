//! Function registry for function-valued term maps
//!
//! Functions are registered explicitly by IRI and injected into term
//! generation. A function-valued term map describes one execution per
//! record: the function IRI plus parameter bindings, produced by mapping a
//! nested TriplesMap against the current record.

mod builtin;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{RmlError, RmlResult};
use crate::source::RawValue;

/// An invocable function
pub trait RmlFunction: Send + Sync {
    fn call(&self, parameters: &FunctionParameters) -> RmlResult<RawValue>;
}

impl<F> RmlFunction for F
where
    F: Fn(&FunctionParameters) -> RmlResult<RawValue> + Send + Sync,
{
    fn call(&self, parameters: &FunctionParameters) -> RmlResult<RawValue> {
        self(parameters)
    }
}

/// Parameter bindings of one function execution, in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FunctionParameters {
    bindings: Vec<(String, Vec<RawValue>)>,
}

impl FunctionParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind values to a parameter IRI, appending to earlier bindings
    pub fn bind(&mut self, parameter: impl Into<String>, values: Vec<RawValue>) {
        let parameter = parameter.into();
        match self.bindings.iter_mut().find(|(p, _)| *p == parameter) {
            Some((_, existing)) => existing.extend(values),
            None => self.bindings.push((parameter, values)),
        }
    }

    pub fn with(mut self, parameter: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.bind(parameter, vec![value.into()]);
        self
    }

    /// All values bound to a parameter
    pub fn values(&self, parameter: &str) -> &[RawValue] {
        self.bindings
            .iter()
            .find(|(p, _)| p == parameter)
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    /// First non-null value bound to a parameter
    pub fn first(&self, parameter: &str) -> Option<&RawValue> {
        self.values(parameter).iter().find(|v| !v.is_null())
    }

    /// First value of a parameter as a lexical string
    pub fn string(&self, parameter: &str) -> Option<String> {
        self.first(parameter).and_then(RawValue::lexical)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RawValue])> {
        self.bindings.iter().map(|(p, v)| (p.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// One function execution described by a nested TriplesMap
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionExecution {
    pub function: String,
    pub parameters: FunctionParameters,
}

/// Registry of functions by IRI
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn RmlFunction>>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in GREL string functions
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register(&mut registry);
        registry
    }

    /// Register a function, replacing any previous registration
    pub fn register(&mut self, iri: impl Into<String>, function: impl RmlFunction + 'static) {
        self.functions.insert(iri.into(), Arc::new(function));
    }

    pub fn get(&self, iri: &str) -> Option<Arc<dyn RmlFunction>> {
        self.functions.get(iri).cloned()
    }

    pub fn contains(&self, iri: &str) -> bool {
        self.functions.contains_key(iri)
    }

    /// Look up a function, failing with a construction error if absent
    pub fn resolve(&self, iri: &str) -> RmlResult<Arc<dyn RmlFunction>> {
        self.get(iri)
            .ok_or_else(|| RmlError::UnknownFunction(iri.to_string()))
    }

    /// Invoke the function named by an execution
    pub fn execute(&self, execution: &FunctionExecution) -> RmlResult<RawValue> {
        self.resolve(&execution.function)?
            .call(&execution.parameters)
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut iris: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        iris.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("functions", &iris)
            .finish()
    }
}
