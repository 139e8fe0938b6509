//! Parent-side join store

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use dashmap::DashMap;

use crate::error::{RmlError, RmlResult};
use crate::materialize::RdfTerm;
use crate::source::{lexical_values, ExpressionEvaluator};

/// Ordered tuple of lexical join-key values, one per join condition
pub type JoinKey = Vec<String>;

/// Multi-map from join key to the parent subject terms produced for it
///
/// Populated concurrently while the parent TriplesMap streams its records
/// and sealed once that stream is exhausted. Lookups are only meaningful
/// after sealing; inserting into a sealed store is an error.
#[derive(Debug, Default)]
pub struct ParentJoinStore {
    entries: DashMap<JoinKey, BTreeSet<RdfTerm>>,
    terms: AtomicUsize,
    sealed: AtomicBool,
}

impl ParentJoinStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parent subject term under a key
    ///
    /// Terms accumulate per key. Returns `true` if the term was new for
    /// that key.
    pub fn insert(&self, key: JoinKey, term: RdfTerm) -> RmlResult<bool> {
        if self.is_sealed() {
            return Err(RmlError::Join(
                "parent join store is sealed; its parent stream already completed".to_string(),
            ));
        }
        let added = self.entries.entry(key).or_default().insert(term);
        if added {
            self.terms.fetch_add(1, Ordering::Relaxed);
        }
        Ok(added)
    }

    /// Mark the parent stream as exhausted
    pub fn seal(&self) {
        self.sealed.store(true, Ordering::Release);
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed.load(Ordering::Acquire)
    }

    /// Parent subject terms stored under a key, in term order
    pub fn lookup(&self, key: &[String]) -> Vec<RdfTerm> {
        self.entries
            .get(key)
            .map(|terms| terms.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of (key, term) pairs stored
    pub fn term_count(&self) -> usize {
        self.terms.load(Ordering::Relaxed)
    }
}

/// Join key tuples of a record for an ordered list of expressions
///
/// Multi-valued expressions contribute every combination. If any
/// expression yields no value the record has no key. An empty expression
/// list yields the single empty key.
pub fn key_tuples(
    record: &dyn ExpressionEvaluator,
    expressions: &[String],
) -> RmlResult<Vec<JoinKey>> {
    let mut tuples: Vec<JoinKey> = vec![Vec::with_capacity(expressions.len())];
    for expression in expressions {
        let values: Vec<String> = lexical_values(&record.evaluate(expression)?)
            .into_iter()
            .flatten()
            .collect();
        if values.is_empty() {
            return Ok(Vec::new());
        }
        let mut next = Vec::with_capacity(tuples.len() * values.len());
        for tuple in &tuples {
            for value in &values {
                let mut extended = tuple.clone();
                extended.push(value.clone());
                next.push(extended);
            }
        }
        tuples = next;
    }
    Ok(tuples)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::source::JsonRecord;

    fn key(parts: &[&str]) -> JoinKey {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_terms_accumulate_per_key() {
        let store = ParentJoinStore::new();
        assert!(store
            .insert(key(&["1"]), RdfTerm::iri("http://ex.org/a"))
            .unwrap());
        assert!(store
            .insert(key(&["1"]), RdfTerm::iri("http://ex.org/b"))
            .unwrap());
        assert!(!store
            .insert(key(&["1"]), RdfTerm::iri("http://ex.org/a"))
            .unwrap());

        assert_eq!(store.len(), 1);
        assert_eq!(store.term_count(), 2);
        assert_eq!(
            store.lookup(&key(&["1"])),
            vec![RdfTerm::iri("http://ex.org/a"), RdfTerm::iri("http://ex.org/b")]
        );
        assert!(store.lookup(&key(&["2"])).is_empty());
    }

    #[test]
    fn test_composite_key_matches_jointly() {
        let store = ParentJoinStore::new();
        store
            .insert(key(&["JFK", "US"]), RdfTerm::iri("http://ex.org/jfk"))
            .unwrap();
        assert_eq!(store.lookup(&key(&["JFK", "US"])).len(), 1);
        assert!(store.lookup(&key(&["JFK", "UK"])).is_empty());
        assert!(store.lookup(&key(&["JFK"])).is_empty());
    }

    #[test]
    fn test_insert_after_seal_fails() {
        let store = ParentJoinStore::new();
        store.seal();
        assert!(store.is_sealed());
        let err = store
            .insert(key(&["1"]), RdfTerm::iri("http://ex.org/a"))
            .unwrap_err();
        assert!(matches!(err, RmlError::Join(_)));
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = std::sync::Arc::new(ParentJoinStore::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let bucket = (i % 10).to_string();
                        store
                            .insert(
                                key(&[bucket.as_str()]),
                                RdfTerm::iri(format!("http://ex.org/{t}/{i}")),
                            )
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 10);
        assert_eq!(store.term_count(), 400);
    }

    #[test]
    fn test_key_tuples() {
        let record = JsonRecord::new(json!({"a": ["x", "y"], "b": 1, "n": null}));
        let exprs = |e: &[&str]| e.iter().map(|s| s.to_string()).collect::<Vec<_>>();

        assert_eq!(
            key_tuples(&record, &exprs(&["a", "b"])).unwrap(),
            vec![key(&["x", "1"]), key(&["y", "1"])]
        );
        assert!(key_tuples(&record, &exprs(&["a", "n"])).unwrap().is_empty());
        assert!(key_tuples(&record, &exprs(&["missing"])).unwrap().is_empty());
        assert_eq!(key_tuples(&record, &[]).unwrap(), vec![JoinKey::new()]);
    }
}
