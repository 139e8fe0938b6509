//! Compiled RML mapping with indexes
//!
//! The rule graph is an arena of TriplesMap definitions addressed by
//! [`TriplesMapId`]. Definitions refer to each other by IRI; the arena
//! resolves those IRIs to ids, so nested function maps and join parents
//! never form ownership cycles.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::TriplesMap;
use crate::error::{RmlError, RmlResult};

/// Stable identifier of a TriplesMap within a compiled mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TriplesMapId(pub u32);

impl TriplesMapId {
    /// Index into the arena
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TriplesMapId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Complete compiled RML mapping
///
/// Contains all TriplesMap definitions from a rule graph along with
/// indexes for efficient lookup. Immutable once built.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<TriplesMap>", into = "Vec<TriplesMap>")]
pub struct CompiledRmlMapping {
    /// All TriplesMap definitions, indexed by `TriplesMapId`
    triples_maps: Vec<TriplesMap>,

    /// Index: TriplesMap IRI → id
    by_iri: HashMap<String, TriplesMapId>,

    /// IRIs defined more than once (the first definition wins)
    duplicate_iris: Vec<String>,

    /// Index: source locator → TriplesMaps reading it
    source_to_maps: HashMap<String, Vec<TriplesMapId>>,

    /// Index: class IRI → TriplesMaps that produce subjects of that class
    class_to_maps: HashMap<String, Vec<TriplesMapId>>,

    /// Index: predicate IRI → (TriplesMap, PredicateObjectMap index)
    predicate_to_maps: HashMap<String, Vec<(TriplesMapId, usize)>>,
}

impl CompiledRmlMapping {
    /// Create a new CompiledRmlMapping from a list of TriplesMap definitions
    pub fn new(triples_maps: Vec<TriplesMap>) -> Self {
        let mut mapping = Self::default();

        for tm in triples_maps {
            mapping.add_triples_map(tm);
        }

        mapping
    }

    /// Parse a JSON array of TriplesMap definitions
    pub fn from_json(json: &str) -> RmlResult<Self> {
        let maps: Vec<TriplesMap> = serde_json::from_str(json).map_err(|e| {
            RmlError::InvalidValue {
                property: "rule graph".to_string(),
                message: e.to_string(),
            }
        })?;
        Ok(Self::new(maps))
    }

    /// Add a TriplesMap and update indexes
    pub fn add_triples_map(&mut self, tm: TriplesMap) -> TriplesMapId {
        let id = TriplesMapId(self.triples_maps.len() as u32);

        if self.by_iri.contains_key(&tm.iri) {
            self.duplicate_iris.push(tm.iri.clone());
        } else {
            self.by_iri.insert(tm.iri.clone(), id);
        }

        self.source_to_maps
            .entry(tm.source_name().to_string())
            .or_default()
            .push(id);

        for class in tm.classes() {
            self.class_to_maps.entry(class.clone()).or_default().push(id);
        }

        for (idx, pom) in tm.predicate_object_maps.iter().enumerate() {
            for pred_iri in pom.constant_predicates() {
                self.predicate_to_maps
                    .entry(pred_iri.to_string())
                    .or_default()
                    .push((id, idx));
            }
        }

        self.triples_maps.push(tm);
        id
    }

    /// Get a TriplesMap by id
    pub fn get(&self, id: TriplesMapId) -> Option<&TriplesMap> {
        self.triples_maps.get(id.index())
    }

    /// Get a TriplesMap by IRI
    pub fn get_by_iri(&self, iri: &str) -> Option<&TriplesMap> {
        self.id_of(iri).and_then(|id| self.get(id))
    }

    /// Resolve a TriplesMap IRI to its id
    pub fn id_of(&self, iri: &str) -> Option<TriplesMapId> {
        self.by_iri.get(iri).copied()
    }

    /// Iterate over all TriplesMaps with their ids
    pub fn iter(&self) -> impl Iterator<Item = (TriplesMapId, &TriplesMap)> {
        self.triples_maps
            .iter()
            .enumerate()
            .map(|(i, tm)| (TriplesMapId(i as u32), tm))
    }

    /// Get all TriplesMap IRIs
    pub fn triples_map_iris(&self) -> impl Iterator<Item = &str> {
        self.triples_maps.iter().map(|tm| tm.iri.as_str())
    }

    /// IRIs defined by more than one TriplesMap
    pub fn duplicate_iris(&self) -> &[String] {
        &self.duplicate_iris
    }

    /// Get the number of TriplesMap definitions
    pub fn len(&self) -> usize {
        self.triples_maps.len()
    }

    /// Check if the mapping is empty
    pub fn is_empty(&self) -> bool {
        self.triples_maps.is_empty()
    }

    fn resolve(&self, ids: Option<&Vec<TriplesMapId>>) -> Vec<&TriplesMap> {
        ids.map(|ids| ids.iter().filter_map(|id| self.get(*id)).collect())
            .unwrap_or_default()
    }

    /// Find TriplesMap(s) that read a given source
    pub fn find_maps_for_source(&self, source: &str) -> Vec<&TriplesMap> {
        self.resolve(self.source_to_maps.get(source))
    }

    /// Find TriplesMap(s) that produce subjects of a given class
    pub fn find_maps_for_class(&self, class_iri: &str) -> Vec<&TriplesMap> {
        self.resolve(self.class_to_maps.get(class_iri))
    }

    /// Find TriplesMap(s) that can produce triples with a given predicate
    pub fn find_maps_for_predicate(&self, predicate_iri: &str) -> Vec<&TriplesMap> {
        self.predicate_to_maps
            .get(predicate_iri)
            .map(|entries| {
                // A TriplesMap may have several POMs with the same predicate
                let mut seen = HashSet::new();
                entries
                    .iter()
                    .filter(|(id, _)| seen.insert(*id))
                    .filter_map(|(id, _)| self.get(*id))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Get TriplesMap(s) that have RefObjectMaps pointing to a given parent
    pub fn find_maps_referencing(&self, parent_iri: &str) -> Vec<&TriplesMap> {
        self.triples_maps
            .iter()
            .filter(|tm| {
                tm.ref_object_maps()
                    .any(|rom| rom.parent_triples_map == parent_iri)
            })
            .collect()
    }

    /// Get all unique source locators referenced by the mapping
    pub fn source_names(&self) -> Vec<&str> {
        self.source_to_maps.keys().map(|s| s.as_str()).collect()
    }

    /// Get all unique class IRIs produced by the mapping
    pub fn class_iris(&self) -> Vec<&str> {
        self.class_to_maps.keys().map(|s| s.as_str()).collect()
    }

    /// Get all unique constant predicate IRIs produced by the mapping
    pub fn predicate_iris(&self) -> Vec<&str> {
        self.predicate_to_maps.keys().map(|s| s.as_str()).collect()
    }
}

impl From<Vec<TriplesMap>> for CompiledRmlMapping {
    fn from(maps: Vec<TriplesMap>) -> Self {
        Self::new(maps)
    }
}

impl From<CompiledRmlMapping> for Vec<TriplesMap> {
    fn from(mapping: CompiledRmlMapping) -> Self {
        mapping.triples_maps
    }
}
