//! RML TriplesMap structures

use serde::{Deserialize, Serialize};

use super::{RefObjectMap, TermMap};

/// Logical source of a TriplesMap
///
/// Opaque to this crate: it is handed to the logical source resolver,
/// which knows how to stream records for it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalSource {
    /// Source locator (file path, table name, URL, ...)
    pub source: String,
    /// `rml:referenceFormulation` IRI (JSONPath, XPath, CSV, SQL, ...)
    #[serde(default)]
    pub reference_formulation: Option<String>,
    /// `rml:iterator` expression selecting records inside the source
    #[serde(default)]
    pub iterator: Option<String>,
}

impl LogicalSource {
    /// Create a logical source with only a locator
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            reference_formulation: None,
            iterator: None,
        }
    }

    /// Set the iterator expression
    pub fn with_iterator(mut self, iterator: impl Into<String>) -> Self {
        self.iterator = Some(iterator.into());
        self
    }

    /// Set the reference formulation
    pub fn with_reference_formulation(mut self, formulation: impl Into<String>) -> Self {
        self.reference_formulation = Some(formulation.into());
        self
    }
}

/// Subject map
///
/// A term map in the subject role plus the classes and graphs that apply
/// to every triple produced for the subject.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubjectMap {
    /// Generation strategy for the subject term
    #[serde(flatten)]
    pub term_map: TermMap,
    /// `rml:class` - classes asserted with rdf:type
    #[serde(default)]
    pub classes: Vec<String>,
    /// `rml:graphMap` - graphs for every triple of this subject
    #[serde(default)]
    pub graph_maps: Vec<TermMap>,
}

impl SubjectMap {
    /// Create a subject map from a term map
    pub fn new(term_map: TermMap) -> Self {
        Self {
            term_map,
            classes: Vec::new(),
            graph_maps: Vec::new(),
        }
    }

    /// Create a template subject map
    pub fn template(template: impl Into<String>) -> Self {
        Self::new(TermMap::template(template))
    }

    /// Create a reference subject map
    pub fn reference(expression: impl Into<String>) -> Self {
        Self::new(TermMap::reference(expression))
    }

    /// Create a constant subject map
    pub fn constant(iri: impl Into<String>) -> Self {
        Self::new(TermMap::constant_iri(iri))
    }

    /// Add a class
    pub fn with_class(mut self, class: impl Into<String>) -> Self {
        self.classes.push(class.into());
        self
    }

    /// Add a graph map
    pub fn with_graph(mut self, graph_map: TermMap) -> Self {
        self.graph_maps.push(graph_map);
        self
    }
}

/// Object map
///
/// Either a plain term map or a reference to another TriplesMap (join).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectMap {
    /// Object generated from the current record
    Term(TermMap),
    /// `rml:parentTriplesMap` - object taken from a parent TriplesMap
    RefObjectMap(RefObjectMap),
}

impl ObjectMap {
    /// Check if this is a reference object map
    pub fn is_ref(&self) -> bool {
        matches!(self, ObjectMap::RefObjectMap(_))
    }

    /// Get the RefObjectMap if this is a reference
    pub fn as_ref_object_map(&self) -> Option<&RefObjectMap> {
        match self {
            ObjectMap::RefObjectMap(rom) => Some(rom),
            ObjectMap::Term(_) => None,
        }
    }
}

impl From<TermMap> for ObjectMap {
    fn from(term_map: TermMap) -> Self {
        ObjectMap::Term(term_map)
    }
}

impl From<RefObjectMap> for ObjectMap {
    fn from(rom: RefObjectMap) -> Self {
        ObjectMap::RefObjectMap(rom)
    }
}

/// Predicate-object map
///
/// Every predicate is combined with every object, in every graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateObjectMap {
    /// Predicate maps
    pub predicate_maps: Vec<TermMap>,
    /// Object maps
    pub object_maps: Vec<ObjectMap>,
    /// Graph maps, in addition to the subject map's graphs
    #[serde(default)]
    pub graph_maps: Vec<TermMap>,
}

impl PredicateObjectMap {
    /// Create a predicate-object map with one predicate and one object
    pub fn new(predicate_map: TermMap, object_map: impl Into<ObjectMap>) -> Self {
        Self {
            predicate_maps: vec![predicate_map],
            object_maps: vec![object_map.into()],
            graph_maps: Vec::new(),
        }
    }

    /// Create a predicate-object map with a constant predicate IRI
    pub fn constant(predicate: impl Into<String>, object_map: impl Into<ObjectMap>) -> Self {
        Self::new(TermMap::constant_iri(predicate), object_map)
    }

    /// Add a graph map
    pub fn with_graph(mut self, graph_map: TermMap) -> Self {
        self.graph_maps.push(graph_map);
        self
    }

    /// Constant predicate IRIs of this map
    pub fn constant_predicates(&self) -> impl Iterator<Item = &str> {
        self.predicate_maps.iter().filter_map(|pm| pm.as_constant_iri())
    }

    /// Reference object maps of this map
    pub fn ref_object_maps(&self) -> impl Iterator<Item = &RefObjectMap> {
        self.object_maps.iter().filter_map(|om| om.as_ref_object_map())
    }
}

/// A TriplesMap
///
/// A TriplesMap without a subject map is only usable as the nested map of
/// a function-valued term map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriplesMap {
    /// IRI identifying this TriplesMap
    pub iri: String,
    /// `rml:logicalSource`
    pub logical_source: LogicalSource,
    /// `rml:subjectMap`
    #[serde(default)]
    pub subject_map: Option<SubjectMap>,
    /// `rml:predicateObjectMap`
    #[serde(default)]
    pub predicate_object_maps: Vec<PredicateObjectMap>,
}

impl TriplesMap {
    /// Create a TriplesMap with no subject map and no predicate-object maps
    pub fn new(iri: impl Into<String>, logical_source: LogicalSource) -> Self {
        Self {
            iri: iri.into(),
            logical_source,
            subject_map: None,
            predicate_object_maps: Vec::new(),
        }
    }

    /// Set the subject map
    pub fn with_subject(mut self, subject_map: SubjectMap) -> Self {
        self.subject_map = Some(subject_map);
        self
    }

    /// Add a predicate-object map
    pub fn with_predicate_object(mut self, pom: PredicateObjectMap) -> Self {
        self.predicate_object_maps.push(pom);
        self
    }

    /// Classes produced by the subject map
    pub fn classes(&self) -> &[String] {
        self.subject_map
            .as_ref()
            .map(|sm| sm.classes.as_slice())
            .unwrap_or(&[])
    }

    /// Source locator of the logical source
    pub fn source_name(&self) -> &str {
        &self.logical_source.source
    }

    /// True if this map only exists to describe a function execution
    pub fn is_function_map(&self) -> bool {
        self.subject_map.is_none()
    }

    /// Reference object maps across all predicate-object maps
    pub fn ref_object_maps(&self) -> impl Iterator<Item = &RefObjectMap> {
        self.predicate_object_maps
            .iter()
            .flat_map(|pom| pom.ref_object_maps())
    }
}
