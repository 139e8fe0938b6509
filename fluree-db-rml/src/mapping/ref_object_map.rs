//! RML RefObjectMap structures
//!
//! RefObjectMaps define references between TriplesMap definitions,
//! enabling joins across logical sources.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Reference to another TriplesMap with join conditions
///
/// A RefObjectMap allows one TriplesMap to reference subjects generated
/// by another TriplesMap, creating relationships between entities from
/// different sources.
///
/// # Example RML
///
/// ```turtle
/// <#RouteMapping> a rml:TriplesMap ;
///     rml:predicateObjectMap [
///         rml:predicate ex:airline ;
///         rml:objectMap [
///             rml:parentTriplesMap <#AirlineMapping> ;
///             rml:joinCondition [
///                 rml:child "airline_id" ;
///                 rml:parent "id"
///             ]
///         ]
///     ] .
/// ```
///
/// For each route, this generates a triple with predicate ex:airline whose
/// object is every subject of AirlineMapping whose `id` equals the route's
/// `airline_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefObjectMap {
    /// IRI of the parent TriplesMap
    pub parent_triples_map: String,
    /// Join conditions; all must match jointly
    #[serde(default)]
    pub join_conditions: Vec<JoinCondition>,
    /// Logical targets for the generated object terms
    #[serde(default)]
    pub targets: BTreeSet<String>,
}

impl RefObjectMap {
    /// Create a new RefObjectMap with a single join condition
    pub fn new(
        parent_triples_map: impl Into<String>,
        child: impl Into<String>,
        parent: impl Into<String>,
    ) -> Self {
        Self::with_conditions(parent_triples_map, vec![JoinCondition::new(child, parent)])
    }

    /// Create a RefObjectMap with multiple join conditions (composite key)
    pub fn with_conditions(
        parent_triples_map: impl Into<String>,
        conditions: Vec<JoinCondition>,
    ) -> Self {
        Self {
            parent_triples_map: parent_triples_map.into(),
            join_conditions: conditions,
            targets: BTreeSet::new(),
        }
    }

    /// Create a RefObjectMap without join conditions
    pub fn unconditional(parent_triples_map: impl Into<String>) -> Self {
        Self::with_conditions(parent_triples_map, vec![])
    }

    /// Add a join condition
    pub fn add_condition(&mut self, child: impl Into<String>, parent: impl Into<String>) {
        self.join_conditions.push(JoinCondition::new(child, parent));
    }

    /// Add a logical target
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.targets.insert(target.into());
        self
    }

    /// Child expressions, in condition order
    pub fn child_expressions(&self) -> Vec<&str> {
        self.join_conditions
            .iter()
            .map(|jc| jc.child.as_str())
            .collect()
    }

    /// Parent expressions, in condition order
    pub fn parent_expressions(&self) -> Vec<&str> {
        self.join_conditions
            .iter()
            .map(|jc| jc.parent.as_str())
            .collect()
    }

    /// Check if this RefObjectMap has any join conditions
    pub fn has_conditions(&self) -> bool {
        !self.join_conditions.is_empty()
    }
}

/// A single join condition
///
/// The child expression, evaluated on a record of the current (child)
/// TriplesMap, must equal the parent expression evaluated on a record of
/// the parent TriplesMap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JoinCondition {
    /// Expression against the child TriplesMap's logical source
    pub child: String,
    /// Expression against the parent TriplesMap's logical source
    pub parent: String,
}

impl JoinCondition {
    /// Create a new join condition
    pub fn new(child: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            child: child.into(),
            parent: parent.into(),
        }
    }
}
