//! RML vocabulary constants
//!
//! IRIs from the RML core ontology (https://w3id.org/rml/core), the legacy
//! R2RML namespace, and the Function Ontology used by function-valued term
//! maps.
//!
//! # Usage
//!
//! ```
//! use fluree_db_rml::RML;
//!
//! let iri = "http://w3id.org/rml/IRI";
//! assert_eq!(iri, RML::IRI);
//! ```

/// RML vocabulary namespace and constants
pub struct RML;

impl RML {
    // ==========================================================================
    // Namespaces
    // ==========================================================================

    /// RML core namespace IRI
    pub const NS: &'static str = "http://w3id.org/rml/";

    /// Legacy R2RML namespace IRI (still accepted for term types)
    pub const R2RML_NS: &'static str = "http://www.w3.org/ns/r2rml#";

    // ==========================================================================
    // Term Type Values
    // ==========================================================================

    /// rml:IRI - Term type for IRIs
    pub const IRI: &'static str = "http://w3id.org/rml/IRI";

    /// rml:BlankNode - Term type for blank nodes
    pub const BLANK_NODE: &'static str = "http://w3id.org/rml/BlankNode";

    /// rml:Literal - Term type for literals
    pub const LITERAL: &'static str = "http://w3id.org/rml/Literal";

    /// rr:IRI
    pub const R2RML_IRI: &'static str = "http://www.w3.org/ns/r2rml#IRI";

    /// rr:BlankNode
    pub const R2RML_BLANK_NODE: &'static str = "http://www.w3.org/ns/r2rml#BlankNode";

    /// rr:Literal
    pub const R2RML_LITERAL: &'static str = "http://www.w3.org/ns/r2rml#Literal";

    // ==========================================================================
    // Graphs
    // ==========================================================================

    /// rml:defaultGraph - Graph map constant denoting the default graph
    pub const DEFAULT_GRAPH: &'static str = "http://w3id.org/rml/defaultGraph";

    /// rr:defaultGraph
    pub const R2RML_DEFAULT_GRAPH: &'static str = "http://www.w3.org/ns/r2rml#defaultGraph";

    // ==========================================================================
    // Functions
    // ==========================================================================

    /// rml:executes - Predicate naming the function a function map executes
    pub const EXECUTES: &'static str = "http://w3id.org/rml/executes";

    /// fno:executes - Function Ontology spelling of the executes predicate
    pub const FNO_EXECUTES: &'static str = "https://w3id.org/function/ontology#executes";

    /// Check whether a predicate IRI names the executed function
    pub fn is_executes(iri: &str) -> bool {
        iri == Self::EXECUTES || iri == Self::FNO_EXECUTES
    }

    /// Check whether a graph IRI denotes the default graph
    pub fn is_default_graph(iri: &str) -> bool {
        iri == Self::DEFAULT_GRAPH || iri == Self::R2RML_DEFAULT_GRAPH
    }
}

/// RDF vocabulary constants
pub mod rdf {
    /// rdf:type IRI
    pub const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
}

/// XSD datatype IRIs produced by the datatype mapper
pub mod xsd {
    pub const STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
}

/// GREL function and parameter IRIs for the built-in functions
pub mod grel {
    /// GREL namespace
    pub const NS: &str = "http://users.ugent.be/~bjdmeest/function/grel.ttl#";

    pub const TO_UPPER_CASE: &str = "http://users.ugent.be/~bjdmeest/function/grel.ttl#toUpperCase";
    pub const TO_LOWER_CASE: &str = "http://users.ugent.be/~bjdmeest/function/grel.ttl#toLowerCase";
    pub const STRING_TRIM: &str = "http://users.ugent.be/~bjdmeest/function/grel.ttl#string_trim";
    pub const ARRAY_JOIN: &str = "http://users.ugent.be/~bjdmeest/function/grel.ttl#array_join";

    /// Main string input parameter
    pub const VALUE_PARAMETER: &str =
        "http://users.ugent.be/~bjdmeest/function/grel.ttl#valueParameter";
    /// Array input parameter
    pub const P_ARRAY_A: &str = "http://users.ugent.be/~bjdmeest/function/grel.ttl#p_array_a";
    /// Separator parameter
    pub const P_STRING_SEP: &str = "http://users.ugent.be/~bjdmeest/function/grel.ttl#p_string_sep";
}
