//! Compiled execution plan
//!
//! Every term map of the rule graph is compiled into a [`TermGenerator`]
//! up front. Compilation collects every construction error instead of
//! stopping at the first one.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::config::RmlConfig;
use crate::error::{RmlError, RmlResult};
use crate::function::FunctionRegistry;
use crate::join::{key_tuples, ChildEntry, JoinId, JoinResolver, JoinSpec, ParentJoinStore};
use crate::mapping::{
    CompiledRmlMapping, LogicalSource, ObjectMap, PredicateObjectMap, RefObjectMap, SubjectMap,
    TermMap, TermMapRole, TriplesMap, TriplesMapId,
};
use crate::materialize::{GeneratorContext, MappedQuad, MappedValue, RdfTerm, TermGenerator};
use crate::source::ExpressionEvaluator;
use crate::vocab::{rdf, RML};

/// A validated, ready-to-run mapping
#[derive(Debug)]
pub struct MappingPlan {
    maps: Vec<TriplesMapPlan>,
    joins: JoinResolver,
    emit_class_triples: bool,
}

impl MappingPlan {
    /// Compile and validate a rule graph
    ///
    /// Returns [`RmlError::Validation`] with every construction error
    /// found.
    pub fn compile(
        mapping: &CompiledRmlMapping,
        functions: &FunctionRegistry,
        config: &RmlConfig,
    ) -> RmlResult<Self> {
        let mut errors = Vec::new();
        if let Err(e) = config.validate() {
            errors.push(e);
        }
        for iri in mapping.duplicate_iris() {
            errors.push(RmlError::InvalidValue {
                property: "rml:TriplesMap".to_string(),
                message: format!("{iri} is defined more than once"),
            });
        }

        let mut ctx = GeneratorContext::new(mapping, functions, config.base_iri.as_deref());
        let mut joins = JoinResolver::new();
        let mut maps = Vec::new();

        for (id, triples_map) in mapping.iter() {
            let Some(subject_map) = &triples_map.subject_map else {
                // Function maps are compiled where they are referenced
                continue;
            };
            let mut compiler = MapCompiler {
                id,
                triples_map,
                ctx: &mut ctx,
                joins: &mut joins,
                errors: &mut errors,
            };
            if let Some(plan) = compiler.compile(subject_map) {
                maps.push(plan);
            }
        }

        if !errors.is_empty() {
            return Err(RmlError::Validation(errors));
        }

        for plan in &mut maps {
            plan.parent_keys = joins.parent_stores(plan.id);
        }

        tracing::debug!(
            triples_maps = maps.len(),
            joins = joins.len(),
            "compiled RML mapping plan"
        );

        Ok(Self {
            maps,
            joins,
            emit_class_triples: config.emit_class_triples,
        })
    }

    pub(crate) fn maps(&self) -> &[TriplesMapPlan] {
        &self.maps
    }

    pub(crate) fn joins(&self) -> &JoinResolver {
        &self.joins
    }

    pub(crate) fn emit_class_triples(&self) -> bool {
        self.emit_class_triples
    }

    /// Number of TriplesMaps driven by this plan
    pub fn triples_map_count(&self) -> usize {
        self.maps.len()
    }

    /// Number of joins resolved through parent stores
    pub fn join_count(&self) -> usize {
        self.joins.len()
    }
}

struct MapCompiler<'c, 'a> {
    id: TriplesMapId,
    triples_map: &'a TriplesMap,
    ctx: &'c mut GeneratorContext<'a>,
    joins: &'c mut JoinResolver,
    errors: &'c mut Vec<RmlError>,
}

impl<'c, 'a> MapCompiler<'c, 'a> {
    fn generator(
        &mut self,
        label: String,
        term_map: &TermMap,
        role: TermMapRole,
    ) -> Option<TermGenerator> {
        match TermGenerator::construct(label, term_map, role, self.ctx) {
            Ok(generator) => Some(generator),
            Err(e) => {
                self.errors.push(e);
                None
            }
        }
    }

    fn generators(
        &mut self,
        label: &str,
        term_maps: &[TermMap],
        role: TermMapRole,
    ) -> Vec<TermGenerator> {
        term_maps
            .iter()
            .enumerate()
            .filter_map(|(i, tm)| self.generator(format!("{label} {i}"), tm, role))
            .collect()
    }

    fn compile(&mut self, subject_map: &SubjectMap) -> Option<TriplesMapPlan> {
        let iri = self.triples_map.iri.clone();
        let subject = self.generator(
            format!("{iri} subject map"),
            &subject_map.term_map,
            TermMapRole::Subject,
        );
        let subject_graphs = self.generators(
            &format!("{iri} subject graph map"),
            &subject_map.graph_maps,
            TermMapRole::Graph,
        );
        let classes = subject_map
            .classes
            .iter()
            .map(|class| MappedValue::untargeted(RdfTerm::iri(class.clone())))
            .collect();

        let triples_map = self.triples_map;
        let poms = triples_map
            .predicate_object_maps
            .iter()
            .enumerate()
            .map(|(idx, pom)| self.compile_pom(idx, pom))
            .collect::<Vec<_>>();

        Some(TriplesMapPlan {
            id: self.id,
            iri,
            logical_source: self.triples_map.logical_source.clone(),
            subject: subject?,
            subject_graphs,
            classes,
            poms: poms.into_iter().collect::<Option<Vec<_>>>()?,
            parent_keys: Vec::new(),
        })
    }

    fn compile_pom(&mut self, idx: usize, pom: &PredicateObjectMap) -> Option<PomPlan> {
        let label = format!("{} predicate-object map {idx}", self.triples_map.iri);
        let predicates = self.generators(
            &format!("{label} predicate"),
            &pom.predicate_maps,
            TermMapRole::Predicate,
        );
        let graphs = self.generators(&format!("{label} graph"), &pom.graph_maps, TermMapRole::Graph);

        let mut objects = Vec::new();
        let mut failed = false;
        for (i, object_map) in pom.object_maps.iter().enumerate() {
            let object_label = format!("{label} object {i}");
            let plan = match object_map {
                ObjectMap::Term(term_map) => self
                    .generator(object_label, term_map, TermMapRole::Object)
                    .map(ObjectPlan::Term),
                ObjectMap::RefObjectMap(rom) => self.compile_ref(object_label, rom),
            };
            match plan {
                Some(plan) => objects.push(plan),
                None => failed = true,
            }
        }

        if failed || predicates.len() != pom.predicate_maps.len() {
            return None;
        }
        Some(PomPlan {
            predicates,
            objects,
            graphs,
        })
    }

    fn compile_ref(&mut self, label: String, rom: &RefObjectMap) -> Option<ObjectPlan> {
        let mapping = self.ctx.mapping;
        let Some(parent_id) = mapping.id_of(&rom.parent_triples_map) else {
            self.errors
                .push(RmlError::UnknownTriplesMap(rom.parent_triples_map.clone()));
            return None;
        };
        let parent = mapping.get(parent_id)?;
        let Some(parent_subject) = &parent.subject_map else {
            self.errors.push(RmlError::InvalidValue {
                property: "rml:parentTriplesMap".to_string(),
                message: format!("{label}: parent {} has no subject map", parent.iri),
            });
            return None;
        };
        let targets = Arc::new(rom.targets.clone());

        if !rom.has_conditions() && parent.logical_source == self.triples_map.logical_source {
            let subject = self.generator(
                format!("{label} parent subject"),
                &parent_subject.term_map,
                TermMapRole::Subject,
            )?;
            return Some(ObjectPlan::SameRecord { subject, targets });
        }

        let parent_expressions: Vec<String> = rom
            .parent_expressions()
            .into_iter()
            .map(str::to_string)
            .collect();
        let child_expressions: Vec<String> = rom
            .child_expressions()
            .into_iter()
            .map(str::to_string)
            .collect();
        let store = self.joins.store_for(parent_id, parent_expressions);
        let id = self.joins.register(JoinSpec {
            parent: parent_id,
            parent_iri: parent.iri.clone(),
            child: self.id,
            child_iri: self.triples_map.iri.clone(),
            store,
            targets,
        });
        Some(ObjectPlan::Join {
            id,
            child_expressions,
        })
    }
}

/// Compiled TriplesMap
#[derive(Debug)]
pub(crate) struct TriplesMapPlan {
    pub id: TriplesMapId,
    pub iri: String,
    pub logical_source: LogicalSource,
    subject: TermGenerator,
    subject_graphs: Vec<TermGenerator>,
    classes: Vec<MappedValue>,
    poms: Vec<PomPlan>,
    /// Stores this map populates as a join parent
    parent_keys: Vec<(Vec<String>, Arc<ParentJoinStore>)>,
}

#[derive(Debug)]
struct PomPlan {
    predicates: Vec<TermGenerator>,
    objects: Vec<ObjectPlan>,
    graphs: Vec<TermGenerator>,
}

#[derive(Debug)]
enum ObjectPlan {
    Term(TermGenerator),
    /// Parent shares the logical source and has no join conditions
    SameRecord {
        subject: TermGenerator,
        targets: Arc<BTreeSet<String>>,
    },
    Join {
        id: JoinId,
        child_expressions: Vec<String>,
    },
}

impl TriplesMapPlan {
    /// Map one record
    ///
    /// Returns the quads that are complete now. Join contributions are
    /// buffered in `joins` and surface when the join resolves.
    pub fn process(
        &self,
        record: &dyn ExpressionEvaluator,
        joins: &JoinResolver,
        emit_class_triples: bool,
    ) -> RmlResult<Vec<MappedQuad>> {
        let subjects = self.subject.apply(record)?;
        if subjects.is_empty() {
            return Ok(Vec::new());
        }

        for (expressions, store) in &self.parent_keys {
            for key in key_tuples(record, expressions)? {
                for subject in &subjects {
                    store.insert(key.clone(), subject.term.clone())?;
                }
            }
        }

        let subject_graphs = apply_all(&self.subject_graphs, record)?;
        let mut quads = Vec::new();

        if emit_class_triples && !self.classes.is_empty() {
            let rdf_type = MappedValue::untargeted(RdfTerm::iri(rdf::TYPE));
            let graphs = graph_slots(&subject_graphs);
            for subject in &subjects {
                for class in &self.classes {
                    push_quads(&mut quads, subject, &rdf_type, class, &graphs);
                }
            }
        }

        for pom in &self.poms {
            let predicates = apply_all(&pom.predicates, record)?;
            if predicates.is_empty() {
                continue;
            }
            let mut graph_values = subject_graphs.clone();
            graph_values.extend(apply_all(&pom.graphs, record)?);
            let graphs = graph_slots(&graph_values);

            for object in &pom.objects {
                let objects = match object {
                    ObjectPlan::Term(generator) => generator.apply(record)?,
                    ObjectPlan::SameRecord { subject, targets } => subject
                        .apply(record)?
                        .into_iter()
                        .map(|v| MappedValue::new(v.term, Arc::clone(targets)))
                        .collect(),
                    ObjectPlan::Join {
                        id,
                        child_expressions,
                    } => {
                        let keys = key_tuples(record, child_expressions)?;
                        if !keys.is_empty() {
                            joins.buffer(
                                *id,
                                ChildEntry {
                                    subjects: subjects.clone(),
                                    predicates: predicates.clone(),
                                    graphs: graphs.clone(),
                                    keys,
                                },
                            )?;
                        }
                        continue;
                    }
                };
                for subject in &subjects {
                    for predicate in &predicates {
                        for object in &objects {
                            push_quads(&mut quads, subject, predicate, object, &graphs);
                        }
                    }
                }
            }
        }

        Ok(quads)
    }
}

fn push_quads(
    quads: &mut Vec<MappedQuad>,
    subject: &MappedValue,
    predicate: &MappedValue,
    object: &MappedValue,
    graphs: &[Option<MappedValue>],
) {
    for graph in graphs {
        quads.push(MappedQuad {
            subject: subject.clone(),
            predicate: predicate.clone(),
            object: object.clone(),
            graph: graph.clone(),
        });
    }
}

fn apply_all(
    generators: &[TermGenerator],
    record: &dyn ExpressionEvaluator,
) -> RmlResult<Vec<MappedValue>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for generator in generators {
        for value in generator.apply(record)? {
            if seen.insert(value.term.clone()) {
                out.push(value);
            }
        }
    }
    Ok(out)
}

/// Graph positions for a set of graph terms; none means the default graph
fn graph_slots(graphs: &[MappedValue]) -> Vec<Option<MappedValue>> {
    let mut slots: Vec<Option<MappedValue>> = Vec::new();
    for graph in graphs {
        let slot = match graph.term.as_iri() {
            Some(iri) if RML::is_default_graph(iri) => None,
            _ => Some(graph.clone()),
        };
        if !slots.contains(&slot) {
            slots.push(slot);
        }
    }
    if slots.is_empty() {
        slots.push(None);
    }
    slots
}
