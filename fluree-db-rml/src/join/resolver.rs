//! Join resolution for referencing object maps
//!
//! Each referencing object map moves through
//! `Pending → AwaitingParentCompletion → Resolved`. Child records buffer
//! their join keys while the parent streams; resolution happens once, after
//! both the parent and the child TriplesMap streams are exhausted.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::store::{JoinKey, ParentJoinStore};
use crate::error::{RmlError, RmlResult};
use crate::mapping::TriplesMapId;
use crate::materialize::{MappedQuad, MappedValue};

/// Identifier of a registered join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JoinId(pub usize);

/// Lifecycle of a referencing object map within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinPhase {
    /// Registered, no child record observed yet
    Pending,
    /// Child keys are being buffered; the parent may still add keys
    AwaitingParentCompletion,
    /// Lookups performed and results emitted
    Resolved,
}

/// Static description of one referencing object map
#[derive(Debug, Clone)]
pub struct JoinSpec {
    pub parent: TriplesMapId,
    pub parent_iri: String,
    pub child: TriplesMapId,
    pub child_iri: String,
    pub store: Arc<ParentJoinStore>,
    /// Targets of the generated object terms
    pub targets: Arc<BTreeSet<String>>,
}

/// Everything a child record contributes to a join
#[derive(Debug, Clone)]
pub struct ChildEntry {
    pub subjects: Vec<MappedValue>,
    pub predicates: Vec<MappedValue>,
    pub graphs: Vec<Option<MappedValue>>,
    pub keys: Vec<JoinKey>,
}

#[derive(Debug)]
struct JoinState {
    spec: JoinSpec,
    phase: Mutex<JoinPhase>,
    buffered: Mutex<Vec<ChildEntry>>,
    claimed: AtomicBool,
}

/// Coordinates parent stores and child buffers for all joins of a run
#[derive(Debug, Default)]
pub struct JoinResolver {
    joins: Vec<JoinState>,
    stores: HashMap<(TriplesMapId, Vec<String>), Arc<ParentJoinStore>>,
    completed: Mutex<HashSet<TriplesMapId>>,
}

impl JoinResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store for a parent map keyed by an ordered list of parent expressions
    ///
    /// Joins with the same parent and the same parent expressions share a
    /// store.
    pub fn store_for(
        &mut self,
        parent: TriplesMapId,
        parent_expressions: Vec<String>,
    ) -> Arc<ParentJoinStore> {
        Arc::clone(
            self.stores
                .entry((parent, parent_expressions))
                .or_insert_with(|| Arc::new(ParentJoinStore::new())),
        )
    }

    /// Register a join; it starts `Pending`
    pub fn register(&mut self, spec: JoinSpec) -> JoinId {
        let id = JoinId(self.joins.len());
        self.joins.push(JoinState {
            spec,
            phase: Mutex::new(JoinPhase::Pending),
            buffered: Mutex::new(Vec::new()),
            claimed: AtomicBool::new(false),
        });
        id
    }

    /// Stores a parent map must populate, with their parent expressions
    pub fn parent_stores(&self, parent: TriplesMapId) -> Vec<(Vec<String>, Arc<ParentJoinStore>)> {
        let mut stores: Vec<_> = self
            .stores
            .iter()
            .filter(|((p, _), _)| *p == parent)
            .map(|((_, exprs), store)| (exprs.clone(), Arc::clone(store)))
            .collect();
        stores.sort_by(|a, b| a.0.cmp(&b.0));
        stores
    }

    pub fn spec(&self, id: JoinId) -> Option<&JoinSpec> {
        self.joins.get(id.0).map(|state| &state.spec)
    }

    pub fn phase(&self, id: JoinId) -> Option<JoinPhase> {
        self.joins.get(id.0).map(|state| *state.phase.lock())
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }

    fn state(&self, id: JoinId) -> RmlResult<&JoinState> {
        self.joins
            .get(id.0)
            .ok_or_else(|| RmlError::Join(format!("unknown join {}", id.0)))
    }

    /// Buffer a child record's contribution to a join
    pub fn buffer(&self, id: JoinId, entry: ChildEntry) -> RmlResult<()> {
        let state = self.state(id)?;
        let mut phase = state.phase.lock();
        match *phase {
            JoinPhase::Pending => *phase = JoinPhase::AwaitingParentCompletion,
            JoinPhase::AwaitingParentCompletion => {}
            JoinPhase::Resolved => {
                return Err(RmlError::Join(format!(
                    "child record for {} arrived after the join was resolved",
                    state.spec.child_iri
                )))
            }
        }
        state.buffered.lock().push(entry);
        Ok(())
    }

    /// Record that a TriplesMap's record stream is exhausted
    ///
    /// Seals the stores the map populates as a parent and returns the joins
    /// that became resolvable: both their parent and child streams are now
    /// complete. Each join is returned exactly once across all calls.
    pub fn mark_map_complete(&self, map: TriplesMapId) -> Vec<JoinId> {
        // Stores are sealed and joins promoted before `map` is visible as complete
        for ((parent, _), store) in &self.stores {
            if *parent == map {
                store.seal();
            }
        }
        for state in self.joins.iter().filter(|s| s.spec.child == map) {
            let mut phase = state.phase.lock();
            if *phase == JoinPhase::Pending {
                *phase = JoinPhase::AwaitingParentCompletion;
            }
        }

        let completed = {
            let mut completed = self.completed.lock();
            completed.insert(map);
            completed.clone()
        };

        let mut ready = Vec::new();
        for (idx, state) in self.joins.iter().enumerate() {
            let resolvable =
                completed.contains(&state.spec.parent) && completed.contains(&state.spec.child);
            if resolvable && !state.claimed.swap(true, Ordering::AcqRel) {
                ready.push(JoinId(idx));
            }
        }
        ready
    }

    /// Perform the lookups for a join and produce its quads
    ///
    /// Fails if the parent store is not sealed yet or the join is not
    /// awaiting resolution.
    pub fn resolve(&self, id: JoinId) -> RmlResult<Vec<MappedQuad>> {
        let state = self.state(id)?;
        let spec = &state.spec;
        let span = tracing::debug_span!(
            "rml_join_resolve",
            parent = %spec.parent_iri,
            child = %spec.child_iri,
        );
        let _guard = span.enter();

        let mut phase = state.phase.lock();
        if *phase != JoinPhase::AwaitingParentCompletion {
            return Err(RmlError::Join(format!(
                "join {} -> {} cannot be resolved from {:?}",
                spec.child_iri, spec.parent_iri, *phase
            )));
        }
        if !spec.store.is_sealed() {
            return Err(RmlError::Join(format!(
                "join {} -> {} resolved before parent stream completed",
                spec.child_iri, spec.parent_iri
            )));
        }

        let entries = std::mem::take(&mut *state.buffered.lock());
        let mut quads = Vec::new();
        let mut unmatched = 0usize;
        for entry in &entries {
            let mut parents = BTreeSet::new();
            for key in &entry.keys {
                parents.extend(spec.store.lookup(key));
            }
            if parents.is_empty() {
                unmatched += 1;
                continue;
            }
            for parent in parents {
                let object = MappedValue::new(parent, Arc::clone(&spec.targets));
                for subject in &entry.subjects {
                    for predicate in &entry.predicates {
                        for graph in &entry.graphs {
                            quads.push(MappedQuad {
                                subject: subject.clone(),
                                predicate: predicate.clone(),
                                object: object.clone(),
                                graph: graph.clone(),
                            });
                        }
                    }
                }
            }
        }
        *phase = JoinPhase::Resolved;

        tracing::debug!(
            child_records = entries.len(),
            unmatched,
            parent_keys = spec.store.len(),
            quads = quads.len(),
            "Resolved RefObjectMap join"
        );
        Ok(quads)
    }
}
