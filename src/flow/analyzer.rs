use crate::cancel::{CancellationToken, Cancelled};
use crate::flow::info::FlowInfo;
use crate::graph::{CallGraph, UnitId};
use dashmap::DashMap;
use im::HashSet;
use rayon::prelude::*;
use std::hash::Hash;
use std::sync::Arc;

/// Domain hooks turning the generic engine into a concrete analysis.
///
/// A domain supplies the local contribution of one unit in isolation and
/// may override the merge policy applied when callee flow folds into a
/// caller. Everything else (caching, cycle handling, traversal order) is
/// the engine's.
pub trait FlowDomain: Send + Sync {
    type Item: Clone + Eq + Hash + Send + Sync;

    /// Flow items attributable to the unit's own body, ignoring callees.
    fn local_flow(&self, unit: &UnitId) -> HashSet<Self::Item>;

    /// Merge policy. `flows[0]` is the unit's local contribution; the
    /// rest are its direct callees' outgoing flows. The default is set
    /// union with deduplication. The unit key is provided so a domain
    /// can filter callee flow at the caller (e.g. drop exception types
    /// a catch clause intercepts).
    fn combine(&self, unit: &UnitId, flows: Vec<HashSet<Self::Item>>) -> HashSet<Self::Item> {
        let _ = unit;
        union_all(flows)
    }

    /// Derived "unresolved flow escapes this unit" test. Defaults to
    /// outgoing non-emptiness.
    fn has_unhandled(&self, outgoing: &HashSet<Self::Item>) -> bool {
        !outgoing.is_empty()
    }
}

/// Multiset union reduced to a set. Iteration order of the result is not
/// significant.
pub fn union_all<T: Clone + Eq + Hash>(flows: Vec<HashSet<T>>) -> HashSet<T> {
    flows.into_iter().fold(HashSet::new(), HashSet::union)
}

/// Result of a whole-program pass. On cancellation `results` holds only
/// the units completed before the token was observed.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome<T: Clone + Eq + Hash> {
    pub results: Vec<FlowInfo<T>>,
    pub cancelled: bool,
}

/// Traversal frame for the explicit analysis stack.
struct Frame<T: Clone + Eq + Hash> {
    unit: UnitId,
    callees: Vec<UnitId>,
    next: usize,
    collected: Vec<HashSet<T>>,
}

impl<T: Clone + Eq + Hash> Frame<T> {
    fn new(unit: UnitId, callees: Vec<UnitId>) -> Self {
        Self {
            unit,
            callees,
            next: 0,
            collected: Vec::new(),
        }
    }
}

/// Generic cached, cycle-safe flow analysis over a call graph.
///
/// One analyzer instance owns one memo cache, scoped to one analysis
/// session over one immutable graph snapshot. Hosts that re-analyze
/// after an edit build a new graph and either a new analyzer or call
/// [`FlowAnalyzer::clear_cache`]. Several analyzer instances (one per
/// diagnostic domain) may share a single graph through the `Arc`.
///
/// The cache supports concurrent `analyze` calls from multiple threads.
/// Two threads racing on the same uncached unit may both compute it;
/// results are deterministic, so whichever insert lands last is
/// equivalent, and the duplicate work is accepted rather than locked
/// out.
pub struct FlowAnalyzer<D: FlowDomain> {
    graph: Arc<CallGraph>,
    domain: D,
    cache: DashMap<UnitId, FlowInfo<D::Item>>,
}

impl<D: FlowDomain> FlowAnalyzer<D> {
    pub fn new(graph: Arc<CallGraph>, domain: D) -> Self {
        Self {
            graph,
            domain,
            cache: DashMap::new(),
        }
    }

    pub fn graph(&self) -> &CallGraph {
        &self.graph
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    /// Compute (or fetch from cache) the flow info for `unit`.
    ///
    /// Memoization contract: with an unmodified graph, repeated calls
    /// return equal results and the domain's `local_flow` hook runs at
    /// most once per unit (per thread of computation).
    ///
    /// Traversal is an explicit post-order worklist, so deep call chains
    /// cannot overflow the native stack. Cycles are cut by an on-stack
    /// visiting set: re-entering an in-progress unit contributes the
    /// empty set for this pass, and each participant is cached once its
    /// own frame completes, the entry point last. Cycle members
    /// therefore carry an approximation computed from the information
    /// available at first re-entry.
    ///
    /// A callee key absent from the graph is a normal condition: it has
    /// no callees and contributes only its local flow.
    pub fn analyze(
        &self,
        unit: &UnitId,
        cancel: &CancellationToken,
    ) -> Result<FlowInfo<D::Item>, Cancelled> {
        if let Some(cached) = self.cache.get(unit) {
            return Ok(cached.clone());
        }
        cancel.check()?;

        let mut visiting: std::collections::HashSet<UnitId> = std::collections::HashSet::new();
        let mut stack: Vec<Frame<D::Item>> = Vec::new();
        visiting.insert(unit.clone());
        stack.push(Frame::new(unit.clone(), self.graph.get_callees(unit)));

        while let Some(frame) = stack.last_mut() {
            if frame.next < frame.callees.len() {
                let callee = frame.callees[frame.next].clone();
                frame.next += 1;

                if let Some(cached) = self.cache.get(&callee) {
                    frame.collected.push(cached.outgoing().clone());
                    continue;
                }
                if visiting.contains(&callee) {
                    // Cycle re-entry: the in-progress callee contributes
                    // nothing on this pass.
                    continue;
                }

                cancel.check()?;
                visiting.insert(callee.clone());
                let callees = self.graph.get_callees(&callee);
                stack.push(Frame::new(callee, callees));
            } else {
                let done = match stack.pop() {
                    Some(frame) => frame,
                    None => break,
                };

                let local = self.domain.local_flow(&done.unit);
                let mut flows = Vec::with_capacity(done.collected.len() + 1);
                flows.push(local);
                flows.extend(done.collected);

                let outgoing = self.domain.combine(&done.unit, flows);
                let has_unhandled = self.domain.has_unhandled(&outgoing);
                let info = FlowInfo::new(
                    done.unit.clone(),
                    HashSet::new(),
                    outgoing.clone(),
                    has_unhandled,
                );
                self.cache.insert(done.unit.clone(), info.clone());
                visiting.remove(&done.unit);

                match stack.last_mut() {
                    Some(parent) => parent.collected.push(outgoing),
                    // The entry frame is always the last to complete.
                    None => return Ok(info),
                }
            }
        }

        unreachable!("analysis stack drained without completing the entry frame")
    }

    /// Analyze every unit in the graph. Unit order is made deterministic
    /// before the parallel fan-out; results are order-independent given
    /// the memoized, cycle-safe design.
    ///
    /// On cancellation the outcome holds only the units that completed;
    /// their cached entries remain valid, so a subsequent un-cancelled
    /// call finishes the remainder without recomputing them.
    pub fn analyze_all(&self, cancel: &CancellationToken) -> AnalysisOutcome<D::Item> {
        let mut units = self.graph.find_all_units();
        units.sort();
        log::debug!("analyzing {} units", units.len());

        let results: Vec<FlowInfo<D::Item>> = units
            .par_iter()
            .filter_map(|unit| self.analyze(unit, cancel).ok())
            .collect();

        AnalysisOutcome {
            results,
            cancelled: cancel.is_cancelled(),
        }
    }

    /// Drop all memoized results. Call when the underlying program or
    /// graph snapshot changes.
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    pub fn is_cached(&self, unit: &UnitId) -> bool {
        self.cache.contains_key(unit)
    }

    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }
}
