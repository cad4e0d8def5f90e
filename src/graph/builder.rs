use crate::cancel::{CancellationToken, Cancelled};
use crate::config::BuilderConfig;
use crate::graph::call_graph::{CallGraph, CallKind, CallSite, UnitCall, UnitId, UnitKind};
use serde::{Deserialize, Serialize};

/// A callable unit as enumerated by a program source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitDecl {
    pub id: UnitId,
    pub kind: UnitKind,
    pub is_test: bool,
}

/// One call expression found in a unit's body, handed to the resolver.
/// The `callee_hint` is the callee as written at the call site; all
/// "what does this actually invoke" reasoning lives in the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallExpr {
    pub enclosing: UnitId,
    pub callee_hint: String,
    pub kind: CallKind,
    pub site: CallSite,
}

/// Resolver verdict for a single call expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(UnitId),
    /// Target unknowable statically (virtual dispatch, external library,
    /// dynamic call). Not an error; the edge is simply not added.
    Unresolved,
}

/// Enumerates a program's callable units and the call expressions inside
/// each unit's body.
pub trait ProgramSource {
    fn units(&self) -> Vec<UnitDecl>;
    fn call_sites(&self, unit: &UnitId) -> Vec<CallExpr>;
}

/// Resolves a call expression to its target unit. Must be deterministic
/// for a given program snapshot.
pub trait CallResolver {
    fn resolve(&self, call: &CallExpr) -> Resolution;
}

/// Build phases reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildPhase {
    RegisteringUnits,
    ResolvingCalls,
}

#[derive(Debug, Clone, Copy)]
pub struct BuildProgress {
    pub phase: BuildPhase,
    pub current: usize,
    pub total: usize,
}

/// Summary counters for one build pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStats {
    pub units: usize,
    pub edges_added: usize,
    /// Call sites whose target could not be resolved. A known
    /// imprecision: flow analysis treats the missing edges as "no
    /// information available", which may under-report.
    pub unresolved: usize,
}

/// Populates a [`CallGraph`] from a program source and a resolution
/// capability. The builder mutates the target graph in place; a
/// cancelled pass leaves the graph valid but incomplete.
pub struct CallGraphBuilder<'a, P, R> {
    program: &'a P,
    resolver: &'a R,
    config: BuilderConfig,
}

impl<'a, P: ProgramSource, R: CallResolver> CallGraphBuilder<'a, P, R> {
    pub fn new(program: &'a P, resolver: &'a R) -> Self {
        Self {
            program,
            resolver,
            config: BuilderConfig::default(),
        }
    }

    pub fn with_config(program: &'a P, resolver: &'a R, config: BuilderConfig) -> Self {
        Self {
            program,
            resolver,
            config,
        }
    }

    /// Whole-program build: every unit gets a node (even with zero
    /// edges, so it stays discoverable), then each unit's call sites are
    /// resolved into edges.
    pub fn build(
        &self,
        graph: &mut CallGraph,
        cancel: &CancellationToken,
    ) -> Result<BuildStats, Cancelled> {
        self.build_with_progress(graph, cancel, |_| {})
    }

    /// `build` with a per-phase progress callback, throttled to every
    /// tenth unit.
    pub fn build_with_progress<F>(
        &self,
        graph: &mut CallGraph,
        cancel: &CancellationToken,
        mut progress: F,
    ) -> Result<BuildStats, Cancelled>
    where
        F: FnMut(BuildProgress),
    {
        let units = self.enumerate_units();
        let total = units.len();
        log::info!("Registering {} callable units", total);

        progress(BuildProgress {
            phase: BuildPhase::RegisteringUnits,
            current: 0,
            total,
        });

        for (idx, decl) in units.iter().enumerate() {
            cancel.check()?;
            graph.add_unit(decl.id.clone(), decl.kind, decl.is_test);
            report_throttled(&mut progress, BuildPhase::RegisteringUnits, idx + 1, total);
        }

        let mut stats = BuildStats {
            units: total,
            ..BuildStats::default()
        };

        progress(BuildProgress {
            phase: BuildPhase::ResolvingCalls,
            current: 0,
            total,
        });

        for (idx, decl) in units.iter().enumerate() {
            cancel.check()?;
            let unit_stats = self.resolve_unit_calls(&decl.id, graph);
            stats.edges_added += unit_stats.edges_added;
            stats.unresolved += unit_stats.unresolved;
            report_throttled(&mut progress, BuildPhase::ResolvingCalls, idx + 1, total);
        }

        log::info!(
            "Call graph built: {} units, {} edges, {} unresolved sites",
            stats.units,
            stats.edges_added,
            stats.unresolved
        );
        Ok(stats)
    }

    /// Incremental build for a single unit: recompute only that unit's
    /// outgoing edges. Edges into and out of other units are untouched.
    pub fn build_for_unit(
        &self,
        unit: &UnitId,
        graph: &mut CallGraph,
        cancel: &CancellationToken,
    ) -> Result<BuildStats, Cancelled> {
        cancel.check()?;

        if let Some(decl) = self.enumerate_units().into_iter().find(|d| &d.id == unit) {
            graph.add_unit(decl.id, decl.kind, decl.is_test);
        } else {
            graph.add_node(unit.clone());
        }

        graph.remove_outgoing_edges(unit);
        let unit_stats = self.resolve_unit_calls(unit, graph);

        Ok(BuildStats {
            units: 1,
            ..unit_stats
        })
    }

    fn enumerate_units(&self) -> Vec<UnitDecl> {
        let mut units = self.program.units();
        if !self.config.include_tests {
            units.retain(|decl| !decl.is_test);
        }
        units
    }

    fn resolve_unit_calls(&self, unit: &UnitId, graph: &mut CallGraph) -> BuildStats {
        let mut stats = BuildStats::default();

        for call in self.program.call_sites(unit) {
            match self.resolver.resolve(&call) {
                Resolution::Resolved(target) => {
                    graph.add_call(UnitCall {
                        caller: unit.clone(),
                        callee: target,
                        kind: call.kind,
                        site: Some(call.site),
                    });
                    stats.edges_added += 1;
                }
                Resolution::Unresolved => {
                    log::debug!(
                        "unresolved call to `{}` at {}:{}",
                        call.callee_hint,
                        call.site.file.display(),
                        call.site.line
                    );
                    stats.unresolved += 1;
                }
            }
        }

        stats
    }
}

fn report_throttled<F: FnMut(BuildProgress)>(
    progress: &mut F,
    phase: BuildPhase,
    current: usize,
    total: usize,
) {
    if current % 10 == 0 || current == total {
        progress(BuildProgress {
            phase,
            current,
            total,
        });
    }
}
