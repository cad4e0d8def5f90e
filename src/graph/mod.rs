//! Call graph structure and construction.

pub mod builder;
pub mod call_graph;

pub use builder::{
    BuildPhase, BuildProgress, BuildStats, CallExpr, CallGraphBuilder, CallResolver,
    ProgramSource, Resolution, UnitDecl,
};
pub use call_graph::{CallGraph, CallKind, CallSite, UnitCall, UnitId, UnitKind, UnitNode};
