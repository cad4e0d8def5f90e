//! flowmap: call-graph construction and interprocedural flow analysis.
//!
//! The engine builds a directed [`CallGraph`] of callable units from an
//! externally supplied resolution capability, then runs cached,
//! cycle-safe flow analyses over it. A [`FlowDomain`] turns the generic
//! [`FlowAnalyzer`] into a concrete diagnostic signal by supplying a
//! per-unit local contribution and, optionally, a merge policy.

pub mod analyzers;
pub mod cancel;
pub mod config;
pub mod domains;
pub mod errors;
pub mod flow;
pub mod graph;

// Re-export commonly used types
pub use crate::cancel::{CancellationToken, Cancelled};
pub use crate::config::{BuilderConfig, ClosureAttribution};
pub use crate::errors::EngineError;
pub use crate::flow::{AnalysisOutcome, FlowAnalyzer, FlowDomain, FlowInfo};
pub use crate::graph::{
    BuildStats, CallExpr, CallGraph, CallGraphBuilder, CallKind, CallResolver, CallSite,
    ProgramSource, Resolution, UnitCall, UnitDecl, UnitId, UnitKind,
};

pub use crate::analyzers::{NameResolver, RustProgram};
pub use crate::domains::{IoFlowDomain, PanicFlowDomain};
