//! Generic cached, cycle-safe flow analysis over the call graph.

pub mod analyzer;
pub mod info;

pub use analyzer::{union_all, AnalysisOutcome, FlowAnalyzer, FlowDomain};
pub use info::FlowInfo;
