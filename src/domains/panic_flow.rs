//! Panic propagation: which panic origins can escape each unit.
//!
//! Local facts come from a unit's own body (panic-family macros and
//! `unwrap`/`expect` calls); the engine propagates them through the call
//! graph. Units that use `std::panic::catch_unwind` act as a boundary
//! and drop their callees' contributions.

use crate::analyzers::RustProgram;
use crate::flow::{union_all, FlowDomain};
use crate::graph::{ProgramSource, UnitId};
use im::HashSet;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet as StdHashSet};

/// Ways a unit's body can initiate a panic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PanicOrigin {
    ExplicitPanic,
    Assertion,
    Unreachable,
    Todo,
    Unwrap,
    Expect,
}

/// Flow domain tracking panic origins across the call graph.
pub struct PanicFlowDomain {
    local: HashMap<UnitId, HashSet<PanicOrigin>>,
    catching: StdHashSet<UnitId>,
}

impl PanicFlowDomain {
    /// Scan the program snapshot once for per-unit panic facts.
    pub fn from_program(program: &RustProgram) -> Self {
        let mut local: HashMap<UnitId, HashSet<PanicOrigin>> = HashMap::new();
        let mut catching = StdHashSet::new();

        for decl in program.units() {
            let mut origins = HashSet::new();

            for name in program.macro_names(&decl.id) {
                if let Some(origin) = macro_origin(name) {
                    origins.insert(origin);
                }
            }

            for call in program.call_sites(&decl.id) {
                match call.callee_hint.as_str() {
                    "unwrap" => {
                        origins.insert(PanicOrigin::Unwrap);
                    }
                    "expect" => {
                        origins.insert(PanicOrigin::Expect);
                    }
                    hint if hint.ends_with("catch_unwind") => {
                        catching.insert(decl.id.clone());
                    }
                    _ => {}
                }
            }

            if !origins.is_empty() {
                local.insert(decl.id.clone(), origins);
            }
        }

        Self { local, catching }
    }

    /// Whether the unit's body erects a `catch_unwind` boundary.
    pub fn is_catching(&self, unit: &UnitId) -> bool {
        self.catching.contains(unit)
    }
}

fn macro_origin(name: &str) -> Option<PanicOrigin> {
    match name {
        "panic" => Some(PanicOrigin::ExplicitPanic),
        "assert" | "assert_eq" | "assert_ne" | "debug_assert" | "debug_assert_eq"
        | "debug_assert_ne" => Some(PanicOrigin::Assertion),
        "unreachable" => Some(PanicOrigin::Unreachable),
        "todo" | "unimplemented" => Some(PanicOrigin::Todo),
        _ => None,
    }
}

impl FlowDomain for PanicFlowDomain {
    type Item = PanicOrigin;

    fn local_flow(&self, unit: &UnitId) -> HashSet<PanicOrigin> {
        self.local.get(unit).cloned().unwrap_or_default()
    }

    fn combine(&self, unit: &UnitId, mut flows: Vec<HashSet<PanicOrigin>>) -> HashSet<PanicOrigin> {
        if self.catching.contains(unit) {
            // Callee panics stop at the catch_unwind boundary; only the
            // unit's own origins escape.
            flows.truncate(1);
        }
        union_all(flows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::config::BuilderConfig;
    use crate::flow::FlowAnalyzer;
    use crate::graph::{CallGraph, CallGraphBuilder};
    use std::sync::Arc;

    fn analyze_program(code: &str) -> (FlowAnalyzer<PanicFlowDomain>, CallGraph) {
        let config = BuilderConfig::default();
        let program = RustProgram::from_source("test.rs", code, &config).unwrap();
        let resolver = program.resolver();
        let builder = CallGraphBuilder::new(&program, &resolver);
        let mut graph = CallGraph::new();
        builder
            .build(&mut graph, &CancellationToken::new())
            .unwrap();

        let domain = PanicFlowDomain::from_program(&program);
        let analyzer = FlowAnalyzer::new(Arc::new(graph.clone()), domain);
        (analyzer, graph)
    }

    fn unit_named(graph: &CallGraph, name: &str) -> UnitId {
        graph
            .find_all_units()
            .into_iter()
            .find(|id| id.name == name)
            .unwrap_or_else(|| panic!("unit {name} not in graph"))
    }

    #[test]
    fn test_panic_propagates_up_call_chain() {
        let (analyzer, graph) = analyze_program(
            r#"
fn main() {
    helper();
}

fn helper() {
    risky();
}

fn risky() {
    panic!("boom");
}
"#,
        );
        let cancel = CancellationToken::new();

        let main = unit_named(&graph, "main");
        let info = analyzer.analyze(&main, &cancel).unwrap();
        assert!(info.outgoing().contains(&PanicOrigin::ExplicitPanic));
        assert!(info.has_unhandled());
    }

    #[test]
    fn test_unwrap_and_expect_are_local_origins() {
        let (analyzer, graph) = analyze_program(
            r#"
fn fragile(input: Option<u32>) -> u32 {
    let first = input.unwrap();
    let second = input.expect("missing");
    first + second
}
"#,
        );

        let fragile = unit_named(&graph, "fragile");
        let info = analyzer
            .analyze(&fragile, &CancellationToken::new())
            .unwrap();
        assert!(info.outgoing().contains(&PanicOrigin::Unwrap));
        assert!(info.outgoing().contains(&PanicOrigin::Expect));
    }

    #[test]
    fn test_catch_unwind_stops_callee_flow() {
        let (analyzer, graph) = analyze_program(
            r#"
fn main() {
    shielded();
}

fn shielded() {
    let _ = std::panic::catch_unwind(|| risky());
}

fn risky() {
    panic!("boom");
}
"#,
        );
        let cancel = CancellationToken::new();

        let risky = unit_named(&graph, "risky");
        assert!(analyzer
            .analyze(&risky, &cancel)
            .unwrap()
            .outgoing()
            .contains(&PanicOrigin::ExplicitPanic));

        let shielded = unit_named(&graph, "shielded");
        assert!(analyzer.domain().is_catching(&shielded));
        assert!(analyzer.analyze(&shielded, &cancel).unwrap().outgoing().is_empty());

        let main = unit_named(&graph, "main");
        let info = analyzer.analyze(&main, &cancel).unwrap();
        assert!(info.outgoing().is_empty());
        assert!(!info.has_unhandled());
    }

    #[test]
    fn test_clean_function_has_no_flow() {
        let (analyzer, graph) = analyze_program(
            r#"
fn add(a: u32, b: u32) -> u32 {
    a + b
}
"#,
        );

        let add = unit_named(&graph, "add");
        let info = analyzer.analyze(&add, &CancellationToken::new()).unwrap();
        assert!(info.outgoing().is_empty());
        assert!(!info.has_unhandled());
    }
}
