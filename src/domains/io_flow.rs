//! I/O effect propagation: which categories of I/O a unit can perform,
//! directly or through its callees.
//!
//! Local facts are matched from callee paths and output macros against
//! fixed pattern tables; propagation uses the engine's default union
//! combine.

use crate::analyzers::RustProgram;
use crate::flow::FlowDomain;
use crate::graph::{ProgramSource, UnitId};
use im::HashSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Coarse classification of an I/O operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IoCategory {
    File,
    Network,
    Console,
    Environment,
}

const FILE_PATTERNS: &[&str] = &[
    "std::fs",
    "fs::read",
    "fs::write",
    "File::open",
    "File::create",
    "read_to_string",
    "write_all",
];

const NETWORK_PATTERNS: &[&str] = &[
    "std::net",
    "TcpStream::connect",
    "TcpListener::bind",
    "UdpSocket::bind",
];

const ENV_PATTERNS: &[&str] = &["std::env", "env::var", "env::set_var"];

const CONSOLE_MACROS: &[&str] = &["println", "print", "eprintln", "eprint"];

/// Flow domain tracking I/O effects across the call graph.
pub struct IoFlowDomain {
    local: HashMap<UnitId, HashSet<IoCategory>>,
}

impl IoFlowDomain {
    /// Scan the program snapshot once for per-unit I/O facts.
    pub fn from_program(program: &RustProgram) -> Self {
        let mut local: HashMap<UnitId, HashSet<IoCategory>> = HashMap::new();

        for decl in program.units() {
            let mut categories = HashSet::new();

            for call in program.call_sites(&decl.id) {
                if let Some(category) = classify_callee(&call.callee_hint) {
                    categories.insert(category);
                }
            }
            for name in program.macro_names(&decl.id) {
                if CONSOLE_MACROS.contains(&name.as_str()) {
                    categories.insert(IoCategory::Console);
                }
            }

            if !categories.is_empty() {
                local.insert(decl.id.clone(), categories);
            }
        }

        Self { local }
    }
}

fn classify_callee(hint: &str) -> Option<IoCategory> {
    let matches_any = |patterns: &[&str]| {
        patterns
            .iter()
            .any(|pattern| hint.starts_with(pattern) || hint == pattern.rsplit("::").next().unwrap_or(pattern))
    };

    if matches_any(FILE_PATTERNS) {
        Some(IoCategory::File)
    } else if matches_any(NETWORK_PATTERNS) {
        Some(IoCategory::Network)
    } else if matches_any(ENV_PATTERNS) {
        Some(IoCategory::Environment)
    } else {
        None
    }
}

impl FlowDomain for IoFlowDomain {
    type Item = IoCategory;

    fn local_flow(&self, unit: &UnitId) -> HashSet<IoCategory> {
        self.local.get(unit).cloned().unwrap_or_default()
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

    fn analyze_program(code: &str) -> (FlowAnalyzer<IoFlowDomain>, CallGraph) {
        let config = BuilderConfig::default();
        let program = RustProgram::from_source("test.rs", code, &config).unwrap();
        let resolver = program.resolver();
        let builder = CallGraphBuilder::new(&program, &resolver);
        let mut graph = CallGraph::new();
        builder
            .build(&mut graph, &CancellationToken::new())
            .unwrap();

        let domain = IoFlowDomain::from_program(&program);
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
    fn test_file_io_propagates_to_callers() {
        let (analyzer, graph) = analyze_program(
            r#"
fn main() {
    load_config();
}

fn load_config() -> String {
    std::fs::read_to_string("config.toml").unwrap_or_default()
}
"#,
        );

        let main = unit_named(&graph, "main");
        let info = analyzer.analyze(&main, &CancellationToken::new()).unwrap();
        assert!(info.outgoing().contains(&IoCategory::File));
    }

    #[test]
    fn test_console_macros_detected() {
        let (analyzer, graph) = analyze_program(
            r#"
fn report(count: usize) {
    println!("{count} findings");
}
"#,
        );

        let report = unit_named(&graph, "report");
        let info = analyzer
            .analyze(&report, &CancellationToken::new())
            .unwrap();
        assert!(info.outgoing().contains(&IoCategory::Console));
    }

    #[test]
    fn test_distinct_categories_accumulate() {
        let (analyzer, graph) = analyze_program(
            r#"
fn main() {
    fetch();
    persist();
}

fn fetch() {
    let _stream = std::net::TcpStream::connect("127.0.0.1:80");
}

fn persist() {
    let _ = std::fs::write("out.txt", "data");
}
"#,
        );

        let main = unit_named(&graph, "main");
        let info = analyzer.analyze(&main, &CancellationToken::new()).unwrap();
        assert!(info.outgoing().contains(&IoCategory::Network));
        assert!(info.outgoing().contains(&IoCategory::File));
    }

    #[test]
    fn test_pure_computation_has_no_effects() {
        let (analyzer, graph) = analyze_program(
            r#"
fn total(values: &[u32]) -> u32 {
    values.iter().sum()
}
"#,
        );

        let total = unit_named(&graph, "total");
        let info = analyzer.analyze(&total, &CancellationToken::new()).unwrap();
        assert!(info.outgoing().is_empty());
        assert!(!info.has_unhandled());
    }
}
