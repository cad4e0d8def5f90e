//! `RustProgram` adapts parsed Rust sources to the engine's program
//! enumeration interface; `NameResolver` supplies the matching call
//! resolution capability.

use crate::analyzers::rust_units::{extract_file, ExtractedFile};
use crate::config::BuilderConfig;
use crate::errors::EngineError;
use crate::graph::{CallExpr, CallResolver, ProgramSource, Resolution, UnitDecl, UnitId};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A parsed program snapshot: callable units, call sites and macro
/// facts, extracted once at construction.
#[derive(Debug, Default)]
pub struct RustProgram {
    units: Vec<UnitDecl>,
    sites: HashMap<UnitId, Vec<CallExpr>>,
    macros: HashMap<UnitId, Vec<String>>,
}

impl RustProgram {
    /// Parse a single source string.
    pub fn from_source(
        path: impl Into<PathBuf>,
        source: &str,
        config: &BuilderConfig,
    ) -> Result<Self, EngineError> {
        let path = path.into();
        let parsed = syn::parse_file(source)
            .map_err(|err| EngineError::parse(path.clone(), err.to_string()))?;

        let mut program = Self::default();
        program.absorb(extract_file(&parsed, &path, config));
        Ok(program)
    }

    /// Parse several source strings into one snapshot.
    pub fn from_sources(
        sources: &[(PathBuf, String)],
        config: &BuilderConfig,
    ) -> Result<Self, EngineError> {
        let mut program = Self::default();
        for (path, source) in sources {
            let parsed = syn::parse_file(source)
                .map_err(|err| EngineError::parse(path.clone(), err.to_string()))?;
            program.absorb(extract_file(&parsed, path, config));
        }
        Ok(program)
    }

    /// Walk `root` for `.rs` files and parse them all. Unreadable or
    /// unparsable files are skipped with a log entry, matching the
    /// best-effort posture of whole-project scans.
    pub fn load_dir(root: &Path, config: &BuilderConfig) -> Result<Self> {
        let mut program = Self::default();
        let mut parsed_files = 0usize;

        for entry in WalkDir::new(root)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        {
            let path = entry.path();
            let source = match std::fs::read_to_string(path) {
                Ok(source) => source,
                Err(err) => {
                    log::warn!("skipping unreadable {}: {}", path.display(), err);
                    continue;
                }
            };
            match syn::parse_file(&source) {
                Ok(parsed) => {
                    program.absorb(extract_file(&parsed, path, config));
                    parsed_files += 1;
                }
                Err(err) => {
                    log::warn!("skipping unparsable {}: {}", path.display(), err);
                }
            }
        }

        if parsed_files == 0 {
            anyhow::bail!("no parsable Rust files under {}", root.display());
        }
        log::info!(
            "parsed {} files, {} callable units",
            parsed_files,
            program.units.len()
        );
        Ok(program)
    }

    /// Read and parse an explicit file list. Unlike [`Self::load_dir`],
    /// failures here are errors: the caller asked for these files
    /// specifically.
    pub fn from_files(paths: &[PathBuf], config: &BuilderConfig) -> Result<Self> {
        let mut program = Self::default();
        for path in paths {
            let source = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let parsed = syn::parse_file(&source)
                .map_err(|err| EngineError::parse(path.clone(), err.to_string()))
                .with_context(|| format!("failed to parse {}", path.display()))?;
            program.absorb(extract_file(&parsed, path, config));
        }
        Ok(program)
    }

    fn absorb(&mut self, extracted: ExtractedFile) {
        self.units.extend(extracted.units);
        for (unit, sites) in extracted.sites {
            self.sites.entry(unit).or_default().extend(sites);
        }
        for (unit, macros) in extracted.macros {
            self.macros.entry(unit).or_default().extend(macros);
        }
    }

    /// Macro names invoked in a unit's body, for fact-deriving domains.
    pub fn macro_names(&self, unit: &UnitId) -> &[String] {
        self.macros.get(unit).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Build the companion resolver over this snapshot's units.
    pub fn resolver(&self) -> NameResolver {
        NameResolver::new(&self.units)
    }
}

impl ProgramSource for RustProgram {
    fn units(&self) -> Vec<UnitDecl> {
        self.units.clone()
    }

    fn call_sites(&self, unit: &UnitId) -> Vec<CallExpr> {
        self.sites.get(unit).cloned().unwrap_or_default()
    }
}

/// Name-based call resolution over a program snapshot.
///
/// Resolution order: exact name match, then last-segment (method-style)
/// match; within each, a unique same-file candidate wins over a unique
/// global candidate. Anything ambiguous or unknown stays unresolved;
/// the edge is omitted rather than guessed.
#[derive(Debug)]
pub struct NameResolver {
    by_name: HashMap<String, Vec<UnitId>>,
    by_suffix: HashMap<String, Vec<UnitId>>,
}

impl NameResolver {
    pub fn new(units: &[UnitDecl]) -> Self {
        let mut by_name: HashMap<String, Vec<UnitId>> = HashMap::new();
        let mut by_suffix: HashMap<String, Vec<UnitId>> = HashMap::new();

        for decl in units {
            by_name
                .entry(decl.id.name.clone())
                .or_default()
                .push(decl.id.clone());
            if let Some(suffix) = decl.id.name.rsplit("::").next() {
                if suffix != decl.id.name {
                    by_suffix
                        .entry(suffix.to_string())
                        .or_default()
                        .push(decl.id.clone());
                }
            }
        }

        Self { by_name, by_suffix }
    }

    fn pick(candidates: &[UnitId], call_file: &Path) -> Option<UnitId> {
        let same_file: Vec<&UnitId> = candidates
            .iter()
            .filter(|id| id.file.as_path() == call_file)
            .collect();
        match same_file.as_slice() {
            [only] => return Some((*only).clone()),
            [] => {}
            // Several same-file candidates: ambiguous.
            _ => return None,
        }
        match candidates {
            [only] => Some(only.clone()),
            _ => None,
        }
    }
}

impl CallResolver for NameResolver {
    fn resolve(&self, call: &CallExpr) -> Resolution {
        if let Some(candidates) = self.by_name.get(&call.callee_hint) {
            if let Some(target) = Self::pick(candidates, &call.site.file) {
                return Resolution::Resolved(target);
            }
        }

        if !call.callee_hint.contains("::") {
            if let Some(candidates) = self.by_suffix.get(&call.callee_hint) {
                if let Some(target) = Self::pick(candidates, &call.site.file) {
                    return Resolution::Resolved(target);
                }
            }
        }

        Resolution::Unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationToken;
    use crate::graph::{CallGraph, CallGraphBuilder};

    fn build_graph(code: &str) -> (RustProgram, CallGraph) {
        let config = BuilderConfig::default();
        let program = RustProgram::from_source("test.rs", code, &config).unwrap();
        let resolver = program.resolver();
        let builder = CallGraphBuilder::new(&program, &resolver);
        let mut graph = CallGraph::new();
        builder
            .build(&mut graph, &CancellationToken::new())
            .unwrap();
        (program, graph)
    }

    fn find_unit(graph: &CallGraph, name: &str) -> UnitId {
        graph
            .find_all_units()
            .into_iter()
            .find(|id| id.name == name)
            .unwrap_or_else(|| panic!("unit {name} not in graph"))
    }

    #[test]
    fn test_end_to_end_basic_calls() {
        let (_, graph) = build_graph(
            r#"
fn main() {
    helper();
    process_data();
}

fn helper() {}

fn process_data() {
    validate();
}

fn validate() {}
"#,
        );

        assert_eq!(graph.node_count(), 4);
        let main = find_unit(&graph, "main");
        assert_eq!(graph.get_callees(&main).len(), 2);

        let helper = find_unit(&graph, "helper");
        let callers = graph.get_callers(&helper);
        assert_eq!(callers.len(), 1);
        assert_eq!(callers[0].name, "main");
    }

    #[test]
    fn test_method_calls_resolve_within_impl() {
        let (_, graph) = build_graph(
            r#"
struct Processor;

impl Processor {
    fn process(&self) {
        self.validate();
        self.transform();
    }

    fn validate(&self) {}

    fn transform(&self) {}
}
"#,
        );

        let process = find_unit(&graph, "Processor::process");
        assert_eq!(graph.get_callees(&process).len(), 2);
    }

    #[test]
    fn test_cross_module_call_resolves_by_suffix() {
        let (_, graph) = build_graph(
            r#"
mod util {
    pub fn helper() {}
}

fn main() {
    util::helper();
}
"#,
        );

        let main = find_unit(&graph, "main");
        let callees = graph.get_callees(&main);
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].name, "util::helper");
    }

    #[test]
    fn test_ambiguous_method_stays_unresolved() {
        let (_, graph) = build_graph(
            r#"
struct A;
struct B;

impl A {
    fn run(&self) {}
}

impl B {
    fn run(&self) {}
}

fn dispatch(a: &A) {
    a.run();
}
"#,
        );

        // Two candidates for `run` in the same file: no edge.
        let dispatch = find_unit(&graph, "dispatch");
        assert!(graph.get_callees(&dispatch).is_empty());
    }

    #[test]
    fn test_external_call_stays_unresolved() {
        let (program, graph) = build_graph(
            r#"
fn helper() {
    std::fs::read_to_string("x");
}
"#,
        );

        let helper = find_unit(&graph, "helper");
        assert!(graph.get_callees(&helper).is_empty());
        // The site was still located and handed to the resolver.
        assert_eq!(program.call_sites(&helper).len(), 1);
    }

    #[test]
    fn test_multi_file_resolution_prefers_unique_global() {
        let config = BuilderConfig::default();
        let sources = vec![
            (
                PathBuf::from("main.rs"),
                "fn main() { helper(); }".to_string(),
            ),
            (PathBuf::from("lib.rs"), "pub fn helper() {}".to_string()),
        ];
        let program = RustProgram::from_sources(&sources, &config).unwrap();
        let resolver = program.resolver();
        let builder = CallGraphBuilder::new(&program, &resolver);
        let mut graph = CallGraph::new();
        builder
            .build(&mut graph, &CancellationToken::new())
            .unwrap();

        let main = find_unit(&graph, "main");
        let callees = graph.get_callees(&main);
        assert_eq!(callees.len(), 1);
        assert_eq!(callees[0].file, PathBuf::from("lib.rs"));
    }

    #[test]
    fn test_parse_error_is_structured() {
        let err = RustProgram::from_source("bad.rs", "fn {", &BuilderConfig::default())
            .expect_err("should fail to parse");
        assert!(matches!(err, EngineError::Parse { .. }));
        assert!(!err.is_cancelled());
    }
}
