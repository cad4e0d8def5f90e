//! Callable-unit and call-site extraction from a parsed Rust file.
//!
//! Free functions, impl methods (qualified as `Type::method`), nested
//! local functions and closures are collected as units; call and
//! method-call expressions inside each body become [`CallExpr`]s
//! attributed per the configured closure policy. The extractor locates
//! call sites only; resolving what a call actually invokes is the
//! resolver's job.

use crate::config::{BuilderConfig, ClosureAttribution};
use crate::graph::{CallExpr, CallKind, CallSite, UnitDecl, UnitId, UnitKind};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use syn::spanned::Spanned;
use syn::visit::{self, Visit};

/// Everything extracted from one parsed file.
#[derive(Debug, Default)]
pub struct ExtractedFile {
    pub units: Vec<UnitDecl>,
    pub sites: HashMap<UnitId, Vec<CallExpr>>,
    /// Macro names invoked per unit (`panic`, `assert_eq`, ...), kept
    /// for domains that derive local facts from macro use.
    pub macros: HashMap<UnitId, Vec<String>>,
}

pub fn extract_file(file: &syn::File, path: &Path, config: &BuilderConfig) -> ExtractedFile {
    let mut collector = UnitCollector {
        file_path: path.to_path_buf(),
        config: *config,
        module_path: Vec::new(),
        impl_type: None,
        unit_stack: Vec::new(),
        test_mod_depth: 0,
        out: ExtractedFile::default(),
    };
    collector.visit_file(file);
    collector.out
}

struct UnitCollector {
    file_path: PathBuf,
    config: BuilderConfig,
    module_path: Vec<String>,
    impl_type: Option<String>,
    /// Innermost entry is the unit calls are attributed to.
    unit_stack: Vec<UnitId>,
    test_mod_depth: usize,
    out: ExtractedFile,
}

impl UnitCollector {
    fn line_of(&self, span: proc_macro2::Span) -> usize {
        span.start().line
    }

    fn qualified_name(&self, base: &str) -> String {
        if self.module_path.is_empty() {
            base.to_string()
        } else {
            format!("{}::{}", self.module_path.join("::"), base)
        }
    }

    fn current_unit(&self) -> Option<UnitId> {
        self.unit_stack.last().cloned()
    }

    fn declare_unit(&mut self, name: String, line: usize, kind: UnitKind, is_test: bool) -> UnitId {
        let id = UnitId::new(self.file_path.clone(), name, line);
        self.out.units.push(UnitDecl {
            id: id.clone(),
            kind,
            is_test,
        });
        id
    }

    fn record_call(&mut self, callee_hint: String, kind: CallKind, line: usize) {
        if let Some(enclosing) = self.current_unit() {
            let call = CallExpr {
                enclosing: enclosing.clone(),
                callee_hint,
                kind,
                site: CallSite {
                    file: self.file_path.clone(),
                    line,
                },
            };
            self.out.sites.entry(enclosing).or_default().push(call);
        }
    }

    fn record_macro(&mut self, name: String) {
        if let Some(enclosing) = self.current_unit() {
            self.out.macros.entry(enclosing).or_default().push(name);
        }
    }

    fn is_test_fn(attrs: &[syn::Attribute]) -> bool {
        attrs.iter().any(|attr| {
            attr.path()
                .segments
                .last()
                .map(|segment| segment.ident == "test")
                .unwrap_or(false)
        })
    }

    fn is_cfg_test_mod(attrs: &[syn::Attribute]) -> bool {
        attrs.iter().any(|attr| {
            attr.path().is_ident("cfg")
                && attr
                    .meta
                    .require_list()
                    .map(|list| list.tokens.to_string().contains("test"))
                    .unwrap_or(false)
        })
    }

    fn path_to_hint(path: &syn::Path) -> Option<String> {
        let segments: Vec<String> = path
            .segments
            .iter()
            .map(|segment| segment.ident.to_string())
            .collect();
        if segments.is_empty() {
            None
        } else {
            Some(segments.join("::"))
        }
    }

    fn call_kind_for_path(hint: &str) -> CallKind {
        let segments: Vec<&str> = hint.split("::").collect();
        if segments.len() >= 2 && segments.last() == Some(&"new") {
            CallKind::Constructor
        } else {
            CallKind::Direct
        }
    }

    fn in_test_context(&self) -> bool {
        self.test_mod_depth > 0
    }
}

impl<'ast> Visit<'ast> for UnitCollector {
    fn visit_item_mod(&mut self, node: &'ast syn::ItemMod) {
        let is_test_mod = Self::is_cfg_test_mod(&node.attrs);
        self.module_path.push(node.ident.to_string());
        if is_test_mod {
            self.test_mod_depth += 1;
        }
        visit::visit_item_mod(self, node);
        if is_test_mod {
            self.test_mod_depth -= 1;
        }
        self.module_path.pop();
    }

    fn visit_item_impl(&mut self, node: &'ast syn::ItemImpl) {
        let previous = self.impl_type.take();
        if let syn::Type::Path(type_path) = &*node.self_ty {
            self.impl_type = type_path
                .path
                .segments
                .last()
                .map(|segment| segment.ident.to_string());
        }
        visit::visit_item_impl(self, node);
        self.impl_type = previous;
    }

    fn visit_item_fn(&mut self, node: &'ast syn::ItemFn) {
        let line = self.line_of(node.sig.ident.span());
        let is_test = Self::is_test_fn(&node.attrs) || self.in_test_context();

        if let Some(enclosing) = self.current_unit() {
            // Nested local function.
            match self.config.closure_attribution {
                ClosureAttribution::Enclosing => {
                    // Body calls stay attributed to the enclosing unit.
                    visit::visit_item_fn(self, node);
                }
                ClosureAttribution::SeparateUnit => {
                    let name = format!("{}::{}", enclosing.name, node.sig.ident);
                    let id = self.declare_unit(name, line, UnitKind::LocalFunction, is_test);
                    self.unit_stack.push(id);
                    visit::visit_item_fn(self, node);
                    self.unit_stack.pop();
                }
            }
            return;
        }

        let name = self.qualified_name(&node.sig.ident.to_string());
        let id = self.declare_unit(name, line, UnitKind::Function, is_test);
        self.unit_stack.push(id);
        visit::visit_item_fn(self, node);
        self.unit_stack.pop();
    }

    fn visit_impl_item_fn(&mut self, node: &'ast syn::ImplItemFn) {
        let line = self.line_of(node.sig.ident.span());
        let is_test = Self::is_test_fn(&node.attrs) || self.in_test_context();
        let method = node.sig.ident.to_string();

        let base = match &self.impl_type {
            Some(impl_type) => format!("{}::{}", impl_type, method),
            None => method.clone(),
        };
        let kind = if method == "new" {
            UnitKind::Constructor
        } else {
            UnitKind::Method
        };

        let id = self.declare_unit(self.qualified_name(&base), line, kind, is_test);
        self.unit_stack.push(id);
        visit::visit_impl_item_fn(self, node);
        self.unit_stack.pop();
    }

    fn visit_expr_closure(&mut self, node: &'ast syn::ExprClosure) {
        match (self.config.closure_attribution, self.current_unit()) {
            (ClosureAttribution::SeparateUnit, Some(enclosing)) => {
                let line = self.line_of(node.span());
                let name = format!("{}::{{closure@{}}}", enclosing.name, line);
                let id = self.declare_unit(name.clone(), line, UnitKind::Closure, false);
                // The enclosing unit is modeled as invoking the closure.
                self.record_call(name, CallKind::Closure, line);
                self.unit_stack.push(id);
                visit::visit_expr_closure(self, node);
                self.unit_stack.pop();
            }
            _ => visit::visit_expr_closure(self, node),
        }
    }

    fn visit_expr_call(&mut self, node: &'ast syn::ExprCall) {
        if let syn::Expr::Path(path_expr) = &*node.func {
            if let Some(hint) = Self::path_to_hint(&path_expr.path) {
                let kind = Self::call_kind_for_path(&hint);
                self.record_call(hint, kind, self.line_of(node.span()));
            }
        }
        visit::visit_expr_call(self, node);
    }

    fn visit_expr_method_call(&mut self, node: &'ast syn::ExprMethodCall) {
        self.record_call(
            node.method.to_string(),
            CallKind::Method,
            self.line_of(node.span()),
        );
        visit::visit_expr_method_call(self, node);
    }

    fn visit_macro(&mut self, node: &'ast syn::Macro) {
        if let Some(segment) = node.path.segments.last() {
            self.record_macro(segment.ident.to_string());
        }
        visit::visit_macro(self, node);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extract(code: &str) -> ExtractedFile {
        let parsed = syn::parse_file(code).unwrap();
        extract_file(&parsed, Path::new("test.rs"), &BuilderConfig::default())
    }

    fn extract_with(code: &str, config: BuilderConfig) -> ExtractedFile {
        let parsed = syn::parse_file(code).unwrap();
        extract_file(&parsed, Path::new("test.rs"), &config)
    }

    fn unit_names(extracted: &ExtractedFile) -> Vec<String> {
        extracted
            .units
            .iter()
            .map(|decl| decl.id.name.clone())
            .collect()
    }

    #[test]
    fn test_free_functions_and_calls() {
        let extracted = extract(
            r#"
fn main() {
    helper();
}

fn helper() {}
"#,
        );

        assert_eq!(unit_names(&extracted), vec!["main", "helper"]);
        let main_id = &extracted.units[0].id;
        let sites = &extracted.sites[main_id];
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].callee_hint, "helper");
        assert_eq!(sites[0].kind, CallKind::Direct);
    }

    #[test]
    fn test_impl_methods_are_qualified() {
        let extracted = extract(
            r#"
struct Processor;

impl Processor {
    fn new() -> Self {
        Processor
    }

    fn process(&self) {
        self.validate();
    }

    fn validate(&self) {}
}
"#,
        );

        let names = unit_names(&extracted);
        assert!(names.contains(&"Processor::new".to_string()));
        assert!(names.contains(&"Processor::process".to_string()));
        assert!(names.contains(&"Processor::validate".to_string()));

        let new_decl = extracted
            .units
            .iter()
            .find(|d| d.id.name == "Processor::new")
            .unwrap();
        assert_eq!(new_decl.kind, UnitKind::Constructor);

        let process_id = extracted
            .units
            .iter()
            .find(|d| d.id.name == "Processor::process")
            .map(|d| d.id.clone())
            .unwrap();
        let sites = &extracted.sites[&process_id];
        assert_eq!(sites[0].callee_hint, "validate");
        assert_eq!(sites[0].kind, CallKind::Method);
    }

    #[test]
    fn test_constructor_path_call_kind() {
        let extracted = extract(
            r#"
struct Widget;

impl Widget {
    fn new() -> Self {
        Widget
    }
}

fn build() {
    let _w = Widget::new();
}
"#,
        );

        let build_id = extracted
            .units
            .iter()
            .find(|d| d.id.name == "build")
            .map(|d| d.id.clone())
            .unwrap();
        let sites = &extracted.sites[&build_id];
        assert_eq!(sites[0].callee_hint, "Widget::new");
        assert_eq!(sites[0].kind, CallKind::Constructor);
    }

    #[test]
    fn test_module_path_qualifies_names() {
        let extracted = extract(
            r#"
mod util {
    pub fn helper() {}
}

fn main() {
    util::helper();
}
"#,
        );

        let names = unit_names(&extracted);
        assert!(names.contains(&"util::helper".to_string()));
        assert!(names.contains(&"main".to_string()));
    }

    #[test]
    fn test_closure_calls_attributed_to_enclosing_by_default() {
        let extracted = extract(
            r#"
fn outer() {
    let apply = |x: u32| transform(x);
    apply(1);
}

fn transform(x: u32) -> u32 {
    x
}
"#,
        );

        // No separate closure unit.
        assert_eq!(unit_names(&extracted), vec!["outer", "transform"]);
        let outer_id = &extracted.units[0].id;
        let hints: Vec<&str> = extracted.sites[outer_id]
            .iter()
            .map(|c| c.callee_hint.as_str())
            .collect();
        assert!(hints.contains(&"transform"));
    }

    #[test]
    fn test_closure_as_separate_unit_when_configured() {
        let config = BuilderConfig {
            closure_attribution: ClosureAttribution::SeparateUnit,
            ..BuilderConfig::default()
        };
        let extracted = extract_with(
            r#"
fn outer() {
    let apply = |x: u32| transform(x);
    apply(1);
}

fn transform(x: u32) -> u32 {
    x
}
"#,
            config,
        );

        let names = unit_names(&extracted);
        assert!(names.iter().any(|n| n.starts_with("outer::{closure@")));

        // The call to transform belongs to the closure unit now.
        let closure_id = extracted
            .units
            .iter()
            .find(|d| d.kind == UnitKind::Closure)
            .map(|d| d.id.clone())
            .unwrap();
        let hints: Vec<&str> = extracted.sites[&closure_id]
            .iter()
            .map(|c| c.callee_hint.as_str())
            .collect();
        assert_eq!(hints, vec!["transform"]);
    }

    #[test]
    fn test_nested_local_fn_attribution() {
        let extracted = extract(
            r#"
fn outer() {
    fn inner() {
        leaf();
    }
    inner();
}

fn leaf() {}
"#,
        );

        // Default policy folds inner's calls into outer.
        assert_eq!(unit_names(&extracted), vec!["outer", "leaf"]);
        let outer_id = &extracted.units[0].id;
        let hints: Vec<&str> = extracted.sites[outer_id]
            .iter()
            .map(|c| c.callee_hint.as_str())
            .collect();
        assert!(hints.contains(&"leaf"));
        assert!(hints.contains(&"inner"));
    }

    #[test]
    fn test_test_attribute_detection() {
        let extracted = extract(
            r#"
#[test]
fn test_something() {}

#[tokio::test]
async fn test_async() {}

fn regular() {}

#[cfg(test)]
mod tests {
    fn helper() {}
}
"#,
        );

        let is_test: HashMap<String, bool> = extracted
            .units
            .iter()
            .map(|d| (d.id.name.clone(), d.is_test))
            .collect();
        assert!(is_test["test_something"]);
        assert!(is_test["test_async"]);
        assert!(!is_test["regular"]);
        assert!(is_test["tests::helper"]);
    }

    #[test]
    fn test_macro_invocations_recorded() {
        let extracted = extract(
            r#"
fn risky() {
    assert!(true);
    panic!("boom");
}
"#,
        );

        let risky_id = &extracted.units[0].id;
        let macros = &extracted.macros[risky_id];
        assert!(macros.contains(&"assert".to_string()));
        assert!(macros.contains(&"panic".to_string()));
    }
}
