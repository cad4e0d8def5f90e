use serde::{Deserialize, Serialize};

/// How calls found inside closures and nested local functions are
/// attributed when building the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosureAttribution {
    /// Attribute nested calls to the enclosing top-level unit (default).
    #[default]
    Enclosing,
    /// Model each closure and local function as its own graph node, with
    /// an edge from the enclosing unit.
    SeparateUnit,
}

/// Policy knobs for call graph construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuilderConfig {
    pub closure_attribution: ClosureAttribution,
    /// Include `#[test]`-attributed units as graph nodes.
    pub include_tests: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            closure_attribution: ClosureAttribution::Enclosing,
            include_tests: true,
        }
    }
}
