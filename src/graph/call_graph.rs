use im::{HashMap, HashSet, Vector};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stable identity of a callable unit (function, method, constructor,
/// local function or closure). Two independently obtained ids for the
/// same unit compare equal.
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitId {
    pub file: PathBuf,
    pub name: String,
    pub line: usize,
}

impl UnitId {
    pub fn new(file: PathBuf, name: String, line: usize) -> Self {
        Self { file, name, line }
    }
}

impl std::fmt::Display for UnitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.name, self.line)
    }
}

/// What kind of callable a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnitKind {
    Function,
    Method,
    Constructor,
    LocalFunction,
    Closure,
}

/// How a call site invokes its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CallKind {
    Direct,
    Method,
    Constructor,
    Closure,
}

/// Source location of one call expression, kept for diagnostics
/// traceability.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSite {
    pub file: PathBuf,
    pub line: usize,
}

/// One caller-to-callee call as recorded in the graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitCall {
    pub caller: UnitId,
    pub callee: UnitId,
    pub kind: CallKind,
    pub site: Option<CallSite>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct RecordedCall {
    kind: CallKind,
    site: Option<CallSite>,
}

/// A declared callable unit together with its metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitNode {
    pub id: UnitId,
    pub kind: UnitKind,
    pub is_test: bool,
}

/// Directed call graph over callable units.
///
/// Nodes are held in an identity-keyed map and edges reference nodes by
/// key only, so cyclic call structures never form cyclic ownership. Edge
/// policy: one logical edge per (caller, callee) pair, with the distinct
/// call sites between that pair attached to the edge in insertion order.
/// Adjacency views therefore never report the same callee twice.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallGraph {
    #[serde(with = "unit_id_map")]
    nodes: HashMap<UnitId, UnitNode>,
    #[serde(with = "edge_table")]
    outgoing: HashMap<UnitId, HashMap<UnitId, Vector<RecordedCall>>>,
    #[serde(with = "unit_id_map")]
    incoming: HashMap<UnitId, HashSet<UnitId>>,
}

// Maps keyed by UnitId need string keys for JSON object encoding;
// keys round-trip through "file:name:line".
mod unit_id_map {
    use super::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::collections::HashMap as StdHashMap;

    pub fn key_to_string(id: &UnitId) -> String {
        format!("{}:{}:{}", id.file.display(), id.name, id.line)
    }

    pub fn key_from_string(key: &str) -> Option<UnitId> {
        let parts: Vec<&str> = key.rsplitn(3, ':').collect();
        if parts.len() == 3 {
            Some(UnitId {
                file: parts[2].into(),
                name: parts[1].to_string(),
                line: parts[0].parse().unwrap_or(0),
            })
        } else {
            None
        }
    }

    pub fn serialize<S, V>(map: &im::HashMap<UnitId, V>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        V: Serialize,
    {
        let string_map: StdHashMap<String, &V> =
            map.iter().map(|(k, v)| (key_to_string(k), v)).collect();
        string_map.serialize(serializer)
    }

    pub fn deserialize<'de, D, V>(deserializer: D) -> Result<im::HashMap<UnitId, V>, D::Error>
    where
        D: Deserializer<'de>,
        V: Deserialize<'de> + Clone,
    {
        let string_map: StdHashMap<String, V> = StdHashMap::deserialize(deserializer)?;
        let mut result = im::HashMap::new();
        for (key, value) in string_map {
            if let Some(id) = key_from_string(&key) {
                result.insert(id, value);
            }
        }
        Ok(result)
    }
}

// The nested caller -> callee -> sites table flattens to a sequence of
// edge records on the wire.
mod edge_table {
    use super::*;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct EdgeRecord {
        caller: UnitId,
        callee: UnitId,
        calls: Vec<RecordedCall>,
    }

    type EdgeMap = im::HashMap<UnitId, im::HashMap<UnitId, Vector<RecordedCall>>>;

    pub fn serialize<S: Serializer>(map: &EdgeMap, serializer: S) -> Result<S::Ok, S::Error> {
        let records: Vec<EdgeRecord> = map
            .iter()
            .flat_map(|(caller, callees)| {
                callees.iter().map(|(callee, calls)| EdgeRecord {
                    caller: caller.clone(),
                    callee: callee.clone(),
                    calls: calls.iter().cloned().collect(),
                })
            })
            .collect();
        records.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EdgeMap, D::Error> {
        let records: Vec<EdgeRecord> = Vec::deserialize(deserializer)?;
        let mut map: EdgeMap = im::HashMap::new();
        for record in records {
            map.entry(record.caller)
                .or_default()
                .insert(record.callee, record.calls.into_iter().collect());
        }
        Ok(map)
    }
}

impl CallGraph {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        }
    }

    /// Ensure a node exists for `id`. Idempotent: an existing node keeps
    /// its metadata.
    pub fn add_node(&mut self, id: UnitId) {
        if !self.nodes.contains_key(&id) {
            self.nodes.insert(
                id.clone(),
                UnitNode {
                    id,
                    kind: UnitKind::Function,
                    is_test: false,
                },
            );
        }
    }

    /// Register a unit with explicit metadata, replacing any placeholder
    /// node created by `add_node`.
    pub fn add_unit(&mut self, id: UnitId, kind: UnitKind, is_test: bool) {
        self.nodes.insert(
            id.clone(),
            UnitNode { id, kind, is_test },
        );
    }

    /// Record a call. Both endpoints are created if missing. Exact
    /// duplicates of (caller, callee, kind, site) coalesce to one entry;
    /// distinct sites between the same pair accumulate on the pair's
    /// logical edge.
    pub fn add_call(&mut self, call: UnitCall) {
        self.add_node(call.caller.clone());
        self.add_node(call.callee.clone());

        let recorded = RecordedCall {
            kind: call.kind,
            site: call.site,
        };

        let calls = self
            .outgoing
            .entry(call.caller.clone())
            .or_default()
            .entry(call.callee.clone())
            .or_default();
        if !calls.iter().any(|existing| *existing == recorded) {
            calls.push_back(recorded);
        }

        self.incoming
            .entry(call.callee)
            .or_default()
            .insert(call.caller);
    }

    /// Convenience over `add_call` for edges without site information.
    pub fn add_edge(&mut self, caller: UnitId, callee: UnitId, kind: CallKind) {
        self.add_call(UnitCall {
            caller,
            callee,
            kind,
            site: None,
        });
    }

    pub fn get_node(&self, id: &UnitId) -> Option<&UnitNode> {
        self.nodes.get(id)
    }

    pub fn contains(&self, id: &UnitId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Direct callees of `id`; empty if the node is absent.
    pub fn get_callees(&self, id: &UnitId) -> Vec<UnitId> {
        self.outgoing
            .get(id)
            .map(|callees| callees.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Direct callers of `id`; empty if the node is absent.
    pub fn get_callers(&self, id: &UnitId) -> Vec<UnitId> {
        self.incoming
            .get(id)
            .map(|callers| callers.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Call sites recorded on the (caller, callee) logical edge, in
    /// insertion order.
    pub fn call_sites(&self, caller: &UnitId, callee: &UnitId) -> Vec<CallSite> {
        self.outgoing
            .get(caller)
            .and_then(|callees| callees.get(callee))
            .map(|calls| calls.iter().filter_map(|c| c.site.clone()).collect())
            .unwrap_or_default()
    }

    /// All calls made by `caller`, reconstructed per recorded site.
    pub fn get_unit_calls(&self, caller: &UnitId) -> Vec<UnitCall> {
        self.outgoing
            .get(caller)
            .map(|callees| {
                callees
                    .iter()
                    .flat_map(|(callee, calls)| {
                        calls.iter().map(|recorded| UnitCall {
                            caller: caller.clone(),
                            callee: callee.clone(),
                            kind: recorded.kind,
                            site: recorded.site.clone(),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Drop all outgoing edges of `caller`, leaving edges of other units
    /// untouched. Used by incremental rebuilds before re-adding the
    /// unit's calls.
    pub fn remove_outgoing_edges(&mut self, caller: &UnitId) {
        if let Some(callees) = self.outgoing.remove(caller) {
            for callee in callees.keys() {
                if let Some(callers) = self.incoming.get_mut(callee) {
                    callers.remove(caller);
                }
            }
        }
    }

    pub fn is_test_unit(&self, id: &UnitId) -> bool {
        self.nodes.get(id).map(|n| n.is_test).unwrap_or(false)
    }

    pub fn find_all_units(&self) -> Vec<UnitId> {
        self.nodes.keys().cloned().collect()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.outgoing.values().map(|callees| callees.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn merge(&mut self, other: CallGraph) {
        for (id, node) in other.nodes {
            self.nodes.insert(id, node);
        }
        for (caller, callees) in other.outgoing {
            for (callee, calls) in callees {
                for recorded in calls {
                    self.add_call(UnitCall {
                        caller: caller.clone(),
                        callee: callee.clone(),
                        kind: recorded.kind,
                        site: recorded.site,
                    });
                }
            }
        }
    }

    /// Breadth-first distance from `id` to the furthest reachable node,
    /// capped at `max_depth`. Cycles are cut by the visited set; an
    /// absent node has depth 0.
    pub fn compute_depth(&self, id: &UnitId, max_depth: usize) -> usize {
        let mut visited = HashSet::new();
        let mut to_visit = Vector::new();
        let mut deepest = 0;
        to_visit.push_back((id.clone(), 0));

        while let Some((current, depth)) = to_visit.pop_front() {
            if visited.contains(&current) {
                continue;
            }
            visited.insert(current.clone());
            deepest = deepest.max(depth);

            if depth < max_depth {
                for callee in self.get_callees(&current) {
                    if !visited.contains(&callee) {
                        to_visit.push_back((callee, depth + 1));
                    }
                }
            }
        }

        deepest
    }

    /// All units reachable from `id` by following call edges outward, up
    /// to `max_depth` hops. Terminates on cyclic graphs; `id` itself is
    /// excluded unless reachable through a cycle.
    pub fn get_transitive_callees(&self, id: &UnitId, max_depth: usize) -> HashSet<UnitId> {
        self.traverse(id, max_depth, |unit| self.get_callees(unit))
    }

    /// All units that can reach `id` by following call edges inward, up
    /// to `max_depth` hops.
    pub fn get_transitive_callers(&self, id: &UnitId, max_depth: usize) -> HashSet<UnitId> {
        self.traverse(id, max_depth, |unit| self.get_callers(unit))
    }

    fn traverse<F>(&self, start: &UnitId, max_depth: usize, neighbors: F) -> HashSet<UnitId>
    where
        F: Fn(&UnitId) -> Vec<UnitId>,
    {
        let mut visited = HashSet::new();
        let mut to_visit = Vector::new();
        to_visit.push_back((start.clone(), 0));

        while let Some((current, depth)) = to_visit.pop_front() {
            if visited.contains(&current) {
                continue;
            }
            visited.insert(current.clone());

            if depth < max_depth {
                for next in neighbors(&current) {
                    if !visited.contains(&next) {
                        to_visit.push_back((next, depth + 1));
                    }
                }
            }
        }

        visited.remove(start);
        visited
    }
}

impl Default for CallGraph {
    fn default() -> Self {
        Self::new()
    }
}
