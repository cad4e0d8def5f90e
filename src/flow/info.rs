use crate::graph::UnitId;
use im::HashSet;
use serde::{Deserialize, Serialize};
use std::hash::Hash;

/// Per-unit result of a flow analysis: the unit's identity plus the flow
/// sets entering and escaping it. Immutable once constructed; the
/// analyzer replaces, never mutates, cached entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowInfo<T: Clone + Eq + Hash> {
    element: UnitId,
    incoming: HashSet<T>,
    outgoing: HashSet<T>,
    has_unhandled: bool,
}

impl<T: Clone + Eq + Hash> FlowInfo<T> {
    pub fn new(
        element: UnitId,
        incoming: HashSet<T>,
        outgoing: HashSet<T>,
        has_unhandled: bool,
    ) -> Self {
        Self {
            element,
            incoming,
            outgoing,
            has_unhandled,
        }
    }

    pub fn element(&self) -> &UnitId {
        &self.element
    }

    /// Flow entering this unit from elsewhere. Empty for pure bottom-up
    /// analyses.
    pub fn incoming(&self) -> &HashSet<T> {
        &self.incoming
    }

    /// Flow escaping this unit: its local contribution combined with its
    /// callees' outgoing flow, per the domain's merge policy.
    pub fn outgoing(&self) -> &HashSet<T> {
        &self.outgoing
    }

    /// Whether any unresolved/unhandled flow item escapes this unit.
    pub fn has_unhandled(&self) -> bool {
        self.has_unhandled
    }
}
