#![allow(dead_code)]

use flowmap::{CallGraph, UnitId};
use std::path::PathBuf;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Shorthand for hand-built graphs where only the name matters.
pub fn unit(name: &str) -> UnitId {
    UnitId::new(PathBuf::from("test.rs"), name.to_string(), 1)
}

/// Look up a unit in an extracted graph by name.
pub fn unit_named(graph: &CallGraph, name: &str) -> UnitId {
    graph
        .find_all_units()
        .into_iter()
        .find(|id| id.name == name)
        .unwrap_or_else(|| panic!("unit {name} not in graph"))
}
