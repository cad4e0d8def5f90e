//! Rust source frontend: parses `.rs` files with `syn` and adapts them
//! to the engine's [`ProgramSource`](crate::graph::ProgramSource) and
//! [`CallResolver`](crate::graph::CallResolver) interfaces.

pub mod rust_program;
pub mod rust_units;

pub use rust_program::{NameResolver, RustProgram};
