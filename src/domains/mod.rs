//! Concrete flow-analysis domains built on the generic engine.
//!
//! Each domain supplies the two pluggable hooks (local contribution and
//! optionally the merge policy) and otherwise reuses the engine
//! unmodified; independent domains share one call graph.

pub mod io_flow;
pub mod panic_flow;

pub use io_flow::{IoCategory, IoFlowDomain};
pub use panic_flow::{PanicFlowDomain, PanicOrigin};
