//! sy-graph: Rack and patchbay processing graphs
//!
//! The two interoperating topologies of the Switchyard engine:
//! - `RackGraph` - fixed six-port topology with a sequential plugin chain
//! - `PatchbayGraph` - general audio/MIDI processor graph with typed ports
//!
//! Both keep an ordered `ConnectionRegistry` in sync with their internal
//! routing state and publish changes through the host callback.

mod patchbay;
mod processor_graph;
mod rack;
mod registry;

pub use patchbay::*;
pub use processor_graph::*;
pub use rack::*;
pub use registry::*;

use sy_core::EventBuffer;

/// Per-block data shared between the engine facade and the active graph
pub struct ProcessData<'a> {
    /// Engine input events, time-ordered within the block
    pub events_in: &'a mut EventBuffer,
    /// Engine output events, cleared before the graph runs
    pub events_out: &'a mut EventBuffer,
}
