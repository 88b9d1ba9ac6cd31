//! sy-engine: Engine facade and realtime plumbing
//!
//! Ties the routing graphs to an audio driver:
//! - `MidiInQueue` - pooled staging of driver-thread MIDI into the block
//! - `Driver` - the capability an audio backend implements
//! - `Engine` - the facade owning the active graph, MIDI port adapters
//!   and the patchbay API
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌───────────────┐
//! │   Driver    │────▶│   EngineRt   │────▶│  Rack/Patchbay│
//! │             │     │              │     │     graph     │
//! │ - callback  │     │ - MIDI drain │     │               │
//! │ - MIDI I/O  │     │ - event pools│     │ - plugins     │
//! └─────────────┘     └──────────────┘     └───────────────┘
//! ```

mod driver;
mod engine;
mod midi_queue;

pub use driver::*;
pub use engine::*;
pub use midi_queue::*;

use serde::{Deserialize, Serialize};

/// Which topology the engine runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ProcessMode {
    /// Fixed six-port topology with a linear plugin chain
    #[default]
    Rack,
    /// General processing graph
    Patchbay,
}

/// Engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    pub process_mode: ProcessMode,
    /// Preferred device buffer size; the driver's actual value wins
    pub buffer_size: sy_core::BufferSize,
    /// Preferred device sample rate; the driver's actual value wins
    pub sample_rate: sy_core::SampleRate,
}
