//! sy-plugin: Plugin capability and adapter
//!
//! Defines the narrow capability the routing graphs require from external
//! plugin objects, and the handle type that adapts a plugin instance for
//! realtime use:
//! - `PluginProcessor` - the processing capability itself
//! - `PluginHandle` - enable state, realtime try-lock, peak metering
//! - built-in processors used for routing utilities and tests

mod builtin;
mod handle;
mod processor;

pub use builtin::*;
pub use handle::*;
pub use processor::*;
