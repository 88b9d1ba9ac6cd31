//! The plugin processing capability

use sy_core::{EngineEvent, EventBuffer, Sample};

/// The capability the routing graphs require from a plugin instance.
///
/// Audio is processed block-wise with separate input and output channel
/// buffers owned by the calling graph; event I/O is passed explicitly per
/// block. Implementations must not allocate or block inside `process`.
pub trait PluginProcessor: Send {
    /// Display name, also used for patchbay port naming
    fn name(&self) -> &str;

    /// Number of audio inputs (0 or more)
    fn audio_in_count(&self) -> u32;

    /// Number of audio outputs
    fn audio_out_count(&self) -> u32;

    /// True when the plugin consumes the block's event-in stream
    fn accepts_midi(&self) -> bool {
        false
    }

    /// True when the plugin writes to the block's event-out stream
    fn produces_midi(&self) -> bool {
        false
    }

    /// Called once per block before `process`
    fn init_buffers(&mut self) {}

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    /// Reset internal state (voices, filters, counters)
    fn reset(&mut self) {}

    /// Process one block.
    ///
    /// `inputs` holds at least `audio_in_count` channels and `outputs` at
    /// least `audio_out_count`; extra channels are ignored. `events_in`
    /// is time-ordered within the block; `events_out` arrives cleared.
    fn process(
        &mut self,
        inputs: &[Vec<Sample>],
        outputs: &mut [Vec<Sample>],
        events_in: &[EngineEvent],
        events_out: &mut EventBuffer,
        frames: u32,
    );
}
