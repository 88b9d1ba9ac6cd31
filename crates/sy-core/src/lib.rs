//! sy-core: Shared types and vocabulary for the Switchyard routing engine
//!
//! This crate provides the foundational types used across all Switchyard
//! crates: sample/buffer vocabulary, group/port/connection identifiers,
//! engine events, the host-callback taxonomy, and error types.

mod callback;
mod error;
mod event;
mod ids;

pub use callback::*;
pub use error::*;
pub use event::*;
pub use ids::*;

/// Type alias for audio samples
pub type Sample = f32;

/// Capacity of the per-block engine event buffers
pub const MAX_ENGINE_EVENTS: usize = 512;

/// Inline payload size of an engine MIDI event, in bytes
pub const MAX_MIDI_DATA: usize = 4;

/// Capacity of the MIDI-in staging pool
pub const MAX_MIDI_IN_EVENTS: usize = 512;

/// Maximum number of plugin nodes in a patchbay graph
pub const MAX_PATCHBAY_PLUGINS: u32 = 255;

/// Maximum audio channels considered per graph node
pub const MAX_NODE_AUDIO_CHANNELS: usize = 32;

/// Standard sample rate options
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u32)]
pub enum SampleRate {
    Hz44100 = 44100,
    Hz48000 = 48000,
    Hz88200 = 88200,
    Hz96000 = 96000,
    Hz176400 = 176400,
    Hz192000 = 192000,
}

impl SampleRate {
    #[inline]
    pub fn as_f64(self) -> f64 {
        self as u32 as f64
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl Default for SampleRate {
    fn default() -> Self {
        Self::Hz48000
    }
}

/// Buffer size options
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[repr(u32)]
pub enum BufferSize {
    Samples32 = 32,
    Samples64 = 64,
    Samples128 = 128,
    Samples256 = 256,
    Samples512 = 512,
    Samples1024 = 1024,
    Samples2048 = 2048,
    Samples4096 = 4096,
}

impl BufferSize {
    #[inline]
    pub fn as_usize(self) -> usize {
        self as u32 as usize
    }

    #[inline]
    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Calculate latency in milliseconds
    #[inline]
    pub fn latency_ms(self, sample_rate: SampleRate) -> f64 {
        (self.as_usize() as f64 / sample_rate.as_f64()) * 1000.0
    }
}

impl Default for BufferSize {
    fn default() -> Self {
        Self::Samples256
    }
}
