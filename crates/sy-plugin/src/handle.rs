//! Plugin handle: the adapter between a plugin instance and the graphs
//!
//! The handle owns the processor behind a mutex and carries the state the
//! audio thread reads without locking: enable flag, channel counts, peak
//! meters. Peaks are stored as bit-cast atomic floats so a UI thread can
//! poll them lock-free.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use parking_lot::{Mutex, MutexGuard};

use crate::PluginProcessor;

/// Patchbay node id value meaning "not in a patchbay graph"
pub const NO_PATCHBAY_NODE: u32 = 0;

/// Adapter wrapping a plugin instance for use by the routing graphs
pub struct PluginHandle {
    id: AtomicU32,
    enabled: AtomicBool,
    patchbay_node: AtomicU32,
    processor: Mutex<Box<dyn PluginProcessor>>,
    // facts cached at creation so the audio thread never locks to query them
    name: String,
    audio_ins: u32,
    audio_outs: u32,
    accepts_midi: bool,
    produces_midi: bool,
    ins_peak: [AtomicU32; 2],
    outs_peak: [AtomicU32; 2],
}

impl std::fmt::Debug for PluginHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginHandle")
            .field("id", &self.id())
            .field("name", &self.name)
            .field("enabled", &self.is_enabled())
            .field("audio_ins", &self.audio_ins)
            .field("audio_outs", &self.audio_outs)
            .finish()
    }
}

impl PluginHandle {
    pub fn new(id: u32, processor: Box<dyn PluginProcessor>) -> Self {
        Self {
            id: AtomicU32::new(id),
            enabled: AtomicBool::new(true),
            patchbay_node: AtomicU32::new(NO_PATCHBAY_NODE),
            name: processor.name().to_string(),
            audio_ins: processor.audio_in_count(),
            audio_outs: processor.audio_out_count(),
            accepts_midi: processor.accepts_midi(),
            produces_midi: processor.produces_midi(),
            processor: Mutex::new(processor),
            ins_peak: [AtomicU32::new(0), AtomicU32::new(0)],
            outs_peak: [AtomicU32::new(0), AtomicU32::new(0)],
        }
    }

    /// Stable plugin index within the engine
    #[inline]
    pub fn id(&self) -> u32 {
        self.id.load(Ordering::Relaxed)
    }

    pub fn set_id(&self, id: u32) {
        self.id.store(id, Ordering::Relaxed);
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn audio_in_count(&self) -> u32 {
        self.audio_ins
    }

    #[inline]
    pub fn audio_out_count(&self) -> u32 {
        self.audio_outs
    }

    #[inline]
    pub fn accepts_midi(&self) -> bool {
        self.accepts_midi
    }

    #[inline]
    pub fn produces_midi(&self) -> bool {
        self.produces_midi
    }

    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Disabled plugins are bypassed: outputs silenced, MIDI cleared
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Patchbay node id of this plugin, `NO_PATCHBAY_NODE` in rack mode
    #[inline]
    pub fn patchbay_node_id(&self) -> u32 {
        self.patchbay_node.load(Ordering::Relaxed)
    }

    pub fn set_patchbay_node_id(&self, node_id: u32) {
        self.patchbay_node.store(node_id, Ordering::Relaxed);
    }

    /// Acquire the processor for one block.
    ///
    /// Wait-free in realtime mode (`try_lock`); may block in offline mode.
    /// `None` means the plugin is contended and must be skipped this block.
    pub fn try_lock(&self, offline: bool) -> Option<MutexGuard<'_, Box<dyn PluginProcessor>>> {
        if offline {
            Some(self.processor.lock())
        } else {
            self.processor.try_lock()
        }
    }

    /// Blocking acquire, for control-thread maintenance only
    pub fn lock(&self) -> MutexGuard<'_, Box<dyn PluginProcessor>> {
        self.processor.lock()
    }

    /// Store per-block peaks, clamped to 1.0
    pub fn set_peaks(&self, ins: [f32; 2], outs: [f32; 2]) {
        for ch in 0..2 {
            self.ins_peak[ch].store(ins[ch].min(1.0).to_bits(), Ordering::Relaxed);
            self.outs_peak[ch].store(outs[ch].min(1.0).to_bits(), Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn input_peak(&self, channel: usize) -> f32 {
        f32::from_bits(self.ins_peak[channel & 1].load(Ordering::Relaxed))
    }

    #[inline]
    pub fn output_peak(&self, channel: usize) -> f32 {
        f32::from_bits(self.outs_peak[channel & 1].load(Ordering::Relaxed))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
