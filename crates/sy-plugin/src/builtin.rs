//! Built-in processors
//!
//! Small processors implementing the plugin capability directly, used by
//! the engine's routing utilities and throughout the test suites.

use sy_core::{EngineEvent, EventBuffer, Sample};

use crate::PluginProcessor;

/// Applies a constant linear gain
pub struct GainProcessor {
    name: String,
    channels: u32,
    gain: f32,
}

impl GainProcessor {
    pub fn new(channels: u32, gain: f32) -> Self {
        Self {
            name: format!("Gain x{gain}"),
            channels,
            gain,
        }
    }

    pub fn set_gain(&mut self, gain: f32) {
        self.gain = gain;
    }
}

impl PluginProcessor for GainProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    fn audio_in_count(&self) -> u32 {
        self.channels
    }

    fn audio_out_count(&self) -> u32 {
        self.channels
    }

    fn process(
        &mut self,
        inputs: &[Vec<Sample>],
        outputs: &mut [Vec<Sample>],
        _events_in: &[EngineEvent],
        _events_out: &mut EventBuffer,
        frames: u32,
    ) {
        let frames = frames as usize;
        for ch in 0..self.channels as usize {
            let (Some(input), Some(output)) = (inputs.get(ch), outputs.get_mut(ch)) else {
                break;
            };
            for (o, i) in output[..frames].iter_mut().zip(&input[..frames]) {
                *o = *i * self.gain;
            }
        }
    }
}

/// Copies inputs to outputs unchanged
pub struct PassthroughProcessor {
    channels: u32,
}

impl PassthroughProcessor {
    pub fn new(channels: u32) -> Self {
        Self { channels }
    }
}

impl PluginProcessor for PassthroughProcessor {
    fn name(&self) -> &str {
        "Passthrough"
    }

    fn audio_in_count(&self) -> u32 {
        self.channels
    }

    fn audio_out_count(&self) -> u32 {
        self.channels
    }

    fn process(
        &mut self,
        inputs: &[Vec<Sample>],
        outputs: &mut [Vec<Sample>],
        _events_in: &[EngineEvent],
        _events_out: &mut EventBuffer,
        frames: u32,
    ) {
        let frames = frames as usize;
        for ch in 0..self.channels as usize {
            let (Some(input), Some(output)) = (inputs.get(ch), outputs.get_mut(ch)) else {
                break;
            };
            output[..frames].copy_from_slice(&input[..frames]);
        }
    }
}

/// Sine source with no audio inputs
pub struct SineProcessor {
    frequency: f64,
    amplitude: f32,
    sample_rate: f64,
    phase: f64,
}

impl SineProcessor {
    pub fn new(frequency: f64, amplitude: f32) -> Self {
        Self {
            frequency,
            amplitude,
            sample_rate: 48_000.0,
            phase: 0.0,
        }
    }
}

impl PluginProcessor for SineProcessor {
    fn name(&self) -> &str {
        "Sine"
    }

    fn audio_in_count(&self) -> u32 {
        0
    }

    fn audio_out_count(&self) -> u32 {
        2
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
    }

    fn reset(&mut self) {
        self.phase = 0.0;
    }

    fn process(
        &mut self,
        _inputs: &[Vec<Sample>],
        outputs: &mut [Vec<Sample>],
        _events_in: &[EngineEvent],
        _events_out: &mut EventBuffer,
        frames: u32,
    ) {
        let step = std::f64::consts::TAU * self.frequency / self.sample_rate;
        for i in 0..frames as usize {
            let sample = (self.phase.sin() as f32) * self.amplitude;
            self.phase += step;
            for output in outputs.iter_mut().take(2) {
                output[i] = sample;
            }
        }
        self.phase %= std::f64::consts::TAU;
    }
}

/// Forwards the event-in stream to the event-out stream, no audio ports
pub struct MidiThroughProcessor;

impl PluginProcessor for MidiThroughProcessor {
    fn name(&self) -> &str {
        "MIDI Through"
    }

    fn audio_in_count(&self) -> u32 {
        0
    }

    fn audio_out_count(&self) -> u32 {
        0
    }

    fn accepts_midi(&self) -> bool {
        true
    }

    fn produces_midi(&self) -> bool {
        true
    }

    fn process(
        &mut self,
        _inputs: &[Vec<Sample>],
        _outputs: &mut [Vec<Sample>],
        events_in: &[EngineEvent],
        events_out: &mut EventBuffer,
        _frames: u32,
    ) {
        for event in events_in {
            if !events_out.push(*event) {
                break;
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
