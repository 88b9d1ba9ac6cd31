//! The driver capability
//!
//! One engine facade is parameterised by one `Driver`: the driver owns the
//! device callback thread and upcalls through `DeviceCallback`, the engine
//! owns the graph. MIDI device ports open through the driver and adapt to
//! the `MidiInPort`/`MidiOutPort` capabilities.
//!
//! `NullDriver` is the in-process driver used by tests and headless
//! operation: blocks are pumped manually through its controller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use sy_core::{EngineError, EngineResult, Sample};

use crate::MidiInQueue;

/// The per-block upcall from the driver into the engine
pub trait DeviceCallback: Send + Sync {
    /// Process one audio block on the device thread
    fn device_process(&self, inputs: &[&[Sample]], outputs: &mut [&mut [Sample]], frames: u32);

    /// Asynchronous driver failure, surfaced as a host-callback error
    fn device_error(&self, _message: &str) {}
}

/// An open MIDI input device feeding the engine's staging queue
pub trait MidiInPort: Send {
    fn name(&self) -> &str;
    fn stop(&mut self);
}

/// An open MIDI output device
pub trait MidiOutPort: Send {
    fn name(&self) -> &str;

    /// Send raw MIDI bytes; `time` is the event offset within the current
    /// block, normalised to `[0.0, 1.0)`
    fn send(&mut self, data: &[u8], time: f64);

    fn stop(&mut self);
}

/// The capability an audio backend implements for the engine facade
pub trait Driver: Send {
    fn name(&self) -> &str;

    fn buffer_size(&self) -> u32;

    fn sample_rate(&self) -> f64;

    fn input_channel_names(&self) -> Vec<String>;

    fn output_channel_names(&self) -> Vec<String>;

    fn midi_in_devices(&self) -> Vec<String>;

    fn midi_out_devices(&self) -> Vec<String>;

    /// Start the device; the driver invokes `callback` once per block
    fn start(&mut self, callback: Arc<dyn DeviceCallback>) -> EngineResult<()>;

    fn stop(&mut self) -> EngineResult<()>;

    fn is_running(&self) -> bool;

    /// Open a MIDI input by device name; the port pushes incoming
    /// messages into `queue` from the driver's MIDI thread
    fn open_midi_in(
        &mut self,
        name: &str,
        queue: Arc<MidiInQueue>,
    ) -> EngineResult<Box<dyn MidiInPort>>;

    /// Open a MIDI output by device name
    fn open_midi_out(&mut self, name: &str) -> EngineResult<Box<dyn MidiOutPort>>;
}

// ═══════════════════════════════════════════════════════════════════════════════
// NULL DRIVER
// ═══════════════════════════════════════════════════════════════════════════════

struct NullDriverShared {
    callback: Mutex<Option<Arc<dyn DeviceCallback>>>,
    sent_midi: Mutex<Vec<(String, Vec<u8>, f64)>>,
    running: AtomicBool,
}

/// Handle for pumping blocks through a `NullDriver` after the driver has
/// been moved into the engine
#[derive(Clone)]
pub struct NullDriverController {
    shared: Arc<NullDriverShared>,
}

impl NullDriverController {
    /// Run one block through the registered device callback.
    ///
    /// Returns `false` when the driver has not been started.
    pub fn process_block(
        &self,
        inputs: &[&[Sample]],
        outputs: &mut [&mut [Sample]],
        frames: u32,
    ) -> bool {
        let callback = self.shared.callback.lock().clone();
        match callback {
            Some(callback) if self.shared.running.load(Ordering::Relaxed) => {
                callback.device_process(inputs, outputs, frames);
                true
            }
            _ => false,
        }
    }

    /// Raise a driver error on the engine
    pub fn emit_error(&self, message: &str) {
        if let Some(callback) = self.shared.callback.lock().clone() {
            callback.device_error(message);
        }
    }

    /// Everything sent to the driver's MIDI outputs: (port, bytes, time)
    pub fn sent_midi(&self) -> Vec<(String, Vec<u8>, f64)> {
        self.shared.sent_midi.lock().clone()
    }
}

/// Deviceless driver: fixed channel layout, manually pumped blocks
pub struct NullDriver {
    buffer_size: u32,
    sample_rate: f64,
    inputs: Vec<String>,
    outputs: Vec<String>,
    midi_ins: Vec<String>,
    midi_outs: Vec<String>,
    shared: Arc<NullDriverShared>,
}

impl NullDriver {
    pub fn new(buffer_size: u32, sample_rate: f64) -> Self {
        Self {
            buffer_size,
            sample_rate,
            inputs: vec!["capture_1".into(), "capture_2".into()],
            outputs: vec!["playback_1".into(), "playback_2".into()],
            midi_ins: Vec::new(),
            midi_outs: Vec::new(),
            shared: Arc::new(NullDriverShared {
                callback: Mutex::new(None),
                sent_midi: Mutex::new(Vec::new()),
                running: AtomicBool::new(false),
            }),
        }
    }

    pub fn with_channels(mut self, inputs: u32, outputs: u32) -> Self {
        self.inputs = (1..=inputs).map(|i| format!("capture_{i}")).collect();
        self.outputs = (1..=outputs).map(|i| format!("playback_{i}")).collect();
        self
    }

    pub fn with_midi_devices(mut self, ins: Vec<String>, outs: Vec<String>) -> Self {
        self.midi_ins = ins;
        self.midi_outs = outs;
        self
    }

    /// The pumping handle; grab it before handing the driver to the engine
    pub fn controller(&self) -> NullDriverController {
        NullDriverController {
            shared: self.shared.clone(),
        }
    }
}

impl Driver for NullDriver {
    fn name(&self) -> &str {
        "Null"
    }

    fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn input_channel_names(&self) -> Vec<String> {
        self.inputs.clone()
    }

    fn output_channel_names(&self) -> Vec<String> {
        self.outputs.clone()
    }

    fn midi_in_devices(&self) -> Vec<String> {
        self.midi_ins.clone()
    }

    fn midi_out_devices(&self) -> Vec<String> {
        self.midi_outs.clone()
    }

    fn start(&mut self, callback: Arc<dyn DeviceCallback>) -> EngineResult<()> {
        *self.shared.callback.lock() = Some(callback);
        self.shared.running.store(true, Ordering::Relaxed);
        log::info!("null driver started ({} Hz, {} frames)", self.sample_rate, self.buffer_size);
        Ok(())
    }

    fn stop(&mut self) -> EngineResult<()> {
        self.shared.running.store(false, Ordering::Relaxed);
        *self.shared.callback.lock() = None;
        log::info!("null driver stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::Relaxed)
    }

    fn open_midi_in(
        &mut self,
        name: &str,
        _queue: Arc<MidiInQueue>,
    ) -> EngineResult<Box<dyn MidiInPort>> {
        if !self.midi_ins.iter().any(|n| n == name) {
            return Err(EngineError::PortNotFound(name.to_string()));
        }
        Ok(Box::new(NullMidiInPort {
            name: name.to_string(),
        }))
    }

    fn open_midi_out(&mut self, name: &str) -> EngineResult<Box<dyn MidiOutPort>> {
        if !self.midi_outs.iter().any(|n| n == name) {
            return Err(EngineError::PortNotFound(name.to_string()));
        }
        Ok(Box::new(NullMidiOutPort {
            name: name.to_string(),
            shared: self.shared.clone(),
        }))
    }
}

struct NullMidiInPort {
    name: String,
}

impl MidiInPort for NullMidiInPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn stop(&mut self) {}
}

struct NullMidiOutPort {
    name: String,
    shared: Arc<NullDriverShared>,
}

impl MidiOutPort for NullMidiOutPort {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&mut self, data: &[u8], time: f64) {
        self.shared
            .sent_midi
            .lock()
            .push((self.name.clone(), data.to_vec(), time));
    }

    fn stop(&mut self) {}
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
