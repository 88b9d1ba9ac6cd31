//! End-to-End Rack Engine Integration Tests
//!
//! Tests the complete rack pipeline:
//! - Device-to-device passthrough wiring
//! - Plugin chain processing
//! - Input summing
//! - MIDI timestamp normalisation
//! - MIDI output emission
//! - Connection id monotonicity

use std::sync::Arc;

use parking_lot::Mutex;

use sy_core::{EngineEvent, EventBuffer, NullCallback, Sample};
use sy_engine::{Engine, EngineSettings, NullDriver, NullDriverController, ProcessMode};
use sy_plugin::{GainProcessor, MidiThroughProcessor, PluginProcessor};

const SAMPLE_RATE: f64 = 48_000.0;
const BLOCK_SIZE: u32 = 1024;

fn sine(amplitude: f32, frames: usize) -> Vec<Sample> {
    (0..frames)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            ((std::f64::consts::TAU * 1000.0 * t).sin() as f32) * amplitude
        })
        .collect()
}

fn rack_engine() -> (Engine, NullDriverController) {
    let driver = NullDriver::new(BLOCK_SIZE, SAMPLE_RATE)
        .with_midi_devices(vec!["KeyStation".into()], vec!["SynthBox".into()]);
    let controller = driver.controller();
    let mut engine = Engine::new(
        EngineSettings {
            process_mode: ProcessMode::Rack,
            ..Default::default()
        },
        Box::new(driver),
        Arc::new(NullCallback),
    );
    engine.init("switchyard-test").unwrap();
    (engine, controller)
}

fn pump_stereo(
    controller: &NullDriverController,
    in_l: &[Sample],
    in_r: &[Sample],
) -> (Vec<Sample>, Vec<Sample>) {
    let mut out_l = vec![0.0; BLOCK_SIZE as usize];
    let mut out_r = vec![0.0; BLOCK_SIZE as usize];
    {
        let inputs: Vec<&[Sample]> = vec![in_l, in_r];
        let mut outputs: Vec<&mut [Sample]> = vec![&mut out_l, &mut out_r];
        assert!(controller.process_block(&inputs, &mut outputs, BLOCK_SIZE));
    }
    (out_l, out_r)
}

// ═══════════════════════════════════════════════════════════════════════════════
// AUDIO SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_passthrough_is_bit_identical() {
    let (mut engine, controller) = rack_engine();

    engine
        .restore_patchbay_connection("AudioIn:1", "Carla:AudioIn1")
        .unwrap();
    engine
        .restore_patchbay_connection("Carla:AudioOut1", "AudioOut:1")
        .unwrap();

    let signal = sine(0.5, BLOCK_SIZE as usize);
    let silence = vec![0.0; BLOCK_SIZE as usize];
    let (out_l, out_r) = pump_stereo(&controller, &signal, &silence);

    assert_eq!(out_l, signal);
    assert!(out_r.iter().all(|&s| s == 0.0));
}

#[test]
fn test_gain_plugin_doubles_signal() {
    let (mut engine, controller) = rack_engine();

    engine
        .restore_patchbay_connection("AudioIn:1", "Carla:AudioIn1")
        .unwrap();
    engine
        .restore_patchbay_connection("Carla:AudioOut1", "AudioOut:1")
        .unwrap();
    engine
        .add_plugin(Box::new(GainProcessor::new(2, 2.0)))
        .unwrap();

    let signal = sine(0.25, BLOCK_SIZE as usize);
    let silence = vec![0.0; BLOCK_SIZE as usize];
    let (out_l, _) = pump_stereo(&controller, &signal, &silence);

    for (o, i) in out_l.iter().zip(&signal) {
        assert!((o - i * 2.0).abs() < 1e-6);
    }
}

#[test]
fn test_two_device_inputs_sum_onto_one_host_input() {
    let (mut engine, controller) = rack_engine();

    engine
        .restore_patchbay_connection("AudioIn:1", "Carla:AudioIn1")
        .unwrap();
    engine
        .restore_patchbay_connection("AudioIn:2", "Carla:AudioIn1")
        .unwrap();
    engine
        .restore_patchbay_connection("Carla:AudioOut1", "AudioOut:1")
        .unwrap();

    let signal = sine(0.3, BLOCK_SIZE as usize);
    let (out_l, _) = pump_stereo(&controller, &signal, &signal);

    for (o, i) in out_l.iter().zip(&signal) {
        assert!((o - i * 2.0).abs() < 1e-6, "expected summed 0.6 signal");
    }
}

#[test]
fn test_connection_round_trip_leaves_no_connections() {
    let (mut engine, _controller) = rack_engine();

    let a = engine
        .restore_patchbay_connection("AudioIn:1", "Carla:AudioIn1")
        .unwrap();
    let b = engine
        .restore_patchbay_connection("Carla:AudioOut1", "AudioOut:1")
        .unwrap();
    let c = engine
        .restore_patchbay_connection("AudioIn:2", "Carla:AudioIn2")
        .unwrap();
    assert_eq!(engine.get_patchbay_connections().len(), 6);

    // disconnect in arbitrary order
    engine.patchbay_disconnect(b).unwrap();
    engine.patchbay_disconnect(a).unwrap();
    engine.patchbay_disconnect(c).unwrap();
    assert!(engine.get_patchbay_connections().is_empty());
}

#[test]
fn test_reconnect_gets_strictly_greater_id() {
    let (mut engine, _controller) = rack_engine();

    let first = engine
        .restore_patchbay_connection("AudioIn:1", "Carla:AudioIn1")
        .unwrap();
    engine.patchbay_disconnect(first).unwrap();
    let second = engine
        .restore_patchbay_connection("AudioIn:1", "Carla:AudioIn1")
        .unwrap();

    assert!(second > first);
}

// ═══════════════════════════════════════════════════════════════════════════════
// MIDI SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════════

/// Chain plugin capturing the event-in timestamps of each block
struct EventTimeProbe(Arc<Mutex<Vec<u32>>>);

impl PluginProcessor for EventTimeProbe {
    fn name(&self) -> &str {
        "EventTimeProbe"
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

    fn process(
        &mut self,
        _inputs: &[Vec<Sample>],
        _outputs: &mut [Vec<Sample>],
        events_in: &[EngineEvent],
        _events_out: &mut EventBuffer,
        _frames: u32,
    ) {
        self.0.lock().extend(events_in.iter().map(|e| e.time));
    }
}

#[test]
fn test_midi_timestamps_normalise_and_clamp() {
    let (mut engine, controller) = rack_engine();

    let seen = Arc::new(Mutex::new(Vec::new()));
    engine
        .add_plugin(Box::new(EventTimeProbe(seen.clone())))
        .unwrap();

    let queue = engine.midi_in_queue();
    // last frame of the first block
    queue.push_at(BLOCK_SIZE as u64 - 1, &[0x90, 60, 100]);
    // beyond the block: clamps to the last frame, with a warning logged
    queue.push_at(BLOCK_SIZE as u64 + 10, &[0x90, 61, 100]);

    let silence = vec![0.0; BLOCK_SIZE as usize];
    pump_stereo(&controller, &silence, &silence);

    assert_eq!(*seen.lock(), vec![BLOCK_SIZE - 1, BLOCK_SIZE - 1]);
}

#[test]
fn test_midi_events_reach_connected_output_device() {
    let (mut engine, controller) = rack_engine();

    // route engine events through the chain and out to the device
    engine
        .add_plugin(Box::new(MidiThroughProcessor))
        .unwrap();
    engine
        .restore_patchbay_connection("Carla:MidiOut", "MidiOut:SynthBox")
        .unwrap();

    let queue = engine.midi_in_queue();
    queue.push_at(256, &[0x90, 64, 100]);

    let silence = vec![0.0; BLOCK_SIZE as usize];
    pump_stereo(&controller, &silence, &silence);

    let sent = controller.sent_midi();
    assert_eq!(sent.len(), 1);
    let (port, bytes, time) = &sent[0];
    assert_eq!(port, "SynthBox");
    assert_eq!(bytes, &vec![0x90, 64, 100]);
    assert!((time - 256.0 / BLOCK_SIZE as f64).abs() < 1e-9);
}

#[test]
fn test_midi_in_device_connect_and_disconnect() {
    let (mut engine, _controller) = rack_engine();

    let id = engine
        .restore_patchbay_connection("MidiIn:KeyStation", "Carla:MidiIn")
        .unwrap();
    let connections = engine.get_patchbay_connections();
    assert_eq!(
        connections,
        vec!["MidiIn:KeyStation".to_string(), "Carla:MidiIn".to_string()]
    );

    engine.patchbay_disconnect(id).unwrap();
    assert!(engine.get_patchbay_connections().is_empty());

    // unknown device name fails to decode
    assert!(engine
        .restore_patchbay_connection("MidiIn:Missing", "Carla:MidiIn")
        .is_err());
}

#[test]
fn test_blocks_advance_frame_counter() {
    let (engine, controller) = rack_engine();

    let silence = vec![0.0; BLOCK_SIZE as usize];
    pump_stereo(&controller, &silence, &silence);
    pump_stereo(&controller, &silence, &silence);

    assert_eq!(engine.rt().frame(), 2 * BLOCK_SIZE as u64);
}
