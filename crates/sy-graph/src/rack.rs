//! Rack graph
//!
//! The fixed, flat topology: two stereo host ports (audio in 1/2, audio
//! out 1/2), one MIDI-in and one MIDI-out endpoint. Hardware channels and
//! external MIDI ports connect to these host ports; plugins are processed
//! as a linear chain between the host inputs and outputs.
//!
//! The audio-side connection state lives behind one non-recursive mutex,
//! taken once per block by `process_helper`; everything it calls runs
//! under that guard. Control threads take the same mutex briefly on
//! connect/disconnect.

use std::sync::Arc;

use parking_lot::Mutex;

use sy_core::{
    Connection, ConnectionId, EngineError, EngineResult, EventBuffer, GroupId, HostCallback,
    PatchbayEvent, PortId, Sample,
};
use sy_plugin::PluginHandle;

use crate::{ConnectionRegistry, ProcessData};

/// Maps an external MIDI port name to its id within the MIDI groups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortNameToId {
    pub group: GroupId,
    pub port: PortId,
    /// Device-level short name
    pub name: String,
    /// Full patchbay name, e.g. `"MidiIn:MyDevice"`
    pub full_name: String,
}

/// Name tables for the external MIDI ports announced at refresh time
#[derive(Debug, Default)]
pub struct RackMidiPorts {
    pub ins: Vec<PortNameToId>,
    pub outs: Vec<PortNameToId>,
}

impl RackMidiPorts {
    pub fn get_name(&self, is_input: bool, port: PortId) -> Option<&str> {
        let list = if is_input { &self.ins } else { &self.outs };
        list.iter()
            .find(|p| p.port == port)
            .map(|p| p.name.as_str())
    }

    pub fn get_port_id(&self, is_input: bool, name: &str) -> Option<PortId> {
        let list = if is_input { &self.ins } else { &self.outs };
        list.iter().find(|p| p.name == name).map(|p| p.port)
    }

    pub fn clear(&mut self) {
        self.ins.clear();
        self.outs.clear();
    }
}

/// The capability through which the rack delegates MIDI endpoint routing
/// back to the engine facade
pub trait RackMidiRouter {
    fn connect_midi_in(&mut self, name: &str) -> bool;
    fn connect_midi_out(&mut self, name: &str) -> bool;
    fn disconnect_midi_in(&mut self, name: &str) -> bool;
    fn disconnect_midi_out(&mut self, name: &str) -> bool;
}

/// Chain scratch buffers, under the audio mutex
struct ChainScratch {
    in_tmp: [Vec<Sample>; 2],
    merge: EventBuffer,
}

/// Audio-side state: connection vectors and stereo scratch buffers
struct RackAudio {
    connected_in1: Vec<u32>,
    connected_in2: Vec<u32>,
    connected_out1: Vec<u32>,
    connected_out2: Vec<u32>,
    in_buf: [Vec<Sample>; 2],
    out_buf: [Vec<Sample>; 2],
    chain: ChainScratch,
}

impl RackAudio {
    fn new(buffer_size: usize) -> Self {
        Self {
            connected_in1: Vec::new(),
            connected_in2: Vec::new(),
            connected_out1: Vec::new(),
            connected_out2: Vec::new(),
            in_buf: [vec![0.0; buffer_size], vec![0.0; buffer_size]],
            out_buf: [vec![0.0; buffer_size], vec![0.0; buffer_size]],
            chain: ChainScratch {
                in_tmp: [vec![0.0; buffer_size], vec![0.0; buffer_size]],
                merge: EventBuffer::new(),
            },
        }
    }
}

/// The fixed six-port rack topology with its sequential plugin chain
pub struct RackGraph {
    pub connections: ConnectionRegistry,
    pub midi: RackMidiPorts,
    audio: Mutex<RackAudio>,
    inputs: u32,
    outputs: u32,
    offline: bool,
}

impl RackGraph {
    pub fn new(buffer_size: u32, inputs: u32, outputs: u32) -> Self {
        Self {
            connections: ConnectionRegistry::new(),
            midi: RackMidiPorts::default(),
            audio: Mutex::new(RackAudio::new(buffer_size as usize)),
            inputs,
            outputs,
            offline: false,
        }
    }

    #[inline]
    pub fn inputs(&self) -> u32 {
        self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> u32 {
        self.outputs
    }

    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
    }

    /// Rebuild scratch buffers for a new block size. The engine quiesces
    /// audio before calling this; new buffers are built first and swapped
    /// in whole.
    pub fn set_buffer_size(&mut self, buffer_size: u32) {
        let size = buffer_size as usize;
        let mut audio = self.audio.lock();
        audio.in_buf = [vec![0.0; size], vec![0.0; size]];
        audio.out_buf = [vec![0.0; size], vec![0.0; size]];
        audio.chain.in_tmp = [vec![0.0; size], vec![0.0; size]];
    }

    /// Snapshot of the audio connection vectors, for refresh
    pub fn audio_connections(&self) -> (Vec<u32>, Vec<u32>, Vec<u32>, Vec<u32>) {
        let audio = self.audio.lock();
        (
            audio.connected_in1.clone(),
            audio.connected_in2.clone(),
            audio.connected_out1.clone(),
            audio.connected_out2.clone(),
        )
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Connections
    // ───────────────────────────────────────────────────────────────────────────

    /// Split a connection into the Carla-side port and the external side
    fn split_endpoints(
        group_a: GroupId,
        port_a: PortId,
        group_b: GroupId,
        port_b: PortId,
    ) -> EngineResult<(PortId, GroupId, PortId)> {
        let (carla_port, other_group, other_port) = if group_a == GroupId::CARLA {
            if group_b == GroupId::CARLA {
                return Err(EngineError::InvalidArgument(
                    "both endpoints in group Carla".into(),
                ));
            }
            (port_a, group_b, port_b)
        } else {
            if group_b != GroupId::CARLA {
                return Err(EngineError::InvalidArgument(
                    "no endpoint in group Carla".into(),
                ));
            }
            (port_b, group_a, port_a)
        };

        if !carla_port.is_rack_carla_port() {
            return Err(EngineError::InvalidArgument(format!(
                "invalid Carla port id {}",
                carla_port.0
            )));
        }
        if !other_group.is_rack_external() {
            return Err(EngineError::InvalidArgument(format!(
                "invalid rack group id {}",
                other_group.0
            )));
        }
        Ok((carla_port, other_group, other_port))
    }

    fn check_channel_range(port: PortId, count: u32) -> EngineResult<u32> {
        let id = port.0;
        if id == 0 || id > count {
            return Err(EngineError::InvalidArgument(format!(
                "channel {id} out of range (1..={count})"
            )));
        }
        Ok(id)
    }

    /// Connect one Carla port to an external endpoint.
    ///
    /// MIDI endpoints are routed through the engine facade; audio
    /// endpoints are appended to the per-port connection vectors.
    pub fn connect(
        &mut self,
        router: &mut dyn RackMidiRouter,
        callback: &dyn HostCallback,
        group_a: GroupId,
        port_a: PortId,
        group_b: GroupId,
        port_b: PortId,
    ) -> EngineResult<ConnectionId> {
        let (carla_port, other_group, other_port) =
            Self::split_endpoints(group_a, port_a, group_b, port_b)?;

        let made = match carla_port {
            PortId::RACK_AUDIO_IN1 | PortId::RACK_AUDIO_IN2 => {
                if other_group != GroupId::AUDIO_IN {
                    return Err(EngineError::InvalidArgument(
                        "audio-in port requires the AudioIn group".into(),
                    ));
                }
                let channel = Self::check_channel_range(other_port, self.inputs)?;
                let mut audio = self.audio.lock();
                let list = if carla_port == PortId::RACK_AUDIO_IN1 {
                    &mut audio.connected_in1
                } else {
                    &mut audio.connected_in2
                };
                if list.contains(&channel) {
                    false
                } else {
                    list.push(channel);
                    true
                }
            }
            PortId::RACK_AUDIO_OUT1 | PortId::RACK_AUDIO_OUT2 => {
                if other_group != GroupId::AUDIO_OUT {
                    return Err(EngineError::InvalidArgument(
                        "audio-out port requires the AudioOut group".into(),
                    ));
                }
                let channel = Self::check_channel_range(other_port, self.outputs)?;
                let mut audio = self.audio.lock();
                let list = if carla_port == PortId::RACK_AUDIO_OUT1 {
                    &mut audio.connected_out1
                } else {
                    &mut audio.connected_out2
                };
                if list.contains(&channel) {
                    false
                } else {
                    list.push(channel);
                    true
                }
            }
            PortId::RACK_MIDI_IN => {
                if other_group != GroupId::MIDI_IN {
                    return Err(EngineError::InvalidArgument(
                        "midi-in port requires the MidiIn group".into(),
                    ));
                }
                match self.midi.get_name(true, other_port) {
                    Some(name) => {
                        let name = name.to_string();
                        router.connect_midi_in(&name)
                    }
                    None => false,
                }
            }
            _ => {
                if other_group != GroupId::MIDI_OUT {
                    return Err(EngineError::InvalidArgument(
                        "midi-out port requires the MidiOut group".into(),
                    ));
                }
                match self.midi.get_name(false, other_port) {
                    Some(name) => {
                        let name = name.to_string();
                        router.connect_midi_out(&name)
                    }
                    None => false,
                }
            }
        };

        if !made {
            return Err(EngineError::InvalidRackConnection);
        }

        let id = self.connections.next_id();
        let connection = Connection::new(id, group_a, port_a, group_b, port_b);
        callback.on_event(PatchbayEvent::ConnectionAdded {
            id,
            payload: connection.payload(),
        });
        self.connections.add(connection);
        Ok(id)
    }

    /// Undo a connection by id
    pub fn disconnect(
        &mut self,
        router: &mut dyn RackMidiRouter,
        callback: &dyn HostCallback,
        id: ConnectionId,
    ) -> EngineResult<()> {
        let connection = *self
            .connections
            .find(id)
            .ok_or(EngineError::ConnectionNotFound)?;

        let (carla_port, _other_group, other_port) = Self::split_endpoints(
            connection.group_a,
            connection.port_a,
            connection.group_b,
            connection.port_b,
        )?;

        let undone = match carla_port {
            PortId::RACK_AUDIO_IN1 | PortId::RACK_AUDIO_IN2 => {
                let mut audio = self.audio.lock();
                let list = if carla_port == PortId::RACK_AUDIO_IN1 {
                    &mut audio.connected_in1
                } else {
                    &mut audio.connected_in2
                };
                match list.iter().position(|&p| p == other_port.0) {
                    Some(pos) => {
                        list.remove(pos);
                        true
                    }
                    None => false,
                }
            }
            PortId::RACK_AUDIO_OUT1 | PortId::RACK_AUDIO_OUT2 => {
                let mut audio = self.audio.lock();
                let list = if carla_port == PortId::RACK_AUDIO_OUT1 {
                    &mut audio.connected_out1
                } else {
                    &mut audio.connected_out2
                };
                match list.iter().position(|&p| p == other_port.0) {
                    Some(pos) => {
                        list.remove(pos);
                        true
                    }
                    None => false,
                }
            }
            PortId::RACK_MIDI_IN => match self.midi.get_name(true, other_port) {
                Some(name) => {
                    let name = name.to_string();
                    router.disconnect_midi_in(&name)
                }
                None => false,
            },
            _ => match self.midi.get_name(false, other_port) {
                Some(name) => {
                    let name = name.to_string();
                    router.disconnect_midi_out(&name)
                }
                None => false,
            },
        };

        if !undone {
            return Err(EngineError::InvalidRackConnection);
        }

        callback.on_event(PatchbayEvent::ConnectionRemoved { id });
        self.connections.remove(id);
        Ok(())
    }

    /// Drop every connection and name table
    pub fn clear_connections(&mut self) {
        self.connections.clear();
        let mut audio = self.audio.lock();
        audio.connected_in1.clear();
        audio.connected_in2.clear();
        audio.connected_out1.clear();
        audio.connected_out2.clear();
        drop(audio);
        self.midi.clear();
    }

    /// Active connections as `[src, dst, src, dst, ...]` full-name pairs
    pub fn get_connections(&self) -> Vec<String> {
        let mut list = Vec::with_capacity(self.connections.len() * 2);

        for connection in self.connections.iter() {
            let Ok((carla_port, _other_group, other_port)) = Self::split_endpoints(
                connection.group_a,
                connection.port_a,
                connection.group_b,
                connection.port_b,
            ) else {
                continue;
            };
            let Some(carla_name) = carla_port_full_name(carla_port) else {
                continue;
            };

            match carla_port {
                PortId::RACK_AUDIO_IN1 | PortId::RACK_AUDIO_IN2 => {
                    list.push(format!("AudioIn:{}", other_port.0));
                    list.push(carla_name.to_string());
                }
                PortId::RACK_AUDIO_OUT1 | PortId::RACK_AUDIO_OUT2 => {
                    list.push(carla_name.to_string());
                    list.push(format!("AudioOut:{}", other_port.0));
                }
                PortId::RACK_MIDI_IN => {
                    let Some(name) = self.midi.get_name(true, other_port) else {
                        continue;
                    };
                    list.push(format!("MidiIn:{name}"));
                    list.push(carla_name.to_string());
                }
                _ => {
                    let Some(name) = self.midi.get_name(false, other_port) else {
                        continue;
                    };
                    list.push(carla_name.to_string());
                    list.push(format!("MidiOut:{name}"));
                }
            }
        }

        list
    }

    /// Decode a full port name; exact inverse of the announced naming
    pub fn get_group_and_port_id_from_full_name(&self, full_name: &str) -> Option<(GroupId, PortId)> {
        if full_name.is_empty() {
            return None;
        }

        if let Some(short) = full_name.strip_prefix("Carla:") {
            let port = carla_port_id_from_name(short)?;
            return Some((GroupId::CARLA, port));
        }
        if let Some(num) = full_name.strip_prefix("AudioIn:") {
            let channel: u32 = num.parse().ok().filter(|&n| n > 0)?;
            return Some((GroupId::AUDIO_IN, PortId(channel)));
        }
        if let Some(num) = full_name.strip_prefix("AudioOut:") {
            let channel: u32 = num.parse().ok().filter(|&n| n > 0)?;
            return Some((GroupId::AUDIO_OUT, PortId(channel)));
        }
        if let Some(name) = full_name.strip_prefix("MidiIn:") {
            let port = self.midi.get_port_id(true, name)?;
            return Some((GroupId::MIDI_IN, port));
        }
        if let Some(name) = full_name.strip_prefix("MidiOut:") {
            let port = self.midi.get_port_id(false, name)?;
            return Some((GroupId::MIDI_OUT, port));
        }

        None
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Processing
    // ───────────────────────────────────────────────────────────────────────────

    /// Process the plugin chain on caller-provided stereo buffers.
    ///
    /// `process_helper` is the audio-callback entry point; this one exists
    /// for drivers that hand the host stereo pair directly.
    pub fn process(
        &mut self,
        data: &mut ProcessData,
        plugins: &[Arc<PluginHandle>],
        in_real: &[Vec<Sample>],
        out: &mut [Vec<Sample>],
        frames: u32,
    ) {
        let offline = self.offline;
        let mut audio = self.audio.lock();
        Self::process_chain(data, plugins, &mut audio.chain, in_real, out, offline, frames);
    }

    /// Audio-callback entry point: distribute device inputs onto the host
    /// stereo pair, run the chain, distribute the result onto the device
    /// outputs with additive summing.
    pub fn process_helper(
        &mut self,
        data: &mut ProcessData,
        plugins: &[Arc<PluginHandle>],
        dev_ins: &[&[Sample]],
        dev_outs: &mut [&mut [Sample]],
        frames: u32,
    ) {
        let inputs = self.inputs;
        let offline = self.offline;
        let frames_us = frames as usize;

        let mut audio = self.audio.lock();
        let RackAudio {
            connected_in1,
            connected_in2,
            connected_out1,
            connected_out2,
            in_buf,
            out_buf,
            chain,
        } = &mut *audio;

        // distribute device inputs: first connected source copies,
        // the rest add; unconnected channels are silenced
        if !dev_ins.is_empty() && inputs > 0 {
            let lists = [&*connected_in1, &*connected_in2];
            for (c, list) in lists.iter().enumerate() {
                let dst = &mut in_buf[c];
                let mut first = true;
                for &port in list.iter() {
                    debug_assert!(port >= 1 && port <= inputs);
                    let Some(src) = dev_ins.get((port - 1) as usize) else {
                        continue;
                    };
                    let n = frames_us.min(src.len());
                    if first {
                        dst[..n].copy_from_slice(&src[..n]);
                        first = false;
                    } else {
                        for (d, s) in dst[..n].iter_mut().zip(&src[..n]) {
                            *d += *s;
                        }
                    }
                }
                if first {
                    dst[..frames_us].fill(0.0);
                }
            }
        } else {
            in_buf[0][..frames_us].fill(0.0);
            in_buf[1][..frames_us].fill(0.0);
        }

        out_buf[0][..frames_us].fill(0.0);
        out_buf[1][..frames_us].fill(0.0);

        Self::process_chain(data, plugins, chain, &in_buf[..], &mut out_buf[..], offline, frames);

        // distribute the host stereo output onto device channels
        let lists = [&*connected_out1, &*connected_out2];
        for (c, list) in lists.iter().enumerate() {
            for &port in list.iter() {
                let Some(dst) = dev_outs.get_mut((port - 1) as usize) else {
                    continue;
                };
                let n = frames_us.min(dst.len());
                for (d, s) in dst[..n].iter_mut().zip(&out_buf[c][..n]) {
                    *d += *s;
                }
            }
        }
    }

    /// The chain processor. Runs under the audio mutex.
    fn process_chain(
        data: &mut ProcessData,
        plugins: &[Arc<PluginHandle>],
        chain: &mut ChainScratch,
        in_real: &[Vec<Sample>],
        out: &mut [Vec<Sample>],
        offline: bool,
        frames: u32,
    ) {
        if in_real.len() < 2 || out.len() < 2 {
            return;
        }
        let frames_us = frames as usize;

        // stage audio inputs into the working copy
        chain.in_tmp[0][..frames_us].copy_from_slice(&in_real[0][..frames_us]);
        chain.in_tmp[1][..frames_us].copy_from_slice(&in_real[1][..frames_us]);

        out[0][..frames_us].fill(0.0);
        out[1][..frames_us].fill(0.0);
        data.events_out.clear();

        let mut processed = false;
        let mut old_audio_in = 0u32;
        let mut old_midi_out = false;

        for handle in plugins {
            if !handle.is_enabled() {
                continue;
            }
            let Some(mut proc) = handle.try_lock(offline) else {
                continue;
            };

            if processed {
                // previous plugin's audio output feeds this one
                chain.in_tmp[0][..frames_us].copy_from_slice(&out[0][..frames_us]);
                chain.in_tmp[1][..frames_us].copy_from_slice(&out[1][..frames_us]);
                out[0][..frames_us].fill(0.0);
                out[1][..frames_us].fill(0.0);

                if !old_midi_out && !data.events_in.is_empty() {
                    if !data.events_out.is_empty() {
                        // merge engine input with the chain stream, by
                        // timestamp, chain events first on ties
                        chain.merge.fill_merged(data.events_out, data.events_in);
                        data.events_in.copy_from(&chain.merge);
                        data.events_out.clear();
                    }
                    // else: engine input events stay as they are
                } else {
                    data.events_in.copy_from(data.events_out);
                    data.events_out.clear();
                }
            }

            old_audio_in = handle.audio_in_count();
            old_midi_out = handle.produces_midi();

            proc.init_buffers();
            proc.process(
                &chain.in_tmp[..],
                out,
                data.events_in.events(),
                data.events_out,
                frames,
            );
            drop(proc);

            // a plugin without audio inputs produced output independent of
            // the chain signal: keep the upstream signal by summing it in
            if old_audio_in == 0 {
                for (o, i) in out[0][..frames_us].iter_mut().zip(&chain.in_tmp[0][..frames_us]) {
                    *o += *i;
                }
                for (o, i) in out[1][..frames_us].iter_mut().zip(&chain.in_tmp[1][..frames_us]) {
                    *o += *i;
                }
            }

            let ins = if old_audio_in > 0 {
                [
                    abs_peak(&chain.in_tmp[0][..frames_us]),
                    abs_peak(&chain.in_tmp[1][..frames_us]),
                ]
            } else {
                [0.0, 0.0]
            };
            let outs = if handle.audio_out_count() > 0 {
                [abs_peak(&out[0][..frames_us]), abs_peak(&out[1][..frames_us])]
            } else {
                [0.0, 0.0]
            };
            handle.set_peaks(ins, outs);

            processed = true;
        }

        // nothing in the chain ran: the host stereo pair passes through
        if !processed {
            out[0][..frames_us].copy_from_slice(&chain.in_tmp[0][..frames_us]);
            out[1][..frames_us].copy_from_slice(&chain.in_tmp[1][..frames_us]);
        }
    }
}

#[inline]
fn abs_peak(buf: &[Sample]) -> f32 {
    buf.iter().fold(0.0f32, |peak, &s| peak.max(s.abs()))
}

/// Full name of a Carla rack port
pub fn carla_port_full_name(port: PortId) -> Option<&'static str> {
    match port {
        PortId::RACK_AUDIO_IN1 => Some("Carla:AudioIn1"),
        PortId::RACK_AUDIO_IN2 => Some("Carla:AudioIn2"),
        PortId::RACK_AUDIO_OUT1 => Some("Carla:AudioOut1"),
        PortId::RACK_AUDIO_OUT2 => Some("Carla:AudioOut2"),
        PortId::RACK_MIDI_IN => Some("Carla:MidiIn"),
        PortId::RACK_MIDI_OUT => Some("Carla:MidiOut"),
        _ => None,
    }
}

/// Decode the short name of a Carla rack port
pub fn carla_port_id_from_name(short_name: &str) -> Option<PortId> {
    match short_name {
        "AudioIn1" | "audio-in1" => Some(PortId::RACK_AUDIO_IN1),
        "AudioIn2" | "audio-in2" => Some(PortId::RACK_AUDIO_IN2),
        "AudioOut1" | "audio-out1" => Some(PortId::RACK_AUDIO_OUT1),
        "AudioOut2" | "audio-out2" => Some(PortId::RACK_AUDIO_OUT2),
        "MidiIn" | "midi-in" => Some(PortId::RACK_MIDI_IN),
        "MidiOut" | "midi-out" => Some(PortId::RACK_MIDI_OUT),
        _ => None,
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
