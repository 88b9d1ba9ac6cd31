//! Engine facade
//!
//! Owns the active graph (rack or patchbay, never both), the external
//! MIDI port adapters, and the event staging. The driver upcalls into the
//! shared `EngineRt` once per block; control threads drive the patchbay
//! API through `Engine`.
//!
//! Realtime discipline: the device callback only ever try-locks. A
//! contended block degrades to silence (DSP state) or a deferred MIDI
//! drain (staging queue); it never waits.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use sy_core::{
    ClientIcon, ConnectionId, EngineError, EngineEventKind, EngineResult, EventBuffer, GroupId,
    HostCallback, PatchbayEvent, PortId, Sample, PORT_IS_INPUT, PORT_TYPE_AUDIO, PORT_TYPE_MIDI,
};
use sy_graph::{
    PatchbayGraph, PortNameToId, ProcessData, RackGraph, RackMidiRouter,
};
use sy_plugin::{PluginHandle, PluginProcessor};

use crate::{
    DeviceCallback, Driver, EngineSettings, MidiInPort, MidiInQueue, MidiOutPort, ProcessMode,
};

/// The active topology
enum EngineGraph {
    Rack(RackGraph),
    Patchbay(PatchbayGraph),
}

/// Everything the audio thread touches, behind one try-lock
struct DspState {
    graph: Option<EngineGraph>,
    plugins: Vec<Arc<PluginHandle>>,
    events_in: EventBuffer,
    events_out: EventBuffer,
}

/// State shared between the facade and the device callback
pub struct EngineRt {
    is_ready: AtomicBool,
    frame: AtomicU64,
    buffer_size: AtomicU32,
    dsp: Mutex<DspState>,
    midi_in: Arc<MidiInQueue>,
    midi_outs: Mutex<Vec<Box<dyn MidiOutPort>>>,
    host: Arc<dyn HostCallback>,
}

impl EngineRt {
    /// Blocks processed so far, in samples
    pub fn frame(&self) -> u64 {
        self.frame.load(Ordering::Relaxed)
    }

    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::Acquire)
    }
}

impl DeviceCallback for EngineRt {
    fn device_process(&self, inputs: &[&[Sample]], outputs: &mut [&mut [Sample]], frames: u32) {
        for out in outputs.iter_mut() {
            out.fill(0.0);
        }

        if !self.is_ready.load(Ordering::Acquire) {
            return;
        }
        let expected = self.buffer_size.load(Ordering::Relaxed);
        if frames != expected {
            debug_assert_eq!(frames, expected, "driver block size mismatch");
            return;
        }

        let frame_base = self.frame.load(Ordering::Relaxed);
        self.midi_in.set_now(frame_base);

        // contended means a control thread is restructuring: silence
        let Some(mut dsp) = self.dsp.try_lock() else {
            return;
        };
        let DspState {
            graph,
            plugins,
            events_in,
            events_out,
        } = &mut *dsp;

        events_in.clear();
        events_out.clear();
        self.midi_in.drain_into(events_in, frame_base, frames);

        {
            let mut data = ProcessData {
                events_in: &mut *events_in,
                events_out: &mut *events_out,
            };
            match graph.as_mut() {
                Some(EngineGraph::Rack(rack)) => {
                    rack.process_helper(&mut data, plugins, inputs, outputs, frames)
                }
                Some(EngineGraph::Patchbay(patchbay)) => {
                    patchbay.process(&mut data, inputs, outputs, frames)
                }
                None => {}
            }
        }

        // emit the block's output events to every connected MIDI output
        let mut outs = self.midi_outs.lock();
        if !outs.is_empty() {
            for event in events_out.iter() {
                let mut ctrl_buf = [0u8; 3];
                let bytes: &[u8] = match &event.kind {
                    EngineEventKind::Control(ctrl) => {
                        let size = ctrl.convert_to_midi_data(event.channel, &mut ctrl_buf);
                        if size == 0 {
                            continue;
                        }
                        &ctrl_buf[..size as usize]
                    }
                    EngineEventKind::Midi(midi) => midi.bytes(),
                    EngineEventKind::Null => continue,
                };
                let time = event.time as f64 / frames as f64;
                for port in outs.iter_mut() {
                    port.send(bytes, time);
                }
            }
        }
        drop(outs);

        self.frame.fetch_add(frames as u64, Ordering::Relaxed);
    }

    fn device_error(&self, message: &str) {
        log::error!("driver error: {message}");
        self.host.on_event(PatchbayEvent::Error {
            message: message.to_string(),
        });
    }
}

/// Routes rack MIDI endpoint changes onto the driver's device ports
struct EngineRackRouter<'a> {
    driver: &'a mut dyn Driver,
    midi_ins: &'a mut Vec<Box<dyn MidiInPort>>,
    midi_outs: &'a Mutex<Vec<Box<dyn MidiOutPort>>>,
    queue: Arc<MidiInQueue>,
}

impl RackMidiRouter for EngineRackRouter<'_> {
    fn connect_midi_in(&mut self, name: &str) -> bool {
        if self.midi_ins.iter().any(|p| p.name() == name) {
            return false;
        }
        if !self.driver.midi_in_devices().iter().any(|n| n == name) {
            return false;
        }
        match self.driver.open_midi_in(name, self.queue.clone()) {
            Ok(port) => {
                self.midi_ins.push(port);
                true
            }
            Err(err) => {
                log::error!("failed to open MIDI input '{name}': {err}");
                false
            }
        }
    }

    fn connect_midi_out(&mut self, name: &str) -> bool {
        let mut outs = self.midi_outs.lock();
        if outs.iter().any(|p| p.name() == name) {
            return false;
        }
        if !self.driver.midi_out_devices().iter().any(|n| n == name) {
            return false;
        }
        match self.driver.open_midi_out(name) {
            Ok(port) => {
                outs.push(port);
                true
            }
            Err(err) => {
                log::error!("failed to open MIDI output '{name}': {err}");
                false
            }
        }
    }

    fn disconnect_midi_in(&mut self, name: &str) -> bool {
        let Some(pos) = self.midi_ins.iter().position(|p| p.name() == name) else {
            return false;
        };
        let mut port = self.midi_ins.remove(pos);
        port.stop();
        true
    }

    fn disconnect_midi_out(&mut self, name: &str) -> bool {
        let mut outs = self.midi_outs.lock();
        let Some(pos) = outs.iter().position(|p| p.name() == name) else {
            return false;
        };
        let mut port = outs.remove(pos);
        port.stop();
        true
    }
}

/// The engine facade
pub struct Engine {
    settings: EngineSettings,
    client_name: String,
    driver: Box<dyn Driver>,
    rt: Arc<EngineRt>,
    host: Arc<dyn HostCallback>,
    midi_ins: Vec<Box<dyn MidiInPort>>,
    last_error: Mutex<String>,
    running: bool,
    offline: bool,
}

impl Engine {
    pub fn new(settings: EngineSettings, driver: Box<dyn Driver>, host: Arc<dyn HostCallback>) -> Self {
        let rt = Arc::new(EngineRt {
            is_ready: AtomicBool::new(false),
            frame: AtomicU64::new(0),
            buffer_size: AtomicU32::new(driver.buffer_size()),
            dsp: Mutex::new(DspState {
                graph: None,
                plugins: Vec::new(),
                events_in: EventBuffer::new(),
                events_out: EventBuffer::new(),
            }),
            midi_in: Arc::new(MidiInQueue::new()),
            midi_outs: Mutex::new(Vec::new()),
            host: host.clone(),
        });

        Self {
            settings,
            client_name: String::new(),
            driver,
            rt,
            host,
            midi_ins: Vec::new(),
            last_error: Mutex::new(String::new()),
            running: false,
            offline: false,
        }
    }

    fn record<T>(&self, result: EngineResult<T>) -> EngineResult<T> {
        if let Err(err) = &result {
            *self.last_error.lock() = err.to_string();
        }
        result
    }

    /// Text of the most recent per-call failure
    pub fn last_error(&self) -> String {
        self.last_error.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    pub fn current_driver_name(&self) -> &str {
        self.driver.name()
    }

    pub fn process_mode(&self) -> ProcessMode {
        self.settings.process_mode
    }

    /// Shared state handle; the driver holds a clone as its callback
    pub fn rt(&self) -> Arc<EngineRt> {
        self.rt.clone()
    }

    /// The MIDI-in staging queue driver ports feed
    pub fn midi_in_queue(&self) -> Arc<MidiInQueue> {
        self.rt.midi_in.clone()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ───────────────────────────────────────────────────────────────────────────

    /// Create the graph, start the driver, publish the initial topology
    pub fn init(&mut self, client_name: &str) -> EngineResult<()> {
        if client_name.is_empty() {
            return self.record(Err(EngineError::InvalidArgument(
                "empty client name".into(),
            )));
        }
        if self.running {
            return self.record(Err(EngineError::InvalidArgument(
                "engine already running".into(),
            )));
        }

        let buffer_size = self.driver.buffer_size();
        let sample_rate = self.driver.sample_rate();
        let inputs = self.driver.input_channel_names().len() as u32;
        let outputs = self.driver.output_channel_names().len() as u32;

        if buffer_size != self.settings.buffer_size.as_u32() {
            log::debug!(
                "driver buffer size {buffer_size} overrides preference {}",
                self.settings.buffer_size.as_u32()
            );
        }
        if sample_rate != self.settings.sample_rate.as_f64() {
            log::debug!(
                "driver sample rate {sample_rate} overrides preference {}",
                self.settings.sample_rate.as_f64()
            );
        }

        log::info!(
            "engine init '{client_name}': {} driver, {sample_rate} Hz, {buffer_size} frames, {inputs} in / {outputs} out",
            self.driver.name()
        );

        let graph = match self.settings.process_mode {
            ProcessMode::Rack => EngineGraph::Rack(RackGraph::new(buffer_size, inputs, outputs)),
            ProcessMode::Patchbay => EngineGraph::Patchbay(PatchbayGraph::new(
                sample_rate,
                buffer_size,
                inputs,
                outputs,
            )),
        };

        {
            let mut dsp = self.rt.dsp.lock();
            dsp.graph = Some(graph);
            dsp.plugins.clear();
        }
        self.rt.buffer_size.store(buffer_size, Ordering::Relaxed);
        self.rt.frame.store(0, Ordering::Relaxed);
        self.client_name = client_name.to_string();

        if let Err(err) = self.driver.start(self.rt.clone()) {
            self.rt.dsp.lock().graph = None;
            self.host.on_event(PatchbayEvent::Error {
                message: err.to_string(),
            });
            return self.record(Err(err));
        }

        self.rt.is_ready.store(true, Ordering::Release);
        self.running = true;

        self.patchbay_refresh(false)?;

        self.host.on_event(PatchbayEvent::EngineStarted {
            driver: self.driver.name().to_string(),
        });
        Ok(())
    }

    /// Stop the driver, tear the graph down, release MIDI ports
    pub fn close(&mut self) -> EngineResult<()> {
        if !self.running {
            return Ok(());
        }
        log::info!("engine close");

        let stop_result = self.driver.stop();
        self.rt.is_ready.store(false, Ordering::Release);

        {
            let mut dsp = self.rt.dsp.lock();
            dsp.graph = None;
            dsp.plugins.clear();
        }

        for port in &mut self.midi_ins {
            port.stop();
        }
        self.midi_ins.clear();
        self.rt.midi_in.clear();

        {
            let mut outs = self.rt.midi_outs.lock();
            for port in outs.iter_mut() {
                port.stop();
            }
            outs.clear();
        }

        self.running = false;
        self.record(stop_result)
    }

    /// Toggle offline mode: plugin locks may block instead of skipping
    pub fn set_offline(&mut self, offline: bool) {
        self.offline = offline;
        let mut dsp = self.rt.dsp.lock();
        match dsp.graph.as_mut() {
            Some(EngineGraph::Rack(rack)) => rack.set_offline(offline),
            Some(EngineGraph::Patchbay(patchbay)) => patchbay.set_offline(offline),
            None => {}
        }
    }

    /// Rebuild block-sized buffers; audio is quiesced for the duration
    pub fn set_buffer_size(&mut self, buffer_size: u32) -> EngineResult<()> {
        if buffer_size == 0 {
            return self.record(Err(EngineError::InvalidArgument(
                "buffer size must be non-zero".into(),
            )));
        }
        self.rt.is_ready.store(false, Ordering::Release);
        {
            let mut dsp = self.rt.dsp.lock();
            match dsp.graph.as_mut() {
                Some(EngineGraph::Rack(rack)) => rack.set_buffer_size(buffer_size),
                Some(EngineGraph::Patchbay(patchbay)) => patchbay.set_buffer_size(buffer_size),
                None => {}
            }
        }
        self.rt.buffer_size.store(buffer_size, Ordering::Relaxed);
        self.rt.is_ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Propagate a sample-rate change; audio is quiesced for the duration
    pub fn set_sample_rate(&mut self, sample_rate: f64) -> EngineResult<()> {
        if sample_rate <= 0.0 {
            return self.record(Err(EngineError::InvalidArgument(
                "sample rate must be positive".into(),
            )));
        }
        self.rt.is_ready.store(false, Ordering::Release);
        {
            let mut dsp = self.rt.dsp.lock();
            let DspState { graph, plugins, .. } = &mut *dsp;
            match graph.as_mut() {
                Some(EngineGraph::Rack(_)) => {
                    for plugin in plugins.iter() {
                        plugin.lock().set_sample_rate(sample_rate);
                    }
                }
                Some(EngineGraph::Patchbay(patchbay)) => patchbay.set_sample_rate(sample_rate),
                None => {}
            }
        }
        self.rt.is_ready.store(true, Ordering::Release);
        Ok(())
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Patchbay API
    // ───────────────────────────────────────────────────────────────────────────

    pub fn patchbay_connect(
        &mut self,
        group_a: GroupId,
        port_a: PortId,
        group_b: GroupId,
        port_b: PortId,
    ) -> EngineResult<ConnectionId> {
        if !self.rt.is_ready() {
            return self.record(Err(EngineError::NotReady));
        }
        log::debug!(
            "patchbay connect {}:{} -> {}:{}",
            group_a.0,
            port_a.0,
            group_b.0,
            port_b.0
        );

        let mut dsp = self.rt.dsp.lock();
        let result = match dsp.graph.as_mut() {
            Some(EngineGraph::Rack(rack)) => {
                let mut router = EngineRackRouter {
                    driver: self.driver.as_mut(),
                    midi_ins: &mut self.midi_ins,
                    midi_outs: &self.rt.midi_outs,
                    queue: self.rt.midi_in.clone(),
                };
                rack.connect(&mut router, &*self.host, group_a, port_a, group_b, port_b)
            }
            Some(EngineGraph::Patchbay(patchbay)) => {
                patchbay.connect(&*self.host, group_a, port_a, group_b, port_b)
            }
            None => Err(EngineError::NotReady),
        };
        drop(dsp);
        self.record(result)
    }

    pub fn patchbay_disconnect(&mut self, id: ConnectionId) -> EngineResult<()> {
        if !self.rt.is_ready() {
            return self.record(Err(EngineError::NotReady));
        }
        log::debug!("patchbay disconnect {}", id.0);

        let mut dsp = self.rt.dsp.lock();
        let result = match dsp.graph.as_mut() {
            Some(EngineGraph::Rack(rack)) => {
                let mut router = EngineRackRouter {
                    driver: self.driver.as_mut(),
                    midi_ins: &mut self.midi_ins,
                    midi_outs: &self.rt.midi_outs,
                    queue: self.rt.midi_in.clone(),
                };
                rack.disconnect(&mut router, &*self.host, id)
            }
            Some(EngineGraph::Patchbay(patchbay)) => patchbay.disconnect(&*self.host, id),
            None => Err(EngineError::NotReady),
        };
        drop(dsp);
        self.record(result)
    }

    /// Republish the observable topology.
    ///
    /// `external` refreshes a driver-owned graph, which this engine does
    /// not have; it is rejected.
    pub fn patchbay_refresh(&mut self, external: bool) -> EngineResult<()> {
        if external {
            return self.record(Err(EngineError::Unsupported));
        }
        if !self.rt.is_ready() {
            return self.record(Err(EngineError::NotReady));
        }

        let is_rack = {
            let dsp = self.rt.dsp.lock();
            match dsp.graph.as_ref() {
                Some(EngineGraph::Rack(_)) => true,
                Some(EngineGraph::Patchbay(_)) => false,
                None => return self.record(Err(EngineError::NotReady)),
            }
        };

        if is_rack {
            self.patchbay_refresh_rack()
        } else {
            let mut dsp = self.rt.dsp.lock();
            if let Some(EngineGraph::Patchbay(patchbay)) = dsp.graph.as_mut() {
                patchbay.refresh_connections(&*self.host);
            }
            Ok(())
        }
    }

    /// Active connections as `[src, dst, src, dst, ...]` full-name pairs
    pub fn get_patchbay_connections(&self) -> Vec<String> {
        let dsp = self.rt.dsp.lock();
        match dsp.graph.as_ref() {
            Some(EngineGraph::Rack(rack)) => rack.get_connections(),
            Some(EngineGraph::Patchbay(patchbay)) => patchbay.get_connections(),
            None => Vec::new(),
        }
    }

    /// Decode two full port names and connect them
    pub fn restore_patchbay_connection(
        &mut self,
        source: &str,
        target: &str,
    ) -> EngineResult<ConnectionId> {
        if source.is_empty() || target.is_empty() {
            return self.record(Err(EngineError::InvalidArgument(
                "empty port name".into(),
            )));
        }

        let decoded = {
            let dsp = self.rt.dsp.lock();
            match dsp.graph.as_ref() {
                Some(EngineGraph::Rack(rack)) => rack
                    .get_group_and_port_id_from_full_name(source)
                    .zip(rack.get_group_and_port_id_from_full_name(target)),
                Some(EngineGraph::Patchbay(patchbay)) => patchbay
                    .get_group_and_port_id_from_full_name(source)
                    .zip(patchbay.get_group_and_port_id_from_full_name(target)),
                None => return self.record(Err(EngineError::NotReady)),
            }
        };

        let Some(((group_a, port_a), (group_b, port_b))) = decoded else {
            return self.record(Err(EngineError::PortNotFound(format!(
                "{source} -> {target}"
            ))));
        };
        self.patchbay_connect(group_a, port_a, group_b, port_b)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Plugins
    // ───────────────────────────────────────────────────────────────────────────

    /// Register a plugin instance; rack mode appends it to the chain,
    /// patchbay mode adds a node
    pub fn add_plugin(&mut self, processor: Box<dyn PluginProcessor>) -> EngineResult<Arc<PluginHandle>> {
        if !self.rt.is_ready() {
            return self.record(Err(EngineError::NotReady));
        }
        let sample_rate = self.driver.sample_rate();

        let mut dsp = self.rt.dsp.lock();
        let id = dsp.plugins.len() as u32;
        let handle = Arc::new(PluginHandle::new(id, processor));
        handle.lock().set_sample_rate(sample_rate);
        log::info!("add plugin {} '{}'", id, handle.name());

        dsp.plugins.push(handle.clone());
        if let Some(EngineGraph::Patchbay(patchbay)) = dsp.graph.as_mut() {
            patchbay.add_plugin(&handle, &*self.host);
        }
        Ok(handle)
    }

    /// Remove a plugin by its engine index; later ids stay dense
    pub fn remove_plugin(&mut self, plugin_id: u32) -> EngineResult<()> {
        let mut dsp = self.rt.dsp.lock();
        let DspState { graph, plugins, .. } = &mut *dsp;

        let Some(index) = plugins.iter().position(|p| p.id() == plugin_id) else {
            drop(dsp);
            return self.record(Err(EngineError::InvalidArgument(format!(
                "no plugin with id {plugin_id}"
            ))));
        };
        let handle = plugins.remove(index);
        log::info!("remove plugin {} '{}'", plugin_id, handle.name());

        if let Some(EngineGraph::Patchbay(patchbay)) = graph.as_mut() {
            let result = patchbay.remove_plugin(&handle, &*self.host);
            if result.is_err() {
                drop(dsp);
                return self.record(result);
            }
        }

        for (new_id, plugin) in dsp.plugins.iter().enumerate().skip(index) {
            plugin.set_id(new_id as u32);
        }
        let DspState { graph, plugins, .. } = &mut *dsp;
        if let Some(EngineGraph::Patchbay(patchbay)) = graph.as_mut() {
            patchbay.sync_plugin_ids(plugins);
        }
        Ok(())
    }

    /// Atomically swap a new instance in under the same plugin id.
    ///
    /// Patchbay connections of the old node are not re-established.
    pub fn replace_plugin(
        &mut self,
        plugin_id: u32,
        processor: Box<dyn PluginProcessor>,
    ) -> EngineResult<Arc<PluginHandle>> {
        let sample_rate = self.driver.sample_rate();
        let mut dsp = self.rt.dsp.lock();
        let DspState { graph, plugins, .. } = &mut *dsp;

        let Some(index) = plugins.iter().position(|p| p.id() == plugin_id) else {
            drop(dsp);
            return self.record(Err(EngineError::InvalidArgument(format!(
                "no plugin with id {plugin_id}"
            ))));
        };

        let replacement = Arc::new(PluginHandle::new(plugin_id, processor));
        replacement.lock().set_sample_rate(sample_rate);
        log::info!("replace plugin {} with '{}'", plugin_id, replacement.name());

        if let Some(EngineGraph::Patchbay(patchbay)) = graph.as_mut() {
            let result = patchbay.replace_plugin(&plugins[index], &replacement, &*self.host);
            if result.is_err() {
                drop(dsp);
                return self.record(result.map(|_| replacement));
            }
        }
        dsp.plugins[index] = replacement.clone();
        Ok(replacement)
    }

    /// Remove every plugin, rack chain or patchbay nodes alike
    pub fn remove_all_plugins(&mut self) -> EngineResult<()> {
        let mut dsp = self.rt.dsp.lock();
        let DspState { graph, plugins, .. } = &mut *dsp;

        if let Some(EngineGraph::Patchbay(patchbay)) = graph.as_mut() {
            patchbay.remove_all_plugins(plugins, &*self.host);
        }
        plugins.clear();
        Ok(())
    }

    /// Suppress patchbay publishing during bulk session restore
    pub fn set_ignore_patchbay(&mut self, ignore: bool) {
        let mut dsp = self.rt.dsp.lock();
        if let Some(EngineGraph::Patchbay(patchbay)) = dsp.graph.as_mut() {
            patchbay.set_ignore_patchbay(ignore);
        }
    }

    pub fn plugin(&self, plugin_id: u32) -> Option<Arc<PluginHandle>> {
        let dsp = self.rt.dsp.lock();
        dsp.plugins.iter().find(|p| p.id() == plugin_id).cloned()
    }

    pub fn plugin_count(&self) -> usize {
        self.rt.dsp.lock().plugins.len()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Rack refresh
    // ───────────────────────────────────────────────────────────────────────────

    /// Republish the rack topology: the host client with its six fixed
    /// ports, the hardware capture/playback clients, the MIDI device
    /// lists, then every existing connection under fresh ids.
    fn patchbay_refresh_rack(&mut self) -> EngineResult<()> {
        let driver_name = self.driver.name().to_string();
        let in_names = self.driver.input_channel_names();
        let out_names = self.driver.output_channel_names();
        let midi_in_devices = self.driver.midi_in_devices();
        let midi_out_devices = self.driver.midi_out_devices();
        let connected_midi_ins: Vec<String> =
            self.midi_ins.iter().map(|p| p.name().to_string()).collect();

        let mut dsp = self.rt.dsp.lock();
        let Some(EngineGraph::Rack(rack)) = dsp.graph.as_mut() else {
            return self.record(Err(EngineError::NotReady));
        };
        let host = &*self.host;

        rack.connections.clear();

        // the host's own client
        host.on_event(PatchbayEvent::ClientAdded {
            group: GroupId::CARLA,
            icon: ClientIcon::Host,
            plugin_id: None,
            name: self.client_name.clone(),
        });
        for (port, flags, name) in [
            (PortId::RACK_AUDIO_IN1, PORT_TYPE_AUDIO | PORT_IS_INPUT, "audio-in1"),
            (PortId::RACK_AUDIO_IN2, PORT_TYPE_AUDIO | PORT_IS_INPUT, "audio-in2"),
            (PortId::RACK_AUDIO_OUT1, PORT_TYPE_AUDIO, "audio-out1"),
            (PortId::RACK_AUDIO_OUT2, PORT_TYPE_AUDIO, "audio-out2"),
            (PortId::RACK_MIDI_IN, PORT_TYPE_MIDI | PORT_IS_INPUT, "midi-in"),
            (PortId::RACK_MIDI_OUT, PORT_TYPE_MIDI, "midi-out"),
        ] {
            host.on_event(PatchbayEvent::PortAdded {
                group: GroupId::CARLA,
                port,
                flags,
                name: name.to_string(),
            });
        }

        // hardware capture
        host.on_event(PatchbayEvent::ClientAdded {
            group: GroupId::AUDIO_IN,
            icon: ClientIcon::Hardware,
            plugin_id: None,
            name: format!("Capture ({driver_name})"),
        });
        for (i, name) in in_names.iter().enumerate() {
            host.on_event(PatchbayEvent::PortAdded {
                group: GroupId::AUDIO_IN,
                port: PortId(i as u32 + 1),
                flags: PORT_TYPE_AUDIO,
                name: name.clone(),
            });
        }

        // hardware playback
        host.on_event(PatchbayEvent::ClientAdded {
            group: GroupId::AUDIO_OUT,
            icon: ClientIcon::Hardware,
            plugin_id: None,
            name: format!("Playback ({driver_name})"),
        });
        for (i, name) in out_names.iter().enumerate() {
            host.on_event(PatchbayEvent::PortAdded {
                group: GroupId::AUDIO_OUT,
                port: PortId(i as u32 + 1),
                flags: PORT_TYPE_AUDIO | PORT_IS_INPUT,
                name: name.clone(),
            });
        }

        // external MIDI devices, rebuilding the name tables
        host.on_event(PatchbayEvent::ClientAdded {
            group: GroupId::MIDI_IN,
            icon: ClientIcon::Hardware,
            plugin_id: None,
            name: "Readable MIDI ports".to_string(),
        });
        rack.midi.ins.clear();
        for (i, name) in midi_in_devices.iter().enumerate() {
            let port = PortId(i as u32 + 1);
            host.on_event(PatchbayEvent::PortAdded {
                group: GroupId::MIDI_IN,
                port,
                flags: PORT_TYPE_MIDI,
                name: name.clone(),
            });
            rack.midi.ins.push(PortNameToId {
                group: GroupId::MIDI_IN,
                port,
                name: name.clone(),
                full_name: format!("MidiIn:{name}"),
            });
        }

        host.on_event(PatchbayEvent::ClientAdded {
            group: GroupId::MIDI_OUT,
            icon: ClientIcon::Hardware,
            plugin_id: None,
            name: "Writable MIDI ports".to_string(),
        });
        rack.midi.outs.clear();
        for (i, name) in midi_out_devices.iter().enumerate() {
            let port = PortId(i as u32 + 1);
            host.on_event(PatchbayEvent::PortAdded {
                group: GroupId::MIDI_OUT,
                port,
                flags: PORT_TYPE_MIDI | PORT_IS_INPUT,
                name: name.clone(),
            });
            rack.midi.outs.push(PortNameToId {
                group: GroupId::MIDI_OUT,
                port,
                name: name.clone(),
                full_name: format!("MidiOut:{name}"),
            });
        }

        // re-announce the active connections under fresh ids
        let (in1, in2, out1, out2) = rack.audio_connections();
        for (channels, carla_port) in [
            (in1, PortId::RACK_AUDIO_IN1),
            (in2, PortId::RACK_AUDIO_IN2),
        ] {
            for channel in channels {
                announce_rack_connection(
                    rack,
                    host,
                    GroupId::AUDIO_IN,
                    PortId(channel),
                    GroupId::CARLA,
                    carla_port,
                );
            }
        }
        for (channels, carla_port) in [
            (out1, PortId::RACK_AUDIO_OUT1),
            (out2, PortId::RACK_AUDIO_OUT2),
        ] {
            for channel in channels {
                announce_rack_connection(
                    rack,
                    host,
                    GroupId::CARLA,
                    carla_port,
                    GroupId::AUDIO_OUT,
                    PortId(channel),
                );
            }
        }

        for name in &connected_midi_ins {
            if let Some(port) = rack.midi.get_port_id(true, name) {
                announce_rack_connection(
                    rack,
                    host,
                    GroupId::MIDI_IN,
                    port,
                    GroupId::CARLA,
                    PortId::RACK_MIDI_IN,
                );
            }
        }

        let midi_out_names: Vec<String> = self
            .rt
            .midi_outs
            .lock()
            .iter()
            .map(|p| p.name().to_string())
            .collect();
        for name in &midi_out_names {
            if let Some(port) = rack.midi.get_port_id(false, name) {
                announce_rack_connection(
                    rack,
                    host,
                    GroupId::CARLA,
                    PortId::RACK_MIDI_OUT,
                    GroupId::MIDI_OUT,
                    port,
                );
            }
        }

        Ok(())
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn announce_rack_connection(
    rack: &mut RackGraph,
    host: &dyn HostCallback,
    group_a: GroupId,
    port_a: PortId,
    group_b: GroupId,
    port_b: PortId,
) {
    let id = rack.connections.next_id();
    let connection = sy_core::Connection::new(id, group_a, port_a, group_b, port_b);
    host.on_event(PatchbayEvent::ConnectionAdded {
        id,
        payload: connection.payload(),
    });
    rack.connections.add(connection);
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
