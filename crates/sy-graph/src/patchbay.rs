//! Patchbay graph
//!
//! The general processing-graph mode: every plugin is a node with typed
//! ports, any output may feed any type-compatible input, and the block
//! processor runs nodes in topological order. Externally ports are
//! addressed through the offset-encoded id plane; internally the
//! underlying processor graph works on raw channel indices.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sy_core::{
    audio_in_port, audio_out_port, midi_in_port, midi_out_port, ClientIcon, Connection,
    ConnectionId, EngineError, EngineResult, EventBuffer, GroupId, HostCallback, PatchbayEvent,
    PatchbayPortClass, PortId, Sample, MAX_ENGINE_EVENTS, MAX_PATCHBAY_PLUGINS,
    MIDI_CHANNEL_INDEX, PORT_IS_INPUT, PORT_TYPE_AUDIO, PORT_TYPE_MIDI,
};
use sy_plugin::{PluginHandle, NO_PATCHBAY_NODE};

use crate::{ConnectionRegistry, Node, NodeProcessor, NodeProperties, ProcessData, ProcessorGraph};

/// Node processor wrapping a plugin handle for the underlying graph.
///
/// A disabled or lock-contended plugin silences its outputs and clears
/// incoming MIDI for the block (the graph pre-clears both).
struct PluginNode {
    handle: Arc<PluginHandle>,
    offline: Arc<AtomicBool>,
}

impl NodeProcessor for PluginNode {
    fn name(&self) -> &str {
        self.handle.name()
    }

    fn audio_in_count(&self) -> u32 {
        self.handle.audio_in_count()
    }

    fn audio_out_count(&self) -> u32 {
        self.handle.audio_out_count()
    }

    fn accepts_midi(&self) -> bool {
        self.handle.accepts_midi()
    }

    fn produces_midi(&self) -> bool {
        self.handle.produces_midi()
    }

    fn set_sample_rate(&mut self, sample_rate: f64) {
        self.handle.lock().set_sample_rate(sample_rate);
    }

    fn process(
        &mut self,
        inputs: &[Vec<Sample>],
        outputs: &mut [Vec<Sample>],
        events_in: &[sy_core::EngineEvent],
        events_out: &mut EventBuffer,
        frames: u32,
    ) {
        if !self.handle.is_enabled() {
            return;
        }
        let Some(mut proc) = self.handle.try_lock(self.offline.load(Ordering::Relaxed)) else {
            return;
        };

        proc.init_buffers();

        let frames_us = frames as usize;
        let mut ins = [0.0f32; 2];
        if self.handle.audio_in_count() > 0 {
            for (ch, peak) in ins.iter_mut().enumerate() {
                if let Some(buf) = inputs.get(ch) {
                    *peak = abs_peak(&buf[..frames_us]);
                }
            }
        }

        proc.process(inputs, outputs, events_in, events_out, frames);
        drop(proc);

        let mut outs = [0.0f32; 2];
        if self.handle.audio_out_count() > 0 {
            for (ch, peak) in outs.iter_mut().enumerate() {
                if let Some(buf) = outputs.get(ch) {
                    *peak = abs_peak(&buf[..frames_us]);
                }
            }
        }
        self.handle.set_peaks(ins, outs);
    }
}

#[inline]
fn abs_peak(buf: &[Sample]) -> f32 {
    buf.iter().fold(0.0f32, |peak, &s| peak.max(s.abs()))
}

/// The general patchbay topology
pub struct PatchbayGraph {
    pub connections: ConnectionRegistry,
    graph: ProcessorGraph,
    audio_scratch: Vec<Vec<Sample>>,
    midi_scratch: EventBuffer,
    inputs: u32,
    outputs: u32,
    sample_rate: f64,
    ignore_patchbay: bool,
    offline: Arc<AtomicBool>,
}

impl PatchbayGraph {
    pub fn new(sample_rate: f64, buffer_size: u32, inputs: u32, outputs: u32) -> Self {
        let inputs = inputs.min(MAX_PATCHBAY_PLUGINS - 2);
        let outputs = outputs.min(MAX_PATCHBAY_PLUGINS - 2);
        let channels = inputs.max(outputs) as usize;

        Self {
            connections: ConnectionRegistry::new(),
            graph: ProcessorGraph::new(inputs, outputs, buffer_size as usize),
            audio_scratch: (0..channels)
                .map(|_| vec![0.0; buffer_size as usize])
                .collect(),
            midi_scratch: EventBuffer::with_capacity(MAX_ENGINE_EVENTS * 2),
            inputs,
            outputs,
            sample_rate,
            ignore_patchbay: false,
            offline: Arc::new(AtomicBool::new(false)),
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

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Relaxed);
    }

    /// Suppress client/port/connection publishing, used during bulk
    /// session restore
    pub fn set_ignore_patchbay(&mut self, ignore: bool) {
        self.ignore_patchbay = ignore;
    }

    /// Rebuild scratch and graph buffers for a new block size. The engine
    /// quiesces audio before calling this.
    pub fn set_buffer_size(&mut self, buffer_size: u32) {
        let channels = self.inputs.max(self.outputs) as usize;
        self.audio_scratch = (0..channels)
            .map(|_| vec![0.0; buffer_size as usize])
            .collect();
        self.graph.set_block_size(buffer_size as usize);
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        self.sample_rate = sample_rate;
        self.graph.set_sample_rate(sample_rate);
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Plugin lifecycle
    // ───────────────────────────────────────────────────────────────────────────

    /// Wrap a plugin in a graph node and publish it
    pub fn add_plugin(&mut self, plugin: &Arc<PluginHandle>, callback: &dyn HostCallback) {
        log::debug!("patchbay: add plugin '{}'", plugin.name());

        let node = PluginNode {
            handle: plugin.clone(),
            offline: self.offline.clone(),
        };
        let properties = NodeProperties {
            is_plugin: true,
            plugin_id: Some(plugin.id()),
            is_audio: plugin.audio_in_count() + plugin.audio_out_count() > 0,
            is_midi: plugin.accepts_midi() || plugin.produces_midi(),
            is_output: false,
        };
        let node_id = self.graph.add_processor(Box::new(node), properties);
        plugin.set_patchbay_node_id(node_id);

        if !self.ignore_patchbay {
            if let Some(node) = self.graph.node(node_id) {
                publish_node(callback, node);
            }
        }
    }

    /// Remove a plugin's node with its connections.
    ///
    /// The caller re-indexes the remaining plugin ids and then calls
    /// `sync_plugin_ids` so the node properties stay dense.
    pub fn remove_plugin(&mut self, plugin: &PluginHandle, callback: &dyn HostCallback) -> EngineResult<()> {
        log::debug!("patchbay: remove plugin '{}'", plugin.name());

        let node_id = plugin.patchbay_node_id();
        if self.graph.node(node_id).is_none() {
            return Err(EngineError::InvalidArgument(format!(
                "plugin '{}' has no patchbay node",
                plugin.name()
            )));
        }

        if !self.ignore_patchbay {
            self.disconnect_group(callback, GroupId(node_id));
            if let Some(node) = self.graph.node(node_id) {
                unpublish_node(callback, node);
            }
        } else {
            self.connections.remove_group(GroupId(node_id));
        }

        self.graph.remove_node(node_id);
        plugin.set_patchbay_node_id(NO_PATCHBAY_NODE);
        Ok(())
    }

    /// Swap a plugin instance under a fresh node, keeping the plugin id.
    ///
    /// Existing connections are not re-established; the caller re-connects
    /// as needed.
    pub fn replace_plugin(
        &mut self,
        old: &PluginHandle,
        new: &Arc<PluginHandle>,
        callback: &dyn HostCallback,
    ) -> EngineResult<()> {
        if old.id() != new.id() {
            return Err(EngineError::InvalidArgument(
                "replacement plugin must keep the same id".into(),
            ));
        }
        self.remove_plugin(old, callback)?;
        self.add_plugin(new, callback);
        Ok(())
    }

    /// Remove every plugin node
    pub fn remove_all_plugins(
        &mut self,
        plugins: &[Arc<PluginHandle>],
        callback: &dyn HostCallback,
    ) {
        for plugin in plugins {
            let _ = self.remove_plugin(plugin, callback);
        }
    }

    /// Re-sync the dense plugin-id node properties after removal
    pub fn sync_plugin_ids(&mut self, plugins: &[Arc<PluginHandle>]) {
        for plugin in plugins {
            let node_id = plugin.patchbay_node_id();
            if let Some(node) = self.graph.node_mut(node_id) {
                node.properties.plugin_id = Some(plugin.id());
            }
        }
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Connections
    // ───────────────────────────────────────────────────────────────────────────

    fn classify(port: PortId) -> EngineResult<PatchbayPortClass> {
        PatchbayPortClass::classify(port).ok_or_else(|| {
            EngineError::InvalidArgument(format!("port id {} outside the patchbay plane", port.0))
        })
    }

    /// Connect two offset-encoded ports
    pub fn connect(
        &mut self,
        callback: &dyn HostCallback,
        group_a: GroupId,
        port_a: PortId,
        group_b: GroupId,
        port_b: PortId,
    ) -> EngineResult<ConnectionId> {
        let class_a = Self::classify(port_a)?;
        let class_b = Self::classify(port_b)?;

        if class_a.is_input() {
            return Err(EngineError::InvalidArgument(
                "source must be an output port".into(),
            ));
        }
        if !class_b.is_input() {
            return Err(EngineError::InvalidArgument(
                "destination must be an input port".into(),
            ));
        }

        self.graph.add_connection(
            group_a.0,
            class_a.raw_channel(),
            group_b.0,
            class_b.raw_channel(),
        )?;

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
    pub fn disconnect(&mut self, callback: &dyn HostCallback, id: ConnectionId) -> EngineResult<()> {
        let connection = *self
            .connections
            .find(id)
            .ok_or(EngineError::ConnectionNotFound)?;

        let class_a = Self::classify(connection.port_a)?;
        let class_b = Self::classify(connection.port_b)?;

        if !self.graph.remove_connection(
            connection.group_a.0,
            class_a.raw_channel(),
            connection.group_b.0,
            class_b.raw_channel(),
        ) {
            return Err(EngineError::Graph("connection not in graph".into()));
        }

        callback.on_event(PatchbayEvent::ConnectionRemoved { id });
        self.connections.remove(id);
        Ok(())
    }

    /// Drop every registry entry touching a group, firing remove events.
    ///
    /// Leaves the underlying graph untouched: this is only called while
    /// the group's node is being removed, which deletes its edges.
    pub fn disconnect_group(&mut self, callback: &dyn HostCallback, group: GroupId) {
        for connection in self.connections.remove_group(group) {
            callback.on_event(PatchbayEvent::ConnectionRemoved { id: connection.id });
        }
    }

    /// Drop every connection from registry and graph
    pub fn clear_connections(&mut self) {
        self.connections.clear();
        self.graph.remove_all_connections();
    }

    /// Rebuild observable state from the graph's authoritative edges:
    /// clear the registry, drop illegal edges, republish every node, then
    /// re-announce every edge under a fresh connection id.
    pub fn refresh_connections(&mut self, callback: &dyn HostCallback) {
        self.connections.clear();
        self.graph.remove_illegal_connections();

        if !self.ignore_patchbay {
            for node in self.graph.nodes() {
                publish_node(callback, node);
            }
        }

        for edge in self.graph.edges() {
            let port_a = if edge.source_channel == MIDI_CHANNEL_INDEX {
                midi_out_port()
            } else {
                audio_out_port(edge.source_channel)
            };
            let port_b = if edge.dest_channel == MIDI_CHANNEL_INDEX {
                midi_in_port()
            } else {
                audio_in_port(edge.dest_channel)
            };

            let id = self.connections.next_id();
            let connection = Connection::new(
                id,
                GroupId(edge.source_node),
                port_a,
                GroupId(edge.dest_node),
                port_b,
            );
            callback.on_event(PatchbayEvent::ConnectionAdded {
                id,
                payload: connection.payload(),
            });
            self.connections.add(connection);
        }
    }

    /// Active connections as `[src, dst, src, dst, ...]` full-name pairs
    pub fn get_connections(&self) -> Vec<String> {
        let mut list = Vec::with_capacity(self.connections.len() * 2);
        for connection in self.connections.iter() {
            let (Some(name_a), Some(name_b)) = (
                self.full_port_name(connection.group_a, connection.port_a),
                self.full_port_name(connection.group_b, connection.port_b),
            ) else {
                continue;
            };
            list.push(name_a);
            list.push(name_b);
        }
        list
    }

    /// Full name of an offset-encoded port: `"<node>:<channel>"`
    pub fn full_port_name(&self, group: GroupId, port: PortId) -> Option<String> {
        let node = self.graph.node(group.0)?;
        let name = match PatchbayPortClass::classify(port)? {
            PatchbayPortClass::MidiIn => format!("{}:events-in", node.name()),
            PatchbayPortClass::MidiOut => format!("{}:events-out", node.name()),
            PatchbayPortClass::AudioIn(ch) => {
                if ch >= node.audio_in_count() {
                    return None;
                }
                format!("{}:{}", node.name(), node.audio_in_name(ch))
            }
            PatchbayPortClass::AudioOut(ch) => {
                if ch >= node.audio_out_count() {
                    return None;
                }
                format!("{}:{}", node.name(), node.audio_out_name(ch))
            }
        };
        Some(name)
    }

    /// Decode a full port name; exact inverse of `full_port_name`
    pub fn get_group_and_port_id_from_full_name(&self, full_name: &str) -> Option<(GroupId, PortId)> {
        let (group_name, port_name) = full_name.split_once(':')?;

        for node in self.graph.nodes() {
            if node.name() != group_name {
                continue;
            }
            let group = GroupId(node.id);

            if port_name == "events-in" {
                return Some((group, midi_in_port()));
            }
            if port_name == "events-out" {
                return Some((group, midi_out_port()));
            }
            for ch in 0..node.audio_in_count() {
                if node.audio_in_name(ch) == port_name {
                    return Some((group, audio_in_port(ch)));
                }
            }
            for ch in 0..node.audio_out_count() {
                if node.audio_out_name(ch) == port_name {
                    return Some((group, audio_out_port(ch)));
                }
            }
        }

        None
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Processing
    // ───────────────────────────────────────────────────────────────────────────

    /// Process one block on the audio thread
    pub fn process(
        &mut self,
        data: &mut ProcessData,
        dev_ins: &[&[Sample]],
        dev_outs: &mut [&mut [Sample]],
        frames: u32,
    ) {
        let frames_us = frames as usize;

        // engine events into the MIDI scratch
        self.midi_scratch.copy_from(data.events_in);

        // device audio into the scratch channels, clearing the remainder
        for (ch, buf) in self.audio_scratch.iter_mut().enumerate() {
            match dev_ins.get(ch).filter(|_| ch < self.inputs as usize) {
                Some(src) => {
                    let n = frames_us.min(src.len());
                    buf[..n].copy_from_slice(&src[..n]);
                    let end = frames_us.min(buf.len());
                    buf[n..end].fill(0.0);
                }
                None => {
                    let end = frames_us.min(buf.len());
                    buf[..end].fill(0.0);
                }
            }
        }

        self.graph
            .process_block(&mut self.audio_scratch, &mut self.midi_scratch, frames);

        for ch in 0..(self.outputs as usize).min(dev_outs.len()) {
            let dst = &mut dev_outs[ch];
            let n = frames_us.min(dst.len());
            dst[..n].copy_from_slice(&self.audio_scratch[ch][..n]);
        }

        data.events_out.copy_from(&self.midi_scratch);
        self.midi_scratch.clear();
    }
}

/// Publish a node and all its ports through the host callback
fn publish_node(callback: &dyn HostCallback, node: &Node) {
    let group = GroupId(node.id);
    let icon = if node.properties.is_plugin {
        ClientIcon::Plugin
    } else {
        ClientIcon::Hardware
    };

    callback.on_event(PatchbayEvent::ClientAdded {
        group,
        icon,
        plugin_id: node.properties.plugin_id,
        name: node.name().to_string(),
    });

    for ch in 0..node.audio_in_count() {
        callback.on_event(PatchbayEvent::PortAdded {
            group,
            port: audio_in_port(ch),
            flags: PORT_TYPE_AUDIO | PORT_IS_INPUT,
            name: node.audio_in_name(ch),
        });
    }
    for ch in 0..node.audio_out_count() {
        callback.on_event(PatchbayEvent::PortAdded {
            group,
            port: audio_out_port(ch),
            flags: PORT_TYPE_AUDIO,
            name: node.audio_out_name(ch),
        });
    }
    if node.accepts_midi() {
        callback.on_event(PatchbayEvent::PortAdded {
            group,
            port: midi_in_port(),
            flags: PORT_TYPE_MIDI | PORT_IS_INPUT,
            name: "events-in".into(),
        });
    }
    if node.produces_midi() {
        callback.on_event(PatchbayEvent::PortAdded {
            group,
            port: midi_out_port(),
            flags: PORT_TYPE_MIDI,
            name: "events-out".into(),
        });
    }
}

/// Withdraw a node's ports and the node itself
fn unpublish_node(callback: &dyn HostCallback, node: &Node) {
    let group = GroupId(node.id);

    for ch in 0..node.audio_in_count() {
        callback.on_event(PatchbayEvent::PortRemoved {
            group,
            port: audio_in_port(ch),
        });
    }
    for ch in 0..node.audio_out_count() {
        callback.on_event(PatchbayEvent::PortRemoved {
            group,
            port: audio_out_port(ch),
        });
    }
    if node.accepts_midi() {
        callback.on_event(PatchbayEvent::PortRemoved {
            group,
            port: midi_in_port(),
        });
    }
    if node.produces_midi() {
        callback.on_event(PatchbayEvent::PortRemoved {
            group,
            port: midi_out_port(),
        });
    }

    callback.on_event(PatchbayEvent::ClientRemoved { group });
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AUDIO_IN_NODE_ID, AUDIO_OUT_NODE_ID};
    use sy_core::NullCallback;
    use sy_plugin::GainProcessor;

    const BLOCK: u32 = 64;

    fn patchbay() -> PatchbayGraph {
        PatchbayGraph::new(48_000.0, BLOCK, 2, 2)
    }

    fn add_gain(pb: &mut PatchbayGraph, id: u32, gain: f32) -> Arc<PluginHandle> {
        let handle = Arc::new(PluginHandle::new(id, Box::new(GainProcessor::new(1, gain))));
        pb.add_plugin(&handle, &NullCallback);
        handle
    }

    fn run_block(pb: &mut PatchbayGraph, input: Vec<Sample>) -> Vec<Sample> {
        let mut events_in = EventBuffer::new();
        let mut events_out = EventBuffer::new();
        let mut data = ProcessData {
            events_in: &mut events_in,
            events_out: &mut events_out,
        };
        let right = vec![0.0; BLOCK as usize];
        let ins: Vec<&[Sample]> = vec![input.as_slice(), right.as_slice()];
        let mut out_l = vec![0.0; BLOCK as usize];
        let mut out_r = vec![0.0; BLOCK as usize];
        {
            let mut outs: Vec<&mut [Sample]> = vec![&mut out_l, &mut out_r];
            pb.process(&mut data, &ins, &mut outs, BLOCK);
        }
        out_l
    }

    fn connect_chain(pb: &mut PatchbayGraph, a: &PluginHandle, b: &PluginHandle) {
        let node_a = GroupId(a.patchbay_node_id());
        let node_b = GroupId(b.patchbay_node_id());
        pb.connect(
            &NullCallback,
            GroupId::AUDIO_IN,
            audio_out_port(0),
            node_a,
            audio_in_port(0),
        )
        .unwrap();
        pb.connect(&NullCallback, node_a, audio_out_port(0), node_b, audio_in_port(0))
            .unwrap();
        pb.connect(
            &NullCallback,
            node_b,
            audio_out_port(0),
            GroupId::AUDIO_OUT,
            audio_in_port(0),
        )
        .unwrap();
    }

    #[test]
    fn test_audio_flows_through_plugin_chain() {
        let mut pb = patchbay();
        let a = add_gain(&mut pb, 0, 2.0);
        let b = add_gain(&mut pb, 1, 3.0);
        connect_chain(&mut pb, &a, &b);

        let out = run_block(&mut pb, vec![0.1; BLOCK as usize]);
        assert!(out.iter().all(|&s| (s - 0.6).abs() < 1e-6));
    }

    #[test]
    fn test_connect_rejects_wrong_direction_and_plane() {
        let mut pb = patchbay();
        let a = add_gain(&mut pb, 0, 1.0);
        let node_a = GroupId(a.patchbay_node_id());

        // input used as source
        let result = pb.connect(
            &NullCallback,
            node_a,
            audio_in_port(0),
            GroupId::AUDIO_OUT,
            audio_in_port(0),
        );
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));

        // output used as destination
        let result = pb.connect(
            &NullCallback,
            GroupId::AUDIO_IN,
            audio_out_port(0),
            node_a,
            audio_out_port(0),
        );
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));

        // raw id outside the encoded plane
        let result = pb.connect(
            &NullCallback,
            GroupId::AUDIO_IN,
            PortId(1),
            node_a,
            audio_in_port(0),
        );
        assert!(matches!(result, Err(EngineError::InvalidArgument(_))));

        // audio source into midi destination
        let result = pb.connect(
            &NullCallback,
            GroupId::AUDIO_IN,
            audio_out_port(0),
            node_a,
            midi_in_port(),
        );
        assert!(matches!(result, Err(EngineError::Graph(_))));
    }

    #[test]
    fn test_connection_ids_monotonic_across_disconnect() {
        let mut pb = patchbay();
        let a = add_gain(&mut pb, 0, 1.0);
        let node_a = GroupId(a.patchbay_node_id());

        let first = pb
            .connect(
                &NullCallback,
                GroupId::AUDIO_IN,
                audio_out_port(0),
                node_a,
                audio_in_port(0),
            )
            .unwrap();
        pb.disconnect(&NullCallback, first).unwrap();
        let second = pb
            .connect(
                &NullCallback,
                GroupId::AUDIO_IN,
                audio_out_port(0),
                node_a,
                audio_in_port(0),
            )
            .unwrap();
        assert!(second > first);

        assert_eq!(
            pb.disconnect(&NullCallback, ConnectionId(999)),
            Err(EngineError::ConnectionNotFound)
        );
    }

    #[test]
    fn test_removing_plugin_drops_its_connections_and_silences() {
        let mut pb = patchbay();
        let a = add_gain(&mut pb, 0, 2.0);
        let b = add_gain(&mut pb, 1, 3.0);
        connect_chain(&mut pb, &a, &b);
        assert_eq!(pb.get_connections().len(), 6);

        pb.remove_plugin(&a, &NullCallback).unwrap();

        // connections touching the removed node are gone
        let names = pb.get_connections();
        assert_eq!(names.len(), 2);
        assert!(names.iter().all(|n| !n.contains("Gain x2")));

        // the orphaned chain produces silence
        let out = run_block(&mut pb, vec![0.5; BLOCK as usize]);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_replace_plugin_keeps_id_drops_connections() {
        let mut pb = patchbay();
        let a = add_gain(&mut pb, 0, 2.0);
        let node_a = GroupId(a.patchbay_node_id());
        pb.connect(
            &NullCallback,
            GroupId::AUDIO_IN,
            audio_out_port(0),
            node_a,
            audio_in_port(0),
        )
        .unwrap();

        let replacement = Arc::new(PluginHandle::new(0, Box::new(GainProcessor::new(1, 5.0))));
        pb.replace_plugin(&a, &replacement, &NullCallback).unwrap();

        assert_eq!(a.patchbay_node_id(), NO_PATCHBAY_NODE);
        assert_ne!(replacement.patchbay_node_id(), NO_PATCHBAY_NODE);
        assert!(pb.get_connections().is_empty());

        // mismatched ids are rejected
        let wrong = Arc::new(PluginHandle::new(7, Box::new(GainProcessor::new(1, 1.0))));
        assert!(matches!(
            pb.replace_plugin(&replacement, &wrong, &NullCallback),
            Err(EngineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_clear_connections_drops_graph_edges_too() {
        let mut pb = patchbay();
        let a = add_gain(&mut pb, 0, 2.0);
        let node_a = GroupId(a.patchbay_node_id());
        pb.connect(
            &NullCallback,
            GroupId::AUDIO_IN,
            audio_out_port(0),
            node_a,
            audio_in_port(0),
        )
        .unwrap();

        pb.clear_connections();
        assert!(pb.get_connections().is_empty());

        // a refresh republishes nothing: the graph kept no edges
        pb.refresh_connections(&NullCallback);
        assert!(pb.get_connections().is_empty());
    }

    #[test]
    fn test_ignore_patchbay_suppresses_publishing() {
        use parking_lot::Mutex;

        struct Counter(Mutex<usize>);
        impl sy_core::HostCallback for Counter {
            fn on_event(&self, _event: sy_core::PatchbayEvent) {
                *self.0.lock() += 1;
            }
        }

        let mut pb = patchbay();
        pb.set_ignore_patchbay(true);

        let counter = Counter(Mutex::new(0));
        let handle = Arc::new(PluginHandle::new(0, Box::new(GainProcessor::new(1, 2.0))));
        pb.add_plugin(&handle, &counter);
        assert_eq!(*counter.0.lock(), 0);

        // connection events are still fired, as the original does
        let node = GroupId(handle.patchbay_node_id());
        pb.connect(&counter, GroupId::AUDIO_IN, audio_out_port(0), node, audio_in_port(0))
            .unwrap();
        assert_eq!(*counter.0.lock(), 1);
    }

    #[test]
    fn test_refresh_is_idempotent_on_quiescent_graph() {
        let mut pb = patchbay();
        let a = add_gain(&mut pb, 0, 2.0);
        let b = add_gain(&mut pb, 1, 3.0);
        connect_chain(&mut pb, &a, &b);

        pb.refresh_connections(&NullCallback);
        let first = pb.get_connections();
        pb.refresh_connections(&NullCallback);
        let second = pb.get_connections();

        assert_eq!(first, second);
        assert_eq!(first.len(), 6);
    }

    #[test]
    fn test_patchbay_name_round_trip() {
        let mut pb = patchbay();
        let a = add_gain(&mut pb, 0, 2.0);
        let node_a = GroupId(a.patchbay_node_id());

        for (group, port) in [
            (GroupId::AUDIO_IN, audio_out_port(0)),
            (GroupId::AUDIO_OUT, audio_in_port(1)),
            (GroupId::MIDI_IN, midi_out_port()),
            (GroupId::MIDI_OUT, midi_in_port()),
            (node_a, audio_in_port(0)),
            (node_a, audio_out_port(0)),
        ] {
            let full = pb.full_port_name(group, port).expect("name must exist");
            assert_eq!(
                pb.get_group_and_port_id_from_full_name(&full),
                Some((group, port)),
                "round trip failed for {full}"
            );
        }
    }

    #[test]
    fn test_hardware_passthrough_without_plugins() {
        let mut pb = patchbay();
        pb.connect(
            &NullCallback,
            GroupId::AUDIO_IN,
            audio_out_port(0),
            GroupId::AUDIO_OUT,
            audio_in_port(0),
        )
        .unwrap();

        let signal: Vec<Sample> = (0..BLOCK as usize).map(|i| (i as f32).sin() * 0.4).collect();
        let out = run_block(&mut pb, signal.clone());
        assert_eq!(out, signal);
    }

    #[test]
    fn test_io_node_ids_match_builtin_groups() {
        let pb = patchbay();
        assert!(pb.full_port_name(GroupId(AUDIO_IN_NODE_ID), audio_out_port(0)).is_some());
        assert!(pb.full_port_name(GroupId(AUDIO_OUT_NODE_ID), audio_in_port(0)).is_some());
    }
}
