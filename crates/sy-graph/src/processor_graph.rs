//! Underlying audio processor graph
//!
//! Maintains nodes and node-level channel connections for the patchbay.
//! Audio edges carry raw channel indices; MIDI edges use the sentinel
//! channel index. Node execution is ordered topologically (cycles are
//! skipped), multiple sources into one destination are summed, and all
//! buffers are pre-allocated so block processing never allocates.
//!
//! Topology is recomputed eagerly on every mutation (control thread), so
//! the audio thread only ever walks a ready-made order.

use std::collections::HashMap;

use sy_core::{
    EngineResult, EngineError, EventBuffer, GroupId, Sample, MAX_ENGINE_EVENTS,
    MAX_NODE_AUDIO_CHANNELS, MIDI_CHANNEL_INDEX,
};

/// Node id of the built-in audio capture node
pub const AUDIO_IN_NODE_ID: u32 = GroupId::AUDIO_IN.0;
/// Node id of the built-in audio playback node
pub const AUDIO_OUT_NODE_ID: u32 = GroupId::AUDIO_OUT.0;
/// Node id of the built-in MIDI input node
pub const MIDI_IN_NODE_ID: u32 = GroupId::MIDI_IN.0;
/// Node id of the built-in MIDI output node
pub const MIDI_OUT_NODE_ID: u32 = GroupId::MIDI_OUT.0;

/// The processing capability of a patchbay node
pub trait NodeProcessor: Send {
    fn name(&self) -> &str;

    fn audio_in_count(&self) -> u32;

    fn audio_out_count(&self) -> u32;

    fn accepts_midi(&self) -> bool {
        false
    }

    fn produces_midi(&self) -> bool {
        false
    }

    fn audio_in_name(&self, channel: u32) -> String {
        format!("audio-in{}", channel + 1)
    }

    fn audio_out_name(&self, channel: u32) -> String {
        format!("audio-out{}", channel + 1)
    }

    fn set_sample_rate(&mut self, _sample_rate: f64) {}

    /// Process one block; buffers are owned by the graph
    fn process(
        &mut self,
        inputs: &[Vec<Sample>],
        outputs: &mut [Vec<Sample>],
        events_in: &[sy_core::EngineEvent],
        events_out: &mut EventBuffer,
        frames: u32,
    );
}

/// Flags describing a node to the patchbay layer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NodeProperties {
    pub is_plugin: bool,
    pub plugin_id: Option<u32>,
    pub is_audio: bool,
    pub is_midi: bool,
    pub is_output: bool,
}

enum NodeKind {
    AudioIn,
    AudioOut,
    MidiIn,
    MidiOut,
    Processor(Box<dyn NodeProcessor>),
}

/// A node of the processor graph
pub struct Node {
    pub id: u32,
    pub properties: NodeProperties,
    kind: NodeKind,
    // processor facts cached at insertion
    audio_ins: u32,
    audio_outs: u32,
    accepts_midi: bool,
    produces_midi: bool,
    // per-block results
    out_audio: Vec<Vec<Sample>>,
    out_events: EventBuffer,
}

impl Node {
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
    pub fn is_plugin(&self) -> bool {
        matches!(self.kind, NodeKind::Processor(_))
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            NodeKind::AudioIn => "Audio Input",
            NodeKind::AudioOut => "Audio Output",
            NodeKind::MidiIn => "Midi Input",
            NodeKind::MidiOut => "Midi Output",
            NodeKind::Processor(proc) => proc.name(),
        }
    }

    /// Name of the audio input channel, as shown in full port names
    pub fn audio_in_name(&self, channel: u32) -> String {
        match &self.kind {
            NodeKind::AudioOut => format!("playback_{}", channel + 1),
            NodeKind::Processor(proc) => proc.audio_in_name(channel),
            _ => format!("audio-in{}", channel + 1),
        }
    }

    /// Name of the audio output channel, as shown in full port names
    pub fn audio_out_name(&self, channel: u32) -> String {
        match &self.kind {
            NodeKind::AudioIn => format!("capture_{}", channel + 1),
            NodeKind::Processor(proc) => proc.audio_out_name(channel),
            _ => format!("audio-out{}", channel + 1),
        }
    }
}

/// Node-level connection on raw channel indices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphEdge {
    pub source_node: u32,
    pub source_channel: u32,
    pub dest_node: u32,
    pub dest_channel: u32,
}

impl GraphEdge {
    #[inline]
    pub fn is_midi(&self) -> bool {
        self.source_channel == MIDI_CHANNEL_INDEX
    }
}

/// The processor graph itself
pub struct ProcessorGraph {
    nodes: Vec<Node>,
    edges: Vec<GraphEdge>,
    /// Topological execution order, node ids
    order: Vec<u32>,
    /// Node id to `nodes` index
    index: HashMap<u32, usize>,
    next_node_id: u32,
    block_size: usize,
    inputs: u32,
    outputs: u32,
    // pre-allocated block scratch
    gather: Vec<Vec<Sample>>,
    gather_events: EventBuffer,
    out_accum: Vec<Vec<Sample>>,
    midi_out_accum: EventBuffer,
}

impl ProcessorGraph {
    pub fn new(inputs: u32, outputs: u32, block_size: usize) -> Self {
        let mut graph = Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            order: Vec::new(),
            index: HashMap::new(),
            next_node_id: GroupId::FIRST_PLUGIN,
            block_size,
            inputs,
            outputs,
            gather: (0..MAX_NODE_AUDIO_CHANNELS)
                .map(|_| vec![0.0; block_size])
                .collect(),
            gather_events: EventBuffer::new(),
            out_accum: (0..outputs as usize).map(|_| vec![0.0; block_size]).collect(),
            midi_out_accum: EventBuffer::with_capacity(MAX_ENGINE_EVENTS),
        };

        let audio_props = NodeProperties {
            is_audio: true,
            ..Default::default()
        };
        let midi_props = NodeProperties {
            is_midi: true,
            ..Default::default()
        };

        graph.insert_node(AUDIO_IN_NODE_ID, NodeKind::AudioIn, audio_props);
        graph.insert_node(
            AUDIO_OUT_NODE_ID,
            NodeKind::AudioOut,
            NodeProperties {
                is_output: true,
                ..audio_props
            },
        );
        graph.insert_node(MIDI_IN_NODE_ID, NodeKind::MidiIn, midi_props);
        graph.insert_node(
            MIDI_OUT_NODE_ID,
            NodeKind::MidiOut,
            NodeProperties {
                is_output: true,
                ..midi_props
            },
        );

        graph
    }

    fn insert_node(&mut self, id: u32, kind: NodeKind, properties: NodeProperties) {
        let (audio_ins, audio_outs, accepts_midi, produces_midi) = match &kind {
            NodeKind::AudioIn => (0, self.inputs, false, false),
            NodeKind::AudioOut => (self.outputs, 0, false, false),
            NodeKind::MidiIn => (0, 0, false, true),
            NodeKind::MidiOut => (0, 0, true, false),
            NodeKind::Processor(proc) => (
                proc.audio_in_count(),
                proc.audio_out_count(),
                proc.accepts_midi(),
                proc.produces_midi(),
            ),
        };

        let out_audio = (0..audio_outs as usize)
            .map(|_| vec![0.0; self.block_size])
            .collect();

        self.nodes.push(Node {
            id,
            properties,
            kind,
            audio_ins,
            audio_outs,
            accepts_midi,
            produces_midi,
            out_audio,
            out_events: EventBuffer::new(),
        });
        self.rebuild_topology();
    }

    /// Add a processor node, returning its id
    pub fn add_processor(&mut self, processor: Box<dyn NodeProcessor>, properties: NodeProperties) -> u32 {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.insert_node(id, NodeKind::Processor(processor), properties);
        id
    }

    /// Remove a processor node and every edge touching it.
    ///
    /// The four built-in IO nodes cannot be removed.
    pub fn remove_node(&mut self, id: u32) -> bool {
        let Some(&k) = self.index.get(&id) else {
            return false;
        };
        if !self.nodes[k].is_plugin() {
            return false;
        }
        self.nodes.remove(k);
        self.edges
            .retain(|e| e.source_node != id && e.dest_node != id);
        self.rebuild_topology();
        true
    }

    pub fn node(&self, id: u32) -> Option<&Node> {
        self.index.get(&id).map(|&k| &self.nodes[k])
    }

    pub fn node_mut(&mut self, id: u32) -> Option<&mut Node> {
        let k = *self.index.get(&id)?;
        Some(&mut self.nodes[k])
    }

    /// Nodes in insertion order (IO nodes first)
    pub fn nodes(&self) -> std::slice::Iter<'_, Node> {
        self.nodes.iter()
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    #[inline]
    pub fn inputs(&self) -> u32 {
        self.inputs
    }

    #[inline]
    pub fn outputs(&self) -> u32 {
        self.outputs
    }

    fn edge_is_legal(&self, edge: &GraphEdge) -> bool {
        let (Some(src), Some(dst)) = (self.node(edge.source_node), self.node(edge.dest_node)) else {
            return false;
        };
        if edge.source_channel == MIDI_CHANNEL_INDEX || edge.dest_channel == MIDI_CHANNEL_INDEX {
            edge.source_channel == MIDI_CHANNEL_INDEX
                && edge.dest_channel == MIDI_CHANNEL_INDEX
                && src.produces_midi()
                && dst.accepts_midi()
        } else {
            edge.source_channel < src.audio_out_count() && edge.dest_channel < dst.audio_in_count()
        }
    }

    /// Add a node-level edge after validating it
    pub fn add_connection(
        &mut self,
        source_node: u32,
        source_channel: u32,
        dest_node: u32,
        dest_channel: u32,
    ) -> EngineResult<()> {
        if source_node == dest_node {
            return Err(EngineError::Graph(
                "cannot connect a node to itself".into(),
            ));
        }
        let edge = GraphEdge {
            source_node,
            source_channel,
            dest_node,
            dest_channel,
        };
        if !self.edge_is_legal(&edge) {
            return Err(EngineError::Graph("incompatible ports".into()));
        }
        if self.edges.contains(&edge) {
            return Err(EngineError::Graph("ports already connected".into()));
        }
        self.edges.push(edge);
        self.rebuild_topology();
        Ok(())
    }

    /// Remove a node-level edge; `false` when it does not exist
    pub fn remove_connection(
        &mut self,
        source_node: u32,
        source_channel: u32,
        dest_node: u32,
        dest_channel: u32,
    ) -> bool {
        let edge = GraphEdge {
            source_node,
            source_channel,
            dest_node,
            dest_channel,
        };
        let Some(pos) = self.edges.iter().position(|e| *e == edge) else {
            return false;
        };
        self.edges.remove(pos);
        self.rebuild_topology();
        true
    }

    pub fn remove_all_connections(&mut self) {
        self.edges.clear();
        self.rebuild_topology();
    }

    /// Drop every edge whose endpoints no longer validate
    pub fn remove_illegal_connections(&mut self) {
        let edges = std::mem::take(&mut self.edges);
        let kept: Vec<GraphEdge> = edges
            .into_iter()
            .filter(|e| self.edge_is_legal(e))
            .collect();
        self.edges = kept;
        self.rebuild_topology();
    }

    /// Rebuild scratch and node buffers for a new block size
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
        self.gather = (0..MAX_NODE_AUDIO_CHANNELS)
            .map(|_| vec![0.0; block_size])
            .collect();
        self.out_accum = (0..self.outputs as usize)
            .map(|_| vec![0.0; block_size])
            .collect();
        for node in &mut self.nodes {
            node.out_audio = (0..node.audio_outs as usize)
                .map(|_| vec![0.0; block_size])
                .collect();
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f64) {
        for node in &mut self.nodes {
            if let NodeKind::Processor(proc) = &mut node.kind {
                proc.set_sample_rate(sample_rate);
            }
        }
    }

    /// Recompute execution order and the id index. Control thread only.
    fn rebuild_topology(&mut self) {
        self.index = self
            .nodes
            .iter()
            .enumerate()
            .map(|(k, n)| (n.id, k))
            .collect();

        let mut state: HashMap<u32, u8> = HashMap::with_capacity(self.nodes.len());
        let mut order = Vec::with_capacity(self.nodes.len());
        for k in 0..self.nodes.len() {
            self.visit(self.nodes[k].id, &mut state, &mut order);
        }
        order.reverse();
        self.order = order;
    }

    fn visit(&self, id: u32, state: &mut HashMap<u32, u8>, order: &mut Vec<u32>) {
        match state.get(&id) {
            // in progress: cycle, skip
            Some(1) => return,
            Some(2) => return,
            _ => {}
        }
        state.insert(id, 1);
        for edge in &self.edges {
            if edge.source_node == id {
                self.visit(edge.dest_node, state, order);
            }
        }
        state.insert(id, 2);
        order.push(id);
    }

    /// Process one block.
    ///
    /// `io_audio` carries graph inputs on entry; on return its first
    /// `outputs` channels hold the graph outputs. `io_midi` carries the
    /// input events on entry and the output events on return. No
    /// allocation happens here.
    pub fn process_block(&mut self, io_audio: &mut [Vec<Sample>], io_midi: &mut EventBuffer, frames: u32) {
        let frames = (frames as usize).min(self.block_size);

        // clear per-node results
        for node in &mut self.nodes {
            for buf in &mut node.out_audio {
                buf[..frames].fill(0.0);
            }
            node.out_events.clear();
        }
        for buf in &mut self.out_accum {
            buf[..frames].fill(0.0);
        }
        self.midi_out_accum.clear();

        // seed the IO source nodes
        if let Some(&k) = self.index.get(&AUDIO_IN_NODE_ID) {
            let node = &mut self.nodes[k];
            for ch in 0..(self.inputs as usize).min(io_audio.len()) {
                node.out_audio[ch][..frames].copy_from_slice(&io_audio[ch][..frames]);
            }
        }
        if let Some(&k) = self.index.get(&MIDI_IN_NODE_ID) {
            self.nodes[k].out_events.copy_from(io_midi);
        }

        // run processors in topological order
        for oi in 0..self.order.len() {
            let id = self.order[oi];
            let Some(&k) = self.index.get(&id) else {
                continue;
            };
            if !self.nodes[k].is_plugin() {
                continue;
            }
            let n_in = (self.nodes[k].audio_ins as usize).min(MAX_NODE_AUDIO_CHANNELS);

            // gather inputs from connected sources (sum multiple sources)
            {
                let Self {
                    nodes,
                    edges,
                    index,
                    gather,
                    gather_events,
                    ..
                } = self;
                for buf in gather.iter_mut().take(n_in) {
                    buf[..frames].fill(0.0);
                }
                gather_events.clear();

                for edge in edges.iter() {
                    if edge.dest_node != id {
                        continue;
                    }
                    let Some(&src_k) = index.get(&edge.source_node) else {
                        continue;
                    };
                    let src = &nodes[src_k];
                    if edge.is_midi() {
                        gather_events.append_from(&src.out_events);
                    } else if (edge.dest_channel as usize) < n_in {
                        if let Some(src_buf) = src.out_audio.get(edge.source_channel as usize) {
                            let dst_buf = &mut gather[edge.dest_channel as usize];
                            for (d, s) in dst_buf[..frames].iter_mut().zip(&src_buf[..frames]) {
                                *d += *s;
                            }
                        }
                    }
                }
                gather_events.sort_by_time();
            }

            let node = &mut self.nodes[k];
            let n_out = node.audio_outs as usize;
            let Node {
                kind, out_audio, out_events, ..
            } = node;
            if let NodeKind::Processor(proc) = kind {
                proc.process(
                    &self.gather[..n_in],
                    &mut out_audio[..n_out],
                    self.gather_events.events(),
                    out_events,
                    frames as u32,
                );
            }
        }

        // gather the IO sink nodes
        {
            let Self {
                nodes,
                edges,
                index,
                out_accum,
                midi_out_accum,
                ..
            } = self;
            for edge in edges.iter() {
                let Some(&src_k) = index.get(&edge.source_node) else {
                    continue;
                };
                let src = &nodes[src_k];
                if edge.dest_node == AUDIO_OUT_NODE_ID && !edge.is_midi() {
                    if let (Some(dst_buf), Some(src_buf)) = (
                        out_accum.get_mut(edge.dest_channel as usize),
                        src.out_audio.get(edge.source_channel as usize),
                    ) {
                        for (d, s) in dst_buf[..frames].iter_mut().zip(&src_buf[..frames]) {
                            *d += *s;
                        }
                    }
                } else if edge.dest_node == MIDI_OUT_NODE_ID && edge.is_midi() {
                    midi_out_accum.append_from(&src.out_events);
                }
            }
            midi_out_accum.sort_by_time();
        }

        for ch in 0..(self.outputs as usize).min(io_audio.len()) {
            io_audio[ch][..frames].copy_from_slice(&self.out_accum[ch][..frames]);
        }
        io_midi.copy_from(&self.midi_out_accum);
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use sy_core::EngineEvent;

    struct TestGain {
        gain: f32,
    }

    impl NodeProcessor for TestGain {
        fn name(&self) -> &str {
            "TestGain"
        }

        fn audio_in_count(&self) -> u32 {
            1
        }

        fn audio_out_count(&self) -> u32 {
            1
        }

        fn process(
            &mut self,
            inputs: &[Vec<Sample>],
            outputs: &mut [Vec<Sample>],
            _events_in: &[EngineEvent],
            _events_out: &mut EventBuffer,
            frames: u32,
        ) {
            for i in 0..frames as usize {
                outputs[0][i] = inputs[0][i] * self.gain;
            }
        }
    }

    struct TestMidiThrough;

    impl NodeProcessor for TestMidiThrough {
        fn name(&self) -> &str {
            "TestMidiThrough"
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
                events_out.push(*event);
            }
        }
    }

    fn props() -> NodeProperties {
        NodeProperties {
            is_plugin: true,
            plugin_id: Some(0),
            is_audio: true,
            ..Default::default()
        }
    }

    #[test]
    fn test_io_nodes_exist() {
        let graph = ProcessorGraph::new(2, 2, 64);
        assert!(graph.node(AUDIO_IN_NODE_ID).is_some());
        assert!(graph.node(AUDIO_OUT_NODE_ID).is_some());
        assert!(graph.node(MIDI_IN_NODE_ID).is_some());
        assert!(graph.node(MIDI_OUT_NODE_ID).is_some());
        assert_eq!(graph.node(AUDIO_IN_NODE_ID).unwrap().audio_out_count(), 2);
        assert_eq!(graph.node(AUDIO_OUT_NODE_ID).unwrap().audio_in_count(), 2);
    }

    #[test]
    fn test_plugin_node_ids_start_after_builtin_groups() {
        let mut graph = ProcessorGraph::new(2, 2, 64);
        let id = graph.add_processor(Box::new(TestGain { gain: 1.0 }), props());
        assert_eq!(id, GroupId::FIRST_PLUGIN);
    }

    #[test]
    fn test_connection_validation() {
        let mut graph = ProcessorGraph::new(2, 2, 64);
        let gain = graph.add_processor(Box::new(TestGain { gain: 1.0 }), props());

        assert!(graph.add_connection(AUDIO_IN_NODE_ID, 0, gain, 0).is_ok());
        // duplicate
        assert!(graph.add_connection(AUDIO_IN_NODE_ID, 0, gain, 0).is_err());
        // channel out of range
        assert!(graph.add_connection(AUDIO_IN_NODE_ID, 5, gain, 0).is_err());
        // audio into a midi channel
        assert!(graph
            .add_connection(AUDIO_IN_NODE_ID, 0, gain, MIDI_CHANNEL_INDEX)
            .is_err());
        // midi from a node that produces none
        assert!(graph
            .add_connection(gain, MIDI_CHANNEL_INDEX, MIDI_OUT_NODE_ID, MIDI_CHANNEL_INDEX)
            .is_err());
        // self connection
        assert!(graph.add_connection(gain, 0, gain, 0).is_err());
    }

    #[test]
    fn test_audio_flows_through_chain() {
        let mut graph = ProcessorGraph::new(1, 1, 8);
        let a = graph.add_processor(Box::new(TestGain { gain: 2.0 }), props());
        let b = graph.add_processor(Box::new(TestGain { gain: 3.0 }), props());

        graph.add_connection(AUDIO_IN_NODE_ID, 0, a, 0).unwrap();
        graph.add_connection(a, 0, b, 0).unwrap();
        graph.add_connection(b, 0, AUDIO_OUT_NODE_ID, 0).unwrap();

        let mut audio = vec![vec![0.5; 8]];
        let mut midi = EventBuffer::new();
        graph.process_block(&mut audio, &mut midi, 8);

        assert!(audio[0].iter().all(|&s| (s - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_multiple_sources_sum_additively() {
        let mut graph = ProcessorGraph::new(2, 1, 8);
        graph
            .add_connection(AUDIO_IN_NODE_ID, 0, AUDIO_OUT_NODE_ID, 0)
            .unwrap();
        graph
            .add_connection(AUDIO_IN_NODE_ID, 1, AUDIO_OUT_NODE_ID, 0)
            .unwrap();

        let mut audio = vec![vec![0.25; 8], vec![0.5; 8]];
        let mut midi = EventBuffer::new();
        graph.process_block(&mut audio, &mut midi, 8);

        assert!(audio[0].iter().all(|&s| (s - 0.75).abs() < 1e-6));
    }

    #[test]
    fn test_midi_routes_through_sentinel_channel() {
        let mut graph = ProcessorGraph::new(0, 0, 8);
        let through = graph.add_processor(
            Box::new(TestMidiThrough),
            NodeProperties {
                is_plugin: true,
                is_midi: true,
                ..Default::default()
            },
        );
        graph
            .add_connection(MIDI_IN_NODE_ID, MIDI_CHANNEL_INDEX, through, MIDI_CHANNEL_INDEX)
            .unwrap();
        graph
            .add_connection(through, MIDI_CHANNEL_INDEX, MIDI_OUT_NODE_ID, MIDI_CHANNEL_INDEX)
            .unwrap();

        let mut audio: Vec<Vec<Sample>> = Vec::new();
        let mut midi = EventBuffer::new();
        midi.push(EngineEvent::midi(4, &[0x90, 60, 100]).unwrap());
        graph.process_block(&mut audio, &mut midi, 8);

        assert_eq!(midi.len(), 1);
        assert_eq!(midi.events()[0].time, 4);
    }

    #[test]
    fn test_removing_node_drops_its_edges() {
        let mut graph = ProcessorGraph::new(1, 1, 8);
        let a = graph.add_processor(Box::new(TestGain { gain: 2.0 }), props());
        graph.add_connection(AUDIO_IN_NODE_ID, 0, a, 0).unwrap();
        graph.add_connection(a, 0, AUDIO_OUT_NODE_ID, 0).unwrap();
        assert_eq!(graph.edges().len(), 2);

        assert!(graph.remove_node(a));
        assert!(graph.edges().is_empty());
        assert!(graph.node(a).is_none());
        // IO nodes cannot be removed
        assert!(!graph.remove_node(AUDIO_IN_NODE_ID));
    }

    #[test]
    fn test_cycle_does_not_hang_processing() {
        let mut graph = ProcessorGraph::new(1, 1, 8);
        let a = graph.add_processor(Box::new(TestGain { gain: 1.0 }), props());
        let b = graph.add_processor(Box::new(TestGain { gain: 1.0 }), props());
        graph.add_connection(a, 0, b, 0).unwrap();
        graph.add_connection(b, 0, a, 0).unwrap();

        let mut audio = vec![vec![0.5; 8]];
        let mut midi = EventBuffer::new();
        graph.process_block(&mut audio, &mut midi, 8);
        // no output path connected: silence
        assert!(audio[0].iter().all(|&s| s == 0.0));
    }
}
