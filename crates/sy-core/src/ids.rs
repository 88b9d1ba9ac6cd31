//! Group, port and connection identifiers
//!
//! Groups name clients in the topology (the host itself, the hardware
//! endpoints, plugin nodes). Ports are small integers unique within their
//! group. In patchbay mode port ids live in a fixed offset plane so that a
//! single `(group, port)` pair encodes both type (audio/MIDI) and
//! direction without a separate field.

use serde::{Deserialize, Serialize};

use crate::MAX_PATCHBAY_PLUGINS;

/// Identifies a client (group of ports) in the topology
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub u32);

impl GroupId {
    /// The host's own endpoints (rack mode)
    pub const CARLA: Self = Self(1);
    /// Hardware audio capture
    pub const AUDIO_IN: Self = Self(2);
    /// Hardware audio playback
    pub const AUDIO_OUT: Self = Self(3);
    /// External MIDI inputs
    pub const MIDI_IN: Self = Self(4);
    /// External MIDI outputs
    pub const MIDI_OUT: Self = Self(5);

    /// First group id available to patchbay plugin nodes
    pub const FIRST_PLUGIN: u32 = 6;

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// True for the fixed rack groups other than Carla itself
    #[inline]
    pub fn is_rack_external(self) -> bool {
        self.0 > Self::CARLA.0 && self.0 <= Self::MIDI_OUT.0
    }
}

/// Identifies a port within its group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PortId(pub u32);

impl PortId {
    // Fixed ids of the six Carla rack ports
    pub const RACK_AUDIO_IN1: Self = Self(1);
    pub const RACK_AUDIO_IN2: Self = Self(2);
    pub const RACK_AUDIO_OUT1: Self = Self(3);
    pub const RACK_AUDIO_OUT2: Self = Self(4);
    pub const RACK_MIDI_IN: Self = Self(5);
    pub const RACK_MIDI_OUT: Self = Self(6);

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    /// True when this is one of the six fixed Carla rack port ids
    #[inline]
    pub fn is_rack_carla_port(self) -> bool {
        self.0 >= Self::RACK_AUDIO_IN1.0 && self.0 <= Self::RACK_MIDI_OUT.0
    }
}

/// Monotonic connection identifier; 0 is reserved for "invalid"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    pub const INVALID: Self = Self(0);

    #[inline]
    pub fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// A directed edge from an output port (`a`) to an input port (`b`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub id: ConnectionId,
    pub group_a: GroupId,
    pub port_a: PortId,
    pub group_b: GroupId,
    pub port_b: PortId,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        group_a: GroupId,
        port_a: PortId,
        group_b: GroupId,
        port_b: PortId,
    ) -> Self {
        Self {
            id,
            group_a,
            port_a,
            group_b,
            port_b,
        }
    }

    /// Callback payload format: `"gA:pA:gB:pB"`
    pub fn payload(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.group_a.0, self.port_a.0, self.group_b.0, self.port_b.0
        )
    }

    #[inline]
    pub fn touches_group(&self, group: GroupId) -> bool {
        self.group_a == group || self.group_b == group
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PATCHBAY PORT PLANE
// ═══════════════════════════════════════════════════════════════════════════════

/// First audio-input port id of a patchbay node
pub const AUDIO_IN_PORT_OFFSET: u32 = MAX_PATCHBAY_PLUGINS;
/// First audio-output port id of a patchbay node
pub const AUDIO_OUT_PORT_OFFSET: u32 = MAX_PATCHBAY_PLUGINS * 2;
/// The MIDI-input port id of a patchbay node
pub const MIDI_IN_PORT_OFFSET: u32 = MAX_PATCHBAY_PLUGINS * 3;
/// The MIDI-output port id of a patchbay node
pub const MIDI_OUT_PORT_OFFSET: u32 = MAX_PATCHBAY_PLUGINS * 3 + 1;

/// Sentinel channel index carrying MIDI through the underlying node graph
pub const MIDI_CHANNEL_INDEX: u32 = 0x1000;

/// A patchbay port id decoded into type, direction and raw channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchbayPortClass {
    AudioIn(u32),
    AudioOut(u32),
    MidiIn,
    MidiOut,
}

impl PatchbayPortClass {
    /// Decode an offset-encoded patchbay port id
    pub fn classify(port: PortId) -> Option<Self> {
        let id = port.0;
        if id == MIDI_IN_PORT_OFFSET {
            Some(Self::MidiIn)
        } else if id == MIDI_OUT_PORT_OFFSET {
            Some(Self::MidiOut)
        } else if (AUDIO_OUT_PORT_OFFSET..MIDI_IN_PORT_OFFSET).contains(&id) {
            Some(Self::AudioOut(id - AUDIO_OUT_PORT_OFFSET))
        } else if (AUDIO_IN_PORT_OFFSET..AUDIO_OUT_PORT_OFFSET).contains(&id) {
            Some(Self::AudioIn(id - AUDIO_IN_PORT_OFFSET))
        } else {
            None
        }
    }

    /// The raw channel index used by the underlying graph
    #[inline]
    pub fn raw_channel(self) -> u32 {
        match self {
            Self::AudioIn(ch) | Self::AudioOut(ch) => ch,
            Self::MidiIn | Self::MidiOut => MIDI_CHANNEL_INDEX,
        }
    }

    #[inline]
    pub fn is_input(self) -> bool {
        matches!(self, Self::AudioIn(_) | Self::MidiIn)
    }

    #[inline]
    pub fn is_midi(self) -> bool {
        matches!(self, Self::MidiIn | Self::MidiOut)
    }
}

/// Offset-encode an audio input channel
#[inline]
pub fn audio_in_port(channel: u32) -> PortId {
    PortId(AUDIO_IN_PORT_OFFSET + channel)
}

/// Offset-encode an audio output channel
#[inline]
pub fn audio_out_port(channel: u32) -> PortId {
    PortId(AUDIO_OUT_PORT_OFFSET + channel)
}

/// The offset-encoded MIDI input port
#[inline]
pub fn midi_in_port() -> PortId {
    PortId(MIDI_IN_PORT_OFFSET)
}

/// The offset-encoded MIDI output port
#[inline]
pub fn midi_out_port() -> PortId {
    PortId(MIDI_OUT_PORT_OFFSET)
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_plane_round_trip() {
        assert_eq!(
            PatchbayPortClass::classify(audio_in_port(3)),
            Some(PatchbayPortClass::AudioIn(3))
        );
        assert_eq!(
            PatchbayPortClass::classify(audio_out_port(0)),
            Some(PatchbayPortClass::AudioOut(0))
        );
        assert_eq!(
            PatchbayPortClass::classify(midi_in_port()),
            Some(PatchbayPortClass::MidiIn)
        );
        assert_eq!(
            PatchbayPortClass::classify(midi_out_port()),
            Some(PatchbayPortClass::MidiOut)
        );
    }

    #[test]
    fn test_port_plane_rejects_out_of_plane_ids() {
        assert_eq!(PatchbayPortClass::classify(PortId(0)), None);
        assert_eq!(PatchbayPortClass::classify(PortId(MAX_PATCHBAY_PLUGINS - 1)), None);
        assert_eq!(
            PatchbayPortClass::classify(PortId(MIDI_OUT_PORT_OFFSET + 1)),
            None
        );
    }

    #[test]
    fn test_midi_ports_collapse_to_sentinel() {
        let class = PatchbayPortClass::classify(midi_in_port()).unwrap();
        assert_eq!(class.raw_channel(), MIDI_CHANNEL_INDEX);
        assert!(class.is_midi());
        assert!(class.is_input());
        let class = PatchbayPortClass::classify(midi_out_port()).unwrap();
        assert_eq!(class.raw_channel(), MIDI_CHANNEL_INDEX);
        assert!(class.is_midi());
        assert!(!class.is_input());
        assert!(!PatchbayPortClass::AudioIn(0).is_midi());
    }

    #[test]
    fn test_connection_payload() {
        let conn = Connection::new(
            ConnectionId(7),
            GroupId::AUDIO_IN,
            PortId(1),
            GroupId::CARLA,
            PortId::RACK_AUDIO_IN1,
        );
        assert_eq!(conn.payload(), "2:1:1:1");
        assert!(conn.touches_group(GroupId::CARLA));
        assert!(!conn.touches_group(GroupId::MIDI_OUT));
    }

    #[test]
    fn test_rack_carla_port_range() {
        assert!(PortId::RACK_AUDIO_IN1.is_rack_carla_port());
        assert!(PortId::RACK_MIDI_OUT.is_rack_carla_port());
        assert!(!PortId(0).is_rack_carla_port());
        assert!(!PortId(7).is_rack_carla_port());
    }
}
