//! Engine events and per-block event buffers
//!
//! Events flowing through the graphs are either control events (parameter
//! changes, bank/program selects, all-off messages) or raw MIDI events
//! with a small inline payload. Buffers are pre-allocated to a fixed
//! capacity and never grow; the audio thread clears and refills them
//! without touching the allocator.

use serde::{Deserialize, Serialize};

use crate::{MAX_ENGINE_EVENTS, MAX_MIDI_DATA};

/// MIDI 1.0 status bytes used by the engine
pub mod status {
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
}

/// MIDI CC numbers used by the engine
pub mod cc {
    pub const BANK_SELECT_MSB: u8 = 0;
    pub const ALL_SOUND_OFF: u8 = 120;
    pub const ALL_NOTES_OFF: u8 = 123;
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Control-plane event routed alongside MIDI
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EngineControlEvent {
    /// Parameter change; converts to a CC message when `index` is a valid
    /// controller number
    Parameter { index: u16, value: f32 },
    /// MIDI bank select (CC 0)
    MidiBank { bank: u16 },
    /// MIDI program change
    MidiProgram { program: u16 },
    AllSoundOff,
    AllNotesOff,
}

impl EngineControlEvent {
    /// Render this control event as raw MIDI bytes for the given channel.
    ///
    /// Returns the number of bytes written, 0 when the event has no MIDI
    /// representation.
    pub fn convert_to_midi_data(&self, channel: u8, out: &mut [u8; 3]) -> u8 {
        let ch = channel & 0x0F;
        match *self {
            Self::Parameter { index, value } => {
                if index >= 0x78 {
                    return 0;
                }
                out[0] = status::CONTROL_CHANGE | ch;
                out[1] = index as u8;
                out[2] = (value.clamp(0.0, 1.0) * 127.0) as u8;
                3
            }
            Self::MidiBank { bank } => {
                out[0] = status::CONTROL_CHANGE | ch;
                out[1] = cc::BANK_SELECT_MSB;
                out[2] = (bank & 0x7F) as u8;
                3
            }
            Self::MidiProgram { program } => {
                out[0] = status::PROGRAM_CHANGE | ch;
                out[1] = (program & 0x7F) as u8;
                2
            }
            Self::AllSoundOff => {
                out[0] = status::CONTROL_CHANGE | ch;
                out[1] = cc::ALL_SOUND_OFF;
                out[2] = 0;
                3
            }
            Self::AllNotesOff => {
                out[0] = status::CONTROL_CHANGE | ch;
                out[1] = cc::ALL_NOTES_OFF;
                out[2] = 0;
                3
            }
        }
    }
}

/// Raw MIDI event with inline payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EngineMidiEvent {
    /// Event port within the plugin (0 = default port)
    pub port: u8,
    /// Number of valid bytes in `data`
    pub size: u8,
    pub data: [u8; MAX_MIDI_DATA],
}

impl EngineMidiEvent {
    /// Build from raw bytes; `None` when the message does not fit the
    /// inline payload
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > MAX_MIDI_DATA {
            return None;
        }
        let mut data = [0u8; MAX_MIDI_DATA];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            port: 0,
            size: bytes.len() as u8,
            data,
        })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.size as usize]
    }
}

/// The payload of an engine event
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum EngineEventKind {
    #[default]
    Null,
    Control(EngineControlEvent),
    Midi(EngineMidiEvent),
}

/// A timestamped event inside one audio block
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Frame offset within the current block, `0..nframes`
    pub time: u32,
    /// MIDI channel, 0-15
    pub channel: u8,
    pub kind: EngineEventKind,
}

impl EngineEvent {
    pub fn midi(time: u32, bytes: &[u8]) -> Option<Self> {
        let midi = EngineMidiEvent::from_bytes(bytes)?;
        let channel = if bytes[0] >= 0x80 && bytes[0] < 0xF0 {
            bytes[0] & 0x0F
        } else {
            0
        };
        Some(Self {
            time,
            channel,
            kind: EngineEventKind::Midi(midi),
        })
    }

    pub fn control(time: u32, channel: u8, event: EngineControlEvent) -> Self {
        Self {
            time,
            channel,
            kind: EngineEventKind::Control(event),
        }
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self.kind, EngineEventKind::Null)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT BUFFER
// ═══════════════════════════════════════════════════════════════════════════════

/// Fixed-capacity event buffer.
///
/// Capacity is reserved at construction; `clear` keeps the allocation so
/// the audio thread can refill it without allocating.
#[derive(Debug, Clone)]
pub struct EventBuffer {
    events: Vec<EngineEvent>,
}

impl EventBuffer {
    pub fn new() -> Self {
        Self::with_capacity(MAX_ENGINE_EVENTS)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.events.capacity()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    #[inline]
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Append one event; `false` when the buffer is full
    #[inline]
    pub fn push(&mut self, event: EngineEvent) -> bool {
        if self.events.len() == self.events.capacity() {
            return false;
        }
        self.events.push(event);
        true
    }

    #[inline]
    pub fn events(&self) -> &[EngineEvent] {
        &self.events
    }

    pub fn iter(&self) -> std::slice::Iter<'_, EngineEvent> {
        self.events.iter()
    }

    /// Replace contents with a copy of `other`, truncating at capacity.
    /// Returns the number of events that did not fit.
    pub fn copy_from(&mut self, other: &EventBuffer) -> usize {
        self.events.clear();
        let take = other.events.len().min(self.events.capacity());
        self.events.extend_from_slice(&other.events[..take]);
        other.events.len() - take
    }

    /// Append a copy of `other`, truncating at capacity.
    /// Returns the number of events that did not fit.
    pub fn append_from(&mut self, other: &EventBuffer) -> usize {
        let room = self.events.capacity() - self.events.len();
        let take = other.events.len().min(room);
        self.events.extend_from_slice(&other.events[..take]);
        other.events.len() - take
    }

    /// In-place sort by frame offset
    pub fn sort_by_time(&mut self) {
        self.events.sort_unstable_by_key(|e| e.time);
    }

    /// Replace contents with the timestamp-ordered merge of two buffers.
    ///
    /// Both inputs must already be time-ordered; events from `first` win
    /// ties. Truncates at capacity.
    pub fn fill_merged(&mut self, first: &EventBuffer, second: &EventBuffer) {
        self.events.clear();
        let (a, b) = (&first.events, &second.events);
        let (mut i, mut j) = (0, 0);
        while self.events.len() < self.events.capacity() {
            let take_a = match (a.get(i), b.get(j)) {
                (Some(ea), Some(eb)) => ea.time <= eb.time,
                (Some(_), None) => true,
                (None, Some(_)) => false,
                (None, None) => break,
            };
            if take_a {
                self.events.push(a[i]);
                i += 1;
            } else {
                self.events.push(b[j]);
                j += 1;
            }
        }
    }
}

impl Default for EventBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
