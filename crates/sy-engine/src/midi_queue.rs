//! MIDI-in staging queue
//!
//! Two pre-allocated vectors share one fixed-size pool: `pending` is the
//! producer side (driver MIDI thread, blocking lock), `data` the consumer
//! side (audio thread, try-lock only). Each block the consumer splices
//! `pending` into `data`, converts the entries to engine events with
//! block-relative timestamps, and clears. On lock contention the drain is
//! skipped for the block; events stay queued, delayed by at most one
//! block, never lost.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use sy_core::{EngineEvent, EventBuffer, MAX_MIDI_DATA, MAX_MIDI_IN_EVENTS};

/// A timestamped raw MIDI event in the staging pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtMidiEvent {
    /// Absolute time in samples, against the engine frame counter
    pub time: u64,
    pub size: u8,
    pub data: [u8; MAX_MIDI_DATA],
}

impl RtMidiEvent {
    /// Build from raw bytes; `None` when the message does not fit the
    /// inline payload
    pub fn from_bytes(time: u64, bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() || bytes.len() > MAX_MIDI_DATA {
            return None;
        }
        let mut data = [0u8; MAX_MIDI_DATA];
        data[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            time,
            size: bytes.len() as u8,
            data,
        })
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.size as usize]
    }
}

struct QueueInner {
    pending: Vec<RtMidiEvent>,
    data: Vec<RtMidiEvent>,
}

/// Wait-free-consumer staging queue for incoming MIDI
pub struct MidiInQueue {
    inner: Mutex<QueueInner>,
    /// Frame counter published at the start of each block, used to stamp
    /// events arriving from driver threads
    now: AtomicU64,
}

impl MidiInQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                pending: Vec::with_capacity(MAX_MIDI_IN_EVENTS),
                data: Vec::with_capacity(MAX_MIDI_IN_EVENTS),
            }),
            now: AtomicU64::new(0),
        }
    }

    /// Publish the current block's base frame
    pub fn set_now(&self, frame: u64) {
        self.now.store(frame, Ordering::Relaxed);
    }

    #[inline]
    pub fn now(&self) -> u64 {
        self.now.load(Ordering::Relaxed)
    }

    /// Producer path: append an event stamped with the current frame.
    ///
    /// Called from driver MIDI threads; the lock is taken blocking.
    pub fn push(&self, bytes: &[u8]) {
        self.push_at(self.now(), bytes);
    }

    /// Producer path with an explicit timestamp
    pub fn push_at(&self, time: u64, bytes: &[u8]) {
        let Some(event) = RtMidiEvent::from_bytes(time, bytes) else {
            log::warn!("MIDI event of {} bytes exceeds the inline payload, dropped", bytes.len());
            return;
        };

        let mut inner = self.inner.lock();
        if inner.pending.len() == inner.pending.capacity() {
            log::warn!("MIDI-in pool full, dropping oldest pending event");
            inner.pending.remove(0);
        }
        inner.pending.push(event);
    }

    /// Consumer path: drain staged events into the block's event buffer.
    ///
    /// Timestamps are normalised into `[0, nframes)` relative to
    /// `frame_base`; early events snap to 0, late events clamp to the
    /// last frame with a warning. Returns `false` when the lock was
    /// contended and the drain was skipped.
    pub fn drain_into(&self, events: &mut EventBuffer, frame_base: u64, nframes: u32) -> bool {
        let Some(mut inner) = self.inner.try_lock() else {
            return false;
        };
        let QueueInner { pending, data } = &mut *inner;

        // splice: both vectors keep their capacity, nothing allocates
        data.append(pending);

        let mut dropped = 0usize;
        for midi in data.iter() {
            let time = if midi.time < frame_base {
                0
            } else if midi.time >= frame_base + nframes as u64 {
                log::warn!(
                    "late MIDI event clamped: {} vs frame {}",
                    midi.time,
                    frame_base
                );
                nframes - 1
            } else {
                (midi.time - frame_base) as u32
            };

            let Some(event) = EngineEvent::midi(time, midi.bytes()) else {
                continue;
            };
            if !events.push(event) {
                dropped += 1;
            }
        }
        if dropped > 0 {
            log::warn!("event buffer full, dropped {dropped} MIDI events this block");
        }

        data.clear();
        true
    }

    /// Drop everything staged
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.pending.clear();
        inner.data.clear();
    }
}

impl Default for MidiInQueue {
    fn default() -> Self {
        Self::new()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    const BLOCK: u32 = 256;

    #[test]
    fn test_timestamps_normalise_into_block() {
        let queue = MidiInQueue::new();
        let base = 1024u64;

        queue.push_at(base - 10, &[0x90, 60, 100]); // early: snaps to 0
        queue.push_at(base + 5, &[0x90, 61, 100]); // in block
        queue.push_at(base + BLOCK as u64 - 1, &[0x90, 62, 100]); // last frame
        queue.push_at(base + BLOCK as u64 + 10, &[0x90, 63, 100]); // late: clamps

        let mut events = EventBuffer::new();
        assert!(queue.drain_into(&mut events, base, BLOCK));

        let times: Vec<u32> = events.iter().map(|e| e.time).collect();
        assert_eq!(times, vec![0, 5, BLOCK - 1, BLOCK - 1]);
    }

    #[test]
    fn test_drain_is_empty_after_drain() {
        let queue = MidiInQueue::new();
        queue.push_at(0, &[0x90, 60, 100]);

        let mut events = EventBuffer::new();
        queue.drain_into(&mut events, 0, BLOCK);
        assert_eq!(events.len(), 1);

        events.clear();
        queue.drain_into(&mut events, 0, BLOCK);
        assert!(events.is_empty());
    }

    #[test]
    fn test_contended_drain_keeps_events() {
        let queue = MidiInQueue::new();
        queue.push_at(0, &[0x90, 60, 100]);

        {
            let _hold = queue.inner.lock();
            let mut events = EventBuffer::new();
            // consumer must give up, not block
            assert!(!queue.drain_into(&mut events, 0, BLOCK));
            assert!(events.is_empty());
        }

        // next block gets the event
        let mut events = EventBuffer::new();
        assert!(queue.drain_into(&mut events, 0, BLOCK));
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_pool_overflow_drops_oldest() {
        let queue = MidiInQueue::new();
        for i in 0..(MAX_MIDI_IN_EVENTS + 3) {
            queue.push_at(i as u64, &[0x90, (i % 128) as u8, 100]);
        }

        let mut events = EventBuffer::with_capacity(MAX_MIDI_IN_EVENTS + 8);
        queue.drain_into(&mut events, 0, u32::MAX);
        assert_eq!(events.len(), MAX_MIDI_IN_EVENTS);
        // the three oldest events are gone
        assert_eq!(events.events()[0].time, 3);
    }

    #[test]
    fn test_oversized_event_dropped() {
        let queue = MidiInQueue::new();
        queue.push_at(0, &[0xF0, 1, 2, 3, 4, 5, 0xF7]);

        let mut events = EventBuffer::new();
        queue.drain_into(&mut events, 0, BLOCK);
        assert!(events.is_empty());
    }

    #[test]
    fn test_push_uses_published_frame() {
        let queue = MidiInQueue::new();
        queue.set_now(512);
        queue.push(&[0x90, 60, 100]);

        let mut events = EventBuffer::new();
        queue.drain_into(&mut events, 512, BLOCK);
        assert_eq!(events.events()[0].time, 0);
    }
}
