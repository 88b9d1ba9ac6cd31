//! Host-callback event taxonomy
//!
//! The engine publishes topology changes to its host through a single
//! callback object. Events carry everything a patchbay UI needs to mirror
//! the graph: clients, ports, connections, engine lifecycle and errors.

use serde::{Deserialize, Serialize};

use crate::{ConnectionId, GroupId, PortId};

// Port flag bits carried by `PatchbayPortAdded`
pub const PORT_IS_INPUT: u32 = 0x1;
pub const PORT_TYPE_AUDIO: u32 = 0x2;
pub const PORT_TYPE_MIDI: u32 = 0x4;

/// Icon hint for `PatchbayClientAdded`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClientIcon {
    Host,
    Hardware,
    Plugin,
}

/// Events emitted through the host callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PatchbayEvent {
    ClientAdded {
        group: GroupId,
        icon: ClientIcon,
        /// Plugin index for plugin clients, `None` for system clients
        plugin_id: Option<u32>,
        name: String,
    },
    ClientRemoved {
        group: GroupId,
    },
    PortAdded {
        group: GroupId,
        port: PortId,
        flags: u32,
        name: String,
    },
    PortRemoved {
        group: GroupId,
        port: PortId,
    },
    ConnectionAdded {
        id: ConnectionId,
        /// `"gA:pA:gB:pB"`
        payload: String,
    },
    ConnectionRemoved {
        id: ConnectionId,
    },
    EngineStarted {
        driver: String,
    },
    Error {
        message: String,
    },
}

/// The capability through which the engine publishes topology changes.
///
/// Fired from control threads only, never from the audio thread.
pub trait HostCallback: Send + Sync {
    fn on_event(&self, event: PatchbayEvent);
}

/// Callback sink that discards every event
#[derive(Debug, Default)]
pub struct NullCallback;

impl HostCallback for NullCallback {
    fn on_event(&self, _event: PatchbayEvent) {}
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Callback sink that records events, for tests
    struct Recorder(Mutex<Vec<PatchbayEvent>>);

    impl HostCallback for Recorder {
        fn on_event(&self, event: PatchbayEvent) {
            self.0.lock().unwrap().push(event);
        }
    }

    #[test]
    fn test_callback_dispatch() {
        let recorder = Recorder(Mutex::new(Vec::new()));
        recorder.on_event(PatchbayEvent::ConnectionRemoved {
            id: ConnectionId(3),
        });
        let events = recorder.0.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0],
            PatchbayEvent::ConnectionRemoved {
                id: ConnectionId(3)
            }
        );
    }

    #[test]
    fn test_port_flags_compose() {
        let flags = PORT_TYPE_MIDI | PORT_IS_INPUT;
        assert_ne!(flags & PORT_IS_INPUT, 0);
        assert_ne!(flags & PORT_TYPE_MIDI, 0);
        assert_eq!(flags & PORT_TYPE_AUDIO, 0);
    }
}
