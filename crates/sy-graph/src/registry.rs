//! Connection registry
//!
//! An ordered list of active connections plus the monotonic id counter.
//! Mutation happens only on control threads; the audio thread reads the
//! per-topology structures that are kept in sync with this registry.

use sy_core::{Connection, ConnectionId, GroupId};

/// Ordered list of active connections with monotonic ids
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    list: Vec<Connection>,
    last_id: u32,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next connection id.
    ///
    /// Ids are monotone over the registry's lifetime, surviving `clear`.
    pub fn next_id(&mut self) -> ConnectionId {
        self.last_id += 1;
        ConnectionId(self.last_id)
    }

    /// Highest id allocated so far
    #[inline]
    pub fn last_id(&self) -> u32 {
        self.last_id
    }

    /// Append a connection; insertion order is preserved
    pub fn add(&mut self, connection: Connection) {
        debug_assert!(connection.id.is_valid());
        self.list.push(connection);
    }

    /// Find a connection by id
    pub fn find(&self, id: ConnectionId) -> Option<&Connection> {
        self.list.iter().find(|c| c.id == id)
    }

    /// Remove the connection with the given id, returning it
    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        let index = self.list.iter().position(|c| c.id == id)?;
        Some(self.list.remove(index))
    }

    /// Remove every connection matching the predicate, returning them in
    /// insertion order
    pub fn remove_if<F>(&mut self, mut predicate: F) -> Vec<Connection>
    where
        F: FnMut(&Connection) -> bool,
    {
        let mut removed = Vec::new();
        self.list.retain(|c| {
            if predicate(c) {
                removed.push(*c);
                false
            } else {
                true
            }
        });
        removed
    }

    /// Remove every connection touching the given group
    pub fn remove_group(&mut self, group: GroupId) -> Vec<Connection> {
        self.remove_if(|c| c.touches_group(group))
    }

    /// Empty the list, retaining `last_id`
    pub fn clear(&mut self) {
        self.list.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.list.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.list.is_empty()
    }

    /// Iterate in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Connection> {
        self.list.iter()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TESTS
// ═══════════════════════════════════════════════════════════════════════════════
