// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::Arc;

use dashmap::DashMap;
use tracing::info;

use crate::net::{connection::Connection, error::NetError};

/// Registry of live connections keyed by connection id.
///
/// An id present here belongs to a connection that is active or still
/// stopping; stop removes it exactly once. Uniqueness of keys is the id
/// allocator's job, so `add` silently replaces.
#[derive(Debug, Default)]
pub struct ConnRegistry {
    connections: DashMap<u64, Arc<Connection>>,
}

impl ConnRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, conn: Arc<Connection>) {
        self.connections.insert(conn.conn_id(), conn);
    }

    pub fn remove(&self, conn_id: u64) -> Result<(), NetError> {
        self.connections
            .remove(&conn_id)
            .map(|_| ())
            .ok_or(NetError::ConnNotFound(conn_id))
    }

    pub fn get(&self, conn_id: u64) -> Option<Arc<Connection>> {
        self.connections.get(&conn_id).map(|e| Arc::clone(e.value()))
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Stops every registered connection. Each stop removes its own entry,
    /// so the snapshot is taken first; racing with in-progress stops is
    /// fine because stop is idempotent.
    pub fn clear(&self) {
        let conns: Vec<Arc<Connection>> = self
            .connections
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();

        for conn in conns {
            conn.stop();
        }

        info!(remaining = self.connections.len(), "all connections cleared");
    }
}
