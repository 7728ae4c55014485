// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, sync::Mutex};

use tracing::{debug, warn};

use crate::sync::{
    delta::{SyncError, Syncable, apply_delta, apply_snapshot, generate_delta, snapshot_of},
    protocol::{Snapshot, SyncKind, SyncMessage},
};

/// Per-entity last-known snapshots on the sending side.
///
/// After every successful `generate` the tracked snapshot equals the
/// current state that was passed in, including the no-change case, so a
/// receiver that applies every emitted message converges on the sender.
#[derive(Debug, Default)]
pub struct SyncManager {
    tracked: Mutex<HashMap<u64, Snapshot>>,
}

impl SyncManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&self, entity_id: u64, initial: &dyn Syncable) {
        let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
        tracked.insert(entity_id, snapshot_of(initial));
        debug!(entity_id, "tracking entity");
    }

    pub fn stop_tracking(&self, entity_id: u64) {
        let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());
        tracked.remove(&entity_id);
        debug!(entity_id, "stopped tracking entity");
    }

    pub fn is_tracked(&self, entity_id: u64) -> bool {
        self.tracked
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&entity_id)
    }

    /// Produces the message that brings a remote replica up to date, and
    /// whether anything changed.
    ///
    /// Full is emitted when forced, when the entity is not yet tracked,
    /// and when diffing fails (a shape change mid-stream); falling back to
    /// Full on error means an update is never lost, only sent fat. An
    /// empty diff emits nothing but still advances the tracked snapshot.
    pub fn generate(
        &self,
        entity_id: u64,
        current: &dyn Syncable,
        force_full: bool,
    ) -> (Option<SyncMessage>, bool) {
        let mut tracked = self.tracked.lock().unwrap_or_else(|e| e.into_inner());

        let snap = snapshot_of(current);

        let prev = if force_full {
            None
        } else {
            tracked.get(&entity_id).cloned()
        };
        let Some(prev) = prev else {
            debug!(entity_id, force_full, "generating full sync");
            tracked.insert(entity_id, snap.clone());
            return (Some(SyncMessage::full(entity_id, snap)), true);
        };

        match generate_delta(&prev, &snap) {
            Err(err) => {
                warn!(entity_id, %err, "delta generation failed, falling back to full sync");
                tracked.insert(entity_id, snap.clone());
                (Some(SyncMessage::full(entity_id, snap)), true)
            },
            Ok(deltas) => {
                tracked.insert(entity_id, snap);
                if deltas.is_empty() {
                    (None, false)
                } else {
                    (Some(SyncMessage::delta(entity_id, deltas)), true)
                }
            },
        }
    }

    /// Applies a received message to a live replica.
    pub fn apply(
        &self,
        entity_id: u64,
        target: &mut dyn Syncable,
        msg: &SyncMessage,
    ) -> Result<(), SyncError> {
        if msg.entity_id != entity_id {
            return Err(SyncError::EntityMismatch {
                expected: entity_id,
                got: msg.entity_id,
            });
        }

        match msg.kind {
            SyncKind::Full => {
                let state = msg
                    .state
                    .as_ref()
                    .ok_or(SyncError::MissingPayload("full sync without state"))?;
                apply_snapshot(target, state)
            },
            SyncKind::Delta => {
                let deltas = msg
                    .deltas
                    .as_ref()
                    .ok_or(SyncError::MissingPayload("delta sync without delta set"))?;
                apply_delta(target, deltas)
            },
        }
    }
}
