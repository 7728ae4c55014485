// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Discriminator carried on the wire as `mt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum SyncKind {
    Full = 1,
    Delta = 2,
}

impl TryFrom<u8> for SyncKind {
    type Error = String;

    fn try_from(v: u8) -> Result<Self, Self::Error> {
        match v {
            1 => Ok(SyncKind::Full),
            2 => Ok(SyncKind::Delta),
            other => Err(format!("unknown sync message type: {other}")),
        }
    }
}

impl From<SyncKind> for u8 {
    fn from(k: SyncKind) -> Self {
        k as u8
    }
}

/// One named field and its value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldEntry {
    #[serde(rename = "f")]
    pub name: String,
    #[serde(rename = "v")]
    pub value: Value,
}

impl FieldEntry {
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A delta is a field entry whose value differs from the last snapshot.
pub type Delta = FieldEntry;

/// A full snapshot: every observable field of a record, in declared order.
pub type Snapshot = Vec<FieldEntry>;

/// Either a full snapshot or a minimal field diff for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncMessage {
    #[serde(rename = "mt")]
    pub kind: SyncKind,
    #[serde(rename = "eid")]
    pub entity_id: u64,
    #[serde(rename = "state", default, skip_serializing_if = "Option::is_none")]
    pub state: Option<Snapshot>,
    #[serde(rename = "delta", default, skip_serializing_if = "Option::is_none")]
    pub deltas: Option<Vec<Delta>>,
}

impl SyncMessage {
    pub fn full(entity_id: u64, state: Snapshot) -> Self {
        Self {
            kind: SyncKind::Full,
            entity_id,
            state: Some(state),
            deltas: None,
        }
    }

    pub fn delta(entity_id: u64, deltas: Vec<Delta>) -> Self {
        Self {
            kind: SyncKind::Delta,
            entity_id,
            state: None,
            deltas: Some(deltas),
        }
    }

    pub fn marshal(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn unmarshal(data: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(data)
    }
}
