// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use thiserror::Error;
use tracing::warn;

use crate::{
    sync::protocol::{Delta, FieldEntry, Snapshot},
    value::Value,
};

#[derive(Debug, Error, PartialEq)]
pub enum SyncError {
    #[error("snapshot shapes differ: [{expected}] vs [{got}]")]
    ShapeMismatch { expected: String, got: String },
    #[error("field '{0}' not present in target")]
    UnknownField(String),
    #[error("type mismatch for field '{field}': expected {expected}, got {got}")]
    TypeMismatch {
        field: String,
        expected: &'static str,
        got: &'static str,
    },
    #[error("sync message is for entity {got}, expected {expected}")]
    EntityMismatch { expected: u64, got: u64 },
    #[error("sync message missing payload: {0}")]
    MissingPayload(&'static str),
}

/// A record whose state can be replicated field by field.
///
/// `to_fields` exposes the observable fields in declared order; fields the
/// type chooses not to expose simply stay out of the list. `apply_field`
/// writes one field back and should accept any `Value` the matching
/// `as_*` helper converts losslessly (an `Int` snapshot of a float field,
/// a fraction-free `Float` for an integer field); everything else is a
/// `TypeMismatch`.
pub trait Syncable {
    /// Stable tag identifying the record shape. Two snapshots with
    /// different tags are incomparable.
    fn shape(&self) -> &'static str;

    /// Observable fields in declared order.
    fn to_fields(&self) -> Vec<(&'static str, Value)>;

    /// Writes one field back. `UnknownField` and `TypeMismatch` are the
    /// only expected failures.
    fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), SyncError>;
}

/// Captures the current observable state as an ordered snapshot.
pub fn snapshot_of(state: &dyn Syncable) -> Snapshot {
    state
        .to_fields()
        .into_iter()
        .map(|(name, value)| FieldEntry::new(name, value))
        .collect()
}

/// Computes the ordered list of fields whose value changed between two
/// same-shape snapshots. Differing field sequences are a `ShapeMismatch`.
/// The result may be empty.
pub fn generate_delta(old: &[FieldEntry], new: &[FieldEntry]) -> Result<Vec<Delta>, SyncError> {
    let same_shape = old.len() == new.len()
        && old.iter().zip(new.iter()).all(|(a, b)| a.name == b.name);
    if !same_shape {
        let join = |s: &[FieldEntry]| {
            s.iter()
                .map(|e| e.name.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        };
        return Err(SyncError::ShapeMismatch {
            expected: join(old),
            got: join(new),
        });
    }

    Ok(new
        .iter()
        .zip(old.iter())
        .filter(|(n, o)| n.value != o.value)
        .map(|(n, _)| n.clone())
        .collect())
}

/// Applies a delta list to a live record. An unknown field (older receiver
/// talking to a newer sender, or vice versa) and a field whose value
/// cannot be converted are logged and skipped; neither aborts the rest of
/// the list.
pub fn apply_delta(target: &mut dyn Syncable, deltas: &[Delta]) -> Result<(), SyncError> {
    for delta in deltas {
        apply_one(target, &delta.name, &delta.value)?;
    }
    Ok(())
}

/// Full overwrite: applies every field of a snapshot with the same
/// skip-on-unknown semantics as `apply_delta`.
pub fn apply_snapshot(target: &mut dyn Syncable, state: &[FieldEntry]) -> Result<(), SyncError> {
    for entry in state {
        apply_one(target, &entry.name, &entry.value)?;
    }
    Ok(())
}

fn apply_one(target: &mut dyn Syncable, name: &str, value: &Value) -> Result<(), SyncError> {
    match target.apply_field(name, value) {
        Ok(()) => Ok(()),
        Err(SyncError::UnknownField(field)) => {
            warn!(shape = target.shape(), field, "skipping unknown field");
            Ok(())
        },
        Err(SyncError::TypeMismatch {
            field,
            expected,
            got,
        }) => {
            warn!(
                shape = target.shape(),
                field, expected, got, "skipping field with mismatched type"
            );
            Ok(())
        },
        Err(other) => Err(other),
    }
}
