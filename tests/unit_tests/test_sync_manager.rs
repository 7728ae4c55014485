// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use anyhow::Result;
use arena_net::{
    sync::{SyncError, SyncKind, SyncManager, SyncMessage, Syncable},
    value::Value,
};

#[derive(Debug, Clone, PartialEq)]
struct PlayerState {
    hp: i32,
    x: f32,
    z: f32,
    name: String,
}

impl Syncable for PlayerState {
    fn shape(&self) -> &'static str {
        "PlayerState"
    }

    fn to_fields(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("hp", self.hp.into()),
            ("x", self.x.into()),
            ("z", self.z.into()),
            ("name", self.name.clone().into()),
        ]
    }

    fn apply_field(&mut self, name: &str, value: &Value) -> Result<(), SyncError> {
        let mismatch = |expected: &'static str| SyncError::TypeMismatch {
            field: name.to_string(),
            expected,
            got: value.kind(),
        };
        match name {
            "hp" => self.hp = value.as_i32().ok_or_else(|| mismatch("i32"))?,
            "x" => self.x = value.as_f32().ok_or_else(|| mismatch("f32"))?,
            "z" => self.z = value.as_f32().ok_or_else(|| mismatch("f32"))?,
            "name" => {
                self.name = value.as_str().ok_or_else(|| mismatch("string"))?.to_string();
            },
            _ => return Err(SyncError::UnknownField(name.to_string())),
        }
        Ok(())
    }
}

fn player(hp: i32, x: f32, z: f32, name: &str) -> PlayerState {
    PlayerState {
        hp,
        x,
        z,
        name: name.to_string(),
    }
}

#[test]
fn untracked_entity_gets_a_full_sync() -> Result<()> {
    let sm = SyncManager::new();
    let s0 = player(100, 0.0, 0.0, "a");

    let (msg, changed) = sm.generate(1, &s0, false);
    assert!(changed);
    let msg = msg.expect("full message");
    assert_eq!(msg.kind, SyncKind::Full);

    // Applying the full message converges a fresh replica.
    let mut replica = player(0, 9.0, 9.0, "other");
    sm.apply(1, &mut replica, &msg)?;
    assert_eq!(replica, s0);
    Ok(())
}

#[test]
fn changed_field_gets_a_delta_that_converges() -> Result<()> {
    let sm = SyncManager::new();
    let s0 = player(100, 0.0, 0.0, "a");
    let s1 = player(100, 1.0, 0.0, "a");

    sm.track(1, &s0);
    let (msg, changed) = sm.generate(1, &s1, false);
    assert!(changed);
    let msg = msg.expect("delta message");
    assert_eq!(msg.kind, SyncKind::Delta);
    let deltas = msg.deltas.as_ref().expect("delta set");
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].name, "x");
    assert_eq!(deltas[0].value, Value::Float(1.0));

    let mut replica = s0.clone();
    sm.apply(1, &mut replica, &msg)?;
    assert_eq!(replica, s1);
    Ok(())
}

#[test]
fn unchanged_state_emits_nothing_but_advances_the_snapshot() {
    let sm = SyncManager::new();
    let s0 = player(100, 0.0, 0.0, "a");

    sm.track(1, &s0);
    let (msg, changed) = sm.generate(1, &s0, false);
    assert!(msg.is_none());
    assert!(!changed);

    // The baseline is s0; the next change diffs against it, not the
    // initial tracking call.
    let s1 = player(100, 2.0, 0.0, "a");
    let (msg, changed) = sm.generate(1, &s1, false);
    assert!(changed);
    assert_eq!(msg.expect("delta").kind, SyncKind::Delta);
}

#[test]
fn force_full_overrides_delta_generation() {
    let sm = SyncManager::new();
    let s0 = player(100, 0.0, 0.0, "a");
    let s1 = player(100, 1.0, 0.0, "a");

    sm.track(1, &s0);
    let (msg, changed) = sm.generate(1, &s1, true);
    assert!(changed);
    assert_eq!(msg.expect("full").kind, SyncKind::Full);
}

#[test]
fn stop_tracking_resets_to_full() {
    let sm = SyncManager::new();
    let s0 = player(100, 0.0, 0.0, "a");

    sm.track(1, &s0);
    assert!(sm.is_tracked(1));
    sm.stop_tracking(1);
    assert!(!sm.is_tracked(1));

    let (msg, _) = sm.generate(1, &s0, false);
    assert_eq!(msg.expect("full").kind, SyncKind::Full);
}

#[test]
fn entity_id_mismatch_is_rejected_on_apply() {
    let sm = SyncManager::new();
    let s0 = player(100, 0.0, 0.0, "a");

    let (msg, _) = sm.generate(1, &s0, false);
    let msg = msg.expect("full");

    let mut replica = s0.clone();
    assert_eq!(
        sm.apply(2, &mut replica, &msg),
        Err(SyncError::EntityMismatch {
            expected: 2,
            got: 1
        })
    );
}

#[test]
fn generate_then_apply_round_trips_arbitrary_pairs() -> Result<()> {
    let sm = SyncManager::new();
    let pairs = [
        (player(1, 0.0, 0.0, "a"), player(1, 0.0, 0.0, "a")),
        (player(1, 0.0, 0.0, "a"), player(2, 5.0, -3.5, "b")),
        (player(50, 1.0, 1.0, "x"), player(50, 1.0, 2.0, "x")),
    ];

    for (i, (s0, s1)) in pairs.into_iter().enumerate() {
        let entity = i as u64 + 10;
        sm.track(entity, &s0);

        let mut replica = s0.clone();
        let (msg, _) = sm.generate(entity, &s1, false);
        if let Some(msg) = msg {
            sm.apply(entity, &mut replica, &msg)?;
        }
        assert_eq!(replica, s1, "pair {i} must converge");
    }
    Ok(())
}

#[test]
fn wire_form_uses_the_compact_tags() -> Result<()> {
    let sm = SyncManager::new();
    let s0 = player(100, 0.0, 0.0, "a");
    let s1 = player(100, 1.0, 0.0, "a");

    sm.track(7, &s0);
    let (msg, _) = sm.generate(7, &s1, false);
    let raw = msg.expect("delta").marshal()?;

    let json: serde_json::Value = serde_json::from_slice(&raw)?;
    assert_eq!(json["mt"], 2);
    assert_eq!(json["eid"], 7);
    assert_eq!(json["delta"][0]["f"], "x");
    assert_eq!(json["delta"][0]["v"], 1.0);
    assert!(json.get("state").is_none());

    let parsed = SyncMessage::unmarshal(&raw)?;
    assert_eq!(parsed.kind, SyncKind::Delta);
    assert_eq!(parsed.entity_id, 7);
    Ok(())
}

#[test]
fn full_wire_form_round_trips() -> Result<()> {
    let sm = SyncManager::new();
    let s0 = player(42, 1.5, -2.0, "tank");

    let (msg, _) = sm.generate(3, &s0, true);
    let msg = msg.expect("full");
    let raw = msg.marshal()?;

    let json: serde_json::Value = serde_json::from_slice(&raw)?;
    assert_eq!(json["mt"], 1);
    assert_eq!(json["state"][0]["f"], "hp");

    let parsed = SyncMessage::unmarshal(&raw)?;
    assert_eq!(parsed, msg);
    Ok(())
}
