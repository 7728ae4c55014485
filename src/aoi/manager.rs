// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::{collections::HashMap, sync::Mutex};

use thiserror::Error;
use tracing::warn;

use crate::{
    aoi::quadtree::{Point, Quadtree, Rect},
    cfg::config::AoiConfig,
};

#[derive(Debug, Error, PartialEq)]
pub enum AoiError {
    #[error("object {0} is already tracked")]
    DuplicateId(u64),
    #[error("object {0} is not tracked")]
    UnknownObject(u64),
    #[error("object {obj_id} position ({x}, {z}) is outside the world boundary")]
    OutOfBounds { obj_id: u64, x: f32, z: f32 },
}

/// Interest management over one quadtree.
///
/// The auxiliary `obj_id -> Point` map remembers where each object
/// actually is, so callers never need to supply accurate old coordinates.
/// A mutex serializes every mutation to keep the map and the tree
/// mutually consistent; queries go straight to the tree's own lock.
#[derive(Debug)]
pub struct AoiManager {
    tree: Quadtree,
    objects: Mutex<HashMap<u64, Point>>,
    view_range: f32,
}

impl AoiManager {
    pub fn new(boundary: Rect, capacity: usize, max_depth: usize, view_range: f32) -> Self {
        Self {
            tree: Quadtree::new(boundary, capacity, max_depth),
            objects: Mutex::new(HashMap::new()),
            view_range,
        }
    }

    pub fn from_config(cfg: &AoiConfig) -> Self {
        Self::new(
            Rect::new(cfg.min_x, cfg.min_z, cfg.max_x, cfg.max_z),
            cfg.capacity,
            cfg.max_depth,
            cfg.view_range,
        )
    }

    /// Starts tracking a new object at `(x, z)`.
    pub fn add(&self, obj_id: u64, x: f32, z: f32) -> Result<(), AoiError> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());

        if objects.contains_key(&obj_id) {
            return Err(AoiError::DuplicateId(obj_id));
        }

        let p = Point::new(obj_id, x, z);
        if !self.tree.insert(p) {
            return Err(AoiError::OutOfBounds { obj_id, x, z });
        }

        objects.insert(obj_id, p);
        Ok(())
    }

    /// Stops tracking an object. The coordinates are advisory; the stored
    /// position is the source of truth. A tree miss is logged but the map
    /// entry is deleted regardless, so the caller's intent still succeeds.
    pub fn remove(&self, obj_id: u64, _x: f32, _z: f32) -> Result<(), AoiError> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());

        let stored = objects
            .get(&obj_id)
            .copied()
            .ok_or(AoiError::UnknownObject(obj_id))?;

        if !self.tree.remove(stored) {
            warn!(obj_id, "object missing from quadtree on remove");
        }

        objects.remove(&obj_id);
        Ok(())
    }

    /// Moves an object to `(new_x, new_z)` as one atomic step. Old
    /// coordinates are advisory and ignored. When the new position is out
    /// of bounds the object is dropped from tracking entirely.
    pub fn update(
        &self,
        obj_id: u64,
        _old_x: f32,
        _old_z: f32,
        new_x: f32,
        new_z: f32,
    ) -> Result<(), AoiError> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());

        let stored = objects
            .get(&obj_id)
            .copied()
            .ok_or(AoiError::UnknownObject(obj_id))?;

        if !self.tree.remove(stored) {
            warn!(obj_id, "object missing from quadtree on update");
        }

        let moved = Point::new(obj_id, new_x, new_z);
        if !self.tree.insert(moved) {
            objects.remove(&obj_id);
            return Err(AoiError::OutOfBounds {
                obj_id,
                x: new_x,
                z: new_z,
            });
        }

        objects.insert(obj_id, moved);
        Ok(())
    }

    /// Object ids inside the square window `[x-R, x+R) x [z-R, z+R)` with
    /// `R` = the configured view range.
    pub fn query_surround(&self, x: f32, z: f32) -> Vec<u64> {
        let r = self.view_range;
        self.tree
            .query_range(&Rect::new(x - r, z - r, x + r, z + r))
    }

    /// Arbitrary range query, exposed for handlers that need a window
    /// other than the configured view range.
    pub fn query_range(&self, range: &Rect) -> Vec<u64> {
        self.tree.query_range(range)
    }

    pub fn len(&self) -> usize {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
