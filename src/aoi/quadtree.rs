// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use std::sync::RwLock;

use tracing::warn;

/// A tracked object's position on the world plane. Objects are 2-D; the
/// vertical axis is irrelevant to interest management.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub obj_id: u64,
    pub x: f32,
    pub z: f32,
}

impl Point {
    pub fn new(obj_id: u64, x: f32, z: f32) -> Self {
        Self { obj_id, x, z }
    }
}

/// Axis-aligned rectangle, half-open on both axes: `[min, max)`.
///
/// Half-open semantics tile the plane without double-counting: a point on
/// a shared border belongs to the tile whose `min` equals the coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f32,
    pub min_z: f32,
    pub max_x: f32,
    pub max_z: f32,
}

impl Rect {
    pub fn new(min_x: f32, min_z: f32, max_x: f32, max_z: f32) -> Self {
        Self {
            min_x,
            min_z,
            max_x,
            max_z,
        }
    }

    pub fn contains(&self, x: f32, z: f32) -> bool {
        x >= self.min_x && x < self.max_x && z >= self.min_z && z < self.max_z
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min_x < other.max_x
            && self.max_x > other.min_x
            && self.min_z < other.max_z
            && self.max_z > other.min_z
    }

    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f32 {
        self.max_z - self.min_z
    }
}

/// One node of the tree: either a leaf with a bounded point list, or an
/// internal node with four children ordered SW, SE, NW, NE by (x, z) half.
#[derive(Debug)]
struct Node {
    boundary: Rect,
    points: Vec<Point>,
    children: Option<Box<[Node; 4]>>,
    capacity: usize,
    depth: usize,
    max_depth: usize,
}

impl Node {
    fn new(boundary: Rect, capacity: usize, depth: usize, max_depth: usize) -> Self {
        Self {
            boundary,
            points: Vec::with_capacity(capacity),
            children: None,
            capacity,
            depth,
            max_depth,
        }
    }

    fn insert(&mut self, p: Point) -> bool {
        if !self.boundary.contains(p.x, p.z) {
            return false;
        }

        if self.children.is_none() {
            // A leaf at max depth never subdivides, it just grows.
            if self.points.len() < self.capacity || self.depth == self.max_depth {
                if self.points.iter().any(|q| q.obj_id == p.obj_id) {
                    return false;
                }
                self.points.push(p);
                return true;
            }
            self.subdivide();
        }

        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut() {
                if child.insert(p) {
                    return true;
                }
            }
        }

        // Unreachable with half-open tiling; kept as a tripwire.
        warn!(obj_id = p.obj_id, x = p.x, z = p.z, "point fits no child");
        false
    }

    fn subdivide(&mut self) {
        let x = self.boundary.min_x;
        let z = self.boundary.min_z;
        let hw = self.boundary.width() / 2.0;
        let hh = self.boundary.height() / 2.0;
        let next = self.depth + 1;
        let capacity = self.capacity;
        let max_depth = self.max_depth;

        let make = move |r: Rect| Node::new(r, capacity, next, max_depth);
        self.children = Some(Box::new([
            make(Rect::new(x, z, x + hw, z + hh)),
            make(Rect::new(x + hw, z, x + hw + hw, z + hh)),
            make(Rect::new(x, z + hh, x + hw, z + hh + hh)),
            make(Rect::new(x + hw, z + hh, x + hw + hw, z + hh + hh)),
        ]));

        let old = std::mem::take(&mut self.points);
        if let Some(children) = self.children.as_mut() {
            for p in old {
                let reinserted = children.iter_mut().any(|child| child.insert(p));
                if !reinserted {
                    warn!(obj_id = p.obj_id, "point lost while subdividing");
                }
            }
        }
    }

    fn remove(&mut self, p: Point) -> bool {
        if !self.boundary.contains(p.x, p.z) {
            return false;
        }

        match self.children.as_mut() {
            None => {
                // Match on id only; coordinates got us to the right leaf.
                let before = self.points.len();
                self.points.retain(|q| q.obj_id != p.obj_id);
                self.points.len() != before
            },
            Some(children) => children.iter_mut().any(|child| child.remove(p)),
        }
    }

    fn query_range(&self, range: &Rect, out: &mut Vec<u64>) {
        if !self.boundary.intersects(range) {
            return;
        }

        match self.children.as_ref() {
            None => {
                for p in &self.points {
                    if range.contains(p.x, p.z) {
                        out.push(p.obj_id);
                    }
                }
            },
            Some(children) => {
                for child in children.iter() {
                    child.query_range(range, out);
                }
            },
        }
    }
}

/// Concurrent quadtree over a fixed world rectangle.
///
/// The tree carries one reader/writer lock: range queries share it,
/// inserts and removes take it exclusively. Underfull siblings are never
/// merged; `clear` is the only way the tree shrinks.
#[derive(Debug)]
pub struct Quadtree {
    root: RwLock<Node>,
}

impl Quadtree {
    pub fn new(boundary: Rect, capacity: usize, max_depth: usize) -> Self {
        let capacity = capacity.max(1);
        let max_depth = if max_depth == 0 { 8 } else { max_depth };
        Self {
            root: RwLock::new(Node::new(boundary, capacity, 0, max_depth)),
        }
    }

    /// Stores the point in the leaf whose boundary contains it. Returns
    /// `false` when the point lies outside the root boundary or the target
    /// leaf already holds its `obj_id`.
    pub fn insert(&self, p: Point) -> bool {
        self.root
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(p)
    }

    /// Removes the entry matching `p.obj_id` from the leaf containing
    /// `(p.x, p.z)`. Returns whether an entry was removed.
    pub fn remove(&self, p: Point) -> bool {
        self.root
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(p)
    }

    /// All object ids whose position falls inside `range`. Order is
    /// unspecified; each point lives in exactly one leaf, so duplicates
    /// cannot occur.
    pub fn query_range(&self, range: &Rect) -> Vec<u64> {
        let mut out = Vec::new();
        self.root
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .query_range(range, &mut out);
        out
    }

    /// Drops every point and resets the tree to a single empty leaf.
    pub fn clear(&self) {
        let mut root = self.root.write().unwrap_or_else(|e| e.into_inner());
        *root = Node::new(root.boundary, root.capacity, 0, root.max_depth);
    }
}
