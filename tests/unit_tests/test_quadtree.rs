// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

use arena_net::aoi::{Point, Quadtree, Rect};

fn world() -> Rect {
    Rect::new(0.0, 0.0, 100.0, 100.0)
}

fn sorted(mut ids: Vec<u64>) -> Vec<u64> {
    ids.sort_unstable();
    ids
}

#[test]
fn insert_and_query_window() {
    let qt = Quadtree::new(world(), 2, 4);
    for (id, x, z) in [
        (1, 10.0, 10.0),
        (2, 20.0, 20.0),
        (3, 80.0, 80.0),
        (4, 15.0, 15.0),
    ] {
        assert!(qt.insert(Point::new(id, x, z)), "insert {id}");
    }

    let hits = qt.query_range(&Rect::new(0.0, 0.0, 30.0, 30.0));
    assert_eq!(sorted(hits), vec![1, 2, 4]);
}

#[test]
fn out_of_bounds_insert_fails() {
    let qt = Quadtree::new(world(), 4, 8);
    assert!(!qt.insert(Point::new(1, 100.0, 50.0)));
    assert!(!qt.insert(Point::new(2, -0.1, 50.0)));
    assert!(qt.query_range(&world()).is_empty());
}

#[test]
fn duplicate_id_in_target_leaf_fails() {
    let qt = Quadtree::new(world(), 4, 8);
    assert!(qt.insert(Point::new(1, 10.0, 10.0)));
    assert!(!qt.insert(Point::new(1, 12.0, 12.0)));
    assert_eq!(qt.query_range(&world()).len(), 1);
}

#[test]
fn boundary_points_belong_to_the_min_side_tile() {
    // Capacity 1 forces a subdivision at (50, 50).
    let qt = Quadtree::new(world(), 1, 4);
    assert!(qt.insert(Point::new(1, 10.0, 10.0)));
    assert!(qt.insert(Point::new(2, 50.0, 50.0)));

    // The split point sits on the shared border; half-open tiling puts it
    // in the tile whose min equals the coordinate.
    assert_eq!(qt.query_range(&Rect::new(50.0, 50.0, 100.0, 100.0)), vec![2]);
    assert!(
        qt.query_range(&Rect::new(0.0, 0.0, 50.0, 50.0))
            .iter()
            .all(|&id| id != 2)
    );
}

#[test]
fn query_half_open_on_window_edges() {
    let qt = Quadtree::new(world(), 4, 8);
    assert!(qt.insert(Point::new(1, 30.0, 30.0)));

    // max edge excluded, min edge included
    assert!(qt.query_range(&Rect::new(0.0, 0.0, 30.0, 30.0)).is_empty());
    assert_eq!(qt.query_range(&Rect::new(30.0, 30.0, 31.0, 31.0)), vec![1]);
}

#[test]
fn remove_by_id_ignores_exact_coords() {
    let qt = Quadtree::new(world(), 4, 8);
    assert!(qt.insert(Point::new(1, 10.0, 10.0)));

    // Different coordinates, same leaf: the id is what matters.
    assert!(qt.remove(Point::new(1, 11.0, 11.0)));
    assert!(!qt.remove(Point::new(1, 11.0, 11.0)));
    assert!(qt.query_range(&world()).is_empty());
}

#[test]
fn max_depth_leaf_grows_past_capacity() {
    // Depth 1 with capacity 1: the four depth-1 leaves cannot subdivide
    // further, so clustered points pile up in one leaf.
    let qt = Quadtree::new(world(), 1, 1);
    for id in 1..=5 {
        assert!(qt.insert(Point::new(id, 10.0 + id as f32, 10.0)), "insert {id}");
    }
    let hits = qt.query_range(&Rect::new(0.0, 0.0, 50.0, 50.0));
    assert_eq!(sorted(hits), vec![1, 2, 3, 4, 5]);
}

#[test]
fn query_matches_brute_force_after_churn() {
    let qt = Quadtree::new(world(), 2, 5);

    // Deterministic scatter over the world, then remove every third id.
    let mut alive: Vec<(u64, f32, f32)> = Vec::new();
    for i in 0u64..60 {
        let x = ((i * 37) % 100) as f32;
        let z = ((i * 61) % 100) as f32;
        if qt.insert(Point::new(i, x, z)) {
            alive.push((i, x, z));
        }
    }
    alive.retain(|&(id, x, z)| {
        if id % 3 == 0 {
            assert!(qt.remove(Point::new(id, x, z)));
            false
        } else {
            true
        }
    });

    let window = Rect::new(20.0, 10.0, 70.0, 90.0);
    let expected: Vec<u64> = alive
        .iter()
        .filter(|&&(_, x, z)| window.contains(x, z))
        .map(|&(id, _, _)| id)
        .collect();

    assert_eq!(sorted(qt.query_range(&window)), sorted(expected));
}

#[test]
fn each_id_reported_exactly_once() {
    let qt = Quadtree::new(world(), 2, 6);
    for i in 0u64..40 {
        assert!(qt.insert(Point::new(i, (i % 10) as f32 * 9.5, (i / 10) as f32 * 20.0)));
    }
    let mut hits = qt.query_range(&world());
    let total = hits.len();
    hits.sort_unstable();
    hits.dedup();
    assert_eq!(hits.len(), total, "no id may be reported twice");
    assert_eq!(total, 40);
}

#[test]
fn clear_resets_the_tree() {
    let qt = Quadtree::new(world(), 2, 4);
    for i in 1u64..=10 {
        assert!(qt.insert(Point::new(i, i as f32 * 7.0, i as f32 * 3.0)));
    }
    qt.clear();
    assert!(qt.query_range(&world()).is_empty());
    // Ids are free again after a clear.
    assert!(qt.insert(Point::new(1, 1.0, 1.0)));
}
