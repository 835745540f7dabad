//! Level 1: Spatial Index Tests
//!
//! Randomised comparison of the quad-tree against brute-force AABB scans,
//! plus lifecycle behaviour (updates, removal, rebuilds, degenerate input).

mod common;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use slint_node_layout::{Point, Rect, SpatialConfig, SpatialIndex};
use std::collections::HashMap;

fn random_rect(rng: &mut StdRng, extent: f32, max_size: f32) -> Rect {
    Rect::new(
        rng.random_range(-extent..extent),
        rng.random_range(-extent..extent),
        rng.random_range(0.0..max_size),
        rng.random_range(0.0..max_size),
    )
}

fn brute_force(entries: &HashMap<u32, Rect>, area: &Rect) -> Vec<u32> {
    let mut hits: Vec<u32> = entries
        .iter()
        .filter(|(_, r)| r.intersects(area))
        .map(|(id, _)| *id)
        .collect();
    hits.sort_unstable();
    hits
}

fn sorted(mut ids: Vec<u32>) -> Vec<u32> {
    ids.sort_unstable();
    ids
}

fn small_config() -> SpatialConfig {
    let mut config = SpatialConfig::default();
    config.world_bounds = Rect::new(-1000.0, -1000.0, 2000.0, 2000.0);
    config.max_items_per_node = 4;
    config.max_depth = 6;
    config
}

// ============================================================================
// Randomised equivalence
// ============================================================================

#[test]
fn test_query_matches_brute_force() {
    for seed in 0..8u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut index = SpatialIndex::new(small_config());
        let mut entries = HashMap::new();

        // Part of the population lies outside the world bounds.
        for id in 0..400u32 {
            let rect = random_rect(&mut rng, 1200.0, 150.0);
            index.insert(id, rect);
            entries.insert(id, rect);
        }

        for _ in 0..200 {
            let area = random_rect(&mut rng, 1300.0, 600.0);
            if area.is_degenerate() {
                continue;
            }
            assert_eq!(
                sorted(index.query(&area)),
                brute_force(&entries, &area),
                "seed {seed}, area {area:?}"
            );
        }
    }
}

#[test]
fn test_query_matches_brute_force_after_churn() {
    let mut rng = StdRng::seed_from_u64(42);
    let mut index = SpatialIndex::new(small_config());
    let mut entries = HashMap::new();

    for id in 0..300u32 {
        let rect = random_rect(&mut rng, 900.0, 80.0);
        index.insert(id, rect);
        entries.insert(id, rect);
    }
    for _ in 0..600 {
        let id = rng.random_range(0..300u32);
        if rng.random_bool(0.3) {
            index.remove(id);
            entries.remove(&id);
        } else {
            let rect = random_rect(&mut rng, 900.0, 80.0);
            index.update(id, rect);
            entries.insert(id, rect);
        }
    }

    assert_eq!(index.len(), entries.len());
    for _ in 0..200 {
        let area = random_rect(&mut rng, 1000.0, 400.0);
        if area.is_degenerate() {
            continue;
        }
        assert_eq!(sorted(index.query(&area)), brute_force(&entries, &area));
    }
}

#[test]
fn test_point_queries_match_brute_force() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut index = SpatialIndex::new(small_config());
    let mut entries = HashMap::new();
    for id in 0..200u32 {
        let rect = random_rect(&mut rng, 800.0, 120.0);
        index.insert(id, rect);
        entries.insert(id, rect);
    }

    for _ in 0..300 {
        let p = Point::new(rng.random_range(-900.0..900.0), rng.random_range(-900.0..900.0));
        let mut expected: Vec<u32> = entries
            .iter()
            .filter(|(_, r)| r.covers_point(p))
            .map(|(id, _)| *id)
            .collect();
        expected.sort_unstable();
        assert_eq!(sorted(index.query_point(p)), expected);
    }
}

// ============================================================================
// Lifecycle
// ============================================================================

#[test]
fn test_moved_entry_leaves_no_stale_hit() {
    let mut index = SpatialIndex::new(small_config());
    for id in 0..50u32 {
        index.insert(id, Rect::new(id as f32 * 10.0, 0.0, 5.0, 5.0));
    }
    index.update(3, Rect::new(-500.0, -500.0, 5.0, 5.0));

    assert!(!index.query(&Rect::new(29.0, 0.0, 3.0, 3.0)).contains(&3));
    assert_eq!(index.query(&Rect::new(-501.0, -501.0, 3.0, 3.0)), vec![3]);
    assert_eq!(index.bounds_of(3), Some(Rect::new(-500.0, -500.0, 5.0, 5.0)));
}

#[test]
fn test_tree_splits_and_merges_back() {
    let mut index = SpatialIndex::new(small_config());
    for id in 0..64u32 {
        let x = (id % 8) as f32 * 100.0 - 400.0;
        let y = (id / 8) as f32 * 100.0 - 400.0;
        index.insert(id, Rect::new(x + 1.0, y + 1.0, 10.0, 10.0));
    }
    let grown = index.metrics();
    assert!(grown.tree_nodes > 1);
    assert!(grown.tree_depth >= 1);

    for id in 0..64u32 {
        assert!(index.remove(id));
    }
    let shrunk = index.metrics();
    assert_eq!(shrunk.total_entries, 0);
    assert_eq!(shrunk.tree_nodes, 1);
}

#[test]
fn test_rebuild_replaces_contents() {
    let mut index = SpatialIndex::new(small_config());
    index.insert(1, Rect::new(0.0, 0.0, 10.0, 10.0));
    index.rebuild((10..20u32).map(|id| (id, Rect::new(id as f32, 0.0, 1.0, 1.0))));

    assert!(!index.contains(1));
    assert_eq!(index.len(), 10);
    assert_eq!(index.metrics().rebuild_count, 1);
}

#[test]
fn test_degenerate_input_never_panics() {
    let mut index = SpatialIndex::new(small_config());
    assert!(!index.insert(1, Rect::new(f32::NAN, 0.0, 10.0, 10.0)));
    assert!(!index.insert(2, Rect::new(0.0, 0.0, -1.0, 10.0)));
    assert!(index.insert(3, Rect::new(0.0, 0.0, 0.0, 0.0)));

    assert!(index.query(&Rect::new(-1.0, -1.0, 0.0, 5.0)).is_empty());
    assert!(index.query(&Rect::new(f32::NAN, 0.0, 1.0, 1.0)).is_empty());
    assert!(index.query_point(Point::new(f32::INFINITY, 0.0)).is_empty());
    assert_eq!(index.query(&Rect::new(-1.0, -1.0, 2.0, 2.0)), vec![3]);
    assert_eq!(index.metrics().last_query_hits, 1);
}

#[test]
fn test_query_radius() {
    let mut index = SpatialIndex::new(small_config());
    index.insert(1, Rect::new(0.0, 0.0, 10.0, 10.0));
    index.insert(2, Rect::new(100.0, 0.0, 10.0, 10.0));

    assert_eq!(index.query_radius(Point::new(15.0, 5.0), 5.0), vec![1]);
    assert!(index.query_radius(Point::new(15.0, 5.0), 4.9).is_empty());
    assert!(index.query_radius(Point::new(15.0, 5.0), -1.0).is_empty());
}
