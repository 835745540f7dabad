//! Quad-tree spatial index over axis-aligned bounding boxes.
//!
//! Entries that straddle a quadrant boundary are stored in the parent
//! quadrant (store-in-parent). Every entry therefore lives in exactly one
//! quadrant, so queries never need to de-duplicate, and an insert or remove
//! touches a single root-to-leaf path. The cost is that large entries sit
//! high in the tree and are tested by every query passing through it.
//!
//! Queries are precise: they return exactly the entries whose rectangle
//! intersects the query (closed intersection, so touching counts).
//!
//! # Example
//!
//! ```
//! use slint_node_layout::{Rect, SpatialIndex};
//!
//! let mut index = SpatialIndex::default();
//! index.insert(1, Rect::new(0.0, 0.0, 100.0, 50.0));
//! index.insert(2, Rect::new(500.0, 500.0, 100.0, 50.0));
//!
//! assert_eq!(index.query(&Rect::new(-10.0, -10.0, 50.0, 50.0)), vec![1]);
//! ```

use crate::config::SpatialConfig;
use crate::geometry::{Point, Rect};
use std::cell::Cell;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use tracing::{trace, warn};

/// Counters describing the current shape of a [`SpatialIndex`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpatialMetrics {
    pub total_entries: usize,
    /// Quadrants currently allocated, root included.
    pub tree_nodes: usize,
    /// Depth of the deepest allocated quadrant (the root is depth 0).
    pub tree_depth: usize,
    pub rebuild_count: u32,
    /// Entries returned by the most recent query.
    pub last_query_hits: usize,
}

struct Quadrant<K> {
    bounds: Rect,
    depth: usize,
    entries: Vec<(K, Rect)>,
    children: Option<Box<[Quadrant<K>; 4]>>,
}

impl<K: Copy + Eq> Quadrant<K> {
    fn new(bounds: Rect, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            entries: Vec::new(),
            children: None,
        }
    }

    fn child_index(children: &[Quadrant<K>; 4], rect: &Rect) -> Option<usize> {
        children.iter().position(|c| c.bounds.contains_rect(rect))
    }

    fn insert(&mut self, key: K, rect: Rect, config: &SpatialConfig) {
        if let Some(children) = self.children.as_mut() {
            match Self::child_index(children, &rect) {
                Some(i) => children[i].insert(key, rect, config),
                None => self.entries.push((key, rect)),
            }
            return;
        }

        self.entries.push((key, rect));
        if self.entries.len() > config.max_items_per_node && self.depth < config.max_depth {
            self.split(config);
        }
    }

    fn split(&mut self, config: &SpatialConfig) {
        let depth = self.depth + 1;
        let mut children = Box::new(self.bounds.quadrants().map(|b| Quadrant::new(b, depth)));

        for (key, rect) in std::mem::take(&mut self.entries) {
            match Self::child_index(&children, &rect) {
                Some(i) => children[i].insert(key, rect, config),
                None => self.entries.push((key, rect)),
            }
        }
        self.children = Some(children);
    }

    /// Removes `key`, following the same path `insert` took for `rect`.
    fn remove(&mut self, key: K, rect: &Rect, config: &SpatialConfig) -> bool {
        if let Some(pos) = self.entries.iter().position(|(k, _)| *k == key) {
            self.entries.swap_remove(pos);
            self.try_merge(config);
            return true;
        }

        let Some(children) = self.children.as_mut() else {
            return false;
        };
        let Some(i) = Self::child_index(children, rect) else {
            return false;
        };
        let removed = children[i].remove(key, rect, config);
        if removed {
            self.try_merge(config);
        }
        removed
    }

    /// Pull leaf children back into this quadrant once they fit again.
    fn try_merge(&mut self, config: &SpatialConfig) {
        let Some(children) = self.children.as_ref() else {
            return;
        };
        if children.iter().any(|c| c.children.is_some()) {
            return;
        }
        let total = self.entries.len() + children.iter().map(|c| c.entries.len()).sum::<usize>();
        if total > config.max_items_per_node {
            return;
        }
        if let Some(children) = self.children.take() {
            let children: [Quadrant<K>; 4] = *children;
            for child in children {
                self.entries.extend(child.entries);
            }
        }
    }

    fn visit(
        &self,
        prune: &dyn Fn(&Rect) -> bool,
        accept: &dyn Fn(&Rect) -> bool,
        out: &mut Vec<K>,
    ) {
        out.extend(
            self.entries
                .iter()
                .filter(|(_, rect)| accept(rect))
                .map(|(key, _)| *key),
        );
        if let Some(children) = &self.children {
            for child in children.iter() {
                if prune(&child.bounds) {
                    child.visit(prune, accept, out);
                }
            }
        }
    }

    fn node_count(&self) -> usize {
        1 + self
            .children
            .as_ref()
            .map_or(0, |c| c.iter().map(Quadrant::node_count).sum())
    }

    fn max_depth(&self) -> usize {
        self.children
            .as_ref()
            .and_then(|c| c.iter().map(Quadrant::max_depth).max())
            .unwrap_or(self.depth)
    }
}

/// Rectangle-keyed spatial index.
///
/// `K` is both the identifier and the payload: queries return the keys of
/// matching entries. At most one rectangle is stored per key; inserting an
/// existing key replaces its rectangle.
pub struct SpatialIndex<K> {
    root: Quadrant<K>,
    config: SpatialConfig,
    locations: HashMap<K, Rect>,
    rebuild_count: u32,
    last_query_hits: Cell<usize>,
}

impl<K> Default for SpatialIndex<K>
where
    K: Copy + Eq + Hash + Debug,
{
    fn default() -> Self {
        Self::new(SpatialConfig::default())
    }
}

impl<K> SpatialIndex<K>
where
    K: Copy + Eq + Hash + Debug,
{
    pub fn new(config: SpatialConfig) -> Self {
        Self {
            root: Quadrant::new(config.world_bounds, 0),
            config,
            locations: HashMap::new(),
            rebuild_count: 0,
            last_query_hits: Cell::new(0),
        }
    }

    pub fn config(&self) -> &SpatialConfig {
        &self.config
    }

    /// Insert or replace the rectangle for `key`.
    ///
    /// Returns `false` when `rect` has non-finite coordinates or a negative
    /// size. Any previous entry for `key` is removed either way, so the
    /// index never answers with a rectangle the caller has moved away from.
    pub fn insert(&mut self, key: K, rect: Rect) -> bool {
        self.remove(key);
        if !rect.is_valid() {
            warn!(?key, ?rect, "rejecting degenerate rectangle");
            return false;
        }
        self.root.insert(key, rect, &self.config);
        self.locations.insert(key, rect);
        true
    }

    /// Move `key` to a new rectangle. Same as [`insert`](Self::insert).
    pub fn update(&mut self, key: K, rect: Rect) -> bool {
        self.insert(key, rect)
    }

    pub fn remove(&mut self, key: K) -> bool {
        let Some(rect) = self.locations.remove(&key) else {
            return false;
        };
        self.root.remove(key, &rect, &self.config)
    }

    pub fn contains(&self, key: K) -> bool {
        self.locations.contains_key(&key)
    }

    pub fn bounds_of(&self, key: K) -> Option<Rect> {
        self.locations.get(&key).copied()
    }

    pub fn len(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.is_empty()
    }

    /// Keys whose rectangle intersects `area`. Degenerate areas match nothing.
    pub fn query(&self, area: &Rect) -> Vec<K> {
        if area.is_degenerate() {
            return self.finish_query(Vec::new());
        }
        let mut out = Vec::new();
        self.root
            .visit(&|b| b.intersects(area), &|r| r.intersects(area), &mut out);
        self.finish_query(out)
    }

    /// Keys whose rectangle covers `point` (edges included).
    pub fn query_point(&self, point: Point) -> Vec<K> {
        if !point.is_finite() {
            return self.finish_query(Vec::new());
        }
        let mut out = Vec::new();
        self.root
            .visit(&|b| b.covers_point(point), &|r| r.covers_point(point), &mut out);
        self.finish_query(out)
    }

    /// Keys whose rectangle lies within `radius` of `centre`.
    pub fn query_radius(&self, centre: Point, radius: f32) -> Vec<K> {
        if !centre.is_finite() || !radius.is_finite() || radius < 0.0 {
            return self.finish_query(Vec::new());
        }
        let radius_sq = radius * radius;
        let within = |r: &Rect| r.distance_squared_to(centre) <= radius_sq;
        let mut out = Vec::new();
        self.root.visit(&within, &within, &mut out);
        self.finish_query(out)
    }

    fn finish_query(&self, out: Vec<K>) -> Vec<K> {
        trace!(hits = out.len(), "spatial query");
        self.last_query_hits.set(out.len());
        out
    }

    pub fn clear(&mut self) {
        self.root = Quadrant::new(self.config.world_bounds, 0);
        self.locations.clear();
        self.last_query_hits.set(0);
    }

    /// Replace the whole contents in one pass.
    pub fn rebuild<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (K, Rect)>,
    {
        self.clear();
        for (key, rect) in entries {
            self.insert(key, rect);
        }
        self.rebuild_count += 1;
    }

    pub fn metrics(&self) -> SpatialMetrics {
        SpatialMetrics {
            total_entries: self.locations.len(),
            tree_nodes: self.root.node_count(),
            tree_depth: self.root.max_depth(),
            rebuild_count: self.rebuild_count,
            last_query_hits: self.last_query_hits.get(),
        }
    }
}
