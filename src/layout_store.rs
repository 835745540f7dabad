//! Single source of truth for node, group, slot and reroute geometry.
//!
//! The store owns the spatial indexes for the graph currently displayed, so
//! they live and die with it: [`LayoutStore::switch_graph`] tears all of them
//! down. Every geometry write goes through the store, which re-inserts the
//! affected bounds before returning. Reads made later in the same frame
//! therefore always see the new geometry.
//!
//! Slot positions come from two sources, in priority order:
//!
//! 1. a position measured by the rendering layer
//!    ([`update_slot_layout`](LayoutStore::update_slot_layout)),
//! 2. the [`SlotPositionResolver`] fallback computed from node geometry.
//!
//! Measured positions are kept relative to the node origin, so they follow
//! the node when it moves until the renderer reports again. Nothing caches which source answered: every
//! [`slot_position`](LayoutStore::slot_position) call resolves again.
//!
//! Slots and link segments are indexed too. A slot is indexed at the point
//! it resolves to, wherever that lies relative to its node. A link is
//! indexed per drawn segment, by the box around the curve's control points,
//! and re-indexed whenever a node, measured slot or reroute it touches
//! moves. Which links exist is not the store's business: callers hand it
//! routes with [`set_link_route`](LayoutStore::set_link_route).

use crate::config::{LayoutConfig, SlotMetrics};
use crate::connector::{DropTargetLocator, Hover};
use crate::geometry::{Point, Rect, Size};
use crate::groups::{self, GroupContents, SimpleGroupGeometry};
use crate::hit_test::{find_link_at, find_slot_at, SimpleLinkGeometry};
use crate::ids::{GraphId, GroupId, LinkId, NodeId, NodeRef, RerouteId, SlotRef, ROOT_GRAPH_ID};
use crate::network::LinkRecord;
use crate::path::CubicBezier;
use crate::slots::{NodeFrame, NodeShape, SlotPositionResolver, SlotSpec};
use crate::spatial::{SpatialIndex, SpatialMetrics};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, trace};

/// Who wrote a node's current geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutSource {
    /// The scene graph's own fields.
    #[default]
    Canvas,
    /// Measured by an external renderer.
    External,
}

/// Position and size of one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeLayout {
    pub id: NodeId,
    /// Top-left of the node body. The title bar sits above it.
    pub position: Point,
    /// Size of the node body.
    pub size: Size,
    pub z_index: i32,
    pub visible: bool,
    /// Hit-test rectangle, title bar included. This is what gets indexed.
    pub bounds: Rect,
    pub source: LayoutSource,
}

/// A measured slot position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotLayout {
    pub slot: SlotRef,
    pub position: Point,
    /// Square around `position`, one slot high.
    pub bounds: Rect,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RerouteLayout {
    pub id: RerouteId,
    pub position: Point,
    pub radius: f32,
}

/// One drawn piece of a link: the whole link, or one side of its reroute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SegmentKey {
    pub link: LinkId,
    pub segment: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkSegmentLayout {
    pub key: SegmentKey,
    pub start: Point,
    pub end: Point,
    /// Box around the curve's control points. This is what gets indexed.
    pub bounds: Rect,
}

/// Result of [`LayoutStore::query_items_in_bounds`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemsInBounds {
    /// Visible nodes, bottom to top.
    pub nodes: Vec<NodeId>,
    pub links: Vec<LinkId>,
    pub groups: Vec<GroupId>,
    pub reroutes: Vec<RerouteId>,
}

/// Notification sent to [`on_change`](LayoutStore::on_change) listeners.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutChange {
    NodeCreated(NodeId),
    NodesUpdated(Vec<NodeId>),
    NodeRemoved(NodeId),
    GroupChanged(GroupId),
    GroupRemoved(GroupId),
    SlotsChanged(NodeId),
    RerouteChanged(RerouteId),
    GraphSwitched(GraphId),
}

pub type ChangeListenerId = u64;

struct NodeEntry {
    layout: NodeLayout,
    shape: NodeShape,
}

pub struct LayoutStore {
    graph: GraphId,
    config: LayoutConfig,
    resolver: SlotPositionResolver,
    nodes: HashMap<NodeId, NodeEntry>,
    node_index: SpatialIndex<NodeId>,
    groups: BTreeMap<GroupId, SimpleGroupGeometry>,
    group_index: SpatialIndex<GroupId>,
    /// Measured slot positions relative to the node origin.
    measured_slots: HashMap<SlotRef, Point>,
    reroutes: HashMap<RerouteId, RerouteLayout>,
    reroute_index: SpatialIndex<RerouteId>,
    /// Resolved slot positions, as zero-size rectangles.
    slot_index: SpatialIndex<SlotRef>,
    link_routes: BTreeMap<LinkId, LinkRecord>,
    /// Links touching each node, for re-indexing after node edits.
    node_links: HashMap<NodeId, BTreeSet<LinkId>>,
    link_segments: BTreeMap<SegmentKey, LinkSegmentLayout>,
    link_index: SpatialIndex<SegmentKey>,
    switches: u64,
    next_z: i32,
    version: u64,
    listeners: Vec<(ChangeListenerId, Box<dyn FnMut(&LayoutChange)>)>,
    next_listener: ChangeListenerId,
}

impl Default for LayoutStore {
    fn default() -> Self {
        Self::new(LayoutConfig::default())
    }
}

impl LayoutStore {
    pub fn new(config: LayoutConfig) -> Self {
        Self {
            graph: ROOT_GRAPH_ID,
            config,
            resolver: SlotPositionResolver::new(config.slots),
            nodes: HashMap::new(),
            node_index: SpatialIndex::new(config.spatial),
            groups: BTreeMap::new(),
            group_index: SpatialIndex::new(config.spatial),
            measured_slots: HashMap::new(),
            reroutes: HashMap::new(),
            reroute_index: SpatialIndex::new(config.spatial),
            slot_index: SpatialIndex::new(config.spatial),
            link_routes: BTreeMap::new(),
            node_links: HashMap::new(),
            link_segments: BTreeMap::new(),
            link_index: SpatialIndex::new(config.spatial),
            switches: 0,
            next_z: 0,
            version: 0,
            listeners: Vec::new(),
            next_listener: 0,
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn resolver(&self) -> &SlotPositionResolver {
        &self.resolver
    }

    /// Bumped on every change notification.
    pub fn version(&self) -> u64 {
        self.version
    }

    // ------------------------------------------------------------------
    // Change listeners
    // ------------------------------------------------------------------

    pub fn on_change<F>(&mut self, callback: F) -> ChangeListenerId
    where
        F: FnMut(&LayoutChange) + 'static,
    {
        self.next_listener += 1;
        self.listeners.push((self.next_listener, Box::new(callback)));
        self.next_listener
    }

    pub fn off_change(&mut self, id: ChangeListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(l, _)| *l != id);
        before != self.listeners.len()
    }

    fn notify(&mut self, change: LayoutChange) {
        self.version += 1;
        trace!(version = self.version, ?change, "layout changed");
        for (_, listener) in self.listeners.iter_mut() {
            listener(&change);
        }
    }

    // ------------------------------------------------------------------
    // Graph lifecycle
    // ------------------------------------------------------------------

    /// The graph whose geometry the store currently holds.
    pub fn graph(&self) -> GraphId {
        self.graph
    }

    /// Forget every layout and index and start over for `graph`.
    pub fn switch_graph(&mut self, graph: GraphId) {
        debug!(from = self.graph, to = graph, nodes = self.nodes.len(), "switching graph");
        self.graph = graph;
        self.nodes.clear();
        self.node_index.clear();
        self.groups.clear();
        self.group_index.clear();
        self.measured_slots.clear();
        self.reroutes.clear();
        self.reroute_index.clear();
        self.slot_index.clear();
        self.link_routes.clear();
        self.node_links.clear();
        self.link_segments.clear();
        self.link_index.clear();
        self.switches += 1;
        self.next_z = 0;
        self.notify(LayoutChange::GraphSwitched(graph));
    }

    /// Number of [`switch_graph`](Self::switch_graph) calls so far.
    pub fn graph_switches(&self) -> u64 {
        self.switches
    }

    /// Whether `node` belongs to the displayed graph and has a layout.
    pub fn is_displayed(&self, node: NodeRef) -> bool {
        node.graph == self.graph && self.nodes.contains_key(&node.node)
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node (or replace an existing one) on top of the z-order.
    pub fn create_node(&mut self, id: NodeId, position: Point, size: Size, shape: NodeShape) -> NodeLayout {
        if let Some(previous) = self.nodes.get(&id) {
            let counts = slot_counts(&previous.shape);
            self.unindex_slots(id, counts);
        }
        let bounds = node_bounds(self.resolver.metrics(), position, size, &shape);
        let z_index = self.next_z;
        self.next_z += 1;
        let layout = NodeLayout {
            id,
            position,
            size,
            z_index,
            visible: true,
            bounds,
            source: LayoutSource::Canvas,
        };
        self.node_index.insert(id, bounds);
        self.nodes.insert(id, NodeEntry { layout, shape });
        self.index_slots(id);
        self.refresh_node_links(id);
        self.notify(LayoutChange::NodeCreated(id));
        layout
    }

    /// Remove a node together with its measured slot layouts.
    pub fn remove_node(&mut self, id: NodeId) -> Option<NodeLayout> {
        let entry = self.nodes.remove(&id)?;
        self.node_index.remove(id);
        self.measured_slots.retain(|slot, _| slot.node != id);
        self.unindex_slots(id, slot_counts(&entry.shape));
        self.refresh_node_links(id);
        self.notify(LayoutChange::NodeRemoved(id));
        Some(entry.layout)
    }

    pub fn node_layout(&self, id: NodeId) -> Option<&NodeLayout> {
        self.nodes.get(&id).map(|e| &e.layout)
    }

    pub fn node_shape(&self, id: NodeId) -> Option<&NodeShape> {
        self.nodes.get(&id).map(|e| &e.shape)
    }

    pub fn contains_node(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.nodes.keys().copied()
    }

    /// Re-derive bounds and re-index the node, its slots and its links.
    /// Returns `false` for unknown nodes.
    fn write_node<F>(&mut self, id: NodeId, edit: F) -> bool
    where
        F: FnOnce(&mut NodeLayout, &mut NodeShape),
    {
        let metrics = *self.resolver.metrics();
        let Some(entry) = self.nodes.get_mut(&id) else {
            return false;
        };
        let before = slot_counts(&entry.shape);
        edit(&mut entry.layout, &mut entry.shape);
        let bounds = node_bounds(&metrics, entry.layout.position, entry.layout.size, &entry.shape);
        entry.layout.bounds = bounds;
        self.node_index.update(id, bounds);
        self.unindex_slots(id, before);
        self.index_slots(id);
        self.refresh_node_links(id);
        true
    }

    pub fn set_node_layout(&mut self, id: NodeId, position: Point, size: Size) -> bool {
        self.set_node_layout_from(id, position, size, LayoutSource::Canvas)
    }

    pub fn set_node_layout_from(&mut self, id: NodeId, position: Point, size: Size, source: LayoutSource) -> bool {
        let changed = self.write_node(id, |layout, _| {
            layout.position = position;
            layout.size = size;
            layout.source = source;
        });
        if changed {
            self.notify(LayoutChange::NodesUpdated(vec![id]));
        }
        changed
    }

    pub fn move_node(&mut self, id: NodeId, position: Point) -> bool {
        let changed = self.write_node(id, |layout, _| layout.position = position);
        if changed {
            self.notify(LayoutChange::NodesUpdated(vec![id]));
        }
        changed
    }

    /// Move several nodes with a single change notification.
    pub fn move_nodes<I>(&mut self, moves: I) -> usize
    where
        I: IntoIterator<Item = (NodeId, Point)>,
    {
        let moved: Vec<NodeId> = moves
            .into_iter()
            .filter(|(id, position)| {
                let position = *position;
                self.write_node(*id, |layout, _| layout.position = position)
            })
            .map(|(id, _)| id)
            .collect();
        let count = moved.len();
        if count > 0 {
            self.notify(LayoutChange::NodesUpdated(moved));
        }
        count
    }

    pub fn resize_node(&mut self, id: NodeId, size: Size) -> bool {
        let changed = self.write_node(id, |layout, _| layout.size = size);
        if changed {
            self.notify(LayoutChange::NodesUpdated(vec![id]));
        }
        changed
    }

    /// Collapsing drops measured slot positions; the renderer no longer
    /// shows the slots, so they would be stale.
    pub fn set_collapsed(&mut self, id: NodeId, collapsed: bool) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        if collapsed {
            self.measured_slots.retain(|slot, _| slot.node != id);
        }
        self.write_node(id, |_, shape| shape.collapsed = collapsed);
        self.notify(LayoutChange::NodesUpdated(vec![id]));
        true
    }

    pub fn set_node_slots(&mut self, id: NodeId, inputs: Vec<SlotSpec>, outputs: Vec<SlotSpec>) -> bool {
        if !self.nodes.contains_key(&id) {
            return false;
        }
        self.measured_slots.retain(|slot, _| slot.node != id);
        self.write_node(id, |_, shape| {
            shape.inputs = inputs;
            shape.outputs = outputs;
        });
        self.notify(LayoutChange::SlotsChanged(id));
        true
    }

    pub fn set_node_visible(&mut self, id: NodeId, visible: bool) -> bool {
        let changed = self.write_node(id, |layout, _| layout.visible = visible);
        if changed {
            self.notify(LayoutChange::NodesUpdated(vec![id]));
        }
        changed
    }

    pub fn bring_to_front(&mut self, id: NodeId) -> bool {
        let z_index = self.next_z;
        let changed = self.write_node(id, |layout, _| layout.z_index = z_index);
        if changed {
            self.next_z += 1;
            self.notify(LayoutChange::NodesUpdated(vec![id]));
        }
        changed
    }

    /// Visible nodes whose bounds intersect `area`, bottom to top.
    pub fn query_nodes_in_bounds(&self, area: &Rect) -> Vec<NodeId> {
        let mut hits: Vec<&NodeLayout> = self
            .node_index
            .query(area)
            .into_iter()
            .filter_map(|id| self.node_layout(id))
            .filter(|layout| layout.visible)
            .collect();
        hits.sort_by_key(|layout| layout.z_index);
        hits.into_iter().map(|layout| layout.id).collect()
    }

    /// Topmost visible node under `point`.
    pub fn query_node_at_point(&self, point: Point) -> Option<NodeId> {
        self.node_index
            .query_point(point)
            .into_iter()
            .filter_map(|id| self.node_layout(id))
            .filter(|layout| layout.visible && layout.bounds.contains_point(point))
            .max_by_key(|layout| layout.z_index)
            .map(|layout| layout.id)
    }

    pub fn node_index_metrics(&self) -> SpatialMetrics {
        self.node_index.metrics()
    }

    // ------------------------------------------------------------------
    // Slots
    // ------------------------------------------------------------------

    /// Canvas position of a slot: measured if available, computed otherwise.
    pub fn slot_position(&self, slot: SlotRef) -> Option<Point> {
        let entry = self.nodes.get(&slot.node)?;
        if let Some(relative) = self.measured_slots.get(&slot) {
            return Some(entry.layout.position + *relative);
        }
        self.computed_slot_position(slot)
    }

    /// Slot position from node geometry alone.
    pub fn computed_slot_position(&self, slot: SlotRef) -> Option<Point> {
        let entry = self.nodes.get(&slot.node)?;
        let frame = NodeFrame {
            position: entry.layout.position,
            size: entry.layout.size,
            shape: &entry.shape,
        };
        self.resolver.slot_position(frame, slot.index, slot.kind)
    }

    /// The measured layout of a slot, if the renderer reported one.
    pub fn slot_layout(&self, slot: SlotRef) -> Option<SlotLayout> {
        let entry = self.nodes.get(&slot.node)?;
        let relative = self.measured_slots.get(&slot)?;
        let position = entry.layout.position + *relative;
        Some(SlotLayout {
            slot,
            position,
            bounds: Rect::around(position, self.resolver.metrics().slot_height * 0.5),
        })
    }

    /// Record a measured slot centre in canvas space. Ignored (`false`) for
    /// unknown nodes.
    pub fn update_slot_layout(&mut self, slot: SlotRef, position: Point) -> bool {
        let Some(entry) = self.nodes.get(&slot.node) else {
            return false;
        };
        if !position.is_finite() {
            return false;
        }
        let relative = position - entry.layout.position;
        self.measured_slots.insert(slot, relative);
        self.index_slot(slot);
        self.refresh_node_links(slot.node);
        true
    }

    pub fn delete_slot_layout(&mut self, slot: SlotRef) -> bool {
        if self.measured_slots.remove(&slot).is_none() {
            return false;
        }
        self.index_slot(slot);
        self.refresh_node_links(slot.node);
        true
    }

    pub fn delete_node_slot_layouts(&mut self, node: NodeId) -> usize {
        let before = self.measured_slots.len();
        self.measured_slots.retain(|slot, _| slot.node != node);
        let removed = before - self.measured_slots.len();
        if removed > 0 {
            self.index_slots(node);
            self.refresh_node_links(node);
        }
        removed
    }

    pub fn clear_slot_layouts(&mut self) {
        let nodes: BTreeSet<NodeId> = self.measured_slots.keys().map(|slot| slot.node).collect();
        self.measured_slots.clear();
        for node in nodes {
            self.index_slots(node);
            self.refresh_node_links(node);
        }
    }

    /// Nearest slot of a visible node within the hit radius of `point`.
    pub fn query_slot_at_point(&self, point: Point) -> Option<SlotRef> {
        let radius = self.config.slot_hit_radius;
        let mut candidates = self.slot_index.query_radius(point, radius);
        candidates.sort_unstable();
        let slots = candidates
            .into_iter()
            .filter(|slot| self.nodes.get(&slot.node).is_some_and(|e| e.layout.visible))
            .filter_map(|slot| Some((slot, self.slot_index.bounds_of(slot)?.origin())));
        find_slot_at(point, slots, radius)
    }

    /// Re-index one slot at the position it resolves to now.
    fn index_slot(&mut self, slot: SlotRef) {
        match self.slot_position(slot) {
            Some(position) => {
                self.slot_index.insert(slot, Rect::new(position.x, position.y, 0.0, 0.0));
            }
            None => {
                self.slot_index.remove(slot);
            }
        }
    }

    fn index_slots(&mut self, node: NodeId) {
        let Some(entry) = self.nodes.get(&node) else {
            return;
        };
        let (inputs, outputs) = slot_counts(&entry.shape);
        for slot in node_slots(node, inputs, outputs) {
            self.index_slot(slot);
        }
    }

    fn unindex_slots(&mut self, node: NodeId, (inputs, outputs): (usize, usize)) {
        for slot in node_slots(node, inputs, outputs) {
            self.slot_index.remove(slot);
        }
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// Add a group, or replace the bounds of an existing one.
    pub fn create_group(&mut self, id: GroupId, bounds: Rect) -> bool {
        if !self.group_index.insert(id, bounds) {
            return false;
        }
        self.groups.insert(id, SimpleGroupGeometry::new(id, bounds));
        self.notify(LayoutChange::GroupChanged(id));
        true
    }

    /// Move or resize a known group. Unknown ids are ignored.
    pub fn set_group_bounds(&mut self, id: GroupId, bounds: Rect) -> bool {
        if !self.groups.contains_key(&id) {
            return false;
        }
        self.create_group(id, bounds)
    }

    pub fn remove_group(&mut self, id: GroupId) -> bool {
        if self.groups.remove(&id).is_none() {
            return false;
        }
        self.group_index.remove(id);
        self.notify(LayoutChange::GroupRemoved(id));
        true
    }

    pub fn group_bounds(&self, id: GroupId) -> Option<Rect> {
        self.groups.get(&id).map(|g| g.bounds)
    }

    pub fn groups(&self) -> impl Iterator<Item = &SimpleGroupGeometry> + '_ {
        self.groups.values()
    }

    pub fn query_groups_in_bounds(&self, area: &Rect) -> Vec<GroupId> {
        let mut ids = self.group_index.query(area);
        ids.sort_unstable();
        ids
    }

    /// Innermost group containing the centre of the node's bounds.
    ///
    /// The group index narrows the candidates to the groups covering that
    /// point; the innermost selection then runs over those only.
    pub fn find_parent_group(&self, node: NodeId) -> Option<GroupId> {
        let centre = self.node_layout(node)?.bounds.centre();
        let candidates = self.group_index.query_point(centre);
        groups::innermost_containing(centre, candidates.iter().filter_map(|id| self.groups.get(id)))
    }

    pub fn group_contents(&self, group: GroupId) -> Option<GroupContents> {
        let geometry = self.groups.get(&group)?;
        let nodes = self
            .node_index
            .query(&geometry.bounds)
            .into_iter()
            .filter_map(|id| self.node_layout(id))
            .map(|layout| (layout.id, layout.bounds));
        let mut contents = groups::group_contents(geometry, nodes, self.groups.values());
        contents.nodes.sort_unstable();
        Some(contents)
    }

    // ------------------------------------------------------------------
    // Reroutes
    // ------------------------------------------------------------------

    pub fn update_reroute_layout(&mut self, id: RerouteId, position: Point) -> bool {
        let radius = self.config.reroute_radius;
        if !self.reroute_index.insert(id, Rect::around(position, radius)) {
            self.reroutes.remove(&id);
            self.refresh_reroute_links(id);
            return false;
        }
        self.reroutes.insert(id, RerouteLayout { id, position, radius });
        self.refresh_reroute_links(id);
        self.notify(LayoutChange::RerouteChanged(id));
        true
    }

    pub fn reroute_layout(&self, id: RerouteId) -> Option<&RerouteLayout> {
        self.reroutes.get(&id)
    }

    pub fn delete_reroute_layout(&mut self, id: RerouteId) -> bool {
        self.reroute_index.remove(id);
        let removed = self.reroutes.remove(&id).is_some();
        if removed {
            self.refresh_reroute_links(id);
        }
        removed
    }

    /// Closest reroute whose circle contains `point`.
    pub fn query_reroute_at_point(&self, point: Point) -> Option<RerouteId> {
        self.reroute_index
            .query_point(point)
            .into_iter()
            .filter_map(|id| self.reroutes.get(&id))
            .map(|r| (r.id, r.position.distance_squared(point), r.radius))
            .filter(|(_, dist_sq, radius)| *dist_sq <= radius * radius)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _, _)| id)
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Register or update the route of a link and index its segments.
    /// Endpoints without a layout leave the link unindexed until they get one.
    pub fn set_link_route(&mut self, link: LinkRecord) {
        if self.link_routes.get(&link.id) == Some(&link) {
            return;
        }
        self.forget_link_route(link.id);
        for node in [link.origin.node, link.target.node] {
            self.node_links.entry(node).or_default().insert(link.id);
        }
        self.link_routes.insert(link.id, link);
        self.refresh_link(link.id);
    }

    pub fn remove_link_route(&mut self, id: LinkId) -> Option<LinkRecord> {
        self.forget_link_route(id)
    }

    pub fn link_route(&self, id: LinkId) -> Option<&LinkRecord> {
        self.link_routes.get(&id)
    }

    pub fn link_routes(&self) -> impl Iterator<Item = &LinkRecord> + '_ {
        self.link_routes.values()
    }

    /// Indexed segments of a link, origin side first.
    pub fn link_segments(&self, id: LinkId) -> Vec<LinkSegmentLayout> {
        self.link_segments
            .range(segment_range(id))
            .map(|(_, segment)| *segment)
            .collect()
    }

    pub fn query_link_segments_in_bounds(&self, area: &Rect) -> Vec<SegmentKey> {
        let mut keys = self.link_index.query(area);
        keys.sort_unstable();
        keys
    }

    /// Closest link within `tolerance` of `point`, both in canvas units.
    pub fn query_link_at_point(&self, point: Point, tolerance: f32) -> Option<LinkId> {
        if !(tolerance.is_finite() && tolerance > 0.0) {
            return None;
        }
        let mut keys = self.link_index.query(&Rect::around(point, tolerance));
        keys.sort_unstable();
        let segments = keys
            .iter()
            .filter_map(|key| self.link_segments.get(key))
            .map(|segment| SimpleLinkGeometry {
                id: segment.key.link,
                start: segment.start,
                end: segment.end,
            });
        find_link_at(
            point,
            segments,
            tolerance,
            1.0,
            self.config.bezier_min_offset,
            self.config.link_hit_samples,
        )
    }

    /// Everything indexed that intersects `area`, e.g. for box selection.
    pub fn query_items_in_bounds(&self, area: &Rect) -> ItemsInBounds {
        let links: BTreeSet<LinkId> = self
            .link_index
            .query(area)
            .into_iter()
            .map(|key| key.link)
            .collect();
        let mut reroutes = self.reroute_index.query(area);
        reroutes.sort_unstable();
        ItemsInBounds {
            nodes: self.query_nodes_in_bounds(area),
            links: links.into_iter().collect(),
            groups: self.query_groups_in_bounds(area),
            reroutes,
        }
    }

    fn forget_link_route(&mut self, id: LinkId) -> Option<LinkRecord> {
        let route = self.link_routes.remove(&id)?;
        for node in [route.origin.node, route.target.node] {
            if let Some(links) = self.node_links.get_mut(&node) {
                links.remove(&id);
                if links.is_empty() {
                    self.node_links.remove(&node);
                }
            }
        }
        self.drop_link_segments(id);
        Some(route)
    }

    fn drop_link_segments(&mut self, id: LinkId) {
        let keys: Vec<SegmentKey> = self.link_segments.range(segment_range(id)).map(|(k, _)| *k).collect();
        for key in keys {
            self.link_segments.remove(&key);
            self.link_index.remove(key);
        }
    }

    /// Rebuild the segments of one link from current slot and reroute layouts.
    fn refresh_link(&mut self, id: LinkId) {
        self.drop_link_segments(id);
        let Some(route) = self.link_routes.get(&id).copied() else {
            return;
        };
        let (Some(start), Some(end)) = (self.slot_position(route.origin), self.slot_position(route.target)) else {
            return;
        };
        if !start.is_finite() || !end.is_finite() {
            return;
        }
        let pieces = match route.reroute.and_then(|r| self.reroutes.get(&r)) {
            Some(reroute) => vec![(start, reroute.position), (reroute.position, end)],
            None => vec![(start, end)],
        };
        let min_offset = self.config.bezier_min_offset;
        for (segment, (start, end)) in pieces.into_iter().enumerate() {
            let key = SegmentKey { link: id, segment };
            let bounds = CubicBezier::from_endpoints(start, end, 1.0, min_offset).bounds();
            if self.link_index.insert(key, bounds) {
                self.link_segments.insert(key, LinkSegmentLayout { key, start, end, bounds });
            }
        }
        trace!(link = id, segments = self.link_segments.range(segment_range(id)).count(), "link indexed");
    }

    fn refresh_node_links(&mut self, node: NodeId) {
        let links: Vec<LinkId> = match self.node_links.get(&node) {
            Some(links) => links.iter().copied().collect(),
            None => return,
        };
        for id in links {
            self.refresh_link(id);
        }
    }

    fn refresh_reroute_links(&mut self, reroute: RerouteId) {
        let links: Vec<LinkId> = self
            .link_routes
            .values()
            .filter(|route| route.reroute == Some(reroute))
            .map(|route| route.id)
            .collect();
        for id in links {
            self.refresh_link(id);
        }
    }
}

impl DropTargetLocator for LayoutStore {
    /// Slots first, then node bodies, then reroutes.
    fn locate(&self, point: Point) -> Hover {
        if let Some(slot) = self.query_slot_at_point(point) {
            return Hover::Slot(slot);
        }
        if let Some(node) = self.query_node_at_point(point) {
            if let Some(shape) = self.node_shape(node) {
                return Hover::Node {
                    node,
                    inputs: shape.inputs.len(),
                    outputs: shape.outputs.len(),
                };
            }
        }
        match self.query_reroute_at_point(point) {
            Some(reroute) => Hover::Reroute(reroute),
            None => Hover::Nothing,
        }
    }
}

fn slot_counts(shape: &NodeShape) -> (usize, usize) {
    (shape.inputs.len(), shape.outputs.len())
}

fn node_slots(node: NodeId, inputs: usize, outputs: usize) -> impl Iterator<Item = SlotRef> {
    let inputs = (0..inputs).map(move |i| SlotRef::input(node, i));
    let outputs = (0..outputs).map(move |i| SlotRef::output(node, i));
    inputs.chain(outputs)
}

fn segment_range(link: LinkId) -> std::ops::RangeInclusive<SegmentKey> {
    SegmentKey { link, segment: 0 }..=SegmentKey { link, segment: usize::MAX }
}

/// Hit-test rectangle of a node, title bar included.
fn node_bounds(metrics: &SlotMetrics, position: Point, size: Size, shape: &NodeShape) -> Rect {
    if shape.collapsed {
        let width = shape.collapsed_width.unwrap_or(metrics.collapsed_width);
        Rect::new(position.x, position.y - metrics.title_height, width, metrics.title_height)
    } else {
        Rect::new(
            position.x,
            position.y - metrics.title_height,
            size.width,
            size.height + metrics.title_height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn shape(inputs: usize, outputs: usize) -> NodeShape {
        NodeShape::new(
            (0..inputs).map(|i| SlotSpec::new(format!("in{i}"), "*")).collect(),
            (0..outputs).map(|i| SlotSpec::new(format!("out{i}"), "*")).collect(),
        )
    }

    fn store_with_node() -> LayoutStore {
        let mut store = LayoutStore::default();
        store.create_node(1, Point::new(100.0, 100.0), Size::new(200.0, 100.0), shape(2, 1));
        store
    }

    fn link(id: LinkId, origin: SlotRef, target: SlotRef) -> LinkRecord {
        LinkRecord {
            id,
            origin,
            target,
            reroute: None,
        }
    }

    /// Node 1's output at (290, 114) feeds node 2's input at (510, 114).
    fn store_with_link() -> LayoutStore {
        let mut store = store_with_node();
        store.create_node(2, Point::new(500.0, 100.0), Size::new(200.0, 100.0), shape(1, 0));
        store.set_link_route(link(9, SlotRef::output(1, 0), SlotRef::input(2, 0)));
        store
    }

    // ========================================================================
    // Node layouts
    // ========================================================================

    #[test]
    fn test_create_node_indexes_bounds_with_title() {
        let store = store_with_node();
        let layout = store.node_layout(1).copied().unwrap();
        assert_eq!(layout.bounds, Rect::new(100.0, 70.0, 200.0, 130.0));
        assert_eq!(store.query_nodes_in_bounds(&Rect::new(0.0, 0.0, 110.0, 80.0)), vec![1]);
    }

    #[test]
    fn test_move_node_reindexes() {
        let mut store = store_with_node();
        assert!(store.move_node(1, Point::new(1000.0, 1000.0)));

        assert!(store.query_nodes_in_bounds(&Rect::new(90.0, 90.0, 50.0, 50.0)).is_empty());
        assert_eq!(store.query_nodes_in_bounds(&Rect::new(990.0, 990.0, 50.0, 50.0)), vec![1]);
        assert_eq!(store.node_layout(1).map(|l| l.position), Some(Point::new(1000.0, 1000.0)));
    }

    #[test]
    fn test_non_finite_geometry_unindexes_node() {
        let mut store = store_with_node();
        assert!(store.move_node(1, Point::new(f32::NAN, f32::NAN)));
        assert!(store.query_nodes_in_bounds(&Rect::new(90.0, 60.0, 50.0, 50.0)).is_empty());
        assert_eq!(store.query_node_at_point(Point::new(200.0, 150.0)), None);
        assert_eq!(store.query_slot_at_point(Point::new(110.0, 114.0)), None);

        assert!(store.move_node(1, Point::new(100.0, 100.0)));
        assert_eq!(store.query_node_at_point(Point::new(200.0, 150.0)), Some(1));

        assert!(store.resize_node(1, Size::new(-10.0, 100.0)));
        assert_eq!(store.query_node_at_point(Point::new(101.0, 150.0)), None);
    }

    #[test]
    fn test_unknown_node_queries_return_none() {
        let mut store = LayoutStore::default();
        assert!(store.node_layout(5).is_none());
        assert!(!store.move_node(5, Point::default()));
        assert!(store.slot_position(SlotRef::input(5, 0)).is_none());
        assert!(store.find_parent_group(5).is_none());
        assert!(store.remove_node(5).is_none());
    }

    #[test]
    fn test_collapsed_bounds() {
        let mut store = store_with_node();
        store.set_collapsed(1, true);
        assert_eq!(store.node_layout(1).map(|l| l.bounds), Some(Rect::new(100.0, 70.0, 80.0, 30.0)));
    }

    #[test]
    fn test_query_node_at_point_prefers_top() {
        let mut store = store_with_node();
        store.create_node(2, Point::new(150.0, 120.0), Size::new(100.0, 100.0), shape(0, 0));

        assert_eq!(store.query_node_at_point(Point::new(160.0, 130.0)), Some(2));
        store.bring_to_front(1);
        assert_eq!(store.query_node_at_point(Point::new(160.0, 130.0)), Some(1));
        store.set_node_visible(1, false);
        assert_eq!(store.query_node_at_point(Point::new(160.0, 130.0)), Some(2));
    }

    #[test]
    fn test_move_nodes_emits_single_change() {
        let mut store = store_with_node();
        store.create_node(2, Point::new(0.0, 0.0), Size::new(10.0, 10.0), shape(0, 0));
        let changes = Rc::new(RefCell::new(Vec::new()));
        let c = changes.clone();
        store.on_change(move |change| c.borrow_mut().push(change.clone()));

        let moved = store.move_nodes([(1, Point::new(5.0, 5.0)), (2, Point::new(6.0, 6.0)), (9, Point::default())]);
        assert_eq!(moved, 2);
        assert_eq!(*changes.borrow(), vec![LayoutChange::NodesUpdated(vec![1, 2])]);
    }

    // ========================================================================
    // Slot layouts
    // ========================================================================

    #[test]
    fn test_measured_slot_wins_over_computed() {
        let mut store = store_with_node();
        let slot = SlotRef::input(1, 0);
        assert_eq!(store.slot_position(slot), Some(Point::new(110.0, 114.0)));
        assert!(store.slot_layout(slot).is_none());

        store.update_slot_layout(slot, Point::new(103.5, 117.25));
        assert_eq!(store.slot_position(slot), Some(Point::new(103.5, 117.25)));

        store.delete_slot_layout(slot);
        assert_eq!(store.slot_position(slot), Some(Point::new(110.0, 114.0)));
    }

    #[test]
    fn test_measured_slot_follows_node() {
        let mut store = store_with_node();
        let slot = SlotRef::output(1, 0);
        store.update_slot_layout(slot, Point::new(295.0, 115.0));
        store.move_node(1, Point::new(200.0, 300.0));

        assert_eq!(store.slot_position(slot), Some(Point::new(395.0, 315.0)));
    }

    #[test]
    fn test_remove_node_drops_slot_layouts() {
        let mut store = store_with_node();
        store.update_slot_layout(SlotRef::input(1, 0), Point::new(1.0, 1.0));
        store.update_slot_layout(SlotRef::input(1, 1), Point::new(1.0, 2.0));
        store.remove_node(1);
        store.create_node(1, Point::new(100.0, 100.0), Size::new(200.0, 100.0), shape(2, 1));

        assert!(store.slot_layout(SlotRef::input(1, 0)).is_none());
        assert_eq!(store.delete_node_slot_layouts(1), 0);
    }

    #[test]
    fn test_slot_layout_for_unknown_node_is_ignored() {
        let mut store = LayoutStore::default();
        assert!(!store.update_slot_layout(SlotRef::input(3, 0), Point::new(1.0, 1.0)));
    }

    #[test]
    fn test_query_slot_at_point() {
        let store = store_with_node();
        assert_eq!(store.query_slot_at_point(Point::new(112.0, 135.0)), Some(SlotRef::input(1, 1)));
        assert_eq!(store.query_slot_at_point(Point::new(290.0, 114.0)), Some(SlotRef::output(1, 0)));
        assert_eq!(store.query_slot_at_point(Point::new(200.0, 160.0)), None);
    }

    #[test]
    fn test_slot_outside_node_rect_is_hittable() {
        let mut store = LayoutStore::default();
        let inputs = vec![SlotSpec::new("far", "*").with_offset(Point::new(-60.0, 40.0))];
        store.create_node(1, Point::new(100.0, 100.0), Size::new(200.0, 100.0), NodeShape::new(inputs, vec![]));
        let slot = SlotRef::input(1, 0);

        // (40, 140) lies 60 units left of the node body.
        assert_eq!(store.query_slot_at_point(Point::new(42.0, 141.0)), Some(slot));

        store.update_slot_layout(slot, Point::new(100.0, 400.0));
        assert_eq!(store.query_slot_at_point(Point::new(42.0, 141.0)), None);
        assert_eq!(store.query_slot_at_point(Point::new(101.0, 398.0)), Some(slot));

        store.move_node(1, Point::new(200.0, 100.0));
        assert_eq!(store.query_slot_at_point(Point::new(200.0, 400.0)), Some(slot));
        store.set_node_visible(1, false);
        assert_eq!(store.query_slot_at_point(Point::new(200.0, 400.0)), None);
    }

    #[test]
    fn test_set_node_slots_reindexes_slots() {
        let mut store = store_with_node();
        store.set_node_slots(1, vec![], vec![SlotSpec::new("out", "*")]);

        assert_eq!(store.query_slot_at_point(Point::new(110.0, 114.0)), None);
        assert_eq!(store.query_slot_at_point(Point::new(110.0, 134.0)), None);
        let output = store.slot_position(SlotRef::output(1, 0)).unwrap();
        assert_eq!(store.query_slot_at_point(output), Some(SlotRef::output(1, 0)));
    }

    // ========================================================================
    // Groups
    // ========================================================================

    #[test]
    fn test_find_parent_group_uses_innermost() {
        let mut store = LayoutStore::default();
        store.create_group(1, Rect::new(0.0, 0.0, 300.0, 300.0));
        store.create_group(2, Rect::new(50.0, 50.0, 100.0, 100.0));
        // Bounds (80, 70, 40, 70), centre (100, 105).
        store.create_node(7, Point::new(80.0, 100.0), Size::new(40.0, 40.0), shape(0, 0));

        assert_eq!(store.find_parent_group(7), Some(2));
        store.set_group_bounds(2, Rect::new(500.0, 500.0, 10.0, 10.0));
        assert_eq!(store.find_parent_group(7), Some(1));
        store.remove_group(1);
        assert_eq!(store.find_parent_group(7), None);
    }

    #[test]
    fn test_group_contents() {
        let mut store = store_with_node();
        store.create_group(1, Rect::new(0.0, 0.0, 400.0, 400.0));
        store.create_group(2, Rect::new(10.0, 300.0, 50.0, 50.0));

        let contents = store.group_contents(1).unwrap();
        assert_eq!(contents.nodes, vec![1]);
        assert_eq!(contents.groups, vec![2]);
    }

    // ========================================================================
    // Reroutes, hover, lifecycle
    // ========================================================================

    #[test]
    fn test_rejected_reroute_drops_previous_layout() {
        let mut store = LayoutStore::default();
        store.update_reroute_layout(4, Point::new(500.0, 500.0));
        assert!(!store.update_reroute_layout(4, Point::new(f32::NAN, 0.0)));
        assert!(store.reroute_layout(4).is_none());
        assert_eq!(store.query_reroute_at_point(Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn test_query_reroute_at_point() {
        let mut store = LayoutStore::default();
        store.update_reroute_layout(4, Point::new(500.0, 500.0));

        assert_eq!(store.query_reroute_at_point(Point::new(506.0, 506.0)), Some(4));
        // Inside the indexed square, outside the circle.
        assert_eq!(store.query_reroute_at_point(Point::new(509.0, 509.0)), None);
        store.delete_reroute_layout(4);
        assert_eq!(store.query_reroute_at_point(Point::new(500.0, 500.0)), None);
    }

    #[test]
    fn test_locate_order() {
        let mut store = store_with_node();
        store.update_reroute_layout(4, Point::new(600.0, 600.0));

        assert_eq!(store.locate(Point::new(110.0, 114.0)), Hover::Slot(SlotRef::input(1, 0)));
        assert_eq!(
            store.locate(Point::new(200.0, 180.0)),
            Hover::Node { node: 1, inputs: 2, outputs: 1 }
        );
        assert_eq!(store.locate(Point::new(600.0, 600.0)), Hover::Reroute(4));
        assert_eq!(store.locate(Point::new(-600.0, 600.0)), Hover::Nothing);
    }

    #[test]
    fn test_switch_graph_tears_down_everything() {
        let mut store = store_with_node();
        store.create_group(1, Rect::new(0.0, 0.0, 10.0, 10.0));
        store.update_reroute_layout(3, Point::new(1.0, 1.0));
        store.set_link_route(link(9, SlotRef::output(1, 0), SlotRef::input(1, 0)));
        let version = store.version();

        store.switch_graph(5);
        assert_eq!(store.graph_switches(), 1);
        assert_eq!(store.link_routes().count(), 0);
        assert!(store.query_link_segments_in_bounds(&Rect::new(-1e4, -1e4, 2e4, 2e4)).is_empty());
        assert!(store.query_slot_at_point(Point::new(110.0, 114.0)).is_none());
        assert_eq!(store.graph(), 5);
        assert_eq!(store.node_count(), 0);
        assert!(store.query_nodes_in_bounds(&Rect::new(-1e4, -1e4, 2e4, 2e4)).is_empty());
        assert!(store.query_groups_in_bounds(&Rect::new(-1.0, -1.0, 20.0, 20.0)).is_empty());
        assert!(store.query_reroute_at_point(Point::new(1.0, 1.0)).is_none());
        assert!(store.version() > version);
        assert!(!store.is_displayed(NodeRef::new(5, 1)));
    }

    // ========================================================================
    // Link segments
    // ========================================================================

    #[test]
    fn test_link_segments_follow_node_moves() {
        let mut store = store_with_link();
        assert_eq!(store.query_link_at_point(Point::new(400.0, 116.0), 8.0), Some(9));
        assert_eq!(
            store.query_link_segments_in_bounds(&Rect::new(390.0, 100.0, 20.0, 20.0)),
            vec![SegmentKey { link: 9, segment: 0 }]
        );

        store.move_node(2, Point::new(500.0, 600.0));
        assert_eq!(store.query_link_at_point(Point::new(400.0, 116.0), 8.0), None);
        assert_eq!(store.query_link_at_point(Point::new(400.0, 364.0), 8.0), Some(9));

        store.update_slot_layout(SlotRef::output(1, 0), Point::new(300.0, 120.0));
        assert_eq!(store.link_segments(9)[0].start, Point::new(300.0, 120.0));

        store.remove_node(2);
        assert!(store.link_segments(9).is_empty());
        assert!(store.link_route(9).is_some());
        store.create_node(2, Point::new(500.0, 100.0), Size::new(200.0, 100.0), shape(1, 0));
        assert_eq!(store.link_segments(9).len(), 1);
    }

    #[test]
    fn test_link_through_reroute_has_two_segments() {
        let mut store = store_with_link();
        store.update_reroute_layout(3, Point::new(400.0, 400.0));
        store.set_link_route(LinkRecord {
            reroute: Some(3),
            ..link(9, SlotRef::output(1, 0), SlotRef::input(2, 0))
        });

        let segments = store.link_segments(9);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].end, Point::new(400.0, 400.0));
        assert_eq!(segments[1].start, Point::new(400.0, 400.0));
        assert_eq!(store.query_link_at_point(Point::new(400.0, 116.0), 8.0), None);

        store.update_reroute_layout(3, Point::new(400.0, 114.0));
        assert_eq!(store.query_link_at_point(Point::new(400.0, 116.0), 8.0), Some(9));

        store.delete_reroute_layout(3);
        assert_eq!(store.link_segments(9).len(), 1);
        assert!(store.remove_link_route(9).is_some());
        assert_eq!(store.query_link_at_point(Point::new(400.0, 116.0), 8.0), None);
    }

    #[test]
    fn test_link_query_rejects_bad_tolerance() {
        let store = store_with_link();
        assert_eq!(store.query_link_at_point(Point::new(400.0, 114.0), 0.0), None);
        assert_eq!(store.query_link_at_point(Point::new(400.0, 114.0), f32::NAN), None);
    }

    #[test]
    fn test_query_items_in_bounds() {
        let mut store = store_with_link();
        store.create_group(4, Rect::new(380.0, 50.0, 40.0, 40.0));
        store.update_reroute_layout(6, Point::new(400.0, 130.0));

        let items = store.query_items_in_bounds(&Rect::new(350.0, 60.0, 100.0, 100.0));
        assert!(items.nodes.is_empty());
        assert_eq!(items.links, vec![9]);
        assert_eq!(items.groups, vec![4]);
        assert_eq!(items.reroutes, vec![6]);
    }

    #[test]
    fn test_off_change() {
        let mut store = LayoutStore::default();
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let id = store.on_change(move |_| *c.borrow_mut() += 1);
        store.create_node(1, Point::default(), Size::new(1.0, 1.0), shape(0, 0));
        assert!(store.off_change(id));
        store.create_node(2, Point::default(), Size::new(1.0, 1.0), shape(0, 0));
        assert_eq!(*count.borrow(), 1);
    }
}
