//! Group containment.
//!
//! Groups carry no parent field; which group owns a node is derived from
//! geometry every time it is asked for, so moving a node or resizing a group
//! never leaves a stale relationship behind.

use crate::geometry::{Point, Rect};
use crate::ids::{GroupId, NodeId};

/// Trait for group geometry data needed for containment queries
pub trait GroupGeometry {
    fn id(&self) -> GroupId;
    fn bounds(&self) -> Rect;
}

/// Simple implementation of GroupGeometry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimpleGroupGeometry {
    pub id: GroupId,
    pub bounds: Rect,
}

impl SimpleGroupGeometry {
    pub fn new(id: GroupId, bounds: Rect) -> Self {
        Self { id, bounds }
    }
}

impl GroupGeometry for SimpleGroupGeometry {
    fn id(&self) -> GroupId { self.id }
    fn bounds(&self) -> Rect { self.bounds }
}

impl<G: GroupGeometry> GroupGeometry for &G {
    fn id(&self) -> GroupId { (*self).id() }
    fn bounds(&self) -> Rect { (*self).bounds() }
}

/// Find the innermost group whose rectangle contains the centre of `node_bounds`.
///
/// A group is a candidate when it contains the node's centre (a node hanging
/// over a group edge belongs to the group only if its centre is inside).
/// Among candidates, one whose rectangle fits inside the current best
/// replaces it; otherwise a strictly smaller area wins. The result does not
/// depend on the order groups are supplied in.
///
/// Runs in O(groups).
pub fn find_parent_group<G, I>(node_bounds: Rect, groups: I) -> Option<GroupId>
where
    G: GroupGeometry,
    I: IntoIterator<Item = G>,
{
    innermost_containing(node_bounds.centre(), groups)
}

/// Same as [`find_parent_group`], for an arbitrary point.
pub fn innermost_containing<G, I>(point: Point, groups: I) -> Option<GroupId>
where
    G: GroupGeometry,
    I: IntoIterator<Item = G>,
{
    let mut best: Option<(GroupId, Rect)> = None;

    for group in groups {
        let bounds = group.bounds();
        if !bounds.contains_point(point) {
            continue;
        }
        best = match best {
            None => Some((group.id(), bounds)),
            Some((best_id, best_bounds)) => {
                let nested = best_bounds.contains_rect(&bounds) && !bounds.contains_rect(&best_bounds);
                if nested || (!bounds.contains_rect(&best_bounds) && bounds.area() < best_bounds.area()) {
                    Some((group.id(), bounds))
                } else {
                    Some((best_id, best_bounds))
                }
            }
        };
    }

    best.map(|(id, _)| id)
}

/// What a group currently encloses.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupContents {
    /// Nodes whose centre lies in the group.
    pub nodes: Vec<NodeId>,
    /// Other groups entirely inside the group.
    pub groups: Vec<GroupId>,
}

/// Compute the nodes and groups enclosed by `group`.
pub fn group_contents<'a, N, G>(group: &SimpleGroupGeometry, nodes: N, groups: G) -> GroupContents
where
    N: IntoIterator<Item = (NodeId, Rect)>,
    G: IntoIterator<Item = &'a SimpleGroupGeometry>,
{
    let nodes = nodes
        .into_iter()
        .filter(|(_, rect)| group.bounds.contains_point(rect.centre()))
        .map(|(id, _)| id)
        .collect();
    let groups = groups
        .into_iter()
        .filter(|g| g.id != group.id && group.bounds.contains_rect(&g.bounds))
        .map(|g| g.id)
        .collect();
    GroupContents { nodes, groups }
}
