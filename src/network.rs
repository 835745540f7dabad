//! Committed link topology.
//!
//! [`LinkNetwork`] holds the links that exist between slots, the reroutes
//! they pass through, and the type signature of each slot. The link
//! connector reads it to validate a drag and writes to it when a drop
//! commits.

use crate::ids::{LinkId, NodeId, RerouteId, SlotKind, SlotRef};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// A committed link from an output slot to an input slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkRecord {
    pub id: LinkId,
    pub origin: SlotRef,
    pub target: SlotRef,
    /// Last reroute on the way from origin to target.
    pub reroute: Option<RerouteId>,
}

/// A pass-through point on one or more links.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reroute {
    pub id: RerouteId,
    /// Reroute closer to the origin, for chained reroutes.
    pub parent: Option<RerouteId>,
}

#[derive(Debug, Default)]
pub struct LinkNetwork {
    links: BTreeMap<LinkId, LinkRecord>,
    reroutes: BTreeMap<RerouteId, Reroute>,
    slot_types: HashMap<SlotRef, String>,
    next_link_id: LinkId,
    next_reroute_id: RerouteId,
    revision: u64,
}

impl LinkNetwork {
    pub fn new() -> Self {
        Self {
            next_link_id: 1,
            next_reroute_id: 1,
            ..Self::default()
        }
    }

    /// Bumped whenever a link is added, removed or rerouted.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ------------------------------------------------------------------
    // Links
    // ------------------------------------------------------------------

    /// Create a link between two slots, in either order.
    ///
    /// An input holds at most one link, so any link already feeding the
    /// input is replaced.
    pub fn connect(&mut self, a: SlotRef, b: SlotRef, reroute: Option<RerouteId>) -> LinkId {
        let (origin, target) = if a.kind == SlotKind::Output { (a, b) } else { (b, a) };

        if let Some(existing) = self.link_into(target).map(|l| l.id) {
            self.links.remove(&existing);
        }

        let id = self.next_link_id.max(1);
        self.next_link_id = id + 1;
        self.links.insert(id, LinkRecord { id, origin, target, reroute });
        self.revision += 1;
        debug!(link = id, ?origin, ?target, "link connected");
        id
    }

    pub fn disconnect(&mut self, id: LinkId) -> Option<LinkRecord> {
        let removed = self.links.remove(&id);
        if removed.is_some() {
            self.revision += 1;
            debug!(link = id, "link disconnected");
        }
        removed
    }

    /// Point an existing link at a different input.
    pub fn relink_target(&mut self, id: LinkId, target: SlotRef) -> Option<LinkRecord> {
        if !self.links.contains_key(&id) {
            return None;
        }
        if let Some(existing) = self.link_into(target).map(|l| l.id).filter(|l| *l != id) {
            self.links.remove(&existing);
        }
        let link = self.links.get_mut(&id)?;
        link.target = target;
        self.revision += 1;
        Some(*link)
    }

    /// Feed an existing link from a different output.
    pub fn relink_origin(&mut self, id: LinkId, origin: SlotRef) -> Option<LinkRecord> {
        let link = self.links.get_mut(&id)?;
        link.origin = origin;
        self.revision += 1;
        Some(*link)
    }

    pub fn link(&self, id: LinkId) -> Option<&LinkRecord> {
        self.links.get(&id)
    }

    pub fn links(&self) -> impl Iterator<Item = &LinkRecord> + '_ {
        self.links.values()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn link_into(&self, input: SlotRef) -> Option<&LinkRecord> {
        self.links.values().find(|l| l.target == input)
    }

    pub fn links_from(&self, output: SlotRef) -> impl Iterator<Item = &LinkRecord> + '_ {
        self.links.values().filter(move |l| l.origin == output)
    }

    pub fn has_link(&self, origin: SlotRef, target: SlotRef) -> bool {
        self.links
            .values()
            .any(|l| l.origin == origin && l.target == target)
    }

    pub fn links_of_node(&self, node: NodeId) -> Vec<LinkId> {
        self.links
            .values()
            .filter(|l| l.origin.node == node || l.target.node == node)
            .map(|l| l.id)
            .collect()
    }

    /// Drop every link touching `node`.
    pub fn remove_node_links(&mut self, node: NodeId) -> Vec<LinkRecord> {
        let removed: Vec<LinkRecord> = self
            .links_of_node(node)
            .into_iter()
            .filter_map(|id| self.links.remove(&id))
            .collect();
        if !removed.is_empty() {
            self.revision += 1;
        }
        removed
    }

    // ------------------------------------------------------------------
    // Reroutes
    // ------------------------------------------------------------------

    pub fn add_reroute(&mut self, parent: Option<RerouteId>) -> RerouteId {
        let id = self.next_reroute_id.max(1);
        self.next_reroute_id = id + 1;
        self.reroutes.insert(id, Reroute { id, parent });
        id
    }

    /// Remove a reroute; links that ran through it fall back to its parent.
    pub fn remove_reroute(&mut self, id: RerouteId) -> Option<Reroute> {
        let removed = self.reroutes.remove(&id)?;
        self.revision += 1;
        for link in self.links.values_mut() {
            if link.reroute == Some(id) {
                link.reroute = removed.parent;
            }
        }
        for reroute in self.reroutes.values_mut() {
            if reroute.parent == Some(id) {
                reroute.parent = removed.parent;
            }
        }
        Some(removed)
    }

    pub fn reroute(&self, id: RerouteId) -> Option<&Reroute> {
        self.reroutes.get(&id)
    }

    pub fn reroutes(&self) -> impl Iterator<Item = &Reroute> + '_ {
        self.reroutes.values()
    }

    pub fn route_through(&mut self, link: LinkId, reroute: RerouteId) -> bool {
        if !self.reroutes.contains_key(&reroute) {
            return false;
        }
        match self.links.get_mut(&link) {
            Some(l) => {
                l.reroute = Some(reroute);
                self.revision += 1;
                true
            }
            None => false,
        }
    }

    /// `ancestor` is `reroute` itself or lies upstream of it.
    pub fn is_upstream(&self, ancestor: RerouteId, reroute: RerouteId) -> bool {
        let mut current = Some(reroute);
        let mut hops = 0;
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            hops += 1;
            if hops > self.reroutes.len() {
                return false;
            }
            current = self.reroutes.get(&id).and_then(|r| r.parent);
        }
        false
    }

    fn passes_through(&self, link: &LinkRecord, reroute: RerouteId) -> bool {
        link.reroute
            .is_some_and(|last| self.is_upstream(reroute, last))
    }

    /// Output slot feeding the links that pass through `reroute`.
    pub fn reroute_source(&self, reroute: RerouteId) -> Option<SlotRef> {
        self.links
            .values()
            .find(|l| self.passes_through(l, reroute))
            .map(|l| l.origin)
    }

    /// Input slots reached through `reroute`.
    pub fn reroute_targets(&self, reroute: RerouteId) -> Vec<SlotRef> {
        self.links
            .values()
            .filter(|l| self.passes_through(l, reroute))
            .map(|l| l.target)
            .collect()
    }

    // ------------------------------------------------------------------
    // Slot types
    // ------------------------------------------------------------------

    pub fn set_slot_type(&mut self, slot: SlotRef, type_name: impl Into<String>) {
        self.slot_types.insert(slot, type_name.into());
    }

    /// Type signature of `slot`; `*` when none was registered.
    pub fn slot_type(&self, slot: SlotRef) -> &str {
        self.slot_types.get(&slot).map_or("*", String::as_str)
    }

    pub fn clear_node_types(&mut self, node: NodeId) {
        self.slot_types.retain(|slot, _| slot.node != node);
    }
}
