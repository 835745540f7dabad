//! Links being dragged.
//!
//! A [`RenderLink`] is one candidate carried by the
//! [`LinkConnector`](crate::LinkConnector) during a drag. It has a fixed end
//! and decides for itself whether it may terminate on a given target and
//! what committing there means for the [`LinkNetwork`].
//!
//! Two implementations cover the usual gestures:
//!
//! - [`NewLinkDrag`]: a new link pulled out of a slot, reroute, or subgraph
//!   boundary slot.
//! - [`MovingLinkDrag`]: an existing link with one end picked up.

use crate::events::{ConnectorEvent, ConnectorEvents};
use crate::ids::{RerouteId, SlotKind, SlotRef, SUBGRAPH_INPUT_ID, SUBGRAPH_OUTPUT_ID};
use crate::network::{LinkNetwork, LinkRecord};
use crate::validation::ConnectionValidator;
use std::rc::Rc;

/// Boundary slot that subgraph-input drops connect from.
pub fn subgraph_input_slot(index: usize) -> SlotRef {
    SlotRef::output(SUBGRAPH_INPUT_ID, index)
}

/// Boundary slot that subgraph-output drops connect to.
pub fn subgraph_output_slot(index: usize) -> SlotRef {
    SlotRef::input(SUBGRAPH_OUTPUT_ID, index)
}

/// A candidate link in an active drag.
pub trait RenderLink {
    /// Kind of slot the free end is looking for.
    fn to_type(&self) -> SlotKind;

    /// The fixed end, where the drag preview is drawn from.
    fn from_slot(&self) -> SlotRef;

    fn from_reroute(&self) -> Option<RerouteId> {
        None
    }

    fn can_connect_to_input(&self, input: SlotRef, network: &LinkNetwork) -> bool;

    fn can_connect_to_output(&self, output: SlotRef, network: &LinkNetwork) -> bool;

    fn can_connect_to_reroute(&self, reroute: RerouteId, network: &LinkNetwork) -> bool;

    fn can_connect_to_subgraph_input(&self, index: usize, network: &LinkNetwork) -> bool {
        self.can_connect_to_output(subgraph_input_slot(index), network)
    }

    fn can_connect_to_subgraph_output(&self, index: usize, network: &LinkNetwork) -> bool {
        self.can_connect_to_input(subgraph_output_slot(index), network)
    }

    fn connect_to_input(&mut self, input: SlotRef, network: &mut LinkNetwork, events: &mut ConnectorEvents);

    fn connect_to_output(&mut self, output: SlotRef, network: &mut LinkNetwork, events: &mut ConnectorEvents);

    fn connect_to_reroute_input(
        &mut self,
        reroute: RerouteId,
        input: SlotRef,
        network: &mut LinkNetwork,
        events: &mut ConnectorEvents,
    );

    fn connect_to_reroute_output(
        &mut self,
        reroute: RerouteId,
        output: SlotRef,
        network: &mut LinkNetwork,
        events: &mut ConnectorEvents,
    );

    fn connect_to_subgraph_input(&mut self, index: usize, network: &mut LinkNetwork, events: &mut ConnectorEvents) {
        self.connect_to_output(subgraph_input_slot(index), network, events);
    }

    fn connect_to_subgraph_output(&mut self, index: usize, network: &mut LinkNetwork, events: &mut ConnectorEvents) {
        self.connect_to_input(subgraph_output_slot(index), network, events);
    }

    /// Called when the drag ends over empty canvas.
    fn disconnect(&mut self, _network: &mut LinkNetwork, _events: &mut ConnectorEvents) {}
}

fn emit_created(network: &LinkNetwork, id: i32, events: &mut ConnectorEvents) {
    if let Some(link) = network.link(id).copied() {
        events.dispatch(ConnectorEvent::LinkCreated { link });
    }
}

/// A new link pulled out of `origin`.
pub struct NewLinkDrag {
    origin: SlotRef,
    from_reroute: Option<RerouteId>,
    validator: Rc<dyn ConnectionValidator>,
}

impl NewLinkDrag {
    pub fn new(origin: SlotRef, validator: Rc<dyn ConnectionValidator>) -> Self {
        Self {
            origin,
            from_reroute: None,
            validator,
        }
    }

    /// A link pulled out of a reroute. `origin` is the slot at the far side
    /// of the reroute (its source output, or one of its target inputs).
    pub fn through_reroute(origin: SlotRef, reroute: RerouteId, validator: Rc<dyn ConnectionValidator>) -> Self {
        Self {
            origin,
            from_reroute: Some(reroute),
            validator,
        }
    }

    pub fn origin(&self) -> SlotRef {
        self.origin
    }
}

impl RenderLink for NewLinkDrag {
    fn to_type(&self) -> SlotKind {
        self.origin.kind.opposite()
    }

    fn from_slot(&self) -> SlotRef {
        self.origin
    }

    fn from_reroute(&self) -> Option<RerouteId> {
        self.from_reroute
    }

    fn can_connect_to_input(&self, input: SlotRef, network: &LinkNetwork) -> bool {
        self.to_type() == SlotKind::Input && self.validator.validate(self.origin, input, network).is_valid()
    }

    fn can_connect_to_output(&self, output: SlotRef, network: &LinkNetwork) -> bool {
        self.to_type() == SlotKind::Output && self.validator.validate(output, self.origin, network).is_valid()
    }

    fn can_connect_to_reroute(&self, reroute: RerouteId, network: &LinkNetwork) -> bool {
        if network.reroute(reroute).is_none() {
            return false;
        }
        match self.from_reroute {
            Some(from) => !network.is_upstream(reroute, from) && !network.is_upstream(from, reroute),
            None => true,
        }
    }

    fn connect_to_input(&mut self, input: SlotRef, network: &mut LinkNetwork, events: &mut ConnectorEvents) {
        let id = network.connect(self.origin, input, self.from_reroute);
        emit_created(network, id, events);
    }

    fn connect_to_output(&mut self, output: SlotRef, network: &mut LinkNetwork, events: &mut ConnectorEvents) {
        let id = network.connect(output, self.origin, self.from_reroute);
        emit_created(network, id, events);
    }

    fn connect_to_reroute_input(
        &mut self,
        reroute: RerouteId,
        input: SlotRef,
        network: &mut LinkNetwork,
        events: &mut ConnectorEvents,
    ) {
        let id = network.connect(self.origin, input, Some(reroute));
        emit_created(network, id, events);
    }

    fn connect_to_reroute_output(
        &mut self,
        reroute: RerouteId,
        output: SlotRef,
        network: &mut LinkNetwork,
        events: &mut ConnectorEvents,
    ) {
        let id = network.connect(output, self.origin, Some(reroute));
        emit_created(network, id, events);
    }
}

/// An existing link with one end picked up.
pub struct MovingLinkDrag {
    link: LinkRecord,
    moving: SlotKind,
    validator: Rc<dyn ConnectionValidator>,
}

impl MovingLinkDrag {
    /// Pick up the `moving` end of `link`. Returns `None` for unknown links.
    pub fn new(
        network: &LinkNetwork,
        link: i32,
        moving: SlotKind,
        validator: Rc<dyn ConnectionValidator>,
    ) -> Option<Self> {
        let link = *network.link(link)?;
        Some(Self { link, moving, validator })
    }

    pub fn link(&self) -> &LinkRecord {
        &self.link
    }

    fn moved(&mut self, updated: Option<LinkRecord>, previous: SlotRef, events: &mut ConnectorEvents) {
        if let Some(link) = updated {
            self.link = link;
            events.dispatch(ConnectorEvent::LinkMoved { link, previous });
        }
    }
}

impl RenderLink for MovingLinkDrag {
    fn to_type(&self) -> SlotKind {
        self.moving
    }

    fn from_slot(&self) -> SlotRef {
        match self.moving {
            SlotKind::Input => self.link.origin,
            SlotKind::Output => self.link.target,
        }
    }

    fn from_reroute(&self) -> Option<RerouteId> {
        self.link.reroute
    }

    fn can_connect_to_input(&self, input: SlotRef, network: &LinkNetwork) -> bool {
        self.moving == SlotKind::Input
            && input != self.link.target
            && self.validator.validate(self.link.origin, input, network).is_valid()
    }

    fn can_connect_to_output(&self, output: SlotRef, network: &LinkNetwork) -> bool {
        self.moving == SlotKind::Output
            && output != self.link.origin
            && self.validator.validate(output, self.link.target, network).is_valid()
    }

    /// Only a moved output end can be re-fed through a reroute.
    fn can_connect_to_reroute(&self, reroute: RerouteId, network: &LinkNetwork) -> bool {
        self.moving == SlotKind::Output && network.reroute(reroute).is_some()
    }

    fn connect_to_input(&mut self, input: SlotRef, network: &mut LinkNetwork, events: &mut ConnectorEvents) {
        let previous = self.link.target;
        let updated = network.relink_target(self.link.id, input);
        self.moved(updated, previous, events);
    }

    fn connect_to_output(&mut self, output: SlotRef, network: &mut LinkNetwork, events: &mut ConnectorEvents) {
        let previous = self.link.origin;
        let updated = network.relink_origin(self.link.id, output);
        self.moved(updated, previous, events);
    }

    fn connect_to_reroute_input(
        &mut self,
        reroute: RerouteId,
        input: SlotRef,
        network: &mut LinkNetwork,
        events: &mut ConnectorEvents,
    ) {
        let previous = self.link.target;
        network.relink_target(self.link.id, input);
        network.route_through(self.link.id, reroute);
        let updated = network.link(self.link.id).copied();
        self.moved(updated, previous, events);
    }

    fn connect_to_reroute_output(
        &mut self,
        reroute: RerouteId,
        output: SlotRef,
        network: &mut LinkNetwork,
        events: &mut ConnectorEvents,
    ) {
        let previous = self.link.origin;
        network.relink_origin(self.link.id, output);
        network.route_through(self.link.id, reroute);
        let updated = network.link(self.link.id).copied();
        self.moved(updated, previous, events);
    }

    fn disconnect(&mut self, network: &mut LinkNetwork, events: &mut ConnectorEvents) {
        if let Some(link) = network.disconnect(self.link.id) {
            events.dispatch(ConnectorEvent::LinkDisconnected { link });
        }
    }
}
