//! Link drag state machine.
//!
//! ```text
//!  Idle ──begin_drag──▶ Dragging ──commit_drag / cancel_drag──▶ Idle
//!                        │   ▲
//!                        └───┘ update_drag
//! ```
//!
//! While dragging, the connector owns one or more candidate
//! [`RenderLink`]s that share the kind of slot they are looking for. Each
//! pointer move resolves the hovered [`DropTarget`] and asks the candidates,
//! in order, whether any of them accepts it. The first acceptance settles the
//! question and later candidates are not asked.
//!
//! On drop every candidate that accepts the target is committed to it, not
//! just the first. Dropping over a target nobody accepts is a normal no-op
//! ending; dropping over empty canvas detaches picked-up links. Every drop
//! and every cancel ends with [`ConnectorEvent::Reset`].

use crate::error::{ConnectorError, ConnectorResult};
use crate::events::{ConnectorEvent, ConnectorEvents, EventKind, ListenerId};
use crate::geometry::Point;
use crate::ids::{LinkId, NodeId, RerouteId, SlotKind, SlotRef, SUBGRAPH_INPUT_ID, SUBGRAPH_OUTPUT_ID};
use crate::network::LinkNetwork;
use crate::render_link::{MovingLinkDrag, NewLinkDrag, RenderLink};
use crate::validation::ConnectionValidator;
use std::rc::Rc;
use tracing::debug;

/// Where a dragged link can land.
#[derive(Debug, Clone, PartialEq)]
pub enum DropTarget {
    Input(SlotRef),
    Output(SlotRef),
    /// A reroute, reached from the output side: the new link feeds `inputs`.
    RerouteInput { reroute: RerouteId, inputs: Vec<SlotRef> },
    /// A reroute, reached from the input side: the new link is fed by `output`.
    RerouteOutput { reroute: RerouteId, output: SlotRef },
    /// Subgraph input boundary slot (links leave it like an output).
    SubgraphInput(usize),
    /// Subgraph output boundary slot (links enter it like an input).
    SubgraphOutput(usize),
}

/// What is under the pointer, before candidate-specific resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Hover {
    Slot(SlotRef),
    /// A node body away from any slot.
    Node { node: NodeId, inputs: usize, outputs: usize },
    Reroute(RerouteId),
    Nothing,
}

/// Finds what lies under a canvas point.
pub trait DropTargetLocator {
    fn locate(&self, point: Point) -> Hover;
}

impl<F> DropTargetLocator for F
where
    F: Fn(Point) -> Hover,
{
    fn locate(&self, point: Point) -> Hover {
        self(point)
    }
}

/// Result of a finished drop.
#[derive(Debug, Clone, PartialEq)]
pub struct DropOutcome {
    pub target: Option<DropTarget>,
    /// Candidates that were connected to the target.
    pub committed: usize,
}

fn accepts(link: &dyn RenderLink, target: &DropTarget, network: &LinkNetwork) -> bool {
    match target {
        DropTarget::Input(slot) => link.can_connect_to_input(*slot, network),
        DropTarget::Output(slot) => link.can_connect_to_output(*slot, network),
        DropTarget::RerouteInput { reroute, inputs } => {
            link.can_connect_to_reroute(*reroute, network)
                && inputs.iter().any(|i| link.can_connect_to_input(*i, network))
        }
        DropTarget::RerouteOutput { reroute, output } => {
            link.can_connect_to_reroute(*reroute, network) && link.can_connect_to_output(*output, network)
        }
        DropTarget::SubgraphInput(index) => link.can_connect_to_subgraph_input(*index, network),
        DropTarget::SubgraphOutput(index) => link.can_connect_to_subgraph_output(*index, network),
    }
}

fn commit(link: &mut dyn RenderLink, target: &DropTarget, network: &mut LinkNetwork, events: &mut ConnectorEvents) {
    match target {
        DropTarget::Input(slot) => link.connect_to_input(*slot, network, events),
        DropTarget::Output(slot) => link.connect_to_output(*slot, network, events),
        DropTarget::RerouteInput { reroute, inputs } => {
            for input in inputs {
                if link.can_connect_to_input(*input, network) {
                    link.connect_to_reroute_input(*reroute, *input, network, events);
                }
            }
        }
        DropTarget::RerouteOutput { reroute, output } => {
            link.connect_to_reroute_output(*reroute, *output, network, events)
        }
        DropTarget::SubgraphInput(index) => link.connect_to_subgraph_input(*index, network, events),
        DropTarget::SubgraphOutput(index) => link.connect_to_subgraph_output(*index, network, events),
    }
}

fn slot_target(slot: SlotRef) -> DropTarget {
    match slot.kind {
        SlotKind::Input => DropTarget::Input(slot),
        SlotKind::Output => DropTarget::Output(slot),
    }
}

struct ActiveDrag {
    connecting_to: SlotKind,
    candidates: Vec<Box<dyn RenderLink>>,
    pointer: Point,
    hover: Option<DropTarget>,
    hover_valid: bool,
}

impl ActiveDrag {
    fn any_accepts(&self, target: &DropTarget, network: &LinkNetwork) -> bool {
        self.candidates
            .iter()
            .any(|c| accepts(c.as_ref(), target, network))
    }

    fn resolve(&self, hover: Hover, network: &LinkNetwork) -> Option<DropTarget> {
        match hover {
            Hover::Slot(slot) if slot.node == SUBGRAPH_INPUT_ID => Some(DropTarget::SubgraphInput(slot.index)),
            Hover::Slot(slot) if slot.node == SUBGRAPH_OUTPUT_ID => Some(DropTarget::SubgraphOutput(slot.index)),
            Hover::Slot(slot) => Some(slot_target(slot)),
            Hover::Node { node, inputs, outputs } => {
                let kind = self.connecting_to;
                let count = match kind {
                    SlotKind::Input => inputs,
                    SlotKind::Output => outputs,
                };
                (0..count)
                    .map(|index| slot_target(SlotRef { node, index, kind }))
                    .find(|target| self.any_accepts(target, network))
            }
            Hover::Reroute(reroute) => match self.connecting_to {
                SlotKind::Input => Some(DropTarget::RerouteInput {
                    reroute,
                    inputs: network.reroute_targets(reroute),
                }),
                SlotKind::Output => network
                    .reroute_source(reroute)
                    .map(|output| DropTarget::RerouteOutput { reroute, output }),
            },
            Hover::Nothing => None,
        }
    }
}

enum DragState {
    Idle,
    Dragging(ActiveDrag),
}

/// Drives a link drag from first pointer-down to drop or cancel.
pub struct LinkConnector {
    state: DragState,
    events: ConnectorEvents,
}

impl Default for LinkConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl LinkConnector {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
            events: ConnectorEvents::new(),
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    pub fn events(&self) -> &ConnectorEvents {
        &self.events
    }

    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&ConnectorEvent) + 'static,
    {
        self.events.on(kind, callback)
    }

    pub fn listen_until_reset<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&ConnectorEvent) + 'static,
    {
        self.events.listen_until_reset(kind, callback)
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        self.events.off(id)
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    fn active(&self) -> Option<&ActiveDrag> {
        match &self.state {
            DragState::Dragging(drag) => Some(drag),
            DragState::Idle => None,
        }
    }

    /// Kind of slot the dragged links are looking for.
    pub fn connecting_to(&self) -> Option<SlotKind> {
        self.active().map(|d| d.connecting_to)
    }

    pub fn candidate_count(&self) -> usize {
        self.active().map_or(0, |d| d.candidates.len())
    }

    pub fn candidates(&self) -> impl Iterator<Item = &(dyn RenderLink + 'static)> + '_ {
        self.active()
            .into_iter()
            .flat_map(|d| d.candidates.iter().map(|c| c.as_ref()))
    }

    pub fn pointer(&self) -> Option<Point> {
        self.active().map(|d| d.pointer)
    }

    pub fn hover_target(&self) -> Option<&DropTarget> {
        self.active().and_then(|d| d.hover.as_ref())
    }

    /// Whether some candidate accepts the current hover target.
    pub fn is_hover_valid(&self) -> bool {
        self.active().is_some_and(|d| d.hover_valid)
    }

    // ------------------------------------------------------------------
    // Starting a drag
    // ------------------------------------------------------------------

    /// Start dragging `candidates`. They must all look for the same kind of slot.
    pub fn begin_drag(&mut self, candidates: Vec<Box<dyn RenderLink>>, pointer: Point) -> ConnectorResult<()> {
        if self.is_dragging() {
            return Err(ConnectorError::AlreadyDragging);
        }
        let connecting_to = candidates
            .first()
            .map(|c| c.to_type())
            .ok_or(ConnectorError::NoCandidates)?;
        if candidates.iter().any(|c| c.to_type() != connecting_to) {
            return Err(ConnectorError::MixedDirections);
        }

        debug!(candidates = candidates.len(), ?connecting_to, "link drag started");
        self.state = DragState::Dragging(ActiveDrag {
            connecting_to,
            candidates,
            pointer,
            hover: None,
            hover_valid: false,
        });
        Ok(())
    }

    /// Pull a new link out of `origin`.
    pub fn drag_new_from_slot(
        &mut self,
        origin: SlotRef,
        validator: Rc<dyn ConnectionValidator>,
        pointer: Point,
    ) -> ConnectorResult<()> {
        self.begin_drag(vec![Box::new(NewLinkDrag::new(origin, validator))], pointer)
    }

    /// Pull a new link out of a reroute, towards `to`.
    pub fn drag_from_reroute(
        &mut self,
        network: &LinkNetwork,
        reroute: RerouteId,
        to: SlotKind,
        validator: Rc<dyn ConnectionValidator>,
        pointer: Point,
    ) -> ConnectorResult<()> {
        if network.reroute(reroute).is_none() {
            return Err(ConnectorError::UnknownReroute(reroute));
        }
        let origin = match to {
            SlotKind::Input => network.reroute_source(reroute),
            SlotKind::Output => network.reroute_targets(reroute).first().copied(),
        }
        .ok_or(ConnectorError::NoSource(reroute))?;
        self.begin_drag(
            vec![Box::new(NewLinkDrag::through_reroute(origin, reroute, validator))],
            pointer,
        )
    }

    /// Pick up the input end of the link feeding `input`.
    pub fn move_input_link(
        &mut self,
        network: &LinkNetwork,
        input: SlotRef,
        validator: Rc<dyn ConnectionValidator>,
        pointer: Point,
    ) -> ConnectorResult<()> {
        let link = network
            .link_into(input)
            .map(|l| l.id)
            .ok_or(ConnectorError::NoCandidates)?;
        self.drag_link_end(network, link, SlotKind::Input, validator, pointer)
    }

    /// Pick up the output end of every link leaving `output`.
    pub fn move_output_links(
        &mut self,
        network: &LinkNetwork,
        output: SlotRef,
        validator: Rc<dyn ConnectionValidator>,
        pointer: Point,
    ) -> ConnectorResult<()> {
        let candidates: Vec<Box<dyn RenderLink>> = network
            .links_from(output)
            .filter_map(|l| MovingLinkDrag::new(network, l.id, SlotKind::Output, validator.clone()))
            .map(|m| Box::new(m) as Box<dyn RenderLink>)
            .collect();
        self.begin_drag(candidates, pointer)
    }

    /// Pick up one end of an existing link.
    pub fn drag_link_end(
        &mut self,
        network: &LinkNetwork,
        link: LinkId,
        end: SlotKind,
        validator: Rc<dyn ConnectionValidator>,
        pointer: Point,
    ) -> ConnectorResult<()> {
        let moving = MovingLinkDrag::new(network, link, end, validator).ok_or(ConnectorError::UnknownLink(link))?;
        self.begin_drag(vec![Box::new(moving)], pointer)
    }

    // ------------------------------------------------------------------
    // Pointer move / drop / cancel
    // ------------------------------------------------------------------

    /// Track the pointer and recompute the hover target and its validity.
    ///
    /// Returns whether the hovered target is a valid drop.
    pub fn update_drag(
        &mut self,
        pointer: Point,
        locator: &dyn DropTargetLocator,
        network: &LinkNetwork,
    ) -> ConnectorResult<bool> {
        let DragState::Dragging(drag) = &mut self.state else {
            return Err(ConnectorError::NotDragging);
        };
        drag.pointer = pointer;
        let hover = drag.resolve(locator.locate(pointer), network);
        drag.hover_valid = hover.as_ref().is_some_and(|t| drag.any_accepts(t, network));
        drag.hover = hover;
        Ok(drag.hover_valid)
    }

    /// Drop at the last tracked pointer position.
    pub fn commit_drag(&mut self, network: &mut LinkNetwork) -> ConnectorResult<DropOutcome> {
        let DragState::Dragging(mut drag) = std::mem::replace(&mut self.state, DragState::Idle) else {
            return Err(ConnectorError::NotDragging);
        };
        let events = &mut self.events;
        let pointer = drag.pointer;
        let target = drag.hover.take();

        events.dispatch(ConnectorEvent::BeforeDrop {
            target: target.clone(),
            pointer,
        });

        let mut committed = 0;
        match &target {
            Some(target) => {
                for candidate in drag.candidates.iter_mut() {
                    if accepts(candidate.as_ref(), target, network) {
                        commit(candidate.as_mut(), target, network, events);
                        committed += 1;
                    }
                }
            }
            None => {
                events.dispatch(ConnectorEvent::DroppedOnCanvas { pointer });
                for candidate in drag.candidates.iter_mut() {
                    candidate.disconnect(network, events);
                }
            }
        }

        debug!(committed, ?target, "link drag dropped");
        events.dispatch(ConnectorEvent::AfterDrop {
            target: target.clone(),
            pointer,
            committed,
        });
        events.dispatch(ConnectorEvent::Reset);
        Ok(DropOutcome { target, committed })
    }

    /// Abandon the drag. Returns `false` (and emits nothing) when idle.
    pub fn cancel_drag(&mut self) -> bool {
        if !self.is_dragging() {
            return false;
        }
        self.state = DragState::Idle;
        debug!("link drag cancelled");
        self.events.dispatch(ConnectorEvent::Reset);
        true
    }
}
