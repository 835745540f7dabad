//! Level 4: Link Connector Tests
//!
//! Drag lifecycle with several candidates, event ordering, cancel
//! behaviour and the link gestures an editor offers.

mod common;

use common::EventTracker;
use slint_node_layout::{
    default_validator, ConnectionValidator, ConnectorEvent, ConnectorEvents, DropTarget, EventKind,
    Hover, LinkConnector, LinkNetwork, Point, RenderLink, RerouteId, SlotKind, SlotRef,
};
use std::cell::Cell;
use std::rc::Rc;

fn validator() -> Rc<dyn ConnectionValidator> {
    Rc::new(default_validator())
}

fn attach(connector: &mut LinkConnector) -> EventTracker {
    common::init_tracing();
    let tracker = EventTracker::new();
    for kind in common::ALL_KINDS {
        let events = tracker.events.clone();
        connector.on(kind, move |e| events.borrow_mut().push(e.clone()));
    }
    tracker
}

/// Candidate that counts how often it is asked and committed.
struct CountingLink {
    origin: SlotRef,
    accepts: bool,
    asked: Rc<Cell<usize>>,
    committed: Rc<Cell<usize>>,
}

impl CountingLink {
    fn new(node: i32, accepts: bool) -> (Self, Rc<Cell<usize>>, Rc<Cell<usize>>) {
        let asked = Rc::new(Cell::new(0));
        let committed = Rc::new(Cell::new(0));
        let link = Self {
            origin: SlotRef::output(node, 0),
            accepts,
            asked: asked.clone(),
            committed: committed.clone(),
        };
        (link, asked, committed)
    }
}

impl RenderLink for CountingLink {
    fn to_type(&self) -> SlotKind {
        SlotKind::Input
    }

    fn from_slot(&self) -> SlotRef {
        self.origin
    }

    fn can_connect_to_input(&self, _input: SlotRef, _network: &LinkNetwork) -> bool {
        self.asked.set(self.asked.get() + 1);
        self.accepts
    }

    fn can_connect_to_output(&self, _output: SlotRef, _network: &LinkNetwork) -> bool {
        false
    }

    fn can_connect_to_reroute(&self, _reroute: RerouteId, _network: &LinkNetwork) -> bool {
        false
    }

    fn connect_to_input(&mut self, input: SlotRef, network: &mut LinkNetwork, events: &mut ConnectorEvents) {
        self.committed.set(self.committed.get() + 1);
        let id = network.connect(self.origin, input, None);
        if let Some(link) = network.link(id).copied() {
            events.dispatch(ConnectorEvent::LinkCreated { link });
        }
    }

    fn connect_to_output(&mut self, _output: SlotRef, _network: &mut LinkNetwork, _events: &mut ConnectorEvents) {}

    fn connect_to_reroute_input(
        &mut self,
        _reroute: RerouteId,
        _input: SlotRef,
        _network: &mut LinkNetwork,
        _events: &mut ConnectorEvents,
    ) {
    }

    fn connect_to_reroute_output(
        &mut self,
        _reroute: RerouteId,
        _output: SlotRef,
        _network: &mut LinkNetwork,
        _events: &mut ConnectorEvents,
    ) {
    }
}

// ============================================================================
// Candidate evaluation
// ============================================================================

#[test]
fn test_hover_stops_at_first_acceptance_but_drop_asks_everyone() {
    let mut connector = LinkConnector::new();
    let tracker = attach(&mut connector);
    let mut network = LinkNetwork::new();

    let (first, first_asked, first_committed) = CountingLink::new(1, false);
    let (second, second_asked, second_committed) = CountingLink::new(2, true);
    let (third, third_asked, third_committed) = CountingLink::new(3, false);
    connector
        .begin_drag(vec![Box::new(first), Box::new(second), Box::new(third)], Point::default())
        .unwrap();

    let target = SlotRef::input(9, 0);
    let locator = move |_: Point| Hover::Slot(target);
    assert!(connector.update_drag(Point::new(10.0, 10.0), &locator, &network).unwrap());
    assert_eq!((first_asked.get(), second_asked.get(), third_asked.get()), (1, 1, 0));

    let outcome = connector.commit_drag(&mut network).unwrap();
    assert_eq!(outcome.committed, 1);
    assert_eq!(outcome.target, Some(DropTarget::Input(target)));
    // Hover stops at the first acceptance, but a drop validates every
    // candidate on its own, so the third is asked for the first time here.
    assert_eq!(third_asked.get(), 1);
    assert_eq!(
        (first_committed.get(), second_committed.get(), third_committed.get()),
        (0, 1, 0)
    );

    assert_eq!(network.len(), 1);
    assert_eq!(network.link_into(target).map(|l| l.origin), Some(SlotRef::output(2, 0)));
    assert_eq!(
        tracker.kinds(),
        vec![EventKind::BeforeDrop, EventKind::LinkCreated, EventKind::AfterDrop, EventKind::Reset]
    );
}

#[test]
fn test_drop_on_rejected_target_is_a_quiet_no_op() {
    let mut connector = LinkConnector::new();
    let tracker = attach(&mut connector);
    let mut network = LinkNetwork::new();
    network.set_slot_type(SlotRef::output(1, 0), "IMAGE");
    network.set_slot_type(SlotRef::input(2, 0), "LATENT");

    connector
        .drag_new_from_slot(SlotRef::output(1, 0), validator(), Point::default())
        .unwrap();
    let locator = |_: Point| Hover::Slot(SlotRef::input(2, 0));
    assert!(!connector.update_drag(Point::default(), &locator, &network).unwrap());

    let outcome = connector.commit_drag(&mut network).unwrap();
    assert_eq!(outcome.committed, 0);
    assert!(network.is_empty());
    assert!(!connector.is_dragging());
    assert_eq!(
        tracker.kinds(),
        vec![EventKind::BeforeDrop, EventKind::AfterDrop, EventKind::Reset]
    );
}

// ============================================================================
// Cancel
// ============================================================================

#[test]
fn test_cancel_is_idempotent() {
    let mut connector = LinkConnector::new();
    let tracker = attach(&mut connector);
    let once = Rc::new(Cell::new(0));
    let o = once.clone();
    connector.listen_until_reset(EventKind::Reset, move |_| o.set(o.get() + 1));

    connector
        .drag_new_from_slot(SlotRef::output(1, 0), validator(), Point::default())
        .unwrap();
    assert!(connector.cancel_drag());
    assert!(!connector.cancel_drag());
    assert_eq!(tracker.count(EventKind::Reset), 1);
    assert_eq!(once.get(), 1);

    // The one-drag listener is gone; the permanent one keeps listening.
    connector
        .drag_new_from_slot(SlotRef::output(1, 0), validator(), Point::default())
        .unwrap();
    assert!(connector.cancel_drag());
    assert_eq!(once.get(), 1);
    assert_eq!(tracker.count(EventKind::Reset), 2);
    assert_eq!(tracker.count(EventKind::BeforeDrop), 0);
}

// ============================================================================
// Gestures
// ============================================================================

#[test]
fn test_canvas_drop_disconnects_moving_link() {
    let mut connector = LinkConnector::new();
    let tracker = attach(&mut connector);
    let mut network = LinkNetwork::new();
    network.connect(SlotRef::output(1, 0), SlotRef::input(2, 0), None);

    connector
        .move_input_link(&network, SlotRef::input(2, 0), validator(), Point::default())
        .unwrap();
    assert_eq!(connector.connecting_to(), Some(SlotKind::Input));
    assert!(!connector.update_drag(Point::new(500.0, 500.0), &|_: Point| Hover::Nothing, &network).unwrap());

    let outcome = connector.commit_drag(&mut network).unwrap();
    assert_eq!(outcome.target, None);
    assert!(network.is_empty());
    assert_eq!(
        tracker.kinds(),
        vec![
            EventKind::BeforeDrop,
            EventKind::DroppedOnCanvas,
            EventKind::LinkDisconnected,
            EventKind::AfterDrop,
            EventKind::Reset,
        ]
    );
}

#[test]
fn test_canvas_drop_of_new_link_changes_nothing() {
    let mut connector = LinkConnector::new();
    let tracker = attach(&mut connector);
    let mut network = LinkNetwork::new();

    connector
        .drag_new_from_slot(SlotRef::output(1, 0), validator(), Point::default())
        .unwrap();
    connector.commit_drag(&mut network).unwrap();

    assert!(network.is_empty());
    assert_eq!(tracker.count(EventKind::DroppedOnCanvas), 1);
    assert_eq!(tracker.count(EventKind::LinkDisconnected), 0);
}

#[test]
fn test_moving_all_output_links_to_another_output() {
    let mut connector = LinkConnector::new();
    let tracker = attach(&mut connector);
    let mut network = LinkNetwork::new();
    network.connect(SlotRef::output(1, 0), SlotRef::input(2, 0), None);
    network.connect(SlotRef::output(1, 0), SlotRef::input(3, 0), None);

    connector
        .move_output_links(&network, SlotRef::output(1, 0), validator(), Point::default())
        .unwrap();
    assert_eq!(connector.candidate_count(), 2);

    let locator = |_: Point| Hover::Slot(SlotRef::output(4, 0));
    assert!(connector.update_drag(Point::default(), &locator, &network).unwrap());
    let outcome = connector.commit_drag(&mut network).unwrap();

    assert_eq!(outcome.committed, 2);
    assert_eq!(network.links_from(SlotRef::output(4, 0)).count(), 2);
    assert_eq!(network.links_from(SlotRef::output(1, 0)).count(), 0);
    assert_eq!(tracker.count(EventKind::LinkMoved), 2);
}

#[test]
fn test_node_body_drop_picks_first_compatible_slot() {
    let mut connector = LinkConnector::new();
    let mut network = LinkNetwork::new();
    network.set_slot_type(SlotRef::output(1, 0), "FLOAT");
    network.set_slot_type(SlotRef::input(2, 0), "INT");
    network.set_slot_type(SlotRef::input(2, 1), "FLOAT");

    connector
        .drag_new_from_slot(SlotRef::output(1, 0), validator(), Point::default())
        .unwrap();
    let locator = |_: Point| Hover::Node {
        node: 2,
        inputs: 2,
        outputs: 0,
    };
    assert!(connector.update_drag(Point::default(), &locator, &network).unwrap());
    assert_eq!(connector.hover_target(), Some(&DropTarget::Input(SlotRef::input(2, 1))));

    connector.commit_drag(&mut network).unwrap();
    assert!(network.has_link(SlotRef::output(1, 0), SlotRef::input(2, 1)));
}

#[test]
fn test_drop_on_reroute_feeds_its_targets() {
    let mut connector = LinkConnector::new();
    let mut network = LinkNetwork::new();
    let reroute = network.add_reroute(None);
    let link = network.connect(SlotRef::output(1, 0), SlotRef::input(2, 0), None);
    assert!(network.route_through(link, reroute));

    connector
        .drag_new_from_slot(SlotRef::output(5, 0), validator(), Point::default())
        .unwrap();
    let locator = move |_: Point| Hover::Reroute(reroute);
    assert!(connector.update_drag(Point::default(), &locator, &network).unwrap());
    assert_eq!(
        connector.hover_target(),
        Some(&DropTarget::RerouteInput {
            reroute,
            inputs: vec![SlotRef::input(2, 0)],
        })
    );

    connector.commit_drag(&mut network).unwrap();
    let fed = network.link_into(SlotRef::input(2, 0)).copied().unwrap();
    assert_eq!(fed.origin, SlotRef::output(5, 0));
    assert_eq!(fed.reroute, Some(reroute));
    assert_eq!(network.len(), 1);
}
