//! Common test utilities for integration tests.

#![allow(dead_code)]

pub mod harness;

use slint_node_layout::{ConnectorEvent, EventKind, LayoutController, ListenerId};
use std::cell::RefCell;
use std::rc::Rc;

/// Install a fmt subscriber writing through the test harness, once per
/// process. Set `RUST_LOG`-style filtering with `--nocapture` to see output.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Records connector events for assertions.
#[derive(Default, Clone)]
pub struct EventTracker {
    pub events: Rc<RefCell<Vec<ConnectorEvent>>>,
}

impl EventTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to every event kind on `ctrl`.
    pub fn attach(&self, ctrl: &LayoutController) -> Vec<ListenerId> {
        ALL_KINDS
            .iter()
            .map(|kind| {
                let events = self.events.clone();
                ctrl.on(*kind, move |e| events.borrow_mut().push(e.clone()))
            })
            .collect()
    }

    pub fn kinds(&self) -> Vec<EventKind> {
        self.events.borrow().iter().map(|e| e.kind()).collect()
    }

    pub fn count(&self, kind: EventKind) -> usize {
        self.events.borrow().iter().filter(|e| e.kind() == kind).count()
    }

    /// Clear all recorded events.
    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }
}

pub const ALL_KINDS: [EventKind; 7] = [
    EventKind::BeforeDrop,
    EventKind::AfterDrop,
    EventKind::DroppedOnCanvas,
    EventKind::LinkCreated,
    EventKind::LinkMoved,
    EventKind::LinkDisconnected,
    EventKind::Reset,
];
