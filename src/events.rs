//! Events emitted by the [`LinkConnector`](crate::LinkConnector).
//!
//! Listeners are plain closures registered per [`EventKind`]. Listeners
//! registered with [`ConnectorEvents::listen_until_reset`] are dropped right
//! after the next [`ConnectorEvent::Reset`] has been delivered, so a listener
//! attached for one drag never sees events from a later one.
//!
//! Listeners run synchronously inside the connector call that emitted the
//! event. They must not call back into the connector (or a
//! [`LayoutController`](crate::LayoutController) that owns it).

use crate::connector::DropTarget;
use crate::geometry::Point;
use crate::ids::SlotRef;
use crate::network::LinkRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    /// A drop is about to be processed.
    BeforeDrop {
        target: Option<DropTarget>,
        pointer: Point,
    },
    /// A drop has been processed; `committed` candidates were connected.
    AfterDrop {
        target: Option<DropTarget>,
        pointer: Point,
        committed: usize,
    },
    /// The drag ended over empty canvas.
    DroppedOnCanvas { pointer: Point },
    LinkCreated { link: LinkRecord },
    /// An existing link had one end moved; `previous` is the end it left.
    LinkMoved { link: LinkRecord, previous: SlotRef },
    LinkDisconnected { link: LinkRecord },
    /// The connector returned to idle.
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BeforeDrop,
    AfterDrop,
    DroppedOnCanvas,
    LinkCreated,
    LinkMoved,
    LinkDisconnected,
    Reset,
}

impl ConnectorEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            ConnectorEvent::BeforeDrop { .. } => EventKind::BeforeDrop,
            ConnectorEvent::AfterDrop { .. } => EventKind::AfterDrop,
            ConnectorEvent::DroppedOnCanvas { .. } => EventKind::DroppedOnCanvas,
            ConnectorEvent::LinkCreated { .. } => EventKind::LinkCreated,
            ConnectorEvent::LinkMoved { .. } => EventKind::LinkMoved,
            ConnectorEvent::LinkDisconnected { .. } => EventKind::LinkDisconnected,
            ConnectorEvent::Reset => EventKind::Reset,
        }
    }
}

/// Handle returned on subscription, used to unsubscribe.
pub type ListenerId = u64;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    until_reset: bool,
    callback: Box<dyn FnMut(&ConnectorEvent)>,
}

/// Subscriber list for connector events.
#[derive(Default)]
pub struct ConnectorEvents {
    listeners: Vec<Listener>,
    next_id: ListenerId,
}

impl ConnectorEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&ConnectorEvent) + 'static,
    {
        self.subscribe(kind, false, Box::new(callback))
    }

    /// Subscribe until the next `Reset` event has been delivered.
    pub fn listen_until_reset<F>(&mut self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&ConnectorEvent) + 'static,
    {
        self.subscribe(kind, true, Box::new(callback))
    }

    fn subscribe(
        &mut self,
        kind: EventKind,
        until_reset: bool,
        callback: Box<dyn FnMut(&ConnectorEvent)>,
    ) -> ListenerId {
        self.next_id += 1;
        let id = self.next_id;
        self.listeners.push(Listener {
            id,
            kind,
            until_reset,
            callback,
        });
        id
    }

    pub fn off(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Deliver `event` to every listener of its kind, in subscription order.
    pub fn dispatch(&mut self, event: ConnectorEvent) {
        let kind = event.kind();
        for listener in self.listeners.iter_mut().filter(|l| l.kind == kind) {
            (listener.callback)(&event);
        }
        if kind == EventKind::Reset {
            self.listeners.retain(|l| !l.until_reset);
        }
    }
}
