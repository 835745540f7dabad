//! High-level facade over the layout engine.
//!
//! [`LayoutController`] bundles the [`LayoutStore`], the committed
//! [`LinkNetwork`], the [`LinkConnector`] and the [`WidgetOverlaySync`]
//! behind one clonable handle, tracks the viewport, and hands out ready-made
//! Slint callbacks.
//!
//! Pointer coordinates passed to the controller are in **screen space** (as
//! reported by Slint); everything stored is in canvas space.
//!
//! # Example
//!
//! ```ignore
//! use slint_node_layout::{DragOrigin, LayoutController, SlotKind, SlotRef};
//!
//! slint::include_modules!();
//!
//! fn main() {
//!     let window = MainWindow::new().unwrap();
//!     let ctrl = LayoutController::new();
//!     let tracker = ctrl.tracker();
//!
//!     window.on_node_rect_changed(tracker.node_rect_callback());
//!     window.on_slot_position_changed(tracker.slot_position_callback());
//!     window.on_compute_link_path(ctrl.compute_link_path_callback());
//!     window.on_viewport_changed(ctrl.viewport_changed_callback());
//!     window.on_link_drag_moved(ctrl.drag_moved_callback());
//!     window.on_link_drag_ended(ctrl.drag_ended_callback());
//!     window.on_link_drag_cancelled(ctrl.drag_cancelled_callback());
//!
//!     window.on_slot_pressed({
//!         let ctrl = ctrl.clone();
//!         move |node, index, is_input, x, y| {
//!             let kind = SlotKind::from_is_input(is_input);
//!             let slot = SlotRef { node, index: index as usize, kind };
//!             let _ = ctrl.begin_drag(DragOrigin::Slot(slot), (x, y).into());
//!         }
//!     });
//!
//!     window.run().unwrap();
//! }
//! ```

use crate::config::LayoutConfig;
use crate::connector::{DropOutcome, DropTarget, LinkConnector};
use crate::error::ConnectorResult;
use crate::events::{ConnectorEvent, EventKind, ListenerId};
use crate::geometry::{Point, Rect, Viewport};
use crate::ids::{GroupId, LinkId, NodeId, RerouteId, SlotKind, SlotRef, WidgetId};
use crate::layout_store::LayoutStore;
use crate::network::{LinkNetwork, LinkRecord};
use crate::overlay::{OverlayWidget, PositionOverride, WidgetOverlaySync, WidgetState};
use crate::path::bezier_path;
use crate::render_link::{subgraph_input_slot, subgraph_output_slot};
use crate::tracking::LayoutTracker;
use crate::validation::{default_validator, ConnectionValidator};
use slint::{SharedString, VecModel};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::{debug, trace, warn};

/// What a link drag starts from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DragOrigin {
    /// A new link out of a slot (including subgraph boundary slots).
    Slot(SlotRef),
    /// A new link out of a reroute, looking for a slot of kind `to`.
    Reroute { reroute: RerouteId, to: SlotKind },
    /// Pick up the link feeding this input.
    InputLink(SlotRef),
    /// Pick up every link leaving this output.
    OutputLinks(SlotRef),
    /// Pick up one end of a specific link.
    LinkEnd { link: LinkId, end: SlotKind },
}

/// Clonable handle to the layout engine. Clones share state.
///
/// Event listeners run while the controller is borrowed and must not call
/// back into it.
#[derive(Clone)]
pub struct LayoutController {
    config: Rc<LayoutConfig>,
    store: Rc<RefCell<LayoutStore>>,
    network: Rc<RefCell<LinkNetwork>>,
    connector: Rc<RefCell<LinkConnector>>,
    overlays: Rc<RefCell<WidgetOverlaySync>>,
    validator: Rc<RefCell<Rc<dyn ConnectionValidator>>>,
    viewport: Rc<RefCell<Viewport>>,
    /// Network revision and graph switch count the store's link routes
    /// were last synced at.
    synced_links: Rc<Cell<Option<(u64, u64)>>>,
}

impl Default for LayoutController {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutController {
    pub fn new() -> Self {
        Self::with_config(LayoutConfig::default())
    }

    pub fn with_config(config: LayoutConfig) -> Self {
        let validator: Rc<dyn ConnectionValidator> = Rc::new(default_validator());
        Self {
            config: Rc::new(config),
            store: Rc::new(RefCell::new(LayoutStore::new(config))),
            network: Rc::new(RefCell::new(LinkNetwork::new())),
            connector: Rc::new(RefCell::new(LinkConnector::new())),
            overlays: Rc::new(RefCell::new(WidgetOverlaySync::new())),
            validator: Rc::new(RefCell::new(validator)),
            viewport: Rc::new(RefCell::new(Viewport::default())),
            synced_links: Rc::new(Cell::new(None)),
        }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn store(&self) -> Rc<RefCell<LayoutStore>> {
        self.store.clone()
    }

    pub fn network(&self) -> Rc<RefCell<LinkNetwork>> {
        self.network.clone()
    }

    pub fn overlays(&self) -> Rc<RefCell<WidgetOverlaySync>> {
        self.overlays.clone()
    }

    /// Tracker writing measured geometry into this controller's store.
    pub fn tracker(&self) -> LayoutTracker {
        LayoutTracker::with_store(self.store.clone(), self.viewport.clone())
    }

    /// Replace the validator used by drags started from now on.
    pub fn set_validator<V: ConnectionValidator + 'static>(&self, validator: V) {
        *self.validator.borrow_mut() = Rc::new(validator);
    }

    // === Viewport ===

    pub fn viewport(&self) -> Viewport {
        *self.viewport.borrow()
    }

    pub fn set_viewport(&self, zoom: f32, pan_x: f32, pan_y: f32) {
        *self.viewport.borrow_mut() = Viewport::new(zoom, Point::new(pan_x, pan_y));
    }

    pub fn screen_to_world(&self, screen: Point) -> Point {
        self.viewport.borrow().to_world(screen)
    }

    pub fn world_to_screen(&self, world: Point) -> Point {
        self.viewport.borrow().to_screen(world)
    }

    // === Queries ===

    /// Visible nodes intersecting a canvas-space rectangle, bottom to top.
    pub fn query_visible(&self, area: &Rect) -> Vec<NodeId> {
        self.store.borrow().query_nodes_in_bounds(area)
    }

    /// Visible nodes inside a window of the given screen size.
    pub fn query_visible_in_window(&self, width: f32, height: f32) -> Vec<NodeId> {
        let area = self.viewport.borrow().rect_to_world(Rect::new(0.0, 0.0, width, height));
        self.query_visible(&area)
    }

    pub fn slot_position(&self, node: NodeId, index: usize, is_input: bool) -> Option<Point> {
        let slot = SlotRef {
            node,
            index,
            kind: SlotKind::from_is_input(is_input),
        };
        self.store.borrow().slot_position(slot)
    }

    pub fn find_parent_group(&self, node: NodeId) -> Option<GroupId> {
        self.store.borrow().find_parent_group(node)
    }

    /// Remove a node, its layout and every link touching it.
    pub fn remove_node(&self, node: NodeId) -> Vec<LinkRecord> {
        self.store.borrow_mut().remove_node(node);
        let removed = {
            let mut network = self.network.borrow_mut();
            network.clear_node_types(node);
            network.remove_node_links(node)
        };
        self.sync_link_routes();
        removed
    }

    /// Hand the network's links to the store's segment index. Does nothing
    /// while neither the network nor the displayed graph changed since the
    /// last sync.
    pub fn sync_link_routes(&self) {
        let network = self.network.borrow();
        let mut store = self.store.borrow_mut();
        let stamp = (network.revision(), store.graph_switches());
        if self.synced_links.get() == Some(stamp) {
            return;
        }
        let stale: Vec<LinkId> = store
            .link_routes()
            .map(|route| route.id)
            .filter(|id| network.link(*id).is_none())
            .collect();
        for id in &stale {
            store.remove_link_route(*id);
        }
        for link in network.links() {
            store.set_link_route(*link);
        }
        self.synced_links.set(Some(stamp));
        trace!(links = network.len(), dropped = stale.len(), "link routes synced");
    }

    /// Link under a screen-space point.
    ///
    /// Runs in canvas space against the store's segment index; the hover
    /// distance is scaled by the zoom so it stays constant on screen.
    pub fn query_link_at_point(&self, screen: Point) -> Option<LinkId> {
        self.sync_link_routes();
        let viewport = self.viewport();
        let world = viewport.to_world(screen);
        let tolerance = self.config.link_hover_distance / viewport.safe_zoom();
        self.store.borrow().query_link_at_point(world, tolerance)
    }

    /// Screen-space path of a committed link, empty for unknown links.
    pub fn link_path(&self, link: LinkId) -> SharedString {
        self.sync_link_routes();
        let viewport = self.viewport();
        let segments = self.store.borrow().link_segments(link);
        let path = segments
            .into_iter()
            .map(|segment| (segment.start, segment.end))
            .map(|(start, end)| {
                bezier_path(
                    viewport.to_screen(start),
                    viewport.to_screen(end),
                    viewport.zoom,
                    self.config.bezier_min_offset,
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        path.into()
    }

    // === Link drag ===

    pub fn is_dragging(&self) -> bool {
        self.connector.borrow().is_dragging()
    }

    pub fn begin_drag(&self, origin: DragOrigin, pointer: Point) -> ConnectorResult<()> {
        let pointer = self.screen_to_world(pointer);
        let validator = self.validator.borrow().clone();
        let network = self.network.borrow();
        let mut connector = self.connector.borrow_mut();
        debug!(?origin, "begin link drag");
        match origin {
            DragOrigin::Slot(slot) => connector.drag_new_from_slot(slot, validator, pointer),
            DragOrigin::Reroute { reroute, to } => {
                connector.drag_from_reroute(&network, reroute, to, validator, pointer)
            }
            DragOrigin::InputLink(input) => connector.move_input_link(&network, input, validator, pointer),
            DragOrigin::OutputLinks(output) => connector.move_output_links(&network, output, validator, pointer),
            DragOrigin::LinkEnd { link, end } => connector.drag_link_end(&network, link, end, validator, pointer),
        }
    }

    /// Move the pointer. Returns whether the hovered target accepts the drop.
    pub fn update_drag(&self, pointer: Point) -> ConnectorResult<bool> {
        let pointer = self.screen_to_world(pointer);
        let store = self.store.borrow();
        let network = self.network.borrow();
        self.connector.borrow_mut().update_drag(pointer, &*store, &network)
    }

    pub fn commit_drag(&self) -> ConnectorResult<DropOutcome> {
        let outcome = {
            let mut network = self.network.borrow_mut();
            self.connector.borrow_mut().commit_drag(&mut network)
        };
        self.sync_link_routes();
        outcome
    }

    pub fn cancel_drag(&self) -> bool {
        self.connector.borrow_mut().cancel_drag()
    }

    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&ConnectorEvent) + 'static,
    {
        self.connector.borrow_mut().on(kind, callback)
    }

    pub fn listen_until_reset<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: FnMut(&ConnectorEvent) + 'static,
    {
        self.connector.borrow_mut().listen_until_reset(kind, callback)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.connector.borrow_mut().off(id)
    }

    /// Canvas position a drop target snaps to.
    fn target_position(store: &LayoutStore, target: &DropTarget) -> Option<Point> {
        match target {
            DropTarget::Input(slot) | DropTarget::Output(slot) => store.slot_position(*slot),
            DropTarget::SubgraphInput(index) => store.slot_position(subgraph_input_slot(*index)),
            DropTarget::SubgraphOutput(index) => store.slot_position(subgraph_output_slot(*index)),
            DropTarget::RerouteInput { reroute, .. } | DropTarget::RerouteOutput { reroute, .. } => {
                store.reroute_layout(*reroute).map(|r| r.position)
            }
        }
    }

    /// Screen-space preview paths, one per candidate. The free end snaps to
    /// the hovered target while it accepts the drop.
    pub fn drag_preview_paths(&self) -> Vec<SharedString> {
        let connector = self.connector.borrow();
        let Some(pointer) = connector.pointer() else {
            return Vec::new();
        };
        let store = self.store.borrow();
        let viewport = self.viewport();
        let free_end = connector
            .hover_target()
            .filter(|_| connector.is_hover_valid())
            .and_then(|target| Self::target_position(&store, target))
            .unwrap_or(pointer);

        connector
            .candidates()
            .filter_map(|candidate| {
                let fixed = candidate
                    .from_reroute()
                    .and_then(|r| store.reroute_layout(r))
                    .map(|r| r.position)
                    .or_else(|| store.slot_position(candidate.from_slot()))?;
                let (start, end) = match candidate.to_type() {
                    SlotKind::Input => (fixed, free_end),
                    SlotKind::Output => (free_end, fixed),
                };
                let path = bezier_path(
                    viewport.to_screen(start),
                    viewport.to_screen(end),
                    viewport.zoom,
                    self.config.bezier_min_offset,
                );
                Some(SharedString::from(path))
            })
            .collect()
    }

    // === Widget overlays ===

    pub fn register_widget(&self, widget: OverlayWidget) {
        self.overlays.borrow_mut().register_widget(widget);
    }

    pub fn unregister_widget(&self, id: WidgetId) -> Option<OverlayWidget> {
        self.overlays.borrow_mut().unregister_widget(id)
    }

    pub fn set_position_override(&self, id: WidgetId, position_override: PositionOverride) {
        self.overlays.borrow_mut().set_position_override(id, position_override);
    }

    pub fn clear_position_override(&self, id: WidgetId) -> bool {
        self.overlays.borrow_mut().clear_position_override(id)
    }

    pub fn widget_state(&self, id: WidgetId) -> Option<WidgetState> {
        self.overlays.borrow().widget_state(id)
    }

    /// Place all overlay widgets for this frame. Call once per render tick,
    /// after the frame's geometry edits.
    pub fn sync_frame(&self) -> usize {
        let store = self.store.borrow();
        self.overlays
            .borrow_mut()
            .sync_frame(&store, self.viewport(), &self.config.overlay)
    }

    pub fn bind_overlay_model<R, F>(&self, model: Rc<VecModel<R>>, constructor: F)
    where
        R: Clone + 'static,
        F: Fn(WidgetId, &WidgetState) -> R + 'static,
    {
        self.overlays.borrow_mut().bind_model(model, constructor);
    }

    // === Callback factories ===

    /// Callback for `compute-link-path(link-id) -> string`.
    pub fn compute_link_path_callback(&self) -> impl Fn(i32) -> SharedString {
        let ctrl = self.clone();
        move |link| ctrl.link_path(link)
    }

    /// Callback for `viewport-changed(zoom, pan-x, pan-y)`.
    pub fn viewport_changed_callback(&self) -> impl Fn(f32, f32, f32) {
        let ctrl = self.clone();
        move |zoom, pan_x, pan_y| ctrl.set_viewport(zoom, pan_x, pan_y)
    }

    /// Callback for `link-drag-moved(x, y) -> bool`, returning drop validity.
    pub fn drag_moved_callback(&self) -> impl Fn(f32, f32) -> bool {
        let ctrl = self.clone();
        move |x, y| match ctrl.update_drag(Point::new(x, y)) {
            Ok(valid) => valid,
            Err(err) => {
                warn!(%err, "pointer move outside of a link drag");
                false
            }
        }
    }

    /// Callback for `link-drag-ended()`.
    pub fn drag_ended_callback(&self) -> impl Fn() {
        let ctrl = self.clone();
        move || {
            if let Err(err) = ctrl.commit_drag() {
                warn!(%err, "link drop outside of a link drag");
            }
        }
    }

    /// Callback for `link-drag-cancelled()`.
    pub fn drag_cancelled_callback(&self) -> impl Fn() {
        let ctrl = self.clone();
        move || {
            ctrl.cancel_drag();
        }
    }

    /// Callback for `frame-tick()`.
    pub fn frame_callback(&self) -> impl Fn() {
        let ctrl = self.clone();
        move || {
            ctrl.sync_frame();
        }
    }
}
