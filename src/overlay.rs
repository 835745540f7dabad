//! Placement of externally rendered widgets over the canvas.
//!
//! Widgets live in a separate layer (Slint elements on top of the canvas)
//! and are positioned once per frame by [`WidgetOverlaySync::sync_frame`].
//! Each widget belongs to a node. A *position override* can redirect it to
//! another node, typically the subgraph node that shows a widget promoted
//! out of the subgraph. The override wins whenever its node is in the
//! displayed graph.
//!
//! # Grace frame
//!
//! Setting an override and switching graphs usually happen in the same tick,
//! before the renderer has caught up. A widget that would be hidden while
//! its override is inactive stays where it was for one more frame. The
//! window is tracked per widget as a [`GraceWindow`]:
//!
//! ```text
//! Idle --set override / override active--> Armed --inactive, hidden frame--> Spent
//!  ^                                                                          |
//!  +-------------------------------clear override-----------------------------+
//! ```
//!
//! A spent window is armed again only when the override is set again or
//! becomes active.

use crate::config::OverlayConfig;
use crate::geometry::{Point, Size, Viewport};
use crate::ids::{NodeRef, WidgetId};
use crate::layout_store::LayoutStore;
use slint::{Model, VecModel};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use tracing::{debug, trace};

/// Where a widget sits inside its node, in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WidgetPlacement {
    /// Top-left of the widget relative to the node position.
    pub offset: Point,
    pub height: f32,
}

impl WidgetPlacement {
    pub fn new(offset: Point, height: f32) -> Self {
        Self { offset, height }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OverlayWidget {
    pub id: WidgetId,
    pub node: NodeRef,
    pub placement: WidgetPlacement,
    /// The widget's own visibility flag (e.g. hidden by the node's UI).
    pub visible: bool,
}

impl OverlayWidget {
    pub fn new(id: WidgetId, node: NodeRef, placement: WidgetPlacement) -> Self {
        Self {
            id,
            node,
            placement,
            visible: true,
        }
    }
}

/// Render a widget at another node's widget slot instead of its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOverride {
    pub node: NodeRef,
    /// Placement of the stand-in widget on `node`.
    pub placement: WidgetPlacement,
}

/// Per-widget output of a frame, in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WidgetState {
    pub visible: bool,
    pub position: Point,
    pub size: Size,
}

/// One-frame visibility extension, see the module docs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraceWindow {
    #[default]
    Idle,
    Armed,
    Spent,
}

struct Entry {
    widget: OverlayWidget,
    state: WidgetState,
    grace: GraceWindow,
}

trait ModelSyncer {
    fn sync(&self, rows: &mut dyn Iterator<Item = (WidgetId, WidgetState)>);
}

struct ConcreteModelSyncer<R, F> {
    model: Rc<VecModel<R>>,
    constructor: F,
}

impl<R, F> ModelSyncer for ConcreteModelSyncer<R, F>
where
    R: Clone + 'static,
    F: Fn(WidgetId, &WidgetState) -> R,
{
    fn sync(&self, rows: &mut dyn Iterator<Item = (WidgetId, WidgetState)>) {
        let mut count = 0;
        for (i, (id, state)) in rows.enumerate() {
            let item = (self.constructor)(id, &state);
            if i < self.model.row_count() {
                self.model.set_row_data(i, item);
            } else {
                self.model.push(item);
            }
            count = i + 1;
        }
        while self.model.row_count() > count {
            self.model.remove(self.model.row_count() - 1);
        }
    }
}

/// Registry of overlay widgets and their per-frame placement.
#[derive(Default)]
pub struct WidgetOverlaySync {
    widgets: BTreeMap<WidgetId, Entry>,
    overrides: HashMap<WidgetId, PositionOverride>,
    frames: u64,
    syncer: Option<Box<dyn ModelSyncer>>,
}

impl WidgetOverlaySync {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a widget, replacing any previous registration under its id.
    ///
    /// The new registration starts hidden with an idle grace window. An
    /// override already set for the id is kept.
    pub fn register_widget(&mut self, widget: OverlayWidget) {
        debug!(widget = widget.id, node = widget.node.node, graph = widget.node.graph, "registering overlay widget");
        let grace = if self.overrides.contains_key(&widget.id) {
            GraceWindow::Armed
        } else {
            GraceWindow::Idle
        };
        self.widgets.insert(
            widget.id,
            Entry {
                widget,
                state: WidgetState::default(),
                grace,
            },
        );
    }

    /// Remove a widget together with its position override.
    pub fn unregister_widget(&mut self, id: WidgetId) -> Option<OverlayWidget> {
        self.overrides.remove(&id);
        let entry = self.widgets.remove(&id)?;
        debug!(widget = id, "unregistered overlay widget");
        Some(entry.widget)
    }

    pub fn is_registered(&self, id: WidgetId) -> bool {
        self.widgets.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }

    pub fn widget(&self, id: WidgetId) -> Option<&OverlayWidget> {
        self.widgets.get(&id).map(|e| &e.widget)
    }

    pub fn set_widget_visible(&mut self, id: WidgetId, visible: bool) -> bool {
        match self.widgets.get_mut(&id) {
            Some(entry) => {
                entry.widget.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_widget_placement(&mut self, id: WidgetId, placement: WidgetPlacement) -> bool {
        match self.widgets.get_mut(&id) {
            Some(entry) => {
                entry.widget.placement = placement;
                true
            }
            None => false,
        }
    }

    /// Redirect a widget. Overrides may be set before the widget registers;
    /// any still unregistered at the next frame are pruned.
    pub fn set_position_override(&mut self, id: WidgetId, position_override: PositionOverride) {
        self.overrides.insert(id, position_override);
        if let Some(entry) = self.widgets.get_mut(&id) {
            entry.grace = GraceWindow::Armed;
        }
    }

    pub fn clear_position_override(&mut self, id: WidgetId) -> bool {
        if let Some(entry) = self.widgets.get_mut(&id) {
            entry.grace = GraceWindow::Idle;
        }
        self.overrides.remove(&id).is_some()
    }

    pub fn position_override(&self, id: WidgetId) -> Option<&PositionOverride> {
        self.overrides.get(&id)
    }

    pub fn widget_state(&self, id: WidgetId) -> Option<WidgetState> {
        self.widgets.get(&id).map(|e| e.state)
    }

    /// Direct access to a widget's last placement, e.g. to seed it from a
    /// renderer that already laid the widget out.
    pub fn widget_state_mut(&mut self, id: WidgetId) -> Option<&mut WidgetState> {
        self.widgets.get_mut(&id).map(|e| &mut e.state)
    }

    pub fn grace(&self, id: WidgetId) -> Option<GraceWindow> {
        self.widgets.get(&id).map(|e| e.grace)
    }

    /// Frames synced so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    /// Drop overrides whose widget id is not registered.
    pub fn prune_orphans(&mut self) -> usize {
        let widgets = &self.widgets;
        let before = self.overrides.len();
        self.overrides.retain(|id, _| widgets.contains_key(id));
        let pruned = before - self.overrides.len();
        if pruned > 0 {
            debug!(pruned, "pruned orphaned position overrides");
        }
        pruned
    }

    /// Place every widget for the current frame. Returns the number of
    /// visible widgets.
    pub fn sync_frame(&mut self, store: &LayoutStore, viewport: Viewport, config: &OverlayConfig) -> usize {
        self.prune_orphans();
        self.frames += 1;

        let zoom_hidden = config.hide_below_zoom.is_some_and(|min| viewport.zoom < min);
        let mut visible = 0;
        let mut graced = 0;

        for (id, entry) in self.widgets.iter_mut() {
            let position_override = self.overrides.get(id);
            let active = position_override.filter(|o| store.is_displayed(o.node));
            if active.is_some() {
                entry.grace = GraceWindow::Armed;
            }

            let target = match active {
                Some(o) => Some((o.node, o.placement)),
                None if store.is_displayed(entry.widget.node) => Some((entry.widget.node, entry.widget.placement)),
                None => None,
            };

            match target {
                Some((node, placement)) => {
                    if let Some(state) = place(store, node, placement, viewport, config) {
                        entry.state = WidgetState {
                            visible: state.visible && entry.widget.visible && !zoom_hidden,
                            ..state
                        };
                    } else {
                        entry.state.visible = false;
                    }
                }
                None if position_override.is_some() && entry.grace == GraceWindow::Armed => {
                    // Keep the last placement for this frame only.
                    entry.grace = GraceWindow::Spent;
                    entry.state.visible &= entry.widget.visible && !zoom_hidden;
                    graced += 1;
                }
                None => entry.state.visible = false,
            }

            if entry.state.visible {
                visible += 1;
            }
        }

        trace!(frame = self.frames, widgets = self.widgets.len(), visible, graced, "overlay frame synced");

        if let Some(syncer) = &self.syncer {
            let mut rows = self.widgets.iter().map(|(id, e)| (*id, e.state));
            syncer.sync(&mut rows);
        }
        visible
    }

    /// Mirror widget states into a Slint model after every frame, one row
    /// per widget in id order.
    pub fn bind_model<R, F>(&mut self, model: Rc<VecModel<R>>, constructor: F)
    where
        R: Clone + 'static,
        F: Fn(WidgetId, &WidgetState) -> R + 'static,
    {
        self.syncer = Some(Box::new(ConcreteModelSyncer { model, constructor }));
    }
}

/// Screen placement of a widget on `node`. `None` if the node has no layout.
fn place(
    store: &LayoutStore,
    node: NodeRef,
    placement: WidgetPlacement,
    viewport: Viewport,
    config: &OverlayConfig,
) -> Option<WidgetState> {
    let layout = store.node_layout(node.node)?;
    let collapsed = store.node_shape(node.node).is_some_and(|s| s.collapsed);
    let zoom = viewport.zoom;
    Some(WidgetState {
        visible: layout.visible && !collapsed,
        position: viewport.to_screen(layout.position + placement.offset),
        size: Size::new(
            (layout.size.width - 2.0 * config.margin).max(0.0) * zoom,
            placement.height * zoom,
        ),
    })
}
