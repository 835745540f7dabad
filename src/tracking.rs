//! Slint callbacks that feed measured geometry into a [`LayoutStore`].
//!
//! The UI reports node rectangles and slot centres in screen coordinates as
//! it lays elements out. [`LayoutTracker`] converts them to canvas
//! coordinates with the current [`Viewport`] and records them as
//! externally measured layout.
//!
//! # Example
//!
//! ```ignore
//! use slint_node_layout::LayoutController;
//!
//! let ctrl = LayoutController::new();
//! let tracker = ctrl.tracker();
//!
//! window.on_node_rect_changed(tracker.node_rect_callback());
//! window.on_slot_position_changed(tracker.slot_position_callback());
//! window.on_slot_removed(tracker.slot_removed_callback());
//! ```

use crate::geometry::{Point, Rect, Size, Viewport};
use crate::ids::{NodeId, SlotKind, SlotRef};
use crate::layout_store::{LayoutSource, LayoutStore};
use std::cell::RefCell;
use std::rc::Rc;

/// Ready-to-use Slint callbacks writing into a shared [`LayoutStore`].
#[derive(Clone)]
pub struct LayoutTracker {
    store: Rc<RefCell<LayoutStore>>,
    viewport: Rc<RefCell<Viewport>>,
}

impl Default for LayoutTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LayoutTracker {
    /// Tracker with its own empty store and an identity viewport.
    pub fn new() -> Self {
        Self::with_store(Rc::default(), Rc::default())
    }

    pub fn with_store(store: Rc<RefCell<LayoutStore>>, viewport: Rc<RefCell<Viewport>>) -> Self {
        Self { store, viewport }
    }

    pub fn store(&self) -> Rc<RefCell<LayoutStore>> {
        self.store.clone()
    }

    /// Record a node's full rectangle (title bar included), in screen space.
    ///
    /// Collapsed nodes only report their title bar, so only their position
    /// is taken over.
    pub fn handle_node_rect(&self, id: NodeId, x: f32, y: f32, width: f32, height: f32) -> bool {
        let rect = self.viewport.borrow().rect_to_world(Rect::new(x, y, width, height));
        let mut store = self.store.borrow_mut();
        let title = store.resolver().metrics().title_height;
        let position = Point::new(rect.x, rect.y + title);
        let Some(current) = store.node_layout(id).copied() else {
            return false;
        };
        let collapsed = store.node_shape(id).is_some_and(|s| s.collapsed);
        let size = if collapsed {
            current.size
        } else {
            Size::new(rect.width, (rect.height - title).max(0.0))
        };
        store.set_node_layout_from(id, position, size, LayoutSource::External)
    }

    /// Record a slot centre, in screen space. Negative indices are ignored.
    pub fn handle_slot_position(&self, node: NodeId, index: i32, is_input: bool, x: f32, y: f32) -> bool {
        let Ok(index) = usize::try_from(index) else {
            return false;
        };
        let position = self.viewport.borrow().to_world(Point::new(x, y));
        let slot = SlotRef {
            node,
            index,
            kind: SlotKind::from_is_input(is_input),
        };
        self.store.borrow_mut().update_slot_layout(slot, position)
    }

    pub fn handle_slot_removed(&self, node: NodeId, index: i32, is_input: bool) -> bool {
        let Ok(index) = usize::try_from(index) else {
            return false;
        };
        let slot = SlotRef {
            node,
            index,
            kind: SlotKind::from_is_input(is_input),
        };
        self.store.borrow_mut().delete_slot_layout(slot)
    }

    /// Callback for `node-rect-changed(id, x, y, width, height)`.
    pub fn node_rect_callback(&self) -> impl Fn(i32, f32, f32, f32, f32) + Clone {
        let tracker = self.clone();
        move |id, x, y, width, height| {
            tracker.handle_node_rect(id, x, y, width, height);
        }
    }

    /// Callback for `slot-position-changed(node, index, is-input, x, y)`.
    pub fn slot_position_callback(&self) -> impl Fn(i32, i32, bool, f32, f32) + Clone {
        let tracker = self.clone();
        move |node, index, is_input, x, y| {
            tracker.handle_slot_position(node, index, is_input, x, y);
        }
    }

    /// Callback for `slot-removed(node, index, is-input)`, fired when a slot
    /// element unmounts.
    pub fn slot_removed_callback(&self) -> impl Fn(i32, i32, bool) + Clone {
        let tracker = self.clone();
        move |node, index, is_input| {
            tracker.handle_slot_removed(node, index, is_input);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slots::{NodeShape, SlotSpec};

    fn tracker_with_node(viewport: Viewport) -> LayoutTracker {
        let tracker = LayoutTracker::with_store(Rc::default(), Rc::new(RefCell::new(viewport)));
        tracker.store().borrow_mut().create_node(
            1,
            Point::new(0.0, 30.0),
            Size::new(100.0, 50.0),
            NodeShape::new(vec![SlotSpec::new("a", "*")], vec![]),
        );
        tracker
    }

    #[test]
    fn test_node_rect_callback_converts_to_world() {
        let tracker = tracker_with_node(Viewport::new(2.0, Point::new(10.0, 10.0)));
        let callback = tracker.node_rect_callback();
        callback(1, 210.0, 110.0, 400.0, 260.0);

        let store = tracker.store();
        let store = store.borrow();
        let layout = store.node_layout(1).unwrap();
        assert_eq!(layout.position, Point::new(100.0, 80.0));
        assert_eq!(layout.size, Size::new(200.0, 100.0));
        assert_eq!(layout.source, LayoutSource::External);
    }

    #[test]
    fn test_node_rect_for_unknown_node_is_ignored() {
        let tracker = tracker_with_node(Viewport::default());
        assert!(!tracker.handle_node_rect(42, 0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_collapsed_node_keeps_size() {
        let tracker = tracker_with_node(Viewport::default());
        tracker.store().borrow_mut().set_collapsed(1, true);
        tracker.handle_node_rect(1, 50.0, 50.0, 80.0, 30.0);

        let store = tracker.store();
        let layout = *store.borrow().node_layout(1).unwrap();
        assert_eq!(layout.position, Point::new(50.0, 80.0));
        assert_eq!(layout.size, Size::new(100.0, 50.0));
    }

    #[test]
    fn test_slot_callbacks() {
        let tracker = tracker_with_node(Viewport::new(2.0, Point::default()));
        let report = tracker.slot_position_callback();
        let removed = tracker.slot_removed_callback();
        let slot = SlotRef::input(1, 0);

        report(1, 0, true, 20.0, 90.0);
        assert_eq!(tracker.store().borrow().slot_position(slot), Some(Point::new(10.0, 45.0)));

        removed(1, 0, true);
        assert!(tracker.store().borrow().slot_layout(slot).is_none());
        assert!(!tracker.handle_slot_position(1, -1, true, 0.0, 0.0));
    }
}
