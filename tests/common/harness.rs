//! Scene harness shared by the controller-level tests.
//!
//! Builds a small graph through the public API, mirroring what an editor
//! does when it loads a document:
//!
//! ```text
//!   group 1 (0,0 600x400)
//!   +---------------------------------------------+
//!   |  node 1 "source" (40,70)   node 2 "sink" (340,70)
//!   |  [    ] out0 (float)  -->  in0 (float) [    ]
//!   |         out1 (string)      in1 (int)
//!   +---------------------------------------------+
//! ```
//!
//! Both nodes are 200x120 bodies under a 30 unit title bar.

#![allow(dead_code)]

use super::{init_tracing, EventTracker};
use slint_node_layout::{
    LayoutController, NodeShape, Point, Rect, Size, SlotKind, SlotRef, SlotSpec,
};

pub const SOURCE: i32 = 1;
pub const SINK: i32 = 2;
pub const GROUP: i32 = 1;

pub struct SceneHarness {
    pub ctrl: LayoutController,
    pub tracker: EventTracker,
}

impl SceneHarness {
    pub fn new() -> Self {
        init_tracing();
        let ctrl = LayoutController::new();
        let tracker = EventTracker::new();
        tracker.attach(&ctrl);

        let harness = Self { ctrl, tracker };
        harness.add_node(
            SOURCE,
            Point::new(40.0, 70.0),
            vec![],
            vec![("value", "float"), ("label", "string")],
        );
        harness.add_node(
            SINK,
            Point::new(340.0, 70.0),
            vec![("a", "float"), ("b", "int")],
            vec![],
        );
        harness
            .ctrl
            .store()
            .borrow_mut()
            .create_group(GROUP, Rect::new(0.0, 0.0, 600.0, 400.0));
        harness
    }

    /// Add a 200x120 node and register its slot types with the network.
    pub fn add_node(&self, id: i32, position: Point, inputs: Vec<(&str, &str)>, outputs: Vec<(&str, &str)>) {
        let network = self.ctrl.network();
        let mut network = network.borrow_mut();
        for (index, (_, ty)) in inputs.iter().enumerate() {
            network.set_slot_type(SlotRef::input(id, index), *ty);
        }
        for (index, (_, ty)) in outputs.iter().enumerate() {
            network.set_slot_type(SlotRef::output(id, index), *ty);
        }
        let shape = NodeShape::new(
            inputs.into_iter().map(|(n, t)| SlotSpec::new(n, t)).collect(),
            outputs.into_iter().map(|(n, t)| SlotSpec::new(n, t)).collect(),
        );
        self.ctrl
            .store()
            .borrow_mut()
            .create_node(id, position, Size::new(200.0, 120.0), shape);
    }

    /// Current screen position of a slot.
    pub fn slot_screen(&self, node: i32, index: usize, kind: SlotKind) -> Point {
        let world = self
            .ctrl
            .slot_position(node, index, kind.is_input())
            .unwrap_or_else(|| panic!("slot {node}/{index} has no position"));
        self.ctrl.world_to_screen(world)
    }

    /// Drag a new link from `from` and release it at `to` (screen space).
    pub fn drag_new_link(&self, from: SlotRef, to: Point) -> bool {
        let start = self.slot_screen(from.node, from.index, from.kind);
        self.ctrl
            .begin_drag(slint_node_layout::DragOrigin::Slot(from), start)
            .expect("drag should start");
        let valid = self.ctrl.update_drag(to).expect("drag is active");
        self.ctrl.commit_drag().expect("drag is active");
        valid
    }
}
