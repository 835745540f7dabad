//! # Slint Node Layout
//!
//! Layout and spatial synchronisation engine for Slint node-graph editors.
//! It answers the geometric questions an editor asks every frame: which
//! nodes are visible, where a slot is, which group owns a node, what lies
//! under the pointer during a link drag, and where externally rendered
//! widgets must be drawn.
//!
//! ## Components
//!
//! - [`SpatialIndex`] - quad-tree over axis-aligned rectangles
//! - [`SlotPositionResolver`] - slot anchor points from node geometry
//! - [`find_parent_group`] - innermost group containing a node
//! - [`LinkConnector`] - link drag state machine with typed drop targets
//! - [`LayoutStore`] - geometry source of truth, owning the indexes
//! - [`WidgetOverlaySync`] - per-frame placement of overlay widgets
//!
//! [`LayoutController`] wraps all of them behind one clonable handle with
//! ready-made Slint callbacks, and [`LayoutTracker`] feeds measured layout
//! from the UI back into the store.
//!
//! ## Quick Start
//!
//! ```ignore
//! use slint_node_layout::{LayoutController, NodeShape, Point, Rect, Size, SlotSpec};
//!
//! let ctrl = LayoutController::new();
//! ctrl.store().borrow_mut().create_node(
//!     1,
//!     Point::new(0.0, 30.0),
//!     Size::new(200.0, 100.0),
//!     NodeShape::new(vec![SlotSpec::new("in", "float")], vec![]),
//! );
//!
//! let visible = ctrl.query_visible(&Rect::new(0.0, 0.0, 800.0, 600.0));
//! let anchor = ctrl.slot_position(1, 0, true);
//! ```
//!
//! Everything runs on the UI thread. Geometry edits made during a frame are
//! visible to every read later in that frame.

pub mod config;
pub mod connector;
pub mod controller;
pub mod error;
pub mod events;
pub mod geometry;
pub mod groups;
pub mod ids;
pub mod layout_store;
pub mod network;
pub mod overlay;
pub mod path;
pub mod render_link;
pub mod slots;
pub mod spatial;
pub mod tracking;
pub mod validation;

pub use config::{LayoutConfig, OverlayConfig, SlotMetrics, SpatialConfig};
pub use connector::{DropOutcome, DropTarget, DropTargetLocator, Hover, LinkConnector};
pub use controller::{DragOrigin, LayoutController};
pub use error::{ConnectorError, ConnectorResult};
pub use events::{ConnectorEvent, ConnectorEvents, EventKind, ListenerId};
pub use geometry::{Point, Rect, Size, Viewport};
pub use groups::{
    find_parent_group, group_contents, innermost_containing, GroupContents, GroupGeometry,
    SimpleGroupGeometry,
};
pub use hit_test::{find_link_at, find_slot_at, LinkGeometry, SimpleLinkGeometry};
pub use ids::{
    GraphId, GroupId, LinkId, NodeId, NodeRef, RerouteId, SlotKind, SlotRef, WidgetId,
    ROOT_GRAPH_ID, SUBGRAPH_INPUT_ID, SUBGRAPH_OUTPUT_ID,
};
pub use layout_store::{
    ChangeListenerId, ItemsInBounds, LayoutChange, LayoutSource, LayoutStore, LinkSegmentLayout,
    NodeLayout, RerouteLayout, SegmentKey, SlotLayout,
};
pub use network::{LinkNetwork, LinkRecord, Reroute};
pub use overlay::{
    GraceWindow, OverlayWidget, PositionOverride, WidgetOverlaySync, WidgetPlacement, WidgetState,
};
pub use path::{bezier_path, distance_to_bezier, CubicBezier};
pub use render_link::{
    subgraph_input_slot, subgraph_output_slot, MovingLinkDrag, NewLinkDrag, RenderLink,
};
pub use slots::{NodeFrame, NodeShape, SlotPositionResolver, SlotSpec};
pub use spatial::{SpatialIndex, SpatialMetrics};
pub use tracking::LayoutTracker;
pub use validation::{
    default_validator, types_compatible, validate_link, CompositeValidator, ConnectionValidator,
    DirectionValidator, NoDuplicatesValidator, TypeCompatibilityValidator, ValidationError,
    ValidationResult,
};
