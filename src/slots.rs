//! Canvas-space slot positions computed from node geometry.
//!
//! This is the fallback used whenever the rendering layer has not reported a
//! measured position for a slot. Resolution order for a slot:
//!
//! 1. Collapsed node: every input sits on the left end of the title bar and
//!    every output on the right end (at the collapsed width).
//! 2. Explicit offset: `node position + offset`, nothing else considered.
//! 3. Default flow: fixed row spacing below `slot_start_y`, counting only the
//!    slots that take part in the flow. On nodes that have widgets, inputs
//!    bound to a widget sit on that widget's row instead, or on the row below
//!    the last widget when the name matches none of them.
//!
//! Node positions refer to the top-left of the node body; the title bar sits
//! above it, `title_height` tall.

use crate::config::SlotMetrics;
use crate::geometry::{Point, Size};
use crate::ids::SlotKind;

/// Static description of one slot.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SlotSpec {
    pub name: String,
    /// Type signature used for connection validation (`*` accepts anything).
    pub type_name: String,
    /// Position relative to the node origin. Wins over the default flow.
    pub offset: Option<Point>,
    /// Name of the node widget this input is bound to.
    pub widget: Option<String>,
}

impl SlotSpec {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            offset: None,
            widget: None,
        }
    }

    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_widget(mut self, widget: impl Into<String>) -> Self {
        self.widget = Some(widget.into());
        self
    }
}

/// Per-node inputs to the slot layout.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeShape {
    pub collapsed: bool,
    /// Overrides [`SlotMetrics::collapsed_width`] for this node.
    pub collapsed_width: Option<f32>,
    /// Vertical offset of the first default-flow row.
    pub slot_start_y: f32,
    pub inputs: Vec<SlotSpec>,
    pub outputs: Vec<SlotSpec>,
    /// Widget names in display order.
    pub widgets: Vec<String>,
}

impl NodeShape {
    pub fn new(inputs: Vec<SlotSpec>, outputs: Vec<SlotSpec>) -> Self {
        Self {
            inputs,
            outputs,
            ..Self::default()
        }
    }

    pub fn slots(&self, kind: SlotKind) -> &[SlotSpec] {
        match kind {
            SlotKind::Input => &self.inputs,
            SlotKind::Output => &self.outputs,
        }
    }

    fn widget_row(&self, slot: &SlotSpec) -> Option<usize> {
        let widget = slot.widget.as_ref().filter(|_| !self.widgets.is_empty())?;
        let row = self.widgets.iter().position(|w| w == widget);
        Some(row.unwrap_or(self.widgets.len()))
    }

    fn in_default_flow(&self, slot: &SlotSpec, kind: SlotKind) -> bool {
        slot.offset.is_none() && (kind == SlotKind::Output || self.widget_row(slot).is_none())
    }

    fn flow_count(&self, kind: SlotKind) -> usize {
        self.slots(kind)
            .iter()
            .filter(|s| self.in_default_flow(s, kind))
            .count()
    }
}

/// A node's geometry as seen by the resolver.
#[derive(Debug, Clone, Copy)]
pub struct NodeFrame<'a> {
    pub position: Point,
    pub size: Size,
    pub shape: &'a NodeShape,
}

/// Computes slot centres from node geometry.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotPositionResolver {
    metrics: SlotMetrics,
}

impl SlotPositionResolver {
    pub fn new(metrics: SlotMetrics) -> Self {
        Self { metrics }
    }

    pub fn metrics(&self) -> &SlotMetrics {
        &self.metrics
    }

    /// Centre of slot `index` of the given kind, or `None` if the node has no
    /// such slot.
    pub fn slot_position(&self, node: NodeFrame<'_>, index: usize, kind: SlotKind) -> Option<Point> {
        match kind {
            SlotKind::Input => self.input_position(node, index),
            SlotKind::Output => self.output_position(node, index),
        }
    }

    pub fn input_position(&self, node: NodeFrame<'_>, index: usize) -> Option<Point> {
        let shape = node.shape;
        let slot = shape.inputs.get(index)?;
        let pos = node.position;
        let m = &self.metrics;

        if shape.collapsed {
            return Some(Point::new(pos.x, pos.y - m.title_height * 0.5));
        }
        if let Some(offset) = slot.offset {
            return Some(pos + offset);
        }
        if let Some(row) = shape.widget_row(slot) {
            let rows = shape.flow_count(SlotKind::Input).max(shape.flow_count(SlotKind::Output));
            let y = pos.y
                + shape.slot_start_y
                + rows as f32 * m.slot_height
                + row as f32 * m.widget_row_height
                + m.widget_row_height * 0.5;
            return Some(Point::new(pos.x + m.slot_height * 0.5, y));
        }

        let ordinal = self.ordinal(shape, index, SlotKind::Input);
        Some(Point::new(pos.x + m.slot_height * 0.5, self.row_y(node, ordinal)))
    }

    pub fn output_position(&self, node: NodeFrame<'_>, index: usize) -> Option<Point> {
        let shape = node.shape;
        let slot = shape.outputs.get(index)?;
        let pos = node.position;
        let m = &self.metrics;

        if shape.collapsed {
            let width = shape.collapsed_width.unwrap_or(m.collapsed_width);
            return Some(Point::new(pos.x + width, pos.y - m.title_height * 0.5));
        }
        if let Some(offset) = slot.offset {
            return Some(pos + offset);
        }

        let ordinal = self.ordinal(shape, index, SlotKind::Output);
        Some(Point::new(
            pos.x + node.size.width - m.slot_height * 0.5,
            self.row_y(node, ordinal),
        ))
    }

    /// Position of `index` among the slots of `kind` that use the default flow.
    fn ordinal(&self, shape: &NodeShape, index: usize, kind: SlotKind) -> usize {
        shape.slots(kind)[..index]
            .iter()
            .filter(|s| shape.in_default_flow(s, kind))
            .count()
    }

    fn row_y(&self, node: NodeFrame<'_>, ordinal: usize) -> f32 {
        node.position.y + (ordinal as f32 + 0.7) * self.metrics.slot_height + node.shape.slot_start_y
    }
}
