//! Tunable constants for the layout engine.
//!
//! All structs are `#[non_exhaustive]`: start from `default()` and adjust the
//! public fields you care about.
//!
//! ```ignore
//! let mut config = LayoutConfig::default();
//! config.spatial.max_items_per_node = 16;
//! config.overlay.hide_below_zoom = Some(0.5);
//! ```

use crate::geometry::Rect;

/// Fixed metrics used by the slot layout math.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct SlotMetrics {
    /// Vertical distance between two default-flow slots.
    pub slot_height: f32,
    /// Height of the node title bar, which sits above the node position.
    pub title_height: f32,
    /// Width of a collapsed node, unless the node overrides it.
    pub collapsed_width: f32,
    /// Height of a widget row (used for widget-bound input slots).
    pub widget_row_height: f32,
}

impl Default for SlotMetrics {
    fn default() -> Self {
        Self {
            slot_height: 20.0,
            title_height: 30.0,
            collapsed_width: 80.0,
            widget_row_height: 20.0,
        }
    }
}

/// Quad-tree shape.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct SpatialConfig {
    /// Area covered by the root quadrant. Entries outside it are still
    /// indexed (at the root), only less efficiently.
    pub world_bounds: Rect,
    pub max_depth: usize,
    /// Entries a quadrant holds before it splits.
    pub max_items_per_node: usize,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            world_bounds: Rect::new(-10_000.0, -10_000.0, 20_000.0, 20_000.0),
            max_depth: 8,
            max_items_per_node: 8,
        }
    }
}

/// Widget overlay placement.
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct OverlayConfig {
    /// Horizontal margin between the node edge and the widget, in canvas units.
    pub margin: f32,
    /// Hide every overlay while zoomed out below this scale.
    pub hide_below_zoom: Option<f32>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            margin: 10.0,
            hide_below_zoom: None,
        }
    }
}

/// Top-level configuration for [`LayoutController`](crate::LayoutController).
#[derive(Debug, Clone, Copy, PartialEq)]
#[non_exhaustive]
pub struct LayoutConfig {
    pub slots: SlotMetrics,
    pub spatial: SpatialConfig,
    pub overlay: OverlayConfig,
    /// Tolerance around a slot centre when hit-testing, in canvas units.
    pub slot_hit_radius: f32,
    pub reroute_radius: f32,
    /// Maximum distance from a link curve that still counts as a hit.
    pub link_hover_distance: f32,
    pub link_hit_samples: usize,
    /// Minimum horizontal control point offset for link beziers.
    pub bezier_min_offset: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            slots: SlotMetrics::default(),
            spatial: SpatialConfig::default(),
            overlay: OverlayConfig::default(),
            slot_hit_radius: 10.0,
            reroute_radius: 10.0,
            link_hover_distance: 8.0,
            link_hit_samples: 20,
            bezier_min_offset: 50.0,
        }
    }
}
