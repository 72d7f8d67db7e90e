//! Hit testing: canvas point → block or connection.
//!
//! Walks blocks from the top of the paint order down, so the block drawn
//! last wins. Rectangles come from the drag overlay first, so a block being
//! dragged is hit where it is drawn, not where it is stored.

use crate::route::route_in;
use pmap_core::model::Rect;
use pmap_core::{BlockId, ConnectionId, ElementStore, PositionOverlay};

/// Topmost block containing `(px, py)`, or `None` for empty canvas.
pub fn hit_test(store: &ElementStore, overlay: &PositionOverlay, px: f32, py: f32) -> Option<BlockId> {
    store
        .blocks()
        .iter()
        .rev()
        .find(|b| overlay.rect_of(b).contains(px, py))
        .map(|b| b.id)
}

/// Every block whose rectangle intersects `area`, in paint order.
/// Used for marquee selection.
pub fn hit_test_rect(store: &ElementStore, overlay: &PositionOverlay, area: &Rect) -> Vec<BlockId> {
    store
        .blocks()
        .iter()
        .filter(|b| overlay.rect_of(b).intersects(area))
        .map(|b| b.id)
        .collect()
}

/// Topmost connection whose line passes within `tolerance` of the point.
pub fn hit_test_connection(
    store: &ElementStore,
    overlay: &PositionOverlay,
    px: f32,
    py: f32,
    tolerance: f32,
) -> Option<ConnectionId> {
    store
        .connections()
        .iter()
        .rev()
        .find(|c| {
            route_in(store, overlay, c)
                .is_some_and(|seg| seg.distance_to(px, py) <= tolerance.max(c.stroke_width / 2.0))
        })
        .map(|c| c.id)
}
