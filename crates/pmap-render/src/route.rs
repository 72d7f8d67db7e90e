//! Connection routing: where a connection line starts and ends.
//!
//! Connections store no geometry. Their endpoints are derived from the
//! current (drag-aware) rectangles of the blocks they reference, so they
//! follow blocks for free. Lines run center to center, clipped to each
//! block's border.

use pmap_core::model::{Connection, ConnectionTarget, Rect};
use pmap_core::{BlockId, ElementStore, PositionOverlay};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub from: (f32, f32),
    pub to: (f32, f32),
}

impl Segment {
    pub fn length(&self) -> f32 {
        let (dx, dy) = (self.to.0 - self.from.0, self.to.1 - self.from.1);
        (dx * dx + dy * dy).sqrt()
    }

    /// Distance from `(px, py)` to the closest point on the segment.
    pub fn distance_to(&self, px: f32, py: f32) -> f32 {
        let (ax, ay) = self.from;
        let (bx, by) = self.to;
        let (dx, dy) = (bx - ax, by - ay);
        let len2 = dx * dx + dy * dy;
        let t = if len2 > 0.0 {
            (((px - ax) * dx + (py - ay) * dy) / len2).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let (cx, cy) = (ax + t * dx, ay + t * dy);
        ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
    }
}

/// Where the ray from `rect`'s center toward `toward` leaves the rectangle.
pub fn clip_to_border(rect: &Rect, toward: (f32, f32)) -> (f32, f32) {
    let (cx, cy) = rect.center();
    let (dx, dy) = (toward.0 - cx, toward.1 - cy);
    if dx == 0.0 && dy == 0.0 {
        return (cx, cy);
    }
    let hw = rect.width / 2.0;
    let hh = rect.height / 2.0;
    let tx = if dx != 0.0 { hw / dx.abs() } else { f32::INFINITY };
    let ty = if dy != 0.0 { hh / dy.abs() } else { f32::INFINITY };
    let t = tx.min(ty).min(1.0);
    (cx + dx * t, cy + dy * t)
}

/// Segment for `connection`, or `None` when it cannot be drawn (dangling
/// source or target, or no recorded target at all).
pub fn route<F>(connection: &Connection, rect_of: F) -> Option<Segment>
where
    F: Fn(BlockId) -> Option<Rect>,
{
    let from = rect_of(connection.from_block_id)?;
    match connection.target {
        ConnectionTarget::Block { to_block_id } => {
            let to = rect_of(to_block_id)?;
            Some(Segment {
                from: clip_to_border(&from, to.center()),
                to: clip_to_border(&to, from.center()),
            })
        }
        ConnectionTarget::Point { to_x, to_y } => Some(Segment {
            from: clip_to_border(&from, (to_x, to_y)),
            to: (to_x, to_y),
        }),
        ConnectionTarget::Unanchored {} => None,
    }
}

/// Route against a store, honouring drag positions.
pub fn route_in(
    store: &ElementStore,
    overlay: &PositionOverlay,
    connection: &Connection,
) -> Option<Segment> {
    route(connection, |id| store.current_rect(id, overlay))
}
