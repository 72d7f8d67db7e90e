//! Screen ↔ canvas transforms and viewport culling.
//!
//! A canvas point maps to the screen as `screen = canvas * zoom + offset`.
//! Culling tests run against the visible canvas rectangle grown by a fixed
//! buffer, so elements just off-screen are already present when panning.
//! Every function here is total: a dangling reference reads as "not visible".

use crate::id::BlockId;
use crate::model::{Connection, ConnectionTarget, Rect};
use serde::{Deserialize, Serialize};

/// Behavioural constants for the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasConfig {
    /// Canvas units added on every side of the visible rectangle before culling.
    pub cull_buffer: f32,
    pub min_zoom: f32,
    pub max_zoom: f32,
    /// Multiplicative step for zoom-in / zoom-out.
    pub zoom_step: f32,
    /// Margin around the multi-selection bounding box.
    pub selection_padding: f32,
    /// Logical extent of the content layer, anchored at the origin.
    pub content_extent: f32,
    /// Margin kept around content by zoom-to-fit, in screen pixels.
    pub fit_padding: f32,
    /// Snap drag commits and new blocks to the page grid.
    pub snap_to_grid: bool,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            cull_buffer: 200.0,
            min_zoom: 0.1,
            max_zoom: 3.0,
            zoom_step: 1.1,
            selection_padding: 8.0,
            content_extent: 100_000.0,
            fit_padding: 50.0,
            snap_to_grid: false,
        }
    }
}

/// Offset + zoom window into the infinite canvas, plus the on-screen size
/// of the host element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub zoom: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            width: 800.0,
            height: 600.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    pub fn screen_to_canvas(&self, sx: f32, sy: f32) -> (f32, f32) {
        ((sx - self.x) / self.zoom, (sy - self.y) / self.zoom)
    }

    pub fn canvas_to_screen(&self, cx: f32, cy: f32) -> (f32, f32) {
        (cx * self.zoom + self.x, cy * self.zoom + self.y)
    }

    /// The canvas-space rectangle currently on screen.
    pub fn visible_rect(&self) -> Rect {
        let (x, y) = self.screen_to_canvas(0.0, 0.0);
        Rect::new(x, y, self.width / self.zoom, self.height / self.zoom)
    }

    /// Visible rectangle grown by `buffer` canvas units on every side.
    pub fn buffered_rect(&self, buffer: f32) -> Rect {
        self.visible_rect().padded(buffer)
    }

    /// Move the offset by a screen-space delta. Zoom is untouched.
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.x += dx;
        self.y += dy;
    }

    /// Set zoom, clamped to the configured range. Returns the applied zoom.
    pub fn set_zoom(&mut self, zoom: f32, config: &CanvasConfig) -> f32 {
        self.zoom = clamp_zoom(zoom, config);
        self.zoom
    }

    /// Multiply zoom by `factor`, keeping the canvas point under the screen
    /// point `(sx, sy)` fixed.
    pub fn zoom_at(&mut self, sx: f32, sy: f32, factor: f32, config: &CanvasConfig) {
        let (cx, cy) = self.screen_to_canvas(sx, sy);
        let zoom = clamp_zoom(self.zoom * factor, config);
        self.zoom = zoom;
        self.x = sx - cx * zoom;
        self.y = sy - cy * zoom;
    }

    /// Zoom about the screen center.
    pub fn zoom_by(&mut self, factor: f32, config: &CanvasConfig) {
        let (sx, sy) = (self.width / 2.0, self.height / 2.0);
        self.zoom_at(sx, sy, factor, config);
    }

    /// Back to the origin at zoom 1.
    pub fn reset(&mut self) {
        self.x = 0.0;
        self.y = 0.0;
        self.zoom = 1.0;
    }

    /// Frame `bounds` in the middle of the screen with `config.fit_padding`.
    /// Empty or degenerate bounds fall back to `reset`.
    pub fn fit_to(&mut self, bounds: Option<Rect>, config: &CanvasConfig) {
        let Some(b) = bounds.filter(|b| b.is_valid() && b.width > 0.0 && b.height > 0.0) else {
            self.reset();
            return;
        };
        let avail_w = (self.width - config.fit_padding * 2.0).max(1.0);
        let avail_h = (self.height - config.fit_padding * 2.0).max(1.0);
        let zoom = clamp_zoom((avail_w / b.width).min(avail_h / b.height), config);
        let (cx, cy) = b.center();
        self.zoom = zoom;
        self.x = self.width / 2.0 - cx * zoom;
        self.y = self.height / 2.0 - cy * zoom;
    }
}

fn clamp_zoom(zoom: f32, config: &CanvasConfig) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(config.min_zoom, config.max_zoom)
    } else {
        1.0_f32.clamp(config.min_zoom, config.max_zoom)
    }
}

/// True when `bounds` overlaps the buffered visible rectangle.
pub fn is_element_in_viewport(bounds: &Rect, viewport: &Viewport, buffer: f32) -> bool {
    bounds.intersects(&viewport.buffered_rect(buffer))
}

/// Culling test for a connection.
///
/// `rect_of` resolves a block id to its current rectangle (drag-aware when
/// the caller wants it to be). An unresolved source, or a source outside
/// the viewport, is never visible. A block target is visible when either
/// endpoint is, and invisible when it no longer resolves. A free point
/// target is visible when the point is inside the buffered rectangle. An
/// unanchored connection is kept.
pub fn is_connection_in_viewport<F>(
    connection: &Connection,
    rect_of: F,
    viewport: &Viewport,
    buffer: f32,
) -> bool
where
    F: Fn(BlockId) -> Option<Rect>,
{
    let Some(from) = rect_of(connection.from_block_id) else {
        return false;
    };
    if !is_element_in_viewport(&from, viewport, buffer) {
        return false;
    }
    match connection.target {
        // The source endpoint is visible, so a resolvable target suffices
        ConnectionTarget::Block { to_block_id } => rect_of(to_block_id).is_some(),
        ConnectionTarget::Point { to_x, to_y } => {
            viewport.buffered_rect(buffer).contains(to_x, to_y)
        }
        ConnectionTarget::Unanchored {} => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::PageId;

    fn vp() -> Viewport {
        Viewport {
            x: 0.0,
            y: 0.0,
            zoom: 1.0,
            width: 800.0,
            height: 600.0,
        }
    }

    #[test]
    fn screen_canvas_roundtrip() {
        let v = Viewport {
            x: -120.0,
            y: 40.0,
            zoom: 2.0,
            width: 800.0,
            height: 600.0,
        };
        let (cx, cy) = v.screen_to_canvas(100.0, 100.0);
        assert_eq!((cx, cy), (110.0, 30.0));
        assert_eq!(v.canvas_to_screen(cx, cy), (100.0, 100.0));
    }

    #[test]
    fn buffer_catches_near_misses() {
        let v = vp();
        let just_outside = Rect::new(850.0, 0.0, 10.0, 10.0);
        let far_outside = Rect::new(1001.0, 0.0, 10.0, 10.0);
        assert!(is_element_in_viewport(&just_outside, &v, 200.0));
        assert!(!is_element_in_viewport(&far_outside, &v, 200.0));
        assert!(!is_element_in_viewport(&just_outside, &v, 0.0));
    }

    #[test]
    fn zoom_is_clamped() {
        let cfg = CanvasConfig::default();
        let mut v = vp();
        assert_eq!(v.set_zoom(100.0, &cfg), cfg.max_zoom);
        assert_eq!(v.set_zoom(0.0001, &cfg), cfg.min_zoom);
        assert_eq!(v.set_zoom(f32::NAN, &cfg), 1.0);
    }

    #[test]
    fn zoom_at_keeps_point_fixed() {
        let cfg = CanvasConfig::default();
        let mut v = vp();
        let before = v.screen_to_canvas(200.0, 150.0);
        v.zoom_at(200.0, 150.0, 1.5, &cfg);
        let after = v.screen_to_canvas(200.0, 150.0);
        assert!((before.0 - after.0).abs() < 1e-3);
        assert!((before.1 - after.1).abs() < 1e-3);
        assert_eq!(v.zoom, 1.5);
    }

    #[test]
    fn fit_centers_bounds() {
        let cfg = CanvasConfig::default();
        let mut v = vp();
        v.fit_to(Some(Rect::new(1000.0, 1000.0, 350.0, 250.0)), &cfg);
        let visible = v.visible_rect();
        assert!(visible.contains_rect(&Rect::new(1000.0, 1000.0, 350.0, 250.0)));
        let (cx, cy) = v.canvas_to_screen(1175.0, 1125.0);
        assert!((cx - 400.0).abs() < 1e-2 && (cy - 300.0).abs() < 1e-2);

        v.fit_to(None, &cfg);
        assert_eq!((v.x, v.y, v.zoom), (0.0, 0.0, 1.0));
    }

    #[test]
    fn unresolved_source_is_invisible() {
        let conn = Connection::new(
            PageId::intern("p"),
            BlockId::intern("ghost"),
            ConnectionTarget::Point { to_x: 10.0, to_y: 10.0 },
        );
        assert!(!is_connection_in_viewport(&conn, |_| None, &vp(), 200.0));
    }

    #[test]
    fn free_point_target_must_be_in_view() {
        let a = BlockId::intern("geo-a");
        let page = PageId::intern("p");
        let near = Connection::new(page, a, ConnectionTarget::Point { to_x: 300.0, to_y: 300.0 });
        let far = Connection::new(page, a, ConnectionTarget::Point { to_x: 9000.0, to_y: 0.0 });
        let rect_of = |id: BlockId| (id == a).then(|| Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(is_connection_in_viewport(&near, rect_of, &vp(), 200.0));
        assert!(!is_connection_in_viewport(&far, rect_of, &vp(), 200.0));
    }

    #[test]
    fn dangling_target_block_is_invisible() {
        let a = BlockId::intern("geo-src");
        let conn = Connection::new(
            PageId::intern("p"),
            a,
            ConnectionTarget::Block {
                to_block_id: BlockId::intern("geo-missing"),
            },
        );
        let rect_of = |id: BlockId| (id == a).then(|| Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(!is_connection_in_viewport(&conn, rect_of, &vp(), 200.0));
    }

    #[test]
    fn unanchored_connection_fails_open() {
        let a = BlockId::intern("geo-open");
        let conn = Connection::new(PageId::intern("p"), a, ConnectionTarget::Unanchored {});
        let rect_of = |id: BlockId| (id == a).then(|| Rect::new(0.0, 0.0, 100.0, 100.0));
        assert!(is_connection_in_viewport(&conn, rect_of, &vp(), 200.0));
    }
}
