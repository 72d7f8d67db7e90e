//! Canvas → Vello drawing commands.
//!
//! Paints one frame of the map surface: the background grid in screen
//! space, then culled connections and blocks under the viewport transform,
//! then the selection box. Only what survives culling is touched, so frame
//! cost follows the visible region rather than the page size.

use crate::route::{Segment, route_in};
use kurbo::{Affine, BezPath, Ellipse, Line, Point, Rect as KurboRect, RoundedRect, Stroke as KurboStroke};
use pmap_core::model::{Block, BlockContent, Connection, ConnectionKind, ElementCategory, Rect, ShapeKind};
use pmap_core::{BlockId, ElementStore, GridLayer, PositionOverlay, SurfaceTransform, Viewport};
use peniko::{Color, Fill};
use vello::Scene;

const BLOCK_FILL: Color = Color::from_rgba8(255, 255, 255, 255);
const BLOCK_BORDER: Color = Color::from_rgba8(203, 213, 225, 255);
const SHAPE_FILL: Color = Color::from_rgba8(237, 233, 254, 255);
const PORTAL_BORDER: Color = Color::from_rgba8(139, 92, 246, 255);
const GRID_LINE: Color = Color::from_rgba8(226, 232, 240, 255);
const SELECTION: Color = Color::from_rgba8(59, 130, 246, 255);
const DEFAULT_CONNECTION: Color = Color::from_rgba8(74, 85, 104, 255);

const CORNER_RADIUS: f64 = 8.0;
const ARROW_LENGTH: f64 = 12.0;
const ARROW_SPREAD: f64 = 0.45;

/// Everything needed to paint one frame.
pub struct CanvasFrame<'a> {
    pub store: &'a ElementStore,
    pub viewport: &'a Viewport,
    pub overlay: &'a PositionOverlay,
    pub selected: &'a [BlockId],
    /// Multi-selection bounding box in canvas units, already padded.
    pub selection_box: Option<Rect>,
    /// Marquee rectangle in canvas units while a box selection is live.
    pub marquee: Option<Rect>,
}

/// What a frame actually drew.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PaintStats {
    pub blocks: usize,
    pub connections: usize,
    pub grid_lines: usize,
}

/// Paint the frame into a freshly cleared `Scene`.
/// The caller presents the scene.
pub fn paint_canvas(scene: &mut Scene, frame: &CanvasFrame<'_>) -> PaintStats {
    let mut stats = PaintStats::default();
    let page = frame.store.page();

    if let Some(grid) = GridLayer::from_viewport(frame.viewport, &page.grid) {
        stats.grid_lines = paint_grid(scene, &grid, frame.viewport);
    }

    let transform = Affine::new(SurfaceTransform::from_viewport(frame.viewport).coefficients());

    for connection in frame.store.list_visible_connections(frame.viewport, frame.overlay) {
        match route_in(frame.store, frame.overlay, connection) {
            Some(segment) => {
                paint_connection(scene, transform, connection, &segment);
                stats.connections += 1;
            }
            None => log::warn!("connection {} has no route, skipped", connection.id),
        }
    }

    for visible in frame.store.list_visible_blocks(frame.viewport, frame.overlay) {
        let selected = frame.selected.contains(&visible.block.id);
        paint_block(scene, transform, visible.block, &visible.rect, selected);
        stats.blocks += 1;
    }

    if let Some(bbox) = frame.selection_box {
        let dashed = KurboStroke::new(1.5 / frame.viewport.zoom as f64).with_dashes(0.0, [6.0, 4.0]);
        scene.stroke(&dashed, transform, SELECTION, None, &to_kurbo(&bbox));
    }
    if let Some(marquee) = frame.marquee {
        let fill = SELECTION.with_alpha(0.08);
        scene.fill(Fill::NonZero, transform, fill, None, &to_kurbo(&marquee));
        scene.stroke(&KurboStroke::new(1.0), transform, SELECTION, None, &to_kurbo(&marquee));
    }

    log::trace!(
        "painted {} blocks, {} connections, {} grid lines",
        stats.blocks,
        stats.connections,
        stats.grid_lines
    );
    stats
}

// ─── Layers ──────────────────────────────────────────────────────────────────

fn paint_grid(scene: &mut Scene, grid: &GridLayer, viewport: &Viewport) -> usize {
    let stroke = KurboStroke::new(1.0);
    let (w, h) = (viewport.width as f64, viewport.height as f64);
    let mut count = 0;
    for x in grid.vertical_lines(viewport.width) {
        let line = Line::new((x as f64, 0.0), (x as f64, h));
        scene.stroke(&stroke, Affine::IDENTITY, GRID_LINE, None, &line);
        count += 1;
    }
    for y in grid.horizontal_lines(viewport.height) {
        let line = Line::new((0.0, y as f64), (w, y as f64));
        scene.stroke(&stroke, Affine::IDENTITY, GRID_LINE, None, &line);
        count += 1;
    }
    count
}

fn paint_connection(scene: &mut Scene, transform: Affine, connection: &Connection, segment: &Segment) {
    let color = parse_hex_color(&connection.color).unwrap_or(DEFAULT_CONNECTION);
    let stroke = KurboStroke::new(connection.stroke_width.max(0.5) as f64);
    let from = Point::new(segment.from.0 as f64, segment.from.1 as f64);
    let to = Point::new(segment.to.0 as f64, segment.to.1 as f64);
    scene.stroke(&stroke, transform, color, None, &Line::new(from, to));

    if connection.kind == ConnectionKind::Arrow && segment.length() > 0.0 {
        let head = arrow_head(from, to, ARROW_LENGTH + connection.stroke_width as f64);
        scene.fill(Fill::NonZero, transform, color, None, &head);
    }
}

fn arrow_head(from: Point, to: Point, length: f64) -> BezPath {
    let angle = (to.y - from.y).atan2(to.x - from.x);
    let left = Point::new(
        to.x - length * (angle - ARROW_SPREAD).cos(),
        to.y - length * (angle - ARROW_SPREAD).sin(),
    );
    let right = Point::new(
        to.x - length * (angle + ARROW_SPREAD).cos(),
        to.y - length * (angle + ARROW_SPREAD).sin(),
    );
    let mut path = BezPath::new();
    path.move_to(to);
    path.line_to(left);
    path.line_to(right);
    path.close_path();
    path
}

fn paint_block(scene: &mut Scene, transform: Affine, block: &Block, rect: &Rect, selected: bool) {
    let bounds = to_kurbo(rect);
    let border = if selected {
        SELECTION
    } else if block.content.portal_target().is_some() {
        PORTAL_BORDER
    } else {
        BLOCK_BORDER
    };
    let stroke = KurboStroke::new(if selected { 2.0 } else { 1.0 });

    match (&block.content, block.kind().category()) {
        (BlockContent::Shape { shape, .. }, _) => {
            let path = shape_path(*shape, bounds);
            scene.fill(Fill::NonZero, transform, SHAPE_FILL, None, &path);
            scene.stroke(&stroke, transform, border, None, &path);
        }
        (_, ElementCategory::Text) => {
            // Free text has no chrome; only an outline when selected
            if selected {
                scene.stroke(&stroke, transform, border, None, &bounds);
            }
        }
        _ => {
            let card = RoundedRect::from_rect(bounds, CORNER_RADIUS);
            scene.fill(Fill::NonZero, transform, BLOCK_FILL, None, &card);
            scene.stroke(&stroke, transform, border, None, &card);
        }
    }
    log::trace!(
        "BLOCK {} {:?} {:?} at ({}, {})",
        block.id,
        block.kind(),
        block.content.label(),
        rect.x,
        rect.y
    );
}

fn shape_path(shape: ShapeKind, bounds: KurboRect) -> BezPath {
    match shape {
        ShapeKind::Circle => {
            let ellipse = Ellipse::from_rect(bounds);
            kurbo::Shape::to_path(&ellipse, 0.1)
        }
        ShapeKind::Square => kurbo::Shape::to_path(&bounds, 0.1),
        ShapeKind::RoundedSquare => {
            kurbo::Shape::to_path(&RoundedRect::from_rect(bounds, CORNER_RADIUS * 2.0), 0.1)
        }
        ShapeKind::Triangle => {
            let mut path = BezPath::new();
            path.move_to((bounds.center().x, bounds.y0));
            path.line_to((bounds.x1, bounds.y1));
            path.line_to((bounds.x0, bounds.y1));
            path.close_path();
            path
        }
    }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn to_kurbo(rect: &Rect) -> KurboRect {
    KurboRect::new(
        rect.x as f64,
        rect.y as f64,
        rect.right() as f64,
        rect.bottom() as f64,
    )
}

/// Parse `#RGB`, `#RRGGBB` or `#RRGGBBAA`.
pub fn parse_hex_color(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if !digits.is_ascii() {
        return None;
    }
    let byte = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
    let nibble = |i: usize| {
        let v = u8::from_str_radix(digits.get(i..i + 1)?, 16).ok()?;
        Some(v * 17)
    };
    match digits.len() {
        3 => Some(Color::from_rgb8(nibble(0)?, nibble(1)?, nibble(2)?)),
        6 => Some(Color::from_rgb8(byte(0)?, byte(2)?, byte(4)?)),
        8 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}
