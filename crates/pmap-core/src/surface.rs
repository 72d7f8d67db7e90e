//! Canvas surface: the transform applied to the content layer and the
//! background grid that scales with it.
//!
//! The surface is controlled. It never owns pan/zoom, it only turns the
//! current `Viewport` into a `SurfaceFrame`. Pan and zoom change nothing
//! but the frame, so hosts only touch the transform and background
//! position when the viewport moves.

use crate::geometry::{CanvasConfig, Viewport};
use crate::model::{ElementCategory, GridSettings, Rect};
use serde::Serialize;

/// `translate(x, y) scale(zoom)` applied to the content layer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SurfaceTransform {
    pub translate_x: f32,
    pub translate_y: f32,
    pub scale: f32,
}

impl SurfaceTransform {
    pub fn from_viewport(viewport: &Viewport) -> Self {
        Self {
            translate_x: viewport.x,
            translate_y: viewport.y,
            scale: viewport.zoom,
        }
    }

    /// CSS transform string for DOM hosts (`transform-origin: 0 0`).
    pub fn to_css(&self) -> String {
        format!(
            "translate({}px, {}px) scale({})",
            self.translate_x, self.translate_y, self.scale
        )
    }

    /// Row-major 2D affine coefficients `[a, b, c, d, e, f]`.
    pub fn coefficients(&self) -> [f64; 6] {
        let s = self.scale as f64;
        [s, 0.0, 0.0, s, self.translate_x as f64, self.translate_y as f64]
    }
}

/// Background grid in screen pixels. Cell size and offset both follow
/// zoom and pan so the grid reads as fixed in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridLayer {
    pub cell_size: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl GridLayer {
    /// Smallest on-screen cell still worth drawing.
    const MIN_CELL_PX: f32 = 4.0;

    pub fn from_viewport(viewport: &Viewport, grid: &GridSettings) -> Option<Self> {
        if !grid.enabled || grid.size.is_nan() || grid.size <= 0.0 {
            return None;
        }
        let cell_size = grid.size * viewport.zoom;
        if cell_size < Self::MIN_CELL_PX {
            return None;
        }
        Some(Self {
            cell_size,
            offset_x: viewport.x.rem_euclid(cell_size),
            offset_y: viewport.y.rem_euclid(cell_size),
        })
    }

    /// CSS `background-size` / `background-position` pair.
    pub fn to_css(&self) -> (String, String) {
        (
            format!("{}px {}px", self.cell_size, self.cell_size),
            format!("{}px {}px", self.offset_x, self.offset_y),
        )
    }

    /// Screen-space x positions of vertical lines across `width`.
    pub fn vertical_lines(&self, width: f32) -> impl Iterator<Item = f32> + '_ {
        line_positions(self.offset_x, self.cell_size, width)
    }

    /// Screen-space y positions of horizontal lines across `height`.
    pub fn horizontal_lines(&self, height: f32) -> impl Iterator<Item = f32> + '_ {
        line_positions(self.offset_y, self.cell_size, height)
    }
}

fn line_positions(offset: f32, step: f32, extent: f32) -> impl Iterator<Item = f32> {
    let count = if step > 0.0 {
        ((extent - offset) / step).floor().max(-1.0) as i64 + 1
    } else {
        0
    };
    (0..count.max(0)).map(move |i| offset + i as f32 * step)
}

/// Everything a host needs to draw one frame of the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SurfaceFrame {
    pub transform: SurfaceTransform,
    pub grid: Option<GridLayer>,
    /// Logical extent of the content layer in canvas units.
    pub content: Rect,
}

impl SurfaceFrame {
    pub fn describe(viewport: &Viewport, grid: &GridSettings, config: &CanvasConfig) -> Self {
        Self {
            transform: SurfaceTransform::from_viewport(viewport),
            grid: GridLayer::from_viewport(viewport, grid),
            content: Rect::new(0.0, 0.0, config.content_extent, config.content_extent),
        }
    }
}

/// Snap a block rectangle to the grid. Shapes snap by their center,
/// everything else by the top-left corner.
pub fn snap_rect(rect: Rect, category: ElementCategory, grid_size: f32) -> Rect {
    if grid_size.is_nan() || grid_size <= 0.0 {
        return rect;
    }
    let snap = |v: f32| (v / grid_size).round() * grid_size;
    match category {
        ElementCategory::Shape => {
            let (cx, cy) = rect.center();
            rect.with_origin(snap(cx) - rect.width / 2.0, snap(cy) - rect.height / 2.0)
        }
        ElementCategory::Block | ElementCategory::Text => rect.with_origin(snap(rect.x), snap(rect.y)),
    }
}
