//! Drag/interaction state machine.
//!
//! ```text
//! Idle ──down on empty canvas──▶ Panning ──up/cancel──▶ Idle
//! Idle ──down on a block───────▶ Dragging ──up──▶ commit ──▶ Idle
//!                                          └─cancel──▶ discard ─▶ Idle
//! Idle ──shift+down on empty───▶ Marquee ──up──▶ box ──▶ Idle
//! ```
//!
//! While dragging, positions live in a `PositionOverlay` and the store is
//! left alone. Release commits every dragged block in one batch; cancel
//! drops the overlay. Nothing here depends on the render layer.

use pmap_core::model::Rect;
use pmap_core::{BlockId, ElementStore, MapError, PositionOverlay, Viewport};
use smallvec::SmallVec;

/// One block's committed displacement, kept for undo.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlockMove {
    pub id: BlockId,
    pub from: (f32, f32),
    pub to: (f32, f32),
}

#[derive(Debug, Clone, PartialEq)]
enum DragState {
    Idle,
    Panning {
        last: (f32, f32),
    },
    Dragging {
        /// Pointer position at drag start, canvas units.
        origin: (f32, f32),
        /// Stored origin of every dragged block at drag start.
        starts: SmallVec<[(BlockId, f32, f32); 8]>,
    },
    Marquee {
        start: (f32, f32),
        current: (f32, f32),
    },
}

/// What a pointer event did, for the caller to react to.
#[derive(Debug, Clone, PartialEq)]
pub enum DragEffect {
    None,
    Panned,
    /// Overlay positions changed.
    Moved,
    Committed(Vec<BlockMove>),
    Cancelled,
    /// Marquee released; canvas-space rectangle to select within.
    MarqueeFinished(Rect),
}

#[derive(Debug, Clone)]
pub struct DragController {
    state: DragState,
    overlay: PositionOverlay,
}

impl Default for DragController {
    fn default() -> Self {
        Self::new()
    }
}

impl DragController {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
            overlay: PositionOverlay::new(),
        }
    }

    /// Positions that override the store while a drag is in flight.
    pub fn overlay(&self) -> &PositionOverlay {
        &self.overlay
    }

    pub fn is_idle(&self) -> bool {
        self.state == DragState::Idle
    }

    pub fn is_panning(&self) -> bool {
        matches!(self.state, DragState::Panning { .. })
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Live marquee in canvas units, if one is being drawn.
    pub fn marquee(&self, viewport: &Viewport) -> Option<Rect> {
        match self.state {
            DragState::Marquee { start, current } => Some(marquee_rect(start, current, viewport)),
            _ => None,
        }
    }

    /// Pointer down on empty canvas. Screen coordinates.
    pub fn begin_pan(&mut self, sx: f32, sy: f32) {
        self.cancel();
        log::debug!("pan start at ({sx}, {sy})");
        self.state = DragState::Panning { last: (sx, sy) };
    }

    pub fn begin_marquee(&mut self, sx: f32, sy: f32) {
        self.cancel();
        self.state = DragState::Marquee {
            start: (sx, sy),
            current: (sx, sy),
        };
    }

    /// Pointer down on a selected block. `ids` are every block that moves
    /// with it; unknown ids are skipped. The grab point is pinned in canvas
    /// space, so zooming or panning mid-drag keeps blocks under the pointer.
    pub fn begin_drag(
        &mut self,
        ids: &[BlockId],
        store: &ElementStore,
        viewport: &Viewport,
        sx: f32,
        sy: f32,
    ) {
        self.cancel();
        let starts: SmallVec<[(BlockId, f32, f32); 8]> = ids
            .iter()
            .filter_map(|id| store.block(*id))
            .map(|b| (b.id, b.rect.x, b.rect.y))
            .collect();
        if starts.is_empty() {
            return;
        }
        log::debug!("drag start: {} blocks", starts.len());
        self.state = DragState::Dragging {
            origin: viewport.screen_to_canvas(sx, sy),
            starts,
        };
    }

    /// Pointer moved to `(sx, sy)`. `constrain` locks a block drag to the
    /// dominant axis.
    pub fn pointer_move(
        &mut self,
        sx: f32,
        sy: f32,
        constrain: bool,
        viewport: &mut Viewport,
    ) -> DragEffect {
        match &mut self.state {
            DragState::Idle => DragEffect::None,
            DragState::Panning { last } => {
                let (dx, dy) = (sx - last.0, sy - last.1);
                *last = (sx, sy);
                viewport.pan_by(dx, dy);
                DragEffect::Panned
            }
            DragState::Marquee { current, .. } => {
                *current = (sx, sy);
                DragEffect::Moved
            }
            DragState::Dragging { origin, starts } => {
                let (cx, cy) = viewport.screen_to_canvas(sx, sy);
                let mut dx = cx - origin.0;
                let mut dy = cy - origin.1;
                if constrain {
                    if dx.abs() > dy.abs() {
                        dy = 0.0;
                    } else {
                        dx = 0.0;
                    }
                }
                // Same delta for every block keeps the group rigid
                for &(id, x, y) in starts.iter() {
                    self.overlay.set(id, x + dx, y + dy);
                }
                DragEffect::Moved
            }
        }
    }

    /// Pointer released. A block drag commits here, as one batch.
    pub fn release(
        &mut self,
        store: &mut ElementStore,
        viewport: &Viewport,
    ) -> Result<DragEffect, MapError> {
        let state = std::mem::replace(&mut self.state, DragState::Idle);
        match state {
            DragState::Idle => Ok(DragEffect::None),
            DragState::Panning { .. } => {
                log::debug!("pan end at ({}, {})", viewport.x, viewport.y);
                Ok(DragEffect::None)
            }
            DragState::Marquee { start, current } => {
                Ok(DragEffect::MarqueeFinished(marquee_rect(start, current, viewport)))
            }
            DragState::Dragging { starts, .. } => {
                let overlay = std::mem::take(&mut self.overlay);
                let moves: Vec<(BlockId, f32, f32)> = starts
                    .iter()
                    .filter_map(|&(id, x, y)| {
                        let (nx, ny) = overlay.get(id)?;
                        (nx != x || ny != y).then_some((id, nx, ny))
                    })
                    .collect();
                if moves.is_empty() {
                    return Ok(DragEffect::None);
                }
                if let Err(err) = store.commit_moves(&moves) {
                    log::warn!("drag commit rejected: {err}");
                    return Err(err);
                }
                let committed = starts
                    .iter()
                    .filter(|(id, ..)| moves.iter().any(|m| m.0 == *id))
                    .filter_map(|&(id, x, y)| {
                        let b = store.block(id)?;
                        Some(BlockMove {
                            id,
                            from: (x, y),
                            to: (b.rect.x, b.rect.y),
                        })
                    })
                    .collect::<Vec<_>>();
                log::debug!("drag commit: {} blocks", committed.len());
                Ok(DragEffect::Committed(committed))
            }
        }
    }

    /// Drop any in-flight gesture without touching the store.
    pub fn cancel(&mut self) -> DragEffect {
        let was = std::mem::replace(&mut self.state, DragState::Idle);
        self.overlay.clear();
        match was {
            DragState::Idle => DragEffect::None,
            DragState::Dragging { starts, .. } => {
                log::debug!("drag cancelled: {} blocks discarded", starts.len());
                DragEffect::Cancelled
            }
            _ => DragEffect::Cancelled,
        }
    }
}

fn marquee_rect(start: (f32, f32), current: (f32, f32), viewport: &Viewport) -> Rect {
    let (x1, y1) = viewport.screen_to_canvas(start.0, start.1);
    let (x2, y2) = viewport.screen_to_canvas(current.0, current.1);
    Rect::from_corners(x1, y1, x2, y2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmap_core::model::*;
    use pmap_core::{CanvasConfig, PageId};

    fn store() -> ElementStore {
        ElementStore::new(Page {
            id: PageId::intern("drag-page"),
            name: "Drag".into(),
            group_id: None,
            parent_id: None,
            order: 0,
            grid: GridSettings::default(),
        })
    }

    fn para() -> BlockContent {
        BlockContent::Paragraph { text: String::new() }
    }

    #[test]
    fn pan_moves_only_viewport() {
        let mut drag = DragController::new();
        let mut vp = Viewport::default();
        drag.begin_pan(100.0, 100.0);
        assert_eq!(drag.pointer_move(130.0, 90.0, false, &mut vp), DragEffect::Panned);
        assert_eq!((vp.x, vp.y, vp.zoom), (30.0, -10.0, 1.0));
        assert!(drag.overlay().is_empty());
    }

    #[test]
    fn drag_is_overlay_until_release() {
        let mut s = store();
        let a = s.create_block(para(), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let mut vp = Viewport::default();
        vp.zoom = 2.0;
        let mut drag = DragController::new();
        drag.begin_drag(&[a], &s, &vp, 10.0, 10.0);
        drag.pointer_move(50.0, 30.0, false, &mut vp);
        assert_eq!(drag.overlay().get(a), Some((20.0, 10.0)));
        assert_eq!(s.block(a).unwrap().rect.x, 0.0);
        assert_eq!(s.pending_changes().len(), 1);

        let effect = drag.release(&mut s, &vp).unwrap();
        assert_eq!(
            effect,
            DragEffect::Committed(vec![BlockMove {
                id: a,
                from: (0.0, 0.0),
                to: (20.0, 10.0),
            }])
        );
        assert!(drag.overlay().is_empty());
        assert!(drag.is_idle());
        assert_eq!(s.block(a).unwrap().rect, Rect::new(20.0, 10.0, 100.0, 100.0));
    }

    #[test]
    fn constrained_drag_locks_axis() {
        let mut s = store();
        let a = s.create_block(para(), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let mut vp = Viewport::default();
        let mut drag = DragController::new();
        drag.begin_drag(&[a], &s, &vp, 0.0, 0.0);
        drag.pointer_move(40.0, 15.0, true, &mut vp);
        assert_eq!(drag.overlay().get(a), Some((40.0, 0.0)));
    }

    #[test]
    fn click_without_motion_commits_nothing() {
        let mut s = store();
        let a = s.create_block(para(), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        s.take_changes();
        let vp = Viewport::default();
        let mut drag = DragController::new();
        drag.begin_drag(&[a], &s, &vp, 5.0, 5.0);
        assert_eq!(drag.release(&mut s, &vp).unwrap(), DragEffect::None);
        assert!(!s.is_dirty());
    }

    #[test]
    fn cancel_discards_overlay() {
        let mut s = store();
        let a = s.create_block(para(), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let mut vp = Viewport::default();
        let mut drag = DragController::new();
        drag.begin_drag(&[a], &s, &vp, 0.0, 0.0);
        drag.pointer_move(300.0, 300.0, false, &mut vp);
        assert_eq!(drag.cancel(), DragEffect::Cancelled);
        assert!(drag.overlay().is_empty());
        assert_eq!(drag.release(&mut s, &vp).unwrap(), DragEffect::None);
        assert_eq!(s.block(a).unwrap().rect.x, 0.0);
    }

    #[test]
    fn zoom_mid_drag_keeps_block_under_pointer() {
        let mut s = store();
        let a = s.create_block(para(), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let mut vp = Viewport::default();
        let mut drag = DragController::new();
        drag.begin_drag(&[a], &s, &vp, 50.0, 50.0);
        drag.pointer_move(70.0, 50.0, false, &mut vp);
        assert_eq!(drag.overlay().get(a), Some((20.0, 0.0)));

        // Zoom about the pointer: the canvas point under it stays put
        vp.zoom_at(70.0, 50.0, 2.0, &CanvasConfig::default());
        drag.pointer_move(70.0, 50.0, false, &mut vp);
        assert_eq!(drag.overlay().get(a), Some((20.0, 0.0)));

        drag.pointer_move(90.0, 50.0, false, &mut vp);
        assert_eq!(drag.overlay().get(a), Some((30.0, 0.0)));
    }

    #[test]
    fn marquee_reports_canvas_rect() {
        let mut vp = Viewport::default();
        vp.x = 100.0;
        let mut s = store();
        let mut drag = DragController::new();
        drag.begin_marquee(300.0, 200.0);
        drag.pointer_move(200.0, 100.0, false, &mut vp);
        assert_eq!(drag.marquee(&vp), Some(Rect::new(100.0, 100.0, 100.0, 100.0)));
        assert_eq!(
            drag.release(&mut s, &vp).unwrap(),
            DragEffect::MarqueeFinished(Rect::new(100.0, 100.0, 100.0, 100.0))
        );
    }
}
