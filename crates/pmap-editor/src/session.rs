//! One page-editing session.
//!
//! `MapSession` owns the element store of the page on screen plus all the
//! transient state around it: viewport, selection, drag controller,
//! breadcrumbs, undo history. Input arrives as `InputEvent`s; persistence
//! is passed in by the caller whenever records must be read or written.
//!
//! Leaving a page (enter, navigate, back) cancels any drag, flushes
//! pending changes, and clears the undo history.

use crate::commands::{CommandStack, MapMutation};
use crate::drag::{DragController, DragEffect};
use crate::input::{InputEvent, Modifiers};
use crate::navigation::{BreadcrumbConfig, Breadcrumbs};
use crate::selection::{Selection, SelectionAnalysis, SelectionBox, analyze_selection};
use crate::shortcuts::{ShortcutAction, ShortcutMap};
use pmap_core::model::{BlockContent, BlockKind, ConnectionTarget, Rect};
use pmap_core::{
    BlockId, CanvasConfig, ConnectionId, ConnectionStyle, ElementStore, MapError, MapPersistence,
    PageId, PageTree, PositionOverlay, Viewport,
};
use pmap_render::{CanvasFrame, hit_test, hit_test_rect};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionConfig {
    pub canvas: CanvasConfig,
    pub breadcrumbs: BreadcrumbConfig,
    /// Undo depth per page.
    pub history_depth: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasConfig::default(),
            breadcrumbs: BreadcrumbConfig::default(),
            history_depth: 50,
        }
    }
}

pub struct MapSession {
    config: SessionConfig,
    pages: PageTree,
    store: ElementStore,
    viewport: Viewport,
    /// Last viewport of every page visited in this session.
    viewports: HashMap<PageId, Viewport>,
    selection: Selection,
    drag: DragController,
    breadcrumbs: Breadcrumbs,
    commands: CommandStack,
}

impl MapSession {
    /// Load the page tree and open `root` as the breadcrumb root.
    pub fn open(backend: &dyn MapPersistence, root: PageId) -> Result<Self, MapError> {
        Self::open_with_config(backend, root, SessionConfig::default())
    }

    pub fn open_with_config(
        backend: &dyn MapPersistence,
        root: PageId,
        config: SessionConfig,
    ) -> Result<Self, MapError> {
        let mut pages = PageTree::from_pages(backend.load_pages()?)?;
        // Portals on pages not opened yet still constrain new links
        for portal in backend.load_portals()? {
            if let Err(err) = pages.link_portal(portal.page, portal.block, portal.target) {
                log::warn!("stored portal {} not linked: {err}", portal.block);
            }
        }
        let name = pages
            .page(root)
            .ok_or(MapError::PageNotFound { page: root })?
            .name
            .clone();
        let store = ElementStore::from_page_data(backend.load_page(root)?, config.canvas);
        let mut session = Self {
            config,
            pages,
            store,
            viewport: Viewport::default(),
            viewports: HashMap::new(),
            selection: Selection::new(),
            drag: DragController::new(),
            breadcrumbs: Breadcrumbs::with_config(root, name, config.breadcrumbs),
            commands: CommandStack::new(config.history_depth),
        };
        session.register_portals();
        log::debug!("session opened on {root}");
        Ok(session)
    }

    // ─── Accessors ───────────────────────────────────────────────────────

    pub fn store(&self) -> &ElementStore {
        &self.store
    }

    pub fn pages(&self) -> &PageTree {
        &self.pages
    }

    pub fn page_id(&self) -> PageId {
        self.store.page_id()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn breadcrumbs(&self) -> &Breadcrumbs {
        &self.breadcrumbs
    }

    pub fn overlay(&self) -> &PositionOverlay {
        self.drag.overlay()
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_dragging()
    }

    pub fn can_undo(&self) -> bool {
        self.commands.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.commands.can_redo()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.commands.undo_description()
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.commands.redo_description()
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Selection box for the toolbar, drag-aware.
    pub fn selection_bounds(&self) -> Option<SelectionBox> {
        self.selection.bounds(
            &self.store,
            self.drag.overlay(),
            self.config.canvas.selection_padding,
        )
    }

    pub fn selection_analysis(&self) -> SelectionAnalysis {
        analyze_selection(&self.selection, &self.store)
    }

    /// Everything the painter needs for the current frame.
    pub fn canvas_frame(&self) -> CanvasFrame<'_> {
        CanvasFrame {
            store: &self.store,
            viewport: &self.viewport,
            overlay: self.drag.overlay(),
            selected: self.selection.ids(),
            selection_box: self.selection_bounds().filter(|b| b.multi).map(|b| b.rect),
            marquee: self.drag.marquee(&self.viewport),
        }
    }

    // ─── Viewport ────────────────────────────────────────────────────────

    /// The host canvas element changed size.
    pub fn resize_surface(&mut self, width: f32, height: f32) {
        if width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0 {
            self.viewport.width = width;
            self.viewport.height = height;
        }
    }

    pub fn zoom_to_fit(&mut self) {
        self.viewport
            .fit_to(self.store.content_bounds(), &self.config.canvas);
    }

    pub fn reset_view(&mut self) {
        self.viewport.reset();
    }

    pub fn zoom_in(&mut self) {
        self.viewport
            .zoom_by(self.config.canvas.zoom_step, &self.config.canvas);
    }

    pub fn zoom_out(&mut self) {
        self.viewport
            .zoom_by(1.0 / self.config.canvas.zoom_step, &self.config.canvas);
    }

    // ─── Input ───────────────────────────────────────────────────────────

    /// Feed one input event. Returns whether the frame needs repainting.
    pub fn handle_event(&mut self, event: &InputEvent) -> Result<bool, MapError> {
        match event {
            InputEvent::PointerDown { x, y, modifiers } => {
                self.pointer_down(*x, *y, *modifiers);
                Ok(true)
            }
            InputEvent::PointerMove { x, y, modifiers } => {
                let effect =
                    self.drag
                        .pointer_move(*x, *y, modifiers.shift, &mut self.viewport);
                Ok(effect != DragEffect::None)
            }
            InputEvent::PointerUp { .. } => self.pointer_up(),
            InputEvent::PointerLeave | InputEvent::Cancel => {
                Ok(self.drag.cancel() != DragEffect::None)
            }
            InputEvent::Wheel { x, y, delta_y, .. } => {
                if *delta_y == 0.0 || !delta_y.is_finite() {
                    return Ok(false);
                }
                let step = self.config.canvas.zoom_step;
                let factor = if *delta_y < 0.0 { step } else { 1.0 / step };
                self.viewport.zoom_at(*x, *y, factor, &self.config.canvas);
                Ok(true)
            }
            InputEvent::Key { key, modifiers } => match ShortcutMap::resolve(key, *modifiers) {
                Some(action) => self.run_action(action),
                None => Ok(false),
            },
        }
    }

    fn pointer_down(&mut self, sx: f32, sy: f32, modifiers: Modifiers) {
        let (cx, cy) = self.viewport.screen_to_canvas(sx, sy);
        match hit_test(&self.store, self.drag.overlay(), cx, cy) {
            Some(id) => {
                if modifiers.shift {
                    self.selection.toggle(id);
                } else if !self.selection.contains(id) {
                    self.selection.select_only(id);
                }
                if self.selection.contains(id) {
                    let ids = self.selection.ids().to_vec();
                    self.drag.begin_drag(&ids, &self.store, &self.viewport, sx, sy);
                } else {
                    self.drag.cancel();
                }
            }
            None if modifiers.shift => self.drag.begin_marquee(sx, sy),
            None => {
                self.selection.clear();
                self.drag.begin_pan(sx, sy);
            }
        }
    }

    fn pointer_up(&mut self) -> Result<bool, MapError> {
        match self.drag.release(&mut self.store, &self.viewport)? {
            DragEffect::Committed(moves) => {
                let forward = moves.iter().map(|m| (m.id, m.to.0, m.to.1)).collect();
                let inverse = moves.iter().map(|m| (m.id, m.from.0, m.from.1)).collect();
                let description = match moves.len() {
                    1 => "move block".to_string(),
                    n => format!("move {n} blocks"),
                };
                self.commands.record(
                    MapMutation::MoveBlocks { moves: forward },
                    MapMutation::MoveBlocks { moves: inverse },
                    &description,
                );
                Ok(true)
            }
            DragEffect::MarqueeFinished(area) => {
                let hits = hit_test_rect(&self.store, self.drag.overlay(), &area);
                self.selection.extend(hits);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Run a shortcut action. Returns whether anything changed.
    pub fn run_action(&mut self, action: ShortcutAction) -> Result<bool, MapError> {
        match action {
            ShortcutAction::Undo => Ok(self.undo()?.is_some()),
            ShortcutAction::Redo => Ok(self.redo()?.is_some()),
            ShortcutAction::Delete => Ok(self.delete_selection()? > 0),
            ShortcutAction::SelectAll => {
                self.selection.set(self.store.blocks().iter().map(|b| b.id));
                Ok(true)
            }
            ShortcutAction::ZoomIn => {
                self.zoom_in();
                Ok(true)
            }
            ShortcutAction::ZoomOut => {
                self.zoom_out();
                Ok(true)
            }
            ShortcutAction::ZoomToFit => {
                self.zoom_to_fit();
                Ok(true)
            }
            ShortcutAction::ResetView => {
                self.reset_view();
                Ok(true)
            }
            ShortcutAction::BringForward => self.reorder(ElementStore::bring_forward),
            ShortcutAction::SendBackward => self.reorder(ElementStore::send_backward),
            ShortcutAction::BringToFront => self.reorder(ElementStore::bring_to_front),
            ShortcutAction::SendToBack => self.reorder(ElementStore::send_to_back),
            ShortcutAction::Deselect => {
                if self.drag.cancel() != DragEffect::None {
                    return Ok(true);
                }
                let had = !self.selection.is_empty();
                self.selection.clear();
                Ok(had)
            }
        }
    }

    fn reorder(
        &mut self,
        op: fn(&mut ElementStore, BlockId) -> Result<bool, MapError>,
    ) -> Result<bool, MapError> {
        let mut changed = false;
        for id in self.selection.ids().to_vec() {
            changed |= op(&mut self.store, id)?;
        }
        Ok(changed)
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    /// Create a block of `kind` at its default size with its top-left at
    /// canvas point `(x, y)`, and select it.
    pub fn create_block(&mut self, kind: BlockKind, x: f32, y: f32) -> Result<BlockId, MapError> {
        let (w, h) = kind.default_size();
        self.create_block_with(kind.empty_content(), Rect::new(x, y, w, h))
    }

    pub fn create_block_with(
        &mut self,
        content: BlockContent,
        rect: Rect,
    ) -> Result<BlockId, MapError> {
        let portal = content.portal_target();
        if let Some(target) = portal {
            self.check_portal(target)?;
        }
        let id = self.store.create_block(content, rect)?;
        if let Some(block) = self.store.block(id) {
            self.commands.record(
                MapMutation::InsertBlock {
                    block: Box::new(block.clone()),
                    connections: Vec::new(),
                },
                MapMutation::DeleteBlock { id },
                "create block",
            );
        }
        if let Some(target) = portal {
            self.link_portal(id, target);
        }
        self.selection.select_only(id);
        Ok(id)
    }

    pub fn delete_block(&mut self, id: BlockId) -> Result<(), MapError> {
        self.drag.cancel();
        self.commands
            .execute(&mut self.store, MapMutation::DeleteBlock { id }, "delete block")?;
        self.pages.unlink_portal(id);
        self.selection.remove(id);
        Ok(())
    }

    /// Delete every selected block as one undo step. Returns how many went.
    pub fn delete_selection(&mut self) -> Result<usize, MapError> {
        self.drag.cancel();
        let ids = self.selection.ids().to_vec();
        if ids.is_empty() {
            return Ok(0);
        }
        let steps = ids.iter().map(|id| MapMutation::DeleteBlock { id: *id }).collect();
        let description = match ids.len() {
            1 => "delete block".to_string(),
            n => format!("delete {n} blocks"),
        };
        self.commands
            .execute(&mut self.store, MapMutation::Batch(steps), &description)?;
        for id in &ids {
            self.pages.unlink_portal(*id);
        }
        self.selection.clear();
        Ok(ids.len())
    }

    pub fn resize_block(&mut self, id: BlockId, rect: Rect) -> Result<(), MapError> {
        self.commands
            .execute(&mut self.store, MapMutation::ResizeBlock { id, rect }, "resize block")
    }

    /// Replace a block's content. A navigator pointing at a page that can
    /// already reach this one is rejected.
    pub fn update_content(&mut self, id: BlockId, content: BlockContent) -> Result<(), MapError> {
        let portal = content.portal_target();
        if let Some(target) = portal {
            self.check_portal(target)?;
        }
        self.commands.execute(
            &mut self.store,
            MapMutation::SetContent {
                id,
                content: Box::new(content),
            },
            "edit block",
        )?;
        match portal {
            Some(target) => self.link_portal(id, target),
            None => self.pages.unlink_portal(id),
        }
        Ok(())
    }

    pub fn connect(
        &mut self,
        from: BlockId,
        target: ConnectionTarget,
    ) -> Result<ConnectionId, MapError> {
        let id = self.store.create_connection(from, target)?;
        if let Some(conn) = self.store.connection(id) {
            self.commands.record(
                MapMutation::InsertConnection {
                    connection: Box::new(conn.clone()),
                },
                MapMutation::DeleteConnection { id },
                "connect",
            );
        }
        Ok(id)
    }

    pub fn delete_connection(&mut self, id: ConnectionId) -> Result<(), MapError> {
        self.commands.execute(
            &mut self.store,
            MapMutation::DeleteConnection { id },
            "delete connection",
        )
    }

    pub fn restyle_connection(
        &mut self,
        id: ConnectionId,
        style: ConnectionStyle,
    ) -> Result<(), MapError> {
        self.commands.execute(
            &mut self.store,
            MapMutation::RestyleConnection { id, style },
            "restyle connection",
        )
    }

    /// Destructive bulk delete of the page, gated by the confirmation
    /// dialog naming `confirmed`. Undoable as one step.
    pub fn clear_area(&mut self, confirmed: PageId) -> Result<usize, MapError> {
        self.drag.cancel();
        let (blocks, connections) = self.store.clear_area(confirmed)?;
        let count = blocks.len();
        let forward = blocks
            .iter()
            .map(|b| MapMutation::DeleteBlock { id: b.id })
            .collect();
        let mut inverse: Vec<MapMutation> = Vec::with_capacity(count + connections.len());
        for block in blocks {
            self.pages.unlink_portal(block.id);
            inverse.push(MapMutation::InsertBlock {
                block: Box::new(block),
                connections: Vec::new(),
            });
        }
        inverse.extend(connections.into_iter().map(|c| MapMutation::InsertConnection {
            connection: Box::new(c),
        }));
        self.commands.record(
            MapMutation::Batch(forward),
            MapMutation::Batch(inverse),
            "clear area",
        );
        self.selection.clear();
        Ok(count)
    }

    pub fn set_grid(&mut self, enabled: bool, size: f32) -> Result<(), MapError> {
        self.store.set_grid(enabled, size)?;
        if let Some(page) = self.pages.page_mut(self.store.page_id()) {
            page.grid = self.store.page().grid;
        }
        Ok(())
    }

    /// Snapping is a session preference; it survives page changes.
    pub fn set_snap_to_grid(&mut self, snap: bool) {
        self.config.canvas.snap_to_grid = snap;
        self.store.set_snap_to_grid(snap);
    }

    pub fn undo(&mut self) -> Result<Option<String>, MapError> {
        self.drag.cancel();
        let done = self.commands.undo(&mut self.store)?;
        self.after_history_step();
        Ok(done)
    }

    pub fn redo(&mut self) -> Result<Option<String>, MapError> {
        self.drag.cancel();
        let done = self.commands.redo(&mut self.store)?;
        self.after_history_step();
        Ok(done)
    }

    fn after_history_step(&mut self) {
        self.selection.retain_existing(&self.store);
        self.register_portals();
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Push pending changes. The caller decides when (debounce, page exit).
    pub fn flush(&mut self, backend: &mut dyn MapPersistence) -> Result<usize, MapError> {
        self.store.flush(backend)
    }

    // ─── Navigation ──────────────────────────────────────────────────────

    /// Follow a portal or open a sub-map: push `page` onto the breadcrumbs.
    pub fn enter(&mut self, backend: &mut dyn MapPersistence, page: PageId) -> Result<(), MapError> {
        let name = self
            .pages
            .page(page)
            .ok_or(MapError::PageNotFound { page })?
            .name
            .clone();
        self.switch_to(backend, page)?;
        self.breadcrumbs.enter(page, name);
        Ok(())
    }

    /// Activate a navigator block: enter the page it links to, if any.
    pub fn open_portal(
        &mut self,
        backend: &mut dyn MapPersistence,
        block: BlockId,
    ) -> Result<Option<PageId>, MapError> {
        let target = self
            .store
            .block(block)
            .ok_or(MapError::BlockNotFound { block })?
            .content
            .portal_target();
        if let Some(page) = target {
            self.enter(backend, page)?;
        }
        Ok(target)
    }

    /// Breadcrumb click: truncate the trail to `page` and load it.
    pub fn navigate_to(
        &mut self,
        backend: &mut dyn MapPersistence,
        page: PageId,
    ) -> Result<(), MapError> {
        if !self.breadcrumbs.contains(page) {
            return Err(MapError::NotInBreadcrumbs { page });
        }
        self.switch_to(backend, page)?;
        self.breadcrumbs.navigate_to(page)?;
        Ok(())
    }

    /// One level up. The root cannot be left this way.
    pub fn back(&mut self, backend: &mut dyn MapPersistence) -> Result<PageId, MapError> {
        let items = self.breadcrumbs.items();
        if items.len() <= 1 {
            return Err(MapError::CannotPopRoot);
        }
        let parent = items[items.len() - 2].id;
        self.switch_to(backend, parent)?;
        self.breadcrumbs.back()
    }

    /// Cancel the drag, flush, then load `page` and restore its viewport.
    fn switch_to(&mut self, backend: &mut dyn MapPersistence, page: PageId) -> Result<(), MapError> {
        if self.drag.cancel() == DragEffect::Cancelled {
            log::debug!("left page {} mid-gesture; drag discarded", self.page_id());
        }
        self.store.flush(backend)?;
        let data = backend.load_page(page)?;

        let (width, height) = (self.viewport.width, self.viewport.height);
        self.viewports.insert(self.store.page_id(), self.viewport);
        let mut viewport = self.viewports.get(&page).copied().unwrap_or_default();
        viewport.width = width;
        viewport.height = height;

        self.store = ElementStore::from_page_data(data, self.config.canvas);
        self.viewport = viewport;
        self.selection.clear();
        self.commands.clear();
        self.register_portals();
        log::debug!("switched to page {page}");
        Ok(())
    }

    // ─── Portals ─────────────────────────────────────────────────────────

    fn check_portal(&self, target: PageId) -> Result<(), MapError> {
        let here = self.store.page_id();
        if !self.pages.contains(target) {
            return Err(MapError::PageNotFound { page: target });
        }
        if !self.pages.can_link(here, target) {
            log::warn!("portal {here} -> {target} would create a cycle");
            return Err(MapError::CycleDetected {
                parent: here,
                child: target,
            });
        }
        Ok(())
    }

    fn link_portal(&mut self, block: BlockId, target: PageId) {
        let here = self.store.page_id();
        if let Err(err) = self.pages.link_portal(here, block, target) {
            log::warn!("portal from block {block} not linked: {err}");
        }
    }

    /// Re-derive portal edges for the loaded page from its navigator blocks.
    fn register_portals(&mut self) {
        let here = self.store.page_id();
        // Edges whose block is gone or no longer links anywhere
        for (block, _) in self.pages.portals_from(here) {
            let linked = self
                .store
                .block(block)
                .and_then(|b| b.content.portal_target())
                .is_some();
            if !linked {
                self.pages.unlink_portal(block);
            }
        }
        let portals: Vec<(BlockId, Option<PageId>)> = self
            .store
            .blocks()
            .iter()
            .filter(|b| b.kind() == BlockKind::Navigator)
            .map(|b| (b.id, b.content.portal_target()))
            .collect();
        for (block, target) in portals {
            match target {
                Some(target) => {
                    if let Err(err) = self.pages.link_portal(here, block, target) {
                        log::warn!("portal from block {block} not linked: {err}");
                    }
                }
                None => self.pages.unlink_portal(block),
            }
        }
    }
}
