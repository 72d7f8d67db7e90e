//! The element store: authoritative blocks and connections of one page.
//!
//! Blocks are kept in paint order (ascending `z_index`) with an id index
//! for O(1) lookup. Every mutation validates first and applies second, so a
//! rejected call leaves the store untouched. Applied mutations are recorded
//! as `Change`s; the owner decides when to `flush` them to persistence.

use crate::error::{MapError, PersistenceError};
use crate::geometry::{CanvasConfig, Viewport, is_connection_in_viewport, is_element_in_viewport};
use crate::id::{BlockId, ConnectionId, PageId};
use crate::model::{
    Block, BlockContent, Connection, ConnectionKind, ConnectionTarget, Page, Rect, Section,
};
use crate::persistence::{MapPersistence, PageData};
use crate::surface::snap_rect;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Connections removed together with a block.
pub type Cascade = SmallVec<[Connection; 4]>;

/// A record the persistence collaborator has not seen yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    /// Block created or edited: upsert the whole record.
    BlockSaved(BlockId),
    /// Only the rectangle changed.
    BlockMoved(BlockId),
    BlockDeleted(BlockId),
    ConnectionSaved(ConnectionId),
    ConnectionDeleted(ConnectionId),
    /// Grid settings of the loaded page.
    PageSettingsChanged(PageId),
}

/// Transient block positions that win over stored ones while non-empty.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PositionOverlay {
    positions: HashMap<BlockId, (f32, f32)>,
}

impl PositionOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, block: BlockId, x: f32, y: f32) {
        self.positions.insert(block, (x, y));
    }

    pub fn get(&self, block: BlockId) -> Option<(f32, f32)> {
        self.positions.get(&block).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn clear(&mut self) {
        self.positions.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (BlockId, (f32, f32))> + '_ {
        self.positions.iter().map(|(id, pos)| (*id, *pos))
    }

    /// The block's rectangle with the overlay applied.
    pub fn rect_of(&self, block: &Block) -> Rect {
        match self.get(block.id) {
            Some((x, y)) => block.rect.with_origin(x, y),
            None => block.rect,
        }
    }
}

/// A block that survived culling, with its current rectangle.
#[derive(Debug, Clone, Copy)]
pub struct VisibleBlock<'a> {
    pub block: &'a Block,
    pub rect: Rect,
}

/// Appearance fields of a connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionStyle {
    pub kind: ConnectionKind,
    pub color: String,
    pub stroke_width: f32,
    pub label: Option<String>,
}

impl ConnectionStyle {
    pub fn of(connection: &Connection) -> Self {
        Self {
            kind: connection.kind,
            color: connection.color.clone(),
            stroke_width: connection.stroke_width,
            label: connection.label.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ElementStore {
    page: Page,
    sections: Vec<Section>,
    /// Paint order: ascending `z_index`.
    blocks: Vec<Block>,
    block_index: HashMap<BlockId, usize>,
    connections: Vec<Connection>,
    changes: Vec<Change>,
    config: CanvasConfig,
}

impl ElementStore {
    pub fn new(page: Page) -> Self {
        Self::with_config(page, CanvasConfig::default())
    }

    pub fn with_config(page: Page, config: CanvasConfig) -> Self {
        Self {
            page,
            sections: Vec::new(),
            blocks: Vec::new(),
            block_index: HashMap::new(),
            connections: Vec::new(),
            changes: Vec::new(),
            config,
        }
    }

    /// Build a store from a loaded page. Records that belong to another page,
    /// and connections whose blocks are missing, are dropped with a warning.
    pub fn from_page_data(data: PageData, config: CanvasConfig) -> Self {
        let mut store = Self::with_config(data.page, config);
        let page_id = store.page.id;
        store.sections = data.sections;
        store.sections.sort_by_key(|s| s.order);
        store.blocks = data
            .blocks
            .into_iter()
            .filter(|b| {
                let ours = b.page_id == page_id;
                if !ours {
                    log::warn!("dropping block {} from page {}", b.id, b.page_id);
                }
                ours
            })
            .collect();
        store.blocks.sort_by_key(|b| b.z_index);
        store.reindex();
        let connections: Vec<Connection> = data
            .connections
            .into_iter()
            .filter(|c| {
                let ok = c.page_id == page_id && store.validate_endpoints(c).is_ok();
                if !ok {
                    log::warn!("dropping dangling connection {}", c.id);
                }
                ok
            })
            .collect();
        store.connections = connections;
        log::debug!(
            "loaded page {} ({} blocks, {} connections)",
            page_id,
            store.blocks.len(),
            store.connections.len()
        );
        store
    }

    // ─── Read ────────────────────────────────────────────────────────────

    pub fn page(&self) -> &Page {
        &self.page
    }

    pub fn page_id(&self) -> PageId {
        self.page.id
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// All blocks in paint order.
    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.block_index.get(&id).map(|&i| &self.blocks[i])
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn contains_block(&self, id: BlockId) -> bool {
        self.block_index.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Current rectangle of a block, overlay first.
    pub fn current_rect(&self, id: BlockId, overlay: &PositionOverlay) -> Option<Rect> {
        self.block(id).map(|b| overlay.rect_of(b))
    }

    /// Blocks overlapping the buffered viewport, in paint order.
    pub fn list_visible_blocks(
        &self,
        viewport: &Viewport,
        overlay: &PositionOverlay,
    ) -> Vec<VisibleBlock<'_>> {
        self.blocks
            .iter()
            .map(|block| VisibleBlock {
                block,
                rect: overlay.rect_of(block),
            })
            .filter(|v| is_element_in_viewport(&v.rect, viewport, self.config.cull_buffer))
            .collect()
    }

    pub fn list_visible_connections(
        &self,
        viewport: &Viewport,
        overlay: &PositionOverlay,
    ) -> Vec<&Connection> {
        let rect_of = |id: BlockId| self.current_rect(id, overlay);
        self.connections
            .iter()
            .filter(|c| is_connection_in_viewport(c, rect_of, viewport, self.config.cull_buffer))
            .collect()
    }

    /// Union of every block's stored rectangle.
    pub fn content_bounds(&self) -> Option<Rect> {
        Rect::union_all(self.blocks.iter().map(|b| b.rect))
    }

    pub fn connections_of(&self, block: BlockId) -> impl Iterator<Item = &Connection> + '_ {
        self.connections.iter().filter(move |c| c.references(block))
    }

    // ─── Blocks ──────────────────────────────────────────────────────────

    /// Create a block with a fresh id on top of the paint order.
    pub fn create_block(&mut self, content: BlockContent, rect: Rect) -> Result<BlockId, MapError> {
        validate_rect(rect)?;
        let rect = self.maybe_snap(rect, &content);
        let block = Block {
            id: BlockId::fresh(),
            page_id: self.page.id,
            section_id: None,
            rect,
            z_index: self.next_z(),
            content,
        };
        let id = block.id;
        log::debug!("create block {id} ({:?})", block.kind());
        self.push_block(block);
        self.mark(Change::BlockSaved(id));
        Ok(id)
    }

    /// Insert a fully formed block, keeping its id and z-index.
    pub fn insert_block(&mut self, block: Block) -> Result<(), MapError> {
        if block.page_id != self.page.id {
            return Err(MapError::ForeignBlock {
                block: block.id,
                page: block.page_id,
            });
        }
        validate_rect(block.rect)?;
        let id = block.id;
        if let Some(&i) = self.block_index.get(&id) {
            self.blocks[i] = block;
            self.sort_paint_order();
        } else {
            self.push_block(block);
        }
        self.mark(Change::BlockSaved(id));
        Ok(())
    }

    pub fn move_block(&mut self, id: BlockId, x: f32, y: f32) -> Result<(), MapError> {
        self.commit_moves(&[(id, x, y)]).map(drop)
    }

    /// Apply many moves as one batch. Either every move applies or none does.
    ///
    /// With snapping on, the first block snaps and the rest follow by the
    /// same offset, so the group keeps its shape. Returns the origins that
    /// were actually applied.
    pub fn commit_moves(
        &mut self,
        moves: &[(BlockId, f32, f32)],
    ) -> Result<Vec<(BlockId, f32, f32)>, MapError> {
        let (dx, dy) = match moves.first() {
            Some(&(id, x, y)) => {
                let block = self.block(id).ok_or(MapError::BlockNotFound { block: id })?;
                let moved = block.rect.with_origin(x, y);
                let snapped = self.maybe_snap(moved, &block.content);
                (snapped.x - moved.x, snapped.y - moved.y)
            }
            None => (0.0, 0.0),
        };
        let applied: Vec<_> = moves.iter().map(|&(id, x, y)| (id, x + dx, y + dy)).collect();
        self.place_blocks(&applied)?;
        Ok(applied)
    }

    /// Set block origins exactly, without snapping. All or nothing.
    pub fn place_blocks(&mut self, moves: &[(BlockId, f32, f32)]) -> Result<(), MapError> {
        for &(id, x, y) in moves {
            let block = self.block(id).ok_or(MapError::BlockNotFound { block: id })?;
            validate_rect(block.rect.with_origin(x, y))?;
        }
        for &(id, x, y) in moves {
            if let Some(&i) = self.block_index.get(&id) {
                self.blocks[i].rect = self.blocks[i].rect.with_origin(x, y);
            }
            self.mark(Change::BlockMoved(id));
        }
        log::debug!("placed {} blocks", moves.len());
        Ok(())
    }

    /// Set position and size. Rejects non-finite values and sizes below the
    /// block's minimum.
    pub fn resize_block(&mut self, id: BlockId, rect: Rect) -> Result<(), MapError> {
        let i = *self
            .block_index
            .get(&id)
            .ok_or(MapError::BlockNotFound { block: id })?;
        validate_rect(rect)?;
        let (min_w, min_h) = self.blocks[i].kind().min_size();
        if rect.width < min_w || rect.height < min_h {
            log::warn!("rejected resize of {id} below minimum {min_w}x{min_h}");
            return Err(invalid(rect));
        }
        self.blocks[i].rect = rect;
        self.mark(Change::BlockMoved(id));
        Ok(())
    }

    /// Replace a block's content. Returns the previous content.
    pub fn update_content(
        &mut self,
        id: BlockId,
        content: BlockContent,
    ) -> Result<BlockContent, MapError> {
        let i = *self
            .block_index
            .get(&id)
            .ok_or(MapError::BlockNotFound { block: id })?;
        let previous = std::mem::replace(&mut self.blocks[i].content, content);
        self.mark(Change::BlockSaved(id));
        Ok(previous)
    }

    /// Delete a block and every connection referencing it.
    pub fn delete_block(&mut self, id: BlockId) -> Result<(Block, Cascade), MapError> {
        let i = *self
            .block_index
            .get(&id)
            .ok_or(MapError::BlockNotFound { block: id })?;
        let block = self.blocks.remove(i);
        self.reindex();
        let (cascade, kept): (Vec<Connection>, Vec<Connection>) = std::mem::take(&mut self.connections)
            .into_iter()
            .partition(|c| c.references(id));
        self.connections = kept;
        log::debug!("delete block {id} (+{} connections)", cascade.len());
        // Persistence cascades connections itself
        self.mark(Change::BlockDeleted(id));
        Ok((block, cascade.into_iter().collect()))
    }

    // ─── Connections ─────────────────────────────────────────────────────

    /// Connect `from` to a block or free point on this page.
    pub fn create_connection(
        &mut self,
        from: BlockId,
        target: ConnectionTarget,
    ) -> Result<ConnectionId, MapError> {
        let connection = Connection::new(self.page.id, from, target);
        let id = connection.id;
        self.insert_connection(connection)?;
        Ok(id)
    }

    /// Insert a fully formed connection after checking its endpoints.
    pub fn insert_connection(&mut self, connection: Connection) -> Result<(), MapError> {
        if connection.page_id != self.page.id {
            return Err(MapError::ForeignBlock {
                block: connection.from_block_id,
                page: connection.page_id,
            });
        }
        self.validate_endpoints(&connection)?;
        let id = connection.id;
        self.connections.retain(|c| c.id != id);
        self.connections.push(connection);
        self.mark(Change::ConnectionSaved(id));
        Ok(())
    }

    /// Change appearance. Returns the previous style.
    pub fn restyle_connection(
        &mut self,
        id: ConnectionId,
        style: ConnectionStyle,
    ) -> Result<ConnectionStyle, MapError> {
        let conn = self
            .connections
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(MapError::ConnectionNotFound { connection: id })?;
        if !style.stroke_width.is_finite() || style.stroke_width < 0.0 {
            return Err(MapError::InvalidGeometry {
                x: 0.0,
                y: 0.0,
                width: style.stroke_width,
                height: 0.0,
            });
        }
        let previous = ConnectionStyle::of(conn);
        conn.kind = style.kind;
        conn.color = style.color;
        conn.stroke_width = style.stroke_width;
        conn.label = style.label;
        self.mark(Change::ConnectionSaved(id));
        Ok(previous)
    }

    pub fn delete_connection(&mut self, id: ConnectionId) -> Result<Connection, MapError> {
        let i = self
            .connections
            .iter()
            .position(|c| c.id == id)
            .ok_or(MapError::ConnectionNotFound { connection: id })?;
        let removed = self.connections.remove(i);
        self.mark(Change::ConnectionDeleted(id));
        Ok(removed)
    }

    // ─── Page-wide ───────────────────────────────────────────────────────

    /// Delete every block and connection on the page. `confirmed` must name
    /// this page, as given by the confirmation dialog.
    pub fn clear_area(&mut self, confirmed: PageId) -> Result<(Vec<Block>, Vec<Connection>), MapError> {
        if confirmed != self.page.id {
            log::warn!("clear_area confirmed for {confirmed}, current page is {}", self.page.id);
            return Err(MapError::ConfirmationMismatch {
                expected: self.page.id,
                confirmed,
            });
        }
        let blocks = std::mem::take(&mut self.blocks);
        let connections = std::mem::take(&mut self.connections);
        self.block_index.clear();
        for b in &blocks {
            self.mark(Change::BlockDeleted(b.id));
        }
        log::debug!("cleared page {} ({} blocks)", self.page.id, blocks.len());
        Ok((blocks, connections))
    }

    pub fn set_grid(&mut self, enabled: bool, size: f32) -> Result<(), MapError> {
        if !size.is_finite() || size <= 0.0 {
            return Err(MapError::InvalidGeometry {
                x: 0.0,
                y: 0.0,
                width: size,
                height: size,
            });
        }
        self.page.grid.enabled = enabled;
        self.page.grid.size = size;
        self.mark(Change::PageSettingsChanged(self.page.id));
        Ok(())
    }

    pub fn set_snap_to_grid(&mut self, snap: bool) {
        self.config.snap_to_grid = snap;
    }

    // ─── Z-order ─────────────────────────────────────────────────────────

    /// Move one step up in paint order. Returns false when already on top.
    pub fn bring_forward(&mut self, id: BlockId) -> Result<bool, MapError> {
        let i = self.position_of(id)?;
        if i + 1 >= self.blocks.len() {
            return Ok(false);
        }
        self.blocks.swap(i, i + 1);
        self.renumber_z();
        Ok(true)
    }

    pub fn send_backward(&mut self, id: BlockId) -> Result<bool, MapError> {
        let i = self.position_of(id)?;
        if i == 0 {
            return Ok(false);
        }
        self.blocks.swap(i, i - 1);
        self.renumber_z();
        Ok(true)
    }

    pub fn bring_to_front(&mut self, id: BlockId) -> Result<bool, MapError> {
        let i = self.position_of(id)?;
        if i + 1 >= self.blocks.len() {
            return Ok(false);
        }
        let block = self.blocks.remove(i);
        self.blocks.push(block);
        self.renumber_z();
        Ok(true)
    }

    pub fn send_to_back(&mut self, id: BlockId) -> Result<bool, MapError> {
        let i = self.position_of(id)?;
        if i == 0 {
            return Ok(false);
        }
        let block = self.blocks.remove(i);
        self.blocks.insert(0, block);
        self.renumber_z();
        Ok(true)
    }

    // ─── Dirty tracking ──────────────────────────────────────────────────

    pub fn is_dirty(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn pending_changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.changes)
    }

    /// Push pending changes to `backend`, oldest first. On failure the
    /// failed change and everything after it stay pending.
    pub fn flush(&mut self, backend: &mut dyn MapPersistence) -> Result<usize, MapError> {
        let changes = self.take_changes();
        for (n, change) in changes.iter().enumerate() {
            if let Err(err) = self.flush_one(*change, backend) {
                log::warn!("flush stopped at {change:?}: {err}");
                self.changes = changes[n..].to_vec();
                return Err(err.into());
            }
        }
        Ok(changes.len())
    }

    fn flush_one(
        &self,
        change: Change,
        backend: &mut dyn MapPersistence,
    ) -> Result<(), PersistenceError> {
        match change {
            Change::BlockSaved(id) => match self.block(id) {
                Some(block) => backend.save_block(block),
                None => Ok(()),
            },
            Change::BlockMoved(id) => match self.block(id) {
                Some(block) => backend.save_block_position(id, block.rect),
                None => Ok(()),
            },
            Change::BlockDeleted(id) => tolerate_missing(backend.delete_block(id)),
            Change::ConnectionSaved(id) => match self.connection(id) {
                Some(conn) => backend.create_connection(conn),
                None => Ok(()),
            },
            Change::ConnectionDeleted(id) => tolerate_missing(backend.delete_connection(id)),
            Change::PageSettingsChanged(page) => backend.save_page_settings(page, self.page.grid),
        }
    }

    // ─── Internals ───────────────────────────────────────────────────────

    fn mark(&mut self, change: Change) {
        if self.changes.last() != Some(&change) {
            self.changes.push(change);
        }
    }

    fn validate_endpoints(&self, connection: &Connection) -> Result<(), MapError> {
        let endpoints = std::iter::once(connection.from_block_id).chain(connection.target.block());
        for id in endpoints {
            let block = self.block(id).ok_or(MapError::BlockNotFound { block: id })?;
            if block.page_id != connection.page_id {
                return Err(MapError::ForeignBlock {
                    block: id,
                    page: block.page_id,
                });
            }
        }
        if let ConnectionTarget::Point { to_x, to_y } = connection.target
            && !(to_x.is_finite() && to_y.is_finite())
        {
            return Err(MapError::InvalidGeometry {
                x: to_x,
                y: to_y,
                width: 0.0,
                height: 0.0,
            });
        }
        Ok(())
    }

    fn maybe_snap(&self, rect: Rect, content: &BlockContent) -> Rect {
        if self.config.snap_to_grid && self.page.grid.enabled {
            snap_rect(rect, content.kind().category(), self.page.grid.size)
        } else {
            rect
        }
    }

    fn next_z(&self) -> i32 {
        self.blocks.last().map_or(0, |b| b.z_index + 1)
    }

    fn push_block(&mut self, block: Block) {
        let on_top = self
            .blocks
            .last()
            .is_none_or(|last| last.z_index <= block.z_index);
        self.blocks.push(block);
        if on_top {
            if let Some(last) = self.blocks.last() {
                self.block_index.insert(last.id, self.blocks.len() - 1);
            }
        } else {
            self.sort_paint_order();
        }
    }

    fn sort_paint_order(&mut self) {
        self.blocks.sort_by_key(|b| b.z_index);
        self.reindex();
    }

    fn reindex(&mut self) {
        self.block_index = self
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id, i))
            .collect();
    }

    fn position_of(&self, id: BlockId) -> Result<usize, MapError> {
        self.block_index
            .get(&id)
            .copied()
            .ok_or(MapError::BlockNotFound { block: id })
    }

    fn renumber_z(&mut self) {
        let mut changed = Vec::new();
        for (i, block) in self.blocks.iter_mut().enumerate() {
            let z = i as i32;
            if block.z_index != z {
                block.z_index = z;
                changed.push(block.id);
            }
        }
        self.reindex();
        for id in changed {
            self.mark(Change::BlockSaved(id));
        }
    }
}

fn tolerate_missing(result: Result<(), PersistenceError>) -> Result<(), PersistenceError> {
    match result {
        Err(PersistenceError::NotFound { .. }) => Ok(()),
        other => other,
    }
}

fn invalid(rect: Rect) -> MapError {
    MapError::InvalidGeometry {
        x: rect.x,
        y: rect.y,
        width: rect.width,
        height: rect.height,
    }
}

fn validate_rect(rect: Rect) -> Result<(), MapError> {
    if rect.is_valid() {
        Ok(())
    } else {
        log::warn!("rejected invalid geometry {rect:?}");
        Err(invalid(rect))
    }
}
