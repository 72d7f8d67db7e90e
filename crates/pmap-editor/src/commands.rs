//! Page-scoped undo history.
//!
//! Every mutation is wrapped in a reversible `Command`. The inverse is
//! captured from the store right before the forward mutation applies, so
//! undo restores exactly what was there, cascaded connections included.
//!
//! The stack is page-scoped: the session clears it whenever the loaded
//! page changes.

use pmap_core::model::{Block, BlockContent, Connection, Rect};
use pmap_core::{BlockId, ConnectionId, ConnectionStyle, ElementStore, MapError};

/// A reversible edit to one page's element store.
#[derive(Debug, Clone, PartialEq)]
pub enum MapMutation {
    /// Set block origins, all or nothing.
    MoveBlocks { moves: Vec<(BlockId, f32, f32)> },
    ResizeBlock { id: BlockId, rect: Rect },
    /// Put a block back together with the connections it took with it.
    InsertBlock {
        block: Box<Block>,
        connections: Vec<Connection>,
    },
    DeleteBlock { id: BlockId },
    SetContent { id: BlockId, content: Box<BlockContent> },
    InsertConnection { connection: Box<Connection> },
    DeleteConnection { id: ConnectionId },
    RestyleConnection { id: ConnectionId, style: ConnectionStyle },
    /// Applied in order, undone in reverse.
    Batch(Vec<MapMutation>),
}

#[derive(Debug, Clone)]
pub struct Command {
    pub forward: MapMutation,
    pub inverse: MapMutation,
    pub description: String,
}

/// Undo and redo stacks for the loaded page.
pub struct CommandStack {
    undo_stack: Vec<Command>,
    redo_stack: Vec<Command>,
    /// Oldest steps fall off past this many.
    max_depth: usize,
}

impl CommandStack {
    pub fn new(max_depth: usize) -> Self {
        Self {
            undo_stack: Vec::with_capacity(max_depth),
            redo_stack: Vec::new(),
            max_depth,
        }
    }

    /// Apply `mutation` to the store and push it to the undo stack.
    pub fn execute(
        &mut self,
        store: &mut ElementStore,
        mutation: MapMutation,
        description: &str,
    ) -> Result<(), MapError> {
        let inverse = apply(store, &mutation)?;
        self.record(mutation, inverse, description);
        Ok(())
    }

    /// Push an edit that was already applied elsewhere (a drag commit).
    pub fn record(&mut self, forward: MapMutation, inverse: MapMutation, description: &str) {
        self.push(Command {
            forward,
            inverse,
            description: description.to_string(),
        });
    }

    /// Undo the last command. Returns its description.
    pub fn undo(&mut self, store: &mut ElementStore) -> Result<Option<String>, MapError> {
        let Some(cmd) = self.undo_stack.pop() else {
            return Ok(None);
        };
        if let Err(err) = apply(store, &cmd.inverse) {
            log::warn!("undo of '{}' failed: {err}", cmd.description);
            self.undo_stack.push(cmd);
            return Err(err);
        }
        let desc = cmd.description.clone();
        self.redo_stack.push(cmd);
        Ok(Some(desc))
    }

    /// Redo the last undone command. Returns its description.
    pub fn redo(&mut self, store: &mut ElementStore) -> Result<Option<String>, MapError> {
        let Some(cmd) = self.redo_stack.pop() else {
            return Ok(None);
        };
        if let Err(err) = apply(store, &cmd.forward) {
            log::warn!("redo of '{}' failed: {err}", cmd.description);
            self.redo_stack.push(cmd);
            return Err(err);
        }
        let desc = cmd.description.clone();
        self.undo_stack.push(cmd);
        Ok(Some(desc))
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<&str> {
        self.undo_stack.last().map(|c| c.description.as_str())
    }

    pub fn redo_description(&self) -> Option<&str> {
        self.redo_stack.last().map(|c| c.description.as_str())
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }

    fn push(&mut self, cmd: Command) {
        self.undo_stack.push(cmd);
        if self.undo_stack.len() > self.max_depth {
            self.undo_stack.remove(0);
        }
        // A fresh edit invalidates the redo branch
        self.redo_stack.clear();
    }
}

/// Apply `mutation`, returning the mutation that undoes it. A failing
/// batch rolls back the steps it already applied.
pub fn apply(store: &mut ElementStore, mutation: &MapMutation) -> Result<MapMutation, MapError> {
    match mutation {
        MapMutation::MoveBlocks { moves } => {
            let before = moves
                .iter()
                .map(|&(id, ..)| {
                    let b = store.block(id).ok_or(MapError::BlockNotFound { block: id })?;
                    Ok((id, b.rect.x, b.rect.y))
                })
                .collect::<Result<Vec<_>, MapError>>()?;
            store.place_blocks(moves)?;
            Ok(MapMutation::MoveBlocks { moves: before })
        }
        MapMutation::ResizeBlock { id, rect } => {
            let before = store
                .block(*id)
                .ok_or(MapError::BlockNotFound { block: *id })?
                .rect;
            store.resize_block(*id, *rect)?;
            Ok(MapMutation::ResizeBlock { id: *id, rect: before })
        }
        MapMutation::InsertBlock { block, connections } => {
            store.insert_block(block.as_ref().clone())?;
            for (n, conn) in connections.iter().enumerate() {
                if let Err(err) = store.insert_connection(conn.clone()) {
                    for inserted in &connections[..n] {
                        if let Err(rollback) = store.delete_connection(inserted.id) {
                            log::error!("rollback left connection {}: {rollback}", inserted.id);
                        }
                    }
                    if let Err(rollback) = store.delete_block(block.id) {
                        log::error!("rollback left block {}: {rollback}", block.id);
                    }
                    return Err(err);
                }
            }
            Ok(MapMutation::DeleteBlock { id: block.id })
        }
        MapMutation::DeleteBlock { id } => {
            let (block, cascade) = store.delete_block(*id)?;
            Ok(MapMutation::InsertBlock {
                block: Box::new(block),
                connections: cascade.into_vec(),
            })
        }
        MapMutation::SetContent { id, content } => {
            let before = store.update_content(*id, content.as_ref().clone())?;
            Ok(MapMutation::SetContent {
                id: *id,
                content: Box::new(before),
            })
        }
        MapMutation::InsertConnection { connection } => {
            store.insert_connection(connection.as_ref().clone())?;
            Ok(MapMutation::DeleteConnection { id: connection.id })
        }
        MapMutation::DeleteConnection { id } => {
            let removed = store.delete_connection(*id)?;
            Ok(MapMutation::InsertConnection {
                connection: Box::new(removed),
            })
        }
        MapMutation::RestyleConnection { id, style } => {
            let before = store.restyle_connection(*id, style.clone())?;
            Ok(MapMutation::RestyleConnection { id: *id, style: before })
        }
        MapMutation::Batch(steps) => {
            let mut inverses = Vec::with_capacity(steps.len());
            for step in steps {
                match apply(store, step) {
                    Ok(inverse) => inverses.push(inverse),
                    Err(err) => {
                        for inverse in inverses.iter().rev() {
                            if let Err(rollback) = apply(store, inverse) {
                                log::warn!("batch rollback step failed: {rollback}");
                            }
                        }
                        return Err(err);
                    }
                }
            }
            inverses.reverse();
            Ok(MapMutation::Batch(inverses))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmap_core::model::*;
    use pmap_core::PageId;

    fn store() -> ElementStore {
        ElementStore::new(Page {
            id: PageId::intern("cmd-page"),
            name: "Commands".into(),
            group_id: None,
            parent_id: None,
            order: 0,
            grid: GridSettings::default(),
        })
    }

    fn para(text: &str) -> BlockContent {
        BlockContent::Paragraph { text: text.into() }
    }

    #[test]
    fn move_round_trips_through_history() {
        let mut s = store();
        let a = s.create_block(para("a"), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let mut stack = CommandStack::new(50);
        stack
            .execute(&mut s, MapMutation::MoveBlocks { moves: vec![(a, 40.0, 60.0)] }, "move")
            .unwrap();
        assert_eq!(s.block(a).unwrap().rect.x, 40.0);

        assert_eq!(stack.undo(&mut s).unwrap().as_deref(), Some("move"));
        assert_eq!(s.block(a).unwrap().rect.x, 0.0);
        assert!(stack.can_redo());

        stack.redo(&mut s).unwrap();
        assert_eq!(s.block(a).unwrap().rect.y, 60.0);
        assert!(!stack.can_redo());
    }

    #[test]
    fn undo_delete_restores_cascade() {
        let mut s = store();
        let a = s.create_block(para("a"), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let b = s.create_block(para("b"), Rect::new(200.0, 0.0, 100.0, 100.0)).unwrap();
        let c = s
            .create_connection(a, ConnectionTarget::Block { to_block_id: b })
            .unwrap();
        let mut stack = CommandStack::new(50);
        stack
            .execute(&mut s, MapMutation::DeleteBlock { id: b }, "delete block")
            .unwrap();
        assert!(s.connection(c).is_none());

        stack.undo(&mut s).unwrap();
        assert!(s.block(b).is_some());
        assert!(s.connection(c).is_some());
    }

    #[test]
    fn batch_is_one_step() {
        let mut s = store();
        let a = s.create_block(para("a"), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let b = s.create_block(para("b"), Rect::new(200.0, 0.0, 100.0, 100.0)).unwrap();
        s.create_connection(a, ConnectionTarget::Block { to_block_id: b })
            .unwrap();
        let before_blocks = s.blocks().to_vec();
        let before_conns = s.connections().to_vec();

        let mut stack = CommandStack::new(50);
        let batch = MapMutation::Batch(vec![
            MapMutation::DeleteBlock { id: a },
            MapMutation::DeleteBlock { id: b },
        ]);
        stack.execute(&mut s, batch, "delete 2 blocks").unwrap();
        assert!(s.is_empty());
        assert_eq!(stack.undo_description(), Some("delete 2 blocks"));

        assert_eq!(stack.undo(&mut s).unwrap().as_deref(), Some("delete 2 blocks"));
        assert_eq!(stack.redo_description(), Some("delete 2 blocks"));
        assert!(!stack.can_undo());
        assert_eq!(s.blocks(), before_blocks.as_slice());
        assert_eq!(s.connections(), before_conns.as_slice());
    }

    #[test]
    fn failing_batch_rolls_back() {
        let mut s = store();
        let a = s.create_block(para("a"), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let ghost = BlockId::intern("cmd-ghost");
        let result = apply(
            &mut s,
            &MapMutation::Batch(vec![
                MapMutation::MoveBlocks { moves: vec![(a, 10.0, 10.0)] },
                MapMutation::DeleteBlock { id: ghost },
            ]),
        );
        assert!(matches!(result, Err(MapError::BlockNotFound { .. })));
        assert_eq!(s.block(a).unwrap().rect.x, 0.0);
    }

    #[test]
    fn failed_reinsert_leaves_no_partial_block() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut s = store();
        let a = s.create_block(para("a"), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let b = s.create_block(para("b"), Rect::new(200.0, 0.0, 100.0, 100.0)).unwrap();
        let kept = s
            .create_connection(a, ConnectionTarget::Block { to_block_id: b })
            .unwrap();
        let (block, mut cascade) = s.delete_block(b).unwrap();
        // Second connection points at a block that no longer exists
        let mut dangling = cascade[0].clone();
        dangling.id = ConnectionId::intern("cmd-dangling");
        dangling.from_block_id = BlockId::intern("cmd-gone");
        cascade.push(dangling);

        let result = apply(
            &mut s,
            &MapMutation::InsertBlock {
                block: Box::new(block),
                connections: cascade.into_vec(),
            },
        );
        assert!(matches!(result, Err(MapError::BlockNotFound { .. })));
        assert!(s.block(b).is_none());
        assert!(s.connection(kept).is_none());
        assert_eq!(s.connections().len(), 0);
    }

    #[test]
    fn undo_restores_exact_origin_with_snapping_on() {
        let mut s = store();
        let a = s.create_block(para("a"), Rect::new(7.0, 3.0, 100.0, 100.0)).unwrap();
        s.set_snap_to_grid(true);
        let mut stack = CommandStack::new(50);
        stack
            .execute(&mut s, MapMutation::MoveBlocks { moves: vec![(a, 40.0, 60.0)] }, "move")
            .unwrap();
        stack.undo(&mut s).unwrap();
        let rect = s.block(a).unwrap().rect;
        assert_eq!((rect.x, rect.y), (7.0, 3.0));
    }

    #[test]
    fn content_edit_and_depth_limit() {
        let mut s = store();
        let a = s.create_block(para("v0"), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let mut stack = CommandStack::new(2);
        for n in 1..=3 {
            stack
                .execute(
                    &mut s,
                    MapMutation::SetContent {
                        id: a,
                        content: Box::new(para(&format!("v{n}"))),
                    },
                    "edit",
                )
                .unwrap();
        }
        stack.undo(&mut s).unwrap();
        stack.undo(&mut s).unwrap();
        assert_eq!(stack.undo(&mut s).unwrap(), None);
        assert_eq!(s.block(a).unwrap().content, para("v1"));
    }

    #[test]
    fn new_action_clears_redo() {
        let mut s = store();
        let a = s.create_block(para("a"), Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();
        let mut stack = CommandStack::new(50);
        stack
            .execute(&mut s, MapMutation::ResizeBlock { id: a, rect: Rect::new(0.0, 0.0, 200.0, 120.0) }, "resize")
            .unwrap();
        stack.undo(&mut s).unwrap();
        assert!(stack.can_redo());
        stack
            .execute(&mut s, MapMutation::MoveBlocks { moves: vec![(a, 5.0, 5.0)] }, "move")
            .unwrap();
        assert!(!stack.can_redo());
        assert_eq!(s.block(a).unwrap().rect.width, 100.0);
    }
}
