//! Journaling persistence for the webview host.
//!
//! The real store lives on the JS side and is asynchronous, so the engine
//! cannot call it directly. `JournalBackend` keeps an in-memory mirror for
//! reads and records every write as a `PersistOp`. The host drains the
//! journal after a flush and applies it to its own store at its own pace.

use pmap_core::model::{
    Block, BlockContent, Connection, GridSettings, Group, Page, Rect, Section,
};
use pmap_core::{
    BlockId, ConnectionId, GroupId, InMemoryPersistence, MapPersistence, NewBlock, NewPage,
    PageData, PageId, PersistenceError, PortalLink, SectionId,
};
use serde::Serialize;

/// One write the host must replay against its store.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum PersistOp {
    CreateGroup { group: Group },
    CreatePage { page: Page },
    CreateSection { section: Section },
    CreateBlock { block: Block },
    #[serde(rename_all = "camelCase")]
    SavePageSettings { page_id: PageId, grid: GridSettings },
    SaveBlock { block: Block },
    #[serde(rename_all = "camelCase")]
    SaveBlockPosition { block_id: BlockId, rect: Rect },
    #[serde(rename_all = "camelCase")]
    UpdateBlockContent { block_id: BlockId, content: BlockContent },
    #[serde(rename_all = "camelCase")]
    DeleteBlock { block_id: BlockId },
    CreateConnection { connection: Connection },
    #[serde(rename_all = "camelCase")]
    DeleteConnection { connection_id: ConnectionId },
}

#[derive(Debug, Default)]
pub struct JournalBackend {
    mirror: InMemoryPersistence,
    ops: Vec<PersistOp>,
}

impl JournalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mirror(&self) -> &InMemoryPersistence {
        &self.mirror
    }

    /// Load records the host already has. Nothing is journaled.
    pub fn seed(&mut self, groups: Vec<Group>, pages: Vec<Page>, content: Vec<PageData>) {
        for group in groups {
            self.mirror.insert_group(group);
        }
        for page in pages {
            self.mirror.insert_page(page);
        }
        for data in content {
            self.mirror.seed(data);
        }
    }

    pub fn pending(&self) -> usize {
        self.ops.len()
    }

    pub fn drain(&mut self) -> Vec<PersistOp> {
        std::mem::take(&mut self.ops)
    }

    fn created<T: Clone>(
        &self,
        found: Option<&T>,
        kind: &str,
        id: impl std::fmt::Display,
    ) -> Result<T, PersistenceError> {
        found
            .cloned()
            .ok_or_else(|| PersistenceError::Backend(format!("{kind} {id} vanished after creation")))
    }
}

impl MapPersistence for JournalBackend {
    fn load_pages(&self) -> Result<Vec<Page>, PersistenceError> {
        self.mirror.load_pages()
    }

    fn load_page(&self, page: PageId) -> Result<PageData, PersistenceError> {
        self.mirror.load_page(page)
    }

    fn load_portals(&self) -> Result<Vec<PortalLink>, PersistenceError> {
        self.mirror.load_portals()
    }

    fn create_group(&mut self, name: &str, order: u32) -> Result<GroupId, PersistenceError> {
        let id = self.mirror.create_group(name, order)?;
        let group = self.created(self.mirror.groups().iter().find(|g| g.id == id), "group", id)?;
        self.ops.push(PersistOp::CreateGroup { group });
        Ok(id)
    }

    fn create_page(&mut self, page: NewPage) -> Result<PageId, PersistenceError> {
        let id = self.mirror.create_page(page)?;
        let page = self.created(self.mirror.pages().iter().find(|p| p.id == id), "page", id)?;
        self.ops.push(PersistOp::CreatePage { page });
        Ok(id)
    }

    fn create_section(
        &mut self,
        page: PageId,
        title: &str,
        order: u32,
    ) -> Result<SectionId, PersistenceError> {
        let id = self.mirror.create_section(page, title, order)?;
        let section = self.created(
            self.mirror.sections().iter().find(|s| s.id == id),
            "section",
            id,
        )?;
        self.ops.push(PersistOp::CreateSection { section });
        Ok(id)
    }

    fn create_block(&mut self, block: NewBlock) -> Result<BlockId, PersistenceError> {
        let id = self.mirror.create_block(block)?;
        let block = self.created(self.mirror.block(id), "block", id)?;
        self.ops.push(PersistOp::CreateBlock { block });
        Ok(id)
    }

    fn save_page_settings(&mut self, page: PageId, grid: GridSettings) -> Result<(), PersistenceError> {
        self.mirror.save_page_settings(page, grid)?;
        self.ops.push(PersistOp::SavePageSettings {
            page_id: page,
            grid,
        });
        Ok(())
    }

    fn save_block(&mut self, block: &Block) -> Result<(), PersistenceError> {
        self.mirror.save_block(block)?;
        self.ops.push(PersistOp::SaveBlock {
            block: block.clone(),
        });
        Ok(())
    }

    fn save_block_position(&mut self, block: BlockId, rect: Rect) -> Result<(), PersistenceError> {
        self.mirror.save_block_position(block, rect)?;
        self.ops.push(PersistOp::SaveBlockPosition {
            block_id: block,
            rect,
        });
        Ok(())
    }

    fn update_block_content(
        &mut self,
        block: BlockId,
        content: &BlockContent,
    ) -> Result<(), PersistenceError> {
        self.mirror.update_block_content(block, content)?;
        self.ops.push(PersistOp::UpdateBlockContent {
            block_id: block,
            content: content.clone(),
        });
        Ok(())
    }

    fn delete_block(&mut self, block: BlockId) -> Result<(), PersistenceError> {
        self.mirror.delete_block(block)?;
        self.ops.push(PersistOp::DeleteBlock { block_id: block });
        Ok(())
    }

    fn create_connection(&mut self, connection: &Connection) -> Result<(), PersistenceError> {
        self.mirror.create_connection(connection)?;
        self.ops.push(PersistOp::CreateConnection {
            connection: connection.clone(),
        });
        Ok(())
    }

    fn delete_connection(&mut self, connection: ConnectionId) -> Result<(), PersistenceError> {
        self.mirror.delete_connection(connection)?;
        self.ops.push(PersistOp::DeleteConnection {
            connection_id: connection,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_are_journaled_in_order() {
        let mut journal = JournalBackend::new();
        let page = journal
            .create_page(NewPage {
                name: "Overview".into(),
                group_id: None,
                parent_id: None,
                order: 0,
            })
            .unwrap();
        let block = journal
            .create_block(NewBlock {
                page_id: page,
                section_id: None,
                rect: Rect::new(0.0, 0.0, 100.0, 80.0),
                content: BlockContent::Paragraph { text: "hi".into() },
            })
            .unwrap();
        journal
            .save_block_position(block, Rect::new(40.0, 0.0, 100.0, 80.0))
            .unwrap();
        journal.delete_block(block).unwrap();

        let ops = journal.drain();
        assert_eq!(ops.len(), 4);
        assert!(matches!(ops[0], PersistOp::CreatePage { .. }));
        assert!(matches!(ops[1], PersistOp::CreateBlock { .. }));
        assert_eq!(
            ops[2],
            PersistOp::SaveBlockPosition {
                block_id: block,
                rect: Rect::new(40.0, 0.0, 100.0, 80.0),
            }
        );
        assert_eq!(ops[3], PersistOp::DeleteBlock { block_id: block });
        assert_eq!(journal.pending(), 0);
    }

    #[test]
    fn failed_writes_are_not_journaled() {
        let mut journal = JournalBackend::new();
        let err = journal.delete_connection(ConnectionId::intern("journal-missing"));
        assert!(err.is_err());
        assert_eq!(journal.pending(), 0);
    }

    #[test]
    fn op_wire_format() {
        let op = PersistOp::DeleteBlock {
            block_id: BlockId::intern("journal-b1"),
        };
        let json = serde_json::to_value(&op).unwrap();
        assert_eq!(json, serde_json::json!({ "op": "deleteBlock", "blockId": "journal-b1" }));
    }

    #[test]
    fn grid_changes_are_journaled() {
        let mut journal = JournalBackend::new();
        let page = journal
            .create_page(NewPage {
                name: "Overview".into(),
                group_id: None,
                parent_id: None,
                order: 0,
            })
            .unwrap();
        journal.drain();

        let grid = GridSettings {
            enabled: false,
            size: 40.0,
        };
        journal.save_page_settings(page, grid).unwrap();
        assert_eq!(journal.mirror().load_page(page).unwrap().page.grid, grid);

        let json = serde_json::to_value(&journal.drain()[0]).unwrap();
        assert_eq!(json["op"], "savePageSettings");
        assert_eq!(json["grid"], serde_json::json!({ "enabled": false, "size": 40.0 }));
    }
}
