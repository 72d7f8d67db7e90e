//! The persistence collaborator.
//!
//! The engine never decides when or how records are stored. It talks to
//! whatever backend the host provides through `MapPersistence`, and ships
//! `InMemoryPersistence` as the reference backend used by tests and by
//! hosts that keep everything in memory.

use crate::error::{PersistenceError, RecordKind};
use crate::id::{BlockId, ConnectionId, GroupId, PageId, SectionId};
use crate::model::{Block, BlockContent, Connection, GridSettings, Group, Page, Rect, Section};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Everything stored for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    pub page: Page,
    pub blocks: Vec<Block>,
    pub connections: Vec<Connection>,
    pub sections: Vec<Section>,
}

/// A stored navigator block and the page it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortalLink {
    pub page: PageId,
    pub block: BlockId,
    pub target: PageId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPage {
    pub name: String,
    pub group_id: Option<GroupId>,
    pub parent_id: Option<PageId>,
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewBlock {
    pub page_id: PageId,
    pub section_id: Option<SectionId>,
    pub rect: Rect,
    pub content: BlockContent,
}

/// Storage backend for map records. Creation calls assign ids.
pub trait MapPersistence {
    fn load_pages(&self) -> Result<Vec<Page>, PersistenceError>;
    fn load_page(&self, page: PageId) -> Result<PageData, PersistenceError>;

    /// Every linked navigator block across all pages.
    ///
    /// The default walks `load_pages` and `load_page`; backends with an
    /// index should answer directly.
    fn load_portals(&self) -> Result<Vec<PortalLink>, PersistenceError> {
        let mut portals = Vec::new();
        for page in self.load_pages()? {
            let data = self.load_page(page.id)?;
            portals.extend(data.blocks.iter().filter_map(|b| {
                b.content.portal_target().map(|target| PortalLink {
                    page: page.id,
                    block: b.id,
                    target,
                })
            }));
        }
        Ok(portals)
    }

    fn create_group(&mut self, name: &str, order: u32) -> Result<GroupId, PersistenceError>;
    fn create_page(&mut self, page: NewPage) -> Result<PageId, PersistenceError>;
    fn create_section(
        &mut self,
        page: PageId,
        title: &str,
        order: u32,
    ) -> Result<SectionId, PersistenceError>;
    fn create_block(&mut self, block: NewBlock) -> Result<BlockId, PersistenceError>;

    fn save_page_settings(&mut self, page: PageId, grid: GridSettings) -> Result<(), PersistenceError>;

    /// Insert or replace a block created or edited on the canvas.
    fn save_block(&mut self, block: &Block) -> Result<(), PersistenceError>;
    fn save_block_position(&mut self, block: BlockId, rect: Rect) -> Result<(), PersistenceError>;
    fn update_block_content(
        &mut self,
        block: BlockId,
        content: &BlockContent,
    ) -> Result<(), PersistenceError>;
    /// Delete a block and every connection referencing it.
    fn delete_block(&mut self, block: BlockId) -> Result<(), PersistenceError>;

    fn create_connection(&mut self, connection: &Connection) -> Result<(), PersistenceError>;
    fn delete_connection(&mut self, connection: ConnectionId) -> Result<(), PersistenceError>;
}

/// Reference backend: plain maps, insertion order kept per table.
#[derive(Debug, Default, Clone)]
pub struct InMemoryPersistence {
    groups: Vec<Group>,
    pages: Vec<Page>,
    sections: Vec<Section>,
    blocks: Vec<Block>,
    connections: Vec<Connection>,
    block_index: HashMap<BlockId, usize>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.block_index.get(&id).map(|&i| &self.blocks[i])
    }

    /// Seed a page directly, bypassing id assignment.
    pub fn insert_page(&mut self, page: Page) {
        self.pages.retain(|p| p.id != page.id);
        self.pages.push(page);
    }

    pub fn insert_group(&mut self, group: Group) {
        self.groups.retain(|g| g.id != group.id);
        self.groups.push(group);
    }

    /// Seed everything stored for one page, replacing what was there.
    pub fn seed(&mut self, data: PageData) {
        let page = data.page.id;
        self.insert_page(data.page);
        self.sections.retain(|s| s.page_id != page);
        self.sections.extend(data.sections);
        self.blocks.retain(|b| b.page_id != page);
        self.blocks.extend(data.blocks);
        self.reindex_blocks();
        self.connections.retain(|c| c.page_id != page);
        self.connections.extend(data.connections);
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block, PersistenceError> {
        match self.block_index.get(&id) {
            Some(&i) => Ok(&mut self.blocks[i]),
            None => Err(not_found(RecordKind::Block, id)),
        }
    }

    fn reindex_blocks(&mut self) {
        self.block_index = self
            .blocks
            .iter()
            .enumerate()
            .map(|(i, b)| (b.id, i))
            .collect();
    }
}

fn not_found(kind: RecordKind, id: impl std::fmt::Display) -> PersistenceError {
    PersistenceError::NotFound {
        kind,
        id: id.to_string(),
    }
}

impl MapPersistence for InMemoryPersistence {
    fn load_pages(&self) -> Result<Vec<Page>, PersistenceError> {
        Ok(self.pages.clone())
    }

    fn load_page(&self, page: PageId) -> Result<PageData, PersistenceError> {
        let record = self
            .pages
            .iter()
            .find(|p| p.id == page)
            .cloned()
            .ok_or_else(|| not_found(RecordKind::Page, page))?;
        Ok(PageData {
            page: record,
            blocks: self
                .blocks
                .iter()
                .filter(|b| b.page_id == page)
                .cloned()
                .collect(),
            connections: self
                .connections
                .iter()
                .filter(|c| c.page_id == page)
                .cloned()
                .collect(),
            sections: self
                .sections
                .iter()
                .filter(|s| s.page_id == page)
                .cloned()
                .collect(),
        })
    }

    fn load_portals(&self) -> Result<Vec<PortalLink>, PersistenceError> {
        Ok(self
            .blocks
            .iter()
            .filter_map(|b| {
                b.content.portal_target().map(|target| PortalLink {
                    page: b.page_id,
                    block: b.id,
                    target,
                })
            })
            .collect())
    }

    fn create_group(&mut self, name: &str, order: u32) -> Result<GroupId, PersistenceError> {
        let id = GroupId::fresh();
        self.groups.push(Group {
            id,
            name: name.to_string(),
            order,
        });
        Ok(id)
    }

    fn create_page(&mut self, page: NewPage) -> Result<PageId, PersistenceError> {
        if let Some(group) = page.group_id
            && !self.groups.iter().any(|g| g.id == group)
        {
            return Err(not_found(RecordKind::Group, group));
        }
        let id = PageId::fresh();
        self.pages.push(Page {
            id,
            name: page.name,
            group_id: page.group_id,
            parent_id: page.parent_id,
            order: page.order,
            grid: GridSettings::default(),
        });
        Ok(id)
    }

    fn create_section(
        &mut self,
        page: PageId,
        title: &str,
        order: u32,
    ) -> Result<SectionId, PersistenceError> {
        if !self.pages.iter().any(|p| p.id == page) {
            return Err(not_found(RecordKind::Page, page));
        }
        let id = SectionId::fresh();
        self.sections.push(Section {
            id,
            page_id: page,
            title: title.to_string(),
            order,
        });
        Ok(id)
    }

    fn create_block(&mut self, block: NewBlock) -> Result<BlockId, PersistenceError> {
        if !self.pages.iter().any(|p| p.id == block.page_id) {
            return Err(not_found(RecordKind::Page, block.page_id));
        }
        let id = BlockId::fresh();
        let z_index = self
            .blocks
            .iter()
            .filter(|b| b.page_id == block.page_id)
            .count() as i32;
        self.block_index.insert(id, self.blocks.len());
        self.blocks.push(Block {
            id,
            page_id: block.page_id,
            section_id: block.section_id,
            rect: block.rect,
            z_index,
            content: block.content,
        });
        Ok(id)
    }

    fn save_page_settings(&mut self, page: PageId, grid: GridSettings) -> Result<(), PersistenceError> {
        match self.pages.iter_mut().find(|p| p.id == page) {
            Some(record) => {
                record.grid = grid;
                Ok(())
            }
            None => Err(not_found(RecordKind::Page, page)),
        }
    }

    fn save_block(&mut self, block: &Block) -> Result<(), PersistenceError> {
        match self.block_index.get(&block.id) {
            Some(&i) => self.blocks[i] = block.clone(),
            None => {
                self.block_index.insert(block.id, self.blocks.len());
                self.blocks.push(block.clone());
            }
        }
        Ok(())
    }

    fn save_block_position(&mut self, block: BlockId, rect: Rect) -> Result<(), PersistenceError> {
        self.block_mut(block)?.rect = rect;
        Ok(())
    }

    fn update_block_content(
        &mut self,
        block: BlockId,
        content: &BlockContent,
    ) -> Result<(), PersistenceError> {
        self.block_mut(block)?.content = content.clone();
        Ok(())
    }

    fn delete_block(&mut self, block: BlockId) -> Result<(), PersistenceError> {
        if !self.block_index.contains_key(&block) {
            return Err(not_found(RecordKind::Block, block));
        }
        self.blocks.retain(|b| b.id != block);
        self.connections.retain(|c| !c.references(block));
        self.reindex_blocks();
        Ok(())
    }

    fn create_connection(&mut self, connection: &Connection) -> Result<(), PersistenceError> {
        for id in std::iter::once(connection.from_block_id).chain(connection.target.block()) {
            if !self.block_index.contains_key(&id) {
                return Err(not_found(RecordKind::Block, id));
            }
        }
        self.connections.retain(|c| c.id != connection.id);
        self.connections.push(connection.clone());
        Ok(())
    }

    fn delete_connection(&mut self, connection: ConnectionId) -> Result<(), PersistenceError> {
        let before = self.connections.len();
        self.connections.retain(|c| c.id != connection);
        if self.connections.len() == before {
            return Err(not_found(RecordKind::Connection, connection));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ConnectionTarget;

    fn seeded() -> (InMemoryPersistence, PageId) {
        let mut db = InMemoryPersistence::new();
        let page = db
            .create_page(NewPage {
                name: "Overview".into(),
                group_id: None,
                parent_id: None,
                order: 0,
            })
            .unwrap();
        (db, page)
    }

    fn paragraph(page: PageId, x: f32) -> NewBlock {
        NewBlock {
            page_id: page,
            section_id: None,
            rect: Rect::new(x, 0.0, 100.0, 100.0),
            content: BlockContent::Paragraph { text: "p".into() },
        }
    }

    #[test]
    fn seed_replaces_page_contents() {
        let (mut db, page) = seeded();
        db.create_block(paragraph(page, 0.0)).unwrap();
        let mut data = db.load_page(page).unwrap();
        data.blocks[0].rect.x = 500.0;
        data.page.name = "Renamed".into();

        let mut mirror = InMemoryPersistence::new();
        mirror.seed(data.clone());
        mirror.seed(data.clone());
        assert_eq!(mirror.load_page(page).unwrap(), data);
        assert_eq!(mirror.pages().len(), 1);
    }

    #[test]
    fn delete_block_cascades_connections() {
        let (mut db, page) = seeded();
        let a = db.create_block(paragraph(page, 0.0)).unwrap();
        let b = db.create_block(paragraph(page, 200.0)).unwrap();
        let conn = Connection::new(page, a, ConnectionTarget::Block { to_block_id: b });
        db.create_connection(&conn).unwrap();

        db.delete_block(b).unwrap();
        let data = db.load_page(page).unwrap();
        assert_eq!(data.blocks.len(), 1);
        assert!(data.connections.is_empty());
        assert!(db.block(a).is_some());
    }

    #[test]
    fn create_block_on_missing_page_fails() {
        let mut db = InMemoryPersistence::new();
        let err = db
            .create_block(paragraph(PageId::intern("mem-missing"), 0.0))
            .unwrap_err();
        assert!(matches!(
            err,
            PersistenceError::NotFound {
                kind: RecordKind::Page,
                ..
            }
        ));
    }

    #[test]
    fn page_settings_survive_reload() {
        let (mut db, page) = seeded();
        let grid = GridSettings {
            enabled: false,
            size: 40.0,
        };
        db.save_page_settings(page, grid).unwrap();
        assert_eq!(db.load_page(page).unwrap().page.grid, grid);
        assert!(matches!(
            db.save_page_settings(PageId::intern("mem-nowhere"), grid),
            Err(PersistenceError::NotFound {
                kind: RecordKind::Page,
                ..
            })
        ));
    }

    #[test]
    fn portals_are_listed_across_pages() {
        let (mut db, overview) = seeded();
        let other = db
            .create_page(NewPage {
                name: "Elements".into(),
                group_id: None,
                parent_id: None,
                order: 1,
            })
            .unwrap();
        db.create_block(paragraph(overview, 0.0)).unwrap();
        let door = db
            .create_block(NewBlock {
                content: BlockContent::Navigator {
                    title: "Go".into(),
                    linked_page_id: Some(overview),
                },
                ..paragraph(other, 0.0)
            })
            .unwrap();
        // Unlinked navigators are not portals
        db.create_block(NewBlock {
            content: BlockContent::Navigator {
                title: "Nowhere".into(),
                linked_page_id: None,
            },
            ..paragraph(other, 200.0)
        })
        .unwrap();

        let expected = vec![PortalLink {
            page: other,
            block: door,
            target: overview,
        }];
        assert_eq!(db.load_portals().unwrap(), expected);
    }

    #[test]
    fn creation_order_is_z_order() {
        let (mut db, page) = seeded();
        let a = db.create_block(paragraph(page, 0.0)).unwrap();
        let b = db.create_block(paragraph(page, 10.0)).unwrap();
        assert!(db.block(a).unwrap().z_index < db.block(b).unwrap().z_index);
    }
}
