//! Integration tests: template instantiation against the in-memory backend.

use pmap_core::error::RecordKind;
use pmap_core::template::instantiate_builtin;
use pmap_core::*;
use pretty_assertions::assert_eq;

/// Fails every creation call after `budget` successful ones.
struct FlakyBackend {
    inner: InMemoryPersistence,
    budget: usize,
}

impl FlakyBackend {
    fn spend(&mut self) -> Result<(), PersistenceError> {
        if self.budget == 0 {
            return Err(PersistenceError::Backend("disk full".into()));
        }
        self.budget -= 1;
        Ok(())
    }
}

impl MapPersistence for FlakyBackend {
    fn load_pages(&self) -> Result<Vec<Page>, PersistenceError> {
        self.inner.load_pages()
    }
    fn load_page(&self, page: PageId) -> Result<PageData, PersistenceError> {
        self.inner.load_page(page)
    }
    fn create_group(&mut self, name: &str, order: u32) -> Result<GroupId, PersistenceError> {
        self.spend()?;
        self.inner.create_group(name, order)
    }
    fn create_page(&mut self, page: NewPage) -> Result<PageId, PersistenceError> {
        self.spend()?;
        self.inner.create_page(page)
    }
    fn create_section(
        &mut self,
        page: PageId,
        title: &str,
        order: u32,
    ) -> Result<SectionId, PersistenceError> {
        self.spend()?;
        self.inner.create_section(page, title, order)
    }
    fn create_block(&mut self, block: NewBlock) -> Result<BlockId, PersistenceError> {
        self.spend()?;
        self.inner.create_block(block)
    }
    fn save_page_settings(&mut self, page: PageId, grid: GridSettings) -> Result<(), PersistenceError> {
        self.inner.save_page_settings(page, grid)
    }
    fn save_block(&mut self, block: &Block) -> Result<(), PersistenceError> {
        self.inner.save_block(block)
    }
    fn save_block_position(&mut self, block: BlockId, rect: Rect) -> Result<(), PersistenceError> {
        self.inner.save_block_position(block, rect)
    }
    fn update_block_content(
        &mut self,
        block: BlockId,
        content: &BlockContent,
    ) -> Result<(), PersistenceError> {
        self.inner.update_block_content(block, content)
    }
    fn delete_block(&mut self, block: BlockId) -> Result<(), PersistenceError> {
        self.inner.delete_block(block)
    }
    fn create_connection(&mut self, connection: &Connection) -> Result<(), PersistenceError> {
        self.inner.create_connection(connection)
    }
    fn delete_connection(&mut self, connection: ConnectionId) -> Result<(), PersistenceError> {
        self.inner.delete_connection(connection)
    }
}

/// Page names per group, with block kinds per page, ids stripped.
fn structure(db: &InMemoryPersistence, created: &CreatedRecords) -> Vec<(String, Vec<BlockKind>)> {
    created
        .pages
        .iter()
        .map(|id| {
            let data = db.load_page(*id).unwrap();
            (
                data.page.name,
                data.blocks.iter().map(|b| b.kind()).collect(),
            )
        })
        .collect()
}

#[test]
fn instantiating_twice_creates_disjoint_copies() {
    let mut db = InMemoryPersistence::new();
    let first = instantiate_builtin("magic", "en", &mut db).unwrap();
    let second = instantiate_builtin("magic", "en", &mut db).unwrap();

    for g in &first.groups {
        assert!(!second.groups.contains(g));
    }
    for b in &first.blocks {
        assert!(!second.blocks.contains(b));
    }
    assert_eq!(structure(&db, &first), structure(&db, &second));
    assert_eq!(db.groups().len(), first.groups.len() * 2);
}

#[test]
fn sections_and_blocks_keep_template_order() {
    let mut db = InMemoryPersistence::new();
    let created = instantiate_builtin("martial", "en", &mut db).unwrap();
    let overview = db.load_page(created.first_page().unwrap()).unwrap();
    assert_eq!(overview.page.name, "Overview");

    let titles: Vec<&str> = overview.sections.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, vec!["What is Ki", "Origin", "How to Handle", "Where to Find"]);

    // Stacked top to bottom in creation order
    let ys: Vec<f32> = overview.blocks.iter().map(|b| b.rect.y).collect();
    assert!(ys.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn default_portal_scan_matches_indexed_scan() {
    let mut backend = FlakyBackend {
        inner: InMemoryPersistence::new(),
        budget: usize::MAX,
    };
    instantiate(&Template::builtin(TemplateId::Magic, Locale::En).unwrap(), &mut backend).unwrap();

    // FlakyBackend falls back to the trait's page-by-page walk
    let walked = backend.load_portals().unwrap();
    assert_eq!(walked.len(), 1);
    assert_eq!(walked, backend.inner.load_portals().unwrap());
    let target = backend.inner.load_page(walked[0].target).unwrap();
    assert_eq!(target.page.name, "Elemental Types");
}

#[test]
fn unsupported_locale_creates_nothing() {
    let mut db = InMemoryPersistence::new();
    let err = instantiate_builtin("magic", "de", &mut db).unwrap_err();
    assert!(matches!(err, TemplateError::UnsupportedLocale(_)));
    assert!(db.pages().is_empty());
}

#[test]
fn failure_reports_created_records_without_rollback() {
    let _ = env_logger::builder().is_test(true).try_init();
    let template = Template::builtin(TemplateId::Magic, Locale::Pt).unwrap();
    let mut backend = FlakyBackend {
        inner: InMemoryPersistence::new(),
        budget: 5,
    };
    let err = instantiate(&template, &mut backend).unwrap_err();
    let TemplateError::Creation { created, source } = err else {
        panic!("expected a creation error");
    };
    assert_eq!(source, PersistenceError::Backend("disk full".into()));
    assert_eq!(created.pages.len(), 1);
    assert_eq!(created.sections.len() + created.blocks.len(), 4);
    // Nothing was rolled back
    assert_eq!(backend.inner.pages().len(), 1);
    assert_eq!(backend.inner.blocks().len(), created.blocks.len());
}

#[test]
fn missing_block_on_update_is_not_found() {
    let mut db = InMemoryPersistence::new();
    let err = db
        .update_block_content(BlockId::intern("tpl-ghost"), &BlockKind::Divider.empty_content())
        .unwrap_err();
    assert!(matches!(
        err,
        PersistenceError::NotFound {
            kind: RecordKind::Block,
            ..
        }
    ));
}
