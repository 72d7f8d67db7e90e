//! Integration tests: element store reads through viewport culling.
//!
//! Covers the culling properties across the store, the geometry helpers
//! and the persistence round trip.

use pmap_core::*;
use pretty_assertions::assert_eq;

fn page(id: &str) -> Page {
    Page {
        id: PageId::intern(id),
        name: "Culling".into(),
        group_id: None,
        parent_id: None,
        order: 0,
        grid: GridSettings::default(),
    }
}

fn para() -> BlockContent {
    BlockContent::Paragraph {
        text: "lorem".into(),
    }
}

fn viewport(x: f32, y: f32) -> Viewport {
    Viewport {
        x,
        y,
        zoom: 1.0,
        width: 800.0,
        height: 600.0,
    }
}

fn ids(visible: &[VisibleBlock<'_>]) -> Vec<BlockId> {
    visible.iter().map(|v| v.block.id).collect()
}

// ─── Element culling ────────────────────────────────────────────────────

#[test]
fn pan_flips_visibility() {
    let mut store = ElementStore::new(page("cull-pan"));
    let a = store
        .create_block(para(), Rect::new(0.0, 0.0, 100.0, 100.0))
        .unwrap();
    let b = store
        .create_block(para(), Rect::new(5000.0, 5000.0, 100.0, 100.0))
        .unwrap();
    let overlay = PositionOverlay::new();

    let visible = store.list_visible_blocks(&viewport(0.0, 0.0), &overlay);
    assert_eq!(ids(&visible), vec![a]);

    // B sits at (5000, 5000): both axes have to pan to bring it in
    let visible = store.list_visible_blocks(&viewport(-5000.0, -5000.0), &overlay);
    assert_eq!(ids(&visible), vec![b]);
}

#[test]
fn elements_outside_buffer_are_culled() {
    let v = viewport(0.0, 0.0);
    let buffered = v.buffered_rect(200.0);
    let samples = [
        Rect::new(-350.0, 0.0, 100.0, 100.0),
        Rect::new(-250.0, 0.0, 100.0, 100.0),
        Rect::new(990.0, 10.0, 20.0, 20.0),
        Rect::new(1000.0, 0.0, 50.0, 50.0),
        Rect::new(400.0, 799.0, 10.0, 10.0),
        Rect::new(400.0, 800.0, 10.0, 10.0),
    ];
    for r in samples {
        assert_eq!(
            is_element_in_viewport(&r, &v, 200.0),
            r.intersects(&buffered),
            "{r:?}"
        );
    }
}

// ─── Connection culling ─────────────────────────────────────────────────

#[test]
fn deleting_target_removes_connection_from_visible_list() {
    let mut store = ElementStore::new(page("cull-conn"));
    let a = store
        .create_block(para(), Rect::new(0.0, 0.0, 100.0, 100.0))
        .unwrap();
    let b = store
        .create_block(para(), Rect::new(300.0, 0.0, 100.0, 100.0))
        .unwrap();
    let conn = store
        .create_connection(a, ConnectionTarget::Block { to_block_id: b })
        .unwrap();
    let overlay = PositionOverlay::new();
    let v = viewport(0.0, 0.0);
    assert_eq!(store.list_visible_connections(&v, &overlay).len(), 1);

    store.delete_block(b).unwrap();
    assert!(store.connection(conn).is_none());
    assert!(store.list_visible_connections(&v, &overlay).is_empty());
}

#[test]
fn connection_follows_dragged_source() {
    let mut store = ElementStore::new(page("cull-drag"));
    let a = store
        .create_block(para(), Rect::new(0.0, 0.0, 100.0, 100.0))
        .unwrap();
    store
        .create_connection(a, ConnectionTarget::Point { to_x: 50.0, to_y: 300.0 })
        .unwrap();
    let mut overlay = PositionOverlay::new();
    overlay.set(a, 9000.0, 9000.0);
    assert!(
        store
            .list_visible_connections(&viewport(0.0, 0.0), &overlay)
            .is_empty()
    );
}

// ─── Persistence round trip ─────────────────────────────────────────────

#[test]
fn flushed_page_reloads_identically() {
    let mut db = InMemoryPersistence::new();
    let p = page("cull-reload");
    db.insert_page(p.clone());

    let mut store = ElementStore::new(p.clone());
    let a = store
        .create_block(para(), Rect::new(0.0, 0.0, 100.0, 100.0))
        .unwrap();
    let b = store
        .create_block(
            BlockKind::Shape.empty_content(),
            Rect::new(400.0, 40.0, 150.0, 150.0),
        )
        .unwrap();
    store
        .create_connection(a, ConnectionTarget::Block { to_block_id: b })
        .unwrap();
    store.flush(&mut db).unwrap();

    let reloaded = ElementStore::from_page_data(db.load_page(p.id).unwrap(), CanvasConfig::default());
    assert_eq!(reloaded.blocks(), store.blocks());
    assert_eq!(reloaded.connections(), store.connections());
}
