use pmap_core::*;
use std::time::Instant;

#[test]
#[ignore] // Run manually with `cargo test --test perf_benchmark -- --nocapture --ignored`
fn benchmark_culling_large_page() {
    let mut store = ElementStore::new(Page {
        id: PageId::intern("perf-page"),
        name: "Perf".into(),
        group_id: None,
        parent_id: None,
        order: 0,
        grid: GridSettings::default(),
    });
    // 50,000 blocks on a 250×200 lattice
    for i in 0..50_000 {
        let x = (i % 250) as f32 * 400.0;
        let y = (i / 250) as f32 * 300.0;
        store
            .create_block(
                BlockContent::Paragraph {
                    text: format!("block {i}"),
                },
                Rect::new(x, y, 300.0, 200.0),
            )
            .expect("create failed");
    }

    let viewport = Viewport::new(1920.0, 1080.0);
    let overlay = PositionOverlay::new();
    let start = Instant::now();
    let visible = store.list_visible_blocks(&viewport, &overlay);
    let duration = start.elapsed();

    println!(
        "Culled 50,000 blocks to {} visible in {:?}",
        visible.len(),
        duration
    );
    assert!(visible.len() < 100);
}
