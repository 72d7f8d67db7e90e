//! WASM bridge for the map engine. Exposes one editing session to the
//! desktop webview.
//!
//! Compiled via `wasm-pack build --target web`. The host owns the real
//! (asynchronous) record store: it seeds the canvas with a snapshot, feeds
//! pointer and key events, paints from `frame_json`, and after `flush`
//! replays the returned operations against its store.

mod journal;

pub use journal::{JournalBackend, PersistOp};

use pmap_core::model::{BlockContent, BlockKind, ConnectionTarget, Group, Page, Rect};
use pmap_core::{
    BlockId, ConnectionId, PageData, PageId, SurfaceFrame, SurfaceTransform,
};
use pmap_editor::{
    InputEvent, MapSession, Modifiers, hide_image_section, show_resize_handles,
    visible_properties,
};
use pmap_render::{hit_test, hit_test_connection, route_in};
use serde::Deserialize;
use serde_json::json;
use std::fmt::Display;
use wasm_bindgen::prelude::*;

/// Distance in screen pixels within which a click picks a connection.
const CONNECTION_PICK_TOLERANCE: f32 = 6.0;

/// Records the host already holds, handed over at startup.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Snapshot {
    groups: Vec<Group>,
    pages: Vec<Page>,
    content: Vec<PageData>,
}

/// The WASM-facing canvas controller.
///
/// All interaction from the webview goes through this struct. Methods that
/// take input return `true` when the frame must be repainted.
#[wasm_bindgen]
pub struct MapCanvas {
    session: MapSession,
    backend: JournalBackend,
}

#[wasm_bindgen]
impl MapCanvas {
    /// Open `root_page` from a JSON snapshot `{groups, pages, content}`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        width: f64,
        height: f64,
        snapshot_json: &str,
        root_page: &str,
    ) -> Result<MapCanvas, JsValue> {
        console_error_panic_hook_setup();

        let snapshot: Snapshot = serde_json::from_str(snapshot_json).map_err(js_err)?;
        log::debug!(
            "seeding canvas: {} pages, {} loaded",
            snapshot.pages.len(),
            snapshot.content.len()
        );
        let mut backend = JournalBackend::new();
        backend.seed(snapshot.groups, snapshot.pages, snapshot.content);

        let mut session =
            MapSession::open(&backend, PageId::intern(root_page)).map_err(js_err)?;
        session.resize_surface(width as f32, height as f32);
        Ok(Self { session, backend })
    }

    /// Resize the canvas.
    pub fn resize(&mut self, width: f64, height: f64) {
        self.session.resize_surface(width as f32, height as f32);
    }

    // ─── Pointer & keyboard ──────────────────────────────────────────────

    pub fn handle_pointer_down(
        &mut self,
        x: f32,
        y: f32,
        shift: bool,
        ctrl: bool,
        alt: bool,
        meta: bool,
    ) -> Result<bool, JsValue> {
        let modifiers = Modifiers {
            shift,
            ctrl,
            alt,
            meta,
        };
        self.dispatch(InputEvent::PointerDown { x, y, modifiers })
    }

    /// `shift` constrains a drag to its dominant axis.
    pub fn handle_pointer_move(&mut self, x: f32, y: f32, shift: bool) -> Result<bool, JsValue> {
        let modifiers = Modifiers {
            shift,
            ..Modifiers::NONE
        };
        self.dispatch(InputEvent::PointerMove { x, y, modifiers })
    }

    pub fn handle_pointer_up(&mut self, x: f32, y: f32) -> Result<bool, JsValue> {
        self.dispatch(InputEvent::PointerUp { x, y })
    }

    /// Pointer left the surface: any live drag is discarded.
    pub fn handle_pointer_leave(&mut self) -> Result<bool, JsValue> {
        self.dispatch(InputEvent::PointerLeave)
    }

    pub fn handle_wheel(
        &mut self,
        x: f32,
        y: f32,
        delta_y: f32,
        ctrl: bool,
        meta: bool,
    ) -> Result<bool, JsValue> {
        let modifiers = Modifiers {
            ctrl,
            meta,
            ..Modifiers::NONE
        };
        self.dispatch(InputEvent::Wheel {
            x,
            y,
            delta_y,
            modifiers,
        })
    }

    /// Handle a keyboard event (`KeyboardEvent.key` plus modifiers).
    pub fn handle_key(
        &mut self,
        key: &str,
        ctrl: bool,
        shift: bool,
        alt: bool,
        meta: bool,
    ) -> Result<bool, JsValue> {
        let modifiers = Modifiers {
            shift,
            ctrl,
            alt,
            meta,
        };
        self.dispatch(InputEvent::Key {
            key: key.to_string(),
            modifiers,
        })
    }

    fn dispatch(&mut self, event: InputEvent) -> Result<bool, JsValue> {
        self.session.handle_event(&event).map_err(js_err)
    }

    // ─── Frame output ────────────────────────────────────────────────────

    /// Everything the webview draws this frame, as JSON.
    ///
    /// Blocks and connections are culled to the buffered viewport and
    /// carry their live (drag-adjusted) geometry.
    pub fn frame_json(&self) -> String {
        let frame = self.session.canvas_frame();
        let store = frame.store;
        let surface = SurfaceFrame::describe(
            frame.viewport,
            &store.page().grid,
            &self.session.config().canvas,
        );

        let blocks: Vec<serde_json::Value> = store
            .list_visible_blocks(frame.viewport, frame.overlay)
            .into_iter()
            .map(|v| {
                json!({
                    "id": v.block.id,
                    "rect": v.rect,
                    "zIndex": v.block.z_index,
                    "content": v.block.content,
                    "selected": frame.selected.contains(&v.block.id),
                    "dragging": frame.overlay.get(v.block.id).is_some(),
                })
            })
            .collect();

        let connections: Vec<serde_json::Value> = store
            .list_visible_connections(frame.viewport, frame.overlay)
            .into_iter()
            .filter_map(|c| {
                let seg = route_in(store, frame.overlay, c)?;
                Some(json!({
                    "id": c.id,
                    "kind": c.kind,
                    "color": c.color,
                    "strokeWidth": c.stroke_width,
                    "label": c.label,
                    "from": [seg.from.0, seg.from.1],
                    "to": [seg.to.0, seg.to.1],
                }))
            })
            .collect();

        json!({
            "surface": surface,
            "transformCss": SurfaceTransform::from_viewport(frame.viewport).to_css(),
            "blocks": blocks,
            "connections": connections,
            "selectionBox": frame.selection_box,
            "marquee": frame.marquee,
        })
        .to_string()
    }

    /// Selection state for the contextual toolbar.
    pub fn selection_json(&self) -> String {
        let selection = self.session.selection();
        let analysis = self.session.selection_analysis();
        json!({
            "ids": selection.ids(),
            "bounds": self.session.selection_bounds().map(|b| b.rect),
            "showResizeHandles": show_resize_handles(selection),
            "hideImageSection": hide_image_section(&analysis, selection.is_multi()),
            "properties": visible_properties(&analysis),
            "analysis": analysis,
        })
        .to_string()
    }

    /// Breadcrumb trail, root first.
    pub fn breadcrumbs_json(&self) -> String {
        serde_json::to_string(&self.session.breadcrumbs().labels())
            .unwrap_or_else(|_| "[]".to_string())
    }

    pub fn viewport_json(&self) -> String {
        serde_json::to_string(self.session.viewport()).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn page_id(&self) -> String {
        self.session.page_id().to_string()
    }

    /// Sidebar listing: ungrouped pages first, then each group in order.
    /// Sub-maps are listed under their parent, not at the top level.
    pub fn pages_json(&self) -> String {
        let tree = self.session.pages();
        let mut groups: Vec<&Group> = self.backend.mirror().groups().iter().collect();
        groups.sort_by_key(|g| g.order);

        let listing: Vec<serde_json::Value> = std::iter::once((None, None))
            .chain(groups.iter().map(|g| (Some(g.id), Some(g.name.as_str()))))
            .map(|(group, name)| {
                let pages: Vec<serde_json::Value> = tree
                    .pages_in_group(group)
                    .into_iter()
                    .filter(|p| p.parent_id.is_none())
                    .map(|p| {
                        json!({
                            "id": p.id,
                            "name": p.name,
                            "subMaps": tree.children(p.id),
                        })
                    })
                    .collect();
                json!({ "groupId": group, "name": name, "pages": pages })
            })
            .collect();
        serde_json::to_string(&listing).unwrap_or_else(|_| "[]".to_string())
    }

    /// Block under the screen point, if any.
    pub fn block_at(&self, x: f32, y: f32) -> Option<String> {
        let (cx, cy) = self.session.viewport().screen_to_canvas(x, y);
        hit_test(self.session.store(), self.session.overlay(), cx, cy).map(|id| id.to_string())
    }

    /// Connection passing under the screen point, if any.
    pub fn connection_at(&self, x: f32, y: f32) -> Option<String> {
        let viewport = self.session.viewport();
        let (cx, cy) = viewport.screen_to_canvas(x, y);
        hit_test_connection(
            self.session.store(),
            self.session.overlay(),
            cx,
            cy,
            CONNECTION_PICK_TOLERANCE / viewport.zoom,
        )
        .map(|id| id.to_string())
    }

    // ─── View ────────────────────────────────────────────────────────────

    pub fn zoom_to_fit(&mut self) {
        self.session.zoom_to_fit();
    }

    pub fn reset_view(&mut self) {
        self.session.reset_view();
    }

    pub fn zoom_in(&mut self) {
        self.session.zoom_in();
    }

    pub fn zoom_out(&mut self) {
        self.session.zoom_out();
    }

    // ─── Editing ─────────────────────────────────────────────────────────

    /// Create an empty block of `kind` (kebab-case, e.g. `"numbered-list"`)
    /// at canvas position `(x, y)`. Returns the new id.
    pub fn create_block(&mut self, kind: &str, x: f32, y: f32) -> Result<String, JsValue> {
        let kind: BlockKind =
            serde_json::from_value(serde_json::Value::String(kind.to_string())).map_err(js_err)?;
        let id = self.session.create_block(kind, x, y).map_err(js_err)?;
        Ok(id.to_string())
    }

    /// Replace a block's content with the tagged JSON `{type, content}`.
    pub fn update_block_content(&mut self, id: &str, content_json: &str) -> Result<(), JsValue> {
        let content: BlockContent = serde_json::from_str(content_json).map_err(js_err)?;
        self.session
            .update_content(BlockId::intern(id), content)
            .map_err(js_err)
    }

    pub fn resize_block(
        &mut self,
        id: &str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> Result<(), JsValue> {
        self.session
            .resize_block(BlockId::intern(id), Rect::new(x, y, width, height))
            .map_err(js_err)
    }

    /// Delete the selection. Returns the number of blocks removed.
    pub fn delete_selected(&mut self) -> Result<usize, JsValue> {
        self.session.delete_selection().map_err(js_err)
    }

    /// Connect two blocks. Returns the new connection id.
    pub fn connect(&mut self, from: &str, to: &str) -> Result<String, JsValue> {
        let target = ConnectionTarget::Block {
            to_block_id: BlockId::intern(to),
        };
        let id = self
            .session
            .connect(BlockId::intern(from), target)
            .map_err(js_err)?;
        Ok(id.to_string())
    }

    /// Connect a block to a free canvas point.
    pub fn connect_to_point(&mut self, from: &str, x: f32, y: f32) -> Result<String, JsValue> {
        let target = ConnectionTarget::Point { to_x: x, to_y: y };
        let id = self
            .session
            .connect(BlockId::intern(from), target)
            .map_err(js_err)?;
        Ok(id.to_string())
    }

    pub fn delete_connection(&mut self, id: &str) -> Result<(), JsValue> {
        self.session
            .delete_connection(ConnectionId::intern(id))
            .map_err(js_err)
    }

    /// Clear the whole page. `confirmed_page` is the id echoed back by the
    /// confirmation dialog.
    pub fn clear_area(&mut self, confirmed_page: &str) -> Result<usize, JsValue> {
        self.session
            .clear_area(PageId::intern(confirmed_page))
            .map_err(js_err)
    }

    pub fn set_grid(&mut self, enabled: bool, size: f32) -> Result<(), JsValue> {
        self.session.set_grid(enabled, size).map_err(js_err)
    }

    pub fn set_snap_to_grid(&mut self, snap: bool) {
        self.session.set_snap_to_grid(snap);
    }

    /// Returns the description of the undone step, if any.
    pub fn undo(&mut self) -> Result<Option<String>, JsValue> {
        self.session.undo().map_err(js_err)
    }

    pub fn redo(&mut self) -> Result<Option<String>, JsValue> {
        self.session.redo().map_err(js_err)
    }

    pub fn can_undo(&self) -> bool {
        self.session.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.session.can_redo()
    }

    /// Label for the undo menu item, e.g. "move 3 blocks".
    pub fn undo_label(&self) -> Option<String> {
        self.session.undo_description().map(str::to_string)
    }

    pub fn redo_label(&self) -> Option<String> {
        self.session.redo_description().map(str::to_string)
    }

    // ─── Navigation ──────────────────────────────────────────────────────

    pub fn enter_page(&mut self, page: &str) -> Result<(), JsValue> {
        self.session
            .enter(&mut self.backend, PageId::intern(page))
            .map_err(js_err)
    }

    /// Activate a navigator block. Returns the entered page id, if linked.
    pub fn open_portal(&mut self, block: &str) -> Result<Option<String>, JsValue> {
        let page = self
            .session
            .open_portal(&mut self.backend, BlockId::intern(block))
            .map_err(js_err)?;
        Ok(page.map(|p| p.to_string()))
    }

    pub fn navigate_to(&mut self, page: &str) -> Result<(), JsValue> {
        self.session
            .navigate_to(&mut self.backend, PageId::intern(page))
            .map_err(js_err)
    }

    /// One breadcrumb level up. Returns the page now shown.
    pub fn back(&mut self) -> Result<String, JsValue> {
        let page = self.session.back(&mut self.backend).map_err(js_err)?;
        Ok(page.to_string())
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Write pending changes and hand the journal to the host as a JSON
    /// array of operations. Page switches flush too; their operations are
    /// included here.
    pub fn flush(&mut self) -> Result<String, JsValue> {
        let written = self.session.flush(&mut self.backend).map_err(js_err)?;
        let ops = self.backend.drain();
        log::debug!("flushed {written} changes, handing {} ops to host", ops.len());
        serde_json::to_string(&ops).map_err(js_err)
    }

    /// Number of journaled operations not yet drained.
    pub fn pending_ops(&self) -> usize {
        self.backend.pending()
    }
}

// ─── Standalone functions (no canvas needed) ─────────────────────────────

/// Build one of the bundled starter maps.
///
/// Returns JSON `{"created": {...}, "ops": [...]}`; the host replays `ops`
/// against its store. On failure the error message lists what was created.
#[wasm_bindgen]
pub fn instantiate_template(template_id: &str, locale: &str) -> Result<String, JsValue> {
    console_error_panic_hook_setup();
    let mut backend = JournalBackend::new();
    let created =
        pmap_core::template::instantiate_builtin(template_id, locale, &mut backend).map_err(js_err)?;
    let ops = backend.drain();
    Ok(json!({ "created": created, "ops": ops }).to_string())
}

/// Kebab-case names of every block kind the toolbar can create.
#[wasm_bindgen]
pub fn block_kinds() -> String {
    let kinds: Vec<BlockKind> = BlockKind::ALL.to_vec();
    serde_json::to_string(&kinds).unwrap_or_else(|_| "[]".to_string())
}

fn js_err(err: impl Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

// ─── Panic hook for WASM debugging ───────────────────────────────────────

fn console_error_panic_hook_setup() {
    #[cfg(target_arch = "wasm32")]
    {
        use std::sync::Once;
        static SET_HOOK: Once = Once::new();
        SET_HOOK.call_once(|| {
            std::panic::set_hook(Box::new(|info| {
                let msg = format!("map engine panic: {info}");
                web_sys::console::error_1(&msg.into());
            }));
        });
    }
}
