//! Selection model and the geometry the contextual toolbar reads.
//!
//! A single selection reports the block's live rectangle. A multi
//! selection reports the union of every selected block's live rectangle,
//! padded. "Live" means the drag position when a drag is in flight. An
//! empty selection has no box at all.

use pmap_core::model::{BlockKind, ElementCategory, Rect};
use pmap_core::{BlockId, ElementStore, PositionOverlay};
use serde::Serialize;
use smallvec::SmallVec;

pub type SelectedIds = SmallVec<[BlockId; 8]>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Selection {
    ids: SelectedIds,
}

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ids(&self) -> &[BlockId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn is_multi(&self) -> bool {
        self.ids.len() > 1
    }

    pub fn contains(&self, id: BlockId) -> bool {
        self.ids.contains(&id)
    }

    pub fn first(&self) -> Option<BlockId> {
        self.ids.first().copied()
    }

    pub fn select_only(&mut self, id: BlockId) {
        self.ids.clear();
        self.ids.push(id);
    }

    /// Add if absent, remove if present (shift-click).
    pub fn toggle(&mut self, id: BlockId) {
        if let Some(pos) = self.ids.iter().position(|x| *x == id) {
            self.ids.remove(pos);
        } else {
            self.ids.push(id);
        }
    }

    pub fn add(&mut self, id: BlockId) {
        if !self.contains(id) {
            self.ids.push(id);
        }
    }

    pub fn extend<I: IntoIterator<Item = BlockId>>(&mut self, ids: I) {
        for id in ids {
            self.add(id);
        }
    }

    pub fn remove(&mut self, id: BlockId) {
        self.ids.retain(|x| *x != id);
    }

    pub fn set<I: IntoIterator<Item = BlockId>>(&mut self, ids: I) {
        self.ids.clear();
        self.extend(ids);
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    /// Drop ids the store no longer has.
    pub fn retain_existing(&mut self, store: &ElementStore) {
        self.ids.retain(|id| store.contains_block(*id));
    }

    /// Box for the toolbar and the selection outline. `None` when nothing
    /// selected resolves to a block.
    pub fn bounds(
        &self,
        store: &ElementStore,
        overlay: &PositionOverlay,
        padding: f32,
    ) -> Option<SelectionBox> {
        let rects: SmallVec<[Rect; 8]> = self
            .ids
            .iter()
            .filter_map(|id| store.current_rect(*id, overlay))
            .collect();
        match rects.len() {
            0 => None,
            1 => Some(SelectionBox {
                rect: rects[0],
                multi: false,
            }),
            _ => Rect::union_all(rects).map(|u| SelectionBox {
                rect: u.padded(padding),
                multi: true,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SelectionBox {
    pub rect: Rect,
    pub multi: bool,
}

// ─── Analysis ────────────────────────────────────────────────────────────

/// Composition of a selection, for deciding which toolbar controls apply.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionAnalysis {
    pub count: usize,
    pub categories: SmallVec<[ElementCategory; 3]>,
    pub kinds: SmallVec<[BlockKind; 4]>,
    /// More than one category (blocks with shapes, shapes with text...).
    pub is_mixed: bool,
    pub is_same_type: bool,
    pub is_all_blocks: bool,
    pub is_all_shapes: bool,
    pub is_all_texts: bool,
}

impl SelectionAnalysis {
    /// The shared kind, when every selected element has the same one.
    pub fn common_kind(&self) -> Option<BlockKind> {
        if self.is_same_type {
            self.kinds.first().copied()
        } else {
            None
        }
    }
}

pub fn analyze_selection(selection: &Selection, store: &ElementStore) -> SelectionAnalysis {
    let mut analysis = SelectionAnalysis::default();
    for block in selection.ids().iter().filter_map(|id| store.block(*id)) {
        analysis.count += 1;
        let kind = block.kind();
        if !analysis.kinds.contains(&kind) {
            analysis.kinds.push(kind);
        }
        let category = kind.category();
        if !analysis.categories.contains(&category) {
            analysis.categories.push(category);
        }
    }
    let only = |c: ElementCategory| analysis.categories.as_slice() == [c];
    analysis.is_all_blocks = only(ElementCategory::Block);
    analysis.is_all_shapes = only(ElementCategory::Shape);
    analysis.is_all_texts = only(ElementCategory::Text);
    analysis.is_same_type = analysis.kinds.len() == 1;
    analysis.is_mixed = analysis.categories.len() > 1;
    analysis
}

/// Editable properties surfaced by the contextual toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ToolbarProperty {
    BackgroundColor,
    TextColor,
    BorderColor,
    Alignment,
    CanNavigate,
    /// Informative blocks only.
    Icon,
    /// Image blocks only.
    Caption,
    /// Heading blocks only.
    HeadingLevel,
    /// Section blocks only.
    TitleBorder,
    /// Shapes only.
    ImageUrl,
    ShapeKind,
    /// Free text only.
    FontSize,
    FontWeight,
}

impl ToolbarProperty {
    pub const ALL: [ToolbarProperty; 13] = [
        ToolbarProperty::BackgroundColor,
        ToolbarProperty::TextColor,
        ToolbarProperty::BorderColor,
        ToolbarProperty::Alignment,
        ToolbarProperty::CanNavigate,
        ToolbarProperty::Icon,
        ToolbarProperty::Caption,
        ToolbarProperty::HeadingLevel,
        ToolbarProperty::TitleBorder,
        ToolbarProperty::ImageUrl,
        ToolbarProperty::ShapeKind,
        ToolbarProperty::FontSize,
        ToolbarProperty::FontWeight,
    ];
}

/// Every property the toolbar should offer for this selection.
pub fn visible_properties(analysis: &SelectionAnalysis) -> Vec<ToolbarProperty> {
    ToolbarProperty::ALL
        .into_iter()
        .filter(|p| should_show_property(*p, analysis))
        .collect()
}

const BLOCK_COMMON: &[ToolbarProperty] = &[
    ToolbarProperty::BackgroundColor,
    ToolbarProperty::TextColor,
    ToolbarProperty::BorderColor,
    ToolbarProperty::Alignment,
    ToolbarProperty::CanNavigate,
];

const SHAPE_PROPERTIES: &[ToolbarProperty] = &[
    ToolbarProperty::BackgroundColor,
    ToolbarProperty::ImageUrl,
    ToolbarProperty::ShapeKind,
    ToolbarProperty::CanNavigate,
];

const TEXT_PROPERTIES: &[ToolbarProperty] = &[
    ToolbarProperty::FontSize,
    ToolbarProperty::FontWeight,
    ToolbarProperty::TextColor,
    ToolbarProperty::Alignment,
    ToolbarProperty::CanNavigate,
];

/// Mixed selections only get move/duplicate/delete, so no property shows.
pub fn should_show_property(property: ToolbarProperty, analysis: &SelectionAnalysis) -> bool {
    if analysis.count == 0 || analysis.is_mixed {
        return false;
    }
    if analysis.is_all_blocks {
        let specific = match analysis.common_kind() {
            Some(BlockKind::Informative) => property == ToolbarProperty::Icon,
            Some(BlockKind::Image) => property == ToolbarProperty::Caption,
            Some(BlockKind::Heading) => property == ToolbarProperty::HeadingLevel,
            Some(BlockKind::Section) => property == ToolbarProperty::TitleBorder,
            _ => false,
        };
        return specific || BLOCK_COMMON.contains(&property);
    }
    if analysis.is_all_shapes {
        return SHAPE_PROPERTIES.contains(&property);
    }
    if analysis.is_all_texts {
        return TEXT_PROPERTIES.contains(&property);
    }
    false
}

/// Resize handles only make sense for exactly one element.
pub fn show_resize_handles(selection: &Selection) -> bool {
    selection.len() == 1
}

/// Shapes keep their image controls in multi-selection; blocks do not.
pub fn hide_image_section(analysis: &SelectionAnalysis, multi: bool) -> bool {
    !analysis.is_all_shapes && analysis.is_all_blocks && multi
}

#[cfg(test)]
mod tests {
    use super::*;
    use pmap_core::model::*;
    use pmap_core::PageId;

    fn store() -> ElementStore {
        ElementStore::new(Page {
            id: PageId::intern("sel-page"),
            name: "Selection".into(),
            group_id: None,
            parent_id: None,
            order: 0,
            grid: GridSettings::default(),
        })
    }

    #[test]
    fn empty_selection_has_no_box() {
        let s = store();
        let sel = Selection::new();
        assert!(sel.bounds(&s, &PositionOverlay::new(), 8.0).is_none());
    }

    #[test]
    fn single_selection_is_unpadded_live_rect() {
        let mut s = store();
        let a = s
            .create_block(BlockKind::Paragraph.empty_content(), Rect::new(10.0, 10.0, 100.0, 100.0))
            .unwrap();
        let mut sel = Selection::new();
        sel.select_only(a);
        let mut overlay = PositionOverlay::new();
        overlay.set(a, 40.0, 50.0);
        let b = sel.bounds(&s, &overlay, 8.0).unwrap();
        assert_eq!(b.rect, Rect::new(40.0, 50.0, 100.0, 100.0));
        assert!(!b.multi);
    }

    #[test]
    fn multi_selection_is_padded_union() {
        let mut s = store();
        let a = s
            .create_block(BlockKind::Paragraph.empty_content(), Rect::new(0.0, 0.0, 100.0, 100.0))
            .unwrap();
        let b = s
            .create_block(BlockKind::Paragraph.empty_content(), Rect::new(200.0, 50.0, 100.0, 100.0))
            .unwrap();
        let mut sel = Selection::new();
        sel.set([a, b]);
        let bbox = sel.bounds(&s, &PositionOverlay::new(), 8.0).unwrap();
        assert_eq!(bbox.rect, Rect::new(-8.0, -8.0, 316.0, 166.0));
        assert!(bbox.multi);
    }

    #[test]
    fn toggle_and_retain() {
        let mut s = store();
        let a = s
            .create_block(BlockKind::Text.empty_content(), Rect::new(0.0, 0.0, 50.0, 24.0))
            .unwrap();
        let mut sel = Selection::new();
        sel.toggle(a);
        sel.toggle(BlockId::intern("sel-ghost"));
        assert_eq!(sel.len(), 2);
        sel.retain_existing(&s);
        assert_eq!(sel.ids(), &[a]);
        sel.toggle(a);
        assert!(sel.is_empty());
    }

    #[test]
    fn analysis_and_property_rules() {
        let mut s = store();
        let r = Rect::new(0.0, 0.0, 150.0, 150.0);
        let info1 = s.create_block(BlockKind::Informative.empty_content(), r).unwrap();
        let info2 = s.create_block(BlockKind::Informative.empty_content(), r).unwrap();
        let para = s.create_block(BlockKind::Paragraph.empty_content(), r).unwrap();
        let shape = s.create_block(BlockKind::Shape.empty_content(), r).unwrap();

        let mut sel = Selection::new();
        sel.set([info1, info2]);
        let a = analyze_selection(&sel, &s);
        assert!(a.is_all_blocks && a.is_same_type && !a.is_mixed);
        assert!(should_show_property(ToolbarProperty::Icon, &a));
        assert!(should_show_property(ToolbarProperty::BackgroundColor, &a));
        assert!(hide_image_section(&a, sel.is_multi()));
        assert!(!show_resize_handles(&sel));

        sel.add(para);
        let a = analyze_selection(&sel, &s);
        assert!(a.is_all_blocks && !a.is_same_type);
        assert!(!should_show_property(ToolbarProperty::Icon, &a));
        assert!(should_show_property(ToolbarProperty::BorderColor, &a));

        sel.add(shape);
        let a = analyze_selection(&sel, &s);
        assert!(a.is_mixed);
        assert!(!should_show_property(ToolbarProperty::BackgroundColor, &a));

        sel.set([shape]);
        let a = analyze_selection(&sel, &s);
        assert_eq!(
            visible_properties(&a),
            vec![
                ToolbarProperty::BackgroundColor,
                ToolbarProperty::CanNavigate,
                ToolbarProperty::ImageUrl,
                ToolbarProperty::ShapeKind,
            ]
        );
        assert!(!hide_image_section(&a, false));
        assert!(show_resize_handles(&sel));
    }
}
