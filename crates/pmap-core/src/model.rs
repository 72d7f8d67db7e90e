//! Core data model for power-system maps.
//!
//! A map is a tree of `Page`s grouped into `Group`s. Each page owns its
//! `Block`s and `Connection`s. Block content is a tagged union keyed by
//! block type, so every render/edit site matches exhaustively on it.
//! Positions are absolute canvas units; connections never store
//! positions and always follow the blocks they reference.

use crate::id::{BlockId, ConnectionId, GroupId, PageId, SectionId};
use serde::{Deserialize, Serialize};

// ─── Geometry primitive ──────────────────────────────────────────────────

/// Axis-aligned rectangle in canvas units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px <= self.right() && py >= self.y && py <= self.bottom()
    }

    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// AABB overlap. Touching edges do not count as overlap.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.right() > other.x
            && self.y < other.bottom()
            && self.bottom() > other.y
    }

    /// True when `other` lies entirely inside `self` (edges inclusive).
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    /// Grow by `pad` on every side.
    pub fn padded(&self, pad: f32) -> Rect {
        Rect::new(
            self.x - pad,
            self.y - pad,
            self.width + pad * 2.0,
            self.height + pad * 2.0,
        )
    }

    pub fn with_origin(&self, x: f32, y: f32) -> Rect {
        Rect::new(x, y, self.width, self.height)
    }

    /// All four components finite, size non-negative.
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width.is_finite()
            && self.height.is_finite()
            && self.width >= 0.0
            && self.height >= 0.0
    }

    /// Normalize a drag rectangle from two corner points.
    pub fn from_corners(x1: f32, y1: f32, x2: f32, y2: f32) -> Rect {
        Rect::new(x1.min(x2), y1.min(y2), (x2 - x1).abs(), (y2 - y1).abs())
    }

    /// Union of an arbitrary number of rectangles. `None` for empty input.
    pub fn union_all<I: IntoIterator<Item = Rect>>(rects: I) -> Option<Rect> {
        rects.into_iter().reduce(|acc, r| acc.union(&r))
    }
}

// ─── Block content ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Alignment {
    #[default]
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SizeHint {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    #[default]
    Circle,
    Square,
    RoundedSquare,
    Triangle,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HoverCard {
    pub title: String,
    pub subtitle: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IconItem {
    pub title: String,
    pub description: String,
    pub image_url: Option<String>,
}

/// Typed block payload, one shape per block type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "kebab-case")]
pub enum BlockContent {
    #[serde(rename_all = "camelCase")]
    Heading {
        text: String,
        #[serde(default = "default_heading_level")]
        level: u8,
        #[serde(default)]
        alignment: Alignment,
    },
    Paragraph {
        text: String,
    },
    Section {
        title: String,
        #[serde(default)]
        body: String,
    },
    #[serde(rename_all = "camelCase")]
    Text {
        content: String,
        #[serde(default = "default_font_size")]
        font_size: f32,
        #[serde(default)]
        bold: bool,
        #[serde(default)]
        alignment: Alignment,
    },
    #[serde(rename_all = "camelCase")]
    Shape {
        #[serde(default)]
        shape: ShapeKind,
        #[serde(default)]
        title: String,
        #[serde(default)]
        image_url: Option<String>,
        #[serde(default)]
        hover_card: Option<HoverCard>,
    },
    #[serde(rename_all = "camelCase")]
    Image {
        #[serde(default)]
        image_url: String,
        #[serde(default)]
        caption: String,
    },
    Informative {
        icon: String,
        text: String,
    },
    Icon {
        title: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        alignment: Alignment,
    },
    IconGroup {
        icons: Vec<IconItem>,
    },
    UnorderedList {
        items: Vec<String>,
    },
    NumberedList {
        items: Vec<String>,
    },
    TagList {
        tags: Vec<String>,
    },
    Divider {},
    Spacer {
        #[serde(default)]
        size: SizeHint,
    },
    Stars {
        rating: f32,
        #[serde(default)]
        size: SizeHint,
    },
    Attributes {
        max: u32,
        current: u32,
        #[serde(default)]
        color: String,
    },
    #[serde(rename_all = "camelCase")]
    Dropdown {
        options: Vec<String>,
        #[serde(default)]
        selected_value: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MultiDropdown {
        options: Vec<String>,
        #[serde(default)]
        selected_values: Vec<String>,
    },
    /// Portal block: activating it navigates into `linked_page_id`.
    #[serde(rename_all = "camelCase")]
    Navigator {
        title: String,
        #[serde(default)]
        linked_page_id: Option<PageId>,
    },
}

fn default_heading_level() -> u8 {
    1
}

fn default_font_size() -> f32 {
    16.0
}

/// Discriminant of `BlockContent`, used for typed creation and analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Heading,
    Paragraph,
    Section,
    Text,
    Shape,
    Image,
    Informative,
    Icon,
    IconGroup,
    UnorderedList,
    NumberedList,
    TagList,
    Divider,
    Spacer,
    Stars,
    Attributes,
    Dropdown,
    MultiDropdown,
    Navigator,
}

/// Coarse grouping used by the contextual toolbar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ElementCategory {
    Block,
    Shape,
    Text,
}

impl BlockKind {
    pub const ALL: [BlockKind; 19] = [
        BlockKind::Heading,
        BlockKind::Paragraph,
        BlockKind::Section,
        BlockKind::Text,
        BlockKind::Shape,
        BlockKind::Image,
        BlockKind::Informative,
        BlockKind::Icon,
        BlockKind::IconGroup,
        BlockKind::UnorderedList,
        BlockKind::NumberedList,
        BlockKind::TagList,
        BlockKind::Divider,
        BlockKind::Spacer,
        BlockKind::Stars,
        BlockKind::Attributes,
        BlockKind::Dropdown,
        BlockKind::MultiDropdown,
        BlockKind::Navigator,
    ];

    pub fn category(self) -> ElementCategory {
        match self {
            BlockKind::Shape => ElementCategory::Shape,
            BlockKind::Text => ElementCategory::Text,
            _ => ElementCategory::Block,
        }
    }

    /// Size a freshly created block of this kind starts with.
    pub fn default_size(self) -> (f32, f32) {
        match self {
            BlockKind::Paragraph | BlockKind::Section => (800.0, 200.0),
            BlockKind::Image => (800.0, 400.0),
            BlockKind::Informative => (800.0, 50.0),
            BlockKind::Shape => (150.0, 150.0),
            BlockKind::Text => (50.0, 24.0),
            BlockKind::Icon | BlockKind::Navigator => (400.0, 350.0),
            BlockKind::Divider | BlockKind::Spacer => (800.0, 24.0),
            _ => (800.0, 120.0),
        }
    }

    /// Smallest size a resize may produce. Never above `default_size`.
    pub fn min_size(self) -> (f32, f32) {
        match self {
            BlockKind::Divider | BlockKind::Spacer => (100.0, 8.0),
            // One line of text plus padding
            BlockKind::Informative => (100.0, 50.0),
            _ => match self.category() {
                ElementCategory::Block => (100.0, 80.0),
                ElementCategory::Shape => (40.0, 40.0),
                ElementCategory::Text => (20.0, 16.0),
            },
        }
    }

    /// Empty payload for a block created from the toolbar.
    pub fn empty_content(self) -> BlockContent {
        match self {
            BlockKind::Heading => BlockContent::Heading {
                text: String::new(),
                level: default_heading_level(),
                alignment: Alignment::Left,
            },
            BlockKind::Paragraph => BlockContent::Paragraph {
                text: String::new(),
            },
            BlockKind::Section => BlockContent::Section {
                title: String::new(),
                body: String::new(),
            },
            BlockKind::Text => BlockContent::Text {
                content: String::new(),
                font_size: default_font_size(),
                bold: false,
                alignment: Alignment::Left,
            },
            BlockKind::Shape => BlockContent::Shape {
                shape: ShapeKind::Circle,
                title: String::new(),
                image_url: None,
                hover_card: None,
            },
            BlockKind::Image => BlockContent::Image {
                image_url: String::new(),
                caption: String::new(),
            },
            BlockKind::Informative => BlockContent::Informative {
                icon: "info".into(),
                text: String::new(),
            },
            BlockKind::Icon => BlockContent::Icon {
                title: String::new(),
                description: String::new(),
                alignment: Alignment::Center,
            },
            BlockKind::IconGroup => BlockContent::IconGroup { icons: Vec::new() },
            BlockKind::UnorderedList => BlockContent::UnorderedList { items: Vec::new() },
            BlockKind::NumberedList => BlockContent::NumberedList { items: Vec::new() },
            BlockKind::TagList => BlockContent::TagList { tags: Vec::new() },
            BlockKind::Divider => BlockContent::Divider {},
            BlockKind::Spacer => BlockContent::Spacer {
                size: SizeHint::Medium,
            },
            BlockKind::Stars => BlockContent::Stars {
                rating: 0.0,
                size: SizeHint::Medium,
            },
            BlockKind::Attributes => BlockContent::Attributes {
                max: 10,
                current: 0,
                color: String::new(),
            },
            BlockKind::Dropdown => BlockContent::Dropdown {
                options: Vec::new(),
                selected_value: None,
            },
            BlockKind::MultiDropdown => BlockContent::MultiDropdown {
                options: Vec::new(),
                selected_values: Vec::new(),
            },
            BlockKind::Navigator => BlockContent::Navigator {
                title: String::new(),
                linked_page_id: None,
            },
        }
    }
}

impl BlockContent {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockContent::Heading { .. } => BlockKind::Heading,
            BlockContent::Paragraph { .. } => BlockKind::Paragraph,
            BlockContent::Section { .. } => BlockKind::Section,
            BlockContent::Text { .. } => BlockKind::Text,
            BlockContent::Shape { .. } => BlockKind::Shape,
            BlockContent::Image { .. } => BlockKind::Image,
            BlockContent::Informative { .. } => BlockKind::Informative,
            BlockContent::Icon { .. } => BlockKind::Icon,
            BlockContent::IconGroup { .. } => BlockKind::IconGroup,
            BlockContent::UnorderedList { .. } => BlockKind::UnorderedList,
            BlockContent::NumberedList { .. } => BlockKind::NumberedList,
            BlockContent::TagList { .. } => BlockKind::TagList,
            BlockContent::Divider {} => BlockKind::Divider,
            BlockContent::Spacer { .. } => BlockKind::Spacer,
            BlockContent::Stars { .. } => BlockKind::Stars,
            BlockContent::Attributes { .. } => BlockKind::Attributes,
            BlockContent::Dropdown { .. } => BlockKind::Dropdown,
            BlockContent::MultiDropdown { .. } => BlockKind::MultiDropdown,
            BlockContent::Navigator { .. } => BlockKind::Navigator,
        }
    }

    /// The page a portal block leads to, if any.
    pub fn portal_target(&self) -> Option<PageId> {
        match self {
            BlockContent::Navigator { linked_page_id, .. } => *linked_page_id,
            _ => None,
        }
    }

    /// Short human-readable label, used for hover text and debug output.
    pub fn label(&self) -> &str {
        match self {
            BlockContent::Heading { text, .. }
            | BlockContent::Paragraph { text }
            | BlockContent::Informative { text, .. } => text,
            BlockContent::Section { title, .. }
            | BlockContent::Shape { title, .. }
            | BlockContent::Icon { title, .. }
            | BlockContent::Navigator { title, .. } => title,
            BlockContent::Text { content, .. } => content,
            BlockContent::Image { caption, .. } => caption,
            _ => "",
        }
    }
}

// ─── Page elements ───────────────────────────────────────────────────────

/// A positioned, sized, typed node on exactly one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    pub id: BlockId,
    pub page_id: PageId,
    #[serde(default)]
    pub section_id: Option<SectionId>,
    #[serde(flatten)]
    pub rect: Rect,
    /// Paint order within the page; higher is on top.
    #[serde(default)]
    pub z_index: i32,
    #[serde(flatten)]
    pub content: BlockContent,
}

impl Block {
    pub fn kind(&self) -> BlockKind {
        self.content.kind()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionKind {
    #[default]
    Arrow,
    Line,
}

/// Where a connection ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConnectionTarget {
    #[serde(rename_all = "camelCase")]
    Block { to_block_id: BlockId },
    #[serde(rename_all = "camelCase")]
    Point { to_x: f32, to_y: f32 },
    /// Neither a block nor a point was recorded.
    Unanchored {},
}

impl ConnectionTarget {
    pub fn block(&self) -> Option<BlockId> {
        match self {
            ConnectionTarget::Block { to_block_id } => Some(*to_block_id),
            ConnectionTarget::Point { .. } | ConnectionTarget::Unanchored {} => None,
        }
    }
}

/// A directed link from a block to another block or to a free point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    pub id: ConnectionId,
    pub page_id: PageId,
    pub from_block_id: BlockId,
    #[serde(flatten)]
    pub target: ConnectionTarget,
    #[serde(default)]
    pub kind: ConnectionKind,
    #[serde(default = "default_connection_color")]
    pub color: String,
    #[serde(default = "default_stroke_width")]
    pub stroke_width: f32,
    #[serde(default)]
    pub label: Option<String>,
}

fn default_connection_color() -> String {
    "#4A5568".into()
}

fn default_stroke_width() -> f32 {
    2.0
}

impl Connection {
    pub fn new(page_id: PageId, from: BlockId, target: ConnectionTarget) -> Self {
        Self {
            id: ConnectionId::fresh(),
            page_id,
            from_block_id: from,
            target,
            kind: ConnectionKind::default(),
            color: default_connection_color(),
            stroke_width: default_stroke_width(),
            label: None,
        }
    }

    /// True when either endpoint is `block`.
    pub fn references(&self, block: BlockId) -> bool {
        self.from_block_id == block || self.target.block() == Some(block)
    }
}

// ─── Pages, groups, sections ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridSettings {
    pub enabled: bool,
    pub size: f32,
}

impl Default for GridSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            size: 20.0,
        }
    }
}

/// One canvas. May be nested under a parent page to form a sub-map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub name: String,
    #[serde(default)]
    pub group_id: Option<GroupId>,
    #[serde(default)]
    pub parent_id: Option<PageId>,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub grid: GridSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    #[serde(default)]
    pub order: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: SectionId,
    pub page_id: PageId,
    pub title: String,
    #[serde(default)]
    pub order: u32,
}
