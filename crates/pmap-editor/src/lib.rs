pub mod commands;
pub mod drag;
pub mod input;
pub mod navigation;
pub mod selection;
pub mod session;
pub mod shortcuts;

pub use commands::{Command, CommandStack, MapMutation};
pub use drag::{BlockMove, DragController, DragEffect};
pub use input::{InputEvent, Modifiers};
pub use navigation::{BreadcrumbConfig, BreadcrumbItem, BreadcrumbLabel, Breadcrumbs, elide};
pub use selection::{
    Selection, SelectionAnalysis, SelectionBox, ToolbarProperty, analyze_selection,
    hide_image_section, should_show_property, show_resize_handles, visible_properties,
};
pub use session::{MapSession, SessionConfig};
pub use shortcuts::{ShortcutAction, ShortcutMap};
