pub mod error;
pub mod geometry;
pub mod id;
pub mod model;
pub mod pages;
pub mod persistence;
pub mod store;
pub mod surface;
pub mod template;

pub use error::{MapError, PersistenceError, RecordKind};
pub use geometry::{CanvasConfig, Viewport, is_connection_in_viewport, is_element_in_viewport};
pub use id::{BlockId, ConnectionId, GroupId, PageId, SectionId};
pub use model::*;
pub use pages::{PageLink, PageTree};
pub use persistence::{
    InMemoryPersistence, MapPersistence, NewBlock, NewPage, PageData, PortalLink,
};
pub use store::{Change, ConnectionStyle, ElementStore, PositionOverlay, VisibleBlock};
pub use surface::{GridLayer, SurfaceFrame, SurfaceTransform, snap_rect};
pub use template::{CreatedRecords, Locale, Template, TemplateError, TemplateId, instantiate};
