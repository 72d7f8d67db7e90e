//! Error types for map mutations, persistence and navigation.

use crate::id::{BlockId, ConnectionId, PageId};
use std::fmt;

/// Which kind of record a persistence lookup was about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Group,
    Page,
    Section,
    Block,
    Connection,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    NotFound { kind: RecordKind, id: String },
    Backend(String),
}

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { kind, id } => write!(f, "record not found ({kind:?}, id={id})"),
            Self::Backend(msg) => write!(f, "persistence backend error: {msg}"),
        }
    }
}

impl std::error::Error for PersistenceError {}

/// Errors raised by the element store, page tree and navigation.
///
/// Every variant blocks the action that raised it; nothing is partially applied.
#[derive(Debug, Clone, PartialEq)]
pub enum MapError {
    BlockNotFound { block: BlockId },
    /// The block exists, but on a different page than the one being edited.
    ForeignBlock { block: BlockId, page: PageId },
    ConnectionNotFound { connection: ConnectionId },
    PageNotFound { page: PageId },
    /// Non-finite coordinates, or a size below the configured minimum.
    InvalidGeometry { x: f32, y: f32, width: f32, height: f32 },
    /// Linking `child` under `parent` would make a page its own ancestor.
    CycleDetected { parent: PageId, child: PageId },
    NotInBreadcrumbs { page: PageId },
    CannotPopRoot,
    /// A destructive action was confirmed for a different page.
    ConfirmationMismatch { expected: PageId, confirmed: PageId },
    Persistence(PersistenceError),
}

impl fmt::Display for MapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlockNotFound { block } => write!(f, "block not found (id={block})"),
            Self::ForeignBlock { block, page } => {
                write!(f, "block {block} does not belong to page {page}")
            }
            Self::ConnectionNotFound { connection } => {
                write!(f, "connection not found (id={connection})")
            }
            Self::PageNotFound { page } => write!(f, "page not found (id={page})"),
            Self::InvalidGeometry {
                x,
                y,
                width,
                height,
            } => write!(
                f,
                "invalid block geometry (x={x}, y={y}, width={width}, height={height})"
            ),
            Self::CycleDetected { parent, child } => write!(
                f,
                "linking page {child} under {parent} would create a navigation cycle"
            ),
            Self::NotInBreadcrumbs { page } => {
                write!(f, "page {page} is not in the breadcrumb trail")
            }
            Self::CannotPopRoot => f.write_str("the root breadcrumb cannot be popped"),
            Self::ConfirmationMismatch {
                expected,
                confirmed,
            } => write!(
                f,
                "confirmation was given for page {confirmed}, not {expected}"
            ),
            Self::Persistence(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for MapError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Persistence(err) => Some(err),
            _ => None,
        }
    }
}

impl From<PersistenceError> for MapError {
    fn from(err: PersistenceError) -> Self {
        Self::Persistence(err)
    }
}
