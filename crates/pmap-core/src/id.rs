use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Process-wide string interner shared by every id kind.
///
/// Only strings live here; no map state is shared between sessions.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

macro_rules! interned_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(Spur);

        impl $name {
            /// Intern an existing id string (e.g. one loaded from persistence).
            pub fn intern(s: &str) -> Self {
                $name(INTERNER.get_or_intern(s))
            }

            /// Resolve back to a string slice.
            pub fn as_str(&self) -> &str {
                INTERNER.resolve(&self.0)
            }

            /// Generate a fresh id that cannot collide with persisted ones.
            pub fn fresh() -> Self {
                Self::intern(&format!("{}-{}", $prefix, uuid::Uuid::new_v4()))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}:{}", $prefix, self.as_str())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Ok($name::intern(&s))
            }
        }
    };
}

interned_id!(
    /// A block on a page. 4 bytes, `Copy`, O(1) hash and compare.
    BlockId,
    "block"
);
interned_id!(
    /// A connection between a block and a block or free point.
    ConnectionId,
    "conn"
);
interned_id!(
    /// A page (map). Pages form the navigable tree.
    PageId,
    "page"
);
interned_id!(
    /// A named collection of pages.
    GroupId,
    "group"
);
interned_id!(
    /// A section inside a page, created by templates.
    SectionId,
    "section"
);
