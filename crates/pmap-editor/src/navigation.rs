//! Breadcrumb navigation through nested pages.
//!
//! The stack always holds at least the root page. Entering a portal pushes,
//! clicking a crumb truncates back to it. Display labels are elided to a
//! character budget; the full name stays available for a tooltip.

use pmap_core::{MapError, PageId};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreadcrumbConfig {
    pub max_label_chars: usize,
}

impl Default for BreadcrumbConfig {
    fn default() -> Self {
        Self { max_label_chars: 20 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreadcrumbItem {
    pub id: PageId,
    pub name: String,
}

/// A crumb ready for the header bar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreadcrumbLabel {
    pub id: PageId,
    pub label: String,
    /// Full name when `label` was elided.
    pub tooltip: Option<String>,
    pub is_current: bool,
}

#[derive(Debug, Clone)]
pub struct Breadcrumbs {
    stack: Vec<BreadcrumbItem>,
    config: BreadcrumbConfig,
}

impl Breadcrumbs {
    pub fn new(root: PageId, name: impl Into<String>) -> Self {
        Self::with_config(root, name, BreadcrumbConfig::default())
    }

    pub fn with_config(root: PageId, name: impl Into<String>, config: BreadcrumbConfig) -> Self {
        Self {
            stack: vec![BreadcrumbItem {
                id: root,
                name: name.into(),
            }],
            config,
        }
    }

    pub fn items(&self) -> &[BreadcrumbItem] {
        &self.stack
    }

    pub fn ids(&self) -> Vec<PageId> {
        self.stack.iter().map(|i| i.id).collect()
    }

    pub fn root(&self) -> PageId {
        self.stack[0].id
    }

    pub fn current(&self) -> PageId {
        self.stack[self.stack.len() - 1].id
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.stack.iter().any(|i| i.id == id)
    }

    /// Push `id` as the new current page. Entering a page already on the
    /// stack truncates back to it instead of growing a loop.
    pub fn enter(&mut self, id: PageId, name: impl Into<String>) {
        if let Some(pos) = self.position(id) {
            self.stack.truncate(pos + 1);
            return;
        }
        let name = name.into();
        log::debug!("breadcrumbs: enter {id} ({name})");
        self.stack.push(BreadcrumbItem { id, name });
    }

    /// Truncate to `id`, discarding deeper entries. Returns the new current page.
    pub fn navigate_to(&mut self, id: PageId) -> Result<PageId, MapError> {
        let pos = self.position(id).ok_or(MapError::NotInBreadcrumbs { page: id })?;
        let dropped = self.stack.len() - pos - 1;
        self.stack.truncate(pos + 1);
        log::debug!("breadcrumbs: back to {id}, dropped {dropped}");
        Ok(id)
    }

    /// Pop one level. The root cannot be popped.
    pub fn back(&mut self) -> Result<PageId, MapError> {
        if self.stack.len() <= 1 {
            return Err(MapError::CannotPopRoot);
        }
        self.stack.pop();
        Ok(self.current())
    }

    pub fn labels(&self) -> Vec<BreadcrumbLabel> {
        let current = self.current();
        self.stack
            .iter()
            .map(|item| {
                let label = elide(&item.name, self.config.max_label_chars);
                let tooltip = (label != item.name).then(|| item.name.clone());
                BreadcrumbLabel {
                    id: item.id,
                    label,
                    tooltip,
                    is_current: item.id == current,
                }
            })
            .collect()
    }

    fn position(&self, id: PageId) -> Option<usize> {
        self.stack.iter().position(|i| i.id == id)
    }
}

/// Cut `name` to at most `max` characters, ending in `…` when cut.
pub fn elide(name: &str, max: usize) -> String {
    if name.chars().count() <= max {
        return name.to_string();
    }
    let kept: String = name.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", kept.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crumbs() -> (Breadcrumbs, PageId, PageId, PageId) {
        let root = PageId::intern("nav-root");
        let magic = PageId::intern("nav-magic");
        let sub = PageId::intern("nav-sub-magic");
        let mut b = Breadcrumbs::new(root, "Root");
        b.enter(magic, "Magic");
        b.enter(sub, "SubMagic");
        (b, root, magic, sub)
    }

    #[test]
    fn navigate_to_truncates() {
        let (mut b, root, magic, sub) = crumbs();
        assert_eq!(b.ids(), vec![root, magic, sub]);
        assert_eq!(b.navigate_to(magic).unwrap(), magic);
        assert_eq!(b.ids(), vec![root, magic]);
        assert_eq!(b.current(), magic);
    }

    #[test]
    fn navigate_to_unknown_fails() {
        let (mut b, ..) = crumbs();
        let err = b.navigate_to(PageId::intern("nav-elsewhere")).unwrap_err();
        assert!(matches!(err, MapError::NotInBreadcrumbs { .. }));
        assert_eq!(b.depth(), 3);
    }

    #[test]
    fn root_cannot_be_popped() {
        let (mut b, root, magic, _) = crumbs();
        assert_eq!(b.back().unwrap(), magic);
        assert_eq!(b.back().unwrap(), root);
        assert!(matches!(b.back(), Err(MapError::CannotPopRoot)));
        assert_eq!(b.ids(), vec![root]);
    }

    #[test]
    fn re_entering_an_ancestor_truncates() {
        let (mut b, root, magic, _) = crumbs();
        b.enter(magic, "Magic");
        assert_eq!(b.ids(), vec![root, magic]);
    }

    #[test]
    fn long_names_are_elided_with_tooltip() {
        let root = PageId::intern("nav-long-root");
        let mut b = Breadcrumbs::new(root, "Root");
        let deep = PageId::intern("nav-long");
        b.enter(deep, "The Elemental Convergence of Ages");
        let labels = b.labels();
        assert_eq!(labels[0].tooltip, None);
        assert_eq!(labels[1].label, "The Elemental Conve…");
        assert_eq!(labels[1].label.chars().count(), 20);
        assert_eq!(
            labels[1].tooltip.as_deref(),
            Some("The Elemental Convergence of Ages")
        );
        assert!(labels[1].is_current);
    }

    #[test]
    fn elide_handles_multibyte() {
        assert_eq!(elide("Técnicas Marciais Avançadas", 10), "Técnicas…");
        assert_eq!(elide("curto", 10), "curto");
    }
}
