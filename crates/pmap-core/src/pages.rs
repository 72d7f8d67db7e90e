//! The navigable page tree.
//!
//! Pages are nodes; edges go from a page to a page reachable from it,
//! either as a sub-map (`parent_id`) or through a portal block. The graph
//! must stay acyclic: a link that would make a page its own ancestor is
//! rejected before it is added.

use crate::error::MapError;
use crate::id::{BlockId, GroupId, PageId};
use crate::model::Page;
use petgraph::Direction;
use petgraph::algo::has_path_connecting;
use petgraph::graph::NodeIndex;
use petgraph::stable_graph::StableDiGraph;
use petgraph::visit::EdgeRef;
use std::collections::HashMap;

/// Why one page is reachable from another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLink {
    /// The target is a sub-map nested under the source.
    Child,
    /// A portal block on the source page leads to the target.
    Portal { block: BlockId },
}

#[derive(Debug, Clone, Default)]
pub struct PageTree {
    graph: StableDiGraph<Page, PageLink>,
    index: HashMap<PageId, NodeIndex>,
}

impl PageTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from persisted pages, in any order.
    pub fn from_pages<I: IntoIterator<Item = Page>>(pages: I) -> Result<Self, MapError> {
        let mut tree = Self::new();
        let pages: Vec<Page> = pages.into_iter().collect();
        for page in &pages {
            let idx = tree.graph.add_node(page.clone());
            tree.index.insert(page.id, idx);
        }
        for page in &pages {
            if let Some(parent) = page.parent_id {
                tree.add_link(parent, page.id, PageLink::Child)?;
            }
        }
        Ok(tree)
    }

    pub fn contains(&self, id: PageId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn page(&self, id: PageId) -> Option<&Page> {
        self.index.get(&id).map(|idx| &self.graph[*idx])
    }

    pub fn page_mut(&mut self, id: PageId) -> Option<&mut Page> {
        self.index.get(&id).copied().map(|idx| &mut self.graph[idx])
    }

    /// Pages of `group`, in creation order.
    pub fn pages_in_group(&self, group: Option<GroupId>) -> Vec<&Page> {
        let mut pages: Vec<&Page> = self
            .graph
            .node_weights()
            .filter(|p| p.group_id == group)
            .collect();
        pages.sort_by_key(|p| p.order);
        pages
    }

    /// Sub-maps nested directly under `id`.
    pub fn children(&self, id: PageId) -> Vec<PageId> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<&Page> = self
            .graph
            .edges_directed(idx, Direction::Outgoing)
            .filter(|e| *e.weight() == PageLink::Child)
            .map(|e| &self.graph[e.target()])
            .collect();
        out.sort_by_key(|p| p.order);
        out.into_iter().map(|p| p.id).collect()
    }

    /// True when `ancestor` can reach `descendant` through any link.
    pub fn reaches(&self, ancestor: PageId, descendant: PageId) -> bool {
        match (self.index.get(&ancestor), self.index.get(&descendant)) {
            (Some(&a), Some(&d)) => has_path_connecting(&self.graph, a, d, None),
            _ => false,
        }
    }

    /// Whether a link `from → to` would keep the graph acyclic.
    pub fn can_link(&self, from: PageId, to: PageId) -> bool {
        from != to && !self.reaches(to, from)
    }

    /// Record that `block` on `from` is a portal into `to`. A block carries
    /// at most one portal, so an earlier link from the same block is replaced.
    /// A rejected link leaves the earlier one in place.
    pub fn link_portal(&mut self, from: PageId, block: BlockId, to: PageId) -> Result<(), MapError> {
        let (a, b) = self.endpoints(from, to)?;
        self.check_acyclic(from, to)?;
        // The old edge leaves `from`, so it never lies on a path back into it
        self.unlink_portal(block);
        self.graph.add_edge(a, b, PageLink::Portal { block });
        Ok(())
    }

    /// Drop the portal link owned by `block`, if any.
    pub fn unlink_portal(&mut self, block: BlockId) {
        let edge = self
            .graph
            .edge_indices()
            .find(|e| self.graph[*e] == PageLink::Portal { block });
        if let Some(edge) = edge {
            self.graph.remove_edge(edge);
        }
    }

    /// Portal links leaving `id`, as `(block, target)` pairs.
    pub fn portals_from(&self, id: PageId) -> Vec<(BlockId, PageId)> {
        let Some(&idx) = self.index.get(&id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| match *e.weight() {
                PageLink::Portal { block } => Some((block, self.graph[e.target()].id)),
                PageLink::Child => None,
            })
            .collect()
    }

    fn add_link(&mut self, from: PageId, to: PageId, link: PageLink) -> Result<(), MapError> {
        let (a, b) = self.endpoints(from, to)?;
        self.check_acyclic(from, to)?;
        self.graph.add_edge(a, b, link);
        Ok(())
    }

    fn endpoints(&self, from: PageId, to: PageId) -> Result<(NodeIndex, NodeIndex), MapError> {
        match (self.index.get(&from), self.index.get(&to)) {
            (Some(&a), Some(&b)) => Ok((a, b)),
            (None, _) => Err(MapError::PageNotFound { page: from }),
            (_, None) => Err(MapError::PageNotFound { page: to }),
        }
    }

    fn check_acyclic(&self, from: PageId, to: PageId) -> Result<(), MapError> {
        if self.can_link(from, to) {
            return Ok(());
        }
        log::warn!("rejected page link {from} -> {to}: would create a cycle");
        Err(MapError::CycleDetected {
            parent: from,
            child: to,
        })
    }
}
