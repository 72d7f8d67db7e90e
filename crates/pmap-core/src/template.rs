//! Template instantiation: "start from a template" for a new power system.
//!
//! A template is declarative and id-free: an overview page, then groups of
//! pages, each page a list of sections holding typed block content. The
//! instantiator walks it in order and issues one persistence creation call
//! per record, so creation order is template order. Navigator blocks name
//! their target page; they are linked in a second pass once every page id
//! is known.
//!
//! Instantiation is not idempotent. Running it twice creates two
//! independent copies.

use crate::error::PersistenceError;
use crate::id::{BlockId, GroupId, PageId, SectionId};
use crate::model::{BlockContent, Rect};
use crate::persistence::{MapPersistence, NewBlock, NewPage};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Vertical gap between blocks of one section.
const BLOCK_GAP: f32 = 40.0;
/// Extra gap before a new section starts.
const SECTION_GAP: f32 = 120.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Locale {
    En,
    Pt,
}

impl Locale {
    pub const ALL: [Locale; 2] = [Locale::En, Locale::Pt];

    pub fn code(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Pt => "pt",
        }
    }
}

impl FromStr for Locale {
    type Err = TemplateError;

    /// Accepts a bare language code or a region-qualified tag (`pt-BR`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lang = s.split(['-', '_']).next().unwrap_or_default();
        match lang.to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "pt" => Ok(Locale::Pt),
            _ => Err(TemplateError::UnsupportedLocale(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TemplateId {
    Magic,
    Martial,
}

impl TemplateId {
    pub const ALL: [TemplateId; 2] = [TemplateId::Magic, TemplateId::Martial];

    pub fn as_str(self) -> &'static str {
        match self {
            TemplateId::Magic => "magic",
            TemplateId::Martial => "martial",
        }
    }
}

impl FromStr for TemplateId {
    type Err = TemplateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "magic" => Ok(TemplateId::Magic),
            "martial" => Ok(TemplateId::Martial),
            _ => Err(TemplateError::UnknownTemplate(s.to_string())),
        }
    }
}

// ─── Template shape ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Template {
    pub overview: TemplatePage,
    #[serde(default)]
    pub groups: Vec<TemplateGroup>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateGroup {
    pub name: String,
    pub pages: Vec<TemplatePage>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplatePage {
    pub name: String,
    #[serde(default)]
    pub sections: Vec<TemplateSection>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateSection {
    pub title: String,
    #[serde(default)]
    pub blocks: Vec<TemplateBlock>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateBlock {
    #[serde(flatten)]
    pub content: BlockContent,
    /// Name of the page a navigator block leads to.
    #[serde(default)]
    pub target_page: Option<String>,
}

impl Template {
    pub fn from_json(json: &str) -> Result<Self, TemplateError> {
        serde_json::from_str(json).map_err(TemplateError::Malformed)
    }

    /// One of the bundled templates.
    pub fn builtin(id: TemplateId, locale: Locale) -> Result<Self, TemplateError> {
        let json = match (id, locale) {
            (TemplateId::Magic, Locale::En) => include_str!("../templates/magic.en.json"),
            (TemplateId::Magic, Locale::Pt) => include_str!("../templates/magic.pt.json"),
            (TemplateId::Martial, Locale::En) => include_str!("../templates/martial.en.json"),
            (TemplateId::Martial, Locale::Pt) => include_str!("../templates/martial.pt.json"),
        };
        Self::from_json(json)
    }

    /// Pages in creation order: the overview first, then each group's pages.
    pub fn pages(&self) -> impl Iterator<Item = (Option<usize>, &TemplatePage)> {
        std::iter::once((None, &self.overview)).chain(
            self.groups
                .iter()
                .enumerate()
                .flat_map(|(g, group)| group.pages.iter().map(move |p| (Some(g), p))),
        )
    }
}

// ─── Result and errors ───────────────────────────────────────────────────

/// Every record created by one instantiation, in creation order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRecords {
    pub groups: Vec<GroupId>,
    pub pages: Vec<PageId>,
    pub sections: Vec<SectionId>,
    pub blocks: Vec<BlockId>,
}

impl CreatedRecords {
    /// The page to open after instantiation: the overview.
    pub fn first_page(&self) -> Option<PageId> {
        self.pages.first().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
            && self.pages.is_empty()
            && self.sections.is_empty()
            && self.blocks.is_empty()
    }
}

#[derive(Debug)]
pub enum TemplateError {
    UnknownTemplate(String),
    UnsupportedLocale(String),
    Malformed(serde_json::Error),
    /// A creation call failed. Records listed in `created` were already
    /// written and are not rolled back.
    Creation {
        created: Box<CreatedRecords>,
        source: PersistenceError,
    },
}

impl fmt::Display for TemplateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownTemplate(id) => write!(f, "unknown template: {id}"),
            Self::UnsupportedLocale(locale) => write!(f, "unsupported template locale: {locale}"),
            Self::Malformed(err) => write!(f, "malformed template: {err}"),
            Self::Creation { created, source } => write!(
                f,
                "template instantiation failed after creating {} pages and {} blocks: {source}",
                created.pages.len(),
                created.blocks.len()
            ),
        }
    }
}

impl std::error::Error for TemplateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Malformed(err) => Some(err),
            Self::Creation { source, .. } => Some(source),
            _ => None,
        }
    }
}

// ─── Instantiation ───────────────────────────────────────────────────────

struct PendingLink {
    block: BlockId,
    content: BlockContent,
    target: String,
}

struct Instantiator<'a> {
    backend: &'a mut dyn MapPersistence,
    created: CreatedRecords,
    pages_by_name: HashMap<String, PageId>,
    links: Vec<PendingLink>,
}

impl Instantiator<'_> {
    fn fail(self, source: PersistenceError) -> TemplateError {
        log::warn!(
            "template instantiation stopped after {} records: {source}",
            self.created.pages.len() + self.created.blocks.len()
        );
        TemplateError::Creation {
            created: Box::new(self.created),
            source,
        }
    }

    fn page(
        &mut self,
        page: &TemplatePage,
        group: Option<GroupId>,
        order: u32,
    ) -> Result<(), PersistenceError> {
        let page_id = self.backend.create_page(NewPage {
            name: page.name.clone(),
            group_id: group,
            parent_id: None,
            order,
        })?;
        self.created.pages.push(page_id);
        self.pages_by_name.entry(page.name.clone()).or_insert(page_id);

        let mut y = 0.0;
        for (s, section) in page.sections.iter().enumerate() {
            let section_id = self
                .backend
                .create_section(page_id, &section.title, s as u32)?;
            self.created.sections.push(section_id);
            for block in &section.blocks {
                let (width, height) = block.content.kind().default_size();
                let block_id = self.backend.create_block(NewBlock {
                    page_id,
                    section_id: Some(section_id),
                    rect: Rect::new(0.0, y, width, height),
                    content: block.content.clone(),
                })?;
                self.created.blocks.push(block_id);
                y += height + BLOCK_GAP;
                if let Some(target) = &block.target_page {
                    self.links.push(PendingLink {
                        block: block_id,
                        content: block.content.clone(),
                        target: target.clone(),
                    });
                }
            }
            y += SECTION_GAP;
        }
        Ok(())
    }

    fn run(&mut self, template: &Template) -> Result<(), PersistenceError> {
        self.page(&template.overview, None, 0)?;
        for (g, group) in template.groups.iter().enumerate() {
            let group_id = self.backend.create_group(&group.name, g as u32)?;
            self.created.groups.push(group_id);
            for (p, page) in group.pages.iter().enumerate() {
                self.page(page, Some(group_id), p as u32)?;
            }
        }
        self.link_navigators()
    }

    fn link_navigators(&mut self) -> Result<(), PersistenceError> {
        for link in std::mem::take(&mut self.links) {
            let Some(&target) = self.pages_by_name.get(&link.target) else {
                log::warn!("navigator {} names unknown page {:?}", link.block, link.target);
                continue;
            };
            let content = match link.content {
                BlockContent::Navigator { title, .. } => BlockContent::Navigator {
                    title,
                    linked_page_id: Some(target),
                },
                other => {
                    log::warn!("block {} has a target page but is {:?}", link.block, other.kind());
                    continue;
                }
            };
            self.backend.update_block_content(link.block, &content)?;
        }
        Ok(())
    }
}

/// Create every record of `template` through `backend`.
///
/// Returns all created ids; `first_page()` is the overview. On failure,
/// nothing is rolled back and the error lists what was created.
pub fn instantiate(
    template: &Template,
    backend: &mut dyn MapPersistence,
) -> Result<CreatedRecords, TemplateError> {
    let mut run = Instantiator {
        backend,
        created: CreatedRecords::default(),
        pages_by_name: HashMap::new(),
        links: Vec::new(),
    };
    match run.run(template) {
        Ok(()) => {
            log::debug!(
                "instantiated template: {} groups, {} pages, {} blocks",
                run.created.groups.len(),
                run.created.pages.len(),
                run.created.blocks.len()
            );
            Ok(run.created)
        }
        Err(err) => Err(run.fail(err)),
    }
}

/// Parse the id and locale strings, then instantiate a bundled template.
pub fn instantiate_builtin(
    template_id: &str,
    locale: &str,
    backend: &mut dyn MapPersistence,
) -> Result<CreatedRecords, TemplateError> {
    let id: TemplateId = template_id.parse()?;
    let locale: Locale = locale.parse()?;
    let template = Template::builtin(id, locale)?;
    instantiate(&template, backend)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::InMemoryPersistence;

    #[test]
    fn every_builtin_parses() {
        for id in TemplateId::ALL {
            for locale in Locale::ALL {
                let t = Template::builtin(id, locale).unwrap();
                assert!(!t.groups.is_empty(), "{} {}", id.as_str(), locale.code());
                assert!(t.pages().count() > 1);
            }
        }
    }

    #[test]
    fn locale_parsing() {
        assert_eq!("pt-BR".parse::<Locale>().unwrap(), Locale::Pt);
        assert_eq!("EN".parse::<Locale>().unwrap(), Locale::En);
        assert!(matches!(
            "fr".parse::<Locale>(),
            Err(TemplateError::UnsupportedLocale(_))
        ));
        assert!(matches!(
            "necromancy".parse::<TemplateId>(),
            Err(TemplateError::UnknownTemplate(_))
        ));
    }

    #[test]
    fn creation_order_follows_template_order() {
        let template = Template::builtin(TemplateId::Magic, Locale::En).unwrap();
        let mut db = InMemoryPersistence::new();
        let created = instantiate(&template, &mut db).unwrap();

        let names: Vec<&str> = db.pages().iter().map(|p| p.name.as_str()).collect();
        let expected: Vec<&str> = template.pages().map(|(_, p)| p.name.as_str()).collect();
        assert_eq!(names, expected);
        assert_eq!(db.pages()[0].group_id, None);
        assert_eq!(created.first_page(), Some(db.pages()[0].id));
    }

    #[test]
    fn navigators_link_to_named_page() {
        let template = Template::builtin(TemplateId::Martial, Locale::Pt).unwrap();
        let mut db = InMemoryPersistence::new();
        instantiate(&template, &mut db).unwrap();

        let target = db
            .pages()
            .iter()
            .find(|p| p.name == "Posturas de Combate")
            .map(|p| p.id)
            .unwrap();
        let linked: Vec<_> = db
            .blocks()
            .iter()
            .filter_map(|b| b.content.portal_target())
            .collect();
        assert_eq!(linked, vec![target]);
    }

    #[test]
    fn builtins_share_one_group_of_four_pages() {
        for id in TemplateId::ALL {
            for locale in Locale::ALL {
                let template = Template::builtin(id, locale).unwrap();
                let mut db = InMemoryPersistence::new();
                let created = instantiate(&template, &mut db).unwrap();

                assert_eq!(created.groups.len(), 1, "{} {}", id.as_str(), locale.code());
                assert_eq!(created.pages.len(), 5);
                assert_eq!(created.blocks.len(), 71);
                assert!(db.pages()[1..].iter().all(|p| p.group_id == Some(created.groups[0])));
            }
        }
    }

    #[test]
    fn malformed_json_is_reported() {
        let err = Template::from_json(r#"{"groups": []}"#).unwrap_err();
        assert!(matches!(err, TemplateError::Malformed(_)));
    }
}
