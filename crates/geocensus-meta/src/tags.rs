//! Tag registry: units, subsections, sections, sources, and licenses.
//!
//! Every descriptor carries the source, license, and country-section tags of
//! its datapack plus one unit tag and one or more subsection tags.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use geocensus_core::id::TagId;

use crate::error::{MetaError, Result};

const BUILTIN_TAGS: &str = include_str!("../data/tags.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Unit,
    Subsection,
    Section,
    Source,
    License,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TagKind::Unit => "unit",
            TagKind::Subsection => "subsection",
            TagKind::Section => "section",
            TagKind::Source => "source",
            TagKind::License => "license",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: TagId,
    pub kind: TagKind,
    pub name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct TagDef {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct TagDocument {
    units: Vec<TagDef>,
    subsections: Vec<TagDef>,
    sections: Vec<TagDef>,
    sources: Vec<TagDef>,
    licenses: Vec<TagDef>,
}

/// Lookup table from (kind, id) to a shared tag.
///
/// In strict mode an unknown id is an error. In lenient mode a placeholder
/// tag named after the id is synthesized once and reused.
#[derive(Debug)]
pub struct TagRegistry {
    tags: HashMap<(TagKind, TagId), Arc<Tag>>,
    synthesized: Mutex<HashMap<(TagKind, TagId), Arc<Tag>>>,
    strict: bool,
}

impl TagRegistry {
    pub fn new(strict: bool) -> Self {
        Self {
            tags: HashMap::new(),
            synthesized: Mutex::new(HashMap::new()),
            strict,
        }
    }

    /// Registry with the tags shipped in `data/tags.yaml`.
    pub fn builtin(strict: bool) -> Result<Self> {
        let mut reg = Self::new(strict);
        reg.extend_from_yaml(BUILTIN_TAGS)?;
        Ok(reg)
    }

    pub fn from_yaml(src: &str, strict: bool) -> Result<Self> {
        let mut reg = Self::new(strict);
        reg.extend_from_yaml(src)?;
        Ok(reg)
    }

    pub fn extend_from_yaml(&mut self, src: &str) -> Result<()> {
        let doc: TagDocument = serde_yaml::from_str(src)?;
        let groups = [
            (TagKind::Unit, doc.units),
            (TagKind::Subsection, doc.subsections),
            (TagKind::Section, doc.sections),
            (TagKind::Source, doc.sources),
            (TagKind::License, doc.licenses),
        ];
        for (kind, defs) in groups {
            for def in defs {
                self.insert(Tag {
                    id: TagId::new(def.id),
                    kind,
                    name: def.name,
                    description: def.description,
                });
            }
        }
        Ok(())
    }

    pub fn insert(&mut self, tag: Tag) {
        self.tags.insert((tag.kind, tag.id.clone()), Arc::new(tag));
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn get(&self, kind: TagKind, id: &str) -> Result<Arc<Tag>> {
        let key = (kind, TagId::new(id));
        if let Some(tag) = self.tags.get(&key) {
            return Ok(Arc::clone(tag));
        }
        if self.strict {
            return Err(MetaError::UnknownTag { kind, id: key.1 });
        }

        let mut synthesized = self
            .synthesized
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let tag = synthesized.entry(key).or_insert_with_key(|(kind, id)| {
            warn!(%kind, tag = %id, "synthesizing placeholder tag");
            Arc::new(Tag {
                id: id.clone(),
                kind: *kind,
                name: id.to_string(),
                description: String::new(),
            })
        });
        Ok(Arc::clone(tag))
    }
}
