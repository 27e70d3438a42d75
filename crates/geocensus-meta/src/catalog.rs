//! Per-year table catalog: which tables each datapack release publishes.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use geocensus_core::geo::{Profile, Year};
use geocensus_core::id::TableId;

use crate::deps::DependencyMap;
use crate::error::{MetaError, Result};

const BUILTIN_TABLES: &str = include_str!("../data/tables.yaml");

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearTables {
    pub profile: Profile,
    pub tables: Vec<TableId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCatalog {
    pub years: BTreeMap<Year, YearTables>,
}

impl TableCatalog {
    pub fn builtin() -> Result<Self> {
        Self::from_yaml(BUILTIN_TABLES)
    }

    pub fn from_yaml(src: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(src)?)
    }

    pub fn tables(&self, year: Year) -> Result<&[TableId]> {
        self.years
            .get(&year)
            .map(|y| y.tables.as_slice())
            .ok_or(MetaError::MissingFeed { year })
    }

    pub fn contains(&self, year: Year, table: &TableId) -> bool {
        self.years
            .get(&year)
            .map(|y| y.tables.contains(table))
            .unwrap_or(false)
    }

    /// Prerequisites of catalogued tables that the catalog does not publish
    /// for the same year, as `(year, table, missing prerequisite)`.
    pub fn unknown_prerequisites(&self, deps: &DependencyMap) -> Vec<(Year, TableId, TableId)> {
        let mut out = Vec::new();
        for (year, entry) in &self.years {
            let known: BTreeSet<&TableId> = entry.tables.iter().collect();
            for table in &entry.tables {
                for prereq in deps.prerequisites(table) {
                    if !known.contains(&prereq) {
                        out.push((*year, table.clone(), prereq));
                    }
                }
            }
        }
        out
    }
}
