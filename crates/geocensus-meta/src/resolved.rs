//! The resolved column set for one (year, profile, table) request.

use std::collections::HashMap;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use geocensus_core::geo::{Profile, Year};
use geocensus_core::id::{ColumnId, TableId};

use crate::column::ColumnDescriptor;

/// Ordered id → descriptor map. Iteration order is feed order, which is also
/// the output column order of a materialized table.
#[derive(Debug, Clone)]
pub struct ResolvedColumnSet {
    year: Year,
    profile: Profile,
    table: TableId,
    version: u32,
    columns: Vec<Arc<ColumnDescriptor>>,
    index: HashMap<ColumnId, usize>,
}

impl ResolvedColumnSet {
    pub(crate) fn new(
        year: Year,
        profile: Profile,
        table: TableId,
        version: u32,
        columns: Vec<Arc<ColumnDescriptor>>,
    ) -> Self {
        let index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.id.clone(), i))
            .collect();
        Self {
            year,
            profile,
            table,
            version,
            columns,
            index,
        }
    }

    pub fn year(&self) -> Year {
        self.year
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn table(&self) -> &TableId {
        &self.table
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn get(&self, id: &ColumnId) -> Option<&Arc<ColumnDescriptor>> {
        self.index.get(id).map(|&i| &self.columns[i])
    }

    pub fn contains(&self, id: &ColumnId) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ColumnDescriptor>> {
        self.columns.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ColumnId> {
        self.columns.iter().map(|c| &c.id)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl Serialize for ResolvedColumnSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ResolvedColumnSet", 5)?;
        s.serialize_field("year", &self.year)?;
        s.serialize_field("profile", &self.profile)?;
        s.serialize_field("table", &self.table)?;
        s.serialize_field("version", &self.version)?;
        let cols: Vec<&ColumnDescriptor> = self.columns.iter().map(|c| c.as_ref()).collect();
        s.serialize_field("columns", &cols)?;
        s.end()
    }
}
