//! Column descriptors and their relation targets.
//!
//! Descriptors are immutable once built and shared via `Arc`, so a target can
//! only ever point at a fully-formed descriptor. There is no null target.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use geocensus_core::id::ColumnId;
use geocensus_core::schema::DataType;

use crate::tags::Tag;

/// Highest weight a descriptor may carry. Weight 0 hides the column.
pub const MAX_WEIGHT: u8 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    #[default]
    Sum,
    Median,
    Average,
}

impl Aggregate {
    /// Median/average measures point at their base population as a universe.
    pub fn denominator_relation(&self) -> Relation {
        match self {
            Aggregate::Sum => Relation::Denominator,
            Aggregate::Median | Aggregate::Average => Relation::Universe,
        }
    }
}

impl FromStr for Aggregate {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregate::Sum),
            "median" => Ok(Aggregate::Median),
            "average" => Ok(Aggregate::Average),
            other => Err(format!("unknown aggregate '{other}'")),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Aggregate::Sum => "sum",
            Aggregate::Median => "median",
            Aggregate::Average => "average",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Denominator,
    Universe,
    GeometryReference,
}

/// One outgoing edge of a descriptor.
#[derive(Debug, Clone)]
pub struct Target {
    pub column: Arc<ColumnDescriptor>,
    pub relation: Relation,
}

impl Serialize for Target {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Target", 2)?;
        s.serialize_field("column", &self.column.id)?;
        s.serialize_field("relation", &self.relation)?;
        s.end()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub name: String,
    pub description: String,
    pub data_type: DataType,
    pub weight: u8,
    pub aggregate: Aggregate,
    pub tags: Vec<Arc<Tag>>,
    pub targets: Vec<Target>,
}

impl ColumnDescriptor {
    pub fn is_hidden(&self) -> bool {
        self.weight == 0
    }

    /// Targets carrying `relation`, in insertion order.
    pub fn targets_with(&self, relation: Relation) -> impl Iterator<Item = &Arc<ColumnDescriptor>> {
        self.targets
            .iter()
            .filter(move |t| t.relation == relation)
            .map(|t| &t.column)
    }

    /// Id of the target column for the given relation, if any.
    pub fn target_ids(&self, relation: Relation) -> Vec<&ColumnId> {
        self.targets_with(relation).map(|c| &c.id).collect()
    }

    /// Descriptor for a geometry-id column pointing at its geometry column.
    pub fn geometry_id(
        id: ColumnId,
        name: impl Into<String>,
        geometry: Arc<ColumnDescriptor>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            data_type: DataType::Text,
            weight: 0,
            aggregate: Aggregate::Sum,
            tags: Vec::new(),
            targets: vec![Target {
                column: geometry,
                relation: Relation::GeometryReference,
            }],
        }
    }

    /// Descriptor for a boundary geometry column.
    pub fn geometry(id: ColumnId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: String::new(),
            data_type: DataType::Geometry,
            weight: 0,
            aggregate: Aggregate::Sum,
            tags: Vec::new(),
            targets: Vec::new(),
        }
    }
}
