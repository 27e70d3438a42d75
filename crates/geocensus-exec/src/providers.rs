//! Source Table and Geography providers.
//!
//! The materializer only asks providers for handles; it never guesses table
//! names itself. The schema-backed providers below follow the datapack import
//! layout: one source table per (table, resolution, state, year) and one
//! boundary table per (resolution, year).

use std::sync::Arc;

use geocensus_core::config::GeocensusConfig;
use geocensus_core::geo::{GeographyPartition, QualifiedName, Resolution, StateCode, Year, STATES};
use geocensus_core::id::{ColumnId, TableId};
use geocensus_geo::GeometryTable;
use geocensus_meta::ColumnDescriptor;

pub trait SourceTableProvider {
    /// Source partition for one state, or `None` when no data exists at this
    /// resolution.
    fn partition(
        &self,
        resolution: &Resolution,
        state: &StateCode,
        table: &TableId,
        year: Year,
    ) -> Option<GeographyPartition>;

    /// Every available partition, in state order.
    fn partitions(&self, resolution: &Resolution, table: &TableId, year: Year) -> Vec<GeographyPartition> {
        STATES
            .iter()
            .filter_map(|s| self.partition(resolution, &StateCode::new(*s), table, year))
            .collect()
    }
}

pub trait GeographyProvider {
    fn geometry_table(&self, resolution: &Resolution, year: Year) -> Option<GeometryTable>;

    /// Descriptor of the geography-id column, pointing at the geometry column
    /// it identifies.
    fn geoid_descriptor(&self, resolution: &Resolution, year: Year) -> Option<ColumnDescriptor> {
        let table = self.geometry_table(resolution, year)?;
        let prefix = format!("{}_{}", resolution, year).to_lowercase();
        let geometry = Arc::new(ColumnDescriptor::geometry(
            ColumnId::new(format!("{prefix}_{}", table.geometry)),
            format!("{resolution} boundaries {year}"),
        ));
        Some(ColumnDescriptor::geometry_id(
            ColumnId::new(format!("{prefix}_{}", table.geom_id)),
            format!("{resolution} geography id {year}"),
            geometry,
        ))
    }
}

impl<T: SourceTableProvider + ?Sized> SourceTableProvider for &T {
    fn partition(
        &self,
        resolution: &Resolution,
        state: &StateCode,
        table: &TableId,
        year: Year,
    ) -> Option<GeographyPartition> {
        (**self).partition(resolution, state, table, year)
    }

    fn partitions(&self, resolution: &Resolution, table: &TableId, year: Year) -> Vec<GeographyPartition> {
        (**self).partitions(resolution, table, year)
    }
}

impl<T: GeographyProvider + ?Sized> GeographyProvider for &T {
    fn geometry_table(&self, resolution: &Resolution, year: Year) -> Option<GeometryTable> {
        (**self).geometry_table(resolution, year)
    }
}

/// Source partitions named `<schema>.<table>_<resolution>_<state>_<year>`.
///
/// The finest resolution has no datapack coverage and never yields a partition.
#[derive(Debug, Clone)]
pub struct SchemaSourceProvider {
    schema: String,
    states: Vec<StateCode>,
    finest: Resolution,
}

impl SchemaSourceProvider {
    pub fn new(schema: impl Into<String>, config: &GeocensusConfig) -> Self {
        Self {
            schema: schema.into(),
            states: STATES.iter().map(|s| StateCode::new(*s)).collect(),
            finest: config.finest_resolution.clone(),
        }
    }

    /// Restrict to the given states (matched case-insensitively).
    pub fn with_states(mut self, states: impl IntoIterator<Item = StateCode>) -> Self {
        self.states = states.into_iter().collect();
        self
    }

    pub fn states(&self) -> &[StateCode] {
        &self.states
    }

    pub fn relation(&self, resolution: &Resolution, state: &StateCode, table: &TableId, year: Year) -> QualifiedName {
        QualifiedName::new(
            &self.schema,
            format!("{}_{}_{}_{}", table, resolution, state, year).to_lowercase(),
        )
    }
}

impl SourceTableProvider for SchemaSourceProvider {
    fn partition(
        &self,
        resolution: &Resolution,
        state: &StateCode,
        table: &TableId,
        year: Year,
    ) -> Option<GeographyPartition> {
        if resolution == &self.finest {
            return None;
        }
        let state = self.states.iter().find(|s| s.eq_ignore_case(state.as_str()))?;
        Some(GeographyPartition {
            resolution: resolution.clone(),
            state: state.clone(),
            table: table.clone(),
            year,
            relation: self.relation(resolution, state, table, year),
        })
    }
}

/// Boundary tables named `<schema>.geo_<resolution>_<year>`; the finest tier
/// carries a `parent_id` column.
#[derive(Debug, Clone)]
pub struct SchemaGeographyProvider {
    schema: String,
    finest: Resolution,
    parent_column: String,
}

impl SchemaGeographyProvider {
    pub fn new(schema: impl Into<String>, config: &GeocensusConfig) -> Self {
        Self {
            schema: schema.into(),
            finest: config.finest_resolution.clone(),
            parent_column: "parent_id".to_string(),
        }
    }

    pub fn with_parent_column(mut self, column: impl Into<String>) -> Self {
        self.parent_column = column.into();
        self
    }
}

impl GeographyProvider for SchemaGeographyProvider {
    fn geometry_table(&self, resolution: &Resolution, year: Year) -> Option<GeometryTable> {
        let relation = QualifiedName::new(
            &self.schema,
            format!("geo_{}_{}", resolution, year).to_lowercase(),
        );
        let table = GeometryTable::new(resolution.clone(), year, relation);
        Some(if resolution == &self.finest {
            table.with_parent(&self.parent_column)
        } else {
            table
        })
    }
}
