//! Output schema and direct per-partition projection.
//!
//! The output schema is `[geo id]` followed by one column per resolved
//! descriptor, in resolved order, lower-cased. Every projection built here
//! lines up with that schema item for item.

use geocensus_core::config::GeocensusConfig;
use geocensus_core::geo::{GeographyPartition, QualifiedName};
use geocensus_core::schema::DataType;
use geocensus_meta::ResolvedColumnSet;

use crate::error::{PlanError, Result};
use crate::expr::{ColumnRef, Expr, Projection};
use crate::naming::{source_column_name, source_geoid_column};
use crate::statement::{ColumnDef, Select, Statement, TableRef};

pub fn output_columns(set: &ResolvedColumnSet, config: &GeocensusConfig) -> Result<Vec<ColumnDef>> {
    if set.is_empty() {
        return Err(PlanError::EmptyColumnSet(set.table().clone()));
    }
    let mut cols = Vec::with_capacity(set.len() + 1);
    cols.push(ColumnDef {
        name: config.geoid_column.clone(),
        data_type: DataType::Text,
    });
    cols.extend(set.iter().map(|c| ColumnDef {
        name: c.id.canonical(),
        data_type: c.data_type,
    }));
    Ok(cols)
}

pub fn drop_output_table(name: &QualifiedName) -> Statement {
    Statement::DropTable { name: name.clone() }
}

pub fn create_output_table(
    name: &QualifiedName,
    set: &ResolvedColumnSet,
    config: &GeocensusConfig,
) -> Result<Statement> {
    Ok(Statement::CreateTable {
        name: name.clone(),
        columns: output_columns(set, config)?,
    })
}

/// `INSERT INTO output SELECT …` for one source partition.
///
/// Each measure reads its physical source column, cast to the descriptor's
/// declared type and aliased to the canonical id.
pub fn partition_insert(
    output: &QualifiedName,
    set: &ResolvedColumnSet,
    partition: &GeographyPartition,
    config: &GeocensusConfig,
) -> Result<Statement> {
    let columns: Vec<String> = output_columns(set, config)?.into_iter().map(|c| c.name).collect();

    let mut items = Vec::with_capacity(columns.len());
    items.push(Projection {
        column_id: None,
        source: Expr::column(ColumnRef::bare(source_geoid_column(
            config,
            &partition.resolution,
            partition.year,
        ))),
        target_type: None,
        alias: config.geoid_column.clone(),
    });
    for col in set.iter() {
        let source = source_column_name(set.table(), &col.id, &partition.resolution, &partition.state);
        items.push(Projection {
            column_id: Some(col.id.clone()),
            source: Expr::column(ColumnRef::bare(source)),
            target_type: Some(col.data_type),
            alias: col.id.canonical(),
        });
    }

    Statement::insert_select(
        output.clone(),
        columns,
        Select {
            items,
            from: TableRef::new(partition.relation.clone()),
            joins: Vec::new(),
        },
    )
}
