//! The single set-based statement that derives the finest tier.
//!
//! Join path: child geometry → parent geometry (child `parent_id` = parent
//! `geom_id`) → parent's materialized data (child `parent_id` = parent data
//! geo id). Every numeric output column is
//! `round(parent_value × area(child) / area(parent), 2)`.

use serde::{Deserialize, Serialize};

use geocensus_core::config::GeocensusConfig;
use geocensus_core::geo::{QualifiedName, Resolution, Year};
use geocensus_meta::ResolvedColumnSet;
use geocensus_plan::expr::{ColumnRef, Expr, Projection};
use geocensus_plan::projection::output_columns;
use geocensus_plan::statement::{Join, Select, Statement, TableRef};

use crate::apportion::INTERPOLATION_PLACES;
use crate::error::{GeoError, Result};

/// Handle on a boundary table for one (resolution, year).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeometryTable {
    pub resolution: Resolution,
    pub year: Year,
    pub relation: QualifiedName,
    pub geom_id: String,
    pub geometry: String,
    /// Only the finest tier carries a parent reference.
    pub parent_id: Option<String>,
}

impl GeometryTable {
    pub fn new(resolution: Resolution, year: Year, relation: QualifiedName) -> Self {
        Self {
            resolution,
            year,
            relation,
            geom_id: "geom_id".to_string(),
            geometry: "the_geom".to_string(),
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, column: impl Into<String>) -> Self {
        self.parent_id = Some(column.into());
        self
    }
}

/// Table aliases used inside the interpolation statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolationAliases {
    pub child: String,
    pub parent: String,
    pub parent_data: String,
}

impl Default for InterpolationAliases {
    fn default() -> Self {
        Self {
            child: "child_geo".to_string(),
            parent: "parent_geo".to_string(),
            parent_data: "parent_data".to_string(),
        }
    }
}

/// Build the interpolation `INSERT … SELECT` into `output`.
pub fn interpolation_insert(
    output: &QualifiedName,
    set: &ResolvedColumnSet,
    child: &GeometryTable,
    parent: &GeometryTable,
    parent_data: &QualifiedName,
    config: &GeocensusConfig,
) -> Result<Statement> {
    let parent_ref = child
        .parent_id
        .as_deref()
        .ok_or_else(|| GeoError::MissingParentReference(child.resolution.clone()))?;
    let a = InterpolationAliases::default();

    let columns: Vec<String> = output_columns(set, config)?.into_iter().map(|c| c.name).collect();

    let ratio = Expr::column(ColumnRef::qualified(&a.child, &child.geometry))
        .area()
        .div(Expr::column(ColumnRef::qualified(&a.parent, &parent.geometry)).area());

    let mut items = Vec::with_capacity(columns.len());
    items.push(Projection {
        column_id: None,
        source: Expr::column(ColumnRef::qualified(&a.child, &child.geom_id)),
        target_type: None,
        alias: config.geoid_column.clone(),
    });
    for col in set.iter() {
        let alias = col.id.canonical();
        let value = Expr::column(ColumnRef::qualified(&a.parent_data, &alias));
        let source = if col.data_type.is_numeric() {
            value.mul(ratio.clone()).round(INTERPOLATION_PLACES)
        } else {
            value
        };
        items.push(Projection {
            column_id: Some(col.id.clone()),
            source,
            target_type: None,
            alias,
        });
    }

    let select = Select {
        items,
        from: TableRef::aliased(child.relation.clone(), &a.child),
        joins: vec![
            Join {
                table: TableRef::aliased(parent.relation.clone(), &a.parent),
                left: ColumnRef::qualified(&a.child, parent_ref),
                right: ColumnRef::qualified(&a.parent, &parent.geom_id),
            },
            Join {
                table: TableRef::aliased(parent_data.clone(), &a.parent_data),
                left: ColumnRef::qualified(&a.child, parent_ref),
                right: ColumnRef::qualified(&a.parent_data, &config.geoid_column),
            },
        ],
    };

    Ok(Statement::insert_select(output.clone(), columns, select)?)
}
