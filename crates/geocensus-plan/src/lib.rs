#![forbid(unsafe_code)]
//! geocensus-plan: structured statements for table materialization.
//!
//! Nothing here executes anything. Statements are plain data that render to
//! SQL through `Display` and that an execution context can interpret directly.
//!
//! - `expr`: column references, casts, arithmetic, `ST_Area`, `round`.
//! - `statement`: DROP / CREATE / INSERT … SELECT with inner joins.
//! - `naming`: source geography-id column and per-partition column naming.
//! - `projection`: output schema and direct per-partition projections.

pub mod error;
pub mod expr;
pub mod naming;
pub mod projection;
pub mod statement;

pub use error::{PlanError, Result};
pub use expr::{ColumnRef, Expr, Projection};
pub use naming::{
    exception_applies, source_column_name, source_geoid_column, NamingException, StateSet,
    NAMING_EXCEPTIONS, TRAILING_SEPARATOR_MEASURE,
};
pub use projection::{create_output_table, drop_output_table, output_columns, partition_insert};
pub use statement::{ColumnDef, Join, Select, Statement, TableRef};
