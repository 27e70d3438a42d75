use thiserror::Error;

use geocensus_core::geo::{Profile, Year};
use geocensus_core::id::{ColumnId, TableId, TagId};

use crate::tags::TagKind;

/// Result type local to geocensus-meta.
pub type Result<T> = std::result::Result<T, MetaError>;

#[derive(Debug, Error)]
pub enum MetaError {
    #[error("metadata feed: {0}")]
    Feed(#[from] csv::Error),

    #[error("metadata feed line {line}: {reason}")]
    Record { line: u64, reason: String },

    #[error("unknown {kind} tag '{id}'")]
    UnknownTag { kind: TagKind, id: TagId },

    #[error(
        "dependency unresolved for table {table} ({year}/{profile}): missing prerequisite group(s) {}",
        join_ids(.missing)
    )]
    DependencyUnresolved {
        year: Year,
        profile: Profile,
        table: TableId,
        missing: Vec<TableId>,
    },

    #[error("prerequisite {supplied} was resolved for {supplied_year}/{supplied_profile}, expected {year}/{profile}")]
    PrerequisiteMismatch {
        supplied: TableId,
        supplied_year: Year,
        supplied_profile: Profile,
        year: Year,
        profile: Profile,
    },

    #[error("column {column} of table {table} names unknown denominator '{denominator}'")]
    DanglingDenominator {
        table: TableId,
        column: ColumnId,
        denominator: String,
    },

    #[error("dependency cycle through tables {}", join_ids(.0))]
    DependencyCycle(Vec<TableId>),

    #[error("no metadata feed loaded for {year}")]
    MissingFeed { year: Year },

    #[error("invalid declaration: {0}")]
    Declaration(String),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Core(#[from] geocensus_core::error::Error),
}

fn join_ids(ids: &[TableId]) -> String {
    ids.iter()
        .map(|t| t.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
