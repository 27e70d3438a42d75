use thiserror::Error;

use geocensus_core::id::TableId;

pub type Result<T> = std::result::Result<T, PlanError>;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("table {0} has no resolved columns to project")]
    EmptyColumnSet(TableId),

    #[error("insert into {target} names {columns} column(s) but selects {items}")]
    ColumnCountMismatch {
        target: String,
        columns: usize,
        items: usize,
    },

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}
