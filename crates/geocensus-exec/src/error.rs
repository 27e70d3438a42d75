use thiserror::Error;

use geocensus_core::geo::{Resolution, StateCode, Year};
use geocensus_core::id::TableId;

pub type Result<T> = std::result::Result<T, ExecError>;

/// Failure reported by an execution context for one statement or transaction.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ContextError {
    #[error("relation {0} does not exist")]
    UnknownTable(String),

    #[error("relation {0} already exists")]
    TableExists(String),

    #[error("column {column} does not exist in {relation}")]
    UnknownColumn { relation: String, column: String },

    #[error("column reference {0} is ambiguous")]
    AmbiguousColumn(String),

    #[error("column {column}: {reason}")]
    Cast { column: String, reason: String },

    #[error("evaluation: {0}")]
    Evaluation(String),

    #[error("injected failure reading {relation}: {reason}")]
    Injected { relation: String, reason: String },

    #[error("backend: {0}")]
    Backend(String),
}

/// One partition that failed to materialize, with its cause.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionFailure {
    pub state: StateCode,
    pub cause: ContextError,
}

/// Task runtime failure, before the request it belongs to is known.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{0}")]
pub struct SchedulerError(pub String);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(
        "materialization failed for {year} {resolution} {table}: partition(s) {} failed",
        join_states(.failed)
    )]
    PartitionsFailed {
        year: Year,
        resolution: Resolution,
        table: TableId,
        failed: Vec<PartitionFailure>,
    },

    #[error("interpolation failed for {year} {resolution} {table}: {reason}")]
    Interpolation {
        year: Year,
        resolution: Resolution,
        table: TableId,
        reason: String,
    },

    #[error("could not prepare output table for {year} {resolution} {table}: {cause}")]
    Prepare {
        year: Year,
        resolution: Resolution,
        table: TableId,
        cause: ContextError,
    },

    #[error("no source partitions for {year} {resolution} {table}, and {resolution} is not the finest tier")]
    NoPartitions {
        year: Year,
        resolution: Resolution,
        table: TableId,
    },

    #[error("cannot interpolate {year} {resolution} {table}: no geometry table for {geography}")]
    MissingGeography {
        year: Year,
        resolution: Resolution,
        table: TableId,
        geography: Resolution,
    },

    #[error("column set {set_year} {set_table} does not match request {year} {resolution} {table}")]
    SetMismatch {
        set_year: Year,
        set_table: TableId,
        year: Year,
        resolution: Resolution,
        table: TableId,
    },

    #[error("could not plan {year} {resolution} {table}: {cause}")]
    Plan {
        year: Year,
        resolution: Resolution,
        table: TableId,
        #[source]
        cause: geocensus_plan::PlanError,
    },

    #[error("could not hash the plan for {year} {resolution} {table}: {reason}")]
    Hash {
        year: Year,
        resolution: Resolution,
        table: TableId,
        reason: String,
    },

    #[error("scheduler failed for {year} {resolution} {table}: {cause}")]
    Scheduler {
        year: Year,
        resolution: Resolution,
        table: TableId,
        #[source]
        cause: SchedulerError,
    },
}

fn join_states(failed: &[PartitionFailure]) -> String {
    failed
        .iter()
        .map(|f| f.state.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregate_message_names_every_partition() {
        let err = ExecError::PartitionsFailed {
            year: 2011,
            resolution: Resolution::new("SA2"),
            table: TableId::new("B02"),
            failed: vec![
                PartitionFailure {
                    state: StateCode::new("NSW"),
                    cause: ContextError::UnknownTable("x".into()),
                },
                PartitionFailure {
                    state: StateCode::new("Tas"),
                    cause: ContextError::UnknownTable("y".into()),
                },
            ],
        };
        assert_eq!(
            err.to_string(),
            "materialization failed for 2011 SA2 B02: partition(s) NSW, Tas failed"
        );
    }

    #[test]
    fn scheduler_message_names_the_request() {
        let err = ExecError::Scheduler {
            year: 2016,
            resolution: Resolution::new("SA1"),
            table: TableId::new("G01"),
            cause: SchedulerError("semaphore closed".into()),
        };
        assert_eq!(err.to_string(), "scheduler failed for 2016 SA1 G01: semaphore closed");
    }
}
