#![forbid(unsafe_code)]
//! geocensus-exec: execution contexts, providers, and the table materializer.
//!
//! Every statement goes through an [`ExecutionContext`] handle passed in by the
//! caller. `MemoryContext` evaluates statements against in-memory tables and
//! `DryRunContext` only records them. Partitions run sequentially by default;
//! the `async-scheduler` feature adds a bounded concurrent scheduler.

pub mod context;
pub mod error;
pub mod failpoints;
pub mod materializer;
pub mod memory_context;
pub mod metrics;
pub mod providers;
pub mod replay;
pub mod scheduler;

pub use context::{output_table_name, DryRunContext, ExecutionContext};
pub use error::{ContextError, ExecError, PartitionFailure, Result, SchedulerError};
pub use materializer::{
    MaterializePlan, MaterializeReport, MaterializeRequest, Materializer, PartitionOutcome, PartitionStatus,
    PartitionTask, Work,
};
pub use memory_context::MemoryContext;
pub use providers::{GeographyProvider, SchemaGeographyProvider, SchemaSourceProvider, SourceTableProvider};
pub use scheduler::{run_partition, run_sequential};

#[cfg(feature = "async-scheduler")]
pub use scheduler::{materialize_concurrent, run_partitions};
