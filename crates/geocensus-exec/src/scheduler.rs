//! Partition scheduling.
//!
//! Each partition is its own transaction: execute, then commit, or roll back
//! on failure and report an outcome. Nothing here aborts early; the caller
//! folds outcomes into one aggregate result.
//!
//! With `async-scheduler`, partitions fan out over tokio's blocking pool,
//! bounded by `max_parallel_tasks`, each on a context handle of its own.
//! Outcomes come back in partition order regardless of completion order.

use tracing::{debug, error};

use crate::context::ExecutionContext;
use crate::error::ContextError;
use crate::materializer::{PartitionOutcome, PartitionStatus, PartitionTask};

#[cfg(feature = "async-scheduler")]
pub use async_impl::*;

fn execute_partition<C>(ctx: &mut C, task: &PartitionTask) -> Result<(), ContextError>
where
    C: ExecutionContext + ?Sized,
{
    crate::fail_point!(&format!("materialize.partition.{}", task.state), |reason| {
        ContextError::Injected {
            relation: task.relation.to_string(),
            reason,
        }
    });
    debug!(state = %task.state, sql = %task.statement, "executing");
    ctx.execute(&task.statement)?;
    ctx.commit()
}

/// Run one partition to completion in its own transaction.
pub fn run_partition<C>(ctx: &mut C, task: &PartitionTask) -> PartitionOutcome
where
    C: ExecutionContext + ?Sized,
{
    let status = match execute_partition(ctx, task) {
        Ok(()) => PartitionStatus::Committed,
        Err(cause) => {
            error!(state = %task.state, relation = %task.relation, %cause, "partition failed");
            if let Err(e) = ctx.rollback() {
                error!(state = %task.state, error = %e, "partition rollback failed");
            }
            PartitionStatus::Failed(cause)
        }
    };
    PartitionOutcome {
        state: task.state.clone(),
        relation: task.relation.clone(),
        status,
    }
}

pub fn run_sequential<C>(ctx: &mut C, tasks: &[PartitionTask]) -> Vec<PartitionOutcome>
where
    C: ExecutionContext + ?Sized,
{
    tasks.iter().map(|t| run_partition(ctx, t)).collect()
}

#[cfg(feature = "async-scheduler")]
mod async_impl {
    use std::sync::Arc;

    use tokio::sync::Semaphore;
    use tracing::info;

    use geocensus_meta::ResolvedColumnSet;

    use super::run_partition;
    use crate::context::ExecutionContext;
    use crate::error::{ExecError, Result, SchedulerError};
    use crate::materializer::{now_millis, MaterializeReport, MaterializeRequest, Materializer, PartitionOutcome, PartitionTask, Work};
    use crate::providers::{GeographyProvider, SourceTableProvider};

    /// Run partitions concurrently, at most `max_parallel` at a time.
    ///
    /// `factory` yields a fresh context handle per partition so that commits
    /// and rollbacks never cross partitions.
    pub async fn run_partitions<C, F>(
        factory: Arc<F>,
        tasks: Vec<PartitionTask>,
        max_parallel: usize,
    ) -> std::result::Result<Vec<PartitionOutcome>, SchedulerError>
    where
        C: ExecutionContext + Send + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let semaphore = Arc::new(Semaphore::new(max_parallel.max(1)));
        let mut handles = Vec::with_capacity(tasks.len());

        for task in tasks {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| SchedulerError(e.to_string()))?;
            let factory = Arc::clone(&factory);
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                let mut ctx = factory();
                run_partition(&mut ctx, &task)
            }));
        }

        let mut outcomes = Vec::with_capacity(handles.len());
        for handle in handles {
            outcomes.push(handle.await.map_err(|e| SchedulerError(e.to_string()))?);
        }
        Ok(outcomes)
    }

    /// Same contract as [`Materializer::materialize`], with partitions run
    /// through [`run_partitions`]. Preparation and interpolation use one
    /// handle from `factory`.
    pub async fn materialize_concurrent<S, G, C, F>(
        materializer: &Materializer<'_, S, G>,
        factory: Arc<F>,
        set: &ResolvedColumnSet,
        req: &MaterializeRequest,
    ) -> Result<MaterializeReport>
    where
        S: SourceTableProvider,
        G: GeographyProvider,
        C: ExecutionContext + Send + 'static,
        F: Fn() -> C + Send + Sync + 'static,
    {
        let started = now_millis();
        let mut ctx = factory();
        let plan = materializer.plan(&ctx, set, req)?;

        match &plan.work {
            Work::Partitions(tasks) => {
                materializer.prepare(&mut ctx, &plan, req)?;
                let tasks = tasks.clone();
                info!(
                    table = %req.table,
                    partitions = tasks.len(),
                    max_parallel = materializer.config().max_parallel_tasks,
                    "fanning out partitions"
                );
                let outcomes = run_partitions(factory, tasks, materializer.config().max_parallel_tasks)
                    .await
                    .map_err(|cause| ExecError::Scheduler {
                        year: req.year,
                        resolution: req.resolution.clone(),
                        table: req.table.clone(),
                        cause,
                    })?;
                materializer.finish(plan, outcomes, req, started)
            }
            Work::Interpolation(_) => materializer.materialize(&mut ctx, set, req),
        }
    }
}
