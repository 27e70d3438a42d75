//! Table Materializer.
//!
//! One call produces one output table for (year, resolution, table):
//!
//! - **Direct**: the output table is dropped and recreated and that is
//!   committed. Then every source partition runs one `INSERT … SELECT` in its
//!   own transaction. A failing partition is rolled back and recorded, the
//!   rest continue, and all failures surface together as one
//!   [`ExecError::PartitionsFailed`].
//! - **Interpolated**: only for the finest tier when no partition exists.
//!   Drop, create, and the single interpolation statement share one
//!   transaction, so a failure leaves nothing behind.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tracing::{debug, error, info, warn};

use geocensus_core::config::GeocensusConfig;
use geocensus_core::geo::{QualifiedName, Resolution, StateCode, Year};
use geocensus_core::id::TableId;
use geocensus_core::manifest::{RunManifest, Strategy};
use geocensus_geo::interpolation_insert;
use geocensus_meta::ResolvedColumnSet;
use geocensus_plan::{
    create_output_table, drop_output_table, output_columns, partition_insert, ColumnDef, PlanError, Statement,
};

use crate::context::ExecutionContext;
use crate::error::{ContextError, ExecError, PartitionFailure, Result};
use crate::metrics::emit_span;
use crate::providers::{GeographyProvider, SourceTableProvider};
use crate::replay::hash_statements;
use crate::scheduler::run_sequential;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializeRequest {
    pub year: Year,
    pub resolution: Resolution,
    pub table: TableId,
    /// Materialized parent-tier table read by interpolation. Defaults to the
    /// context's output table for the finest parent.
    pub parent_table: Option<QualifiedName>,
}

impl MaterializeRequest {
    pub fn new(year: Year, resolution: Resolution, table: TableId) -> Self {
        Self {
            year,
            resolution,
            table,
            parent_table: None,
        }
    }

    pub fn with_parent_table(mut self, parent: QualifiedName) -> Self {
        self.parent_table = Some(parent);
        self
    }

    fn plan_error(&self, cause: PlanError) -> ExecError {
        ExecError::Plan {
            year: self.year,
            resolution: self.resolution.clone(),
            table: self.table.clone(),
            cause,
        }
    }
}

/// One source partition's insert.
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionTask {
    pub state: StateCode,
    pub relation: QualifiedName,
    pub statement: Statement,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PartitionStatus {
    Committed,
    Failed(ContextError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PartitionOutcome {
    pub state: StateCode,
    pub relation: QualifiedName,
    pub status: PartitionStatus,
}

impl PartitionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self.status, PartitionStatus::Committed)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Work {
    Partitions(Vec<PartitionTask>),
    Interpolation(Statement),
}

/// Everything a materialization will execute, decided before anything runs.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterializePlan {
    pub strategy: Strategy,
    pub output: QualifiedName,
    pub columns: Vec<ColumnDef>,
    pub columns_version: u32,
    /// Drop + create of the output table.
    pub prepare: Vec<Statement>,
    pub work: Work,
}

impl MaterializePlan {
    /// All statements in execution order.
    pub fn statements(&self) -> Vec<Statement> {
        let mut all = self.prepare.clone();
        match &self.work {
            Work::Partitions(tasks) => all.extend(tasks.iter().map(|t| t.statement.clone())),
            Work::Interpolation(stmt) => all.push(stmt.clone()),
        }
        all
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MaterializeReport {
    pub table: QualifiedName,
    pub columns: Vec<String>,
    pub committed: Vec<StateCode>,
    pub manifest: RunManifest,
    #[serde(skip)]
    pub outcomes: Vec<PartitionOutcome>,
    #[serde(skip)]
    pub statements: Vec<Statement>,
}

pub struct Materializer<'a, S, G> {
    config: &'a GeocensusConfig,
    sources: S,
    geography: G,
}

impl<'a, S, G> Materializer<'a, S, G>
where
    S: SourceTableProvider,
    G: GeographyProvider,
{
    pub fn new(config: &'a GeocensusConfig, sources: S, geography: G) -> Self {
        Self {
            config,
            sources,
            geography,
        }
    }

    pub fn config(&self) -> &GeocensusConfig {
        self.config
    }

    /// Direct when any source partition exists; otherwise interpolated for the
    /// finest tier only.
    pub fn strategy(&self, req: &MaterializeRequest) -> Result<Strategy> {
        if !self
            .sources
            .partitions(&req.resolution, &req.table, req.year)
            .is_empty()
        {
            Ok(Strategy::Direct)
        } else if req.resolution == self.config.finest_resolution {
            Ok(Strategy::Interpolated)
        } else {
            Err(ExecError::NoPartitions {
                year: req.year,
                resolution: req.resolution.clone(),
                table: req.table.clone(),
            })
        }
    }

    /// Build every statement for `req` without executing any of them.
    pub fn plan<C>(&self, ctx: &C, set: &ResolvedColumnSet, req: &MaterializeRequest) -> Result<MaterializePlan>
    where
        C: ExecutionContext + ?Sized,
    {
        if set.year() != req.year || set.table() != &req.table {
            return Err(ExecError::SetMismatch {
                set_year: set.year(),
                set_table: set.table().clone(),
                year: req.year,
                resolution: req.resolution.clone(),
                table: req.table.clone(),
            });
        }

        let output = ctx.output_table(req.year, &req.resolution, &req.table);
        let columns = output_columns(set, self.config).map_err(|e| req.plan_error(e))?;
        let prepare = vec![
            drop_output_table(&output),
            create_output_table(&output, set, self.config).map_err(|e| req.plan_error(e))?,
        ];

        let strategy = self.strategy(req)?;
        let work = match strategy {
            Strategy::Direct => {
                let mut tasks = Vec::new();
                for partition in self.sources.partitions(&req.resolution, &req.table, req.year) {
                    let statement =
                        partition_insert(&output, set, &partition, self.config).map_err(|e| req.plan_error(e))?;
                    tasks.push(PartitionTask {
                        state: partition.state,
                        relation: partition.relation,
                        statement,
                    });
                }
                Work::Partitions(tasks)
            }
            Strategy::Interpolated => Work::Interpolation(self.interpolation_statement(ctx, &output, set, req)?),
        };

        Ok(MaterializePlan {
            strategy,
            output,
            columns,
            columns_version: set.version(),
            prepare,
            work,
        })
    }

    fn interpolation_statement<C>(
        &self,
        ctx: &C,
        output: &QualifiedName,
        set: &ResolvedColumnSet,
        req: &MaterializeRequest,
    ) -> Result<Statement>
    where
        C: ExecutionContext + ?Sized,
    {
        let missing = |geography: &Resolution| ExecError::MissingGeography {
            year: req.year,
            resolution: req.resolution.clone(),
            table: req.table.clone(),
            geography: geography.clone(),
        };
        let parent_res = &self.config.finest_parent;
        let child = self
            .geography
            .geometry_table(&req.resolution, req.year)
            .ok_or_else(|| missing(&req.resolution))?;
        let parent = self
            .geography
            .geometry_table(parent_res, req.year)
            .ok_or_else(|| missing(parent_res))?;
        let parent_data = req
            .parent_table
            .clone()
            .unwrap_or_else(|| ctx.output_table(req.year, parent_res, &req.table));

        interpolation_insert(output, set, &child, &parent, &parent_data, self.config)
            .map_err(|e| self.interpolation_error(req, e.to_string()))
    }

    fn interpolation_error(&self, req: &MaterializeRequest, reason: String) -> ExecError {
        ExecError::Interpolation {
            year: req.year,
            resolution: req.resolution.clone(),
            table: req.table.clone(),
            reason,
        }
    }

    /// Materialize `req` from `set` through `ctx`.
    pub fn materialize<C>(
        &self,
        ctx: &mut C,
        set: &ResolvedColumnSet,
        req: &MaterializeRequest,
    ) -> Result<MaterializeReport>
    where
        C: ExecutionContext + ?Sized,
    {
        let started = now_millis();
        let plan = self.plan(&*ctx, set, req)?;
        info!(
            year = req.year,
            resolution = %req.resolution,
            table = %req.table,
            strategy = ?plan.strategy,
            output = %plan.output,
            "materializing table"
        );
        emit_span(
            "materialize.start",
            &[("table", req.table.to_string()), ("resolution", req.resolution.to_string())],
        );

        let outcomes = match &plan.work {
            Work::Partitions(tasks) => {
                self.prepare(ctx, &plan, req)?;
                run_sequential(ctx, tasks)
            }
            Work::Interpolation(stmt) => {
                self.interpolate(ctx, &plan, stmt, req)?;
                Vec::new()
            }
        };
        self.finish(plan, outcomes, req, started)
    }

    /// Drop and recreate the output table, committed on its own.
    pub(crate) fn prepare<C>(&self, ctx: &mut C, plan: &MaterializePlan, req: &MaterializeRequest) -> Result<()>
    where
        C: ExecutionContext + ?Sized,
    {
        let run = |ctx: &mut C| -> std::result::Result<(), ContextError> {
            crate::fail_point!("materialize.prepare", |reason| ContextError::Injected {
                relation: plan.output.to_string(),
                reason,
            });
            for stmt in &plan.prepare {
                debug!(sql = %stmt, "executing");
                ctx.execute(stmt)?;
            }
            ctx.commit()
        };
        run(ctx).map_err(|cause| {
            rollback_quietly(ctx, &plan.output);
            error!(table = %req.table, output = %plan.output, %cause, "output table preparation failed");
            ExecError::Prepare {
                year: req.year,
                resolution: req.resolution.clone(),
                table: req.table.clone(),
                cause,
            }
        })
    }

    fn interpolate<C>(
        &self,
        ctx: &mut C,
        plan: &MaterializePlan,
        stmt: &Statement,
        req: &MaterializeRequest,
    ) -> Result<()>
    where
        C: ExecutionContext + ?Sized,
    {
        let run = |ctx: &mut C| -> std::result::Result<(), ContextError> {
            for s in plan.prepare.iter().chain(std::iter::once(stmt)) {
                debug!(sql = %s, "executing");
                ctx.execute(s)?;
            }
            crate::fail_point!("materialize.interpolate", |reason| ContextError::Injected {
                relation: plan.output.to_string(),
                reason,
            });
            ctx.commit()
        };
        run(ctx).map_err(|cause| {
            rollback_quietly(ctx, &plan.output);
            error!(
                year = req.year,
                resolution = %req.resolution,
                table = %req.table,
                %cause,
                "interpolation failed"
            );
            self.interpolation_error(req, cause.to_string())
        })
    }

    /// Build the report, or the aggregate error when any partition failed.
    pub(crate) fn finish(
        &self,
        plan: MaterializePlan,
        outcomes: Vec<PartitionOutcome>,
        req: &MaterializeRequest,
        started: u64,
    ) -> Result<MaterializeReport> {
        let failed: Vec<PartitionFailure> = outcomes
            .iter()
            .filter_map(|o| match &o.status {
                PartitionStatus::Failed(cause) => Some(PartitionFailure {
                    state: o.state.clone(),
                    cause: cause.clone(),
                }),
                PartitionStatus::Committed => None,
            })
            .collect();

        emit_span(
            "materialize.finish",
            &[
                ("table", req.table.to_string()),
                ("partitions", outcomes.len().to_string()),
                ("failed", failed.len().to_string()),
            ],
        );

        if !failed.is_empty() {
            return Err(ExecError::PartitionsFailed {
                year: req.year,
                resolution: req.resolution.clone(),
                table: req.table.clone(),
                failed,
            });
        }

        let statements = plan.statements();
        let plan_hash = hash_statements(&statements).map_err(|e| ExecError::Hash {
            year: req.year,
            resolution: req.resolution.clone(),
            table: req.table.clone(),
            reason: e.to_string(),
        })?;
        let manifest = RunManifest::new(
            req.year,
            req.resolution.clone(),
            req.table.clone(),
            plan.strategy,
            plan_hash,
            plan.columns_version,
            started,
        )
        .finish(now_millis());

        info!(
            table = %req.table,
            output = %plan.output,
            partitions = outcomes.len(),
            plan_hash = %manifest.plan_hash,
            "materialized table"
        );

        Ok(MaterializeReport {
            table: plan.output,
            columns: plan.columns.into_iter().map(|c| c.name).collect(),
            committed: outcomes.iter().map(|o| o.state.clone()).collect(),
            manifest,
            outcomes,
            statements,
        })
    }
}

fn rollback_quietly<C: ExecutionContext + ?Sized>(ctx: &mut C, output: &QualifiedName) {
    if let Err(e) = ctx.rollback() {
        warn!(%output, error = %e, "rollback failed");
    }
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
