//! The Execution Context seam: every statement goes through a handle passed
//! in explicitly. There is no ambient session.

use geocensus_core::geo::{QualifiedName, Resolution, Year};
use geocensus_core::id::TableId;
use geocensus_core::types::Row;
use geocensus_plan::Statement;

use crate::error::ContextError;

pub trait ExecutionContext {
    /// Run one statement inside the current transaction.
    fn execute(&mut self, statement: &Statement) -> Result<Vec<Row>, ContextError>;

    fn commit(&mut self) -> Result<(), ContextError>;

    fn rollback(&mut self) -> Result<(), ContextError>;

    /// Stable schema-qualified name of the output table for a request.
    fn output_table(&self, year: Year, resolution: &Resolution, table: &TableId) -> QualifiedName;
}

impl<C: ExecutionContext + ?Sized> ExecutionContext for Box<C> {
    fn execute(&mut self, statement: &Statement) -> Result<Vec<Row>, ContextError> {
        (**self).execute(statement)
    }

    fn commit(&mut self) -> Result<(), ContextError> {
        (**self).commit()
    }

    fn rollback(&mut self) -> Result<(), ContextError> {
        (**self).rollback()
    }

    fn output_table(&self, year: Year, resolution: &Resolution, table: &TableId) -> QualifiedName {
        (**self).output_table(year, resolution, table)
    }
}

/// `<schema>.<table>_<resolution>_<year>`, lower-cased.
pub fn output_table_name(schema: &str, year: Year, resolution: &Resolution, table: &TableId) -> QualifiedName {
    QualifiedName::new(
        schema,
        format!("{}_{}_{}", table, resolution, year).to_lowercase(),
    )
}

/// Records rendered statements without running them (`geocensus explain`).
#[derive(Debug, Clone, Default)]
pub struct DryRunContext {
    schema: String,
    statements: Vec<String>,
    commits: usize,
    rollbacks: usize,
}

impl DryRunContext {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            ..Default::default()
        }
    }

    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    pub fn commits(&self) -> usize {
        self.commits
    }

    pub fn rollbacks(&self) -> usize {
        self.rollbacks
    }
}

impl ExecutionContext for DryRunContext {
    fn execute(&mut self, statement: &Statement) -> Result<Vec<Row>, ContextError> {
        self.statements.push(statement.to_string());
        Ok(Vec::new())
    }

    fn commit(&mut self) -> Result<(), ContextError> {
        self.commits += 1;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), ContextError> {
        self.rollbacks += 1;
        Ok(())
    }

    fn output_table(&self, year: Year, resolution: &Resolution, table: &TableId) -> QualifiedName {
        output_table_name(&self.schema, year, resolution, table)
    }
}
