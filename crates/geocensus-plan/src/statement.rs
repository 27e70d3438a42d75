//! Statement model and its SQL rendering.

use std::fmt;

use serde::{Deserialize, Serialize};

use geocensus_core::geo::QualifiedName;
use geocensus_core::schema::DataType;

use crate::error::{PlanError, Result};
use crate::expr::{quote_ident, ColumnRef, Projection};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: DataType,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub relation: QualifiedName,
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(relation: QualifiedName) -> Self {
        Self {
            relation,
            alias: None,
        }
    }

    pub fn aliased(relation: QualifiedName, alias: impl Into<String>) -> Self {
        Self {
            relation,
            alias: Some(alias.into()),
        }
    }

    /// Name that qualified column references use for this table.
    pub fn binding(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.relation.table)
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.alias {
            Some(a) => write!(f, "{} {}", self.relation, a),
            None => write!(f, "{}", self.relation),
        }
    }
}

/// `INNER JOIN table ON (left = right)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Join {
    pub table: TableRef,
    pub left: ColumnRef,
    pub right: ColumnRef,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Select {
    pub items: Vec<Projection>,
    pub from: TableRef,
    pub joins: Vec<Join>,
}

impl fmt::Display for Select {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        for (i, item) in self.items.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{item}")?;
        }
        write!(f, " FROM {}", self.from)?;
        for j in &self.joins {
            write!(f, " INNER JOIN {} ON ({} = {})", j.table, j.left, j.right)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    DropTable {
        name: QualifiedName,
    },
    CreateTable {
        name: QualifiedName,
        columns: Vec<ColumnDef>,
    },
    InsertSelect {
        target: QualifiedName,
        columns: Vec<String>,
        select: Select,
    },
}

impl Statement {
    /// Build an `INSERT … SELECT`, checking column and item counts agree.
    pub fn insert_select(target: QualifiedName, columns: Vec<String>, select: Select) -> Result<Self> {
        if columns.len() != select.items.len() {
            return Err(PlanError::ColumnCountMismatch {
                target: target.to_string(),
                columns: columns.len(),
                items: select.items.len(),
            });
        }
        if let Some(bad) = columns.iter().find(|c| c.is_empty()) {
            return Err(PlanError::InvalidIdentifier(bad.clone()));
        }
        Ok(Statement::InsertSelect {
            target,
            columns,
            select,
        })
    }

    /// Relation this statement writes to.
    pub fn target(&self) -> &QualifiedName {
        match self {
            Statement::DropTable { name } | Statement::CreateTable { name, .. } => name,
            Statement::InsertSelect { target, .. } => target,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Statement::DropTable { .. } => "drop_table",
            Statement::CreateTable { .. } => "create_table",
            Statement::InsertSelect { .. } => "insert_select",
        }
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::DropTable { name } => write!(f, "DROP TABLE IF EXISTS {name}"),
            Statement::CreateTable { name, columns } => {
                write!(f, "CREATE TABLE {name} (")?;
                for (i, c) in columns.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{} {}", quote_ident(&c.name), c.data_type.sql_name())?;
                }
                f.write_str(")")
            }
            Statement::InsertSelect {
                target,
                columns,
                select,
            } => {
                let cols: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
                write!(f, "INSERT INTO {target} ({}) {select}", cols.join(", "))
            }
        }
    }
}
