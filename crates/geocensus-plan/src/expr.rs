//! Expressions and projection descriptors.

use std::fmt;

use serde::{Deserialize, Serialize};

use geocensus_core::id::ColumnId;
use geocensus_core::schema::DataType;

/// Quote an identifier, doubling embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `name` or `qualifier."name"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            qualifier: None,
            name: name.into(),
        }
    }

    pub fn qualified(qualifier: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            qualifier: Some(qualifier.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, quote_ident(&self.name)),
            None => f.write_str(&quote_ident(&self.name)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Column(ColumnRef),
    Cast { expr: Box<Expr>, to: DataType },
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    /// Planar area of a geometry value.
    Area(Box<Expr>),
    /// Numeric rounding to a fixed number of decimal places.
    Round { expr: Box<Expr>, places: u32 },
}

impl Expr {
    pub fn column(c: ColumnRef) -> Self {
        Expr::Column(c)
    }

    pub fn cast(self, to: DataType) -> Self {
        Expr::Cast {
            expr: Box::new(self),
            to,
        }
    }

    pub fn mul(self, rhs: Expr) -> Self {
        Expr::Mul(Box::new(self), Box::new(rhs))
    }

    pub fn div(self, rhs: Expr) -> Self {
        Expr::Div(Box::new(self), Box::new(rhs))
    }

    pub fn area(self) -> Self {
        Expr::Area(Box::new(self))
    }

    pub fn round(self, places: u32) -> Self {
        Expr::Round {
            expr: Box::new(self),
            places,
        }
    }

    /// Every column this expression reads, left to right.
    pub fn columns(&self) -> Vec<&ColumnRef> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a ColumnRef>) {
        match self {
            Expr::Column(c) => out.push(c),
            Expr::Cast { expr, .. } | Expr::Area(expr) | Expr::Round { expr, .. } => {
                expr.collect_columns(out)
            }
            Expr::Mul(a, b) | Expr::Div(a, b) => {
                a.collect_columns(out);
                b.collect_columns(out);
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Column(c) => write!(f, "{c}"),
            Expr::Cast { expr, to } => write!(f, "CAST({expr} AS {})", to.sql_name()),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Div(a, b) => write!(f, "({a} / {b})"),
            Expr::Area(g) => write!(f, "ST_Area({g})"),
            Expr::Round { expr, places } => {
                write!(f, "round(CAST(CAST({expr} AS Double Precision) AS Numeric), {places})")
            }
        }
    }
}

/// One output column of a SELECT: what it reads, its declared type, its alias.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Descriptor this item materializes; `None` for the geography id.
    pub column_id: Option<ColumnId>,
    pub source: Expr,
    /// Cast applied on top of `source`, if any.
    pub target_type: Option<DataType>,
    pub alias: String,
}

impl Projection {
    /// Expression as evaluated, including the target cast.
    pub fn expr(&self) -> Expr {
        match self.target_type {
            Some(to) => self.source.clone().cast(to),
            None => self.source.clone(),
        }
    }
}

impl fmt::Display for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} AS {}", self.expr(), quote_ident(&self.alias))
    }
}
