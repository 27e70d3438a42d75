//! Declared column types of materialized tables.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::Error;

/// Declared type of a column. Numeric kinds are what descriptors carry;
/// `Text` is reserved for geography ids and `Geometry` for boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Numeric,
    Integer,
    BigInt,
    Real,
    DoublePrecision,
    Text,
    Geometry,
}

impl DataType {
    /// SQL type name used in casts and DDL.
    pub fn sql_name(&self) -> &'static str {
        match self {
            DataType::Numeric => "Numeric",
            DataType::Integer => "Integer",
            DataType::BigInt => "BigInt",
            DataType::Real => "Real",
            DataType::DoublePrecision => "Double Precision",
            DataType::Text => "Text",
            DataType::Geometry => "Geometry",
        }
    }

    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::Text | DataType::Geometry)
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "numeric" => Ok(DataType::Numeric),
            "integer" | "int" | "int4" => Ok(DataType::Integer),
            "bigint" | "int8" => Ok(DataType::BigInt),
            "real" | "float4" => Ok(DataType::Real),
            "double precision" | "float8" => Ok(DataType::DoublePrecision),
            "text" => Ok(DataType::Text),
            "geometry" => Ok(DataType::Geometry),
            other => Err(Error::Schema(format!("unknown column type '{other}'"))),
        }
    }
}
