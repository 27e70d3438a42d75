//! Geography vocabulary: resolutions, states, census profiles, partitions.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::id::TableId;

/// Census year, e.g. 2011 or 2016.
pub type Year = u16;

/// Geography granularity tier (`STE`, `SA2`, `MB`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(transparent)]
pub struct Resolution(String);

impl Resolution {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Resolution {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

/// State or region code of a source partition (`NSW`, `Vic`, ...).
///
/// Comparisons used by naming exceptions are case-insensitive; see
/// [`StateCode::eq_ignore_case`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd)]
#[serde(transparent)]
pub struct StateCode(String);

impl StateCode {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
    pub fn eq_ignore_case(&self, other: &str) -> bool {
        self.0.eq_ignore_ascii_case(other)
    }
}

impl fmt::Display for StateCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StateCode {
    fn from(v: &str) -> Self {
        Self(v.to_string())
    }
}

/// Census profile (`BCP` for 2011, `GCP` for 2016).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Profile(String);

impl Profile {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Leading character; feed rows and table ids of this profile start with it.
    pub fn prefix_char(&self) -> Option<char> {
        self.0.chars().next()
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Schema-qualified relation name, rendered as `"schema"."table"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: Option<String>,
    pub table: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            table: table.into(),
        }
    }

    pub fn bare(table: impl Into<String>) -> Self {
        Self {
            schema: None,
            table: table.into(),
        }
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "\"{}\".\"{}\"", schema, self.table),
            None => write!(f, "\"{}\"", self.table),
        }
    }
}

/// One (resolution, state) slice of source data for one table and year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeographyPartition {
    pub resolution: Resolution,
    pub state: StateCode,
    pub table: TableId,
    pub year: Year,
    /// Physical queryable table backing this slice.
    pub relation: QualifiedName,
}

/// States and regions the source datapacks are split into.
pub const STATES: &[&str] = &["NSW", "Vic", "Qld", "SA", "WA", "Tas", "NT", "ACT", "OT"];

/// Geography tiers with datapack coverage, coarsest first. `MB` is derived.
pub const RESOLUTIONS: &[&str] = &[
    "STE", "GCCSA", "SA4", "SA3", "SA2", "SA1", "LGA", "SLA", "SSC", "POA", "CED", "SED", "RA",
    "MB",
];
