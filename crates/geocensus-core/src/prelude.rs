//! Convenient re-exports for downstream crates.

pub use crate::config::{DanglingPolicy, GeocensusConfig};
pub use crate::error::{Error, Result};
pub use crate::geo::{GeographyPartition, Profile, QualifiedName, Resolution, StateCode, Year};
pub use crate::id::{ColumnId, TableId, TagId};
pub use crate::manifest::{RunManifest, Strategy};
pub use crate::schema::DataType;
pub use crate::types::{Row, Scalar};
