//! Run manifest for one table materialization, kept for audit.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::geo::{Resolution, Year};
use crate::hash::Hash256;
use crate::id::TableId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestId(pub Uuid);

/// How the output table was populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Strategy {
    /// One insert-from-select per source partition.
    Direct,
    /// Area-weighted apportionment from the parent tier.
    Interpolated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub id: ManifestId,
    pub year: Year,
    pub resolution: Resolution,
    pub table: TableId,
    pub strategy: Strategy,

    /// Stable hash over every statement rendered for this run.
    pub plan_hash: Hash256,

    /// Version of the resolved column set the schema was built from.
    pub columns_version: u32,

    /// Engine version string for provenance.
    pub engine_version: String,

    /// Milliseconds since Unix epoch (UTC).
    pub started_ms: u64,
    pub finished_ms: u64,
}

impl RunManifest {
    pub fn new(
        year: Year,
        resolution: Resolution,
        table: TableId,
        strategy: Strategy,
        plan_hash: Hash256,
        columns_version: u32,
        started_ms: u64,
    ) -> Self {
        Self {
            id: ManifestId(Uuid::new_v4()),
            year,
            resolution,
            table,
            strategy,
            plan_hash,
            columns_version,
            engine_version: crate::VERSION.to_string(),
            started_ms,
            finished_ms: started_ms,
        }
    }

    pub fn finish(mut self, finished_ms: u64) -> Self {
        self.finished_ms = finished_ms;
        self
    }
}
