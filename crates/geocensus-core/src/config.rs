//! Configuration shared by the resolver, the materializer, and the CLI.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::geo::{Profile, Resolution, Year};

/// What to do with a denominator token that names no known column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DanglingPolicy {
    /// Drop the edge and keep going (tolerates partially rolled-out tables).
    #[default]
    Drop,
    /// Fail resolution of the table.
    Reject,
}

impl std::str::FromStr for DanglingPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "drop" => Ok(DanglingPolicy::Drop),
            "reject" => Ok(DanglingPolicy::Reject),
            other => Err(Error::Config(format!("unknown dangling policy '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeocensusConfig {
    /// Schema that output tables are created in.
    pub output_schema: String,

    /// Name of the geography-id column in every materialized table.
    pub geoid_column: String,

    /// Last year of the legacy epoch whose source geo-id column is `region_id`.
    pub legacy_epoch_max_year: Year,

    /// The single tier that may be derived by interpolation.
    pub finest_resolution: Resolution,

    /// Immediate parent of `finest_resolution`.
    pub finest_parent: Resolution,

    /// Parallelism for partition writes. Only the async scheduler uses more than one.
    pub max_parallel_tasks: usize,

    pub dangling_policy: DanglingPolicy,

    /// Weight assigned to loaded descriptors (0 hides a column from consumers).
    pub default_weight: u8,

    /// Version number keying the resolved-column cache.
    pub columns_version: u32,

    /// Unknown tag ids are an error when set; otherwise placeholder tags are made.
    pub strict_tags: bool,

    /// Census profile used for each year.
    pub profiles: BTreeMap<Year, Profile>,
}

impl Default for GeocensusConfig {
    fn default() -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(2011, Profile::new("BCP"));
        profiles.insert(2016, Profile::new("GCP"));
        Self {
            output_schema: "observatory".to_string(),
            geoid_column: "region_id".to_string(),
            legacy_epoch_max_year: 2011,
            finest_resolution: Resolution::new("MB"),
            finest_parent: Resolution::new("SA1"),
            max_parallel_tasks: 4,
            dangling_policy: DanglingPolicy::Drop,
            default_weight: 5,
            columns_version: 7,
            strict_tags: true,
            profiles,
        }
    }
}

impl GeocensusConfig {
    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `GEOCENSUS_OUTPUT_SCHEMA`: schema for output tables
    /// - `GEOCENSUS_GEOID_COLUMN`: geography-id column name
    /// - `GEOCENSUS_LEGACY_EPOCH_MAX_YEAR`: last legacy year
    /// - `GEOCENSUS_FINEST_RESOLUTION` / `GEOCENSUS_FINEST_PARENT`
    /// - `GEOCENSUS_MAX_PARALLEL_TASKS`: partition parallelism
    /// - `GEOCENSUS_DANGLING_POLICY`: `drop` or `reject`
    /// - `GEOCENSUS_DEFAULT_WEIGHT`, `GEOCENSUS_COLUMNS_VERSION`
    /// - `GEOCENSUS_STRICT_TAGS`: `true`/`false`
    ///
    /// Unparseable values are ignored and the default kept.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("GEOCENSUS_OUTPUT_SCHEMA") {
            cfg.output_schema = s;
        }

        if let Ok(s) = std::env::var("GEOCENSUS_GEOID_COLUMN") {
            cfg.geoid_column = s;
        }

        if let Ok(s) = std::env::var("GEOCENSUS_LEGACY_EPOCH_MAX_YEAR") {
            if let Ok(v) = s.parse::<Year>() {
                cfg.legacy_epoch_max_year = v;
            }
        }

        if let Ok(s) = std::env::var("GEOCENSUS_FINEST_RESOLUTION") {
            cfg.finest_resolution = Resolution::new(s);
        }

        if let Ok(s) = std::env::var("GEOCENSUS_FINEST_PARENT") {
            cfg.finest_parent = Resolution::new(s);
        }

        if let Ok(s) = std::env::var("GEOCENSUS_MAX_PARALLEL_TASKS") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.max_parallel_tasks = v;
            }
        }

        if let Ok(s) = std::env::var("GEOCENSUS_DANGLING_POLICY") {
            if let Ok(v) = s.parse::<DanglingPolicy>() {
                cfg.dangling_policy = v;
            }
        }

        if let Ok(s) = std::env::var("GEOCENSUS_DEFAULT_WEIGHT") {
            if let Ok(v) = s.parse::<u8>() {
                cfg.default_weight = v;
            }
        }

        if let Ok(s) = std::env::var("GEOCENSUS_COLUMNS_VERSION") {
            if let Ok(v) = s.parse::<u32>() {
                cfg.columns_version = v;
            }
        }

        if let Ok(s) = std::env::var("GEOCENSUS_STRICT_TAGS") {
            if let Ok(v) = s.parse::<bool>() {
                cfg.strict_tags = v;
            }
        }

        cfg
    }

    /// Check cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.default_weight > 10 {
            return Err(Error::Config(format!(
                "default_weight must be within 0..=10, got {}",
                self.default_weight
            )));
        }
        if self.max_parallel_tasks == 0 {
            return Err(Error::Config("max_parallel_tasks must be at least 1".into()));
        }
        if self.finest_resolution == self.finest_parent {
            return Err(Error::Config(format!(
                "finest resolution {} cannot be its own parent",
                self.finest_resolution
            )));
        }
        Ok(())
    }

    /// Profile for a year, or a config error naming the year.
    pub fn profile_for(&self, year: Year) -> Result<&Profile> {
        self.profiles
            .get(&year)
            .ok_or_else(|| Error::Config(format!("no census profile configured for {year}")))
    }

    pub fn is_legacy_epoch(&self, year: Year) -> bool {
        year <= self.legacy_epoch_max_year
    }
}
