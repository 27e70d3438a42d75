//! Physical column names in source partitions.
//!
//! Source tables name their geography-id column by epoch and their measure
//! columns by the column id minus the `<table>_` prefix. One measure is
//! published with a trailing `_` in most partitions and without it in the
//! (resolution, state) pairs listed in [`NAMING_EXCEPTIONS`].

use geocensus_core::config::GeocensusConfig;
use geocensus_core::geo::{Resolution, StateCode, Year};
use geocensus_core::id::{ColumnId, TableId};

/// Measure whose source name loses its trailing separator in some partitions.
pub const TRAILING_SEPARATOR_MEASURE: &str = "Median_rent_weekly_";
const TRAILING_SEPARATOR_REPLACEMENT: &str = "Median_rent_weekly";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateSet {
    Only(&'static [&'static str]),
    AllExcept(&'static [&'static str]),
}

impl StateSet {
    /// Case-insensitive membership.
    pub fn contains(&self, state: &StateCode) -> bool {
        match self {
            StateSet::Only(list) => list.iter().any(|s| state.eq_ignore_case(s)),
            StateSet::AllExcept(list) => !list.iter().any(|s| state.eq_ignore_case(s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamingException {
    pub resolution: &'static str,
    pub states: StateSet,
}

pub const NAMING_EXCEPTIONS: &[NamingException] = &[
    NamingException { resolution: "RA", states: StateSet::AllExcept(&["aust"]) },
    NamingException { resolution: "SA4", states: StateSet::Only(&["vic", "wa", "ot"]) },
    NamingException { resolution: "SA3", states: StateSet::Only(&["vic", "wa"]) },
    NamingException { resolution: "SA2", states: StateSet::Only(&["vic", "wa", "nsw"]) },
    NamingException { resolution: "SA1", states: StateSet::Only(&["vic", "wa", "qld", "nt", "sa", "nsw"]) },
    NamingException { resolution: "GCCSA", states: StateSet::Only(&["vic", "wa", "ot"]) },
    NamingException { resolution: "LGA", states: StateSet::Only(&["wa"]) },
    NamingException { resolution: "SLA", states: StateSet::Only(&["wa"]) },
    NamingException { resolution: "SSC", states: StateSet::Only(&["vic", "wa", "qld", "nt", "sa", "nsw"]) },
    NamingException { resolution: "POA", states: StateSet::Only(&["wa", "qld", "nsw"]) },
    NamingException { resolution: "CED", states: StateSet::Only(&["vic", "wa"]) },
    NamingException { resolution: "SED", states: StateSet::Only(&["wa", "ot"]) },
];

/// Whether the trailing-separator substitution applies to this partition.
pub fn exception_applies(resolution: &Resolution, state: &StateCode) -> bool {
    NAMING_EXCEPTIONS
        .iter()
        .any(|e| e.resolution == resolution.as_str() && e.states.contains(state))
}

/// Physical source column holding descriptor `column` of `table` in one partition.
pub fn source_column_name(
    table: &TableId,
    column: &ColumnId,
    resolution: &Resolution,
    state: &StateCode,
) -> String {
    let mut name = column.as_str().to_string();
    if name.ends_with(TRAILING_SEPARATOR_MEASURE) && exception_applies(resolution, state) {
        name = name.replace(TRAILING_SEPARATOR_MEASURE, TRAILING_SEPARATOR_REPLACEMENT);
    }
    let prefix = format!("{table}_");
    match name.strip_prefix(prefix.as_str()) {
        Some(rest) => rest.to_string(),
        None => name,
    }
}

/// Geography-id column of source partitions for `resolution` in `year`.
///
/// Legacy-epoch packs use the configured fixed name; later packs qualify it,
/// e.g. `SA2_CODE_2016`.
pub fn source_geoid_column(config: &GeocensusConfig, resolution: &Resolution, year: Year) -> String {
    if config.is_legacy_epoch(year) {
        config.geoid_column.clone()
    } else {
        format!("{resolution}_CODE_{year}")
    }
}
