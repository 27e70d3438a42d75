#![forbid(unsafe_code)]
//! geocensus-core: shared vocabulary for the column graph and table materializer.
//!
//! Pure data only. Feed parsing lives in `geocensus-meta`, statement building in
//! `geocensus-plan`, and anything that talks to an execution context lives in
//! `geocensus-exec`.

pub mod config;
pub mod error;
pub mod geo;
pub mod hash;
pub mod id;
pub mod manifest;
pub mod prelude;
pub mod schema;
pub mod types;

/// Version string stamped into run manifests.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
