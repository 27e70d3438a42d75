#![forbid(unsafe_code)]
//! geocensus-meta: from raw datapack metadata rows to resolved column sets.
//!
//! Flow:
//! - `feed` reads the delimited metadata resource into `MetadataRecord`s.
//! - `loader` turns the rows of one table into unbound `ColumnDefinition`s.
//! - `deps` holds the static prerequisite declarations (table → tables).
//! - `resolver` binds denominator/universe targets against prerequisite sets
//!   and earlier rows of the same table, producing a `ResolvedColumnSet`.
//! - `cache` keeps resolved sets keyed by (year, profile, table) and a version.
//!
//! Nothing here touches an execution context.

pub mod cache;
pub mod catalog;
pub mod column;
pub mod deps;
pub mod error;
pub mod feed;
pub mod loader;
pub mod resolved;
pub mod resolver;
pub mod tags;

pub use cache::{CacheKey, ColumnCache, ColumnCatalog};
pub use catalog::{TableCatalog, YearTables};
pub use column::{Aggregate, ColumnDescriptor, Relation, Target};
pub use deps::{DependencyMap, RangeRule};
pub use error::{MetaError, Result};
pub use feed::{read_feed, FeedLayout, MetadataRecord};
pub use loader::{ColumnDefinition, ColumnLoader, TagSelection};
pub use resolved::ResolvedColumnSet;
pub use resolver::{Prerequisites, Resolver};
pub use tags::{Tag, TagKind, TagRegistry};
