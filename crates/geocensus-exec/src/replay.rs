//! Provenance hashing.
//!
//! The plan hash covers every statement a materialization executes, in
//! execution order. Identical column sets, partitions, and config yield an
//! identical hash.

use geocensus_core::hash::{hash_serde, Hash256};
use geocensus_core::error::Result;
use geocensus_plan::Statement;

pub fn hash_statements(statements: &[Statement]) -> Result<Hash256> {
    hash_serde(&statements)
}
