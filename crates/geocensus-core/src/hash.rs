//! Provenance digests for run manifests.
//!
//! A manifest records the blake3 digest of the serialized statement list a
//! materialization executed. Two runs over the same resolved column set,
//! partitions, and config therefore carry the same digest. Digests render
//! and serialize as lowercase hex so manifests stay readable as JSON.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash256(pub [u8; 32]);

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.iter().try_for_each(|b| write!(f, "{b:02x}"))
    }
}

impl FromStr for Hash256 {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::Hash(format!("'{s}' is not a 64-digit hex digest"));
        if s.len() != 64 || !s.is_ascii() {
            return Err(bad());
        }
        let mut out = [0u8; 32];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[2 * i..2 * i + 2], 16).map_err(|_| bad())?;
        }
        Ok(Hash256(out))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Digest of `v`'s JSON form. Field order follows the type definitions, so
/// equal values always digest equally.
pub fn hash_serde<T: Serialize>(v: &T) -> Result<Hash256> {
    let bytes = serde_json::to_vec(v)?;
    Ok(Hash256(*blake3::hash(&bytes).as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equal_statement_lists_share_a_digest() {
        let a = hash_serde(&["DROP TABLE t", "CREATE TABLE t ()"]).unwrap();
        assert_eq!(a, hash_serde(&["DROP TABLE t", "CREATE TABLE t ()"]).unwrap());
        assert_ne!(a, hash_serde(&["CREATE TABLE t ()", "DROP TABLE t"]).unwrap());
    }

    #[test]
    fn digest_serializes_as_hex() {
        let digest = hash_serde(&"G01").unwrap();
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json.len(), 66);
        assert_eq!(serde_json::from_str::<Hash256>(&json).unwrap(), digest);
        assert!("zz".parse::<Hash256>().is_err());
    }
}
