//! Lightweight row values so contexts can return rows without pulling a
//! database driver into core.

use serde::{Deserialize, Serialize};

use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    I64(i64),
    F64(f64),
    Str(String),
}

impl Scalar {
    /// Numeric view used by arithmetic (interpolation, casts).
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::I64(v) => Some(*v as f64),
            Scalar::F64(v) => Some(*v),
            Scalar::Str(s) => s.trim().parse::<f64>().ok(),
            Scalar::Null => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Cast to a declared column type, mirroring SQL `CAST(x AS type)`.
    ///
    /// Returns `Err` with a message when the value cannot be represented,
    /// e.g. a non-numeric string cast to `Numeric`.
    pub fn cast(&self, to: DataType) -> Result<Scalar, String> {
        if self.is_null() {
            return Ok(Scalar::Null);
        }
        match to {
            DataType::Text => Ok(match self {
                Scalar::I64(v) => Scalar::Str(v.to_string()),
                Scalar::F64(v) => Scalar::Str(v.to_string()),
                Scalar::Str(s) => Scalar::Str(s.clone()),
                Scalar::Null => Scalar::Null,
            }),
            DataType::Integer | DataType::BigInt => match self {
                Scalar::I64(v) => Ok(Scalar::I64(*v)),
                Scalar::F64(v) => Ok(Scalar::I64(v.round() as i64)),
                Scalar::Str(s) => s
                    .trim()
                    .parse::<i64>()
                    .map(Scalar::I64)
                    .map_err(|_| format!("invalid input syntax for type {}: \"{s}\"", to.sql_name())),
                Scalar::Null => Ok(Scalar::Null),
            },
            DataType::Geometry => Err("cannot cast a scalar to Geometry".to_string()),
            DataType::Numeric | DataType::Real | DataType::DoublePrecision => self
                .as_f64()
                .map(Scalar::F64)
                .ok_or_else(|| format!("invalid input syntax for type {}: {:?}", to.sql_name(), self)),
        }
    }
}

/// One result row.
pub type Row = Vec<Scalar>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn casts_strings_to_numeric() {
        let v = Scalar::Str(" 12.5".into());
        assert_eq!(v.cast(DataType::Numeric).unwrap(), Scalar::F64(12.5));
        assert!(Scalar::Str("n/a".into()).cast(DataType::Numeric).is_err());
    }

    #[test]
    fn null_survives_any_cast() {
        assert_eq!(Scalar::Null.cast(DataType::Integer).unwrap(), Scalar::Null);
    }

    #[test]
    fn integer_cast_rounds_floats() {
        assert_eq!(Scalar::F64(2.6).cast(DataType::Integer).unwrap(), Scalar::I64(3));
    }
}
